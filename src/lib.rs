//! Profile Forge - builds profile artifacts from declarative templates
//!
//! Handlebars templates are compiled with build metadata and repository
//! statistics. SVG templates compile to a YAML scene which is interpreted
//! into markup; Markdown templates are used as compiled. Every artifact is
//! validated, minified and written, and dark or animation-free variants are
//! derived from a single source template.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::executor::block_on;
//! use profile_forge::{Builder, ProjectLayout, TemplateDescriptor, TemplateKind};
//!
//! let templates = vec![
//!     TemplateDescriptor::new("banner.svg.hbs", Some("banner.svg"), TemplateKind::Svg, serde_json::json!({})),
//!     TemplateDescriptor::new("banner.svg", Some("banner-dark.svg"), TemplateKind::DarkSvgVariant, serde_json::Value::Null),
//! ];
//! let built = block_on(
//!     Builder::new()
//!         .with_layout(ProjectLayout::new("."))
//!         .with_templates(templates)
//!         .with_version("1.4.0")
//!         .build(),
//! )
//! .unwrap();
//! assert_eq!(built.len(), 2);
//! ```

pub mod builder;
pub mod compiler;
pub mod config;
pub mod console;
pub mod error;
pub mod pages;
pub mod renderer;
pub mod stats;
pub mod template;
pub mod tools;

pub use builder::{build, Builder, DEFAULT_VERSION};
pub use compiler::{BuildInfo, CompileError, Compiler};
pub use config::{BuildConfig, ConfigError, ProjectLayout};
pub use console::{Console, LogConsole, SilentConsole};
pub use error::BuildError;
pub use pages::{PagesPublisher, PublishError, Publisher};
pub use renderer::{Interpreter, RenderOptions, SceneConfig, SceneError, SvgConfig};
pub use stats::{GithubStats, JsonFileStats, StatsError, StatsProvider, StatsSource};
pub use template::{TemplateDescriptor, TemplateError, TemplateKind, TemplateRegistry};
pub use tools::{StandardToolchain, Toolchain};
