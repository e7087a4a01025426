//! SVG renderer for scene configurations
//!
//! This module interprets a scene configuration (a YAML mapping of named
//! drawing calls) against an SVG node arena and serializes the result.

pub mod config;
pub mod document;
mod draw;
pub mod interpreter;
pub mod markup;
pub mod methods;

pub use config::{RenderOptions, SvgConfig};
pub use document::{Document, NodeId};
pub use interpreter::{ImportChain, Importer, Interpreter, SceneConfig, SceneError, ANIMATIONS_OFF_CSS};
pub use markup::{parse_svg, MarkupError};
pub use methods::Method;
