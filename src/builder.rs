//! Pipeline orchestrator
//!
//! Each descriptor moves through the same stages, strictly one after another:
//!
//! ```text
//! Pending -> VariantResolved | DirectlyRenderable -> Compiled -> Validated
//!         -> Minified? -> Written | Collected
//! ```
//!
//! A descriptor whose `out` is null is *collected*: its text is kept on the
//! descriptor so a later scene can `import` it.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::compiler::{BuildInfo, Compiler};
use crate::config::ProjectLayout;
use crate::console::{Console, LogConsole};
use crate::error::BuildError;
use crate::pages::{PagesPublisher, Publisher};
use crate::renderer::{ImportChain, Importer, Interpreter, RenderOptions, SceneConfig, SvgConfig};
use crate::stats::StatsProvider;
use crate::template::{
    expand, Expansion, OutputIndex, TemplateDescriptor, TemplateError, TemplateKind, TemplateRegistry,
};
use crate::tools::{StandardToolchain, Toolchain};

pub const DEFAULT_VERSION: &str = "1.0.0";

/// Configures and runs one build
pub struct Builder {
    templates: TemplateRegistry,
    version: String,
    build_time: Option<DateTime<Utc>>,
    output_folder: String,
    debug: bool,
    skip_pages: bool,
    layout: ProjectLayout,
    console: Box<dyn Console>,
    toolchain: Box<dyn Toolchain>,
    stats: Option<StatsProvider>,
    publisher: Box<dyn Publisher>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            templates: TemplateRegistry::default(),
            version: DEFAULT_VERSION.to_string(),
            build_time: None,
            output_folder: String::new(),
            debug: false,
            skip_pages: false,
            layout: ProjectLayout::default(),
            console: Box::new(LogConsole),
            toolchain: Box::new(StandardToolchain),
            stats: None,
            publisher: Box::new(PagesPublisher),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(mut self, templates: impl Into<TemplateRegistry>) -> Self {
        self.templates = templates.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Timestamp reported by `build_info`; defaults to the time `build` starts
    pub fn with_build_time(mut self, time: DateTime<Utc>) -> Self {
        self.build_time = Some(time);
        self
    }

    /// Sub-folder of `out/` and `dist/` this build writes to
    pub fn with_output_folder(mut self, folder: impl Into<String>) -> Self {
        self.output_folder = folder.into();
        self
    }

    /// Debug builds use placeholder statistics, pretty-print SVG and skip publishing
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn with_layout(mut self, layout: ProjectLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_toolchain(mut self, toolchain: impl Toolchain + 'static) -> Self {
        self.toolchain = Box::new(toolchain);
        self
    }

    pub fn with_stats(mut self, stats: StatsProvider) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.publisher = Box::new(publisher);
        self
    }

    /// Do not run the publisher after the build
    pub fn skip_pages(mut self) -> Self {
        self.skip_pages = true;
        self
    }

    /// Run every descriptor through the pipeline
    ///
    /// Returns the descriptors in their original order, with collected
    /// results filled in. The first failure stops the build.
    pub async fn build(mut self) -> Result<Vec<TemplateDescriptor>, BuildError> {
        let out_dir = self.layout.out_folder(&self.output_folder);
        fs::create_dir_all(&out_dir).map_err(|source| BuildError::CreateDir {
            path: out_dir.clone(),
            source,
        })?;

        let templates = std::mem::take(&mut self.templates);
        if templates.is_empty() {
            log::warn!("no templates to build");
        }
        let pristine = templates.as_slice().to_vec();
        let index = OutputIndex::build(templates.as_slice());

        let mut stats = self.stats.take().unwrap_or_default();
        if self.debug {
            stats = stats.with_debug(true);
        }
        let time = self.build_time.unwrap_or_else(Utc::now);
        let compiler = Compiler::new(
            BuildInfo::new(self.version.clone(), time),
            self.layout.static_dir.clone(),
            Arc::new(stats),
        );

        let session = Session {
            layout: &self.layout,
            console: self.console.as_ref(),
            svg: SvgConfig::default().with_pretty_print(self.debug),
            compiler,
            templates: RefCell::new(templates),
        };

        let count = session.templates.borrow().len();
        for position in 0..count {
            let Some(descriptor) = session.templates.borrow().get(position).cloned() else {
                break;
            };
            if let Some(text) = self.process(&session, &index, &descriptor, &out_dir).await? {
                if let Some(slot) = session.templates.borrow_mut().get_mut(position) {
                    slot.rendered = Some(text);
                }
            }
        }

        if !self.debug && !self.skip_pages {
            self.publisher
                .publish(&pristine, &self.layout, &self.output_folder)
                .await?;
        }

        Ok(session.templates.into_inner().into_inner())
    }

    async fn process(
        &self,
        session: &Session<'_>,
        index: &OutputIndex,
        descriptor: &TemplateDescriptor,
        out_dir: &Path,
    ) -> Result<Option<String>, BuildError> {
        log::debug!("'{}' ({}): pending", descriptor.input, descriptor.kind);
        let Expansion {
            descriptor: target,
            options,
        } = if descriptor.kind.is_variant() {
            let expansion = expand(descriptor, session.templates.borrow().as_slice(), index)?;
            log::debug!(
                "'{}': variant resolved to '{}'",
                descriptor.input,
                expansion.descriptor.input
            );
            expansion
        } else {
            log::debug!("'{}': directly renderable", descriptor.input);
            Expansion {
                descriptor: descriptor.clone(),
                options: RenderOptions::default(),
            }
        };

        let text = session
            .render(&target, options, ImportChain::starting_at(&target.input))
            .await?;

        let console = self.console.as_ref();
        if !self.toolchain.validate(target.kind, &text, console).await {
            return Err(BuildError::Invalid {
                kind: target.kind,
                input: target.input,
            });
        }
        log::debug!("'{}': validated", target.input);

        let text = if target.minify {
            let minified = self.toolchain.minify(target.kind, &text, self.debug, console).await;
            log::debug!("'{}': minified", target.input);
            minified
        } else {
            text
        };

        match &target.out {
            Some(name) => {
                let path = out_dir.join(name);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| BuildError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                fs::write(&path, &text).map_err(|source| BuildError::Write {
                    path: path.clone(),
                    source,
                })?;
                console.log(&format!("{} file generated: '{}'", target.kind, path.display()));
                log::debug!("'{}': written", target.input);
                Ok(None)
            }
            None => {
                log::debug!("'{}': collected", target.input);
                Ok(Some(text))
            }
        }
    }
}

/// State shared by every render of one build
struct Session<'b> {
    layout: &'b ProjectLayout,
    console: &'b dyn Console,
    svg: SvgConfig,
    compiler: Compiler,
    templates: RefCell<TemplateRegistry>,
}

impl Session<'_> {
    /// Compile a base descriptor and, for SVG, interpret the result as a scene
    async fn render(
        &self,
        descriptor: &TemplateDescriptor,
        options: RenderOptions,
        chain: ImportChain,
    ) -> Result<String, BuildError> {
        let path = self.layout.template_path(&descriptor.input);
        let source = fs::read_to_string(&path).map_err(|source| BuildError::ReadTemplate { path, source })?;
        let text = self.compiler.compile(&source, &descriptor.data).await?;
        log::debug!("'{}': compiled", descriptor.input);

        match descriptor.kind {
            TemplateKind::Markdown => Ok(text),
            TemplateKind::Svg => {
                let scene = SceneConfig::from_yaml(&text).map_err(|e| {
                    self.console.error(&e.format(&text, &descriptor.input));
                    e
                })?;
                let importer = ImportContext {
                    session: self,
                    data: &descriptor.data,
                };
                let svg = Interpreter::new(self.svg.clone())
                    .with_importer(&importer)
                    .with_chain(chain)
                    .render(&scene, options)
                    .await?;
                Ok(svg)
            }
            kind => Err(TemplateError::NotRenderable { kind }.into()),
        }
    }
}

/// Resolves `import` for the scene of one descriptor
struct ImportContext<'s> {
    session: &'s Session<'s>,
    data: &'s Value,
}

#[async_trait(?Send)]
impl Importer for ImportContext<'_> {
    async fn import(&self, name: &str, chain: &ImportChain) -> Result<String, BuildError> {
        let found = self.session.templates.borrow().importable(name).cloned();

        let descriptor = match found {
            Some(TemplateDescriptor {
                rendered: Some(markup),
                ..
            }) => {
                log::debug!("'{}': reusing collected result", name);
                return Ok(markup);
            }
            Some(descriptor) => descriptor,
            None => TemplateDescriptor::new(name, None, TemplateKind::Svg, self.data.clone()),
        };
        self.session
            .render(&descriptor, RenderOptions::default(), chain.clone())
            .await
    }
}

/// Build `descriptors` in the current directory
///
/// Equivalent to configuring a [`Builder`] with these settings.
pub async fn build(
    descriptors: Vec<TemplateDescriptor>,
    version: impl Into<String>,
    build_time: DateTime<Utc>,
    output_folder: impl Into<String>,
    debug: bool,
    console: impl Console + 'static,
) -> Result<Vec<TemplateDescriptor>, BuildError> {
    Builder::new()
        .with_templates(descriptors)
        .with_version(version)
        .with_build_time(build_time)
        .with_output_folder(output_folder)
        .with_debug(debug)
        .with_console(console)
        .build()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::SilentConsole;
    use chrono::TimeZone;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::create_dir_all(&layout.templates_dir).unwrap();
        for (name, content) in files {
            fs::write(layout.template_path(name), content).unwrap();
        }
        (dir, layout)
    }

    fn builder(layout: ProjectLayout, templates: Vec<TemplateDescriptor>) -> Builder {
        Builder::new()
            .with_layout(layout)
            .with_templates(templates)
            .with_version("4.2.0")
            .with_build_time(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
            .with_console(SilentConsole)
            .skip_pages()
    }

    #[test]
    fn test_markdown_is_written_and_collected() {
        let (_dir, layout) = project(&[("readme.md.hbs", "# {{name}} v{{build_info \"version\"}}\n")]);
        let out = layout.out_folder("");
        let templates = vec![
            TemplateDescriptor::new("readme.md.hbs", Some("ReadMe.md"), TemplateKind::Markdown, json!({ "name": "forge" })),
            TemplateDescriptor::new("readme.md.hbs", None, TemplateKind::Markdown, json!({ "name": "memory" })),
        ];
        let result = block_on(builder(layout, templates).build()).unwrap();

        assert_eq!(fs::read_to_string(out.join("ReadMe.md")).unwrap(), "# forge v4.2.0\n");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].rendered, None);
        assert_eq!(result[1].rendered.as_deref(), Some("# memory v4.2.0\n"));
    }

    #[test]
    fn test_missing_template_file() {
        let (_dir, layout) = project(&[]);
        let templates = vec![TemplateDescriptor::new("gone.md.hbs", Some("gone.md"), TemplateKind::Markdown, Value::Null)];
        let err = block_on(builder(layout, templates).build()).unwrap_err();
        assert!(matches!(err, BuildError::ReadTemplate { .. }));
    }

    #[test]
    fn test_scene_yaml_error_is_reported() {
        let (_dir, layout) = project(&[("bad.svg.hbs", "shape: [unclosed\n")]);
        let templates = vec![TemplateDescriptor::new("bad.svg.hbs", Some("bad.svg"), TemplateKind::Svg, Value::Null)];
        let err = block_on(builder(layout, templates).build()).unwrap_err();
        assert!(matches!(err, BuildError::Scene(_)));
    }

    #[test]
    fn test_output_folder_is_created() {
        let (_dir, layout) = project(&[("a.svg.hbs", "dot:\n  circle: 4\n")]);
        let out = layout.out_folder("nested/site");
        let templates = vec![TemplateDescriptor::new("a.svg.hbs", Some("a.svg"), TemplateKind::Svg, Value::Null)];
        block_on(builder(layout, templates).with_output_folder("nested/site").build()).unwrap();
        let svg = fs::read_to_string(out.join("a.svg")).unwrap();
        assert!(svg.contains(r#"<circle r="2" cx="2" cy="2"/>"#));
    }
}
