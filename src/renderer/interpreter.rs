//! Scene interpreter - turns a scene configuration into SVG markup
//!
//! A scene is an ordered mapping from node names to method calls. Each call
//! may name further calls that are applied to the node it returns:
//!
//! ```yaml
//! background:
//!   rect:
//!     rect: [1600, 800]
//!     fill: "#0d1117"
//! avatar:
//!   circle:
//!     circle: 120
//!     move: [40, 40]
//! class: banner
//! ```

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::document::{Document, NodeId, ANIMATION_TAGS};
use super::draw;
use super::markup::{self, MarkupError};
use super::methods::{scalar_string, Arg, Method, Target};
use super::{RenderOptions, SvgConfig};
use crate::error::{report, BuildError};

/// Rule appended to documents rendered without animations
pub const ANIMATIONS_OFF_CSS: &str = "*{animation:none!important;transition:none!important}";

/// Errors raised while interpreting a scene
#[derive(Debug, Error)]
pub enum SceneError {
    /// The scene document is not a valid configuration
    #[error("invalid scene configuration: {message}")]
    Config {
        message: String,
        offset: Option<usize>,
    },

    #[error("unknown method '{method}' on {node}")]
    UnknownMethod { method: String, node: String },

    /// A known method was applied to a node that cannot take it
    #[error("method '{method}' is not supported on {node}")]
    UnsupportedMethod { method: String, node: String },

    #[error("invalid arguments for '{method}': {message}")]
    InvalidArguments { method: String, message: String },

    /// Imported markup could not be parsed
    #[error("imported markup: {0}")]
    Markup(#[from] MarkupError),

    #[error("circular import detected: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("import of '{name}' failed: {source}")]
    Import {
        name: String,
        source: Box<BuildError>,
    },
}

impl SceneError {
    pub(crate) fn invalid(method: &str, message: impl Into<String>) -> Self {
        SceneError::InvalidArguments {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Format the error with the scene source, when it points into it
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            SceneError::Config {
                message,
                offset: Some(offset),
            } => report(filename, source, *offset, "invalid scene configuration", message),
            other => other.to_string(),
        }
    }
}

/// Ordered scene configuration: node name to method calls or a root attribute
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SceneConfig {
    entries: IndexMap<String, Value>,
}

impl SceneConfig {
    /// Parse a YAML (or JSON) scene document
    pub fn from_yaml(source: &str) -> Result<Self, SceneError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<IndexMap<String, Value>> =
            serde_yaml::from_str(source).map_err(|e| SceneError::Config {
                message: e.to_string(),
                offset: e.location().map(|l| l.index()),
            })?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Templates currently being rendered, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportChain {
    names: Vec<String>,
}

impl ImportChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain whose outermost template is `name`
    pub fn starting_at(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Extend the chain with an imported template, failing on cycles
    pub fn enter(&self, name: &str) -> Result<Self, SceneError> {
        let mut names = self.names.clone();
        names.push(name.to_string());
        if self.contains(name) {
            return Err(SceneError::ImportCycle { chain: names });
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Renders other templates for `import`
#[async_trait(?Send)]
pub trait Importer {
    /// Rendered SVG markup of the template `name`
    ///
    /// `chain` already ends with `name`.
    async fn import(&self, name: &str, chain: &ImportChain) -> Result<String, BuildError>;
}

/// Executes scene configurations against a fresh SVG document
pub struct Interpreter<'a> {
    config: SvgConfig,
    importer: Option<&'a dyn Importer>,
    chain: ImportChain,
}

impl<'a> Interpreter<'a> {
    pub fn new(config: SvgConfig) -> Self {
        Self {
            config,
            importer: None,
            chain: ImportChain::new(),
        }
    }

    /// Set the collaborator that resolves `import` calls
    pub fn with_importer(mut self, importer: &'a dyn Importer) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Set the chain of templates this scene is being rendered for
    pub fn with_chain(mut self, chain: ImportChain) -> Self {
        self.chain = chain;
        self
    }

    /// Interpret a scene and serialize the resulting document
    pub async fn render(&self, scene: &SceneConfig, options: RenderOptions) -> Result<String, SceneError> {
        let mut doc = self.interpret(scene).await?;
        if !options.animations {
            disable_animations(&mut doc);
        }
        Ok(doc.to_markup(self.config.pretty_print))
    }

    /// Interpret a scene into a document
    pub async fn interpret(&self, scene: &SceneConfig) -> Result<Document, SceneError> {
        let mut doc = Document::svg(&self.config);
        let root = doc.root();

        for (node, value) in scene.entries() {
            match value {
                Value::Object(calls) => {
                    for (method, spec) in calls {
                        self.call(&mut doc, root, method, spec).await?;
                    }
                }
                Value::Null => {}
                Value::Array(_) => {
                    return Err(SceneError::Config {
                        message: format!("'{}' must be a mapping of methods or a scalar attribute", node),
                        offset: None,
                    })
                }
                scalar => {
                    if let Some(value) = scalar_string(scalar) {
                        doc.set_attr(root, node, &value);
                    }
                }
            }
        }

        Ok(doc)
    }

    fn call<'s>(
        &'s self,
        doc: &'s mut Document,
        target: NodeId,
        name: &'s str,
        spec: &'s Value,
    ) -> LocalBoxFuture<'s, Result<NodeId, SceneError>> {
        Box::pin(async move {
            let method = Method::parse(name).ok_or_else(|| SceneError::UnknownMethod {
                method: name.to_string(),
                node: doc.describe(target),
            })?;
            check_target(doc, target, method, name)?;

            let (raw, chained) = split_call(name, spec);
            let args = method
                .adapt(&raw)
                .map_err(|message| SceneError::invalid(name, message))?;

            let result = if method.is_async() {
                self.import(doc, target, &args).await?
            } else {
                draw::apply(doc, target, method, name, &args)?
            };

            for (chained_name, chained_spec) in chained {
                self.call(&mut *doc, result, chained_name, chained_spec).await?;
            }
            Ok(result)
        })
    }

    async fn import(&self, doc: &mut Document, target: NodeId, args: &[Arg]) -> Result<NodeId, SceneError> {
        let name = args
            .first()
            .and_then(Arg::as_str)
            .ok_or_else(|| SceneError::invalid("import", "expected a template name"))?;
        let chain = self.chain.enter(name)?;
        let importer = self.importer.ok_or_else(|| SceneError::UnsupportedMethod {
            method: "import".to_string(),
            node: format!("{} (no importer configured)", doc.describe(target)),
        })?;

        let markup = importer
            .import(name, &chain)
            .await
            .map_err(|e| SceneError::Import {
                name: name.to_string(),
                source: Box::new(e),
            })?;
        let imported = markup::parse_svg(&markup)?;
        let imported_root = imported.root();
        for child in imported.children(imported_root) {
            doc.graft(target, &imported, *child);
        }
        log::debug!("imported '{}' into {}", name, doc.describe(target));
        Ok(target)
    }
}

/// Split a call specification into its arguments and the calls chained onto its result
fn split_call<'v>(name: &str, spec: &'v Value) -> (Vec<Value>, Vec<(&'v str, &'v Value)>) {
    match spec {
        Value::Object(map) if map.contains_key(name) => {
            let args = match &map[name] {
                Value::Array(items) => items.clone(),
                Value::Null => vec![],
                other => vec![other.clone()],
            };
            let chained = map
                .iter()
                .filter(|(key, _)| key.as_str() != name)
                .map(|(key, value)| (key.as_str(), value))
                .collect();
            (args, chained)
        }
        Value::Array(items) => (items.clone(), vec![]),
        Value::Null => (vec![], vec![]),
        other => (vec![other.clone()], vec![]),
    }
}

fn check_target(doc: &Document, target: NodeId, method: Method, name: &str) -> Result<(), SceneError> {
    let supported = match method.target() {
        Target::Container => doc.is_container(target),
        Target::Text => matches!(doc.tag(target), Some("text" | "tspan" | "textPath")),
        Target::Element => doc.tag(target).is_some(),
    };
    if supported {
        Ok(())
    } else {
        Err(SceneError::UnsupportedMethod {
            method: name.to_string(),
            node: doc.describe(target),
        })
    }
}

/// Remove SMIL animation elements and switch off CSS animations
pub fn disable_animations(doc: &mut Document) {
    let root = doc.root();
    let animated: Vec<NodeId> = doc
        .descendants(root)
        .into_iter()
        .filter(|id| doc.tag(*id).is_some_and(|tag| ANIMATION_TAGS.contains(&tag)))
        .collect();
    for id in animated {
        doc.detach(id);
    }
    let style = doc.append_element(root, "style");
    doc.append_text(style, ANIMATIONS_OFF_CSS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn scene(yaml: &str) -> SceneConfig {
        SceneConfig::from_yaml(yaml).unwrap()
    }

    fn bare() -> SvgConfig {
        SvgConfig::default()
    }

    fn body(markup: &str) -> String {
        // Strip the root open tag for compact assertions
        let start = markup.find('>').map(|i| i + 1).unwrap_or(0);
        markup[start..].trim_end_matches("</svg>").to_string()
    }

    fn render(yaml: &str) -> Result<String, SceneError> {
        block_on(Interpreter::new(bare()).render(&scene(yaml), RenderOptions::default()))
    }

    #[test]
    fn test_chained_call_applies_to_created_node() {
        let svg = render("shape:\n  circle:\n    circle: [10]\n    fill: red\n").unwrap();
        assert_eq!(body(&svg), r#"<circle r="5" cx="5" cy="5" fill="red"/>"#);
    }

    #[test]
    fn test_params_without_own_key_are_one_argument() {
        let svg = render("paint:\n  fill:\n    color: '#fff'\n    opacity: 0.5\n").unwrap();
        assert!(svg.contains(r##"fill="#fff""##));
        assert!(svg.contains(r#"fill-opacity="0.5""#));
    }

    #[test]
    fn test_declaration_order_is_paint_order() {
        let svg = render("a:\n  rect: [1, 1]\nb:\n  circle: 4\nc:\n  path: M0 0\n").unwrap();
        assert_eq!(
            body(&svg),
            r#"<rect width="1" height="1"/><circle r="2" cx="2" cy="2"/><path d="M0 0"/>"#
        );
    }

    #[test]
    fn test_scalar_entry_sets_root_attribute() {
        let svg = render("class: banner\nopacity: 1\n").unwrap();
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains(r#"class="banner""#));
        assert!(svg.contains(r#"opacity="1""#));
    }

    #[test]
    fn test_root_defaults() {
        let svg = render("").unwrap();
        assert!(svg.contains(r#"preserveAspectRatio="xMinYMin none""#));
        assert!(svg.contains(r#"viewBox="0 0 1600 800""#));
        assert!(svg.contains(r#"width="1600""#));
        assert!(svg.contains(r#"height="900""#));
    }

    #[test]
    fn test_unknown_method() {
        let err = render("a:\n  explode: 1\n").unwrap_err();
        assert!(matches!(
            &err,
            SceneError::UnknownMethod { method, node } if method == "explode" && node == "<svg>"
        ));
    }

    #[test]
    fn test_unknown_chained_method_names_the_node() {
        let err = render("a:\n  rect:\n    rect: [1, 1]\n    id: box\n    wobble: 3\n").unwrap_err();
        assert!(matches!(
            &err,
            SceneError::UnknownMethod { method, node } if method == "wobble" && node == "<rect id=\"box\">"
        ));
    }

    #[test]
    fn test_container_method_on_shape_is_unsupported() {
        let err = render("a:\n  rect:\n    rect: []\n    circle: 3\n").unwrap_err();
        assert!(matches!(err, SceneError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_invalid_arguments() {
        let err = render("a:\n  move: [1]\n").unwrap_err();
        assert!(matches!(err, SceneError::InvalidArguments { method, .. } if method == "move"));
    }

    #[test]
    fn test_defs_is_a_singleton_before_content() {
        let yaml = "a:\n  rect: [1, 1]\nb:\n  defs:\n    defs: null\n    element: [linearGradient, {id: g1}]\nc:\n  defs:\n    defs: null\n    element: [linearGradient, {id: g2}]\n";
        let svg = render(yaml).unwrap();
        assert_eq!(
            body(&svg),
            r#"<defs><linearGradient id="g1"/><linearGradient id="g2"/></defs><rect width="1" height="1"/>"#
        );
    }

    #[test]
    fn test_group_nesting_and_text() {
        let yaml = "title:\n  group:\n    group: null\n    addClass: title\n    text:\n      text: Hello\n      font: {family: monospace, size: 32}\n";
        let svg = render(yaml).unwrap();
        assert_eq!(
            body(&svg),
            r#"<g class="title"><text font-family="monospace" font-size="32">Hello</text></g>"#
        );
    }

    #[test]
    fn test_disabled_animations_strip_smil_and_add_rule() {
        let yaml = "dot:\n  group:\n    group: null\n    circle: 10\n    element: [animate, {attributeName: opacity, dur: 1s}]\n";
        let interpreter = Interpreter::new(bare());
        let animated = block_on(interpreter.render(&scene(yaml), RenderOptions::default())).unwrap();
        assert!(animated.contains("<animate"));
        assert!(!animated.contains(ANIMATIONS_OFF_CSS));

        let still = block_on(interpreter.render(&scene(yaml), RenderOptions::default().without_animations())).unwrap();
        assert!(!still.contains("<animate"));
        assert!(still.ends_with(&format!("<style>{}</style></svg>", ANIMATIONS_OFF_CSS)));
    }

    #[test]
    fn test_config_error_reports_location() {
        let source = "a:\n  rect: [1, 1\n";
        let err = SceneConfig::from_yaml(source).unwrap_err();
        assert!(matches!(err, SceneError::Config { offset: Some(_), .. }));
        assert!(err.format(source, "banner.svg.hbs").contains("banner.svg.hbs"));
    }

    #[test]
    fn test_top_level_sequence_is_rejected() {
        let err = render("a:\n  - rect\n").unwrap_err();
        assert!(matches!(err, SceneError::Config { .. }));
    }

    struct FixedImporter {
        markup: String,
        chains: RefCell<Vec<Vec<String>>>,
    }

    #[async_trait(?Send)]
    impl Importer for FixedImporter {
        async fn import(&self, _name: &str, chain: &ImportChain) -> Result<String, BuildError> {
            self.chains.borrow_mut().push(chain.names().to_vec());
            Ok(self.markup.clone())
        }
    }

    #[test]
    fn test_import_grafts_children_without_wrapper() {
        let importer = FixedImporter {
            markup: r#"<svg xmlns="http://www.w3.org/2000/svg" width="10"><rect id="inner"/><text>x</text></svg>"#
                .to_string(),
            chains: RefCell::new(vec![]),
        };
        let interpreter = Interpreter::new(bare())
            .with_importer(&importer)
            .with_chain(ImportChain::starting_at("banner.svg.hbs"));
        let yaml = "part:\n  group:\n    group: null\n    import: icon.svg.hbs\n";
        let svg = block_on(interpreter.render(&scene(yaml), RenderOptions::default())).unwrap();

        assert_eq!(body(&svg), r#"<g><rect id="inner"/><text>x</text></g>"#);
        assert_eq!(
            importer.chains.borrow().as_slice(),
            &[vec!["banner.svg.hbs".to_string(), "icon.svg.hbs".to_string()]]
        );
    }

    #[test]
    fn test_import_cycle_is_detected() {
        let importer = FixedImporter {
            markup: "<svg/>".to_string(),
            chains: RefCell::new(vec![]),
        };
        let interpreter = Interpreter::new(bare())
            .with_importer(&importer)
            .with_chain(ImportChain::starting_at("a.svg.hbs"));
        let err = block_on(interpreter.render(&scene("x:\n  import: a.svg.hbs\n"), RenderOptions::default()))
            .unwrap_err();
        assert!(matches!(err, SceneError::ImportCycle { chain } if chain == ["a.svg.hbs", "a.svg.hbs"]));
        assert!(importer.chains.borrow().is_empty());
    }

    #[test]
    fn test_import_without_importer_is_unsupported() {
        let err = render("x:\n  import: a.svg.hbs\n").unwrap_err();
        assert!(matches!(err, SceneError::UnsupportedMethod { method, .. } if method == "import"));
    }

    #[test]
    fn test_import_rejects_non_svg_markup() {
        let importer = FixedImporter {
            markup: "<html/>".to_string(),
            chains: RefCell::new(vec![]),
        };
        let interpreter = Interpreter::new(bare()).with_importer(&importer);
        let err = block_on(interpreter.render(&scene("x:\n  import: page\n"), RenderOptions::default()))
            .unwrap_err();
        assert!(matches!(err, SceneError::Markup(_)));
    }
}
