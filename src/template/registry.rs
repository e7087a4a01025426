//! Template registry for storing build descriptors in declaration order

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while resolving descriptors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No descriptor produces the output a variant refers to
    #[error("original template not found for: {output}")]
    MissingOriginal { output: String },

    /// More than one descriptor produces the output a variant refers to
    #[error("ambiguous original template for: {output} ({count} descriptors produce it)")]
    AmbiguousOriginal { output: String, count: usize },

    /// A variant chain refers back to itself
    #[error("circular variant reference detected: {}", chain.join(" -> "))]
    VariantCycle { chain: Vec<String> },

    /// A theme flag cannot be injected into non-object data
    #[error("cannot apply {kind} to '{input}': template data must be an object")]
    InvalidVariantData { kind: TemplateKind, input: String },

    /// A variant kind reached the base render path
    #[error("not implemented: {kind} cannot be rendered directly")]
    NotRenderable { kind: TemplateKind },
}

/// What a descriptor renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    #[serde(rename = "SVG")]
    Svg,
    Markdown,
    #[serde(rename = "DarkSVGVariant", alias = "DarkSVGVarient")]
    DarkSvgVariant,
    #[serde(rename = "AnimationDisabledSVG")]
    AnimationDisabledSvg,
    #[serde(rename = "DarkAnimationDisabledSVG")]
    DarkAnimationDisabledSvg,
}

impl TemplateKind {
    /// Check if this kind is derived from another descriptor
    pub fn is_variant(self) -> bool {
        !matches!(self, TemplateKind::Svg | TemplateKind::Markdown)
    }

    /// Whether the rendered artifact is SVG markup
    pub fn is_svg(self) -> bool {
        !matches!(self, TemplateKind::Markdown)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateKind::Svg => "SVG",
            TemplateKind::Markdown => "Markdown",
            TemplateKind::DarkSvgVariant => "DarkSVGVariant",
            TemplateKind::AnimationDisabledSvg => "AnimationDisabledSVG",
            TemplateKind::DarkAnimationDisabledSvg => "DarkAnimationDisabledSVG",
        };
        f.write_str(name)
    }
}

fn default_minify() -> bool {
    true
}

/// One unit of build work: an input template, its destination and its data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Template file under the templates directory, or for variants the
    /// output name of the original descriptor
    #[serde(rename = "in")]
    pub input: String,
    /// Output file name; `None` keeps the result in memory
    #[serde(default)]
    pub out: Option<String>,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    #[serde(default)]
    pub data: Value,
    #[serde(default = "default_minify")]
    pub minify: bool,
    /// Rendered text of an in-memory descriptor, filled in during the build
    #[serde(skip)]
    pub rendered: Option<String>,
}

impl TemplateDescriptor {
    /// Create a descriptor with minification enabled
    pub fn new(
        input: impl Into<String>,
        out: Option<&str>,
        kind: TemplateKind,
        data: Value,
    ) -> Self {
        Self {
            input: input.into(),
            out: out.map(str::to_string),
            kind,
            data,
            minify: true,
            rendered: None,
        }
    }

    /// Set whether the artifact is minified
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }
}

/// Ordered list of descriptors for one build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateRegistry {
    templates: Vec<TemplateDescriptor>,
}

impl TemplateRegistry {
    pub fn get(&self, index: usize) -> Option<&TemplateDescriptor> {
        self.templates.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TemplateDescriptor> {
        self.templates.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn as_slice(&self) -> &[TemplateDescriptor] {
        &self.templates
    }

    /// Find the descriptors rendering a given template file
    pub fn by_input<'a>(&'a self, input: &'a str) -> impl Iterator<Item = &'a TemplateDescriptor> {
        self.templates.iter().filter(move |t| t.input == input)
    }

    /// The first non-variant descriptor rendering `input`, which scenes import
    pub fn importable<'a>(&'a self, input: &'a str) -> Option<&'a TemplateDescriptor> {
        self.by_input(input).find(|t| !t.kind.is_variant())
    }

    pub fn into_inner(self) -> Vec<TemplateDescriptor> {
        self.templates
    }
}

impl From<Vec<TemplateDescriptor>> for TemplateRegistry {
    fn from(templates: Vec<TemplateDescriptor>) -> Self {
        Self { templates }
    }
}
