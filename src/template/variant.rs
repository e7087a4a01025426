//! Variant expansion - derives theme and animation copies of a descriptor

use std::collections::HashMap;

use serde_json::Value;

use super::registry::{TemplateDescriptor, TemplateError, TemplateKind};
use crate::renderer::RenderOptions;

/// Data key a dark variant injects into the cloned descriptor
pub const DARK_THEME_KEY: &str = "darkThemeClass";
const DARK_THEME_VALUE: &str = "dark";

/// What a variant kind changes about its original
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantTransform {
    pub dark: bool,
    pub animations_disabled: bool,
}

impl VariantTransform {
    /// The transform of a kind, or `None` for base kinds
    pub fn of(kind: TemplateKind) -> Option<Self> {
        match kind {
            TemplateKind::Svg | TemplateKind::Markdown => None,
            TemplateKind::DarkSvgVariant => Some(Self { dark: true, animations_disabled: false }),
            TemplateKind::AnimationDisabledSvg => Some(Self { dark: false, animations_disabled: true }),
            TemplateKind::DarkAnimationDisabledSvg => Some(Self { dark: true, animations_disabled: true }),
        }
    }
}

/// Lookup from output name to the descriptors producing it, built once per build
#[derive(Debug, Default)]
pub struct OutputIndex {
    by_output: HashMap<String, Vec<usize>>,
}

impl OutputIndex {
    pub fn build(templates: &[TemplateDescriptor]) -> Self {
        let mut by_output: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, template) in templates.iter().enumerate() {
            if let Some(out) = &template.out {
                by_output.entry(out.clone()).or_default().push(position);
            }
        }
        Self { by_output }
    }

    /// Find the single descriptor producing `output`
    pub fn resolve(&self, output: &str) -> Result<usize, TemplateError> {
        match self.by_output.get(output).map(Vec::as_slice) {
            None | Some([]) => Err(TemplateError::MissingOriginal {
                output: output.to_string(),
            }),
            Some([position]) => Ok(*position),
            Some(positions) => Err(TemplateError::AmbiguousOriginal {
                output: output.to_string(),
                count: positions.len(),
            }),
        }
    }
}

/// A concrete, directly renderable descriptor and the options to render it with
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub descriptor: TemplateDescriptor,
    pub options: RenderOptions,
}

/// Expand a variant descriptor into a renderable copy of its original
///
/// Originals that are variants themselves are expanded first and transforms
/// accumulate along the chain.
pub fn expand(
    variant: &TemplateDescriptor,
    templates: &[TemplateDescriptor],
    index: &OutputIndex,
) -> Result<Expansion, TemplateError> {
    let mut chain = Vec::new();
    expand_chain(variant, templates, index, &mut chain)
}

fn expand_chain(
    variant: &TemplateDescriptor,
    templates: &[TemplateDescriptor],
    index: &OutputIndex,
    chain: &mut Vec<String>,
) -> Result<Expansion, TemplateError> {
    let Some(transform) = VariantTransform::of(variant.kind) else {
        let mut descriptor = variant.clone();
        descriptor.rendered = None;
        return Ok(Expansion {
            descriptor,
            options: RenderOptions::default(),
        });
    };

    if chain.contains(&variant.input) {
        chain.push(variant.input.clone());
        return Err(TemplateError::VariantCycle { chain: chain.clone() });
    }
    chain.push(variant.input.clone());

    let original = &templates[index.resolve(&variant.input)?];
    let Expansion {
        mut descriptor,
        mut options,
    } = expand_chain(original, templates, index, chain)?;

    if transform.dark {
        apply_dark_theme(&mut descriptor, variant.kind)?;
    }
    if transform.animations_disabled {
        options = options.without_animations();
    }
    descriptor.out = variant.out.clone();

    Ok(Expansion { descriptor, options })
}

fn apply_dark_theme(descriptor: &mut TemplateDescriptor, kind: TemplateKind) -> Result<(), TemplateError> {
    if descriptor.data.is_null() {
        descriptor.data = Value::Object(serde_json::Map::new());
    }
    match &mut descriptor.data {
        Value::Object(map) => {
            map.insert(DARK_THEME_KEY.to_string(), Value::String(DARK_THEME_VALUE.to_string()));
            Ok(())
        }
        _ => Err(TemplateError::InvalidVariantData {
            kind,
            input: descriptor.input.clone(),
        }),
    }
}
