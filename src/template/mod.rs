//! Build descriptors and variant derivation
//!
//! A build is an ordered list of [`TemplateDescriptor`]s. Base descriptors name
//! a template file; variant descriptors name the *output* of another
//! descriptor and derive a themed or animation-free copy of it.
//!
//! # Example
//!
//! ```json
//! [
//!   { "in": "banner.svg.hbs", "out": "banner.svg", "type": "SVG", "data": {} },
//!   { "in": "banner.svg", "out": "banner-dark.svg", "type": "DarkSVGVariant" }
//! ]
//! ```

mod registry;
mod variant;

pub use registry::{TemplateDescriptor, TemplateError, TemplateKind, TemplateRegistry};
pub use variant::{expand, Expansion, OutputIndex, VariantTransform, DARK_THEME_KEY};
