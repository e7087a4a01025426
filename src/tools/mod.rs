//! Validators and minifiers for generated artifacts

pub mod markdown;
pub mod svg;

use async_trait::async_trait;

use crate::console::Console;
use crate::template::TemplateKind;

/// Validates and minifies rendered artifacts
///
/// Neither operation fails: problems are reported to the console, `validate`
/// answers `false` and `minify` hands back its input.
#[async_trait(?Send)]
pub trait Toolchain {
    async fn validate(&self, kind: TemplateKind, text: &str, console: &dyn Console) -> bool;

    async fn minify(&self, kind: TemplateKind, text: &str, debug: bool, console: &dyn Console) -> String;
}

/// Default toolchain built on [`svg`] and [`markdown`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardToolchain;

#[async_trait(?Send)]
impl Toolchain for StandardToolchain {
    async fn validate(&self, kind: TemplateKind, text: &str, console: &dyn Console) -> bool {
        if kind.is_svg() {
            match svg::validate(text) {
                Ok(()) => true,
                Err(e) => {
                    console.error(&format!("Invalid SVG: {}", e));
                    false
                }
            }
        } else {
            match markdown::validate(text) {
                Ok(()) => true,
                Err(problems) => {
                    console.error(&format!("Invalid Markdown: {}", problems.join("; ")));
                    false
                }
            }
        }
    }

    async fn minify(&self, kind: TemplateKind, text: &str, debug: bool, console: &dyn Console) -> String {
        if !kind.is_svg() {
            return markdown::minify(text);
        }
        match svg::minify(text, debug) {
            Ok(minified) => minified,
            Err(e) => {
                console.error(&format!("Error while minifying SVG: {}", e));
                text.to_string()
            }
        }
    }
}
