//! Build errors and source-annotated diagnostics

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::compiler::CompileError;
use crate::config::ConfigError;
use crate::pages::PublishError;
use crate::renderer::SceneError;
use crate::stats::StatsError;
use crate::template::{TemplateError, TemplateKind};

/// Errors that stop a build
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("failed to read template '{}': {source}", path.display())]
    ReadTemplate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The toolchain rejected a rendered artifact
    #[error("Invalid {kind} template: '{input}'")]
    Invalid { kind: TemplateKind, input: String },
}

/// Render a single-label diagnostic pointing at `offset` in `source`
///
/// `offset` is a byte offset and is clamped to the source.
pub(crate) fn report(filename: &str, source: &str, offset: usize, title: &str, message: &str) -> String {
    let chars = source.chars().count();
    if chars == 0 {
        return format!("{}: {}: {}", filename, title, message);
    }
    let start = source
        .char_indices()
        .take_while(|(index, _)| *index < offset)
        .count()
        .min(chars - 1);
    let end = start + 1;

    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, filename, start)
        .with_message(title)
        .with_label(
            Label::new((filename, start..end))
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);

    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("{}: {}: {}", filename, title, message),
    }
}
