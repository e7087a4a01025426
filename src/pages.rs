//! Static publishing tree generated from the build's artifacts

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ProjectLayout;
use crate::template::{TemplateDescriptor, TemplateKind};
use crate::tools::markdown;

/// Artifact whose HTML page is also the site's `index.html`
pub const INDEX_SOURCE: &str = "ReadMe.md";

#[derive(Debug, Error)]
pub enum PublishError {
    /// A descriptor's artifact was not found in the output directory
    #[error("artifact not found: '{}'", .0.display())]
    MissingArtifact(PathBuf),

    #[error("failed to publish '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Publishes finished artifacts
#[async_trait(?Send)]
pub trait Publisher {
    /// Publish the artifacts of `templates` found under `layout`'s out folder
    async fn publish(
        &self,
        templates: &[TemplateDescriptor],
        layout: &ProjectLayout,
        output_folder: &str,
    ) -> Result<(), PublishError>;
}

/// Writes a browsable copy of the artifacts to `dist/<outputFolder>/`
///
/// Markdown artifacts become HTML pages next to their name with an `.html`
/// extension. Everything else is copied unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagesPublisher;

#[async_trait(?Send)]
impl Publisher for PagesPublisher {
    async fn publish(
        &self,
        templates: &[TemplateDescriptor],
        layout: &ProjectLayout,
        output_folder: &str,
    ) -> Result<(), PublishError> {
        let out = layout.out_folder(output_folder);
        let dist = layout.dist_folder(output_folder);
        fs::create_dir_all(&dist).map_err(|source| PublishError::Io {
            path: dist.clone(),
            source,
        })?;

        for template in templates {
            let Some(name) = &template.out else {
                continue;
            };
            let artifact = out.join(name);
            if !artifact.is_file() {
                return Err(PublishError::MissingArtifact(artifact));
            }

            if template.kind == TemplateKind::Markdown {
                let text = read(&artifact)?;
                let page = html_page(name, &markdown::to_html(&text));
                write(&dist.join(name).with_extension("html"), page.as_bytes())?;
                if name.eq_ignore_ascii_case(INDEX_SOURCE) {
                    write(&dist.join("index.html"), page.as_bytes())?;
                }
            } else {
                let target = dist.join(name);
                copy(&artifact, &target)?;
            }
            log::debug!("published '{}'", name);
        }
        Ok(())
    }
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body class=\"markdown-body\">\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn read(path: &Path) -> Result<String, PublishError> {
    fs::read_to_string(path).map_err(|source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &[u8]) -> Result<(), PublishError> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn copy(from: &Path, to: &Path) -> Result<(), PublishError> {
    ensure_parent(to)?;
    fs::copy(from, to).map(drop).map_err(|source| PublishError::Io {
        path: to.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), PublishError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| PublishError::Io {
            path: parent.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}
