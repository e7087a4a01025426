//! Build configuration and project layout
//!
//! `build-config.json` is either a bare array of descriptors or an object:
//!
//! ```json
//! {
//!   "version": "1.4.0",
//!   "outputFolder": "profile",
//!   "templates": [
//!     { "in": "banner.svg.hbs", "out": "banner.svg", "type": "SVG" }
//!   ]
//! }
//! ```
//!
//! `build-config.toml` holds the same object with `[[templates]]` tables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::report;
use crate::template::TemplateDescriptor;

/// Errors that can occur while loading a build configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read build config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse build config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse build config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file extension is neither `.json` nor `.toml`
    #[error("unsupported build config format: '{}'", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl ConfigError {
    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            ConfigError::Json(e) => {
                let offset = line_column_offset(source, e.line(), e.column());
                report(filename, source, offset, "invalid build config", &e.to_string())
            }
            ConfigError::Toml(e) => match e.span() {
                Some(span) => report(filename, source, span.start, "invalid build config", e.message()),
                None => self.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// Byte offset of a 1-based line and column
fn line_column_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfig {
    Templates(Vec<TemplateDescriptor>),
    Full(BuildConfig),
}

/// On-disk build configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "outputFolder")]
    pub output_folder: Option<String>,
    #[serde(default)]
    pub templates: Vec<TemplateDescriptor>,
}

impl BuildConfig {
    /// Load a configuration, choosing the format from the file extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Parse a JSON configuration: a descriptor array or a full object
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Ok(match raw {
            RawConfig::Templates(templates) => Self {
                templates,
                ..Self::default()
            },
            RawConfig::Full(config) => config,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Directories of one project, relative to its root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    pub out_dir: PathBuf,
    pub dist_dir: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ProjectLayout {
    /// The conventional layout under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            templates_dir: root.join("templates"),
            static_dir: root.join("static"),
            out_dir: root.join("out"),
            dist_dir: root.join("dist"),
            root,
        }
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Where the artifacts of `output_folder` are written
    pub fn out_folder(&self, output_folder: &str) -> PathBuf {
        self.out_dir.join(output_folder)
    }

    /// Where the publishing tree of `output_folder` is written
    pub fn dist_folder(&self, output_folder: &str) -> PathBuf {
        self.dist_dir.join(output_folder)
    }

    pub fn template_path(&self, input: &str) -> PathBuf {
        self.templates_dir.join(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_array_config() {
        let config = BuildConfig::from_json(
            r#"[
                { "in": "banner.svg.hbs", "out": "banner.svg", "type": "SVG", "data": {} },
                { "in": "banner.svg", "out": "banner-dark.svg", "type": "DarkSVGVarient" }
            ]"#,
        )
        .unwrap();
        assert_eq!(config.version, None);
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.templates[1].kind, TemplateKind::DarkSvgVariant);
    }

    #[test]
    fn test_object_config() {
        let config = BuildConfig::from_json(
            r#"{ "version": "3.1.0", "outputFolder": "site",
                 "templates": [{ "in": "readme.md.hbs", "out": "ReadMe.md", "type": "Markdown", "minify": false }] }"#,
        )
        .unwrap();
        assert_eq!(config.version.as_deref(), Some("3.1.0"));
        assert_eq!(config.output_folder.as_deref(), Some("site"));
        assert!(!config.templates[0].minify);
    }

    #[test]
    fn test_toml_config() {
        let config = BuildConfig::from_toml(
            r#"
version = "0.9.0"

[[templates]]
in = "banner.svg.hbs"
out = "banner.svg"
type = "SVG"

[templates.data]
name = "octocat"

[[templates]]
in = "banner.svg"
out = "banner-static.svg"
type = "AnimationDisabledSVG"
"#,
        )
        .unwrap();
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.templates[0].data["name"], "octocat");
        assert_eq!(config.templates[1].kind, TemplateKind::AnimationDisabledSvg);
        assert_eq!(config.templates[1].out.as_deref(), Some("banner-static.svg"));
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("build-config.json");
        std::fs::write(&json, "[]").unwrap();
        assert!(BuildConfig::from_file(&json).unwrap().templates.is_empty());

        let yaml = dir.path().join("build-config.yaml");
        std::fs::write(&yaml, "[]").unwrap();
        assert!(matches!(BuildConfig::from_file(&yaml), Err(ConfigError::UnsupportedFormat(_))));

        let missing = dir.path().join("nope.json");
        assert!(matches!(BuildConfig::from_file(&missing), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_json_error_report_points_into_source() {
        let source = "{\n  \"templates\": [\n    { \"in\": 3 }\n  ]\n}";
        let err = BuildConfig::from_json(source).unwrap_err();
        let formatted = err.format(source, "build-config.json");
        assert!(formatted.contains("build-config.json"));
        assert!(formatted.contains("invalid build config"));
    }

    #[test]
    fn test_line_column_offset() {
        assert_eq!(line_column_offset("ab\ncd", 2, 2), 4);
        assert_eq!(line_column_offset("ab", 9, 9), 2);
    }

    #[test]
    fn test_layout_folders() {
        let layout = ProjectLayout::new("/srv/site");
        assert_eq!(layout.out_folder("profile"), PathBuf::from("/srv/site/out/profile"));
        assert_eq!(layout.dist_folder(""), PathBuf::from("/srv/site/dist/"));
        assert_eq!(layout.template_path("a.hbs"), PathBuf::from("/srv/site/templates/a.hbs"));
    }

    #[test]
    fn test_layout_overridden_dirs() {
        let layout = ProjectLayout::new("/srv/site")
            .with_templates_dir("/srv/site/src/hbs")
            .with_static_dir("/srv/assets");
        assert_eq!(layout.template_path("a.hbs"), PathBuf::from("/srv/site/src/hbs/a.hbs"));
        assert_eq!(layout.static_dir, PathBuf::from("/srv/assets"));
        assert_eq!(layout.out_folder(""), PathBuf::from("/srv/site/out/"));
    }
}
