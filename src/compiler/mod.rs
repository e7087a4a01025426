//! Template compiler with deferred helper values
//!
//! Templates are Handlebars sources. Evaluation itself is synchronous; helpers
//! that need asynchronous data return deferred handles which are resolved
//! before [`Compiler::compile`] returns.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use futures::executor::block_on;
//! use profile_forge::compiler::{BuildInfo, Compiler};
//! use profile_forge::stats::StatsProvider;
//!
//! let build = BuildInfo::new("1.2.0", Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap());
//! let compiler = Compiler::new(build, "static", Arc::new(StatsProvider::default()));
//! let text = block_on(compiler.compile(
//!     "v{{build_info \"version\"}} on {{build_info \"date-month\"}}",
//!     &serde_json::Value::Null,
//! ))
//! .unwrap();
//! assert_eq!(text, "v1.2.0 on 3/7");
//! ```

pub mod deferred;
pub mod helpers;

use std::path::PathBuf;
use std::string::FromUtf8Error;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

use crate::stats::{StatsError, StatsProvider};
use deferred::DeferredPass;

/// Errors that can occur while compiling a template
#[derive(Debug, Error)]
pub enum CompileError {
    /// Template syntax or helper failure
    #[error("template error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// `defer` was given something other than a deferred handle
    #[error("not a deferred value: {0}")]
    NotDeferred(String),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("compiled output is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}

/// Build metadata exposed through `build_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub time: DateTime<Utc>,
}

impl BuildInfo {
    pub fn new(version: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            time,
        }
    }
}

/// Compiles templates against the helpers of one build
#[derive(Clone)]
pub struct Compiler {
    build: BuildInfo,
    static_dir: PathBuf,
    stats: Arc<StatsProvider>,
}

impl Compiler {
    pub fn new(build: BuildInfo, static_dir: impl Into<PathBuf>, stats: Arc<StatsProvider>) -> Self {
        Self {
            build,
            static_dir: static_dir.into(),
            stats,
        }
    }

    /// Evaluate `source` with `data` and resolve every deferred value it placed
    pub async fn compile(&self, source: &str, data: &Value) -> Result<String, CompileError> {
        let pass = DeferredPass::new();
        {
            let mut registry = Handlebars::new();
            registry.register_escape_fn(handlebars::no_escape);
            helpers::register(&mut registry, &pass, &self.build, &self.static_dir, &self.stats);

            if let Err(e) = registry.render_template_to_write(source, data, pass.writer()) {
                return Err(pass.take_error().unwrap_or(CompileError::Render(e)));
            }
        }
        pass.resolve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{GithubStats, StatsSource};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    struct FixedStats;

    #[async_trait]
    impl StatsSource for FixedStats {
        async fn fetch(&self, username: &str) -> Result<GithubStats, StatsError> {
            let mut stats = GithubStats::placeholder(username);
            stats.stars = username.len() as u64;
            stats.commits = 1234;
            Ok(stats)
        }

        fn requires_credentials(&self) -> bool {
            false
        }
    }

    fn compiler_in(static_dir: impl Into<PathBuf>) -> Compiler {
        let time = Utc.with_ymd_and_hms(2024, 11, 5, 8, 30, 0).unwrap();
        Compiler::new(
            BuildInfo::new("2.0.1", time),
            static_dir,
            Arc::new(StatsProvider::new(Arc::new(FixedStats))),
        )
    }

    fn compile(source: &str, data: Value) -> Result<String, CompileError> {
        block_on(compiler_in("static").compile(source, &data))
    }

    #[test]
    fn test_plain_template_is_not_escaped() {
        let out = compile("title: {{title}}", json!({ "title": "<b>&</b>" })).unwrap();
        assert_eq!(out, "title: <b>&</b>");
    }

    #[test]
    fn test_build_info() {
        let out = compile(
            r#"{{build_info "version"}}|{{build_info "date"}}|{{build_info "date-month"}}|{{build_info "year"}}|{{build_info "time"}}"#,
            Value::Null,
        )
        .unwrap();
        assert_eq!(out, "2.0.1|2024-11-05|11/5|2024|2024-11-05T08:30:00.000Z");
    }

    #[test]
    fn test_build_info_unknown_type() {
        let err = compile(r#"{{build_info "weekday"}}"#, Value::Null).unwrap_err();
        assert!(err.to_string().contains("build_info: not implemented: weekday"));
    }

    #[test]
    fn test_if_cond_branches() {
        let template = r#"{{#ifCond count ">" 3}}many{{else}}few{{/ifCond}}"#;
        assert_eq!(compile(template, json!({ "count": 5 })).unwrap(), "many");
        assert_eq!(compile(template, json!({ "count": 2 })).unwrap(), "few");
    }

    #[test]
    fn test_if_cond_unknown_operator_takes_else() {
        let template = r#"{{#ifCond 1 "<=>" 1}}yes{{else}}no{{/ifCond}}"#;
        assert_eq!(compile(template, Value::Null).unwrap(), "no");
    }

    #[test]
    fn test_embed_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dot.png"), [1u8, 2, 3]).unwrap();
        fs::write(dir.path().join("blob.unknownext"), b"hi").unwrap();
        let compiler = compiler_in(dir.path());

        let png = block_on(compiler.compile(r#"{{embed "dot.png"}}"#, &Value::Null)).unwrap();
        assert_eq!(png, "data:image/png;base64,AQID");
        let blob = block_on(compiler.compile(r#"{{embed "blob.unknownext"}}"#, &Value::Null)).unwrap();
        assert_eq!(blob, "data:application/octet-stream;base64,aGk=");
    }

    #[test]
    fn test_embed_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = block_on(compiler_in(dir.path()).compile(r#"{{embed "nope.svg"}}"#, &Value::Null)).unwrap_err();
        assert!(err.to_string().contains("embed: failed to read"));
    }

    #[test]
    fn test_deferred_values_resolve_in_position() {
        let template = r#"a={{defer (fetch_github_stats "ab" "stars")}} b={{fetch_github_stats "abc" "stars"}} c={{await (fetch_github_stats "abcd" "commits")}}"#;
        let out = compile(template, Value::Null).unwrap();
        assert_eq!(out, "a=2 b=3 c=1234");
        assert!(!out.contains("$deferred"));
    }

    #[test]
    fn test_deferred_inside_each() {
        let out = compile(
            r#"{{#each users}}[{{this}}:{{fetch_github_stats this "stars"}}]{{/each}}"#,
            json!({ "users": ["a", "bb", "ccc"] }),
        )
        .unwrap();
        assert_eq!(out, "[a:1][bb:2][ccc:3]");
    }

    #[test]
    fn test_defer_rejects_plain_values() {
        let err = compile(r#"{{defer name}}"#, json!({ "name": "octocat" })).unwrap_err();
        assert!(matches!(err, CompileError::NotDeferred(_)));
        assert_eq!(err.to_string(), r#"not a deferred value: "octocat""#);
    }

    #[test]
    fn test_data_shaped_like_a_handle_is_not_deferred() {
        let template = r#"{{fetch_github_stats "ab" "stars"}}|{{defer forged}}"#;
        let err = compile(template, json!({ "forged": { "$deferred": 0 } })).unwrap_err();
        assert!(matches!(err, CompileError::NotDeferred(_)));
        assert!(err.to_string().contains(r#"{"$deferred":0}"#));
    }

    #[test]
    fn test_missing_stat_fails() {
        let err = compile(r#"{{fetch_github_stats "a" "karma"}}"#, Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "missing github stat: 'karma'");
    }

    #[test]
    fn test_template_syntax_error() {
        let err = compile("{{#if}}", Value::Null).unwrap_err();
        assert!(matches!(err, CompileError::Render(_)));
    }

    #[test]
    fn test_passes_do_not_share_state() {
        let compiler = compiler_in("static");
        let first = block_on(compiler.compile(r#"{{fetch_github_stats "a" "stars"}}"#, &Value::Null)).unwrap();
        let second = block_on(compiler.compile("plain", &Value::Null)).unwrap();
        assert_eq!(first, "1");
        assert_eq!(second, "plain");
    }
}
