//! Template helpers
//!
//! `ifCond` is a block helper with JavaScript comparison semantics, `embed`
//! inlines a static asset as a data URI, `build_info` exposes build metadata,
//! `fetch_github_stats` produces a deferred statistic and `defer` places a
//! deferred value in the output.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Datelike;
use futures::{FutureExt, TryFutureExt};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError, Renderable,
    ScopedJson,
};
use serde_json::Value;

use super::deferred::DeferredPass;
use super::{BuildInfo, CompileError};
use crate::stats::StatsProvider;

/// Register every helper on `registry`, bound to one compilation pass
pub(super) fn register(
    registry: &mut Handlebars<'_>,
    pass: &DeferredPass,
    build: &BuildInfo,
    static_dir: &Path,
    stats: &Arc<StatsProvider>,
) {
    registry.register_helper("ifCond", Box::new(IfCond));
    registry.register_helper(
        "embed",
        Box::new(Embed {
            static_dir: static_dir.to_path_buf(),
        }),
    );
    registry.register_helper("build_info", Box::new(BuildInfoHelper { build: build.clone() }));
    registry.register_helper(
        "fetch_github_stats",
        Box::new(FetchGithubStats {
            pass: pass.clone(),
            stats: Arc::clone(stats),
        }),
    );
    registry.register_helper("defer", Box::new(Defer { pass: pass.clone() }));
    registry.register_helper("await", Box::new(Defer { pass: pass.clone() }));
}

fn param<'a>(h: &'a Helper<'_, '_>, index: usize) -> &'a Value {
    h.param(index).map(|p| p.value()).unwrap_or(&Value::Null)
}

fn string_param(h: &Helper<'_, '_>, index: usize) -> Result<String, RenderError> {
    match param(h, index) {
        Value::String(s) => Ok(s.clone()),
        other => Err(RenderError::new(format!(
            "{}: parameter {} must be a string, got {}",
            h.name(),
            index + 1,
            other
        ))),
    }
}

/// `{{#ifCond left "op" right}}...{{else}}...{{/ifCond}}`
pub struct IfCond;

impl HelperDef for IfCond {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let holds = param(h, 1)
            .as_str()
            .is_some_and(|op| compare(param(h, 0), op, param(h, 2)));
        let branch = if holds { h.template() } else { h.inverse() };
        match branch {
            Some(template) => template.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

/// Evaluate `left op right`; unknown operators are false
pub fn compare(left: &Value, op: &str, right: &Value) -> bool {
    match op {
        "==" => loose_eq(left, right),
        "===" => strict_eq(left, right),
        "!=" => !loose_eq(left, right),
        "!==" => !strict_eq(left, right),
        "<" => relational(left, right).is_some_and(Ordering::is_lt),
        "<=" => relational(left, right).is_some_and(Ordering::is_le),
        ">" => relational(left, right).is_some_and(Ordering::is_gt),
        ">=" => relational(left, right).is_some_and(Ordering::is_ge),
        "&&" => truthy(left) && truthy(right),
        "||" => truthy(left) || truthy(right),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => to_number(left) == to_number(right),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            to_number(left) == to_number(right)
        }
        (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
            loose_eq(&Value::String(to_primitive(left)), right)
        }
        (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
            loose_eq(left, &Value::String(to_primitive(right)))
        }
        _ => strict_eq(left, right),
    }
}

/// Compare two strings lexically, anything else numerically
fn relational(left: &Value, right: &Value) -> Option<Ordering> {
    let primitive = |value: &Value| match value {
        Value::Array(_) | Value::Object(_) => Value::String(to_primitive(value)),
        other => other.clone(),
    };
    match (primitive(left), primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => to_number(&a).partial_cmp(&to_number(&b)),
    }
}

fn to_primitive(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_primitive).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) => to_number(&Value::String(to_primitive(value))),
        Value::Object(_) => f64::NAN,
    }
}

/// `{{embed "avatar.png"}}` reads `static/avatar.png` into a data URI
pub struct Embed {
    static_dir: PathBuf,
}

impl HelperDef for Embed {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let file = string_param(h, 0)?;
        let path = self.static_dir.join(&file);
        let content = fs::read(&path)
            .map_err(|e| RenderError::new(format!("embed: failed to read '{}': {}", path.display(), e)))?;
        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        Ok(ScopedJson::Derived(Value::String(format!(
            "data:{};base64,{}",
            mime.essence_str(),
            STANDARD.encode(content)
        ))))
    }
}

/// `{{build_info "version"}}`
pub struct BuildInfoHelper {
    build: BuildInfo,
}

impl HelperDef for BuildInfoHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let kind = string_param(h, 0)?;
        let time = self.build.time;
        let value = match kind.as_str() {
            "version" => Value::String(self.build.version.clone()),
            "time" => Value::String(time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            "date" => Value::String(time.format("%Y-%m-%d").to_string()),
            "date-month" => Value::String(format!("{}/{}", time.month(), time.day())),
            "year" => Value::from(time.year()),
            other => return Err(RenderError::new(format!("build_info: not implemented: {}", other))),
        };
        Ok(ScopedJson::Derived(value))
    }
}

/// `{{fetch_github_stats "octocat" "stars"}}` yields a deferred statistic
pub struct FetchGithubStats {
    pass: DeferredPass,
    stats: Arc<StatsProvider>,
}

impl FetchGithubStats {
    fn enqueue(&self, h: &Helper<'_, '_>) -> Result<Value, RenderError> {
        let username = string_param(h, 0)?;
        let stat = string_param(h, 1)?;
        let value = self.stats.stat(&username, &stat).map_err(CompileError::from).boxed();
        Ok(self.pass.handle(self.pass.enqueue(value)))
    }
}

impl HelperDef for FetchGithubStats {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        self.enqueue(h).map(ScopedJson::Derived)
    }

    /// In output position the value is placed directly
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> HelperResult {
        let value = self.enqueue(h)?;
        place(&self.pass, &value)
    }
}

/// `{{defer (some_async_helper ...)}}`
pub struct Defer {
    pass: DeferredPass,
}

impl HelperDef for Defer {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        Err(RenderError::new(format!("{} must be used in output position", h.name())))
    }

    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> HelperResult {
        place(&self.pass, param(h, 0))
    }
}

fn place(pass: &DeferredPass, value: &Value) -> HelperResult {
    let placed = match pass.ticket_of(value) {
        Some(ticket) => pass.push_pending(ticket),
        None => Err(CompileError::NotDeferred(value.to_string())),
    };
    placed.map_err(|e| {
        let message = e.to_string();
        pass.record_error(e);
        RenderError::new(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_equality() {
        assert!(compare(&json!(1), "==", &json!("1")));
        assert!(compare(&json!(true), "==", &json!(1)));
        assert!(compare(&json!(0), "==", &json!("")));
        assert!(compare(&json!([1, 2]), "==", &json!("1,2")));
        assert!(!compare(&json!(null), "==", &json!(0)));
        assert!(compare(&json!(1), "!=", &json!(2)));
    }

    #[test]
    fn test_strict_equality() {
        assert!(compare(&json!(1), "===", &json!(1.0)));
        assert!(!compare(&json!(1), "===", &json!("1")));
        assert!(compare(&json!(1), "!==", &json!("1")));
    }

    #[test]
    fn test_relational() {
        assert!(compare(&json!(2), "<", &json!(10)));
        assert!(compare(&json!("10"), "<", &json!("2")));
        assert!(compare(&json!("10"), ">", &json!(2)));
        assert!(compare(&json!(3), "<=", &json!(3)));
        assert!(!compare(&json!("abc"), "<", &json!(1)));
        assert!(!compare(&json!("abc"), ">=", &json!(1)));
    }

    #[test]
    fn test_logical() {
        assert!(compare(&json!("x"), "&&", &json!(1)));
        assert!(!compare(&json!("x"), "&&", &json!(0)));
        assert!(compare(&json!(null), "||", &json!([])));
        assert!(!compare(&json!(""), "||", &json!(false)));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        assert!(!compare(&json!(1), "<>", &json!(1)));
        assert!(!compare(&json!(1), "", &json!(1)));
    }
}
