//! SVG validation and minification

use crate::renderer::document::{Document, NodeKind};
use crate::renderer::markup::{parse_svg, MarkupError};

/// Elements whose whitespace-only text is significant
const TEXT_TAGS: &[&str] = &["text", "tspan", "textPath", "title", "desc"];

/// Check that the markup is well-formed and rooted at `<svg>`
pub fn validate(svg: &str) -> Result<(), MarkupError> {
    parse_svg(svg).map(|_| ())
}

/// Minify SVG markup
///
/// Comments and insignificant whitespace are dropped and every `<style>`
/// element is merged into a single one at the end of the root. With `debug`
/// the output is indented and stylesheets are kept as written.
pub fn minify(svg: &str, debug: bool) -> Result<String, MarkupError> {
    let mut doc = parse_svg(svg)?;
    drop_blank_text(&mut doc);
    merge_styles(&mut doc, debug);
    Ok(doc.to_markup(debug))
}

fn drop_blank_text(doc: &mut Document) {
    let root = doc.root();
    let blank: Vec<_> = doc
        .descendants(root)
        .into_iter()
        .filter(|id| doc.tag(*id).is_none())
        .filter(|id| {
            let parent_keeps = doc
                .parent(*id)
                .and_then(|parent| doc.tag(parent))
                .is_some_and(|tag| TEXT_TAGS.contains(&tag));
            !parent_keeps && matches!(doc.kind(*id), NodeKind::Text(text) if text.trim().is_empty())
        })
        .collect();
    for id in blank {
        doc.detach(id);
    }
}

fn merge_styles(doc: &mut Document, debug: bool) {
    let root = doc.root();
    let styles: Vec<_> = doc
        .descendants(root)
        .into_iter()
        .filter(|id| doc.tag(*id) == Some("style"))
        .collect();
    if styles.is_empty() {
        return;
    }

    let combined = styles
        .iter()
        .map(|id| doc.text_content(*id))
        .collect::<Vec<_>>()
        .join("\n");
    for id in styles {
        doc.detach(id);
    }

    let css = if debug { combined.trim().to_string() } else { compact_css(&combined) };
    if !css.is_empty() {
        let style = doc.append_element(root, "style");
        doc.append_text(style, &css);
    }
}

/// Remove comments and whitespace that does not change a stylesheet's meaning
pub fn compact_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut pending_space = false;
    // One entry per open block: whether it holds declarations rather than rules
    let mut blocks: Vec<bool> = Vec::new();
    let mut prelude = 0;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
                pending_space = true;
            }
            '"' | '\'' => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
                let mut escaped = false;
                for inner in chars.by_ref() {
                    out.push(inner);
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            ':' if blocks.last() != Some(&true) => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
            }
            '{' | '}' | ';' | ':' | ',' | '>' => {
                pending_space = false;
                match c {
                    '{' => blocks.push(!holds_rules(&out[prelude..])),
                    '}' => {
                        blocks.pop();
                        if out.ends_with(';') {
                            out.pop();
                        }
                    }
                    _ => {}
                }
                out.push(c);
                if matches!(c, '{' | '}' | ';') {
                    prelude = out.len();
                }
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
            }
            c => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}

/// Conditional group rules contain style rules instead of declarations
fn holds_rules(prelude: &str) -> bool {
    let prelude = prelude.trim_start();
    ["@media", "@supports", "@container", "@layer", "@document", "@keyframes"]
        .iter()
        .any(|rule| prelude.starts_with(rule))
}

fn flush_space(out: &mut String, pending_space: &mut bool) {
    if *pending_space && !out.is_empty() && !out.ends_with(['{', '}', ';', ':', ',', '>']) {
        out.push(' ');
    }
    *pending_space = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate() {
        assert!(validate(r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#).is_ok());
        assert!(validate("<svg><rect></svg>").is_err());
        assert!(validate("<html/>").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn test_minify_drops_comments_and_whitespace() {
        let input = "<svg>\n  <!-- banner -->\n  <g>\n    <rect width=\"1\"/>\n  </g>\n  <text> keep  me </text>\n</svg>\n";
        assert_eq!(
            minify(input, false).unwrap(),
            r#"<svg><g><rect width="1"/></g><text> keep  me </text></svg>"#
        );
    }

    #[test]
    fn test_minify_merges_styles_at_end() {
        let input = "<svg><style>\n  .a { fill: red; }\n</style><g><style>/* x */ .b > .c { stroke : blue ; }</style><rect/></g></svg>";
        insta::assert_snapshot!(
            minify(input, false).unwrap(),
            @"<svg><g><rect/></g><style>.a{fill:red}.b>.c{stroke:blue}</style></svg>"
        );
    }

    #[test]
    fn test_minify_debug_is_pretty() {
        let input = "<svg><g><rect/></g><style> .a { fill: red; } </style></svg>";
        assert_eq!(
            minify(input, true).unwrap(),
            "<svg>\n  <g>\n    <rect/>\n  </g>\n  <style>.a { fill: red; }</style>\n</svg>"
        );
    }

    #[test]
    fn test_minify_rejects_broken_markup() {
        assert!(minify("<svg><g></svg>", false).is_err());
    }

    #[test]
    fn test_compact_css_keeps_strings_and_selectors() {
        assert_eq!(
            compact_css(".a  .b , .c {\n  font-family: \"Fira  Code\", monospace;\n}\n"),
            r#".a .b,.c{font-family:"Fira  Code",monospace}"#
        );
        assert_eq!(compact_css("@media (max-width: 600px) { .a { x: 1 } }"), "@media (max-width:600px){.a{x:1}}");
    }

    #[test]
    fn test_compact_css_keeps_descendant_pseudo_classes() {
        assert_eq!(compact_css(".a :hover{fill:red}"), ".a :hover{fill:red}");
        assert_eq!(compact_css(".a:hover { fill : red }"), ".a:hover{fill:red}");
        assert_eq!(
            compact_css("@media (min-width: 10px) {\n  .card  :first-child { stroke : blue; }\n}"),
            "@media (min-width:10px){.card :first-child{stroke:blue}}"
        );
    }
}
