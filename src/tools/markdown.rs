//! Markdown linting, normalization and HTML conversion

use std::collections::BTreeSet;

use pulldown_cmark::{html, BrokenLink, Options, Parser};

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("```") || line.starts_with("~~~")
}

/// Lines paired with whether they sit inside a fenced code block
fn classify(markdown: &str) -> Vec<(&str, bool)> {
    let mut in_fence = false;
    markdown
        .lines()
        .map(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                (line, false)
            } else {
                (line, in_fence)
            }
        })
        .collect()
}

fn is_thematic_break(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3 && marks.iter().all(|c| *c == marks[0]) && matches!(marks[0], '*' | '-' | '_')
}

/// Lint a document, returning every problem found
pub fn validate(markdown: &str) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if !markdown.is_empty() && !markdown.ends_with('\n') {
        problems.push("missing final newline".to_string());
    }

    let lines = classify(markdown);
    let fences = lines.iter().filter(|(line, _)| is_fence(line)).count();
    if fences % 2 != 0 {
        problems.push("unclosed code fence".to_string());
    }

    let markers: BTreeSet<char> = lines
        .iter()
        .filter(|(line, fenced)| !fenced && !is_thematic_break(line))
        .filter_map(|(line, _)| {
            let mut chars = line.trim_start().chars();
            match (chars.next(), chars.next()) {
                (Some(marker @ ('-' | '*' | '+')), Some(' ')) => Some(marker),
                _ => None,
            }
        })
        .collect();
    if markers.len() > 1 {
        let markers: Vec<String> = markers.iter().map(|m| format!("'{}'", m)).collect();
        problems.push(format!("inconsistent list markers: {}", markers.join(", ")));
    }

    let mut undefined = Vec::new();
    let parser = Parser::new_with_broken_link_callback(
        markdown,
        options(),
        Some(|link: BrokenLink<'_>| {
            undefined.push(link.reference.to_string());
            None
        }),
    );
    parser.for_each(drop);
    for reference in undefined {
        problems.push(format!("undefined reference: [{}]", reference));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Normalize whitespace outside code blocks
///
/// Trailing whitespace is removed except for hard breaks, which become two
/// spaces. Runs of blank lines collapse into one and the document ends with
/// exactly one newline.
pub fn minify(markdown: &str) -> String {
    let lines = classify(markdown);
    let mut out: Vec<String> = Vec::with_capacity(lines.len());

    for (index, (line, fenced)) in lines.iter().enumerate() {
        if *fenced {
            out.push(line.to_string());
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if out.last().is_some_and(|last| !last.is_empty()) {
                out.push(String::new());
            }
            continue;
        }
        let next_is_text = lines
            .get(index + 1)
            .is_some_and(|(next, _)| !next.trim().is_empty());
        let hard_break = line.ends_with("  ") && next_is_text;
        out.push(if hard_break {
            format!("{}  ", trimmed)
        } else {
            trimmed.to_string()
        });
    }

    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Render a document to HTML
pub fn to_html(markdown: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(markdown, options()));
    out
}
