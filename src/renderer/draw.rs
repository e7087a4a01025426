//! Drawing semantics of the synchronous operations

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::document::{format_number, Document, NodeId};
use super::interpreter::SceneError;
use super::methods::{scalar_string, Arg, Method};

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Attribute names that carry one axis of an element's geometry
struct AxisAttrs {
    edge: &'static str,
    center: &'static str,
    size: &'static str,
    radius: &'static str,
    first: &'static str,
    second: &'static str,
}

impl Axis {
    fn attrs(self) -> AxisAttrs {
        match self {
            Axis::X => AxisAttrs {
                edge: "x",
                center: "cx",
                size: "width",
                radius: "rx",
                first: "x1",
                second: "x2",
            },
            Axis::Y => AxisAttrs {
                edge: "y",
                center: "cy",
                size: "height",
                radius: "ry",
                first: "y1",
                second: "y2",
            },
        }
    }
}

#[derive(Clone, Copy)]
enum Anchor {
    Edge,
    Center,
}

/// Apply a synchronous operation to `target`, returning the node calls chain onto
pub(super) fn apply(
    doc: &mut Document,
    target: NodeId,
    method: Method,
    name: &str,
    args: &[Arg],
) -> Result<NodeId, SceneError> {
    let node = match method {
        Method::Rect => {
            let id = doc.append_element(target, "rect");
            set_opt(doc, id, "width", args.first());
            set_opt(doc, id, "height", args.get(1));
            id
        }
        Method::Circle => {
            let id = doc.append_element(target, "circle");
            if let Some(diameter) = args.first() {
                let r = number(name, diameter)? / 2.0;
                for attr in ["r", "cx", "cy"] {
                    doc.set_attr(id, attr, &format_number(r));
                }
            }
            id
        }
        Method::Ellipse => {
            let id = doc.append_element(target, "ellipse");
            if let Some(width) = args.first() {
                let rx = number(name, width)? / 2.0;
                let ry = match args.get(1) {
                    Some(height) => number(name, height)? / 2.0,
                    None => rx,
                };
                doc.set_attr(id, "rx", &format_number(rx));
                doc.set_attr(id, "ry", &format_number(ry));
                doc.set_attr(id, "cx", &format_number(rx));
                doc.set_attr(id, "cy", &format_number(ry));
            }
            id
        }
        Method::Line => {
            let id = doc.append_element(target, "line");
            for (attr, arg) in ["x1", "y1", "x2", "y2"].into_iter().zip(args) {
                set_arg(doc, id, attr, arg);
            }
            id
        }
        Method::Polyline | Method::Polygon => {
            let tag = if method == Method::Polyline { "polyline" } else { "polygon" };
            let id = doc.append_element(target, tag);
            set_opt(doc, id, "points", args.first());
            id
        }
        Method::Path => {
            let id = doc.append_element(target, "path");
            set_opt(doc, id, "d", args.first());
            id
        }
        Method::Image => {
            let id = doc.append_element(target, "image");
            set_opt(doc, id, "href", args.first());
            set_opt(doc, id, "width", args.get(1));
            set_opt(doc, id, "height", args.get(2));
            id
        }
        Method::Text => {
            let id = doc.append_element(target, "text");
            if let Some(content) = args.first().and_then(Arg::as_str) {
                write_text(doc, id, content);
            }
            id
        }
        Method::Group => doc.append_element(target, "g"),
        Method::Nested => doc.append_element(target, "svg"),
        Method::Defs => defs(doc),
        Method::Symbol => {
            let defs = defs(doc);
            doc.append_element(defs, "symbol")
        }
        Method::Use => {
            let id = doc.append_element(target, "use");
            let href = text(name, args.first())?;
            let href = if href.starts_with('#') { href.to_string() } else { format!("#{}", href) };
            doc.set_attr(id, "href", &href);
            id
        }
        Method::Link => {
            let id = doc.append_element(target, "a");
            doc.set_attr(id, "href", text(name, args.first())?);
            id
        }
        Method::Style => {
            let id = doc.append_element(target, "style");
            doc.append_text(id, text(name, args.first())?);
            id
        }
        Method::Element => {
            let id = doc.append_element(target, text(name, args.first())?);
            if let Some(Arg::Map(attrs)) = args.get(1) {
                set_map(doc, id, attrs, |key| key.to_string());
            }
            id
        }
        Method::Import => return Err(SceneError::invalid(name, "import must be awaited")),

        Method::Plain => {
            doc.clear(target);
            if let Some(content) = args.first().and_then(Arg::as_str) {
                doc.append_text(target, content);
            }
            target
        }
        Method::Tspan => {
            let id = doc.append_element(target, "tspan");
            if let Some(content) = args.first().and_then(Arg::as_str) {
                doc.append_text(id, content);
            }
            id
        }

        Method::Attr => {
            match args.first() {
                Some(Arg::Map(attrs)) => set_map(doc, target, attrs, |key| key.to_string()),
                Some(attr) => {
                    let attr = text(name, Some(attr))?;
                    let value = args
                        .get(1)
                        .ok_or_else(|| SceneError::invalid(name, format!("missing value for '{}'", attr)))?;
                    set_arg(doc, target, attr, value);
                }
                None => return Err(SceneError::invalid(name, "missing attribute")),
            }
            target
        }
        Method::Id => {
            doc.set_attr(target, "id", text(name, args.first())?);
            target
        }
        Method::AddClass => {
            let class = text(name, args.first())?;
            let mut classes: Vec<String> = doc
                .attr(target, "class")
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
            doc.set_attr(target, "class", &classes.join(" "));
            target
        }
        Method::Css => {
            let mut style = parse_style(doc.attr(target, "style").unwrap_or_default());
            match args.first() {
                Some(Arg::Map(rules)) => {
                    for (property, value) in rules {
                        match scalar_string(value) {
                            Some(value) => style.insert(property.clone(), value),
                            None => style.shift_remove(property),
                        };
                    }
                }
                Some(property) => {
                    let property = text(name, Some(property))?;
                    let value = text(name, args.get(1))?;
                    style.insert(property.to_string(), value.to_string());
                }
                None => {}
            }
            let css = style
                .iter()
                .map(|(property, value)| format!("{}:{}", property, value))
                .collect::<Vec<_>>()
                .join(";");
            doc.set_attr(target, "style", &css);
            target
        }
        Method::Opacity => {
            set_opt(doc, target, "opacity", args.first());
            target
        }
        Method::Fill | Method::Stroke => {
            let prefix = if method == Method::Fill { "fill" } else { "stroke" };
            match args.first() {
                Some(Arg::Map(paint)) => set_map(doc, target, paint, |key| match key {
                    "color" => prefix.to_string(),
                    other => format!("{}-{}", prefix, other),
                }),
                other => set_opt(doc, target, prefix, other),
            }
            target
        }

        Method::Move => {
            position(doc, target, Axis::X, Anchor::Edge, name, &args[0])?;
            position(doc, target, Axis::Y, Anchor::Edge, name, &args[1])?;
            target
        }
        Method::X => {
            position(doc, target, Axis::X, Anchor::Edge, name, &args[0])?;
            target
        }
        Method::Y => {
            position(doc, target, Axis::Y, Anchor::Edge, name, &args[0])?;
            target
        }
        Method::Cx => {
            position(doc, target, Axis::X, Anchor::Center, name, &args[0])?;
            target
        }
        Method::Cy => {
            position(doc, target, Axis::Y, Anchor::Center, name, &args[0])?;
            target
        }
        Method::Center => {
            position(doc, target, Axis::X, Anchor::Center, name, &args[0])?;
            position(doc, target, Axis::Y, Anchor::Center, name, &args[1])?;
            target
        }
        Method::Size => {
            let height = args.get(1).unwrap_or(&args[0]);
            resize(doc, target, Axis::X, name, &args[0])?;
            resize(doc, target, Axis::Y, name, height)?;
            target
        }
        Method::Width => {
            resize(doc, target, Axis::X, name, &args[0])?;
            target
        }
        Method::Height => {
            resize(doc, target, Axis::Y, name, &args[0])?;
            target
        }
        Method::Radius => {
            if doc.tag(target) == Some("circle") {
                set_arg(doc, target, "r", &args[0]);
            } else {
                set_arg(doc, target, "rx", &args[0]);
                set_arg(doc, target, "ry", args.get(1).unwrap_or(&args[0]));
            }
            target
        }
        Method::Font => {
            match args.first() {
                Some(Arg::Map(font)) => set_map(doc, target, font, font_attr),
                Some(key) => {
                    let key = text(name, Some(key))?;
                    let value = text(name, args.get(1))?;
                    doc.set_attr(target, &font_attr(key), value);
                }
                None => {}
            }
            target
        }
        Method::Plot => {
            let attr = match doc.tag(target) {
                Some("path") => "d",
                Some("polyline" | "polygon") => "points",
                _ => {
                    return Err(SceneError::UnsupportedMethod {
                        method: name.to_string(),
                        node: doc.describe(target),
                    })
                }
            };
            set_opt(doc, target, attr, args.first());
            target
        }

        Method::Transform => {
            if let Some(Arg::Map(transform)) = args.first() {
                let composed = compose_transform(name, transform)?;
                doc.set_attr(target, "transform", &composed);
            }
            target
        }
        Method::Rotate | Method::Translate | Method::Scale => {
            let function = match method {
                Method::Rotate => "rotate",
                Method::Translate => "translate",
                _ => "scale",
            };
            let values = args
                .iter()
                .map(|arg| number(name, arg).map(format_number))
                .collect::<Result<Vec<_>, _>>()?;
            append_transform(doc, target, &format!("{}({})", function, values.join(" ")));
            target
        }
        Method::Clear => {
            doc.clear(target);
            target
        }
    };
    Ok(node)
}

/// The document's single `<defs>` node, created as the root's first child
fn defs(doc: &mut Document) -> NodeId {
    let root = doc.root();
    let existing = doc
        .children(root)
        .iter()
        .copied()
        .find(|child| doc.tag(*child) == Some("defs"));
    existing.unwrap_or_else(|| doc.prepend_element(root, "defs"))
}

fn write_text(doc: &mut Document, id: NodeId, content: &str) {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() == 1 {
        doc.append_text(id, content);
        return;
    }
    for (index, line) in lines.into_iter().enumerate() {
        let tspan = doc.append_element(id, "tspan");
        doc.set_attr(tspan, "x", "0");
        if index > 0 {
            doc.set_attr(tspan, "dy", "1.3em");
        }
        doc.append_text(tspan, line);
    }
}

fn number(method: &str, arg: &Arg) -> Result<f64, SceneError> {
    arg.number()
        .ok_or_else(|| SceneError::invalid(method, format!("expected a number, got {:?}", arg)))
}

fn text<'a>(method: &str, arg: Option<&'a Arg>) -> Result<&'a str, SceneError> {
    arg.and_then(Arg::as_str)
        .ok_or_else(|| SceneError::invalid(method, "expected a string argument"))
}

fn set_arg(doc: &mut Document, id: NodeId, attr: &str, arg: &Arg) {
    match arg {
        Arg::Map(map) => doc.set_attr(id, attr, &Value::Object(map.clone()).to_string()),
        other => {
            if let Some(value) = other.as_str() {
                doc.set_attr(id, attr, value);
            }
        }
    }
}

fn set_opt(doc: &mut Document, id: NodeId, attr: &str, arg: Option<&Arg>) {
    if let Some(arg) = arg {
        set_arg(doc, id, attr, arg);
    }
}

/// Set each entry of a map as an attribute; null values remove the attribute
fn set_map(doc: &mut Document, id: NodeId, map: &Map<String, Value>, rename: impl Fn(&str) -> String) {
    for (key, value) in map {
        let attr = rename(key);
        match value {
            Value::Null => doc.remove_attr(id, &attr),
            value => {
                let value = scalar_string(value).unwrap_or_else(|| value.to_string());
                doc.set_attr(id, &attr, &value);
            }
        }
    }
}

fn font_attr(key: &str) -> String {
    match key {
        "family" | "size" | "weight" | "style" | "variant" | "stretch" => format!("font-{}", key),
        "anchor" => "text-anchor".to_string(),
        other => other.to_string(),
    }
}

fn parse_style(style: &str) -> IndexMap<String, String> {
    style
        .split(';')
        .filter_map(|rule| {
            let (property, value) = rule.split_once(':')?;
            Some((property.trim().to_string(), value.trim().to_string()))
        })
        .filter(|(property, _)| !property.is_empty())
        .collect()
}

fn position(
    doc: &mut Document,
    id: NodeId,
    axis: Axis,
    anchor: Anchor,
    method: &str,
    arg: &Arg,
) -> Result<(), SceneError> {
    let attrs = axis.attrs();
    match doc.tag(id) {
        Some(tag @ ("circle" | "ellipse")) => {
            let radius_attr = if tag == "circle" { "r" } else { attrs.radius };
            let radius = doc.attr_number(id, radius_attr).unwrap_or(0.0);
            let value = number(method, arg)?;
            let center = match anchor {
                Anchor::Edge => value + radius,
                Anchor::Center => value,
            };
            doc.set_attr(id, attrs.center, &format_number(center));
        }
        Some("line") => {
            let value = number(method, arg)?;
            let first = doc.attr_number(id, attrs.first).unwrap_or(0.0);
            let second = doc.attr_number(id, attrs.second).unwrap_or(0.0);
            let shift = match anchor {
                Anchor::Edge => value - first.min(second),
                Anchor::Center => value - (first + second) / 2.0,
            };
            doc.set_attr(id, attrs.first, &format_number(first + shift));
            doc.set_attr(id, attrs.second, &format_number(second + shift));
        }
        _ => match anchor {
            Anchor::Edge => set_arg(doc, id, attrs.edge, arg),
            Anchor::Center => {
                let value = number(method, arg)?;
                let size = doc.attr_number(id, attrs.size).unwrap_or(0.0);
                doc.set_attr(id, attrs.edge, &format_number(value - size / 2.0));
            }
        },
    }
    Ok(())
}

fn resize(doc: &mut Document, id: NodeId, axis: Axis, method: &str, arg: &Arg) -> Result<(), SceneError> {
    let attrs = axis.attrs();
    match doc.tag(id) {
        Some("circle") => {
            let r = number(method, arg)? / 2.0;
            doc.set_attr(id, "r", &format_number(r));
        }
        Some("ellipse") => {
            let r = number(method, arg)? / 2.0;
            doc.set_attr(id, attrs.radius, &format_number(r));
        }
        _ => set_arg(doc, id, attrs.size, arg),
    }
    Ok(())
}

fn compose_transform(method: &str, transform: &Map<String, Value>) -> Result<String, SceneError> {
    let mut parts = Vec::new();
    for (key, value) in transform {
        let values = transform_values(method, key, value)?;
        let part = match key.as_str() {
            "rotate" | "translate" | "scale" | "skewX" | "skewY" | "matrix" => {
                format!("{}({})", key, values.join(" "))
            }
            "translateX" => format!("translate({} 0)", values.join(" ")),
            "translateY" => format!("translate(0 {})", values.join(" ")),
            "scaleX" => format!("scale({} 1)", values.join(" ")),
            "scaleY" => format!("scale(1 {})", values.join(" ")),
            other => return Err(SceneError::invalid(method, format!("unknown transform '{}'", other))),
        };
        parts.push(part);
    }
    Ok(parts.join(" "))
}

fn transform_values(method: &str, key: &str, value: &Value) -> Result<Vec<String>, SceneError> {
    let items = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_f64()
                .map(format_number)
                .ok_or_else(|| SceneError::invalid(method, format!("'{}' expects numbers, got {}", key, item)))
        })
        .collect()
}

fn append_transform(doc: &mut Document, id: NodeId, function: &str) {
    let transform = match doc.attr(id, "transform") {
        Some(existing) if !existing.is_empty() => format!("{} {}", existing, function),
        _ => function.to_string(),
    };
    doc.set_attr(id, "transform", &transform);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(doc: &mut Document, target: NodeId, name: &str, args: Vec<Value>) -> Result<NodeId, SceneError> {
        let method = Method::parse(name).unwrap();
        let args = method.adapt(&args).unwrap();
        apply(doc, target, method, name, &args)
    }

    fn fresh() -> (Document, NodeId) {
        let doc = Document::with_root("svg");
        let root = doc.root();
        (doc, root)
    }

    #[test]
    fn test_move_circle_offsets_by_radius() {
        let (mut doc, root) = fresh();
        let circle = run(&mut doc, root, "circle", vec![json!(20)]).unwrap();
        run(&mut doc, circle, "move", vec![json!(100), json!(50)]).unwrap();
        assert_eq!(doc.attr(circle, "cx"), Some("110"));
        assert_eq!(doc.attr(circle, "cy"), Some("60"));
    }

    #[test]
    fn test_center_rect_uses_size() {
        let (mut doc, root) = fresh();
        let rect = run(&mut doc, root, "rect", vec![json!(40), json!(20)]).unwrap();
        run(&mut doc, rect, "center", vec![json!(100), json!(100)]).unwrap();
        assert_eq!(doc.attr(rect, "x"), Some("80"));
        assert_eq!(doc.attr(rect, "y"), Some("90"));
    }

    #[test]
    fn test_move_line_shifts_both_points() {
        let (mut doc, root) = fresh();
        let line = run(&mut doc, root, "line", vec![json!(10), json!(10), json!(30), json!(20)]).unwrap();
        run(&mut doc, line, "move", vec![json!(0), json!(0)]).unwrap();
        assert_eq!(doc.to_markup(false), r#"<svg><line x1="0" y1="0" x2="20" y2="10"/></svg>"#);
    }

    #[test]
    fn test_size_defaults_height_to_width() {
        let (mut doc, root) = fresh();
        let rect = run(&mut doc, root, "rect", vec![]).unwrap();
        run(&mut doc, rect, "size", vec![json!(30)]).unwrap();
        assert_eq!(doc.attr(rect, "width"), Some("30"));
        assert_eq!(doc.attr(rect, "height"), Some("30"));
    }

    #[test]
    fn test_css_merges_rules() {
        let (mut doc, root) = fresh();
        run(&mut doc, root, "css", vec![json!("fill"), json!("red")]).unwrap();
        run(&mut doc, root, "css", vec![json!({ "stroke": "blue", "fill": "green" })]).unwrap();
        assert_eq!(doc.attr(root, "style"), Some("fill:green;stroke:blue"));
    }

    #[test]
    fn test_add_class_does_not_duplicate() {
        let (mut doc, root) = fresh();
        run(&mut doc, root, "addClass", vec![json!("a")]).unwrap();
        run(&mut doc, root, "addClass", vec![json!("b")]).unwrap();
        run(&mut doc, root, "addClass", vec![json!("a")]).unwrap();
        assert_eq!(doc.attr(root, "class"), Some("a b"));
    }

    #[test]
    fn test_transform_composition() {
        let (mut doc, root) = fresh();
        let group = run(&mut doc, root, "group", vec![]).unwrap();
        run(&mut doc, group, "transform", vec![json!({ "translate": [10, 20], "rotate": 45 })]).unwrap();
        run(&mut doc, group, "scale", vec![json!(2)]).unwrap();
        assert_eq!(doc.attr(group, "transform"), Some("translate(10 20) rotate(45) scale(2)"));
    }

    #[test]
    fn test_unknown_transform_is_invalid() {
        let (mut doc, root) = fresh();
        let err = run(&mut doc, root, "transform", vec![json!({ "wobble": 1 })]).unwrap_err();
        assert!(matches!(err, SceneError::InvalidArguments { .. }));
    }

    #[test]
    fn test_multiline_text_uses_tspans() {
        let (mut doc, root) = fresh();
        run(&mut doc, root, "text", vec![json!("one\ntwo")]).unwrap();
        assert_eq!(
            doc.to_markup(false),
            r#"<svg><text><tspan x="0">one</tspan><tspan x="0" dy="1.3em">two</tspan></text></svg>"#
        );
    }

    #[test]
    fn test_plain_replaces_text() {
        let (mut doc, root) = fresh();
        let text = run(&mut doc, root, "text", vec![json!("old")]).unwrap();
        run(&mut doc, text, "plain", vec![json!("new")]).unwrap();
        assert_eq!(doc.text_content(text), "new");
    }

    #[test]
    fn test_symbol_and_use() {
        let (mut doc, root) = fresh();
        let symbol = run(&mut doc, root, "symbol", vec![]).unwrap();
        run(&mut doc, symbol, "id", vec![json!("star")]).unwrap();
        run(&mut doc, root, "use", vec![json!("star")]).unwrap();
        assert_eq!(
            doc.to_markup(false),
            r##"<svg><defs><symbol id="star"/></defs><use href="#star"/></svg>"##
        );
    }

    #[test]
    fn test_attr_null_removes() {
        let (mut doc, root) = fresh();
        run(&mut doc, root, "attr", vec![json!("data-x"), json!(1)]).unwrap();
        assert_eq!(doc.attr(root, "data-x"), Some("1"));
        run(&mut doc, root, "attr", vec![json!({ "data-x": null })]).unwrap();
        assert_eq!(doc.attr(root, "data-x"), None);
    }

    #[test]
    fn test_plot_requires_path_or_poly() {
        let (mut doc, root) = fresh();
        let rect = run(&mut doc, root, "rect", vec![]).unwrap();
        let err = run(&mut doc, rect, "plot", vec![json!("M0 0")]).unwrap_err();
        assert!(matches!(err, SceneError::UnsupportedMethod { .. }));
    }
}
