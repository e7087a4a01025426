//! The drawing operation table
//!
//! Scene documents name operations by string. Each name maps to one
//! [`Method`], and each method declares the arguments it accepts so that
//! loosely-typed YAML values can be checked before anything is drawn.

use serde_json::{Map, Value};

use super::document::format_number;

/// A named drawing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    // Container operations: create a child and return it
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    Path,
    Image,
    Text,
    Group,
    Nested,
    Defs,
    Symbol,
    Use,
    Link,
    Style,
    Element,
    Import,

    // Text operations
    Plain,
    Tspan,

    // Element operations: modify the target and return it
    Attr,
    Id,
    AddClass,
    Css,
    Opacity,
    Fill,
    Stroke,
    Move,
    X,
    Y,
    Cx,
    Cy,
    Center,
    Size,
    Width,
    Height,
    Radius,
    Font,
    Plot,
    Transform,
    Rotate,
    Translate,
    Scale,
    Clear,
}

/// Which nodes an operation can be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Container,
    Text,
    Element,
}

/// Accepted shape of a single argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A number, or a string such as `"50%"`
    Length,
    /// A string (numbers and booleans are stringified)
    Text,
    /// A string or a map
    TextOrMap,
    /// A map
    Map,
    /// A points list: `"0,0 10,10"`, `[[0,0],[10,10]]` or `[0,0,10,10]`
    Points,
}

/// Required and optional arguments of an operation
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub required: &'static [ArgKind],
    pub optional: &'static [ArgKind],
}

const fn schema(required: &'static [ArgKind], optional: &'static [ArgKind]) -> Schema {
    Schema { required, optional }
}

/// An argument after adaptation
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Length(String),
    Text(String),
    Map(Map<String, Value>),
    Points(String),
}

impl Arg {
    /// Numeric value, if the argument is a plain number
    pub fn number(&self) -> Option<f64> {
        match self {
            Arg::Length(s) | Arg::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String form for attribute values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Length(s) | Arg::Text(s) | Arg::Points(s) => Some(s),
            Arg::Map(_) => None,
        }
    }
}

impl Method {
    /// Look up an operation by the name used in scene documents
    pub fn parse(name: &str) -> Option<Self> {
        let method = match name {
            "rect" => Method::Rect,
            "circle" => Method::Circle,
            "ellipse" => Method::Ellipse,
            "line" => Method::Line,
            "polyline" => Method::Polyline,
            "polygon" => Method::Polygon,
            "path" => Method::Path,
            "image" => Method::Image,
            "text" => Method::Text,
            "group" => Method::Group,
            "nested" => Method::Nested,
            "defs" => Method::Defs,
            "symbol" => Method::Symbol,
            "use" => Method::Use,
            "link" => Method::Link,
            "style" => Method::Style,
            "element" => Method::Element,
            "import" => Method::Import,
            "plain" => Method::Plain,
            "tspan" => Method::Tspan,
            "attr" => Method::Attr,
            "id" => Method::Id,
            "addClass" => Method::AddClass,
            "css" => Method::Css,
            "opacity" => Method::Opacity,
            "fill" => Method::Fill,
            "stroke" => Method::Stroke,
            "move" => Method::Move,
            "x" => Method::X,
            "y" => Method::Y,
            "cx" => Method::Cx,
            "cy" => Method::Cy,
            "center" => Method::Center,
            "size" => Method::Size,
            "width" => Method::Width,
            "height" => Method::Height,
            "radius" => Method::Radius,
            "font" => Method::Font,
            "plot" => Method::Plot,
            "transform" => Method::Transform,
            "rotate" => Method::Rotate,
            "translate" => Method::Translate,
            "scale" => Method::Scale,
            "clear" => Method::Clear,
            _ => return None,
        };
        Some(method)
    }

    pub fn target(self) -> Target {
        use Method::*;
        match self {
            Rect | Circle | Ellipse | Line | Polyline | Polygon | Path | Image | Text | Group
            | Nested | Defs | Symbol | Use | Link | Style | Element | Import => Target::Container,
            Plain | Tspan => Target::Text,
            _ => Target::Element,
        }
    }

    /// Whether the operation suspends (and must be awaited before chaining)
    pub fn is_async(self) -> bool {
        matches!(self, Method::Import)
    }

    pub fn schema(self) -> Schema {
        use ArgKind::{Length, Points, TextOrMap};
        use Method::*;
        match self {
            Rect => schema(&[], &[Length, Length]),
            Circle => schema(&[], &[Length]),
            Ellipse => schema(&[], &[Length, Length]),
            Line => schema(&[], &[Length, Length, Length, Length]),
            Polyline | Polygon => schema(&[], &[Points]),
            Path | Plot => schema(&[], &[ArgKind::Text]),
            Image => schema(&[ArgKind::Text], &[Length, Length]),
            Text | Plain | Tspan => schema(&[], &[ArgKind::Text]),
            Group | Nested | Defs | Symbol | Clear => schema(&[], &[]),
            Use | Link | Import | Id | AddClass => schema(&[ArgKind::Text], &[]),
            Style => schema(&[ArgKind::Text], &[]),
            Element => schema(&[ArgKind::Text], &[ArgKind::Map]),
            Attr | Css | Font => schema(&[TextOrMap], &[ArgKind::Text]),
            Opacity | X | Y | Cx | Cy | Width | Height => schema(&[Length], &[]),
            Fill | Stroke => schema(&[TextOrMap], &[]),
            Move | Center | Translate => schema(&[Length, Length], &[]),
            Size => schema(&[Length], &[Length]),
            Radius => schema(&[Length], &[Length]),
            Transform => schema(&[ArgKind::Map], &[]),
            Rotate => schema(&[Length], &[Length, Length]),
            Scale => schema(&[Length], &[Length]),
        }
    }

    /// Check and convert raw arguments against this operation's schema
    pub fn adapt(self, args: &[Value]) -> Result<Vec<Arg>, String> {
        let schema = self.schema();
        let max = schema.required.len() + schema.optional.len();
        if args.len() < schema.required.len() || args.len() > max {
            return Err(if schema.optional.is_empty() {
                format!("expected {} argument(s), got {}", schema.required.len(), args.len())
            } else {
                format!(
                    "expected {} to {} argument(s), got {}",
                    schema.required.len(),
                    max,
                    args.len()
                )
            });
        }

        schema
            .required
            .iter()
            .chain(schema.optional)
            .zip(args)
            .enumerate()
            .map(|(position, (kind, value))| {
                adapt_arg(*kind, value).ok_or_else(|| {
                    format!("argument {} should be {:?}, got {}", position + 1, kind, value)
                })
            })
            .collect()
    }
}

fn adapt_arg(kind: ArgKind, value: &Value) -> Option<Arg> {
    match (kind, value) {
        (ArgKind::Length, Value::Number(n)) => n.as_f64().map(|n| Arg::Length(format_number(n))),
        (ArgKind::Length, Value::String(s)) => Some(Arg::Length(s.clone())),
        (ArgKind::Text | ArgKind::TextOrMap, value) => scalar_string(value).map(Arg::Text).or_else(|| {
            match (kind, value) {
                (ArgKind::TextOrMap, Value::Object(map)) => Some(Arg::Map(map.clone())),
                _ => None,
            }
        }),
        (ArgKind::Map, Value::Object(map)) => Some(Arg::Map(map.clone())),
        (ArgKind::Points, value) => points(value).map(Arg::Points),
        _ => None,
    }
}

/// String form of a scalar value, as used for attributes
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn points(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.iter().all(Value::is_array) => items
            .iter()
            .map(|pair| {
                let pair = pair.as_array()?;
                match pair.as_slice() {
                    [x, y] => Some(format!("{},{}", format_number(x.as_f64()?), format_number(y.as_f64()?))),
                    _ => None,
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(|pairs| pairs.join(" ")),
        Value::Array(items) if items.len() % 2 == 0 => items
            .chunks(2)
            .map(|pair| Some(format!("{},{}", format_number(pair[0].as_f64()?), format_number(pair[1].as_f64()?))))
            .collect::<Option<Vec<_>>>()
            .map(|pairs| pairs.join(" ")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_and_unknown_names() {
        assert_eq!(Method::parse("circle"), Some(Method::Circle));
        assert_eq!(Method::parse("addClass"), Some(Method::AddClass));
        assert_eq!(Method::parse("explode"), None);
    }

    #[test]
    fn test_targets() {
        assert_eq!(Method::Rect.target(), Target::Container);
        assert_eq!(Method::Tspan.target(), Target::Text);
        assert_eq!(Method::Fill.target(), Target::Element);
        assert!(Method::Import.is_async());
        assert!(!Method::Rect.is_async());
    }

    #[test]
    fn test_schema_text_and_map_kinds() {
        let text = Method::Text.schema();
        assert!(text.required.is_empty());
        assert_eq!(text.optional, &[ArgKind::Text]);

        let element = Method::Element.schema();
        assert_eq!(element.required, &[ArgKind::Text]);
        assert_eq!(element.optional, &[ArgKind::Map]);
        assert_eq!(Method::Transform.schema().required, &[ArgKind::Map]);
        assert_eq!(Method::Attr.schema().required, &[ArgKind::TextOrMap]);
    }

    #[test]
    fn test_adapt_lengths() {
        let args = Method::Rect.adapt(&[json!(100), json!("50%")]).unwrap();
        assert_eq!(args, vec![Arg::Length("100".to_string()), Arg::Length("50%".to_string())]);
        assert_eq!(args[0].number(), Some(100.0));
        assert_eq!(args[1].number(), None);
    }

    #[test]
    fn test_adapt_rejects_wrong_arity() {
        let err = Method::Move.adapt(&[json!(1)]).unwrap_err();
        assert!(err.contains("expected 2 argument(s), got 1"));
        let err = Method::Circle.adapt(&[json!(1), json!(2)]).unwrap_err();
        assert!(err.contains("expected 0 to 1"));
    }

    #[test]
    fn test_adapt_rejects_wrong_type() {
        let err = Method::Opacity.adapt(&[json!({ "a": 1 })]).unwrap_err();
        assert!(err.contains("argument 1"));
    }

    #[test]
    fn test_adapt_text_or_map() {
        let args = Method::Fill.adapt(&[json!({ "color": "red" })]).unwrap();
        assert!(matches!(&args[0], Arg::Map(map) if map["color"] == "red"));
        let args = Method::Fill.adapt(&[json!("#fff")]).unwrap();
        assert_eq!(args[0], Arg::Text("#fff".to_string()));
    }

    #[test]
    fn test_points_forms() {
        let pairs = Method::Polygon.adapt(&[json!([[0, 0], [10, 5.5]])]).unwrap();
        assert_eq!(pairs[0], Arg::Points("0,0 10,5.5".to_string()));
        let flat = Method::Polyline.adapt(&[json!([0, 0, 10, 10])]).unwrap();
        assert_eq!(flat[0], Arg::Points("0,0 10,10".to_string()));
        let raw = Method::Polyline.adapt(&[json!("1,2 3,4")]).unwrap();
        assert_eq!(raw[0], Arg::Points("1,2 3,4".to_string()));
    }
}
