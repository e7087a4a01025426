//! SVG node arena and serialization

use indexmap::IndexMap;

use super::SvgConfig;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Tags that may hold child elements created by container methods
const CONTAINER_TAGS: &[&str] = &[
    "svg", "g", "defs", "a", "symbol", "marker", "pattern", "clipPath", "mask", "switch",
];

/// SMIL animation elements
pub const ANIMATION_TAGS: &[&str] = &["animate", "animateTransform", "animateMotion", "set"];

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A tree of SVG nodes addressed by [`NodeId`]
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document whose root element has the given tag
    pub fn with_root(tag: &str) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    tag: tag.to_string(),
                    attrs: IndexMap::new(),
                },
                parent: None,
                children: vec![],
            }],
            root: NodeId(0),
        }
    }

    /// Create an `<svg>` root carrying the configured defaults
    pub fn svg(config: &SvgConfig) -> Self {
        let mut doc = Self::with_root("svg");
        let root = doc.root();
        doc.set_attr(root, "xmlns", SVG_NS);
        doc.set_attr(root, "version", "1.1");
        doc.set_attr(root, "xmlns:xlink", XLINK_NS);
        doc.set_attr(root, "preserveAspectRatio", &config.preserve_aspect_ratio);
        doc.set_attr(root, "viewBox", &config.view_box);
        doc.set_attr(root, "width", &format_number(config.width));
        doc.set_attr(root, "height", &format_number(config.height));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Tag name of an element node
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_container(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(|tag| CONTAINER_TAGS.contains(&tag))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Numeric value of an attribute, if it holds a plain number
    pub fn attr_number(&self, id: NodeId, name: &str) -> Option<f64> {
        self.attr(id, name).and_then(|v| v.trim().parse().ok())
    }

    /// Set an attribute; ignored on text nodes
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.shift_remove(name);
        }
    }

    /// Append a new element under `parent`
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element {
                tag: tag.to_string(),
                attrs: IndexMap::new(),
            },
        )
    }

    /// Insert a new element as the first child of `parent`
    pub fn prepend_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.append_element(parent, tag);
        let children = &mut self.nodes[parent.0].children;
        children.pop();
        children.insert(0, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: vec![],
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detach all children of a node
    pub fn clear(&mut self, id: NodeId) {
        self.nodes[id.0].children.clear();
    }

    /// Detach a node from its parent; the subtree is no longer serialized
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Concatenated text content of a node's direct text children
    pub fn text_content(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|c| match self.kind(*c) {
                NodeKind::Text(text) => Some(text.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    /// Copy `source`'s subtree rooted at `node` under `parent` in this document
    pub fn graft(&mut self, parent: NodeId, source: &Document, node: NodeId) -> NodeId {
        let copy = self.push_node(parent, source.kind(node).clone());
        for child in source.children(node) {
            self.graft(copy, source, *child);
        }
        copy
    }

    /// All descendants of `from` (excluding itself) in document order
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(from).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Short description of a node for error messages, e.g. `<rect id="a">`
    pub fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Element { tag, attrs } => match attrs.get("id") {
                Some(node_id) => format!("<{} id=\"{}\">", tag, node_id),
                None => format!("<{}>", tag),
            },
            NodeKind::Text(_) => "#text".to_string(),
        }
    }

    /// Serialize the whole document
    pub fn to_markup(&self, pretty: bool) -> String {
        let mut out = String::new();
        self.write_node(self.root, pretty, 0, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, pretty: bool, depth: usize, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(r#" {}="{}""#, name, escape_xml(value)));
                }
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');

                // Indenting mixed content would change rendered text
                let indent = pretty && children.iter().all(|c| self.tag(*c).is_some());
                for child in children {
                    if indent {
                        out.push('\n');
                        out.push_str(&"  ".repeat(depth + 1));
                    }
                    self.write_node(*child, pretty, depth + 1, out);
                }
                if indent {
                    out.push('\n');
                    out.push_str(&"  ".repeat(depth));
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

/// Format a number the way SVG attributes expect (`5` rather than `5.0`)
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Escape special XML characters in attribute values
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Escape character data, leaving `>` literal
fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;")
}
