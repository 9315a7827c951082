//! Graph elements (nodes and edges) as exchanged with the schema backend.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of an element, in document order.
pub type Fields = IndexMap<String, Value>;

/// Keys that are internal to the view and never offered for editing.
pub const EXCLUDED_KEYS: [&str; 7] = [
    "id",
    "_label",
    "_type",
    "_shape",
    "outlinks",
    "_edge_type",
    "child",
];

/// Returns true if `key` is internal-only and must not be edited.
pub fn is_excluded_key(key: &str) -> bool {
    EXCLUDED_KEYS.contains(&key)
}

/// Whether an element is a node or an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    #[serde(rename = "nodes")]
    Node,
    #[serde(rename = "edges")]
    Edge,
}

/// A node or edge in the view.
///
/// `data` carries the element id, edge endpoints (`source`, `target`),
/// view metadata (`_label`, `_type`, `_shape`, `_edge_type`) and the
/// document fields. `classes` holds style classes such as `optional`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawElement", into = "RawElement")]
pub struct Element {
    pub kind: ElementKind,
    pub data: Fields,
    pub classes: String,
}

/// Wire form: `{ "group": "nodes", "data": {...}, "classes": "" }`.
/// `group` is optional on input and inferred from edge endpoints.
#[derive(Serialize, Deserialize)]
struct RawElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<ElementKind>,
    #[serde(default)]
    data: Fields,
    #[serde(default)]
    classes: String,
}

impl From<RawElement> for Element {
    fn from(raw: RawElement) -> Self {
        let kind = raw.group.unwrap_or_else(|| {
            if raw.data.contains_key("source") && raw.data.contains_key("target") {
                ElementKind::Edge
            } else {
                ElementKind::Node
            }
        });
        Self {
            kind,
            data: raw.data,
            classes: raw.classes,
        }
    }
}

impl From<Element> for RawElement {
    fn from(element: Element) -> Self {
        Self {
            group: Some(element.kind),
            data: element.data,
            classes: element.classes,
        }
    }
}

impl Element {
    /// Creates a node element.
    pub fn node(id: &str, label: &str, node_type: &str, shape: &str) -> Self {
        let mut data = Fields::new();
        data.insert("id".into(), Value::from(id));
        data.insert("_label".into(), Value::from(if label.is_empty() { id } else { label }));
        data.insert("_type".into(), Value::from(node_type));
        data.insert("_shape".into(), Value::from(shape));
        Self {
            kind: ElementKind::Node,
            data,
            classes: String::new(),
        }
    }

    /// Creates an edge element whose id is `"<source>_<target>"`.
    pub fn edge(source: &str, target: &str, edge_type: &str) -> Self {
        let mut data = Fields::new();
        data.insert("id".into(), Value::from(format!("{source}_{target}")));
        data.insert("_label".into(), Value::from(""));
        data.insert("source".into(), Value::from(source));
        data.insert("target".into(), Value::from(target));
        data.insert("_edge_type".into(), Value::from(edge_type));
        Self {
            kind: ElementKind::Edge,
            data,
            classes: String::new(),
        }
    }

    /// Element id, empty when missing.
    pub fn id(&self) -> &str {
        self.str_field("id").unwrap_or_default()
    }

    pub fn is_node(&self) -> bool {
        self.kind == ElementKind::Node
    }

    pub fn is_edge(&self) -> bool {
        self.kind == ElementKind::Edge
    }

    /// Edge source id.
    pub fn source(&self) -> Option<&str> {
        self.str_field("source")
    }

    /// Edge target id.
    pub fn target(&self) -> Option<&str> {
        self.str_field("target")
    }

    /// Display label, falling back to the id.
    pub fn label(&self) -> &str {
        match self.str_field("_label") {
            Some(label) if !label.is_empty() => label,
            _ => self.id(),
        }
    }

    /// Node type (`root`, `parent`, `child`, `participant`, `container`).
    pub fn node_type(&self) -> Option<&str> {
        self.str_field("_type")
    }

    /// Node shape (`diamond`, `ellipse`, `square`).
    pub fn shape(&self) -> Option<&str> {
        self.str_field("_shape")
    }

    /// Edge type (`step_child`, `step_participant`, `child_outlink`).
    pub fn edge_type(&self) -> Option<&str> {
        self.str_field("_edge_type")
    }

    /// True if this edge touches node `id`.
    pub fn touches(&self, id: &str) -> bool {
        self.is_edge() && (self.source() == Some(id) || self.target() == Some(id))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.split_whitespace().any(|c| c == class)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// A node/edge list as produced by the schema backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementList {
    #[serde(default)]
    pub nodes: Vec<Element>,
    #[serde(default)]
    pub edges: Vec<Element>,
}

impl ElementList {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    /// Flattens the list into nodes followed by edges, forcing each
    /// element's kind to match the list it came from.
    pub fn flatten(&self) -> Vec<Element> {
        let nodes = self.nodes.iter().cloned().map(|mut e| {
            e.kind = ElementKind::Node;
            e
        });
        let edges = self.edges.iter().cloned().map(|mut e| {
            e.kind = ElementKind::Edge;
            e
        });
        nodes.chain(edges).collect()
    }
}

/// Renders a field value the way the side panel displays it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_inferred_from_endpoints() {
        let node: Element = serde_json::from_value(json!({"data": {"id": "a"}})).unwrap();
        let edge: Element =
            serde_json::from_value(json!({"data": {"id": "a_b", "source": "a", "target": "b"}}))
                .unwrap();
        assert!(node.is_node());
        assert!(edge.is_edge());
        assert_eq!(edge.source(), Some("a"));
        assert!(edge.touches("b"));
        assert!(!node.touches("a"));
    }

    #[test]
    fn test_serializes_with_group() {
        let element = Element::node("root", "Root", "root", "diamond");
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["group"], "nodes");
        assert_eq!(json["data"]["_shape"], "diamond");
    }

    #[test]
    fn test_label_falls_back_to_id() {
        let element = Element::node("Events/1", "", "child", "ellipse");
        assert_eq!(element.label(), "Events/1");
        let edge = Element::edge("a", "b", "step_child");
        assert_eq!(edge.id(), "a_b");
        assert_eq!(edge.label(), "a_b");
    }

    #[test]
    fn test_flatten_orders_nodes_before_edges() {
        let list = ElementList {
            nodes: vec![Element::node("a", "A", "root", "diamond")],
            edges: vec![Element::edge("a", "a", "child_outlink")],
        };
        let flat = list.flatten();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].is_node());
        assert!(flat[1].is_edge());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(["a", "b"])), "a,b");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!(null)), "");
    }

    #[test]
    fn test_excluded_keys() {
        for key in ["id", "_label", "_type", "_shape", "outlinks", "_edge_type", "child"] {
            assert!(is_excluded_key(key));
        }
        assert!(!is_excluded_key("comment"));
    }
}
