//! Event-schema parser.
//!
//! Turns the `events` array of a schema document into a node/edge graph and
//! answers the two lookups the view needs: the base tree shown after a
//! (re)load, and the sub-tree below a single node.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{Element, ElementList};

/// Fields copied from an event onto its node.
const ROOT_KEYS: &[&str] = &[
    "@id",
    "name",
    "comment",
    "description",
    "aka",
    "qnode",
    "qlabel",
    "minDuration",
    "maxDuration",
    "goal",
    "ta1explanation",
    "importance",
    "children_gate",
];
/// Fields copied from a participant entry.
const PARTICIPANT_KEYS: &[&str] = &["@id", "roleName", "entity"];
/// Fields copied from a child entry.
const CHILD_KEYS: &[&str] = &[
    "child",
    "comment",
    "optional",
    "importance",
    "outlinks",
    "outlink_gate",
];
/// Fields lifted out of an entry's `privateData` object.
pub(crate) const PRIVATE_DATA_KEYS: &[&str] = &["@type", "template", "repeatable", "importance"];

// Node types
const ROOT: &str = "root";
const PARENT: &str = "parent";
const CHILD: &str = "child";
const CONTAINER: &str = "container";
const PARTICIPANT: &str = "participant";

// Edge types
const STEP_CHILD: &str = "step_child";
const STEP_PARTICIPANT: &str = "step_participant";
const CHILD_OUTLINK: &str = "child_outlink";

/// Parsed schema graph.
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    nodes: IndexMap<String, Element>,
    edges: Vec<Element>,
}

impl SchemaGraph {
    /// Parses an events array.
    ///
    /// The first event is the root. Events with children become diamond
    /// `parent` nodes, events without become `child` ellipses. Participants,
    /// children, and outlinks add nodes and typed edges. Container events
    /// (names mentioning `outlinks`) are spliced out of the edge list.
    pub fn parse(events: &[Value]) -> Result<Self, AppError> {
        let mut graph = Self::default();
        let mut containers: Vec<String> = Vec::new();

        for (index, event) in events.iter().enumerate() {
            let obj = event
                .as_object()
                .ok_or_else(|| AppError::Schema(format!("event {index} is not an object")))?;
            let context = format!("event {index}");
            let event_id = required_str(obj, "@id", &context)?;
            let name = required_str(obj, "name", &context)?;
            let label = event_label(name);
            let has_children = obj.contains_key("children");

            if let Some(node) = graph.nodes.get_mut(event_id) {
                // Seen earlier as a child or outlink: fill in the event fields.
                set_str(node, "_type", ROOT);
                set_str(node, "_label", &label);
                extend_node(node, obj);
                let is_container = node
                    .str_field("name")
                    .is_some_and(|n| n.contains("outlinks"));
                if !has_children {
                    set_str(node, "_type", CHILD);
                } else if is_container {
                    set_str(node, "_type", CONTAINER);
                    containers.push(event_id.to_string());
                } else {
                    set_str(node, "_type", PARENT);
                    set_str(node, "_shape", "diamond");
                }
            } else {
                let mut node = Element::node(event_id, &label, ROOT, "diamond");
                extend_node(&mut node, obj);
                graph.nodes.insert(event_id.to_string(), node);
            }

            let repeatable = match graph.nodes.get_mut(event_id) {
                Some(node) => {
                    if index > 0 {
                        set_str(node, "_type", PARENT);
                        set_str(node, "_shape", "diamond");
                    }
                    if !has_children {
                        set_str(node, "_type", CHILD);
                        set_str(node, "_shape", "ellipse");
                    }
                    node.data.get("repeatable").is_some_and(truthy)
                }
                None => false,
            };
            if repeatable {
                graph.edges.push(Element::edge(event_id, event_id, CHILD_OUTLINK));
            }

            graph.add_participants(event_id, obj)?;
            graph.add_children(event_id, obj)?;
            graph.splice_containers(&containers)?;
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "parsed schema"
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&Element> {
        self.nodes.get(id)
    }

    /// The base tree: the root, its non-participant children, and the
    /// outlinks between them.
    pub fn base_tree(&self) -> Result<ElementList, AppError> {
        let root = self
            .nodes
            .values()
            .find(|n| n.node_type() == Some(ROOT))
            .ok_or(AppError::MissingRoot)?;
        Ok(self.connected(root, true))
    }

    /// The sub-tree below `node_id`: its direct successors (participants
    /// included) and their outlinks. The node itself is not part of the result.
    pub fn subtree(&self, node_id: &str) -> Result<ElementList, AppError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| AppError::ElementNotFound(node_id.to_string()))?;
        Ok(self.connected(node, false))
    }

    fn connected(&self, top: &Element, is_base: bool) -> ElementList {
        let mut collector = Collector::default();
        let top_id = top.id();
        if is_base {
            collector.node(top);
        }

        let mut reached: Vec<&str> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.source() == Some(top_id)) {
            let Some(target) = edge.target().and_then(|t| self.nodes.get(t)) else {
                continue;
            };
            if is_base && target.node_type() == Some(PARTICIPANT) {
                continue;
            }
            collector.edge(edge);
            collector.node(target);
            if !reached.contains(&target.id()) {
                reached.push(target.id());
            }
        }

        // Causal links between the reached nodes
        for id in &reached {
            let outlinks = self
                .edges
                .iter()
                .filter(|e| e.source() == Some(id) && e.edge_type() == Some(CHILD_OUTLINK));
            for edge in outlinks {
                if let Some(target) = edge.target().and_then(|t| self.nodes.get(t)) {
                    collector.node(target);
                }
                collector.edge(edge);
            }
        }

        collector.list
    }

    fn add_participants(&mut self, event_id: &str, event: &Map<String, Value>) -> Result<(), AppError> {
        let Some(participants) = event.get("participants").and_then(Value::as_array) else {
            return Ok(());
        };
        for participant in participants {
            let obj = participant.as_object().ok_or_else(|| {
                AppError::Schema(format!("participant of '{event_id}' is not an object"))
            })?;
            let context = format!("participant of '{event_id}'");
            let participant_id = required_str(obj, "@id", &context)?;
            let role = required_str(obj, "roleName", &context)?;
            let label = last_segment(role).replace('_', "");

            let mut node = Element::node(participant_id, &label, PARTICIPANT, "square");
            extend_node(&mut node, obj);
            self.nodes.insert(participant_id.to_string(), node);
            self.edges
                .push(Element::edge(event_id, participant_id, STEP_PARTICIPANT));
        }
        Ok(())
    }

    fn add_children(&mut self, event_id: &str, event: &Map<String, Value>) -> Result<(), AppError> {
        let Some(children) = event.get("children").and_then(Value::as_array) else {
            return Ok(());
        };
        for child in children {
            let obj = child.as_object().ok_or_else(|| {
                AppError::Schema(format!("child of '{event_id}' is not an object"))
            })?;
            let child_id = required_str(obj, "child", &format!("child of '{event_id}'"))?;

            if let Some(node) = self.nodes.get_mut(child_id) {
                // Keep the type it already has, but pick up the child fields.
                let previous = node.node_type().unwrap_or(CHILD).to_string();
                set_str(node, "_type", CHILD);
                extend_node(node, obj);
                set_str(node, "_type", &previous);
            } else {
                let comment = obj.get("comment").and_then(Value::as_str).unwrap_or_default();
                let mut node = Element::node(child_id, comment, CHILD, "ellipse");
                extend_node(&mut node, obj);
                self.nodes.insert(child_id.to_string(), node);
            }
            self.edges.push(Element::edge(event_id, child_id, STEP_CHILD));

            let outlinks = obj.get("outlinks").and_then(Value::as_array);
            for outlink in outlinks.into_iter().flatten().filter_map(Value::as_str) {
                if !self.nodes.contains_key(outlink) {
                    let label = last_segment(outlink).replace('_', "");
                    self.nodes
                        .insert(outlink.to_string(), Element::node(outlink, &label, CHILD, "ellipse"));
                }
                self.edges.push(Element::edge(child_id, outlink, CHILD_OUTLINK));
            }
        }
        Ok(())
    }

    /// Removes container events from the edge list: the container's
    /// predecessor inherits its `children_gate` and is linked directly to the
    /// container's successors.
    fn splice_containers(&mut self, containers: &[String]) -> Result<(), AppError> {
        if containers.is_empty() {
            return Ok(());
        }
        let mut spliced = vec![false; self.edges.len()];

        for container in containers {
            let mut predecessor: Option<String> = None;
            let mut i = 0;
            // The edge list grows while it is scanned; new links are scanned too.
            while i < self.edges.len() {
                if spliced[i] {
                    i += 1;
                    continue;
                }
                let source = self.edges[i].source().unwrap_or_default().to_string();
                let target = self.edges[i].target().unwrap_or_default().to_string();

                if &target == container {
                    let gate = self
                        .nodes
                        .get(container)
                        .and_then(|n| n.data.get("children_gate"))
                        .cloned()
                        .ok_or_else(|| {
                            AppError::missing_key("children_gate", format!("container event '{container}'"))
                        })?;
                    if let Some(node) = self.nodes.get_mut(&source) {
                        node.data.insert("children_gate".into(), gate);
                    }
                    predecessor = Some(source.clone());
                    spliced[i] = true;
                }
                if &source == container {
                    if let Some(predecessor) = &predecessor {
                        self.edges.push(Element::edge(predecessor, &target, STEP_CHILD));
                        spliced.push(false);
                        spliced[i] = true;
                    }
                }
                i += 1;
            }
        }

        let mut flags = spliced.into_iter();
        self.edges.retain(|_| !flags.next().unwrap_or(false));
        Ok(())
    }
}

/// Accumulates an element list without duplicate ids.
#[derive(Default)]
struct Collector {
    list: ElementList,
    seen: HashSet<String>,
}

impl Collector {
    fn node(&mut self, node: &Element) {
        if self.seen.insert(node.id().to_string()) {
            self.list.nodes.push(node.clone());
        }
    }

    fn edge(&mut self, edge: &Element) {
        if self.seen.insert(edge.id().to_string()) {
            self.list.edges.push(edge.clone());
        }
    }
}

/// Copies the whitelisted fields for the node's current type.
fn extend_node(node: &mut Element, obj: &Map<String, Value>) {
    let allowed: &[&str] = match node.node_type() {
        Some(ROOT) => ROOT_KEYS,
        Some(PARTICIPANT) => PARTICIPANT_KEYS,
        Some(CHILD) => CHILD_KEYS,
        _ => &[],
    };
    for (key, value) in obj {
        if !allowed.contains(&key.as_str()) {
            continue;
        }
        if key == "optional" && truthy(value) {
            node.classes = "optional".to_string();
        } else {
            node.data.insert(key.clone(), value.clone());
        }
    }
    if let Some(private) = obj.get("privateData").and_then(Value::as_object) {
        for (key, value) in private {
            if PRIVATE_DATA_KEYS.contains(&key.as_str()) {
                node.data.insert(key.clone(), value.clone());
            }
        }
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str, context: &str) -> Result<&'a str, AppError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::missing_key(key, context))
}

fn set_str(node: &mut Element, key: &str, value: &str) {
    node.data.insert(key.to_string(), Value::from(value));
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// `Events/10002/Disease_Outbreak-Start` → `Disease Outbreak Start`.
fn event_label(name: &str) -> String {
    last_segment(name).replace(['_', '-'], " ")
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
