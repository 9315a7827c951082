//! Relay between the view and the side panel.

use serde::Serialize;

use crate::error::AppError;
use crate::models::{display_value, is_excluded_key, Element, ElementKind, FieldEdit};

/// One editable field as shown in the side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEntry {
    pub key: String,
    pub value: String,
}

/// The element whose fields are open in the side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub element_id: String,
    pub label: String,
    pub kind: ElementKind,
    /// Editable fields only; internal keys never appear here.
    pub entries: Vec<FieldEntry>,
}

impl Selection {
    pub fn from_element(element: &Element) -> Self {
        let entries = element
            .data
            .iter()
            .filter(|(key, _)| !is_excluded_key(key))
            .map(|(key, value)| FieldEntry {
                key: key.clone(),
                value: display_value(value),
            })
            .collect();
        Self {
            element_id: element.id().to_string(),
            label: element.label().to_string(),
            kind: element.kind,
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

/// Holds the current selection and turns panel edits into [`FieldEdit`]s.
///
/// The bridge never touches the view; edits go to the document endpoint and
/// come back through a reload.
#[derive(Debug, Clone, Default)]
pub struct SidebarBridge {
    selection: Option<Selection>,
}

impl SidebarBridge {
    /// Opens the panel on `element`, or closes it for `None` (background).
    pub fn surface(&mut self, element: Option<&Element>) -> Option<&Selection> {
        self.selection = element.map(Selection::from_element);
        self.selection.as_ref()
    }

    pub fn clear(&mut self) {
        self.selection = None;
    }

    pub fn is_open(&self) -> bool {
        self.selection.is_some()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Builds the edit triple for `key` of the selected element.
    pub fn edit_request(&self, key: &str, value: &str) -> Result<FieldEdit, AppError> {
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| AppError::ElementNotFound("no element selected".to_string()))?;
        if is_excluded_key(key) {
            return Err(AppError::ReadOnlyField(key.to_string()));
        }
        Ok(FieldEdit::new(&selection.element_id, key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn child() -> Element {
        let mut element = Element::node("Events/2", "Spread", "child", "ellipse");
        element.data.insert("child".into(), json!("Events/2"));
        element.data.insert("comment".into(), json!("Spread"));
        element.data.insert("outlinks".into(), json!(["Events/3"]));
        element.data.insert("optional".into(), json!(false));
        element
    }

    #[test]
    fn test_selection_hides_internal_keys() {
        let selection = Selection::from_element(&child());
        let keys: Vec<&str> = selection.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["comment", "optional"]);
        assert_eq!(selection.get("optional"), Some("false"));
        assert_eq!(selection.label, "Spread");
    }

    #[test]
    fn test_edge_selection_hides_edge_type() {
        let edge = Element::edge("a", "b", "step_child");
        let selection = Selection::from_element(&edge);
        let keys: Vec<&str> = selection.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["source", "target"]);
    }

    #[test]
    fn test_background_closes_panel() {
        let mut bridge = SidebarBridge::default();
        bridge.surface(Some(&child()));
        assert!(bridge.is_open());
        assert!(bridge.surface(None).is_none());
        assert!(!bridge.is_open());
    }

    #[test]
    fn test_edit_request_targets_selection() {
        let mut bridge = SidebarBridge::default();
        assert!(bridge.edit_request("comment", "x").is_err());

        bridge.surface(Some(&child()));
        let edit = bridge.edit_request("comment", "Outbreak spread").unwrap();
        assert_eq!(edit, FieldEdit::new("Events/2", "comment", "Outbreak spread"));
        assert!(matches!(
            bridge.edit_request("_type", "root"),
            Err(AppError::ReadOnlyField(_))
        ));
    }
}
