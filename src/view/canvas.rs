//! The live graph view.

use indexmap::IndexMap;

use crate::models::{Element, ElementList};

/// Mutable, ordered element set displayed on screen.
///
/// Element order is significant: it is the insertion order the layout and
/// the exporter see, and restoring a removal puts elements back at their
/// original index.
pub trait GraphView: Send {
    /// Appends an element. Returns false if the id is already present.
    fn add(&mut self, element: Element) -> bool;

    /// Inserts an element at `index` (clamped to the end). Returns false
    /// if the id is already present.
    fn insert_at(&mut self, index: usize, element: Element) -> bool;

    /// Removes an element, returning its former index.
    fn remove(&mut self, id: &str) -> Option<(usize, Element)>;

    fn clear(&mut self);

    fn get(&self, id: &str) -> Option<&Element>;

    fn index_of(&self, id: &str) -> Option<usize>;

    fn elements(&self) -> Box<dyn Iterator<Item = &Element> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Current contents as a node/edge list.
    fn to_list(&self) -> ElementList {
        let mut list = ElementList::default();
        for element in self.elements() {
            if element.is_node() {
                list.nodes.push(element.clone());
            } else {
                list.edges.push(element.clone());
            }
        }
        list
    }
}

/// In-memory [`GraphView`] keyed by element id.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    elements: IndexMap<String, Element>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphView for Canvas {
    fn add(&mut self, element: Element) -> bool {
        let id = element.id().to_string();
        if self.elements.contains_key(&id) {
            return false;
        }
        self.elements.insert(id, element);
        true
    }

    fn insert_at(&mut self, index: usize, element: Element) -> bool {
        let id = element.id().to_string();
        if self.elements.contains_key(&id) {
            return false;
        }
        let index = index.min(self.elements.len());
        self.elements.shift_insert(index, id, element);
        true
    }

    fn remove(&mut self, id: &str) -> Option<(usize, Element)> {
        self.elements
            .shift_remove_full(id)
            .map(|(index, _, element)| (index, element))
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.elements.get_index_of(id)
    }

    fn elements(&self) -> Box<dyn Iterator<Item = &Element> + '_> {
        Box::new(self.elements.values())
    }

    fn len(&self) -> usize {
        self.elements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates() {
        let mut canvas = Canvas::new();
        assert!(canvas.add(Element::node("a", "A", "root", "diamond")));
        assert!(!canvas.add(Element::node("a", "Other", "child", "ellipse")));
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.get("a").map(Element::label), Some("A"));
    }

    #[test]
    fn test_remove_then_insert_restores_order() {
        let mut canvas = Canvas::new();
        for id in ["a", "b", "c"] {
            canvas.add(Element::node(id, id, "child", "ellipse"));
        }
        let (index, element) = canvas.remove("b").unwrap();
        assert_eq!(index, 1);
        assert_eq!(canvas.index_of("c"), Some(1));

        assert!(canvas.insert_at(index, element));
        let order: Vec<&str> = canvas.elements().map(Element::id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_to_list_splits_kinds() {
        let mut canvas = Canvas::new();
        canvas.add(Element::node("a", "A", "root", "diamond"));
        canvas.add(Element::node("b", "B", "child", "ellipse"));
        canvas.add(Element::edge("a", "b", "step_child"));

        let list = canvas.to_list();
        assert_eq!(list.nodes.len(), 2);
        assert_eq!(list.edges.len(), 1);
        assert!(canvas.remove("missing").is_none());
    }
}
