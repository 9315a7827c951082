//! Single-level undo for element removal.

use super::canvas::GraphView;
use crate::models::Element;

/// Elements taken out of the view by one removal, with their former indices.
///
/// Removing a node also detaches its incident edges, so one removal can hold
/// several elements. Entries are kept in ascending index order.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    entries: Vec<(usize, Element)>,
}

impl Removal {
    /// Removes `id` (and, for a node, every edge touching it) from `view`.
    /// Returns `None` if `id` is not in the view.
    pub fn take<V: GraphView + ?Sized>(view: &mut V, id: &str) -> Option<Self> {
        let target = view.get(id)?;
        let mut ids = vec![id.to_string()];
        if target.is_node() {
            ids.extend(
                view.elements()
                    .filter(|e| e.touches(id))
                    .map(|e| e.id().to_string()),
            );
        }

        // Indices are read before anything moves.
        let mut order: Vec<(usize, String)> = ids
            .into_iter()
            .filter_map(|id| view.index_of(&id).map(|index| (index, id)))
            .collect();
        order.sort_by_key(|(index, _)| *index);

        let mut entries = Vec::with_capacity(order.len());
        for (index, id) in order {
            if let Some((_, element)) = view.remove(&id) {
                entries.push((index, element));
            }
        }
        Some(Self { entries })
    }

    /// Puts the elements back at their original indices. Elements whose id
    /// reappeared in the meantime, and edges with a missing endpoint, are
    /// skipped. Returns the number of elements restored.
    pub fn restore<V: GraphView + ?Sized>(self, view: &mut V) -> usize {
        let mut restored = 0;
        for (index, element) in self.entries {
            if element.is_edge() {
                let attached = [element.source(), element.target()]
                    .into_iter()
                    .all(|end| end.is_some_and(|id| view.contains(id)));
                if !attached {
                    continue;
                }
            }
            if view.insert_at(index, element) {
                restored += 1;
            }
        }
        restored
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, e)| e.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds at most one [`Removal`]; storing a new one discards the old.
#[derive(Debug, Clone, Default)]
pub struct RemovalSlot(Option<Removal>);

impl RemovalSlot {
    pub fn store(&mut self, removal: Removal) {
        if let Some(previous) = self.0.replace(removal) {
            tracing::debug!(discarded = previous.len(), "Overwrote removal slot");
        }
    }

    pub fn take(&mut self) -> Option<Removal> {
        self.0.take()
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::canvas::Canvas;

    fn canvas() -> Canvas {
        let mut canvas = Canvas::new();
        canvas.add(Element::node("root", "Root", "root", "diamond"));
        canvas.add(Element::node("a", "A", "child", "ellipse"));
        canvas.add(Element::node("b", "B", "child", "ellipse"));
        canvas.add(Element::edge("root", "a", "step_child"));
        canvas.add(Element::edge("root", "b", "step_child"));
        canvas.add(Element::edge("a", "b", "child_outlink"));
        canvas
    }

    fn order(canvas: &Canvas) -> Vec<String> {
        canvas.elements().map(|e| e.id().to_string()).collect()
    }

    #[test]
    fn test_node_removal_detaches_incident_edges() {
        let mut view = canvas();
        let removal = Removal::take(&mut view, "a").unwrap();

        let removed: Vec<&str> = removal.ids().collect();
        assert_eq!(removed, vec!["a", "root_a", "a_b"]);
        assert_eq!(order(&view), vec!["root", "b", "root_b"]);
    }

    #[test]
    fn test_restore_is_exact() {
        let mut view = canvas();
        let before = order(&view);
        let removal = Removal::take(&mut view, "a").unwrap();
        assert_eq!(removal.restore(&mut view), 3);
        assert_eq!(order(&view), before);
    }

    #[test]
    fn test_edge_removal_only_takes_the_edge() {
        let mut view = canvas();
        let removal = Removal::take(&mut view, "a_b").unwrap();
        assert_eq!(removal.len(), 1);
        assert!(view.contains("a"));
        assert!(view.contains("b"));
    }

    #[test]
    fn test_missing_id_takes_nothing() {
        let mut view = canvas();
        assert!(Removal::take(&mut view, "zzz").is_none());
        assert_eq!(view.len(), 6);
    }

    #[test]
    fn test_slot_keeps_only_latest() {
        let mut view = canvas();
        let mut slot = RemovalSlot::default();
        slot.store(Removal::take(&mut view, "a_b").unwrap());
        slot.store(Removal::take(&mut view, "root_b").unwrap());

        let last = slot.take().unwrap();
        assert_eq!(last.ids().collect::<Vec<_>>(), vec!["root_b"]);
        assert!(slot.is_empty());
        assert!(slot.take().is_none());
    }
}
