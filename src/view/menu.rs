//! Context-menu actions.
//!
//! The menu is a fixed table; each entry decides from the current
//! [`MenuState`] whether it is enabled.

use serde::Serialize;

use crate::models::ElementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    /// Remove the targeted element (and a node's incident edges).
    Remove,
    /// Put back the most recent removal.
    Undo,
}

impl MenuAction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "remove" => Some(Self::Remove),
            "undo" => Some(Self::Undo),
            _ => None,
        }
    }
}

/// What the menu was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    pub target: Option<ElementKind>,
    pub can_undo: bool,
}

struct MenuEntry {
    action: MenuAction,
    label: &'static str,
    enabled: fn(&MenuState) -> bool,
}

const MENU: [MenuEntry; 2] = [
    MenuEntry {
        action: MenuAction::Remove,
        label: "Remove",
        enabled: has_target,
    },
    MenuEntry {
        action: MenuAction::Undo,
        label: "Undo remove",
        enabled: can_undo,
    },
];

fn has_target(state: &MenuState) -> bool {
    state.target.is_some()
}

fn can_undo(state: &MenuState) -> bool {
    state.can_undo
}

/// A rendered menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub action: MenuAction,
    pub label: &'static str,
    pub enabled: bool,
}

/// Builds the menu for `state`.
pub fn context_menu(state: &MenuState) -> Vec<MenuItem> {
    MENU.iter()
        .map(|entry| MenuItem {
            action: entry.action,
            label: entry.label,
            enabled: (entry.enabled)(state),
        })
        .collect()
}
