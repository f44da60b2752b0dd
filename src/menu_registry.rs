//! Mirror of the menu items LCDd believes exist
//!
//! LCDd applies every add and delete unconditionally, so this registry is
//! the only place that knows what is currently shown. Every mutation queues
//! the matching protocol command; the session drains and sends them in order.

use crate::{
    menu_id::MenuId,
    protocol::{Command, ItemAttribute, WidgetSpec},
};
use anyhow::{Result, bail};
use log::debug;
use std::collections::HashMap;

/// Key of the client main menu. `""` is avoided so that "root" and
/// "no entry" cannot be confused.
const ROOT_KEY: &str = "_";

#[derive(Debug, Default)]
pub struct MenuRegistry {
    children: HashMap<String, Vec<MenuId>>,
    outbox: Vec<Command>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(parent: &MenuId) -> String {
        match parent {
            MenuId::Root => ROOT_KEY.to_string(),
            id => id.to_string(),
        }
    }

    /// Record a new item and queue its `menu_add_item`
    ///
    /// Adding an id that already exists below `parent` is a caller error:
    /// nothing is recorded or sent.
    pub fn add_item(&mut self, parent: &MenuId, id: &MenuId, spec: WidgetSpec) -> Result<()> {
        if self.contains(parent, id) {
            bail!("failed to add menu item {id:?}: already present below {parent:?}");
        }

        self.children
            .entry(Self::key(parent))
            .or_default()
            .push(id.clone());

        self.outbox.push(Command::MenuAddItem {
            parent: parent.to_string(),
            id: id.to_string(),
            spec,
        });

        Ok(())
    }

    /// Forget an item with all its descendants and queue its `menu_del_item`
    ///
    /// The command is sent even if the item is unknown.
    pub fn del_item(&mut self, parent: &MenuId, id: &MenuId) {
        let key = Self::key(parent);

        if let Some(children) = self.children.get_mut(&key) {
            children.retain(|child| child != id);
            if children.is_empty() {
                self.children.remove(&key);
            }
        } else {
            debug!("deleting untracked menu item {id}");
        }

        self.forget_subtree(id);

        self.outbox.push(Command::MenuDelItem { id: id.to_string() });
    }

    fn forget_subtree(&mut self, id: &MenuId) {
        if let Some(children) = self.children.remove(&Self::key(id)) {
            for child in &children {
                self.forget_subtree(child);
            }
        }
    }

    /// Delete every child of `id` except placeholders, in insertion order
    pub fn empty_menu(&mut self, id: &MenuId) {
        for child in self.real_children(id) {
            self.del_item(id, &child);
        }
    }

    pub fn has_children(&self, id: &MenuId) -> bool {
        self.children
            .get(&Self::key(id))
            .is_some_and(|children| !children.is_empty())
    }

    pub fn list_children(&self, id: &MenuId) -> Vec<MenuId> {
        self.children
            .get(&Self::key(id))
            .cloned()
            .unwrap_or_default()
    }

    /// Children that are not placeholders
    pub fn real_children(&self, id: &MenuId) -> Vec<MenuId> {
        self.list_children(id)
            .into_iter()
            .filter(|child| !child.is_placeholder())
            .collect()
    }

    pub fn contains(&self, parent: &MenuId, id: &MenuId) -> bool {
        self.children
            .get(&Self::key(parent))
            .is_some_and(|children| children.contains(id))
    }

    pub fn set_text(&mut self, id: &MenuId, text: impl Into<String>) {
        self.outbox.push(Command::MenuSetItem {
            id: id.to_string(),
            attribute: ItemAttribute::Text(text.into()),
        });
    }

    pub fn set_hidden(&mut self, id: &MenuId, hidden: bool) {
        self.outbox.push(Command::MenuSetItem {
            id: id.to_string(),
            attribute: ItemAttribute::Hidden(hidden),
        });
    }

    /// Take all queued commands in the order they were produced
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    /// Drop all records, e.g. after the daemon connection was lost
    pub fn clear(&mut self) {
        self.children.clear();
        self.outbox.clear();
    }
}
