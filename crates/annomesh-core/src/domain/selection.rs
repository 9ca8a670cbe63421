//! The local selection: which elements a move/resize/group acts on.
//!
//! Selections are never sent over the wire.  Only the element mutations they
//! lead to are replicated.

use std::collections::BTreeSet;

use super::element::ElementId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<ElementId>,
    primary: Option<ElementId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection with a single element.
    pub fn select_only(&mut self, id: impl Into<ElementId>) {
        let id = id.into();
        self.ids.clear();
        self.ids.insert(id.clone());
        self.primary = Some(id);
    }

    /// Adds `id` if absent, removes it if present.  The primary moves to the
    /// toggled element when added, or to the smallest remaining id when the
    /// primary itself is removed.
    pub fn toggle(&mut self, id: impl Into<ElementId>) {
        let id = id.into();
        if self.ids.remove(&id) {
            if self.primary.as_ref() == Some(&id) {
                self.primary = self.ids.iter().next().cloned();
            }
        } else {
            self.ids.insert(id.clone());
            self.primary = Some(id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.primary = None;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drops ids for which `exists` returns false, e.g. after a remote delete.
    pub fn retain(&mut self, mut exists: impl FnMut(&str) -> bool) {
        self.ids.retain(|id| exists(id.as_str()));
        if let Some(primary) = &self.primary {
            if !self.ids.contains(primary) {
                self.primary = self.ids.iter().next().cloned();
            }
        }
    }
}
