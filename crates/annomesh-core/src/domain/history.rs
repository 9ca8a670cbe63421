//! Local edit history with an undo/redo cursor.
//!
//! ```text
//!  elements:  [e1, e2, e3, e4]
//!  step:               ^ 2      → e1, e2 visible; e3, e4 form the redo tail
//! ```
//!
//! Pushing a new element while the cursor is behind the end discards the
//! redo tail first ("truncation on new edit").

use super::element::{AnnotationElement, ElementId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    elements: Vec<AnnotationElement>,
    step: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `element`, discarding any redo tail.
    pub fn push(&mut self, element: AnnotationElement) {
        self.elements.truncate(self.step);
        self.elements.push(element);
        self.step = self.elements.len();
    }

    /// Moves the cursor back one element and returns the element hidden.
    pub fn undo(&mut self) -> Option<&AnnotationElement> {
        if self.step == 0 {
            return None;
        }
        self.step -= 1;
        self.elements.get(self.step)
    }

    /// Moves the cursor forward one element and returns the element restored.
    pub fn redo(&mut self) -> Option<&AnnotationElement> {
        if self.step >= self.elements.len() {
            return None;
        }
        self.step += 1;
        self.elements.get(self.step - 1)
    }

    /// Elements currently visible (before the cursor).
    pub fn visible(&self) -> &[AnnotationElement] {
        &self.elements[..self.step]
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.step < self.elements.len()
    }

    pub fn get(&self, id: &str) -> Option<&AnnotationElement> {
        self.visible().iter().find(|e| e.id == id)
    }

    /// Mutable access to a visible element.  Elements in the redo tail are
    /// not editable.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut AnnotationElement> {
        self.elements[..self.step].iter_mut().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Removes an element anywhere in the history and clamps the cursor.
    pub fn remove(&mut self, id: &str) -> Option<AnnotationElement> {
        let index = self.elements.iter().position(|e| e.id == id)?;
        let removed = self.elements.remove(index);
        if index < self.step {
            self.step -= 1;
        }
        self.step = self.step.min(self.elements.len());
        Some(removed)
    }

    /// Replaces a visible element in place, keeping its position.
    pub fn replace(&mut self, id: &str, element: AnnotationElement) -> bool {
        match self.get_mut(id) {
            Some(slot) => {
                *slot = element;
                true
            }
            None => false,
        }
    }

    /// Inserts `elements` at the position of `id`, replacing it.
    pub fn splice(&mut self, id: &str, elements: Vec<AnnotationElement>) -> bool {
        let Some(index) = self.elements[..self.step].iter().position(|e| e.id == id) else {
            return false;
        };
        let added = elements.len();
        self.elements.splice(index..=index, elements);
        self.step = self.step + added - 1;
        true
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.step = 0;
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.visible().iter().map(|e| e.id.clone()).collect()
    }
}
