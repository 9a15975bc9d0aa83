//! Position of the reviewer within an ordered set of objects.

use crate::model::ObjectId;

/// Navigation step requested by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Following object; stays on the last one at the end.
    Next,
    /// Preceding object; stays on the first one at the start.
    Previous,
    /// A specific object, e.g. after a click or a list selection.
    JumpTo(ObjectId),
}

/// Cursor over an explicit object order.
///
/// The primary pass walks the registry in ascending id order; a double-check
/// pass walks its sample. Each pass owns its own cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationCursor {
    order: Vec<ObjectId>,
    position: Option<usize>,
}

impl NavigationCursor {
    /// Cursor over `order`, positioned before the first object.
    pub fn new(order: Vec<ObjectId>) -> Self {
        Self {
            order,
            position: None,
        }
    }

    /// Objects in navigation order.
    pub fn order(&self) -> &[ObjectId] {
        &self.order
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there is nothing to navigate.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Index of the current object.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Current object.
    pub fn current(&self) -> Option<ObjectId> {
        self.position.map(|i| self.order[i])
    }

    /// Apply `step` and return the new current object.
    ///
    /// Returns `None` without moving when the order is empty or a jump
    /// target is not part of the order.
    pub fn navigate(&mut self, step: Navigation) -> Option<ObjectId> {
        let last = self.order.len().checked_sub(1)?;
        let target = match (step, self.position) {
            (Navigation::Next, None) | (Navigation::Previous, None) => 0,
            (Navigation::Next, Some(i)) => (i + 1).min(last),
            (Navigation::Previous, Some(i)) => i.saturating_sub(1),
            (Navigation::JumpTo(id), _) => self.order.iter().position(|&o| o == id)?,
        };
        self.position = Some(target);
        self.current()
    }
}
