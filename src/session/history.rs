//! In-memory session history.

use crate::image::GeneratedMedia;
use std::collections::VecDeque;
use uuid::Uuid;

/// Completed generations, most recent first, plus the displayed item.
///
/// Entries are only ever added at the front. Selecting an entry moves the
/// displayed pointer and never reorders or removes anything.
#[derive(Debug, Clone, Default)]
pub struct History {
    items: VecDeque<GeneratedMedia>,
    displayed: Option<Uuid>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `media` and makes it the displayed item.
    pub fn push(&mut self, media: GeneratedMedia) -> Uuid {
        let id = media.id;
        self.items.push_front(media);
        self.displayed = Some(id);
        id
    }

    /// Displays the entry with `id`. Returns false if it is not in history.
    pub fn select(&mut self, id: Uuid) -> bool {
        if self.get(id).is_some() {
            self.displayed = Some(id);
            true
        } else {
            false
        }
    }

    /// Displays the entry at 1-based `position` (1 = most recent).
    pub fn select_position(&mut self, position: usize) -> Option<&GeneratedMedia> {
        let id = self.at_position(position)?.id;
        self.displayed = Some(id);
        self.get(id)
    }

    /// Returns the currently displayed entry.
    pub fn displayed(&self) -> Option<&GeneratedMedia> {
        self.displayed.and_then(|id| self.get(id))
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: Uuid) -> Option<&GeneratedMedia> {
        self.items.iter().find(|media| media.id == id)
    }

    /// Returns the entry at 1-based `position` (1 = most recent).
    pub fn at_position(&self, position: usize) -> Option<&GeneratedMedia> {
        position.checked_sub(1).and_then(|index| self.items.get(index))
    }

    /// Iterates entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedMedia> {
        self.items.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
