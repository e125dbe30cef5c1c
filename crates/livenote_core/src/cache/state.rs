//! Cache state container and its primitive transitions.
//!
//! # Invariants
//! - `notes` never holds two entries with the same `id`.
//! - Page loads and local inserts keep `notes` ordered by `created_at DESC`;
//!   realtime inserts are prepended without re-sorting.
//! - `current_note` is only changed through the transitions below.

use crate::model::note::{FocusedNote, Note, NoteId};

/// Snapshot of the local mirror of the remote note list.
///
/// The view layer only ever receives clones of this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheState {
    pub notes: Vec<Note>,
    pub current_note: Option<FocusedNote>,
    /// True while a page fetch is outstanding.
    pub loading: bool,
    /// True when the last page fetch returned a full page.
    pub has_more: bool,
    /// Next page index to fetch.
    pub page: u32,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            current_note: None,
            loading: false,
            has_more: true,
            page: 1,
        }
    }
}

impl CacheState {
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|note| note.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Replaces the list with the first page.
    pub(crate) fn replace_first_page(&mut self, notes: Vec<Note>, page_size: u32) {
        self.has_more = is_full_page(notes.len(), page_size);
        self.notes = notes;
        self.page = 1;
        self.loading = false;
    }

    /// Appends a later page, skipping IDs already mirrored.
    ///
    /// Realtime inserts shift the remote offsets, so a later page can repeat
    /// rows that are already present.
    pub(crate) fn append_page(&mut self, notes: Vec<Note>, page_size: u32) -> usize {
        self.has_more = is_full_page(notes.len(), page_size);
        self.page = self.page.saturating_add(1);
        self.loading = false;

        let before = self.notes.len();
        for note in notes {
            if self.position(note.id).is_none() {
                self.notes.push(note);
            }
        }
        self.notes.len() - before
    }

    /// Puts `note` at the head of the list, or replaces it in place if the
    /// same ID is already mirrored.
    pub(crate) fn prepend(&mut self, note: Note) {
        match self.position(note.id) {
            Some(index) => self.notes[index] = note,
            None => self.notes.insert(0, note),
        }
    }

    /// Replaces the entry with the same ID in place. Returns whether it existed.
    pub(crate) fn replace(&mut self, note: Note) -> bool {
        match self.position(note.id) {
            Some(index) => {
                self.notes[index] = note;
                true
            }
            None => false,
        }
    }

    /// Removes the entry and clears a matching focused note.
    pub(crate) fn remove(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        if self.focused_id() == Some(id) {
            self.current_note = None;
        }
        self.notes.len() != before
    }

    /// Refreshes a matching focused note's fields, keeping its mode.
    pub(crate) fn refresh_focused(&mut self, note: &Note) {
        if let Some(focused) = self.current_note.as_mut() {
            if focused.note.id == note.id {
                focused.note = note.clone();
            }
        }
    }

    pub(crate) fn set_focused(&mut self, focused: Option<FocusedNote>) {
        self.current_note = focused;
    }

    fn focused_id(&self) -> Option<NoteId> {
        self.current_note.as_ref().map(FocusedNote::id)
    }
}

fn is_full_page(returned: usize, page_size: u32) -> bool {
    u32::try_from(returned).is_ok_and(|count| count == page_size)
}
