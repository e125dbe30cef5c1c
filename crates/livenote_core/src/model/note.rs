//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted note record mirrored by the local cache.
//! - Define write payloads (`NoteDraft`, `NotePatch`) sent to the remote service.
//! - Define the focused-note projection used by the view layer.
//!
//! # Invariants
//! - `id`, `created_at` and `user_id` are server-assigned and never change.
//! - `version` starts at `1` and grows by exactly one per successful update.
//! - `content` is opaque markup; the core never interprets it.

use crate::model::identity::Identity;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier assigned by the remote service on creation.
pub type NoteId = Uuid;

/// Version carried by every freshly created note.
pub const INITIAL_NOTE_VERSION: i64 = 1;

/// Persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned stable ID.
    pub id: NoteId,
    pub title: String,
    /// Rich markup produced by the editor widget.
    pub content: String,
    /// Unix epoch milliseconds. Canonical (descending) display order.
    pub created_at: i64,
    /// Owning identity ID.
    pub user_id: String,
    /// Display name of the most recent writer.
    pub last_edited_by: String,
    /// Optimistic-concurrency counter, bumped on each update.
    pub version: i64,
}

/// Validation error for persisted note state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    NegativeCreatedAt(i64),
    InvalidVersion(i64),
    EmptyUserId,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeCreatedAt(value) => write!(f, "created_at must be >= 0, got {value}"),
            Self::InvalidVersion(value) => write!(f, "version must be >= 1, got {value}"),
            Self::EmptyUserId => write!(f, "user_id must not be empty"),
        }
    }
}

impl Error for NoteValidationError {}

impl Note {
    /// Checks record-level invariants.
    ///
    /// Used on read-back paths so malformed rows surface as errors instead of
    /// leaking into the cache.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.created_at < 0 {
            return Err(NoteValidationError::NegativeCreatedAt(self.created_at));
        }
        if self.version < INITIAL_NOTE_VERSION {
            return Err(NoteValidationError::InvalidVersion(self.version));
        }
        if self.user_id.trim().is_empty() {
            return Err(NoteValidationError::EmptyUserId);
        }
        Ok(())
    }
}

/// Insert payload for a new note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub last_edited_by: String,
    pub version: i64,
}

impl NoteDraft {
    /// Builds a version-1 draft authored by `identity`.
    pub fn new(title: impl Into<String>, content: impl Into<String>, identity: &Identity) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            user_id: identity.id.clone(),
            last_edited_by: identity.display_name(),
            version: INITIAL_NOTE_VERSION,
        }
    }
}

/// Update payload for an existing note.
///
/// `version` is the *new* version; the remote service rejects it unless it is
/// exactly one above the stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePatch {
    pub title: String,
    pub content: String,
    pub last_edited_by: String,
    pub version: i64,
}

/// Presentation mode of the focused note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    View,
    Edit,
}

/// Note currently shown in detail by the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedNote {
    pub note: Note,
    pub mode: FocusMode,
}

impl FocusedNote {
    pub fn new(note: Note, mode: FocusMode) -> Self {
        Self { note, mode }
    }

    pub fn viewing(note: Note) -> Self {
        Self::new(note, FocusMode::View)
    }

    pub fn editing(note: Note) -> Self {
        Self::new(note, FocusMode::Edit)
    }

    pub fn id(&self) -> NoteId {
        self.note.id
    }

    pub fn is_editing(&self) -> bool {
        self.mode == FocusMode::Edit
    }
}
