//! Remote note service contract.
//!
//! # Responsibility
//! - Define the async boundary between the local cache and the backend that
//!   owns persistence, authentication and change notification.
//! - Define the error taxonomy every backend maps its failures into.
//!
//! # Invariants
//! - `list_notes` returns rows ordered by `created_at DESC, id ASC`.
//! - `update_note` fails with `RemoteError::Conflict` when the patch version
//!   is not exactly one above the stored version.
//! - Change feeds stop delivering events once dropped.

use crate::db::DbError;
use crate::model::identity::Identity;
use crate::model::note::{Note, NoteDraft, NoteId, NotePatch, NoteValidationError};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

mod change_feed;
pub mod sqlite;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure reported by a remote note service call.
#[derive(Debug)]
pub enum RemoteError {
    /// Network or service failure.
    Unavailable(String),
    /// Version/uniqueness constraint rejected a write.
    Conflict(NoteId),
    /// Target note no longer exists.
    NotFound(NoteId),
    /// Mutating call without a signed-in identity.
    Unauthenticated,
    /// Call did not settle within the configured request timeout.
    Timeout(Duration),
    Validation(NoteValidationError),
    InvalidData(String),
    Db(DbError),
}

impl RemoteError {
    /// Stable code used in structured log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "remote_unavailable",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::Timeout(_) => "timeout",
            Self::Validation(_) => "validation",
            Self::InvalidData(_) => "invalid_data",
            Self::Db(_) => "db",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote service unavailable: {message}"),
            Self::Conflict(id) => write!(f, "note {id} was modified concurrently"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Unauthenticated => write!(f, "no authenticated identity"),
            Self::Timeout(after) => {
                write!(f, "remote call timed out after {}ms", after.as_millis())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid remote note data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for RemoteError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RemoteError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Offset/limit window over the `created_at DESC` note order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteListQuery {
    pub offset: u32,
    pub limit: u32,
}

impl NoteListQuery {
    /// Window for the zero-based `page` of size `page_size`.
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            offset: page.saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// Backend that owns notes, identities and the realtime change feed.
///
/// Implementations must be `Send + Sync`; the cache shares one instance
/// between view-driven calls and the realtime task.
#[async_trait]
pub trait RemoteNoteService: Send + Sync {
    /// Returns the signed-in identity, or `None` for anonymous sessions.
    async fn current_identity(&self) -> RemoteResult<Option<Identity>>;
    /// Lists one window of notes ordered by `created_at DESC`.
    async fn list_notes(&self, query: &NoteListQuery) -> RemoteResult<Vec<Note>>;
    /// Creates a note and returns the server record.
    async fn insert_note(&self, draft: NoteDraft) -> RemoteResult<Note>;
    /// Reads the stored version of one note.
    async fn note_version(&self, id: NoteId) -> RemoteResult<Option<i64>>;
    /// Applies a versioned update and returns the server record.
    async fn update_note(&self, id: NoteId, patch: NotePatch) -> RemoteResult<Note>;
    /// Deletes one note.
    async fn delete_note(&self, id: NoteId) -> RemoteResult<()>;
    /// Opens a change feed for the notes collection.
    async fn subscribe_changes(&self) -> RemoteResult<ChangeFeed>;
}

#[cfg(test)]
mod tests {
    use super::{NoteListQuery, RemoteError};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn page_window_uses_page_times_size_offset() {
        assert_eq!(
            NoteListQuery::page(2, 10),
            NoteListQuery {
                offset: 20,
                limit: 10
            }
        );
        assert_eq!(NoteListQuery::page(u32::MAX, 10).offset, u32::MAX);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RemoteError::Conflict(Uuid::nil()).error_code(), "conflict");
        assert_eq!(
            RemoteError::Timeout(Duration::from_millis(5)).error_code(),
            "timeout"
        );
        assert_eq!(RemoteError::Unauthenticated.error_code(), "unauthenticated");
    }
}
