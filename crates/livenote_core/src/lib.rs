//! Core note sync logic for LiveNote.
//! This crate owns the client-side note cache and its reconciliation rules.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod preview;
pub mod remote;
pub mod session;

pub use cache::{
    CacheState, ChannelNoticeSink, FetchOutcome, LogNoticeSink, MutationOutcome, NoteCache,
    Notice, NoticeSink, RealtimeSubscription,
};
pub use config::{CacheConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::identity::{Identity, GUEST_DISPLAY_NAME};
pub use model::note::{
    FocusMode, FocusedNote, Note, NoteDraft, NoteId, NotePatch, NoteValidationError,
    INITIAL_NOTE_VERSION,
};
pub use preview::{content_stats, derive_note_preview, plain_text, ContentStats, NotePreview};
pub use remote::sqlite::{SqliteNoteService, SqliteNoteStore};
pub use remote::{
    ChangeEvent, ChangeFeed, ChangeKind, NoteListQuery, RemoteError, RemoteNoteService,
    RemoteResult,
};
pub use session::NoteSession;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
