//! Local note cache and its realtime reconciliation.
//!
//! # Responsibility
//! - Keep an in-process, paginated mirror of the remote note list.
//! - Serialize local operations and realtime events through one state lock.
//! - Surface update conflicts to the user through a notice sink.
//!
//! # Invariants
//! - The view layer only reads snapshots; it never mutates cache state.
//! - At most one realtime subscription is live per cache.

mod note_cache;
pub mod notice;
mod realtime;
mod state;

pub use note_cache::{FetchOutcome, MutationOutcome, NoteCache};
pub use notice::{ChannelNoticeSink, LogNoticeSink, Notice, NoticeSink};
pub use realtime::RealtimeSubscription;
pub use state::CacheState;
