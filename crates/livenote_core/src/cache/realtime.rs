//! Realtime reconciliation of remote change events into cache state.
//!
//! # Invariants
//! - Insert events are prepended without re-sorting against `created_at`;
//!   an insert from another session created earlier than the head of the
//!   list stays out of order until the next `fetch_notes`.
//! - Update events keep the entry's position and the focused note's mode.
//! - Delete events clear a matching focused note.
//! - At most one subscription owns a cache's realtime slot; a handle only
//!   ever releases the generation it claimed.

use crate::cache::state::CacheState;
use crate::remote::ChangeEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Applies one change event to the cache state.
pub(crate) fn apply_change(state: &mut CacheState, event: ChangeEvent) {
    match event {
        ChangeEvent::Insert(note) => state.prepend(note),
        ChangeEvent::Update(note) => {
            state.replace(note.clone());
            state.refresh_focused(&note);
        }
        ChangeEvent::Delete { id } => {
            state.remove(id);
        }
    }
}

/// Realtime ownership slot shared by every clone of a cache.
///
/// `owner` holds the generation of the live subscription, 0 when none.
#[derive(Debug, Default)]
pub(crate) struct RealtimeSlot {
    owner: AtomicU64,
    next: AtomicU64,
}

impl RealtimeSlot {
    /// Claims the slot for a fresh generation; `None` when already owned.
    pub(crate) fn claim(&self) -> Option<u64> {
        let generation = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.owner
            .compare_exchange(0, generation, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| generation)
    }

    /// Frees the slot if `generation` still owns it.
    pub(crate) fn release(&self, generation: u64) {
        let _ = self
            .owner
            .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub(crate) fn is_held(&self) -> bool {
        self.owner.load(Ordering::SeqCst) != 0
    }
}

/// Handle to the live realtime task of one cache.
///
/// `unsubscribe` (or dropping the handle) stops the task and releases the
/// remote feed.
#[derive(Debug)]
pub struct RealtimeSubscription {
    task: JoinHandle<()>,
    slot: Arc<RealtimeSlot>,
    generation: u64,
}

impl RealtimeSubscription {
    pub(crate) fn new(task: JoinHandle<()>, slot: Arc<RealtimeSlot>, generation: u64) -> Self {
        Self {
            task,
            slot,
            generation,
        }
    }

    /// Returns whether the feed is still delivering events.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.slot.release(self.generation);
    }
}
