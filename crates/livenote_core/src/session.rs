//! Authenticated session lifecycle.
//!
//! # Responsibility
//! - Construct one note cache per signed-in session.
//! - Start the realtime feed and the initial page load.
//! - Tear the realtime feed down at sign-out.
//!
//! # Invariants
//! - The realtime subscription is opened before the first fetch, so writes
//!   committed while the first page is in flight are not missed.
//! - After `end` (or drop) the session holds no live feed handle.

use crate::cache::{FetchOutcome, NoteCache, NoticeSink, RealtimeSubscription};
use crate::config::CacheConfig;
use crate::remote::RemoteNoteService;
use log::info;
use std::sync::Arc;

/// One signed-in session: a cache plus its realtime subscription.
pub struct NoteSession {
    cache: NoteCache,
    realtime: Option<RealtimeSubscription>,
}

impl NoteSession {
    /// Builds the cache, subscribes to changes and loads the first page.
    pub async fn start(
        remote: Arc<dyn RemoteNoteService>,
        config: CacheConfig,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let cache = NoteCache::new(remote, config, notices);
        let realtime = cache.handle_realtime_changes().await;
        let initial = cache.fetch_notes().await;
        info!(
            "event=session_start module=session status={} realtime={}",
            match initial {
                FetchOutcome::Loaded { .. } => "ok",
                _ => "degraded",
            },
            realtime.is_some()
        );
        Self { cache, realtime }
    }

    pub fn cache(&self) -> &NoteCache {
        &self.cache
    }

    /// Returns whether the realtime feed is still attached.
    pub fn is_live(&self) -> bool {
        self.realtime
            .as_ref()
            .is_some_and(RealtimeSubscription::is_active)
    }

    /// Ends the session and unsubscribes the realtime feed.
    pub fn end(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.realtime.take() {
            subscription.unsubscribe();
            info!("event=session_end module=session status=ok");
        }
    }
}

impl Drop for NoteSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
