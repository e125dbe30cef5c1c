//! Local note cache: the client-side mirror of the remote note list.
//!
//! # Responsibility
//! - Page the remote `created_at DESC` list into local state.
//! - Apply confirmed inserts, versioned updates and deletes locally.
//! - Own the focused-note slot and the realtime reconciliation task.
//!
//! # Invariants
//! - State is only mutated under the write lock, and the lock is never held
//!   across a remote call.
//! - Every committed mutation is published on the watch channel.
//! - Remote failures are logged and swallowed; only update conflicts reach
//!   the user, through the `NoticeSink`.
//! - Inserts are applied after server confirmation, never optimistically.
//! - Every remote call is bounded by `CacheConfig::request_timeout`.

use crate::cache::notice::{LogNoticeSink, Notice, NoticeSink};
use crate::cache::realtime::{apply_change, RealtimeSlot, RealtimeSubscription};
use crate::cache::state::CacheState;
use crate::config::CacheConfig;
use crate::model::identity::Identity;
use crate::model::note::{FocusedNote, NoteDraft, NoteId, NotePatch};
use crate::remote::{NoteListQuery, RemoteError, RemoteNoteService, RemoteResult};
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Result of a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { received: usize, has_more: bool },
    /// Guard rejected the call; no request was made.
    Skipped,
    Failed,
}

/// Result of a note mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied(NoteId),
    /// No identity, or an empty draft.
    Skipped,
    NotFound,
    Conflict,
    Failed,
}

struct SharedState {
    state: RwLock<CacheState>,
    updates: watch::Sender<CacheState>,
    realtime: Arc<RealtimeSlot>,
}

impl SharedState {
    async fn mutate<T>(&self, apply: impl FnOnce(&mut CacheState) -> T) -> T {
        let mut state = self.state.write().await;
        let result = apply(&mut state);
        self.publish(&state);
        result
    }

    fn publish(&self, state: &CacheState) {
        self.updates.send_replace(state.clone());
    }
}

/// Session-scoped note cache.
///
/// Cloning is cheap; clones share state, the remote handle and the realtime
/// subscription slot.
#[derive(Clone)]
pub struct NoteCache {
    remote: Arc<dyn RemoteNoteService>,
    notices: Arc<dyn NoticeSink>,
    config: CacheConfig,
    shared: Arc<SharedState>,
}

impl NoteCache {
    /// Creates an empty cache. `config` is normalized first.
    pub fn new(
        remote: Arc<dyn RemoteNoteService>,
        config: CacheConfig,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let initial = CacheState::default();
        let (updates, _) = watch::channel(initial.clone());
        Self {
            remote,
            notices,
            config: config.normalized(),
            shared: Arc::new(SharedState {
                state: RwLock::new(initial),
                updates,
                realtime: Arc::new(RealtimeSlot::default()),
            }),
        }
    }

    /// Creates a cache with default config that only logs notices.
    pub fn with_defaults(remote: Arc<dyn RemoteNoteService>) -> Self {
        Self::new(remote, CacheConfig::default(), Arc::new(LogNoticeSink))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns a copy of the current state.
    pub async fn snapshot(&self) -> CacheState {
        self.shared.state.read().await.clone()
    }

    /// Subscribes to state changes. The receiver starts at the latest state.
    pub fn watch(&self) -> watch::Receiver<CacheState> {
        self.shared.updates.subscribe()
    }

    pub fn is_realtime_active(&self) -> bool {
        self.shared.realtime.is_held()
    }

    /// Loads the first page, replacing the list wholesale.
    pub async fn fetch_notes(&self) -> FetchOutcome {
        let page_size = self.config.page_size;
        self.shared.mutate(|state| state.loading = true).await;
        info!("event=notes_fetch module=cache status=start page_size={page_size}");

        let query = NoteListQuery::page(0, page_size);
        match self.call(self.remote.list_notes(&query)).await {
            Ok(notes) => {
                let received = notes.len();
                let has_more = self
                    .shared
                    .mutate(|state| {
                        state.replace_first_page(notes, page_size);
                        state.has_more
                    })
                    .await;
                info!(
                    "event=notes_fetch module=cache status=ok received={received} has_more={has_more}"
                );
                FetchOutcome::Loaded { received, has_more }
            }
            Err(err) => {
                self.shared.mutate(|state| state.loading = false).await;
                log_failure("notes_fetch", &err);
                FetchOutcome::Failed
            }
        }
    }

    /// Appends the next page unless a fetch is in flight or the list is
    /// exhausted.
    pub async fn load_more_notes(&self) -> FetchOutcome {
        let page_size = self.config.page_size;
        let page = {
            let mut state = self.shared.state.write().await;
            if state.loading || !state.has_more {
                debug!(
                    "event=notes_load_more module=cache status=skip loading={} has_more={}",
                    state.loading, state.has_more
                );
                return FetchOutcome::Skipped;
            }
            state.loading = true;
            self.shared.publish(&state);
            state.page
        };
        info!("event=notes_load_more module=cache status=start page={page}");

        let query = NoteListQuery::page(page, page_size);
        match self.call(self.remote.list_notes(&query)).await {
            Ok(notes) => {
                let received = notes.len();
                let (added, has_more) = self
                    .shared
                    .mutate(|state| (state.append_page(notes, page_size), state.has_more))
                    .await;
                info!(
                    "event=notes_load_more module=cache status=ok page={page} received={received} added={added} has_more={has_more}"
                );
                FetchOutcome::Loaded { received, has_more }
            }
            Err(err) => {
                self.shared.mutate(|state| state.loading = false).await;
                log_failure("notes_load_more", &err);
                FetchOutcome::Failed
            }
        }
    }

    /// Creates a note and prepends the confirmed server record.
    pub async fn add_note(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> MutationOutcome {
        let identity = match self.acting_identity("note_add").await {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        let draft = NoteDraft::new(title, content, &identity);
        match self.call(self.remote.insert_note(draft)).await {
            Ok(note) => {
                let id = note.id;
                self.shared.mutate(|state| state.prepend(note)).await;
                info!("event=note_add module=cache status=ok id={id}");
                MutationOutcome::Applied(id)
            }
            Err(err) => mutation_failure("note_add", err),
        }
    }

    /// Writes new title/content with `version = remote version + 1`.
    ///
    /// On success the entry is replaced and the focused note is cleared. A
    /// version conflict raises `Notice::ConcurrentModification` and leaves
    /// local state untouched.
    pub async fn update_note(
        &self,
        id: NoteId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> MutationOutcome {
        let identity = match self.acting_identity("note_update").await {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        let current_version = match self.call(self.remote.note_version(id)).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                info!("event=note_update module=cache status=skip reason=not_found id={id}");
                return MutationOutcome::NotFound;
            }
            Err(err) => return mutation_failure("note_update", err),
        };

        let Some(next_version) = current_version.checked_add(1) else {
            error!(
                "event=note_update module=cache status=error reason=version_overflow id={id} base_version={current_version}"
            );
            return MutationOutcome::Failed;
        };
        let patch = NotePatch {
            title: title.into(),
            content: content.into(),
            last_edited_by: identity.display_name(),
            version: next_version,
        };
        match self.call(self.remote.update_note(id, patch)).await {
            Ok(note) => {
                let version = note.version;
                self.shared
                    .mutate(|state| {
                        state.replace(note);
                        state.set_focused(None);
                    })
                    .await;
                info!("event=note_update module=cache status=ok id={id} version={version}");
                MutationOutcome::Applied(id)
            }
            Err(RemoteError::Conflict(_)) => {
                warn!(
                    "event=note_update module=cache status=conflict id={id} base_version={current_version}"
                );
                self.notices
                    .notify(Notice::ConcurrentModification { note_id: id });
                MutationOutcome::Conflict
            }
            Err(err) => mutation_failure("note_update", err),
        }
    }

    /// Deletes a note and drops it (and a matching focus) locally.
    ///
    /// A note the remote no longer has is dropped locally as well and
    /// reported as `NotFound`.
    pub async fn delete_note(&self, id: NoteId) -> MutationOutcome {
        match self.call(self.remote.delete_note(id)).await {
            Ok(()) => {
                let removed = self.shared.mutate(|state| state.remove(id)).await;
                info!("event=note_delete module=cache status=ok id={id} was_listed={removed}");
                MutationOutcome::Applied(id)
            }
            Err(RemoteError::NotFound(_)) => {
                let removed = self.shared.mutate(|state| state.remove(id)).await;
                info!(
                    "event=note_delete module=cache status=skip reason=not_found id={id} was_listed={removed}"
                );
                MutationOutcome::NotFound
            }
            Err(err) => mutation_failure("note_delete", err),
        }
    }

    /// Sets or clears the focused note. Purely local.
    pub async fn set_current_note(&self, focused: Option<FocusedNote>) {
        self.shared.mutate(|state| state.set_focused(focused)).await;
    }

    /// Saves the editor draft: updates the focused note when one is set,
    /// otherwise creates a new note.
    ///
    /// Drafts whose title or raw markup is blank are ignored. Markup without
    /// text, such as a lone image, still counts as content.
    pub async fn submit_draft(&self, title: &str, content: &str) -> MutationOutcome {
        if title.trim().is_empty() || content.trim().is_empty() {
            debug!("event=draft_submit module=cache status=skip reason=empty_draft");
            return MutationOutcome::Skipped;
        }

        let focused_id = self
            .shared
            .state
            .read()
            .await
            .current_note
            .as_ref()
            .map(FocusedNote::id);
        match focused_id {
            Some(id) => self.update_note(id, title, content).await,
            None => self.add_note(title, content).await,
        }
    }

    /// Starts reconciling remote change events into this cache.
    ///
    /// Returns `None` when a subscription is already live or the feed could
    /// not be opened. The returned handle tears the feed down when dropped.
    pub async fn handle_realtime_changes(&self) -> Option<RealtimeSubscription> {
        let Some(generation) = self.shared.realtime.claim() else {
            warn!("event=realtime_subscribe module=cache status=skip reason=already_subscribed");
            return None;
        };

        let mut feed = match self.call(self.remote.subscribe_changes()).await {
            Ok(feed) => feed,
            Err(err) => {
                self.shared.realtime.release(generation);
                log_failure("realtime_subscribe", &err);
                return None;
            }
        };
        info!("event=realtime_subscribe module=cache status=ok");

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            while let Some(event) = feed.next().await {
                debug!(
                    "event=realtime_change module=cache status=ok kind={} id={}",
                    event.kind().as_str(),
                    event.note_id()
                );
                shared.mutate(|state| apply_change(state, event)).await;
            }
            shared.realtime.release(generation);
            info!("event=realtime_closed module=cache status=ok generation={generation}");
        });

        Some(RealtimeSubscription::new(
            task,
            Arc::clone(&self.shared.realtime),
            generation,
        ))
    }

    async fn acting_identity(&self, event: &'static str) -> Result<Identity, MutationOutcome> {
        match self.call(self.remote.current_identity()).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                debug!("event={event} module=cache status=skip reason=unauthenticated");
                Err(MutationOutcome::Skipped)
            }
            Err(err) => Err(mutation_failure(event, err)),
        }
    }

    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let limit = self.config.request_timeout();
        tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(RemoteError::Timeout(limit)))
    }
}

fn log_failure(event: &'static str, err: &RemoteError) {
    error!(
        "event={event} module=cache status=error error_code={} error={err}",
        err.error_code()
    );
}

fn mutation_failure(event: &'static str, err: RemoteError) -> MutationOutcome {
    match err {
        RemoteError::Unauthenticated => {
            debug!("event={event} module=cache status=skip reason=unauthenticated");
            MutationOutcome::Skipped
        }
        RemoteError::NotFound(id) => {
            info!("event={event} module=cache status=skip reason=not_found id={id}");
            MutationOutcome::NotFound
        }
        other => {
            log_failure(event, &other);
            MutationOutcome::Failed
        }
    }
}
