#![allow(dead_code)]

use async_trait::async_trait;
use livenote_core::{
    CacheState, ChangeEvent, ChangeFeed, Identity, Note, NoteCache, NoteDraft, NoteId,
    NoteListQuery, NotePatch, RemoteError, RemoteNoteService, RemoteResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Scriptable in-memory remote used by the cache tests.
pub struct FakeRemote {
    inner: Mutex<FakeInner>,
    feed: Mutex<Option<mpsc::UnboundedSender<ChangeEvent>>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_subscribe: AtomicBool,
    pub hang: AtomicBool,
    /// Simulates another writer committing right after each version read.
    pub race_version_reads: AtomicBool,
    pub list_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
}

struct FakeInner {
    notes: Vec<Note>,
    identity: Option<Identity>,
    clock: i64,
}

impl FakeRemote {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            inner: Mutex::new(FakeInner {
                notes: Vec::new(),
                identity,
                clock: 1_000,
            }),
            feed: Mutex::new(None),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            race_version_reads: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn signed_in(id: &str) -> Self {
        Self::new(Some(Identity::new(id).with_username(format!("{id}-name"))))
    }

    /// Seeds `count` notes; note `i` is created after note `i - 1`.
    pub fn seed(&self, count: usize) -> Vec<Note> {
        (0..count)
            .map(|index| self.seed_note(&format!("seed {index}")))
            .collect()
    }

    pub fn seed_note(&self, title: &str) -> Note {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let note = Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: format!("<p>{title}</p>"),
            created_at: inner.clock,
            user_id: "seed-user".to_string(),
            last_edited_by: "seed-user".to_string(),
            version: 1,
        };
        inner.notes.push(note.clone());
        note
    }

    /// Bumps the stored version as if another writer saved first.
    pub fn bump_version(&self, id: NoteId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(note) = inner.notes.iter_mut().find(|note| note.id == id) {
            note.version += 1;
        }
    }

    /// Overwrites the stored version directly.
    pub fn set_version(&self, id: NoteId, version: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(note) = inner.notes.iter_mut().find(|note| note.id == id) {
            note.version = version;
        }
    }

    /// Drops a note from the store without emitting a change event.
    pub fn remove_stored(&self, id: NoteId) {
        self.inner.lock().unwrap().notes.retain(|note| note.id != id);
    }

    pub fn stored(&self, id: NoteId) -> Option<Note> {
        let inner = self.inner.lock().unwrap();
        inner.notes.iter().find(|note| note.id == id).cloned()
    }

    pub fn stored_count(&self) -> usize {
        self.inner.lock().unwrap().notes.len()
    }

    /// Pushes an event into the live feed. Returns false when none is open.
    pub fn emit(&self, event: ChangeEvent) -> bool {
        self.feed
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Returns whether the last opened feed still has a receiver.
    pub fn feed_is_open(&self) -> bool {
        self.feed
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Closes the live feed from the remote side.
    pub fn close_feed(&self) {
        self.feed.lock().unwrap().take();
    }

    async fn gate(&self, fail: &AtomicBool) -> RemoteResult<()> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn require_identity(&self) -> RemoteResult<Identity> {
        self.inner
            .lock()
            .unwrap()
            .identity
            .clone()
            .ok_or(RemoteError::Unauthenticated)
    }
}

#[async_trait]
impl RemoteNoteService for FakeRemote {
    async fn current_identity(&self) -> RemoteResult<Option<Identity>> {
        self.gate(&self.fail_reads).await?;
        Ok(self.inner.lock().unwrap().identity.clone())
    }

    async fn list_notes(&self, query: &NoteListQuery) -> RemoteResult<Vec<Note>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(&self.fail_reads).await?;
        let mut notes = self.inner.lock().unwrap().notes.clone();
        notes.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(notes
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn insert_note(&self, draft: NoteDraft) -> RemoteResult<Note> {
        self.gate(&self.fail_writes).await?;
        self.require_identity()?;
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let note = Note {
            id: Uuid::new_v4(),
            title: draft.title,
            content: draft.content,
            created_at: inner.clock,
            user_id: draft.user_id,
            last_edited_by: draft.last_edited_by,
            version: draft.version,
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    async fn note_version(&self, id: NoteId) -> RemoteResult<Option<i64>> {
        self.gate(&self.fail_reads).await?;
        let version = self.stored(id).map(|note| note.version);
        if self.race_version_reads.load(Ordering::SeqCst) {
            self.bump_version(id);
        }
        Ok(version)
    }

    async fn update_note(&self, id: NoteId, patch: NotePatch) -> RemoteResult<Note> {
        self.gate(&self.fail_writes).await?;
        self.require_identity()?;
        let mut inner = self.inner.lock().unwrap();
        let note = inner
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or(RemoteError::NotFound(id))?;
        if patch.version != note.version + 1 {
            return Err(RemoteError::Conflict(id));
        }
        note.title = patch.title;
        note.content = patch.content;
        note.last_edited_by = patch.last_edited_by;
        note.version = patch.version;
        Ok(note.clone())
    }

    async fn delete_note(&self, id: NoteId) -> RemoteResult<()> {
        self.gate(&self.fail_writes).await?;
        self.require_identity()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.notes.len();
        inner.notes.retain(|note| note.id != id);
        if inner.notes.len() == before {
            return Err(RemoteError::NotFound(id));
        }
        Ok(())
    }

    async fn subscribe_changes(&self) -> RemoteResult<ChangeFeed> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(&self.fail_subscribe).await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(sender);
        Ok(ChangeFeed::from_channel(receiver))
    }
}

/// Builds a remote-side note that the fake store does not know about.
pub fn foreign_note(title: &str, created_at: i64) -> Note {
    Note {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("<p>{title}</p>"),
        created_at,
        user_id: "other-user".to_string(),
        last_edited_by: "other".to_string(),
        version: 1,
    }
}

/// Waits until the published cache state satisfies `predicate`.
pub async fn wait_for(cache: &NoteCache, predicate: impl Fn(&CacheState) -> bool) -> CacheState {
    let mut updates = cache.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = updates.borrow_and_update().clone();
            if predicate(&current) {
                return current;
            }
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("cache state did not reach the expected shape in time")
}

pub fn titles(state: &CacheState) -> Vec<String> {
    state.notes.iter().map(|note| note.title.clone()).collect()
}
