//! SQLite-backed reference implementation of the remote note service.
//!
//! # Responsibility
//! - Own the shared `notes` table and the fan-out change channel
//!   (`SqliteNoteStore`).
//! - Give each session its own authentication state on top of the shared
//!   store (`SqliteNoteService`).
//!
//! # Invariants
//! - `created_at` values are strictly increasing in insertion order.
//! - Updates only commit when `patch.version == stored.version + 1`.
//! - A change event is broadcast only after its write has committed, and
//!   while the store lock is still held, so feed order equals commit order.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::identity::Identity;
use crate::model::note::{Note, NoteDraft, NoteId, NotePatch};
use crate::remote::{
    ChangeEvent, ChangeFeed, NoteListQuery, RemoteError, RemoteNoteService, RemoteResult,
};
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    user_id,
    last_edited_by,
    version
FROM notes";

const CHANGE_CHANNEL_CAPACITY: usize = 256;

struct StoreInner {
    conn: Connection,
    last_created_at: i64,
}

/// Shared note table plus its change broadcaster.
pub struct SqliteNoteStore {
    inner: Mutex<StoreInner>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteNoteStore {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `DbError::UninitializedConnection` when migrations were not applied.
    /// - `DbError::MissingRequiredTable` when `notes` is absent.
    pub fn try_new(conn: Connection) -> RemoteResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            }
            .into());
        }
        if !table_exists(&conn, "notes")? {
            return Err(DbError::MissingRequiredTable("notes").into());
        }

        let last_created_at: i64 =
            conn.query_row("SELECT COALESCE(MAX(created_at), 0) FROM notes;", [], |row| {
                row.get(0)
            })?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Mutex::new(StoreInner {
                conn,
                last_created_at,
            }),
            changes,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> RemoteResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> RemoteResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Returns the number of stored notes.
    pub async fn count(&self) -> RemoteResult<u64> {
        let inner = self.inner.lock().await;
        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Gets one note by ID.
    pub async fn get(&self, id: NoteId) -> RemoteResult<Option<Note>> {
        let inner = self.inner.lock().await;
        get_note(&inner.conn, id)
    }

    async fn list(&self, query: &NoteListQuery) -> RemoteResult<Vec<Note>> {
        let inner = self.inner.lock().await;
        list_notes(&inner.conn, query)
    }

    async fn version_of(&self, id: NoteId) -> RemoteResult<Option<i64>> {
        let inner = self.inner.lock().await;
        let version = inner
            .conn
            .query_row(
                "SELECT version FROM notes WHERE id = ?1;",
                [id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(version)
    }

    async fn insert(&self, draft: NoteDraft) -> RemoteResult<Note> {
        let note = {
            let mut inner = self.inner.lock().await;
            let created_at = next_created_at(inner.last_created_at);
            let note = Note {
                id: Uuid::new_v4(),
                title: draft.title,
                content: draft.content,
                created_at,
                user_id: draft.user_id,
                last_edited_by: draft.last_edited_by,
                version: draft.version,
            };
            note.validate()?;
            insert_note(&inner.conn, &note)?;
            inner.last_created_at = created_at;
            self.publish(ChangeEvent::Insert(note.clone()));
            note
        };

        debug!("event=note_insert module=remote status=ok id={}", note.id);
        Ok(note)
    }

    async fn update(&self, id: NoteId, patch: NotePatch) -> RemoteResult<Note> {
        let note = {
            let mut inner = self.inner.lock().await;
            let note = update_note_versioned(&mut inner.conn, id, &patch)?;
            self.publish(ChangeEvent::Update(note.clone()));
            note
        };

        debug!(
            "event=note_update module=remote status=ok id={} version={}",
            note.id, note.version
        );
        Ok(note)
    }

    async fn delete(&self, id: NoteId) -> RemoteResult<()> {
        {
            let inner = self.inner.lock().await;
            let changed = inner
                .conn
                .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(RemoteError::NotFound(id));
            }
            self.publish(ChangeEvent::Delete { id });
        }

        debug!("event=note_delete module=remote status=ok id={id}");
        Ok(())
    }

    fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::from_broadcast(self.changes.subscribe())
    }

    /// Callers hold the store lock.
    fn publish(&self, event: ChangeEvent) {
        // No subscribers is not an error.
        let _ = self.changes.send(event);
    }
}

/// One client session against a shared `SqliteNoteStore`.
pub struct SqliteNoteService {
    store: Arc<SqliteNoteStore>,
    identity: RwLock<Option<Identity>>,
}

impl SqliteNoteService {
    /// Creates an unauthenticated client.
    pub fn anonymous(store: Arc<SqliteNoteStore>) -> Self {
        Self {
            store,
            identity: RwLock::new(None),
        }
    }

    /// Creates a client that is already signed in.
    pub fn signed_in(store: Arc<SqliteNoteStore>, identity: Identity) -> Self {
        Self {
            store,
            identity: RwLock::new(Some(identity)),
        }
    }

    pub fn store(&self) -> &Arc<SqliteNoteStore> {
        &self.store
    }

    pub async fn sign_in(&self, identity: Identity) {
        info!(
            "event=sign_in module=remote status=ok guest={}",
            identity.is_guest
        );
        *self.identity.write().await = Some(identity);
    }

    pub async fn sign_out(&self) {
        info!("event=sign_out module=remote status=ok");
        *self.identity.write().await = None;
    }

    async fn require_identity(&self) -> RemoteResult<Identity> {
        self.identity
            .read()
            .await
            .clone()
            .ok_or(RemoteError::Unauthenticated)
    }
}

#[async_trait]
impl RemoteNoteService for SqliteNoteService {
    async fn current_identity(&self) -> RemoteResult<Option<Identity>> {
        Ok(self.identity.read().await.clone())
    }

    async fn list_notes(&self, query: &NoteListQuery) -> RemoteResult<Vec<Note>> {
        self.store.list(query).await
    }

    async fn insert_note(&self, draft: NoteDraft) -> RemoteResult<Note> {
        let identity = self.require_identity().await?;
        if draft.user_id != identity.id {
            return Err(RemoteError::InvalidData(
                "draft user_id does not match the signed-in identity".to_string(),
            ));
        }
        self.store.insert(draft).await
    }

    async fn note_version(&self, id: NoteId) -> RemoteResult<Option<i64>> {
        self.store.version_of(id).await
    }

    async fn update_note(&self, id: NoteId, patch: NotePatch) -> RemoteResult<Note> {
        self.require_identity().await?;
        self.store.update(id, patch).await
    }

    async fn delete_note(&self, id: NoteId) -> RemoteResult<()> {
        self.require_identity().await?;
        self.store.delete(id).await
    }

    async fn subscribe_changes(&self) -> RemoteResult<ChangeFeed> {
        Ok(self.store.subscribe())
    }
}

fn next_created_at(last: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default();
    now.max(last.saturating_add(1))
}

fn insert_note(conn: &Connection, note: &Note) -> RemoteResult<()> {
    conn.execute(
        "INSERT INTO notes (
            id,
            title,
            content,
            created_at,
            user_id,
            last_edited_by,
            version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            note.id.to_string(),
            note.title.as_str(),
            note.content.as_str(),
            note.created_at,
            note.user_id.as_str(),
            note.last_edited_by.as_str(),
            note.version,
        ],
    )?;
    Ok(())
}

fn update_note_versioned(conn: &mut Connection, id: NoteId, patch: &NotePatch) -> RemoteResult<Note> {
    let id_text = id.to_string();
    let tx = conn.transaction()?;

    let stored_version = tx
        .query_row(
            "SELECT version FROM notes WHERE id = ?1;",
            [id_text.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .ok_or(RemoteError::NotFound(id))?;
    if patch.version != stored_version.saturating_add(1) {
        return Err(RemoteError::Conflict(id));
    }

    let changed = tx.execute(
        "UPDATE notes
         SET
            title = ?2,
            content = ?3,
            last_edited_by = ?4,
            version = ?5
         WHERE id = ?1
           AND version = ?6;",
        params![
            id_text.as_str(),
            patch.title.as_str(),
            patch.content.as_str(),
            patch.last_edited_by.as_str(),
            patch.version,
            stored_version,
        ],
    )?;
    if changed == 0 {
        return Err(RemoteError::Conflict(id));
    }

    let note = get_note(&tx, id)?.ok_or(RemoteError::NotFound(id))?;
    tx.commit()?;
    Ok(note)
}

fn get_note(conn: &Connection, id: NoteId) -> RemoteResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

fn list_notes(conn: &Connection, query: &NoteListQuery) -> RemoteResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         ORDER BY created_at DESC, id ASC
         LIMIT ?1 OFFSET ?2;"
    ))?;
    let mut rows = stmt.query(params![i64::from(query.limit), i64::from(query.offset)])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn parse_note_row(row: &Row<'_>) -> RemoteResult<Note> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RemoteError::InvalidData(format!("invalid uuid value `{id_text}` in notes.id"))
    })?;

    let note = Note {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        user_id: row.get("user_id")?,
        last_edited_by: row.get("last_edited_by")?,
        version: row.get("version")?,
    };
    note.validate()?;
    Ok(note)
}

fn table_exists(conn: &Connection, table: &str) -> RemoteResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
