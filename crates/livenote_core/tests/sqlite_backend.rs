use livenote_core::{
    ChangeEvent, ChangeKind, Identity, NoteDraft, NoteListQuery, NotePatch, RemoteError,
    RemoteNoteService, SqliteNoteService, SqliteNoteStore,
};
use std::sync::Arc;
use uuid::Uuid;

fn alice() -> Identity {
    Identity::new("alice").with_username("Alice")
}

fn service() -> (Arc<SqliteNoteStore>, SqliteNoteService) {
    let store = Arc::new(SqliteNoteStore::open_in_memory().unwrap());
    let service = SqliteNoteService::signed_in(store.clone(), alice());
    (store, service)
}

fn patch(title: &str, version: i64) -> NotePatch {
    NotePatch {
        title: title.to_string(),
        content: "<p>body</p>".to_string(),
        last_edited_by: "Alice".to_string(),
        version,
    }
}

#[tokio::test]
async fn insert_assigns_id_and_increasing_created_at() {
    let (store, service) = service();

    let first = service
        .insert_note(NoteDraft::new("one", "c", &alice()))
        .await
        .unwrap();
    let second = service
        .insert_note(NoteDraft::new("two", "c", &alice()))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert!(second.created_at > first.created_at);
    assert_eq!(first.version, 1);
    assert_eq!(first.user_id, "alice");
    assert_eq!(store.get(first.id).await.unwrap(), Some(first));
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn list_is_newest_first_and_windowed() {
    let (_store, service) = service();
    for index in 0..5 {
        service
            .insert_note(NoteDraft::new(format!("n{index}"), "c", &alice()))
            .await
            .unwrap();
    }

    let first = service.list_notes(&NoteListQuery::page(0, 2)).await.unwrap();
    let last = service.list_notes(&NoteListQuery::page(2, 2)).await.unwrap();
    let titles = |notes: &[livenote_core::Note]| {
        notes.iter().map(|note| note.title.clone()).collect::<Vec<_>>()
    };
    assert_eq!(titles(&first), vec!["n4", "n3"]);
    assert_eq!(titles(&last), vec!["n0"]);
    assert!(service
        .list_notes(&NoteListQuery::page(3, 2))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn update_requires_exact_next_version() {
    let (_store, service) = service();
    let note = service
        .insert_note(NoteDraft::new("t", "c", &alice()))
        .await
        .unwrap();

    let stale = service.update_note(note.id, patch("x", 1)).await.unwrap_err();
    assert!(matches!(stale, RemoteError::Conflict(id) if id == note.id));
    let skipped = service.update_note(note.id, patch("x", 3)).await.unwrap_err();
    assert!(matches!(skipped, RemoteError::Conflict(_)));

    let updated = service.update_note(note.id, patch("x", 2)).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.title, "x");
    assert_eq!(updated.created_at, note.created_at);
    assert_eq!(service.note_version(note.id).await.unwrap(), Some(2));
}

#[tokio::test]
async fn missing_notes_report_not_found() {
    let (_store, service) = service();
    let id = Uuid::new_v4();

    assert_eq!(service.note_version(id).await.unwrap(), None);
    assert!(matches!(
        service.update_note(id, patch("x", 2)).await.unwrap_err(),
        RemoteError::NotFound(_)
    ));
    assert!(matches!(
        service.delete_note(id).await.unwrap_err(),
        RemoteError::NotFound(_)
    ));
}

#[tokio::test]
async fn anonymous_sessions_cannot_write() {
    let store = Arc::new(SqliteNoteStore::open_in_memory().unwrap());
    let service = SqliteNoteService::anonymous(store.clone());

    assert_eq!(service.current_identity().await.unwrap(), None);
    let err = service
        .insert_note(NoteDraft::new("t", "c", &alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unauthenticated));
    assert!(matches!(
        service.delete_note(Uuid::new_v4()).await.unwrap_err(),
        RemoteError::Unauthenticated
    ));

    service.sign_in(alice()).await;
    assert!(service
        .insert_note(NoteDraft::new("t", "c", &alice()))
        .await
        .is_ok());
    service.sign_out().await;
    assert_eq!(service.current_identity().await.unwrap(), None);
}

#[tokio::test]
async fn drafts_for_another_user_are_rejected() {
    let (store, service) = service();
    let mallory = Identity::new("mallory");

    let err = service
        .insert_note(NoteDraft::new("t", "c", &mallory))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidData(_)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn committed_writes_are_broadcast_to_every_feed() {
    let (store, writer) = service();
    let reader = SqliteNoteService::anonymous(store.clone());
    let mut writer_feed = writer.subscribe_changes().await.unwrap();
    let mut reader_feed = reader.subscribe_changes().await.unwrap();

    let note = writer
        .insert_note(NoteDraft::new("t", "c", &alice()))
        .await
        .unwrap();
    writer.update_note(note.id, patch("t2", 2)).await.unwrap();
    // Rejected writes publish nothing.
    let _ = writer.update_note(note.id, patch("t3", 2)).await;
    writer.delete_note(note.id).await.unwrap();

    for feed in [&mut writer_feed, &mut reader_feed] {
        let inserted = feed.next().await.unwrap();
        assert_eq!(inserted.kind(), ChangeKind::Insert);
        assert_eq!(inserted.note_id(), note.id);

        match feed.next().await.unwrap() {
            ChangeEvent::Update(updated) => {
                assert_eq!(updated.title, "t2");
                assert_eq!(updated.version, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(
            feed.next().await.unwrap(),
            ChangeEvent::Delete { id: note.id }
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn feed_order_matches_commit_order_under_contention() {
    let (store, writer) = service();
    let writer = Arc::new(writer);
    let reader = SqliteNoteService::anonymous(store.clone());
    let note = writer
        .insert_note(NoteDraft::new("t", "c", &alice()))
        .await
        .unwrap();
    let mut feed = reader.subscribe_changes().await.unwrap();

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let writer = writer.clone();
        tasks.push(tokio::spawn(async move {
            let mut applied = 0;
            while applied < 5 {
                let current = writer.note_version(note.id).await.unwrap().unwrap();
                match writer
                    .update_note(note.id, patch(&format!("w{worker}"), current + 1))
                    .await
                {
                    Ok(_) => applied += 1,
                    Err(RemoteError::Conflict(_)) => tokio::task::yield_now().await,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for expected in 2..=21 {
        match feed.next().await.unwrap() {
            ChangeEvent::Update(updated) => assert_eq!(updated.version, expected),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(writer.note_version(note.id).await.unwrap(), Some(21));
}

#[tokio::test]
async fn file_backed_store_reloads_notes_and_clock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");

    let first = {
        let store = Arc::new(SqliteNoteStore::open(&path).unwrap());
        let service = SqliteNoteService::signed_in(store, alice());
        service
            .insert_note(NoteDraft::new("kept", "c", &alice()))
            .await
            .unwrap()
    };

    let store = Arc::new(SqliteNoteStore::open(&path).unwrap());
    assert_eq!(store.get(first.id).await.unwrap(), Some(first.clone()));

    let service = SqliteNoteService::signed_in(store, alice());
    let second = service
        .insert_note(NoteDraft::new("later", "c", &alice()))
        .await
        .unwrap();
    assert!(second.created_at > first.created_at);
}
