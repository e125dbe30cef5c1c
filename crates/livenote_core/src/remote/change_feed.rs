//! Realtime change events and the cancellable feed that carries them.

use crate::model::note::{Note, NoteId};
use log::warn;
use tokio::sync::{broadcast, mpsc};

/// Kind tag of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One committed change on the notes collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Note),
    Update(Note),
    /// Deletes only carry the old row's ID.
    Delete { id: NoteId },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn note_id(&self) -> NoteId {
        match self {
            Self::Insert(note) | Self::Update(note) => note.id,
            Self::Delete { id } => *id,
        }
    }
}

enum FeedSource {
    Broadcast(broadcast::Receiver<ChangeEvent>),
    Channel(mpsc::UnboundedReceiver<ChangeEvent>),
}

/// Live subscription to a remote change stream.
///
/// Dropping the feed unsubscribes it.
pub struct ChangeFeed {
    source: FeedSource,
}

impl ChangeFeed {
    /// Wraps a fan-out receiver. Lagged gaps are logged and skipped.
    pub fn from_broadcast(receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            source: FeedSource::Broadcast(receiver),
        }
    }

    /// Wraps a point-to-point receiver.
    pub fn from_channel(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            source: FeedSource::Channel(receiver),
        }
    }

    /// Waits for the next event. Returns `None` once the remote side closes.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        match &mut self.source {
            FeedSource::Channel(receiver) => receiver.recv().await,
            FeedSource::Broadcast(receiver) => loop {
                match receiver.recv().await {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "event=change_feed_lagged module=remote status=error skipped={skipped}"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, ChangeFeed, ChangeKind};
    use tokio::sync::{broadcast, mpsc};
    use uuid::Uuid;

    #[tokio::test]
    async fn channel_feed_ends_when_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feed = ChangeFeed::from_channel(rx);
        let id = Uuid::new_v4();
        tx.send(ChangeEvent::Delete { id }).unwrap();
        drop(tx);

        let event = feed.next().await.expect("first event should arrive");
        assert_eq!(event.kind(), ChangeKind::Delete);
        assert_eq!(event.note_id(), id);
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn broadcast_feed_skips_lagged_gap() {
        let (tx, rx) = broadcast::channel(1);
        let mut feed = ChangeFeed::from_broadcast(rx);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        tx.send(ChangeEvent::Delete { id: first }).unwrap();
        tx.send(ChangeEvent::Delete { id: second }).unwrap();
        drop(tx);

        let event = feed.next().await.expect("latest event should survive lag");
        assert_eq!(event.note_id(), second);
        assert!(feed.next().await.is_none());
    }
}
