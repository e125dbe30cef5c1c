//! User-facing notices raised by cache operations.
//!
//! Only the update-conflict case reaches the user; every other failure is
//! logged and swallowed at the operation boundary.

use crate::model::note::NoteId;
use log::warn;
use tokio::sync::mpsc;

/// Blocking notice the view layer must show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Another writer bumped the note version between our read and write.
    ConcurrentModification { note_id: NoteId },
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::ConcurrentModification { .. } => {
                "This note was modified by someone else. Please refresh and try again."
            }
        }
    }
}

/// Receiver of user-facing notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that only records notices in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::ConcurrentModification { note_id } => warn!(
                "event=notice module=cache status=conflict note_id={note_id}"
            ),
        }
    }
}

/// Sink that forwards notices to a view-owned channel.
#[derive(Debug, Clone)]
pub struct ChannelNoticeSink {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNoticeSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NoticeSink for ChannelNoticeSink {
    fn notify(&self, notice: Notice) {
        if self.sender.send(notice).is_err() {
            warn!("event=notice module=cache status=error error_code=receiver_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelNoticeSink, Notice, NoticeSink};
    use uuid::Uuid;

    #[test]
    fn channel_sink_forwards_notices() {
        let (sink, mut receiver) = ChannelNoticeSink::channel();
        let note_id = Uuid::new_v4();
        sink.notify(Notice::ConcurrentModification { note_id });

        let received = receiver.try_recv().expect("notice should be queued");
        assert_eq!(received, Notice::ConcurrentModification { note_id });
        assert!(received.message().contains("refresh"));
    }
}
