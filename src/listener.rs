//! Live listener: long-polls the bridge and feeds accepted messages into
//! the pipeline's bounded queue.
//!
//! This is the push half of the "one worker, two producers" shape. The
//! task suspends while the bridge holds the poll, filters out events from
//! other conversations and the pipeline's own account, and blocks on the
//! queue when the consumer falls behind. It only exits when the consumer
//! side of the queue is dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::{BridgeClient, Update};
use crate::models::SourceMessage;

const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Decide whether an inbound update belongs in the pipeline.
///
/// Drops update kinds without a message, messages from other chats, and
/// self-echo (the account publishing the pages also sees its own posts).
pub fn accept_update(update: Update, chat_id: i64, self_id: i64) -> Option<SourceMessage> {
    let wire = update.message?;
    if wire.chat_id != chat_id {
        return None;
    }
    if wire.sender_id == self_id {
        return None;
    }
    Some(wire.into_message())
}

pub async fn run_listener(
    bridge: BridgeClient,
    chat_id: i64,
    self_id: i64,
    poll_timeout_secs: u64,
    tx: mpsc::Sender<SourceMessage>,
) {
    info!(chat_id, "listening for new messages");

    let mut offset = 0i64;
    loop {
        let updates = match bridge.poll_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "update poll failed, backing off");
                tokio::time::sleep(POLL_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(msg) = accept_update(update, chat_id, self_id) else {
                continue;
            };

            debug!(message_id = msg.id, "live message queued");
            if tx.send(msg).await.is_err() {
                // Consumer is gone; we are shutting down.
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::WireMessage;

    fn update(id: i64, chat_id: i64, sender_id: i64, text: &str) -> Update {
        Update {
            update_id: id,
            message: Some(WireMessage {
                id,
                chat_id,
                sender_id,
                text: text.to_string(),
                date: 1_700_000_000,
            }),
        }
    }

    #[test]
    fn accepts_message_from_watched_chat() {
        let msg = accept_update(update(10, 42, 7, "hello"), 42, 99).unwrap();
        assert_eq!(msg.id, 10);
        assert_eq!(msg.author_id, 7);
    }

    #[test]
    fn drops_other_chats() {
        assert!(accept_update(update(10, 41, 7, "hello"), 42, 99).is_none());
    }

    #[test]
    fn drops_self_echo() {
        assert!(accept_update(update(10, 42, 99, "hello"), 42, 99).is_none());
    }

    #[test]
    fn drops_updates_without_a_message() {
        let update = Update {
            update_id: 1,
            message: None,
        };
        assert!(accept_update(update, 42, 99).is_none());
    }
}
