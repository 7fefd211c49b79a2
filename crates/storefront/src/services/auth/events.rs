//! Session change notifications.
//!
//! Every sign-in and sign-out is published on a broadcast channel tagged
//! with the browser's [`ClientId`]. Subscribers get a stream filtered to
//! their own browser; dropping the stream unsubscribes.

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use luxury_jewelry_core::{ClientId, UserId};

/// Buffered events per subscriber before old ones are dropped.
const CHANNEL_CAPACITY: usize = 256;

/// What happened to a browser's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionChange {
    SignedIn { user_id: UserId },
    SignedOut,
}

impl SessionChange {
    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "signed-in",
            Self::SignedOut => "signed-out",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionEvent {
    client: ClientId,
    change: SessionChange,
}

/// Broadcast hub for session changes.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Notify every subscriber of `client`.
    pub fn publish(&self, client: ClientId, change: SessionChange) {
        // No receivers just means no open tabs
        let delivered = self.sender.send(SessionEvent { client, change }).unwrap_or(0);
        tracing::debug!(%client, event = change.name(), delivered, "Published session change");
    }

    /// Stream of changes for one browser.
    pub fn subscribe(
        &self,
        client: ClientId,
    ) -> impl Stream<Item = SessionChange> + Send + use<> {
        let mut receiver = self.sender.subscribe();
        async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.client == client => yield event.change,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%client, skipped, "Session event subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Number of open subscriptions across all browsers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::pin;

    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_subscriber_only_sees_own_client() {
        let events = SessionEvents::new();
        let mine = ClientId::generate();
        let other = ClientId::generate();
        let user_id = UserId::generate();

        let mut stream = pin!(events.subscribe(mine));

        events.publish(other, SessionChange::SignedOut);
        events.publish(mine, SessionChange::SignedIn { user_id });
        events.publish(mine, SessionChange::SignedOut);

        assert_eq!(
            stream.next().await.unwrap(),
            SessionChange::SignedIn { user_id }
        );
        assert_eq!(stream.next().await.unwrap(), SessionChange::SignedOut);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let events = SessionEvents::new();
        let client = ClientId::generate();

        let stream = events.subscribe(client);
        // The receiver is created eagerly, before the stream is polled
        assert_eq!(events.subscriber_count(), 1);
        drop(stream);
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_outlives_the_handle_it_came_from() {
        let events = SessionEvents::new();
        let client = ClientId::generate();

        let stream = {
            let handle = events.clone();
            handle.subscribe(client)
        };
        let listener = tokio::spawn(async move {
            let mut stream = pin!(stream);
            stream.next().await
        });

        events.publish(client, SessionChange::SignedOut);
        assert_eq!(listener.await.unwrap(), Some(SessionChange::SignedOut));
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let events = SessionEvents::new();
        events.publish(ClientId::generate(), SessionChange::SignedOut);
    }

    #[test]
    fn test_change_serializes_for_sse() {
        let json = serde_json::to_string(&SessionChange::SignedOut).unwrap();
        assert_eq!(json, r#"{"type":"signed-out"}"#);
        assert_eq!(SessionChange::SignedOut.name(), "signed-out");
    }
}
