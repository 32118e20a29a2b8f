//! Named publish/subscribe topics shared by every tab of one origin.
//!
//! A [`BroadcastHub`] is the in-process stand-in for a browser's
//! same-origin broadcast primitive. Clones of a hub share the same topic
//! table, so two "tabs" holding clones see each other's publications.
//! Every subscriber, including the publisher's own [`Topic`], receives a
//! copy of each payload; filtering self-echo is the caller's business.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use huddle_shared::constants::TOPIC_CAPACITY;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Topic {0} is closed")]
    Closed(String),
}

/// Shared table of named broadcast topics.
#[derive(Clone)]
pub struct BroadcastHub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
    capacity: usize,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to `name`, creating the topic on first use.
    pub fn open(&self, name: &str) -> Topic {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        // Forget topics whose last subscriber went away.
        topics.retain(|_, tx| tx.receiver_count() > 0);

        let tx = topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        let rx = tx.subscribe();

        debug!(topic = %name, subscribers = tx.receiver_count(), "Opened topic");

        Topic {
            name: name.to_string(),
            tx,
            rx: Some(rx),
        }
    }

    /// Number of open subscriptions on `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(name).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscription to a named topic. Dropping it unsubscribes.
pub struct Topic {
    name: String,
    tx: broadcast::Sender<Bytes>,
    rx: Option<broadcast::Receiver<Bytes>>,
}

impl Topic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    /// Publish to every subscriber of the topic. Returns how many
    /// subscriptions the payload was queued for.
    pub fn publish(&self, data: impl Into<Bytes>) -> Result<usize, HubError> {
        if self.is_closed() {
            return Err(HubError::Closed(self.name.clone()));
        }
        // Our own receiver is alive, so send only fails if it was closed above.
        Ok(self.tx.send(data.into()).unwrap_or(0))
    }

    /// Next payload, or `None` once the topic is closed. Payloads lost
    /// to lag are skipped, not reported.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(data) => return Some(data),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.name, skipped, "Subscriber lagged, payloads dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Unsubscribe. Safe to call more than once.
    pub fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(topic = %self.name, "Closed topic");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = BroadcastHub::new();
        let mut a = hub.open("webrtc-conv_1");
        let mut b = hub.clone().open("webrtc-conv_1");

        let delivered = a.publish(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(b.recv().await.unwrap(), Bytes::from_static(b"hello"));
        // The publisher hears itself too.
        assert_eq!(a.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let hub = BroadcastHub::new();
        let a = hub.open("webrtc-conv_1");
        let mut other = hub.open("webrtc-conv_2");

        a.publish(Bytes::from_static(b"x")).unwrap();
        other.publish(Bytes::from_static(b"y")).unwrap();
        assert_eq!(other.recv().await.unwrap(), Bytes::from_static(b"y"));
    }

    #[tokio::test]
    async fn closed_topic_rejects_publish_and_ends_stream() {
        let hub = BroadcastHub::new();
        let mut topic = hub.open("t");
        topic.close();
        topic.close();

        assert!(topic.is_closed());
        assert!(matches!(topic.publish(Bytes::new()), Err(HubError::Closed(_))));
        assert!(topic.recv().await.is_none());
        assert_eq!(hub.subscriber_count("t"), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let hub = BroadcastHub::with_capacity(2);
        let publisher = hub.open("t");
        let mut slow = hub.open("t");

        for i in 0..5u8 {
            publisher.publish(vec![i]).unwrap();
        }

        // The oldest payloads were overwritten; the newest survive.
        assert_eq!(slow.recv().await.unwrap(), Bytes::from(vec![3u8]));
        assert_eq!(slow.recv().await.unwrap(), Bytes::from(vec![4u8]));
    }

    #[test]
    fn dropped_topics_are_forgotten() {
        let hub = BroadcastHub::new();
        {
            let _a = hub.open("t");
            assert_eq!(hub.subscriber_count("t"), 1);
        }
        assert_eq!(hub.subscriber_count("t"), 0);
        let _b = hub.open("t");
        assert_eq!(hub.subscriber_count("t"), 1);
    }
}
