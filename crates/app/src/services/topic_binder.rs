//! Topic binder — keeps bus subscriptions in step with registry identities.
//!
//! When a device changes topic or leaves, the caller must, in order: notify the
//! device on its old topic, [`detach`](TopicBinder::detach) the old status
//! topic, update the registry, then [`subscribe`](TopicBinder::subscribe) the
//! new one.

use kisslight_domain::error::HubError;
use kisslight_domain::topic::{self, STATE_COMMAND, TOPIC_COMMAND};

use crate::ports::MessageBus;

/// Drives subscribe/unsubscribe/publish calls for device topic stems.
pub struct TopicBinder<B> {
    bus: B,
}

impl<B: MessageBus> TopicBinder<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Borrow the underlying bus, for raw publishes.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Subscribe to the status topic of `stem`.
    ///
    /// # Errors
    ///
    /// Propagates the bus error.
    pub async fn subscribe(&self, stem: &str) -> Result<(), HubError> {
        self.bus.subscribe(&topic::status_topic(stem)).await
    }

    /// Subscribe to a new device and ask it for a full status report.
    ///
    /// # Errors
    ///
    /// Propagates the first bus error.
    pub async fn attach(&self, stem: &str) -> Result<(), HubError> {
        self.subscribe(stem).await?;
        self.request_state(stem).await
    }

    /// Stop listening to the status topic of `stem`.
    ///
    /// # Errors
    ///
    /// Propagates the bus error.
    pub async fn detach(&self, stem: &str) -> Result<(), HubError> {
        self.bus.unsubscribe(&topic::status_topic(stem)).await
    }

    /// Ask the device for a full status report.
    ///
    /// # Errors
    ///
    /// Propagates the bus error.
    pub async fn request_state(&self, stem: &str) -> Result<(), HubError> {
        self.send(stem, STATE_COMMAND, "").await
    }

    /// Tell the device listening on `old_stem` to move to `new_stem`.
    ///
    /// # Errors
    ///
    /// Propagates the bus error.
    pub async fn announce_topic(&self, old_stem: &str, new_stem: &str) -> Result<(), HubError> {
        self.send(old_stem, TOPIC_COMMAND, new_stem).await
    }

    /// Publish `payload` to `cmnd/<stem>/<COMMAND>`.
    ///
    /// # Errors
    ///
    /// Propagates the bus error.
    pub async fn send(&self, stem: &str, command: &str, payload: &str) -> Result<(), HubError> {
        self.bus
            .publish(&topic::command_topic(stem, command), payload)
            .await
    }

    /// Subscribe to the status topic of every given stem, returning how many
    /// subscriptions succeeded. Failures are logged and skipped.
    pub async fn subscribe_all<I, S>(&self, stems: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bound = 0;
        for stem in stems {
            let stem = stem.as_ref();
            match self.subscribe(stem).await {
                Ok(()) => bound += 1,
                Err(err) => tracing::warn!(%err, topic = stem, "failed to subscribe device"),
            }
        }
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BusCall, RecordingBus};

    #[tokio::test]
    async fn should_subscribe_then_request_state_when_attaching() {
        let binder = TopicBinder::new(RecordingBus::default());
        binder.attach("lamp1").await.unwrap();
        assert_eq!(
            binder.bus().calls(),
            vec![
                BusCall::Subscribe("stat/lamp1/RESULT".to_string()),
                BusCall::Publish("cmnd/lamp1/STATE".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn should_announce_new_topic_on_old_command_topic() {
        let binder = TopicBinder::new(RecordingBus::default());
        binder.announce_topic("lamp1", "lamp1b").await.unwrap();
        assert_eq!(
            binder.bus().publishes(),
            vec![("cmnd/lamp1/TOPIC".to_string(), "lamp1b".to_string())]
        );
    }

    #[tokio::test]
    async fn should_unsubscribe_status_topic_when_detaching() {
        let binder = TopicBinder::new(RecordingBus::default());
        binder.detach("lamp1").await.unwrap();
        assert_eq!(
            binder.bus().calls(),
            vec![BusCall::Unsubscribe("stat/lamp1/RESULT".to_string())]
        );
    }

    #[tokio::test]
    async fn should_count_successful_subscriptions() {
        let binder = TopicBinder::new(RecordingBus::default());
        assert_eq!(binder.subscribe_all(["a", "b"]).await, 2);
        binder.bus().fail();
        assert_eq!(binder.subscribe_all(vec!["c".to_string()]).await, 0);
    }
}
