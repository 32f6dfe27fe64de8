//! [`MessageBus`] implementation over a rumqttc client.

use std::future::Future;

use rumqttc::{AsyncClient, QoS};

use kisslight_app::ports::MessageBus;
use kisslight_domain::error::HubError;

use crate::error::MqttError;

/// Every message is sent at most once, matching the devices' own QoS.
const QOS: QoS = QoS::AtMostOnce;

/// Publishes and (un)subscribes through the shared client.
///
/// Calls only enqueue requests for the event loop and never wait for room in
/// its queue. They fail at once when the queue is full, which happens while
/// the broker is unreachable, or when the event loop has stopped. Callers
/// hold the registry lock across these calls.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    #[must_use]
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Ask the broker to close the session.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the request queue is full or the
    /// event loop has stopped.
    pub fn disconnect(&self) -> Result<(), MqttError> {
        self.client.try_disconnect().map_err(MqttError::Client)
    }
}

impl MessageBus for MqttBus {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        tracing::debug!(%topic, %payload, "publishing");
        let result = self
            .client
            .try_publish(topic, QOS, false, payload.as_bytes())
            .map_err(|err| MqttError::Client(err).into_domain());
        async move { result }
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        tracing::debug!(%topic, "subscribing");
        let result = self
            .client
            .try_subscribe(topic, QOS)
            .map_err(|err| MqttError::Client(err).into_domain());
        async move { result }
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        tracing::debug!(%topic, "unsubscribing");
        let result = self
            .client
            .try_unsubscribe(topic)
            .map_err(|err| MqttError::Client(err).into_domain());
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use kisslight_app::registry::Registry;
    use kisslight_app::services::dispatcher::Dispatcher;

    use super::*;
    use crate::config::MqttConfig;

    const QUEUE: usize = 10;

    #[tokio::test]
    async fn should_queue_requests_while_event_loop_is_alive() {
        let (client, _event_loop) = AsyncClient::new(MqttConfig::default().options(), QUEUE);
        let bus = MqttBus::new(client);
        bus.subscribe("stat/lamp1/RESULT").await.unwrap();
        bus.publish("cmnd/lamp1/POWER", "ON").await.unwrap();
        bus.unsubscribe("stat/lamp1/RESULT").await.unwrap();
    }

    #[tokio::test]
    async fn should_fail_with_bus_error_once_event_loop_is_gone() {
        let (client, event_loop) = AsyncClient::new(MqttConfig::default().options(), QUEUE);
        drop(event_loop);
        let bus = MqttBus::new(client);
        let err = bus.publish("cmnd/lamp1/POWER", "ON").await.unwrap_err();
        assert!(matches!(err, HubError::Bus(_)));
        assert!(bus.disconnect().is_err());
    }

    #[tokio::test]
    async fn should_fail_fast_when_request_queue_is_full() {
        let (client, _event_loop) = AsyncClient::new(MqttConfig::default().options(), QUEUE);
        let bus = MqttBus::new(client);
        for _ in 0..QUEUE {
            bus.publish("cmnd/lamp1/POWER", "ON").await.unwrap();
        }

        let calls = async {
            (
                bus.publish("cmnd/lamp1/POWER", "ON").await,
                bus.subscribe("stat/lamp1/RESULT").await,
                bus.unsubscribe("stat/lamp1/RESULT").await,
            )
        };
        let (publish, subscribe, unsubscribe) =
            tokio::time::timeout(Duration::from_secs(1), calls)
                .await
                .expect("bus calls should not wait for queue room");
        assert!(matches!(publish, Err(HubError::Bus(_))));
        assert!(matches!(subscribe, Err(HubError::Bus(_))));
        assert!(matches!(unsubscribe, Err(HubError::Bus(_))));
    }

    #[tokio::test]
    async fn should_keep_serving_requests_while_broker_is_unreachable() {
        let (client, _event_loop) = AsyncClient::new(MqttConfig::default().options(), QUEUE);
        let registry = Arc::new(tokio::sync::Mutex::new(Registry::with_capacity(30)));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), MqttBus::new(client));

        let session = async {
            let mut added = 0;
            for index in 0..8 {
                let line = format!("ADD d{index} d{index} 0 KL/0.3");
                if dispatcher.handle_line(&line).await.code() == 202 {
                    added += 1;
                }
            }
            let transmit = dispatcher
                .handle_line("TRANSMIT cmnd/all/POWER OFF KL/0.3")
                .await;
            let list = dispatcher.handle_line("LIST KL/0.3").await;
            (added, transmit, list)
        };
        let (added, transmit, list) = tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .expect("requests should not block on a full bus queue");

        assert_eq!(added, 8);
        assert_eq!(transmit.code(), 500);
        assert_eq!(list.code(), 204);
        assert!(registry.try_lock().is_ok());
    }
}
