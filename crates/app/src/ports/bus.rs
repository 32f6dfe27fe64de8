//! Bus port — publish/subscribe towards the field devices.

use std::future::Future;

use kisslight_domain::error::HubError;

/// At-most-once message bus.
pub trait MessageBus {
    fn publish(&self, topic: &str, payload: &str)
    -> impl Future<Output = Result<(), HubError>> + Send;

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send;

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: MessageBus + Send + Sync> MessageBus for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).subscribe(topic)
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).unsubscribe(topic)
    }
}
