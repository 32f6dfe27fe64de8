//! MQTT adapter error types.

use kisslight_domain::error::HubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client refused a request, usually because the event loop
    /// is gone.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The connection to the broker failed.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// The broker did not acknowledge the connection in time.
    #[error("MQTT connection timeout after {secs}s")]
    ConnectTimeout { secs: u64 },

    /// The event loop stopped before the broker acknowledged the connection.
    #[error("MQTT event loop terminated unexpectedly")]
    EventLoopClosed,
}

impl MqttError {
    /// Convert into a [`HubError::Bus`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> HubError {
        HubError::Bus(Box::new(self))
    }
}

impl From<MqttError> for HubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
