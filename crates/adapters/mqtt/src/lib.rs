//! # kisslight-adapter-mqtt
//!
//! MQTT adapter — bridges kisslight to Tasmota-style devices through a broker.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and keep the session alive
//! - Implement the [`MessageBus`](kisslight_app::ports::MessageBus) port
//! - Forward inbound publishes to the status handler through a bounded channel
//!
//! ## Dependency rule
//! Same as other adapters: depends on `kisslight-app` and `kisslight-domain`.

mod bus;
mod config;
mod error;
mod event_loop;

pub use bus::MqttBus;
pub use config::MqttConfig;
pub use error::MqttError;
pub use event_loop::{InboundStatus, MqttConnection, connect};
