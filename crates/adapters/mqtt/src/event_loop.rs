//! Broker connection and inbound message pump.
//!
//! The event loop never touches the registry. It hands each inbound publish to
//! a bounded channel read by the status handler task, and drops messages when
//! that channel is full.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, Publish};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bus::MqttBus;
use crate::config::MqttConfig;
use crate::error::MqttError;

/// Requests the client may queue before calls start waiting.
const REQUEST_CAPACITY: usize = 10;
/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A publish received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundStatus {
    pub topic: String,
    pub payload: String,
}

impl InboundStatus {
    /// Decode a publish, skipping payloads that are not UTF-8.
    fn from_publish(publish: &Publish) -> Option<Self> {
        match std::str::from_utf8(&publish.payload) {
            Ok(payload) => Some(Self {
                topic: publish.topic.clone(),
                payload: payload.to_string(),
            }),
            Err(err) => {
                tracing::debug!(%err, topic = %publish.topic, "ignoring non UTF-8 payload");
                None
            }
        }
    }
}

/// A live broker session.
pub struct MqttConnection {
    pub bus: MqttBus,
    pub inbound: mpsc::Receiver<InboundStatus>,
    pub task: JoinHandle<()>,
}

/// Connect to the broker and wait for its acknowledgement.
///
/// # Errors
///
/// Returns [`MqttError::ConnectTimeout`] when no CONNACK arrives in time and
/// [`MqttError::EventLoopClosed`] when the first connection attempt fails.
pub async fn connect(config: &MqttConfig) -> Result<MqttConnection, MqttError> {
    let (client, event_loop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
    let (inbound_tx, inbound) = mpsc::channel(config.channel_capacity.max(1));
    let (connack_tx, connack_rx) = oneshot::channel();

    let task = tokio::spawn(pump(event_loop, inbound_tx, connack_tx));

    let timeout = config.connect_timeout();
    match tokio::time::timeout(timeout, connack_rx).await {
        Ok(Ok(())) => {
            tracing::info!(
                host = %config.broker_host,
                port = config.broker_port,
                "connected to MQTT broker"
            );
        }
        Ok(Err(_)) => {
            task.abort();
            return Err(MqttError::EventLoopClosed);
        }
        Err(_) => {
            task.abort();
            return Err(MqttError::ConnectTimeout {
                secs: timeout.as_secs(),
            });
        }
    }

    Ok(MqttConnection {
        bus: MqttBus::new(client),
        inbound,
        task,
    })
}

/// Poll the event loop forever, forwarding publishes.
///
/// A failure before the first CONNACK ends the pump so [`connect`] can report
/// it. Later failures are logged and polling resumes, which makes rumqttc
/// reconnect.
async fn pump(
    mut event_loop: EventLoop,
    inbound: mpsc::Sender<InboundStatus>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker acknowledged connection");
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !forward(&inbound, &publish) {
                    tracing::info!("status channel closed, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("MQTT broker sent disconnect");
            }
            Ok(_) => {}
            Err(err) => {
                if connack_tx.is_some() {
                    tracing::error!(%err, "MQTT connection failed");
                    break;
                }
                tracing::warn!(%err, "MQTT connection lost, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Hand a publish to the status handler. Returns `false` once the receiving
/// side is gone.
fn forward(inbound: &mpsc::Sender<InboundStatus>, publish: &Publish) -> bool {
    let Some(status) = InboundStatus::from_publish(publish) else {
        return true;
    };
    match inbound.try_send(status) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(status)) => {
            tracing::warn!(topic = %status.topic, "status channel full, dropping message");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
