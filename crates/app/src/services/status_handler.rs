//! Applies inbound status reports to the registry.

use crate::registry::SharedRegistry;

/// What became of one inbound status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// No device listens on the topic.
    UnknownTopic,
    /// The report matched the stored state.
    Unchanged { name: String },
    /// The state changed and a write is staged.
    Updated { name: String },
    /// The report could not be applied and the state was left as it was.
    Rejected { name: String },
}

/// Routes status reports to the device owning the topic.
#[derive(Clone)]
pub struct StatusHandler {
    registry: SharedRegistry,
}

impl StatusHandler {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Apply `payload`, received on `topic`, to the matching device.
    pub async fn handle(&self, topic: &str, payload: &str) -> StatusOutcome {
        let mut registry = self.registry.lock().await;
        let Some(index) = registry.find_by_status_topic(topic) else {
            tracing::debug!(topic, "status for unknown device ignored");
            return StatusOutcome::UnknownTopic;
        };
        let name = registry
            .get(index)
            .map(|device| device.name.clone())
            .unwrap_or_default();
        match registry.absorb_report(index, payload) {
            Ok(update) if update.is_changed() => {
                tracing::debug!(%name, "device state updated");
                StatusOutcome::Updated { name }
            }
            Ok(_) => StatusOutcome::Unchanged { name },
            Err(err) => {
                tracing::warn!(%err, %name, topic, "status report rejected");
                StatusOutcome::Rejected { name }
            }
        }
    }
}
