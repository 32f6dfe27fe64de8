//! Write-back synchronizer — periodically flushes pending registry changes to
//! the durable store.
//!
//! A cycle runs in two passes under the registry lock. The first pass removes
//! every row staged for deletion, the second writes inserts and field updates.
//! Deleting first lets a name freed in one slot be re-added in another slot
//! within the same cycle.
//!
//! Failed writes stay pending and are retried on later cycles. Once a write has
//! failed `max_retries` more times than its first attempt it is dropped with an
//! error record, and the registry keeps the live value.

use std::time::Duration;

use kisslight_domain::change::ChangeCode;
use kisslight_domain::error::HubError;
use tokio::task::JoinHandle;

use crate::ports::{DeviceRecord, DeviceStore};
use crate::registry::{SharedRegistry, Slot};

/// Retry behaviour for failed store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Extra attempts after the first failure. Zero drops a failed write at
    /// once.
    pub max_retries: u32,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Outcome of one flush cycle, counted in slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl FlushReport {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Background job writing registry changes to a [`DeviceStore`].
#[derive(Clone)]
pub struct WriteBackSynchronizer<S> {
    registry: SharedRegistry,
    store: S,
    policy: FlushPolicy,
}

impl<S> WriteBackSynchronizer<S>
where
    S: DeviceStore + Send + Sync + 'static,
{
    pub fn new(registry: SharedRegistry, store: S, policy: FlushPolicy) -> Self {
        Self {
            registry,
            store,
            policy,
        }
    }

    /// Spawn the periodic flush loop.
    pub fn start(self, initial_delay: Duration, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(self.run(initial_delay, interval))
    }

    async fn run(self, initial_delay: Duration, interval: Duration) {
        tokio::time::sleep(initial_delay).await;
        loop {
            let report = self.flush_once().await;
            if !report.is_idle() {
                tracing::debug!(
                    flushed = report.flushed,
                    failed = report.failed,
                    dropped = report.dropped,
                    "flush cycle finished"
                );
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Run one flush cycle over every slot.
    pub async fn flush_once(&self) -> FlushReport {
        let mut registry = self.registry.lock().await;
        let slots = registry.slots_mut();
        let mut report = FlushReport::default();

        for slot in slots.iter_mut() {
            if !matches!(slot.change, ChangeCode::Delete | ChangeCode::Replace) {
                continue;
            }
            match self.delete_stored(slot).await {
                Ok(()) if slot.change == ChangeCode::Replace => {
                    slot.old_name = None;
                    slot.old_topic = None;
                    slot.change = ChangeCode::Insert;
                }
                result => self.conclude(slot, result, &mut report),
            }
        }

        for slot in slots.iter_mut() {
            let result = match slot.change {
                ChangeCode::Unset | ChangeCode::Delete | ChangeCode::Replace => continue,
                ChangeCode::Insert => self.insert(slot).await,
                ChangeCode::State
                | ChangeCode::Name
                | ChangeCode::Topic
                | ChangeCode::Identity => self.write_fields(slot).await,
            };
            self.conclude(slot, result, &mut report);
        }

        report
    }

    async fn delete_stored(&self, slot: &Slot) -> Result<(), HubError> {
        let (Some(name), Some(topic)) = (slot.old_name.as_deref(), slot.old_topic.as_deref())
        else {
            tracing::warn!(change = ?slot.change, "delete staged without stored identity");
            return Ok(());
        };
        self.store.delete(name, topic).await
    }

    async fn insert(&self, slot: &Slot) -> Result<(), HubError> {
        match &slot.device {
            Some(device) => self.store.insert(&DeviceRecord::from(device)).await,
            None => Ok(()),
        }
    }

    /// Rename, re-topic, and rewrite the state as the change code asks.
    /// Each completed rename step clears its staged field.
    async fn write_fields(&self, slot: &mut Slot) -> Result<(), HubError> {
        let Some(device) = slot.device.as_ref() else {
            return Ok(());
        };
        let (rename, retopic, state) = match slot.change {
            ChangeCode::Name => (true, false, false),
            ChangeCode::Topic => (false, true, false),
            ChangeCode::State => (false, false, true),
            _ => (true, true, true),
        };

        if rename {
            if let Some(old_name) = slot.old_name.as_deref() {
                let topic = slot.old_topic.as_deref().unwrap_or(&device.topic);
                self.store.update_name(old_name, &device.name, topic).await?;
            }
            slot.old_name = None;
        }
        if retopic {
            if let Some(old_topic) = slot.old_topic.as_deref() {
                self.store
                    .update_topic(old_topic, &device.topic, &device.name)
                    .await?;
            }
            slot.old_topic = None;
        }
        if state {
            self.store
                .update_state(&device.name, &device.topic, device.state.as_str())
                .await?;
        }
        Ok(())
    }

    fn conclude(&self, slot: &mut Slot, result: Result<(), HubError>, report: &mut FlushReport) {
        let Err(err) = result else {
            slot.settle();
            report.flushed += 1;
            return;
        };
        slot.failures += 1;
        let name = slot
            .device
            .as_ref()
            .map(|device| device.name.clone())
            .or_else(|| slot.old_name.clone())
            .unwrap_or_default();
        if slot.failures > self.policy.max_retries {
            tracing::error!(
                %err,
                %name,
                change = ?slot.change,
                failures = slot.failures,
                "giving up on store write"
            );
            slot.settle();
            report.dropped += 1;
        } else {
            tracing::warn!(%err, %name, change = ?slot.change, "store write failed, will retry");
            report.failed += 1;
        }
    }
}
