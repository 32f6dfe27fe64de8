//! Store port — the durable mirror of the device registry.
//!
//! Rows are keyed by `(name, topic)`. The registry is the live copy; the store
//! only catches up when the write-back synchronizer flushes.

use std::future::Future;

use kisslight_domain::device::Device;
use kisslight_domain::error::HubError;

/// Raw row shape, as persisted.
///
/// Kept unvalidated so that loading can skip bad rows instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    pub topic: String,
    pub type_code: i64,
    pub state: String,
    pub commands: String,
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            topic: device.topic.clone(),
            type_code: i64::from(device.device_type.code()),
            state: device.state.as_str().to_string(),
            commands: device.commands.as_str().to_string(),
        }
    }
}

/// Persistence operations the synchronizer and startup need.
pub trait DeviceStore {
    /// Number of stored rows.
    fn count(&self) -> impl Future<Output = Result<u64, HubError>> + Send;

    /// Every stored row, in storage order.
    fn dump(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send;

    fn insert(&self, record: &DeviceRecord) -> impl Future<Output = Result<(), HubError>> + Send;

    fn delete(&self, name: &str, topic: &str)
    -> impl Future<Output = Result<(), HubError>> + Send;

    fn update_state(
        &self,
        name: &str,
        topic: &str,
        state: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Rename the row `(old_name, topic)` to `new_name`.
    fn update_name(
        &self,
        old_name: &str,
        new_name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Move the row `(name, old_topic)` to `new_topic`.
    fn update_topic(
        &self,
        old_topic: &str,
        new_topic: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: DeviceStore + Send + Sync> DeviceStore for std::sync::Arc<T> {
    fn count(&self) -> impl Future<Output = Result<u64, HubError>> + Send {
        (**self).count()
    }

    fn dump(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send {
        (**self).dump()
    }

    fn insert(&self, record: &DeviceRecord) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).insert(record)
    }

    fn delete(
        &self,
        name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).delete(name, topic)
    }

    fn update_state(
        &self,
        name: &str,
        topic: &str,
        state: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).update_state(name, topic, state)
    }

    fn update_name(
        &self,
        old_name: &str,
        new_name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).update_name(old_name, new_name, topic)
    }

    fn update_topic(
        &self,
        old_topic: &str,
        new_topic: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).update_topic(old_topic, new_topic, name)
    }
}
