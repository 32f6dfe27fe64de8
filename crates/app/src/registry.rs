//! Device registry — the fixed-capacity table shared by every execution context.
//!
//! Each slot holds at most one device plus the bookkeeping the write-back
//! synchronizer needs: the pending [`ChangeCode`] and the name/topic the store
//! still knows the row under. Every mutator records its change here, so the
//! registry is the only place where the composition rule is applied.

use std::sync::Arc;

use kisslight_domain::change::{ChangeCode, Mutation};
use kisslight_domain::device::{CommandSet, Device, DeviceType};
use kisslight_domain::error::{HubError, NotFoundError, RegistryError};
use kisslight_domain::state::{DeviceState, StateUpdate};
use kisslight_domain::topic;

use crate::ports::DeviceRecord;

/// The registry behind the single lock every context takes.
///
/// A tokio mutex is used because critical sections await bus and store calls.
pub type SharedRegistry = Arc<tokio::sync::Mutex<Registry>>;

/// One row of the registry.
#[derive(Debug, Default)]
pub struct Slot {
    /// `None` when the slot is free.
    pub device: Option<Device>,
    /// Name the store holds the row under, when it differs from the live one.
    pub old_name: Option<String>,
    /// Topic the store holds the row under, when it differs from the live one.
    pub old_topic: Option<String>,
    pub change: ChangeCode,
    /// Consecutive failed flush attempts for the pending change.
    pub failures: u32,
}

impl Slot {
    /// Forget the pending change once the store has caught up.
    pub(crate) fn settle(&mut self) {
        self.change = ChangeCode::Unset;
        self.old_name = None;
        self.old_topic = None;
        self.failures = 0;
    }
}

/// Fixed-capacity device table.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<Slot>,
}

impl Registry {
    /// Create an empty registry with `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(Slot::default).take(capacity).collect(),
        }
    }

    /// Build a registry from stored rows.
    ///
    /// Rows are taken in order. Rows beyond `capacity`, rows that fail
    /// validation, and rows repeating an earlier name are skipped with a
    /// warning. Loaded slots start with no pending change.
    #[must_use]
    pub fn load(records: Vec<DeviceRecord>, capacity: usize) -> Self {
        let mut registry = Self::with_capacity(capacity);
        let mut next = 0;
        for record in records {
            if next == capacity {
                tracing::warn!(name = %record.name, capacity, "registry full, skipping stored device");
                continue;
            }
            if registry.find(&record.name).is_some() {
                tracing::warn!(name = %record.name, "duplicate stored device, skipping");
                continue;
            }
            match device_from_record(record) {
                Ok(device) => {
                    registry.slots[next].device = Some(device);
                    next += 1;
                }
                Err((name, err)) => {
                    tracing::warn!(%name, %err, "invalid stored device, skipping");
                }
            }
        }
        registry
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the device called `name`, compared case-insensitively.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.occupied()
            .find(|(_, device)| device.is_named(name))
            .map(|(index, _)| index)
    }

    /// Index of the device whose status topic is `topic`.
    ///
    /// The status topic is recomputed for every slot; the first match wins.
    #[must_use]
    pub fn find_by_status_topic(&self, topic: &str) -> Option<usize> {
        self.occupied()
            .find(|(_, device)| topic::status_matches(topic, &device.topic))
            .map(|(index, _)| index)
    }

    /// First free slot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Full`] when every slot is occupied.
    pub fn allocate(&self) -> Result<usize, RegistryError> {
        self.slots
            .iter()
            .position(|slot| slot.device.is_none())
            .ok_or(RegistryError::Full {
                capacity: self.capacity(),
            })
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Device> {
        self.slots.get(index).and_then(|slot| slot.device.as_ref())
    }

    /// Occupied slots in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Device)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.device.as_ref().map(|device| (index, device)))
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    /// Place a new device and stage its insert.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken and
    /// [`RegistryError::Full`] when no slot is free.
    pub fn insert(&mut self, device: Device) -> Result<usize, RegistryError> {
        if self.find(&device.name).is_some() {
            return Err(RegistryError::Duplicate(device.name));
        }
        let index = self.allocate()?;
        self.slots[index].device = Some(device);
        self.mark(index, Mutation::Insert);
        Ok(index)
    }

    /// Free a slot and stage the delete of its stored row.
    pub fn remove(&mut self, index: usize) -> Option<Device> {
        self.get(index)?;
        self.mark(index, Mutation::Delete);
        self.slots[index].device.take()
    }

    /// Rename a device, returning the previous name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when another device already uses
    /// `new_name`.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<Option<String>, RegistryError> {
        let taken = self
            .occupied()
            .any(|(other, device)| other != index && device.is_named(new_name));
        if taken {
            return Err(RegistryError::Duplicate(new_name.to_string()));
        }
        if self.get(index).is_none() {
            return Ok(None);
        }
        self.mark(index, Mutation::Name);
        Ok(self.slots[index]
            .device
            .as_mut()
            .map(|device| std::mem::replace(&mut device.name, new_name.to_string())))
    }

    /// Move a device to a new topic stem, returning the previous one.
    pub fn retopic(&mut self, index: usize, new_topic: &str) -> Option<String> {
        self.get(index)?;
        self.mark(index, Mutation::Topic);
        self.slots[index]
            .device
            .as_mut()
            .map(|device| std::mem::replace(&mut device.topic, new_topic.to_string()))
    }

    /// Apply a status report to a device, staging a state write when the
    /// stored text changed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for a free slot and [`HubError::Patch`]
    /// when the report cannot be applied.
    pub fn absorb_report(&mut self, index: usize, report: &str) -> Result<StateUpdate, HubError> {
        let device = self
            .slots
            .get_mut(index)
            .and_then(|slot| slot.device.as_mut())
            .ok_or_else(|| NotFoundError {
                entity: "Slot",
                id: index.to_string(),
            })?;
        let update = device.state.absorb(report)?;
        if update.is_changed() {
            self.mark(index, Mutation::State);
        }
        Ok(update)
    }

    /// Stage a state write without changing the state.
    pub fn touch_state(&mut self, index: usize) {
        if self.get(index).is_some() {
            self.mark(index, Mutation::State);
        }
    }

    /// Fold a mutation into the slot's change code, staging the stored
    /// identity first when the flush will need it.
    fn mark(&mut self, index: usize, mutation: Mutation) {
        let slot = &mut self.slots[index];
        let next = slot.change.compose(mutation);
        if next.needs_old_identity() {
            if let Some(device) = &slot.device {
                slot.old_name.get_or_insert_with(|| device.name.clone());
                slot.old_topic.get_or_insert_with(|| device.topic.clone());
            }
        }
        if next.is_pending() {
            slot.change = next;
            slot.failures = 0;
        } else {
            slot.settle();
        }
    }
}

fn device_from_record(record: DeviceRecord) -> Result<Device, (String, HubError)> {
    let build = |record: &DeviceRecord| -> Result<Device, HubError> {
        let device_type = DeviceType::from_code(record.type_code)?;
        let commands = CommandSet::parse(&record.commands)?;
        let state = DeviceState::new(record.state.clone())?;
        Device::builder()
            .name(record.name.clone())
            .topic(record.topic.clone())
            .device_type(device_type)
            .commands(commands)
            .state(state)
            .build()
    };
    build(&record).map_err(|err| (record.name, err))
}
