//! Device state — the last status text reported by a device.

pub mod patch;

use std::fmt;

use crate::error::PatchError;

pub use patch::MergeOutcome;

/// Maximum size of a device state, in bytes.
pub const STATE_CAPACITY: usize = 1024;

/// Full status assigned to a freshly added device.
///
/// `"UKNOWN"` for `POWER` is the marker the device firmware uses itself.
pub const STATE_TEMPLATE: &str = concat!(
    r#"{"Time":"UNKNOWN","Uptime":"UNKNOWN","UptimeSec":0,"Heap":0,"#,
    r#""SleepMode":"UNKNOWN","Sleep":0,"LoadAvg":0,"MqttCount":0,"POWER":"UKNOWN","#,
    r#""Wifi":{"AP":0,"SSId":"UNKNOWN","BSSId":"00:00:00:00:00:00","Channel":0,"#,
    r#""RSSI":0,"Signal":-1,"LinkCount":0,"Downtime":"UNKNOWN"}}"#,
);

/// Bounded flat status text, at most [`STATE_CAPACITY`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState(String);

/// How an incoming status report was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    /// The report was a full status and replaced the state.
    Replaced,
    /// The report was partial and merged into the state.
    Merged(MergeOutcome),
}

impl StateUpdate {
    /// `true` when the stored text differs from before.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        match self {
            Self::Replaced => true,
            Self::Merged(outcome) => outcome.is_changed(),
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self(STATE_TEMPLATE.to_string())
    }
}

impl DeviceState {
    /// Wrap existing state text, enforcing the capacity bound.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::CapacityExceeded`] if `text` is too long.
    pub fn new(text: impl Into<String>) -> Result<Self, PatchError> {
        let text = text.into();
        check_capacity(text.len())?;
        Ok(Self(text))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of a top-level property, unquoted.
    ///
    /// Returns `None` when the property is missing or the stored text is not
    /// a flat object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        patch::extract(&self.0, key).ok().flatten()
    }

    /// Replace the whole state.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::CapacityExceeded`] if `text` is too long; the
    /// state is unchanged in that case.
    pub fn replace(&mut self, text: &str) -> Result<(), PatchError> {
        check_capacity(text.len())?;
        text.clone_into(&mut self.0);
        Ok(())
    }

    /// Merge the properties of `patch` into the state in place.
    ///
    /// # Errors
    ///
    /// See [`patch::merge_in_place`].
    pub fn merge(&mut self, patch: &str) -> Result<MergeOutcome, PatchError> {
        patch::merge_in_place(&mut self.0, STATE_CAPACITY, patch)
    }

    /// Apply a status report received from the device.
    ///
    /// A report at least as long as [`STATE_TEMPLATE`] is taken as a full
    /// status and replaces the state; a shorter one is merged.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] if the report cannot be applied; the state is
    /// unchanged in that case.
    pub fn absorb(&mut self, report: &str) -> Result<StateUpdate, PatchError> {
        if report.len() >= STATE_TEMPLATE.len() {
            self.replace(report)?;
            Ok(StateUpdate::Replaced)
        } else {
            self.merge(report).map(StateUpdate::Merged)
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_capacity(len: usize) -> Result<(), PatchError> {
    if len > STATE_CAPACITY {
        return Err(PatchError::CapacityExceeded {
            required: len,
            capacity: STATE_CAPACITY,
        });
    }
    Ok(())
}
