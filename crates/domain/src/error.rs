//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! via `#[from]` or an explicit `From` impl at the port boundary.

/// Base error crossing the domain, application, and adapter layers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("registry error")]
    Registry(#[from] RegistryError),

    #[error("state patch error")]
    Patch(#[from] PatchError),

    /// Failure reported by the durable store.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failure reported by the message bus.
    #[error("bus error")]
    Bus(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("{field} is {len} bytes long, at most {max} allowed")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("unknown device type {0:?}")]
    UnknownDeviceType(String),

    #[error("device type {0} requires an extra argument")]
    MissingExtra(&'static str),

    #[error("invalid outlet count {0:?}")]
    InvalidOutletCount(String),

    #[error("command list must contain at least one command")]
    EmptyCommands,
}

/// A looked-up record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id:?} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The device registry rejected an allocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registry is full ({capacity} slots)")]
    Full { capacity: usize },

    #[error("device {0:?} already exists")]
    Duplicate(String),
}

/// The state patcher could not apply a change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The text is not a flat `{"key":value,...}` object.
    #[error("malformed state text at byte {offset}")]
    Malformed { offset: usize },

    /// The result would not fit in the state buffer.
    #[error("state needs {required} bytes, capacity is {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },
}
