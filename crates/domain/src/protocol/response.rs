//! Response rendering.

use std::fmt;

use super::PROTOCOL_VERSION;
use super::request::RequestError;

/// One LIST row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub topic: String,
    pub type_label: &'static str,
}

/// A response line, optionally followed by a body terminated by `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Toggled { name: String },
    CommandSet { name: String, command: String },
    Added { name: String },
    Deleted { name: String },
    List(Vec<ListEntry>),
    Transmitted { topic: String },
    /// Each valid command with its current value.
    Status {
        name: String,
        values: Vec<(String, String)>,
    },
    Goodbye,
    Renamed { old: String, new: String },
    TopicChanged { name: String, topic: String },
    StateRequested { name: String },
    BadRequest,
    RegistryFull { name: String },
    NoSuchDevice { name: String },
    InvalidArgument { argument: String },
    UnsupportedVersion,
    Duplicate { name: String },
    InsufficientArguments,
    BusError { topic: String },
    ClientCapacityFull,
}

impl Response {
    /// Numeric status code.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Toggled { .. } => 200,
            Self::CommandSet { .. } => 201,
            Self::Added { .. } => 202,
            Self::Deleted { .. } => 203,
            Self::List(_) => 204,
            Self::Transmitted { .. } => 205,
            Self::Status { .. } => 206,
            Self::Goodbye => 207,
            Self::Renamed { .. } => 208,
            Self::TopicChanged { .. } => 209,
            Self::StateRequested { .. } => 210,
            Self::BadRequest => 400,
            Self::RegistryFull { .. } => 403,
            Self::NoSuchDevice { .. } => 404,
            Self::InvalidArgument { .. } => 405,
            Self::UnsupportedVersion => 406,
            Self::Duplicate { .. } => 408,
            Self::InsufficientArguments => 409,
            Self::BusError { .. } => 500,
            Self::ClientCapacityFull => 505,
        }
    }

    /// Whether the connection must be closed after sending this response.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::Goodbye | Self::ClientCapacityFull)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Empty | RequestError::TooLong | RequestError::UnknownVerb(_) => {
                Self::BadRequest
            }
            RequestError::InsufficientArguments => Self::InsufficientArguments,
            RequestError::UnsupportedVersion(_) => Self::UnsupportedVersion,
            RequestError::UnknownUpdateField(field) => Self::InvalidArgument { argument: field },
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KL/{PROTOCOL_VERSION} {} ", self.code())?;
        match self {
            Self::Toggled { name } => writeln!(f, "{name} toggled"),
            Self::CommandSet { name, command } => writeln!(f, "{command} set for {name}"),
            Self::Added { name } => writeln!(f, "{name} added"),
            Self::Deleted { name } => writeln!(f, "{name} deleted"),
            Self::List(entries) => {
                let noun = if entries.len() == 1 { "device" } else { "devices" };
                writeln!(f, "{} {noun}", entries.len())?;
                for entry in entries {
                    writeln!(f, "{} {} {}", entry.name, entry.topic, entry.type_label)?;
                }
                writeln!(f, ".")
            }
            Self::Transmitted { topic } => writeln!(f, "transmitted to {topic}"),
            Self::Status { name, values } => {
                writeln!(f, "status of {name}")?;
                for (command, value) in values {
                    writeln!(f, "{command} : {value}")?;
                }
                writeln!(f, ".")
            }
            Self::Goodbye => writeln!(f, "goodbye"),
            Self::Renamed { old, new } => writeln!(f, "{old} renamed to {new}"),
            Self::TopicChanged { name, topic } => {
                writeln!(f, "{name} topic changed to {topic}")
            }
            Self::StateRequested { name } => writeln!(f, "state refresh requested for {name}"),
            Self::BadRequest => writeln!(f, "bad request"),
            Self::RegistryFull { name } => writeln!(f, "device registry full, cannot add {name}"),
            Self::NoSuchDevice { name } => writeln!(f, "no such device {name}"),
            Self::InvalidArgument { argument } => writeln!(f, "invalid argument {argument}"),
            Self::UnsupportedVersion => writeln!(f, "unsupported protocol version"),
            Self::Duplicate { name } => writeln!(f, "device {name} already exists"),
            Self::InsufficientArguments => writeln!(f, "insufficient arguments"),
            Self::BusError { topic } => writeln!(f, "bus error on {topic}"),
            Self::ClientCapacityFull => writeln!(f, "client capacity full, try again later"),
        }
    }
}
