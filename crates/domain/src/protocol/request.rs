//! Request parsing.

use std::str::FromStr;

use super::MAX_REQUEST_LEN;

/// A parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Publish `message` to an arbitrary topic.
    Transmit { topic: String, message: String },
    /// Flip the power of a device.
    Toggle { name: String },
    /// Send `message` to one of the device's commands.
    Set {
        name: String,
        command: String,
        message: String,
    },
    /// Register a device. `device_type` is kept raw so the dispatcher can
    /// answer an invalid code like any other invalid argument.
    Add {
        name: String,
        topic: String,
        device_type: String,
        extra: Option<String>,
    },
    Delete { name: String },
    Update(UpdateRequest),
    List,
    Status { name: String },
    Quit,
}

/// The field an UPDATE request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    Name { name: String, new_name: String },
    Topic { name: String, new_topic: String },
    /// Ask the device for a fresh status report.
    State { name: String },
}

/// Why a request line was rejected before reaching the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("empty request")]
    Empty,

    #[error("request longer than {MAX_REQUEST_LEN} bytes")]
    TooLong,

    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    #[error("insufficient arguments")]
    InsufficientArguments,

    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),

    #[error("unknown update field {0:?}")]
    UnknownUpdateField(String),
}

impl FromStr for Request {
    type Err = RequestError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        if line.len() > MAX_REQUEST_LEN {
            return Err(RequestError::TooLong);
        }
        let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
        let Some((verb, rest)) = tokens.split_first() else {
            return Err(RequestError::Empty);
        };

        let request = match verb.to_ascii_uppercase().as_str() {
            "Q" | "QUIT" => Self::Quit,
            "TRANSMIT" => {
                let args = versioned(rest, 2)?;
                Self::Transmit {
                    topic: args[0].to_string(),
                    message: args[1..].join(" "),
                }
            }
            "TOGGLE" => {
                let args = versioned(rest, 1)?;
                Self::Toggle {
                    name: args[0].to_string(),
                }
            }
            "SET" => {
                let args = versioned(rest, 3)?;
                Self::Set {
                    name: args[0].to_string(),
                    command: args[1].to_string(),
                    message: args[2..].join(" "),
                }
            }
            "ADD" => {
                let args = versioned(rest, 3)?;
                Self::Add {
                    name: args[0].to_string(),
                    topic: args[1].to_string(),
                    device_type: args[2].to_string(),
                    extra: (args.len() > 3).then(|| args[3..].join(" ")),
                }
            }
            "DELETE" => {
                let args = versioned(rest, 1)?;
                Self::Delete {
                    name: args[0].to_string(),
                }
            }
            "UPDATE" => Self::Update(update(versioned(rest, 2)?)?),
            "LIST" => {
                versioned(rest, 0)?;
                Self::List
            }
            "STATUS" => {
                let args = versioned(rest, 1)?;
                Self::Status {
                    name: args[0].to_string(),
                }
            }
            _ => return Err(RequestError::UnknownVerb((*verb).to_string())),
        };
        Ok(request)
    }
}

/// Split off the trailing version tag, checking the argument count first.
fn versioned<'a>(rest: &'a [&'a str], required: usize) -> Result<&'a [&'a str], RequestError> {
    let Some((tag, args)) = rest.split_last() else {
        return Err(RequestError::InsufficientArguments);
    };
    if args.len() < required {
        return Err(RequestError::InsufficientArguments);
    }
    check_version(tag)?;
    Ok(args)
}

/// Accept `KL/<version>` with `KL` in any case and a positive version.
fn check_version(tag: &str) -> Result<(), RequestError> {
    let version = tag
        .get(..3)
        .filter(|prefix| prefix.eq_ignore_ascii_case("KL/"))
        .and_then(|_| tag[3..].parse::<f32>().ok())
        .filter(|version| version.is_finite() && *version > 0.0);
    match version {
        Some(_) => Ok(()),
        None => Err(RequestError::UnsupportedVersion(tag.to_string())),
    }
}

fn update(args: &[&str]) -> Result<UpdateRequest, RequestError> {
    let field = args[0];
    let name = args[1].to_string();
    match field.to_ascii_uppercase().as_str() {
        "STATE" => Ok(UpdateRequest::State { name }),
        "NAME" | "TOPIC" if args.len() < 3 => Err(RequestError::InsufficientArguments),
        "NAME" => Ok(UpdateRequest::Name {
            name,
            new_name: args[2].to_string(),
        }),
        "TOPIC" => Ok(UpdateRequest::Topic {
            name,
            new_topic: args[2].to_string(),
        }),
        _ => Err(RequestError::UnknownUpdateField(field.to_string())),
    }
}
