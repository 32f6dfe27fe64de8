//! Control protocol — line-oriented requests and `KL/<version>` responses.
//!
//! A request is a whitespace-separated line: a case-insensitive verb, its
//! arguments, and a trailing `KL/<version>` tag. Every response starts with
//! `KL/0.3 <code> <message>`.

pub mod request;
pub mod response;

pub use request::{Request, RequestError, UpdateRequest};
pub use response::{ListEntry, Response};

/// Protocol version announced in every response.
pub const PROTOCOL_VERSION: &str = "0.3";

/// Longest request line accepted, in bytes.
pub const MAX_REQUEST_LEN: usize = 512;
