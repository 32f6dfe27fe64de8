//! Bus topic naming.
//!
//! A device is addressed by its topic stem: commands go to
//! `cmnd/<stem>/<COMMAND>` and status reports arrive on `stat/<stem>/RESULT`.

/// Prefix of topics the device publishes status on.
pub const STATUS_PREFIX: &str = "stat/";
/// Prefix of topics the device listens for commands on.
pub const COMMAND_PREFIX: &str = "cmnd/";
/// Literal suffix of the status topic.
pub const RESULT_SUFFIX: &str = "/RESULT";
/// Command asking the device for a full status report.
pub const STATE_COMMAND: &str = "STATE";
/// Command telling the device to switch to a new topic stem.
pub const TOPIC_COMMAND: &str = "TOPIC";

/// Build a full topic from a prefix, a stem and a suffix.
///
/// A suffix starting with `/` is a literal and is appended verbatim;
/// anything else is upper-cased and joined with a `/`.
#[must_use]
pub fn bind(prefix: &str, stem: &str, suffix: &str) -> String {
    if suffix.starts_with('/') {
        format!("{prefix}{stem}{suffix}")
    } else {
        format!("{prefix}{stem}/{}", suffix.to_ascii_uppercase())
    }
}

/// `stat/<stem>/RESULT`
#[must_use]
pub fn status_topic(stem: &str) -> String {
    bind(STATUS_PREFIX, stem, RESULT_SUFFIX)
}

/// `cmnd/<stem>/<COMMAND>`
#[must_use]
pub fn command_topic(stem: &str, command: &str) -> String {
    bind(COMMAND_PREFIX, stem, command)
}

/// Whether `topic` is the status topic of `stem`, ignoring case.
#[must_use]
pub fn status_matches(topic: &str, stem: &str) -> bool {
    status_topic(stem).eq_ignore_ascii_case(topic)
}
