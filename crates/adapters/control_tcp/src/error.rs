//! Control server error types.

/// Errors raised by the control server itself. Request errors never surface
/// here; they are answered on the connection.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The listening socket could not be bound.
    #[error("failed to bind control server on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed.
    #[error("control connection I/O error")]
    Io(#[from] std::io::Error),
}
