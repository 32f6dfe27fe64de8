//! # kisslight-adapter-control-tcp
//!
//! TCP front-end for the KL control protocol.
//!
//! ## Responsibilities
//! - Accept client connections, up to a configured number at a time
//! - Read one request line at a time and write back the dispatcher's response
//! - Close a connection after QUIT
//!
//! ## Dependency rule
//! Depends on `kisslight-app` (for the dispatcher) and `kisslight-domain`
//! (for protocol types).

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::ControlError;
pub use server::ControlServer;
