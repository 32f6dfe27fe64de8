//! # kisslight-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceStore` — durable mirror of the registry
//!   - `MessageBus` — publish/subscribe towards the field devices
//! - Own the **device registry**, the single shared table every context mutates
//! - Provide the **use-cases** driving it:
//!   - `Dispatcher` — executes control protocol requests
//!   - `StatusHandler` — merges status reports arriving from the bus
//!   - `WriteBackSynchronizer` — periodically flushes pending changes to the store
//!
//! ## Dependency rule
//! Depends on `kisslight-domain` only (plus `tokio` for the lock and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod registry;
pub mod services;
pub mod sync;

#[cfg(test)]
mod testing;
