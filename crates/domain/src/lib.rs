//! # kisslight-domain
//!
//! Pure domain model for the kisslight home automation hub.
//!
//! ## Responsibilities
//! - Define **Devices** (outlets, power strips, bulbs, custom) and their type descriptors
//! - Hold the bounded device **state** text and the in-place partial patcher over it
//! - Define the per-slot **change codes** consumed by the write-back synchronizer
//! - Derive bus **topics** from a device's topic stem
//! - Parse control **protocol** requests and render responses
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod change;
pub mod device;
pub mod error;
pub mod protocol;
pub mod state;
pub mod topic;
