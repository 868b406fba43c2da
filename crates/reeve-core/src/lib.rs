//! # reeve-core
//!
//! Shared vocabulary for the reeve gateway: branded ID newtypes used by
//! every other crate.
//!
//! IDs are newtype wrappers around `String` so a controller ID can never be
//! passed where a model ID is expected. Fresh IDs are UUID v7 (time-ordered).

#![deny(unsafe_code)]

pub mod ids;

pub use ids::{ConnectionId, ControllerId, ModelId};
