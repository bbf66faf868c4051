//! # ocbridge-core
//!
//! Core OpenChirp topic rules for the pubsub bridge.
//!
//! This crate provides:
//! - Topic filter parsing and wildcard matching
//! - Storage-key derivation (the standard OpenChirp topic rules)
//! - The counted-replace primitive the derivation is built on
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! and no I/O; the bridge runtime lives in the `ocbridge` crate.

pub mod key;
pub mod topic;

pub use key::{
    replace_first_n, storage_key, KEY_SEPARATOR, SEPARATOR_SUBSTITUTIONS, SPACE_SUBSTITUTIONS,
};
pub use topic::{FilterError, TopicFilter, DEVICE_TELEMETRY_FILTER};
