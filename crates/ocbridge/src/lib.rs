//! # ocbridge
//!
//! OpenChirp pubsub bridge runtime: subscribes to device telemetry on the
//! MQTT bus and mirrors each value into Redis under its last-value key.
//!
//! The pieces compose in one direction: an [`mqtt::MqttSource`] feeds bus
//! events into a [`bridge::Bridge`], which writes through a
//! [`store::LastValueStore`]. Topic and key rules live in [`ocbridge_core`]
//! and stay free of I/O.

pub mod bridge;
pub mod mqtt;
pub mod store;

pub use bridge::{Bridge, LAST_VALUE_EXPIRATION};
pub use mqtt::{MqttConfig, MqttError, MqttSource, DEFAULT_BROKER_URL};
pub use store::{LastValueStore, MemoryStore, RedisStore, StoreConfig, StoreError};
