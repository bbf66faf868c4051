//! The bridge pipeline.
//!
//! One bus event in, at most one store write out. Each event is transformed
//! independently: derive the storage key from the topic, read the payload as
//! a UTF-8 string, and issue a set-with-expiration against the store. There
//! is no queuing, batching, or retry around it.

use std::time::Duration;

use ocbridge_core::storage_key;
use tracing::{debug, error};

use crate::store::LastValueStore;

/// How long a mirrored value lives without a fresh write: 2,944 hours,
/// roughly four months.
pub const LAST_VALUE_EXPIRATION: Duration = Duration::from_secs(2_944 * 60 * 60);

/// Per-event transformer feeding a last-value store.
///
/// The bridge holds no state between events beyond the store handle and the
/// expiration it stamps on every write, so any number of events can be
/// handled back to back without coordination.
pub struct Bridge<S> {
    store: S,
    expiration: Duration,
}

impl<S: LastValueStore> Bridge<S> {
    /// Create a bridge writing through `store`.
    ///
    /// The daemon passes [`LAST_VALUE_EXPIRATION`]; tests shorten it.
    pub fn new(store: S, expiration: Duration) -> Self {
        Self { store, expiration }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle one bus event.
    ///
    /// Applies the standard OpenChirp topic rules to derive the storage key
    /// and replaces the stored value, restarting its expiration. A failed
    /// write is logged with the key, the intended value, and the store's
    /// error, then dropped; the error never propagates and the next event
    /// proceeds normally.
    pub async fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        let value = String::from_utf8_lossy(payload);
        debug!("Bus message: {} = {}", topic, value);

        let key = storage_key(topic);
        if let Err(err) = self.store.set_with_expiry(&key, &value, self.expiration).await {
            error!("Failed to set {} with {}: {}", key, value, err);
        }
    }
}
