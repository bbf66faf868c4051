//! End-to-end tests for the bridge pipeline.
//!
//! These drive bus events through a real [`Bridge`] backed by an in-memory
//! store, and through a deliberately failing store, to verify the key rules,
//! expiration stamping, and the log-and-continue error policy.

use std::time::{Duration, Instant};

use ocbridge::{Bridge, LastValueStore, MemoryStore, StoreError, LAST_VALUE_EXPIRATION};

/// Store that rejects the first `failures` writes, then behaves like a
/// [`MemoryStore`].
struct FlakyStore {
    failures: usize,
    attempts: usize,
    inner: MemoryStore,
}

impl FlakyStore {
    fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            attempts: 0,
            inner: MemoryStore::new(),
        }
    }
}

impl LastValueStore for FlakyStore {
    async fn set_with_expiry(
        &mut self,
        key: &str,
        value: &str,
        expiry: Duration,
    ) -> Result<(), StoreError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(StoreError::Command(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "store unreachable",
            ))));
        }
        self.inner.set_with_expiry(key, value, expiry).await
    }
}

#[tokio::test]
async fn test_device_event_mirrored_under_storage_key() {
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;

    let entry = bridge
        .store()
        .get("openchirp:device:abc123:temperature")
        .expect("Value should be stored under the derived key");
    assert_eq!(entry.value, "72.5");
    assert_eq!(bridge.store().len(), 1);
}

#[tokio::test]
async fn test_mixed_case_topic_lands_lowercased() {
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("OpenChirp/Device/XYZ 001/Battery Level", b"low")
        .await;

    let entry = bridge
        .store()
        .get("openchirp:device:xyz_001:battery_level")
        .expect("Key should be lowercased with spaces replaced");
    assert_eq!(entry.value, "low");
}

#[tokio::test]
async fn test_expiration_deadline_is_four_months_out() {
    let before = Instant::now();
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;

    let entry = bridge
        .store()
        .get("openchirp:device:abc123:temperature")
        .unwrap();
    assert!(entry.expires_at >= before + LAST_VALUE_EXPIRATION);
    assert!(entry.expires_at <= Instant::now() + LAST_VALUE_EXPIRATION);
}

#[tokio::test]
async fn test_last_write_wins() {
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;
    bridge
        .handle_message("openchirp/device/abc123/temperature", b"73.1")
        .await;

    // Only the newest value survives, under a single key.
    let entry = bridge
        .store()
        .get("openchirp:device:abc123:temperature")
        .unwrap();
    assert_eq!(entry.value, "73.1");
    assert_eq!(bridge.store().len(), 1);
}

#[tokio::test]
async fn test_rewrite_refreshes_expiration() {
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;
    let first_deadline = bridge
        .store()
        .get("openchirp:device:abc123:temperature")
        .unwrap()
        .expires_at;

    tokio::time::sleep(Duration::from_millis(20)).await;

    // Same topic, same payload: the write still restarts the clock.
    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;
    let second_deadline = bridge
        .store()
        .get("openchirp:device:abc123:temperature")
        .unwrap()
        .expires_at;

    assert!(second_deadline > first_deadline);
}

#[tokio::test]
async fn test_distinct_transducers_get_distinct_keys() {
    let mut bridge = Bridge::new(MemoryStore::new(), LAST_VALUE_EXPIRATION);

    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;
    bridge
        .handle_message("openchirp/device/abc123/humidity", b"40")
        .await;

    assert_eq!(bridge.store().len(), 2);
    assert_eq!(
        bridge
            .store()
            .get("openchirp:device:abc123:temperature")
            .unwrap()
            .value,
        "72.5"
    );
    assert_eq!(
        bridge
            .store()
            .get("openchirp:device:abc123:humidity")
            .unwrap()
            .value,
        "40"
    );
}

#[tokio::test]
async fn test_store_failure_skips_event_and_continues() {
    let mut bridge = Bridge::new(FlakyStore::failing_first(2), LAST_VALUE_EXPIRATION);

    // The first two writes fail; the bridge must swallow the errors.
    bridge
        .handle_message("openchirp/device/abc123/temperature", b"72.5")
        .await;
    bridge
        .handle_message("openchirp/device/abc123/humidity", b"40")
        .await;
    bridge
        .handle_message("openchirp/device/abc123/pressure", b"1013")
        .await;

    let store = bridge.store();
    assert_eq!(store.attempts, 3, "Every event should reach the store");

    // The failed events are gone for good; only the third landed.
    assert!(store.inner.get("openchirp:device:abc123:temperature").is_none());
    assert!(store.inner.get("openchirp:device:abc123:humidity").is_none());
    assert_eq!(
        store.inner.get("openchirp:device:abc123:pressure").unwrap().value,
        "1013"
    );
    assert_eq!(store.inner.len(), 1);
}
