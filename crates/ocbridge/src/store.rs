//! Last-value store implementations.
//!
//! The store keeps at most one value per key: every write replaces the
//! previous value and restarts its expiration clock. The bridge only ever
//! issues one command shape ("set string value at key with expiration"),
//! captured by the [`LastValueStore`] trait.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use thiserror::Error;
use tracing::debug;

/// Default port for the store address when none is given.
const DEFAULT_STORE_PORT: u16 = 6379;

/// Errors that can occur while talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured address could not be parsed as `host[:port]`.
    #[error("Invalid store address: {0}")]
    InvalidAddress(String),

    /// The store rejected a connection attempt or a command.
    #[error("Store command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// Trait for last-value storage backends.
///
/// One operation: replace whatever is stored under `key` with `value` and
/// arm a fresh expiration. Implementations guarantee their own safety for
/// shared use; the pipeline only needs exclusive access for the duration of
/// a single write.
pub trait LastValueStore {
    /// Set `key` to `value`, expiring `expiry` from now.
    fn set_with_expiry(
        &mut self,
        key: &str,
        value: &str,
        expiry: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Connection parameters for the Redis store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store address as `host[:port]`.
    pub addr: String,
    /// Password, if the store requires one.
    pub password: Option<String>,
    /// Database index to select.
    pub db: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: format!("localhost:{}", DEFAULT_STORE_PORT),
            password: None,
            db: 1,
        }
    }
}

/// Redis-backed last-value store.
///
/// Holds a managed connection that reconnects on its own; a write issued
/// while the connection is down simply fails and is reported to the caller.
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store and probe it with a `PING`.
    ///
    /// An unreachable store at this point is a misconfiguration: the error
    /// is returned immediately without retry or backoff.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let (host, port) = split_addr(&config.addr)?;

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: config.db,
                username: None,
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let client = Client::open(info)?;
        let mut connection = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        debug!("Redis pong: {}", pong);

        Ok(Self { connection })
    }
}

impl LastValueStore for RedisStore {
    async fn set_with_expiry(
        &mut self,
        key: &str,
        value: &str,
        expiry: Duration,
    ) -> Result<(), StoreError> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry.as_secs())
            .query_async(&mut self.connection)
            .await?;
        Ok(())
    }
}

/// A value held by [`MemoryStore`], with its absolute expiration deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub value: String,
    pub expires_at: Instant,
}

/// In-memory last-value store.
///
/// Records the value and deadline per key and never evicts; used by the
/// bridge tests in place of a live store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LastValueStore for MemoryStore {
    async fn set_with_expiry(
        &mut self,
        key: &str,
        value: &str,
        expiry: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + expiry,
            },
        );
        Ok(())
    }
}

/// Split a `host[:port]` address, defaulting the port.
fn split_addr(addr: &str) -> Result<(String, u16), StoreError> {
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| StoreError::InvalidAddress(addr.to_string()))?;
            Ok((host.to_string(), port))
        }
        None => Ok((addr.to_string(), DEFAULT_STORE_PORT)),
    }
}
