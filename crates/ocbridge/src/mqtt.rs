//! MQTT event source.
//!
//! Wraps a [`rumqttc`] client with the small amount of policy the bridge
//! needs: a strict `tcp`/`tls` broker URL scheme, an exactly-once device
//! telemetry subscription, and automatic re-subscription whenever the broker
//! hands out a fresh session.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ocbridge_core::{FilterError, TopicFilter};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::Bridge;
use crate::store::LastValueStore;

/// Broker reached when no `--mqtt-server` is given.
pub const DEFAULT_BROKER_URL: &str = "tls://localhost:8883";

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Outbound request queue capacity for the async client.
const CLIENT_CAPACITY: usize = 10;

/// Errors raised while talking to the bus.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0} (expected scheme://host:port where scheme is tcp or tls)")]
    InvalidBrokerUrl(String),
    #[error("Invalid subscription filter: {0}")]
    InvalidFilter(#[from] FilterError),
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

/// Transport scheme accepted in a broker URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScheme {
    Tcp,
    Tls,
}

impl BrokerScheme {
    fn default_port(self) -> u16 {
        match self {
            BrokerScheme::Tcp => 1883,
            BrokerScheme::Tls => 8883,
        }
    }
}

impl fmt::Display for BrokerScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerScheme::Tcp => write!(f, "tcp"),
            BrokerScheme::Tls => write!(f, "tls"),
        }
    }
}

/// A broker address parsed from `scheme://host[:port]`.
///
/// The scheme is mandatory and must be `tcp` or `tls`; the port falls back
/// to the scheme's registered default (1883 or 8883).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    pub scheme: BrokerScheme,
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerUrl {
    type Err = MqttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MqttError::InvalidBrokerUrl(s.to_string());

        let (scheme, rest) = match s.split_once("://") {
            Some(("tcp", rest)) => (BrokerScheme::Tcp, rest),
            Some(("tls", rest)) => (BrokerScheme::Tls, rest),
            _ => return Err(invalid()),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (rest, scheme.default_port()),
        };
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Connection settings for the bus.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker URL in `scheme://host:port` form.
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_BROKER_URL.to_string(),
            username: None,
            password: None,
        }
    }
}

/// A connected, subscribed bus session.
pub struct MqttSource {
    client: AsyncClient,
    event_loop: EventLoop,
    filter: TopicFilter,
}

impl MqttSource {
    /// Connect to the broker and subscribe to `filter`.
    ///
    /// Drives the connection until the broker acknowledges the session, so
    /// an unreachable address or rejected credentials surface here rather
    /// than inside the event loop.
    pub async fn connect(config: &MqttConfig, filter: &str) -> Result<Self, MqttError> {
        let url: BrokerUrl = config.server.parse()?;
        let filter = TopicFilter::new(filter)?;

        let mut client_id = Uuid::new_v4().simple().to_string();
        client_id.truncate(12);

        let mut options =
            MqttOptions::new(format!("ocbridge-{client_id}"), url.host.clone(), url.port);
        options.set_keep_alive(KEEP_ALIVE);
        if url.scheme == BrokerScheme::Tls {
            options.set_transport(Transport::Tls(TlsConfiguration::Native));
        }
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut event_loop) = AsyncClient::new(options, CLIENT_CAPACITY);

        loop {
            if let Event::Incoming(Packet::ConnAck(_)) = event_loop.poll().await? {
                break;
            }
        }
        info!("Connected to MQTT broker at {}", url);
        client.subscribe(filter.as_str(), QoS::ExactlyOnce).await?;

        Ok(Self {
            client,
            event_loop,
            filter,
        })
    }

    /// The filter this session is subscribed to.
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Pump bus events through `bridge` until the task is cancelled.
    ///
    /// A dropped connection is logged and retried after a short pause. The
    /// client reconnects with a clean session, so the subscription is placed
    /// again on every connection acknowledgement.
    pub async fn run<S: LastValueStore>(
        &mut self,
        bridge: &mut Bridge<S>,
    ) -> Result<(), MqttError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    bridge.handle_message(&publish.topic, &publish.payload).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Session established, subscribing to {}", self.filter);
                    self.client
                        .subscribe(self.filter.as_str(), QoS::ExactlyOnce)
                        .await?;
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription to {} acknowledged", self.filter);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("MQTT connection error: {}, reconnecting", err);
                    tokio::time::sleep(RECONNECT_PAUSE).await;
                }
            }
        }
    }

    /// Send a clean disconnect to the broker.
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        // One final poll flushes the outgoing packet.
        let _ = self.event_loop.poll().await;
        Ok(())
    }
}
