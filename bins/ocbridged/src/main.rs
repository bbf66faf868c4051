//! OpenChirp pubsub bridge daemon.
//!
//! Drops OpenChirp device transducer values into Redis: every publication on
//! `openchirp/device/<id>/<transducer>` is mirrored to the storage key
//! `openchirp:device:<id>:<transducer>`, where it lives for roughly four
//! months unless refreshed by a newer value.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocbridge::{Bridge, MqttConfig, MqttSource, RedisStore, StoreConfig, LAST_VALUE_EXPIRATION};
use ocbridge_core::DEVICE_TELEMETRY_FILTER;

#[derive(Parser, Debug)]
#[command(name = "ocbridged", version, about = "OpenChirp pubsub bridge daemon")]
struct Args {
    /// MQTT server URI (scheme://host:port where scheme is tcp or tls)
    #[arg(long, default_value = ocbridge::DEFAULT_BROKER_URL, env = "MQTT_SERVER")]
    mqtt_server: String,

    /// Username to login to the MQTT server with
    #[arg(long, env = "MQTT_USER")]
    mqtt_user: Option<String>,

    /// Password to login to the MQTT server with
    #[arg(long, env = "MQTT_PASS")]
    mqtt_pass: Option<String>,

    /// Redis server address as host[:port]
    #[arg(long, default_value = "localhost:6379", env = "REDIS_SERVER")]
    redis_server: String,

    /// Password to login to the Redis server with
    #[arg(long, env = "REDIS_PASS")]
    redis_pass: Option<String>,

    /// Selects which Redis DB to use
    #[arg(long, default_value_t = 1, env = "REDIS_DB")]
    redis_db: i64,

    /// Log filter directives (e.g. "info" or "ocbridge=debug")
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Log to the systemd journal instead of stderr
    #[arg(long, env = "SYSTEMD")]
    systemd: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("Invalid log level: {}", args.log_level))?;
    let registry = tracing_subscriber::registry().with(filter);
    if args.systemd {
        let journald = tracing_journald::layer().context("Failed to open systemd journal")?;
        registry.with(journald).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("OpenChirp pubsub bridge starting...");

    let store_config = StoreConfig {
        addr: args.redis_server,
        password: args.redis_pass,
        db: args.redis_db,
    };
    let store = RedisStore::connect(&store_config)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!("Connected to Redis at {}", store_config.addr);

    let mqtt_config = MqttConfig {
        server: args.mqtt_server,
        username: args.mqtt_user,
        password: args.mqtt_pass,
    };
    let mut source = MqttSource::connect(&mqtt_config, DEVICE_TELEMETRY_FILTER)
        .await
        .context("Failed to connect to MQTT Broker")?;

    tracing::info!(
        "Bridging {} into Redis DB {}",
        source.filter(),
        store_config.db
    );

    let mut bridge = Bridge::new(store, LAST_VALUE_EXPIRATION);

    // Run until the bus loop dies or we are interrupted
    tokio::select! {
        result = source.run(&mut bridge) => {
            if let Err(e) = result {
                tracing::error!("Bridge stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down...");
        }
    }

    // Leave the broker cleanly before the store connection drops
    if let Err(e) = source.disconnect().await {
        tracing::warn!("MQTT disconnect failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
