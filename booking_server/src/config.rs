use std::{env, str::FromStr, time::Duration};

use booking_engine::config::{EngineConfig, DEFAULT_FAN_OUT, DEFAULT_HANDOFF_MAX_ATTEMPTS, DEFAULT_OFFER_TIMEOUT};
use log::*;
use svc_common::helpers::parse_boolean_flag;

const DEFAULT_BKS_HOST: &str = "127.0.0.1";
const DEFAULT_BKS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/bookings.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Dispatch and handoff policy handed to the engine
    pub engine: EngineConfig,
    /// The longest the dispatch sweeper sleeps without checking for overdue rounds.
    pub sweep_interval: Duration,
    /// If true, pending database migrations are applied when the server starts.
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BKS_HOST.to_string(),
            port: DEFAULT_BKS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            engine: EngineConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BKS_HOST").ok().unwrap_or_else(|| DEFAULT_BKS_HOST.into());
        let port = env_or_default("BKS_PORT", DEFAULT_BKS_PORT);
        let database_url = env::var("BKS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BKS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let max_connections = env_or_default("BKS_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let engine = engine_config_from_env();
        let sweep_interval =
            Duration::from_secs(env_or_default("BKS_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL.as_secs()).max(1));
        let run_migrations = parse_boolean_flag(env::var("BKS_RUN_MIGRATIONS").ok(), true);
        Self { host, port, database_url, max_connections, engine, sweep_interval, run_migrations }
    }
}

fn engine_config_from_env() -> EngineConfig {
    let fan_out = env_or_default("BKS_DISPATCH_FAN_OUT", DEFAULT_FAN_OUT);
    let offer_timeout = Duration::from_secs(env_or_default("BKS_OFFER_TIMEOUT_SECS", DEFAULT_OFFER_TIMEOUT.as_secs()));
    if offer_timeout.is_zero() {
        warn!("🪛️ BKS_OFFER_TIMEOUT_SECS is zero. Every dispatch round will expire straight away.");
    }
    let attempts = env_or_default("BKS_HANDOFF_MAX_ATTEMPTS", DEFAULT_HANDOFF_MAX_ATTEMPTS);
    let config = EngineConfig::default()
        .with_fan_out(fan_out)
        .with_offer_timeout(offer_timeout)
        .with_handoff_max_attempts(attempts);
    info!(
        "🪛️ Dispatching to {} providers with a {}s offer timeout. Handoff locks after {} wrong codes",
        config.fan_out,
        config.offer_timeout.as_secs(),
        config.handoff_max_attempts
    );
    config
}

/// Reads and parses an environment variable. Missing or invalid values fall back to the default.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8470);
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
        assert_eq!(config.engine.fan_out, DEFAULT_FAN_OUT);
        assert!(config.run_migrations);
    }

    #[test]
    fn invalid_values_fall_back() {
        env::set_var("BKS_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(env_or_default("BKS_TEST_PORT_GARBAGE", 8470u16), 8470);
        env::set_var("BKS_TEST_PORT_OK", " 9000 ");
        assert_eq!(env_or_default("BKS_TEST_PORT_OK", 8470u16), 9000);
        assert_eq!(env_or_default("BKS_TEST_NOT_SET", 7u64), 7);
    }
}
