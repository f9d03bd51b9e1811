use std::{env, time::Duration};

use log::*;
use settlement_engine::gateways::MockProviderConfig;
use storefront_common::{parse_boolean_flag, Secret};

const DEFAULT_SFS_HOST: &str = "127.0.0.1";
const DEFAULT_SFS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Upper bound on every call made to an external payment gateway.
    pub gateway_timeout: Duration,
    /// How often pending invoices are checked against gateways that support polling.
    pub poll_interval: Duration,
    pub polling_enabled: bool,
    /// The bundled mock provider adapter is only registered when this is set.
    pub mock_gateway: Option<MockProviderConfig>,
    pub notifier: Option<NotifierConfig>,
}

/// Where deposit notifications are sent.
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub url: String,
    pub api_key: Secret<String>,
    /// Upper bound on a single notification request
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SFS_HOST.to_string(),
            port: DEFAULT_SFS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            polling_enabled: true,
            mock_gateway: None,
            notifier: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SFS_HOST").ok().unwrap_or_else(|| DEFAULT_SFS_HOST.into());
        let port = env::var("SFS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SFS_PORT. {e} Using the default, {DEFAULT_SFS_PORT}, instead."
                    );
                    DEFAULT_SFS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SFS_PORT);
        let database_url = env::var("SFS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SFS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let gateway_timeout = seconds_from_env("SFS_GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT);
        let poll_interval = seconds_from_env("SFS_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL);
        let polling_enabled = !parse_boolean_flag(env::var("SFS_DISABLE_POLLING").ok().as_deref(), false);
        if !polling_enabled {
            info!("🪛️ Pending invoice polling is disabled");
        }
        let mock_gateway = mock_gateway_from_env(gateway_timeout);
        let notifier = NotifierConfig::from_env(gateway_timeout);
        Self { host, port, database_url, gateway_timeout, poll_interval, polling_enabled, mock_gateway, notifier }
    }
}

impl NotifierConfig {
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let Ok(url) = env::var("SFS_NOTIFY_URL") else {
            info!("🪛️ SFS_NOTIFY_URL is not set. Deposit notifications are disabled.");
            return None;
        };
        let api_key = env::var("SFS_SERVICE_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ SFS_SERVICE_API_KEY is not set. Deposit notifications will be sent without an API key.");
            String::default()
        });
        info!("🪛️ Deposit notifications will be sent to {url}");
        Some(Self { url, api_key: Secret::new(api_key), timeout })
    }
}

fn mock_gateway_from_env(timeout: Duration) -> Option<MockProviderConfig> {
    let Ok(base_url) = env::var("SFS_MOCK_GATEWAY_URL") else {
        info!("🪛️ SFS_MOCK_GATEWAY_URL is not set. The mock payment provider will not be available.");
        return None;
    };
    let webhook_secret = env::var("SFS_MOCK_GATEWAY_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
    if webhook_secret.is_none() {
        warn!("🚨️ SFS_MOCK_GATEWAY_SECRET is not set. Webhook signatures from the mock provider will NOT be checked.");
    }
    let polling = parse_boolean_flag(env::var("SFS_MOCK_GATEWAY_POLLING").ok().as_deref(), false);
    info!("🪛️ Mock payment provider configured at {base_url} (polling: {polling})");
    Some(MockProviderConfig { base_url, webhook_secret, polling, timeout })
}

fn seconds_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}
