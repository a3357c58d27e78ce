use std::{env, ops::RangeInclusive, time::Duration as StdDuration};

use billing_engine::{
    helpers::{RetryPolicy, DEFAULT_WEBHOOK_TOLERANCE},
    ReconciliationOptions,
    DEFAULT_REFUND_RETRIES,
    DEFAULT_REFUND_TIMEOUT,
    DEFAULT_TRIAL_DAYS,
    MIN_EVENT_RETENTION_DAYS,
};
use chrono::Duration;
use log::*;
#[cfg(feature = "stripe")]
use stripe_tools::StripeConfig;
use vb_common::{helpers::parse_seconds, Secret};

const DEFAULT_VB_HOST: &str = "127.0.0.1";
const DEFAULT_VB_PORT: u16 = 8460;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_RETENTION_DAYS: i64 = 30;
const MAX_CONFIGURED_DAYS: i64 = 3650;
const EVENT_RETENTION_DAYS: RangeInclusive<i64> = MIN_EVENT_RETENTION_DAYS..=MAX_CONFIGURED_DAYS;
const TRIAL_DAYS: RangeInclusive<i64> = 0..=MAX_CONFIGURED_DAYS;

/// Everything the server needs, read once at start-up and passed down explicitly.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Key required in the `X-Admin-Key` header for `/admin` routes. If empty, admin routes are unreachable.
    pub admin_api_key: Secret<String>,
    pub webhook: WebhookConfig,
    pub refund_timeout: StdDuration,
    pub refund_retries: u32,
    /// How long processed-event records are kept before the retention worker removes them.
    pub event_retention: Duration,
    pub trial_period: Duration,
    #[cfg(feature = "stripe")]
    pub stripe_config: StripeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VB_HOST.to_string(),
            port: DEFAULT_VB_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            admin_api_key: Secret::default(),
            webhook: WebhookConfig::default(),
            refund_timeout: DEFAULT_REFUND_TIMEOUT,
            refund_retries: DEFAULT_REFUND_RETRIES,
            event_retention: Duration::days(DEFAULT_EVENT_RETENTION_DAYS),
            trial_period: Duration::days(DEFAULT_TRIAL_DAYS),
            #[cfg(feature = "stripe")]
            stripe_config: StripeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VB_HOST").ok().unwrap_or_else(|| DEFAULT_VB_HOST.into());
        let port = env::var("VB_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for VB_PORT. {e} Using the default, {DEFAULT_VB_PORT}, instead.");
                    DEFAULT_VB_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VB_PORT);
        let database_url = env::var("VB_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VB_DATABASE_URL is not set. Please set it to the URL for the billing database.");
            String::default()
        });
        let db_max_connections = env::var("VB_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid VB_DB_MAX_CONNECTIONS. {e}")).ok())
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let admin_api_key = env::var("VB_ADMIN_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ VB_ADMIN_API_KEY is not set. The admin routes will reject every request.");
            String::default()
        });
        let refund_timeout = seconds_from_env("VB_REFUND_TIMEOUT", DEFAULT_REFUND_TIMEOUT);
        let refund_retries = env::var("VB_REFUND_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid VB_REFUND_RETRIES. {e}")).ok())
            .unwrap_or(DEFAULT_REFUND_RETRIES);
        let event_retention =
            days_from_env("VB_EVENT_RETENTION_DAYS", DEFAULT_EVENT_RETENTION_DAYS, EVENT_RETENTION_DAYS);
        let trial_period = days_from_env("VB_TRIAL_DAYS", DEFAULT_TRIAL_DAYS, TRIAL_DAYS);
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            admin_api_key: Secret::new(admin_api_key),
            webhook: WebhookConfig::from_env_or_default(),
            refund_timeout,
            refund_retries,
            event_retention,
            trial_period,
            #[cfg(feature = "stripe")]
            stripe_config: StripeConfig::new_from_env_or_default(),
        }
    }

    pub fn reconciliation_options(&self) -> ReconciliationOptions {
        ReconciliationOptions {
            refund_timeout: self.refund_timeout,
            refund_retries: self.refund_retries,
            retry_policy: RetryPolicy::default(),
        }
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The endpoint signing secret (`whsec_...`)
    pub signing_secret: Secret<String>,
    /// Maximum age of a signed event timestamp
    pub tolerance: StdDuration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { signing_secret: Secret::default(), tolerance: DEFAULT_WEBHOOK_TOLERANCE }
    }
}

impl WebhookConfig {
    pub fn new(signing_secret: &str) -> Self {
        Self { signing_secret: Secret::new(signing_secret.to_string()), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let signing_secret = env::var("VB_STRIPE_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ VB_STRIPE_WEBHOOK_SECRET is not set. Every webhook delivery will be rejected until it is set to the \
                 endpoint's signing secret."
            );
            String::default()
        });
        let tolerance = seconds_from_env("VB_WEBHOOK_TOLERANCE", DEFAULT_WEBHOOK_TOLERANCE);
        Self { signing_secret: Secret::new(signing_secret), tolerance }
    }
}

fn seconds_from_env(var: &str, default: StdDuration) -> StdDuration {
    match env::var(var) {
        Ok(s) => parse_seconds(&s).unwrap_or_else(|| {
            warn!("🪛️ Invalid configuration value for {var}: {s}. Using the default of {}s.", default.as_secs());
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default value of {}s.", default.as_secs());
            default
        },
    }
}

/// Reads a whole number of days. Values outside `bounds` are clamped to the nearest bound.
fn days_from_env(var: &str, default: i64, bounds: RangeInclusive<i64>) -> Duration {
    let days = match env::var(var) {
        Ok(s) => s.trim().parse::<i64>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {var}: {s}. {e} Using the default of {default} days.");
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default value of {default} days.");
            default
        },
    };
    let (min, max) = bounds.into_inner();
    let clamped = days.clamp(min, max);
    if clamped != days {
        warn!("🪛️ {var} must be between {min} and {max} days. Using {clamped} instead of {days}.");
    }
    Duration::days(clamped)
}
