use std::time::Duration;

use log::*;
use vb_common::{helpers::parse_seconds, Secret};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Base URL for REST calls. Overridable so that tests and stripe-mock can stand in for the real API.
    pub api_base: String,
    pub secret_key: Secret<String>,
    /// Upper bound for any single request. Requests that exceed it are dropped.
    pub request_timeout: Duration,
    pub currency: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            secret_key: Secret::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            currency: vb_common::DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("VB_STRIPE_API_BASE").unwrap_or_else(|_| {
            debug!("VB_STRIPE_API_BASE not set, using {DEFAULT_STRIPE_API_BASE}");
            DEFAULT_STRIPE_API_BASE.to_string()
        });
        let secret_key = Secret::new(std::env::var("VB_STRIPE_API_KEY").unwrap_or_else(|_| {
            warn!("VB_STRIPE_API_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let request_timeout = std::env::var("VB_STRIPE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| parse_seconds(&s))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let currency = std::env::var("VB_CURRENCY").unwrap_or_else(|_| vb_common::DEFAULT_CURRENCY_CODE.to_string());
        Self { api_base, secret_key, request_timeout, currency }
    }
}
