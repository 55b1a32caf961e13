use std::{env, time::Duration};

use log::*;
use spg_common::{helpers::parse_boolean_flag, Secret};

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Static gateway configuration. A single client is built from this at startup; nothing in here changes per request.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server_key: Secret<String>,
    pub is_production: bool,
    /// Base URL of the hosted payment page (session creation) API.
    pub snap_url: String,
    /// Base URL of the core API (transaction status queries).
    pub api_url: String,
    /// Upper bound on the duration of any single call to the gateway.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(Secret::default(), false)
    }
}

impl GatewayConfig {
    pub fn new(server_key: Secret<String>, is_production: bool) -> Self {
        let (snap_url, api_url) = if is_production {
            (PRODUCTION_SNAP_URL, PRODUCTION_API_URL)
        } else {
            (SANDBOX_SNAP_URL, SANDBOX_API_URL)
        };
        Self {
            server_key,
            is_production,
            snap_url: snap_url.to_string(),
            api_url: api_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let server_key = Secret::new(env::var("SPG_GATEWAY_SERVER_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SPG_GATEWAY_SERVER_KEY not set. Calls to the payment gateway will be rejected.");
            String::default()
        }));
        let is_production = parse_boolean_flag(env::var("SPG_GATEWAY_PRODUCTION").ok(), false);
        let mut config = Self::new(server_key, is_production);
        if let Ok(url) = env::var("SPG_GATEWAY_SNAP_URL") {
            config.snap_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("SPG_GATEWAY_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        config.timeout = env::var("SPG_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for SPG_GATEWAY_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        info!(
            "🪛️ Payment gateway: {} mode, snap url {}, api url {}, timeout {}s",
            if config.is_production { "production" } else { "sandbox" },
            config.snap_url,
            config.api_url,
            config.timeout.as_secs()
        );
        config
    }
}
