use std::{env, io::Write, net::IpAddr};

use chrono::Duration;
use gateway_tools::GatewayConfig;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use spg_common::{helpers::parse_boolean_flag, MinorUnits, Secret, DEFAULT_CURRENCY_CODE};
use storefront_payment_engine::{
    amount_adjuster::DEFAULT_AMOUNT_TOLERANCE,
    session_objects::{PaymentSessionOptions, SessionCallbacks, DEFAULT_STALE_SESSION_HOURS},
};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_SIGNATURE_HEADER: &str = "X-Gateway-Signature";
const DEFAULT_FINISH_URL: &str = "http://localhost:3000/payment/finish";
const DEFAULT_ERROR_URL: &str = "http://localhost:3000/payment/error";
const DEFAULT_PENDING_URL: &str = "http://localhost:3000/payment/pending";
const JWT_SECRET_LENGTH: usize = 64;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Connection settings for the payment gateway's REST API
    pub gateway: GatewayConfig,
    /// Settings for the gateway's payment notification webhook
    pub webhook: WebhookConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            gateway: GatewayConfig::default(),
            webhook: WebhookConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_env_number("SPG_DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SPG_USE_FORWARDED").ok(), false);
        let gateway = GatewayConfig::new_from_env_or_default();
        let webhook = WebhookConfig::from_env_or_defaults();
        let session = SessionConfig::from_env_or_defaults();
        Self {
            host,
            port,
            database_url,
            max_connections,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            gateway,
            webhook,
            session,
        }
    }
}

fn parse_env_number<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T
where T::Err: std::fmt::Display {
    env::var(name)
        .map_err(|_| debug!("🪛️ {name} is not set. Using the default value of {default}."))
        .and_then(|s| s.parse::<T>().map_err(|e| warn!("🪛️ Invalid configuration value for {name} ({s}). {e}")))
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The shared secret that the gateway signs notification bodies with.
    pub hmac_secret: Secret<String>,
    /// Only switch this off for local testing.
    pub hmac_checks: bool,
    /// The header that carries the base64-encoded HMAC-SHA256 signature.
    pub signature_header: String,
    /// If supplied, requests against /gateway endpoints will be checked against a whitelist of IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            hmac_checks: true,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            whitelist: None,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("SPG_GATEWAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SPG_GATEWAY_WEBHOOK_SECRET is not set. Please set it to the secret the payment gateway signs \
                 notifications with."
            );
            String::default()
        });
        let hmac_secret = Secret::new(hmac_secret);
        let hmac_checks = parse_boolean_flag(env::var("SPG_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ HMAC checks on gateway notifications are DISABLED. Anyone can mark orders as paid.");
        }
        let signature_header =
            env::var("SPG_GATEWAY_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let whitelist = env::var("SPG_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't \
                     accept any payment notifications."
                );
            },
            None => {
                info!("🪛️ No gateway IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret, hmac_checks, signature_header, whitelist }
    }
}

fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set SPG_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in SPG_GATEWAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

//-------------------------------------------------  SessionConfig  ----------------------------------------------------
/// How payment sessions are opened and retried.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub finish_url: String,
    pub error_url: String,
    pub pending_url: String,
    pub amount_tolerance: MinorUnits,
    pub stale_after: Duration,
    pub currency: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finish_url: DEFAULT_FINISH_URL.to_string(),
            error_url: DEFAULT_ERROR_URL.to_string(),
            pending_url: DEFAULT_PENDING_URL.to_string(),
            amount_tolerance: MinorUnits::from(DEFAULT_AMOUNT_TOLERANCE),
            stale_after: Duration::hours(DEFAULT_STALE_SESSION_HOURS),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_env_or_defaults() -> Self {
        let finish_url = env::var("SPG_FINISH_URL").ok().unwrap_or_else(|| DEFAULT_FINISH_URL.to_string());
        let error_url = env::var("SPG_ERROR_URL").ok().unwrap_or_else(|| DEFAULT_ERROR_URL.to_string());
        let pending_url = env::var("SPG_PENDING_URL").ok().unwrap_or_else(|| DEFAULT_PENDING_URL.to_string());
        let tolerance = parse_env_number("SPG_AMOUNT_TOLERANCE", DEFAULT_AMOUNT_TOLERANCE);
        let stale_hours = parse_env_number("SPG_STALE_SESSION_HOURS", DEFAULT_STALE_SESSION_HOURS);
        let currency = env::var("SPG_CURRENCY").ok().unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        info!("🪛️ Amount tolerance: {tolerance}. Sessions go stale after {stale_hours} hrs. Currency: {currency}");
        Self {
            finish_url,
            error_url,
            pending_url,
            amount_tolerance: MinorUnits::from(tolerance),
            stale_after: Duration::hours(stale_hours),
            currency,
        }
    }

    pub fn payment_session_options(&self) -> PaymentSessionOptions {
        let callbacks = SessionCallbacks {
            finish: self.finish_url.clone(),
            error: self.error_url.clone(),
            pending: self.pending_url.clone(),
        };
        PaymentSessionOptions::default()
            .with_callbacks(callbacks)
            .with_amount_tolerance(self.amount_tolerance)
            .with_stale_after(self.stale_after)
            .with_currency(self.currency.clone())
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to verify (and, in tooling, sign) access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since all issued access tokens become invalid on restart. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(JWT_SECRET_LENGTH).map(char::from).collect::<String>();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production \
                         instance, you are doing it wrong! Set the SPG_JWT_SECRET environment variable instead. \
                         🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("SPG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [SPG_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "SPG_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self::new(secret))
    }
}
