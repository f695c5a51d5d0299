//! Server Configuration
//!
//! Read once at startup and threaded into [`AppState`](crate::state::AppState).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use connect_payments::{FeeSchedule, DEFAULT_FEE_PERCENT, DEFAULT_TOLERANCE_SECS};
use thiserror::Error;

pub const DEFAULT_BASE_PRICE: i64 = 1000;
pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4242";
pub const DEFAULT_STRIPE_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// How checkout and link endpoints hand the platform URL back
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// JSON body containing the URL
    #[default]
    Json,
    /// 303 See Other to the URL
    Redirect,
}

impl ResponseMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Json => "json",
            ResponseMode::Redirect => "redirect",
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ResponseMode::Json),
            "redirect" => Ok(ResponseMode::Redirect),
            other => Err(format!("expected `json` or `redirect`, got `{other}`")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,

    /// Price of one item in minor units
    pub base_price: i64,

    /// Display currency surfaced to the storefront
    pub currency: String,

    /// Public base URL; derived from the `Host` header when unset
    pub domain: Option<String>,

    pub static_dir: PathBuf,
    pub fees: FeeSchedule,
    pub response_mode: ResponseMode,
    pub stripe_timeout: Duration,

    /// Oldest webhook signature timestamp accepted, in seconds
    pub webhook_tolerance_secs: u64,

    pub bind_addr: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("webhook_secret", &"[REDACTED]")
            .field("base_price", &self.base_price)
            .field("currency", &self.currency)
            .field("domain", &self.domain)
            .field("static_dir", &self.static_dir)
            .field("fees", &self.fees)
            .field("response_mode", &self.response_mode)
            .field("stripe_timeout", &self.stripe_timeout)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let base_price: i64 = parse_or(&get, "BASE_PRICE", DEFAULT_BASE_PRICE)?;
        if base_price <= 0 {
            return Err(ConfigError::Invalid {
                key: "BASE_PRICE",
                value: base_price.to_string(),
                reason: "must be a positive amount in minor units".into(),
            });
        }

        let fee_percent: u8 = parse_or(&get, "APPLICATION_FEE_PERCENT", DEFAULT_FEE_PERCENT)?;
        let fees = FeeSchedule::new(fee_percent).map_err(|e| ConfigError::Invalid {
            key: "APPLICATION_FEE_PERCENT",
            value: fee_percent.to_string(),
            reason: e.to_string(),
        })?;

        let timeout_secs: u64 =
            parse_or(&get, "STRIPE_TIMEOUT_SECS", DEFAULT_STRIPE_TIMEOUT_SECS)?;

        Ok(Self {
            secret_key: required("STRIPE_SECRET_KEY")?,
            publishable_key: required("STRIPE_PUBLISHABLE_KEY")?,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            base_price,
            currency: get("CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            domain: get("DOMAIN").map(|d| d.trim_end_matches('/').to_string()),
            static_dir: get("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.into())
                .into(),
            fees,
            response_mode: parse_or(&get, "CHECKOUT_RESPONSE", ResponseMode::default())?,
            stripe_timeout: Duration::from_secs(timeout_secs),
            webhook_tolerance_secs: parse_or(
                &get,
                "WEBHOOK_TOLERANCE_SECS",
                DEFAULT_TOLERANCE_SECS,
            )?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
