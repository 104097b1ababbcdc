//! Environment-driven configuration.
//!
//! Every setting has a default, so an empty environment yields a client that talks
//! to a backend on `localhost:8000`.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `POLKAPAY_API_URL` | `http://localhost:8000/api/v1` | Backend base URL |
//! | `POLKAPAY_APP_NAME` | `PolkaPay` | Name shown by wallet extensions |
//! | `POLKAPAY_RATES_INTERVAL_SECS` | `30` | Exchange rate polling period |
//! | `POLKAPAY_REQUEST_TIMEOUT_SECS` | `10` | HTTP request timeout |
//! | `POLKAPAY_SIGN_TIMEOUT_SECS` | unset | Deadline for signature prompts |
//!
//! # Example
//!
//! ```no_run
//! use polkapay::{api::Client, config::Config};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let client = Client::from_config(&config);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Context;
use url::Url;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
/// Application name sent to wallet extensions when requesting access.
pub const DEFAULT_APP_NAME: &str = "PolkaPay";
/// Exchange rates are refreshed this often by [`crate::hooks::exchange_rates`].
pub const DEFAULT_RATES_INTERVAL: Duration = Duration::from_secs(30);
/// HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const API_URL_VAR: &str = "POLKAPAY_API_URL";
const APP_NAME_VAR: &str = "POLKAPAY_APP_NAME";
const RATES_INTERVAL_VAR: &str = "POLKAPAY_RATES_INTERVAL_SECS";
const REQUEST_TIMEOUT_VAR: &str = "POLKAPAY_REQUEST_TIMEOUT_SECS";
const SIGN_TIMEOUT_VAR: &str = "POLKAPAY_SIGN_TIMEOUT_SECS";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, including the API prefix.
    pub api_url: Url,
    /// Application name presented to wallet extensions.
    pub app_name: String,
    /// Polling period for exchange rates.
    pub rates_interval: Duration,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Deadline for signature requests. `None` waits for the user indefinitely.
    pub sign_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            app_name: DEFAULT_APP_NAME.to_owned(),
            rates_interval: DEFAULT_RATES_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sign_timeout: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Unset variables fall back to their defaults. Set but malformed variables are
    /// an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_VAR) {
            config.api_url = url
                .parse()
                .with_context(|| format!("{API_URL_VAR} is not a valid URL: {url}"))?;
        }

        if let Some(name) = lookup(APP_NAME_VAR).filter(|name| !name.trim().is_empty()) {
            config.app_name = name;
        }

        if let Some(secs) = parse_secs(&lookup, RATES_INTERVAL_VAR)? {
            anyhow::ensure!(secs > 0, "{RATES_INTERVAL_VAR} must be greater than zero");
            config.rates_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_secs(&lookup, REQUEST_TIMEOUT_VAR)? {
            config.request_timeout = Duration::from_secs(secs);
        }

        config.sign_timeout = parse_secs(&lookup, SIGN_TIMEOUT_VAR)?.map(Duration::from_secs);

        Ok(config)
    }
}

/// Returns the default backend URL.
///
/// URL: `http://localhost:8000/api/v1`
#[inline(always)]
pub fn default_api_url() -> Url {
    DEFAULT_API_URL.parse().expect("default API URL is valid")
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<u64>> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds, got {value:?}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/api/v1");
        assert_eq!(config.app_name, "PolkaPay");
        assert_eq!(config.rates_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.sign_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("POLKAPAY_API_URL", "https://api.polkapay.example/api/v1"),
            ("POLKAPAY_APP_NAME", "DOT2PIX"),
            ("POLKAPAY_RATES_INTERVAL_SECS", "5"),
            ("POLKAPAY_SIGN_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.api_url.host_str(), Some("api.polkapay.example"));
        assert_eq!(config.app_name, "DOT2PIX");
        assert_eq!(config.rates_interval, Duration::from_secs(5));
        assert_eq!(config.sign_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_rejects_malformed_values() {
        assert!(Config::from_lookup(lookup(&[("POLKAPAY_API_URL", "not a url")])).is_err());
        assert!(Config::from_lookup(lookup(&[("POLKAPAY_RATES_INTERVAL_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("POLKAPAY_RATES_INTERVAL_SECS", "0")])).is_err());
    }
}
