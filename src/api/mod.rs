//! Remote API client.
//!
//! The PolkaPay backend is an HTTP API speaking JSON. This module provides the
//! [`Client`] with one method per endpoint, the request/response [`types`], and the
//! crate-wide [`Error`].
//!
//! # Examples
//!
//! ## Local Development Backend
//!
//! ```no_run
//! use polkapay::api;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = api::local();
//! let orders = client.active_orders(None).await?;
//! println!("{} open orders", orders.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configured From the Environment
//!
//! ```no_run
//! use polkapay::api;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // honours POLKAPAY_API_URL and POLKAPAY_REQUEST_TIMEOUT_SECS
//! let client = api::from_env()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod types;
mod utils;

pub use error::{Error, GENERIC_ERROR, Result};
pub use http::Client;

use crate::config::{self, Config};

/// Creates a client for a backend on `http://localhost:8000/api/v1`.
#[inline(always)]
pub fn local() -> Client {
    Client::new(config::default_api_url())
}

/// Creates a client from the `POLKAPAY_*` environment variables.
pub fn from_env() -> anyhow::Result<Client> {
    Ok(Client::from_config(&Config::from_env()?))
}
