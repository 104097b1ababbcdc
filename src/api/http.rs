//! HTTP client for the PolkaPay backend.
//!
//! Every endpoint of the backend has one method on [`Client`]. Requests and
//! responses are JSON; a bearer token, when set, is attached to every request.
//! Endpoints that require authentication fail locally with
//! [`Error::Unauthenticated`] when no token is set, without touching the network.
//!
//! # Examples
//!
//! ## Query Exchange Rates
//!
//! ```no_run
//! use polkapay::api;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = api::local();
//! let rates = client.exchange_rates().await?;
//!
//! println!("1 DOT = US$ {} = R$ {}", rates.dot_to_usd, rates.dot_to_brl);
//! # Ok(())
//! # }
//! ```
//!
//! ## Create an Order
//!
//! ```no_run
//! use polkapay::{api::{self, types::CreateOrder}, dec};
//!
//! # async fn example(token: String) -> anyhow::Result<()> {
//! let client = api::local().with_token(token);
//! let order = client.create_order(&CreateOrder::buy(dec!(10))).await?;
//!
//! println!("order {} is {}", order.id, order.status);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    Error, Result,
    types::{
        AvailabilityUpdate, ConfirmPayment, CreateOrder, ExchangeRates, LiquidityProvider,
        LpEarnings, Order, OrderType, RegisterLp, TokenResponse, UserProfile, WalletAuthRequest,
    },
};
use crate::config::{self, Config};

/// HTTP client for the PolkaPay API.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Example
///
/// ```
/// use polkapay::api;
///
/// let client = api::local();
/// assert!(client.token().is_none());
/// ```
#[derive(Clone)]
pub struct Client {
    http_client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Client {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// The base URL includes the API prefix, e.g. `http://localhost:8000/api/v1`.
    /// Requests time out after 10 seconds.
    pub fn new(base_url: Url) -> Self {
        Self::with_timeout(base_url, config::DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client from a [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self::with_timeout(config.api_url.clone(), config.request_timeout)
    }

    fn with_timeout(base_url: Url, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|err| {
                log::warn!("unable to configure HTTP client, using defaults: {err}");
                reqwest::Client::new()
            });

        Self {
            http_client,
            base_url,
            token: None,
        }
    }

    /// Sets a custom base URL for this client.
    ///
    /// # Example
    ///
    /// ```
    /// use polkapay::api;
    /// use url::Url;
    ///
    /// let url: Url = "https://api.polkapay.example/api/v1".parse().unwrap();
    /// let client = api::local().with_url(url);
    /// ```
    pub fn with_url(self, base_url: Url) -> Self {
        Self { base_url, ..self }
    }

    /// Returns a client that sends `token` as a bearer token.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self
        }
    }

    /// Replaces or clears the bearer token.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Returns the bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges a signed login message for a bearer token.
    ///
    /// `POST /auth/wallet`
    pub async fn login_with_wallet(&self, req: &WalletAuthRequest) -> Result<TokenResponse> {
        let url = self.endpoint("auth/wallet")?;
        self.send(self.request(Method::POST, url, false)?.json(req))
            .await
    }

    /// Returns the authenticated user.
    ///
    /// `GET /auth/me`
    pub async fn profile(&self) -> Result<UserProfile> {
        let url = self.endpoint("auth/me")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Fetches the current DOT exchange rates.
    ///
    /// `GET /orders/rates/exchange`
    pub async fn exchange_rates(&self) -> Result<ExchangeRates> {
        let url = self.endpoint("orders/rates/exchange")?;
        self.send(self.request(Method::GET, url, false)?).await
    }

    /// Creates an order.
    ///
    /// `POST /orders/`
    pub async fn create_order(&self, req: &CreateOrder) -> Result<Order> {
        let url = self.endpoint("orders/")?;
        self.send(self.request(Method::POST, url, false)?.json(req))
            .await
    }

    /// Lists open orders, optionally filtered by type.
    ///
    /// `GET /orders/?order_type=buy|sell`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use polkapay::api::{self, types::OrderType};
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let sells = api::local().active_orders(Some(OrderType::Sell)).await?;
    /// for order in sells {
    ///     println!("{order}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn active_orders(&self, order_type: Option<OrderType>) -> Result<Vec<Order>> {
        let mut url = self.endpoint("orders/")?;
        if let Some(order_type) = order_type {
            url.query_pairs_mut()
                .append_pair("order_type", &order_type.to_string());
        }
        self.send(self.request(Method::GET, url, false)?).await
    }

    /// Lists the authenticated user's orders.
    ///
    /// `GET /orders/my-orders`
    pub async fn my_orders(&self) -> Result<Vec<Order>> {
        let url = self.endpoint("orders/my-orders")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Fetches a single order.
    ///
    /// `GET /orders/{id}`
    pub async fn order(&self, id: u64) -> Result<Order> {
        let url = self.endpoint(&format!("orders/{id}"))?;
        self.send(self.request(Method::GET, url, false)?).await
    }

    /// Accepts an order as a liquidity provider.
    ///
    /// `POST /orders/{id}/accept`
    pub async fn accept_order(&self, id: u64) -> Result<Order> {
        let url = self.endpoint(&format!("orders/{id}/accept"))?;
        self.send(self.request(Method::POST, url, true)?).await
    }

    /// Reports the PIX payment of an order as sent.
    ///
    /// `POST /orders/{id}/confirm-payment`
    pub async fn confirm_payment(&self, id: u64, req: &ConfirmPayment) -> Result<Order> {
        let url = self.endpoint(&format!("orders/{id}/confirm-payment"))?;
        self.send(self.request(Method::POST, url, false)?.json(req))
            .await
    }

    /// Marks an order as completed.
    ///
    /// `POST /orders/{id}/complete`
    pub async fn complete_order(&self, id: u64) -> Result<Order> {
        let url = self.endpoint(&format!("orders/{id}/complete"))?;
        self.send(self.request(Method::POST, url, true)?).await
    }

    /// Registers the authenticated user as a liquidity provider.
    ///
    /// `POST /lp/register`
    pub async fn register_lp(&self, req: &RegisterLp) -> Result<LiquidityProvider> {
        let url = self.endpoint("lp/register")?;
        self.send(self.request(Method::POST, url, true)?.json(req))
            .await
    }

    /// Returns the authenticated user's liquidity provider profile.
    ///
    /// `GET /lp/profile`
    pub async fn lp_profile(&self) -> Result<LiquidityProvider> {
        let url = self.endpoint("lp/profile")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Lists orders a liquidity provider can accept.
    ///
    /// `GET /lp/available-orders`
    pub async fn lp_available_orders(&self) -> Result<Vec<Order>> {
        let url = self.endpoint("lp/available-orders")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Lists orders handled by the authenticated liquidity provider.
    ///
    /// `GET /lp/my-orders`
    pub async fn lp_orders(&self) -> Result<Vec<Order>> {
        let url = self.endpoint("lp/my-orders")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Toggles whether the liquidity provider receives new orders.
    ///
    /// `PUT /lp/availability?is_available=true|false`
    pub async fn set_lp_availability(&self, is_available: bool) -> Result<AvailabilityUpdate> {
        let mut url = self.endpoint("lp/availability")?;
        url.query_pairs_mut()
            .append_pair("is_available", if is_available { "true" } else { "false" });
        self.send(self.request(Method::PUT, url, true)?).await
    }

    /// Returns aggregate liquidity provider statistics.
    ///
    /// `GET /lp/earnings`
    pub async fn lp_earnings(&self) -> Result<LpEarnings> {
        let url = self.endpoint("lp/earnings")?;
        self.send(self.request(Method::GET, url, true)?).await
    }

    /// Resolves `path` against the base URL, keeping the base path as a prefix.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, url: Url, auth: bool) -> Result<RequestBuilder> {
        log::debug!("{method} {url}");

        let req = self.http_client.request(method, url);
        match (&self.token, auth) {
            (Some(token), _) => Ok(req.bearer_auth(token)),
            (None, false) => Ok(req),
            (None, true) => Err(Error::Unauthenticated),
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.bytes().await?;
            let err = Error::from_response(status, &body);
            log::debug!("request failed with {status}: {err}");
            return Err(err);
        }

        Ok(res.json().await?)
    }
}
