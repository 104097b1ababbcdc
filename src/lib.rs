//! # polkapay
//!
//! A Rust client SDK for the PolkaPay peer-to-peer exchange, where users trade
//! DOT for Brazilian Real settled over [PIX](https://www.bcb.gov.br/en/financialstability/pix_en).
//!
//! The exchange itself (matching, rates, settlement) runs behind an HTTP API.
//! This crate is everything a client needs on its side of that API:
//!
//! - **Remote API**: a typed client for every backend endpoint
//! - **Wallets**: injected wallet extensions, account discovery and raw signing
//! - **Session**: who is connected, which account is selected, persisted flags
//! - **Hooks**: `{data, loading, error}` handles over the API, including a rates poller
//!
//! ## Quick Navigation
//!
//! | Module | Description | Common Use Cases |
//! |--------|-------------|------------------|
//! | [`api`] | HTTP API client | Rates, orders, LP operations, wallet login |
//! | [`api::types`] | Request and response types | Orders, rates, LP profile |
//! | [`wallet`] | Wallet extensions | Detect providers, list accounts, sign |
//! | [`session`] | Connection lifecycle | Connect, select account, sign, authenticate |
//! | [`hooks`] | Stateful data handles | Poll rates, list orders, create orders |
//! | [`storage`] | Persisted session flags | Reload a previous connection |
//! | [`limits`] | Transaction limits | Limits and social verification progress |
//! | [`config`] | Environment configuration | API URL, poll interval, timeouts |
//!
//! ## Your First Query
//!
//! ```no_run
//! use polkapay::api;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = api::local();
//!     let rates = client.exchange_rates().await?;
//!
//!     println!("1 DOT = R$ {}", rates.dot_to_brl);
//!     Ok(())
//! }
//! ```
//!
//! ## Connecting a Wallet
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use polkapay::{
//!     session::Session,
//!     storage::MemoryStorage,
//!     wallet::{InjectedRegistry, Keypair, LocalExtension, WalletAdapter},
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let seed = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";
//! let key: Keypair = seed.parse()?;
//! let mut registry = InjectedRegistry::default();
//! registry.inject(LocalExtension::new("polkadot-js").with_key(key, Some("alice")));
//!
//! let session = Session::open(
//!     Arc::new(WalletAdapter::new(registry)),
//!     Arc::new(MemoryStorage::default()),
//!     "PolkaPay",
//! );
//!
//! if session.connect().await {
//!     println!("connected as {}", session.formatted_address(6));
//! } else {
//!     println!("failed: {:?}", session.state().error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Polling Exchange Rates
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use polkapay::{api, hooks};
//!
//! # async fn example() {
//! let rates = hooks::exchange_rates(api::local(), Duration::from_secs(30));
//! let mut updates = rates.subscribe();
//!
//! while updates.changed().await.is_ok() {
//!     if let Some(rates) = &updates.borrow().data {
//!         println!("DOT/BRL {}", rates.dot_to_brl);
//!     }
//! }
//! // dropping `rates` stops the poller
//! # }
//! ```
//!
//! ## Architecture Decisions
//!
//! ### Explicit session object
//!
//! The connection state is a [`session::Session`] value that callers construct and
//! pass around. There is no process-wide singleton; dropping the session is the
//! teardown.
//!
//! ### Cancellation scopes
//!
//! Every hook owns a [`CancellationToken`]. Dropping the hook cancels the scope,
//! stops its poller and discards results of requests still in flight. Signing takes
//! a caller-supplied token and an optional timeout, because the user may leave the
//! extension prompt open forever.
//!
//! ### High-Precision Decimals
//!
//! All amounts and rates use [`rust_decimal::Decimal`].

pub mod api;
pub mod config;
pub mod hooks;
pub mod limits;
pub mod session;
pub mod storage;
pub mod wallet;

/// Re-exported decimal type from rust_decimal.
///
/// Used for DOT, BRL and USD amounts and exchange rates.
pub use rust_decimal::{Decimal, dec};
/// Re-exported cancellation token used by hooks and signing.
pub use tokio_util::sync::CancellationToken;
