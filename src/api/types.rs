//! Request and response types of the PolkaPay backend.
//!
//! # Core Components
//!
//! ## Orders
//! - [`OrderType`]: buy DOT (pay BRL) or sell DOT (receive BRL)
//! - [`OrderStatus`]: order lifecycle states
//! - [`Order`]: an order as returned by the backend
//! - [`CreateOrder`]: order creation parameters
//! - [`ConfirmPayment`]: PIX payment confirmation
//! - [`ExchangeRates`]: current DOT rates
//!
//! ## Liquidity Providers
//! - [`RegisterLp`]: registration parameters
//! - [`LiquidityProvider`]: LP profile
//! - [`LpEarnings`]: aggregate LP statistics
//! - [`AvailabilityUpdate`]: availability toggle acknowledgement
//!
//! ## Authentication
//! - [`WalletAuthRequest`]: signed login message
//! - [`TokenResponse`]: bearer token
//! - [`UserProfile`]: authenticated user
//!
//! Amounts use [`Decimal`]. The backend speaks JSON floats; request bodies serialize
//! amounts as numbers, responses accept numbers or numeric strings.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::utils;

/// Direction of an order, from the user's point of view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Buy DOT, paying BRL over PIX.
    #[display("buy")]
    Buy,
    /// Sell DOT, receiving BRL over PIX.
    #[display("sell")]
    Sell,
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(format!("unknown order type {other:?}, expected buy or sell")),
        }
    }
}

/// Order lifecycle state.
///
/// ```text
/// pending → accepted → payment_sent → completed
///     ↘          ↘            ↘
///   cancelled  disputed     disputed
/// ```
///
/// The client never drives these transitions itself; it asks the backend to and
/// re-fetches the order. Statuses this client does not know deserialize to
/// [`OrderStatus::Unknown`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for a liquidity provider.
    #[display("pending")]
    Pending,
    /// A liquidity provider accepted the order.
    #[display("accepted")]
    Accepted,
    /// The PIX payment was reported as sent.
    #[display("payment_sent")]
    PaymentSent,
    /// Settled.
    #[display("completed")]
    Completed,
    /// Under dispute.
    #[display("disputed")]
    Disputed,
    /// Cancelled or expired.
    #[display("cancelled")]
    Cancelled,
    /// A status this client does not recognize.
    #[serde(other)]
    #[display("unknown")]
    Unknown,
}

impl OrderStatus {
    /// Returns `true` once the order can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// An order as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Backend order id.
    pub id: u64,
    /// Buy or sell.
    pub order_type: OrderType,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Amount in DOT.
    pub dot_amount: Decimal,
    /// Amount in BRL at the order's rate.
    pub brl_amount: Decimal,
    /// Amount in USD at creation time.
    pub usd_amount: Decimal,
    /// DOT/BRL rate locked for this order.
    pub exchange_rate_dot_brl: Decimal,
    /// Fee paid to the liquidity provider.
    pub lp_fee_amount: Decimal,
    /// Owner of the order.
    pub user_id: u64,
    /// Liquidity provider handling the order, once accepted.
    #[serde(default)]
    pub lp_id: Option<u64>,
    /// PIX key receiving BRL (sell orders).
    #[serde(default)]
    pub pix_key: Option<String>,
    /// PIX copy-and-paste / QR payload (buy orders).
    #[serde(default)]
    pub pix_qr_code: Option<String>,
    /// PIX transaction id, once paid.
    #[serde(default)]
    pub pix_txid: Option<String>,
    /// On-chain escrow order id.
    #[serde(default, alias = "blockchain_order_id")]
    pub contract_order_id: Option<u64>,
    /// On-chain transaction hash.
    #[serde(default)]
    pub blockchain_tx_hash: Option<String>,
    /// Creation time.
    #[serde(deserialize_with = "utils::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Expiry time, if the order expires.
    #[serde(default, deserialize_with = "utils::deserialize_opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns `true` if the order is waiting for a liquidity provider.
    pub fn is_open(&self) -> bool {
        self.status.is_pending()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} DOT (R$ {}) [{}]",
            self.id,
            self.order_type,
            self.dot_amount,
            self.brl_amount.round_dp(2),
            self.status
        )
    }
}

/// Current DOT exchange rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// USD per DOT.
    pub dot_to_usd: Decimal,
    /// BRL per DOT.
    pub dot_to_brl: Decimal,
}

impl ExchangeRates {
    /// Converts a DOT amount to BRL.
    pub fn to_brl(&self, dot: Decimal) -> Decimal {
        dot * self.dot_to_brl
    }

    /// Converts a DOT amount to USD.
    pub fn to_usd(&self, dot: Decimal) -> Decimal {
        dot * self.dot_to_usd
    }

    /// Converts a BRL amount to DOT, or `None` when the rate is zero.
    pub fn brl_to_dot(&self, brl: Decimal) -> Option<Decimal> {
        brl.checked_div(self.dot_to_brl)
    }
}

/// Order creation parameters.
///
/// # Example
///
/// ```
/// use polkapay::{api::types::CreateOrder, dec};
///
/// let buy = CreateOrder::buy(dec!(10));
/// let sell = CreateOrder::sell(dec!(2.5), "user@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    /// Buy or sell.
    pub order_type: OrderType,
    /// Amount of DOT, strictly positive.
    #[serde(with = "rust_decimal::serde::float")]
    pub dot_amount: Decimal,
    /// PIX key that receives BRL. Required for sell orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_key: Option<String>,
}

impl CreateOrder {
    /// A buy order for `dot_amount` DOT.
    pub fn buy(dot_amount: Decimal) -> Self {
        Self {
            order_type: OrderType::Buy,
            dot_amount,
            pix_key: None,
        }
    }

    /// A sell order paying BRL out to `pix_key`.
    pub fn sell(dot_amount: Decimal, pix_key: impl Into<String>) -> Self {
        Self {
            order_type: OrderType::Sell,
            dot_amount,
            pix_key: Some(pix_key.into()),
        }
    }
}

/// Body of `POST /orders/{id}/confirm-payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    /// PIX end-to-end transaction id.
    pub pix_txid: String,
    /// Optional proof (receipt URL or payload).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<String>,
}

/// Kind of PIX key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum PixKeyType {
    /// Brazilian individual taxpayer id.
    #[display("cpf")]
    Cpf,
    /// E-mail address.
    #[display("email")]
    Email,
    /// Phone number.
    #[display("phone")]
    Phone,
    /// Random key issued by the bank.
    #[display("random")]
    Random,
}

impl FromStr for PixKeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpf" => Ok(Self::Cpf),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "random" => Ok(Self::Random),
            other => Err(format!(
                "unknown PIX key type {other:?}, expected cpf, email, phone or random"
            )),
        }
    }
}

/// Body of `POST /lp/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLp {
    /// PIX key the provider pays from and receives to.
    pub pix_key: String,
    /// Kind of PIX key.
    pub pix_key_type: PixKeyType,
}

/// Liquidity provider profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProvider {
    pub id: u64,
    pub pix_key: String,
    pub pix_key_type: String,
    pub total_orders_processed: u64,
    pub total_volume_usd: Decimal,
    pub total_earnings_usd: Decimal,
    pub rating: f64,
    pub is_active: bool,
    pub is_available: bool,
    #[serde(deserialize_with = "utils::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Aggregate liquidity provider statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpEarnings {
    pub total_orders: u64,
    pub total_volume_usd: Decimal,
    pub total_earnings_usd: Decimal,
    pub rating: f64,
}

/// Response of `PUT /lp/availability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    #[serde(default)]
    pub message: String,
    pub is_available: bool,
}

/// Body of `POST /auth/wallet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAuthRequest {
    /// Address that signed `message`.
    pub wallet_address: String,
    /// The signed message, as text.
    pub message: String,
    /// Signature returned by the wallet extension.
    pub signature: String,
}

/// Bearer token returned by `POST /auth/wallet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Authenticated user, as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub wallet_address: String,
    /// Maximum USD value of a single buy order.
    pub buy_limit_usd: Decimal,
    pub buy_orders_per_day: u32,
    /// Maximum USD value of a single sell order.
    pub sell_limit_usd: Decimal,
    pub sell_orders_per_day: u32,
    pub total_orders: u64,
    pub successful_orders: u64,
    pub rating: f64,
    pub is_verified: bool,
    #[serde(deserialize_with = "utils::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}
