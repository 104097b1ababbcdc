//! Transaction limits, social verification and display formatting.
//!
//! The backend does not expose limits or social verification yet, so the values
//! here are fixed. Amounts are in DOT.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy, dec};

use crate::api::types::OrderType;

/// DOT/BRL rate used when live rates are unavailable.
pub const MOCK_DOT_TO_BRL: Decimal = dec!(5.33);

/// Verification tier of a user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    derive_more::IsVariant,
)]
pub enum VerificationLevel {
    #[display("basic")]
    Basic,
    #[display("enhanced")]
    Enhanced,
    #[display("premium")]
    Premium,
}

/// Per-user trading limits, in DOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLimits {
    pub buy_limit: Decimal,
    pub sell_limit: Decimal,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
    pub verified: bool,
    pub verification_level: VerificationLevel,
}

impl UserLimits {
    /// The limits shown until the backend provides real ones.
    pub const fn mock() -> Self {
        Self {
            buy_limit: dec!(100),
            sell_limit: dec!(500),
            daily_limit: dec!(1000),
            monthly_limit: dec!(10000),
            verified: true,
            verification_level: VerificationLevel::Enhanced,
        }
    }

    /// Single-order limit for `order_type`.
    pub fn limit_for(&self, order_type: OrderType) -> Decimal {
        match order_type {
            OrderType::Buy => self.buy_limit,
            OrderType::Sell => self.sell_limit,
        }
    }
}

/// Social network a user can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SocialPlatform {
    #[display("twitter")]
    Twitter,
    #[display("discord")]
    Discord,
    #[display("telegram")]
    Telegram,
    #[display("github")]
    Github,
}

/// Verification status of one social account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialVerification {
    pub platform: SocialPlatform,
    pub verified: bool,
    pub username: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// The verification list shown until the backend provides a real one.
///
/// Verification dates are relative to `now`.
pub fn mock_social_verifications(now: DateTime<Utc>) -> Vec<SocialVerification> {
    vec![
        SocialVerification {
            platform: SocialPlatform::Twitter,
            verified: true,
            username: Some("@p2puser".into()),
            verified_at: Some(now - Duration::days(7)),
        },
        SocialVerification {
            platform: SocialPlatform::Discord,
            verified: true,
            username: Some("p2puser#1234".into()),
            verified_at: Some(now - Duration::days(5)),
        },
        SocialVerification {
            platform: SocialPlatform::Telegram,
            verified: false,
            username: Some("@p2puser".into()),
            verified_at: None,
        },
        SocialVerification {
            platform: SocialPlatform::Github,
            verified: false,
            username: None,
            verified_at: None,
        },
    ]
}

/// Percentage of verified accounts, from 0 to 100. Empty lists are 0.
pub fn verification_progress(verifications: &[SocialVerification]) -> Decimal {
    if verifications.is_empty() {
        return Decimal::ZERO;
    }
    let verified = verifications.iter().filter(|v| v.verified).count();
    Decimal::from(verified) * dec!(100) / Decimal::from(verifications.len())
}

/// Currencies amounts are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Dot,
    Brl,
    Usd,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dot => "DOT",
            Self::Brl => "BRL",
            Self::Usd => "USD",
        })
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOT" => Ok(Self::Dot),
            "BRL" => Ok(Self::Brl),
            "USD" => Ok(Self::Usd),
            other => Err(format!("unsupported currency {other:?}")),
        }
    }
}

/// Formats `amount` with two decimals and the currency's symbol.
///
/// ```
/// use polkapay::{dec, limits::{Currency, format_currency}};
///
/// assert_eq!(format_currency(dec!(36.2), Currency::Brl), "R$ 36.20");
/// assert_eq!(format_currency(dec!(7.105), Currency::Usd), "$7.11");
/// assert_eq!(format_currency(dec!(2), Currency::Dot), "2.00 DOT");
/// ```
pub fn format_currency(amount: Decimal, currency: Currency) -> String {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    match currency {
        Currency::Brl => format!("R$ {amount:.2}"),
        Currency::Usd => format!("${amount:.2}"),
        Currency::Dot => format!("{amount:.2} DOT"),
    }
}

/// Formats how long ago `then` was: `Just now`, `{h}h ago` or `{d}d ago`.
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - then).num_hours();
    if hours < 1 {
        "Just now".to_owned()
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{}d ago", hours / 24)
    }
}
