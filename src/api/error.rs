//! Error type shared by the API client, wallet adapter, session and hooks.

use reqwest::StatusCode;
use serde::Deserialize;

/// Message used when an error response carries no readable body.
pub const GENERIC_ERROR: &str = "An error occurred";

/// Errors produced by this crate.
///
/// The `Display` output of every variant is meant to be shown to a user as-is.
/// In particular, [`Error::Api`] displays exactly the server's `detail` message.
#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
pub enum Error {
    /// The backend answered with a non-2xx status.
    #[display("{detail}")]
    Api {
        /// HTTP status of the response.
        status: StatusCode,
        /// Message extracted from the response body.
        detail: String,
    },
    /// The request could not be sent or its response could not be decoded.
    #[display("{_0}")]
    Http(reqwest::Error),
    /// An endpoint URL could not be built.
    #[display("invalid endpoint: {_0}")]
    Url(url::ParseError),
    /// The endpoint requires a bearer token and none is set.
    #[display("authentication required")]
    Unauthenticated,
    /// A signature was requested but no account is selected.
    #[display("No account selected")]
    NoAccountSelected,
    /// The account is not one of the session's known accounts.
    #[display("account {_0} is not one of the connected accounts")]
    UnknownAccount(String),
    /// No granted wallet extension owns the address.
    #[display("no connected wallet extension owns {_0}")]
    UnknownSigner(String),
    /// The extension cannot sign raw messages.
    #[display("wallet extension {_0} does not support raw signing")]
    SigningUnsupported(String),
    /// A wallet extension reported an error.
    #[display("{_0}")]
    Wallet(String),
    /// The signature prompt was not answered before the deadline.
    #[display("signature request timed out")]
    Timeout,
    /// The operation's cancellation scope was cancelled.
    #[display("operation cancelled")]
    Cancelled,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Url(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Url(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Builds an [`Error::Api`] from a failed response's status and raw body.
    ///
    /// The detail is chosen the same way for every endpoint:
    /// - a string `detail` field is used verbatim
    /// - any other non-null `detail` (validation errors are lists) is rendered as JSON
    /// - a JSON body without `detail` becomes `HTTP <status>`
    /// - a body that is not JSON becomes [`GENERIC_ERROR`]
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            detail: Option<serde_json::Value>,
        }

        let detail = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: Some(serde_json::Value::String(detail)),
            }) if !detail.is_empty() => detail,
            Ok(ErrorBody {
                detail: Some(detail),
            }) if !detail.is_null() && !detail.is_string() => detail.to_string(),
            Ok(_) => format!("HTTP {}", status.as_u16()),
            Err(_) => GENERIC_ERROR.to_owned(),
        };

        Self::Api { status, detail }
    }

    /// Returns the HTTP status for [`Error::Api`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}
