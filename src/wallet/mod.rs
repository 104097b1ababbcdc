//! Wallet extensions: detection, access, accounts and raw signing.
//!
//! A wallet extension is anything implementing [`Extension`]. Extensions are
//! injected by name into an [`InjectedRegistry`], the analogue of the well-known
//! injection point browser extensions write themselves into. A [`WalletAdapter`]
//! sits on top of the registry and provides the operations a session needs.
//!
//! # Examples
//!
//! ## Detect Installed Wallets
//!
//! ```
//! use polkapay::wallet::{InjectedRegistry, LocalExtension, WalletAdapter};
//!
//! let mut registry = InjectedRegistry::default();
//! registry.inject(LocalExtension::new("talisman"));
//!
//! let adapter = WalletAdapter::new(registry);
//! for wallet in adapter.detect_providers() {
//!     println!("{} {}: {}", wallet.info.icon, wallet.info.display_name, wallet.installed);
//! }
//! ```
//!
//! ## Sign With a Deadline
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use polkapay::{CancellationToken, wallet::WalletAdapter};
//!
//! # async fn example(adapter: WalletAdapter, address: &str) -> anyhow::Result<()> {
//! let cancel = CancellationToken::new();
//! let signature = adapter
//!     .request_signature_with(address, "hello", &cancel, Some(Duration::from_secs(60)))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod local;
pub mod sr25519;
#[cfg(test)]
pub(crate) mod stub;

use std::{fmt, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub use local::LocalExtension;
pub use sr25519::{Keypair, verify_signature};

use crate::api::{Error, Result};

/// Icon shown for wallets that are not in [`SUPPORTED_WALLETS`].
pub const FALLBACK_ICON: &str = "💼";

/// Static description of a supported wallet extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletInfo {
    /// Name the extension injects itself under.
    pub name: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Icon shown next to the name.
    pub icon: &'static str,
}

/// Wallet extensions PolkaPay knows how to talk to, in display order.
pub const SUPPORTED_WALLETS: [WalletInfo; 3] = [
    WalletInfo {
        name: "subwallet-js",
        display_name: "SubWallet",
        icon: "🌊",
    },
    WalletInfo {
        name: "polkadot-js",
        display_name: "Polkadot.js",
        icon: "⚙️",
    },
    WalletInfo {
        name: "talisman",
        display_name: "Talisman",
        icon: "✨",
    },
];

/// A supported wallet and whether it is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledWallet {
    pub info: WalletInfo,
    pub installed: bool,
}

/// An account exposed by an extension, tagged with the extension's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    /// SS58 address.
    pub address: String,
    /// Name the user gave the account in the extension.
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the extension that owns the account.
    pub source: String,
}

impl Account {
    /// Returns the account name, or the shortened address when it has none.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format_address(&self.address, 8),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// An account as an extension reports it, before it is tagged with a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAccount {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// What [`SignRawPayload::data`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawKind {
    /// Arbitrary bytes. Extensions wrap these before signing.
    Bytes,
    /// An encoded extrinsic payload.
    Payload,
}

/// Request passed to [`Extension::sign_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRawPayload {
    /// Address that should sign.
    pub address: String,
    /// `0x`-prefixed hex of the bytes to sign.
    pub data: String,
    #[serde(rename = "type")]
    pub kind: RawKind,
}

impl SignRawPayload {
    /// A `bytes` payload for an opaque message.
    pub fn bytes(address: impl Into<String>, message: impl AsRef<[u8]>) -> Self {
        Self {
            address: address.into(),
            data: const_hex::encode_prefixed(message),
            kind: RawKind::Bytes,
        }
    }
}

/// A wallet extension.
///
/// Methods return boxed futures so extensions can be stored as trait objects.
/// Every call may wait on the user for an unbounded time.
pub trait Extension: Send + Sync {
    /// Name the extension injects itself under, e.g. `polkadot-js`.
    fn name(&self) -> &str;

    /// Asks the user to authorize `app_name`. An error means access was denied.
    fn enable<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Lists the accounts the user shares with the application.
    fn accounts(&self) -> BoxFuture<'_, Result<Vec<InjectedAccount>>>;

    /// Signs a raw payload, returning the signature as hex.
    fn sign_raw(&self, payload: SignRawPayload) -> BoxFuture<'_, Result<String>>;

    /// Whether [`Extension::sign_raw`] is available.
    fn supports_sign_raw(&self) -> bool {
        true
    }
}

/// Extensions injected into the process, keyed by name, in injection order.
#[derive(Default, Clone)]
pub struct InjectedRegistry {
    extensions: Vec<Arc<dyn Extension>>,
}

impl fmt::Debug for InjectedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.name()))
            .finish()
    }
}

impl InjectedRegistry {
    /// Injects an extension, replacing any previous one with the same name.
    pub fn inject(&mut self, extension: impl Extension + 'static) {
        self.inject_arc(Arc::new(extension));
    }

    /// Injects a shared extension, replacing any previous one with the same name.
    pub fn inject_arc(&mut self, extension: Arc<dyn Extension>) {
        match self
            .extensions
            .iter_mut()
            .find(|ext| ext.name() == extension.name())
        {
            Some(slot) => *slot = extension,
            None => self.extensions.push(extension),
        }
    }

    /// Returns the extension injected under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions
            .iter()
            .find(|ext| ext.name() == name)
            .cloned()
    }

    /// Whether an extension is injected under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.extensions.iter()
    }
}

/// Operations over the injected extensions.
///
/// Access must be requested with [`WalletAdapter::request_access`] before accounts
/// can be listed or messages signed; only extensions that granted access are used.
pub struct WalletAdapter {
    registry: InjectedRegistry,
    granted: RwLock<Vec<Arc<dyn Extension>>>,
}

impl fmt::Debug for WalletAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletAdapter")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl WalletAdapter {
    pub fn new(registry: InjectedRegistry) -> Self {
        Self {
            registry,
            granted: RwLock::new(Vec::new()),
        }
    }

    /// Returns the injected extensions.
    pub fn registry(&self) -> &InjectedRegistry {
        &self.registry
    }

    /// Reports, for each of [`SUPPORTED_WALLETS`], whether it is injected.
    pub fn detect_providers(&self) -> Vec<InstalledWallet> {
        SUPPORTED_WALLETS
            .iter()
            .map(|info| InstalledWallet {
                info: *info,
                installed: self.registry.contains(info.name),
            })
            .collect()
    }

    /// Asks every injected extension to authorize `app_name`.
    ///
    /// Returns whether at least one extension granted access. Errors are logged and
    /// never returned.
    pub async fn request_access(&self, app_name: &str) -> bool {
        let mut granted = Vec::with_capacity(self.registry.len());
        for ext in self.registry.iter() {
            match ext.enable(app_name).await {
                Ok(()) => granted.push(Arc::clone(ext)),
                Err(err) => log::warn!("wallet extension {} denied access: {err}", ext.name()),
            }
        }

        let any = !granted.is_empty();
        *self.granted.write().await = granted;
        any
    }

    /// Forgets which extensions granted access.
    pub async fn revoke_access(&self) {
        self.granted.write().await.clear();
    }

    /// Lists the accounts of every extension that granted access.
    ///
    /// An extension that fails to list its accounts is logged and skipped.
    pub async fn list_accounts(&self) -> Vec<Account> {
        let granted = self.granted.read().await.clone();

        let mut accounts = Vec::new();
        for ext in granted {
            match ext.accounts().await {
                Ok(list) => accounts.extend(list.into_iter().map(|account| Account {
                    address: account.address,
                    name: account.name,
                    source: ext.name().to_owned(),
                })),
                Err(err) => log::warn!("unable to list accounts of {}: {err}", ext.name()),
            }
        }
        accounts
    }

    /// Asks the extension owning `address` to sign `message` as raw bytes.
    ///
    /// Waits for the user without a deadline. See
    /// [`request_signature_with`](Self::request_signature_with) for a bounded wait.
    pub async fn request_signature(&self, address: &str, message: &str) -> Result<String> {
        let ext = self.owner(address).await?;
        if !ext.supports_sign_raw() {
            return Err(Error::SigningUnsupported(ext.name().to_owned()));
        }

        log::debug!("requesting signature from {} for {address}", ext.name());
        ext.sign_raw(SignRawPayload::bytes(address, message)).await
    }

    /// Same as [`request_signature`](Self::request_signature), but gives up with
    /// [`Error::Cancelled`] when `cancel` fires or [`Error::Timeout`] once `timeout`
    /// elapses.
    pub async fn request_signature_with(
        &self,
        address: &str,
        message: &str,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = deadline => Err(Error::Timeout),
            res = self.request_signature(address, message) => res,
        }
    }

    async fn owner(&self, address: &str) -> Result<Arc<dyn Extension>> {
        let granted = self.granted.read().await.clone();
        for ext in granted {
            match ext.accounts().await {
                Ok(accounts) if accounts.iter().any(|account| account.address == address) => {
                    return Ok(ext);
                }
                Ok(_) => {}
                Err(err) => log::debug!("skipping {} while looking up signer: {err}", ext.name()),
            }
        }
        Err(Error::UnknownSigner(address.to_owned()))
    }
}

/// Shortens an address to its first and last `visible` characters.
///
/// Addresses shorter than `2 * visible` are returned unchanged.
///
/// # Example
///
/// ```
/// use polkapay::wallet::format_address;
///
/// let address = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
/// assert_eq!(format_address(address, 6), "5Grwva...GKutQY");
/// assert_eq!(format_address("5Grw", 6), "5Grw");
/// ```
pub fn format_address(address: &str, visible: usize) -> String {
    let len = address.chars().count();
    if len < visible * 2 {
        return address.to_owned();
    }

    let head: String = address.chars().take(visible).collect();
    let tail: String = address.chars().skip(len - visible).collect();
    format!("{head}...{tail}")
}

/// Checks that `address` is a 47 or 48 character SS58 address with a valid
/// checksum.
pub fn is_valid_address(address: &str) -> bool {
    (47..=48).contains(&address.chars().count()) && sr25519::ss58_decode(address).is_some()
}

fn lookup(source: &str, also_display_name: bool) -> Option<&'static WalletInfo> {
    let source = source.to_lowercase();
    SUPPORTED_WALLETS.iter().find(|wallet| {
        source.contains(&wallet.name.to_lowercase())
            || (also_display_name && source.contains(&wallet.display_name.to_lowercase()))
    })
}

/// Human-readable name for an account source, or the source itself if unknown.
pub fn wallet_display_name(source: &str) -> String {
    lookup(source, false)
        .map(|wallet| wallet.display_name.to_owned())
        .unwrap_or_else(|| source.to_owned())
}

/// Icon for an account source, or [`FALLBACK_ICON`] if unknown.
pub fn wallet_icon(source: &str) -> &'static str {
    lookup(source, true)
        .map(|wallet| wallet.icon)
        .unwrap_or(FALLBACK_ICON)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{stub::StubExtension, *};

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn adapter(extensions: Vec<StubExtension>) -> WalletAdapter {
        let mut registry = InjectedRegistry::default();
        for ext in extensions {
            registry.inject(ext);
        }
        WalletAdapter::new(registry)
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(ALICE, 6), "5Grwva...GKutQY");
        assert_eq!(format_address(ALICE, 8), "5GrwvaEF...oHGKutQY");
        assert_eq!(format_address("abcdef", 3), "abc...def");
        assert_eq!(format_address("abcde", 3), "abcde");
        assert_eq!(format_address("", 4), "");
    }

    #[test]
    fn test_is_valid_address() {
        assert!(is_valid_address(ALICE));
        assert!(is_valid_address(BOB));
        assert!(!is_valid_address("5Grwva"));
        assert!(!is_valid_address(&format!("{ALICE}xx")));
        assert!(!is_valid_address("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQZ"));
        assert!(!is_valid_address("0xcD49bbAc6E85fdEB167EB7cA41A945d2b8758F6F"));
    }

    #[test]
    fn test_wallet_lookups() {
        assert_eq!(wallet_display_name("polkadot-js"), "Polkadot.js");
        assert_eq!(wallet_display_name("SubWallet-JS"), "SubWallet");
        assert_eq!(wallet_display_name("nova"), "nova");

        assert_eq!(wallet_icon("talisman"), "✨");
        assert_eq!(wallet_icon("My Talisman"), "✨");
        assert_eq!(wallet_icon("nova"), FALLBACK_ICON);
    }

    #[test]
    fn test_sign_raw_payload() {
        let payload = SignRawPayload::bytes(ALICE, "hi");
        assert_eq!(payload.data, "0x6869");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "bytes");
        assert_eq!(json["address"], ALICE);
    }

    #[test]
    fn test_detect_providers_without_extensions() {
        let adapter = adapter(vec![]);
        let wallets = adapter.detect_providers();
        assert_eq!(wallets.len(), SUPPORTED_WALLETS.len());
        assert!(wallets.iter().all(|wallet| !wallet.installed));
    }

    #[test]
    fn test_detect_providers_marks_injected() {
        let adapter = adapter(vec![
            StubExtension::new("talisman"),
            StubExtension::new("nova"),
        ]);
        let wallets = adapter.detect_providers();
        let installed: Vec<_> = wallets
            .iter()
            .filter(|wallet| wallet.installed)
            .map(|wallet| wallet.info.name)
            .collect();
        assert_eq!(installed, vec!["talisman"]);
    }

    #[test]
    fn test_inject_replaces_same_name() {
        let mut registry = InjectedRegistry::default();
        registry.inject(StubExtension::new("talisman"));
        registry.inject(StubExtension::new("talisman").with_accounts(&[ALICE]));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_request_access() {
        assert!(!adapter(vec![]).request_access("PolkaPay").await);
        assert!(
            !adapter(vec![StubExtension::new("talisman").deny_access()])
                .request_access("PolkaPay")
                .await
        );

        let adapter = adapter(vec![
            StubExtension::new("talisman").deny_access(),
            StubExtension::new("polkadot-js").with_accounts(&[ALICE]),
        ]);
        assert!(adapter.request_access("PolkaPay").await);

        let accounts = adapter.list_accounts().await;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].source, "polkadot-js");
    }

    #[tokio::test]
    async fn test_list_accounts_requires_access() {
        let adapter = adapter(vec![StubExtension::new("talisman").with_accounts(&[ALICE])]);
        assert!(adapter.list_accounts().await.is_empty());

        adapter.request_access("PolkaPay").await;
        assert_eq!(adapter.list_accounts().await.len(), 1);

        adapter.revoke_access().await;
        assert!(adapter.list_accounts().await.is_empty());
    }

    #[tokio::test]
    async fn test_request_signature_routes_to_owner() {
        let adapter = adapter(vec![
            StubExtension::new("talisman").with_accounts(&[ALICE]),
            StubExtension::new("subwallet-js").with_accounts(&[BOB]),
        ]);
        adapter.request_access("PolkaPay").await;

        let signature = adapter.request_signature(BOB, "hi").await.unwrap();
        assert_eq!(signature, "subwallet-js:0x6869");

        let err = adapter
            .request_signature("5Unknown", "hi")
            .await
            .unwrap_err();
        assert!(err.is_unknown_signer());
    }

    #[tokio::test]
    async fn test_request_signature_unsupported() {
        let adapter = adapter(vec![
            StubExtension::new("talisman")
                .with_accounts(&[ALICE])
                .without_sign_raw(),
        ]);
        adapter.request_access("PolkaPay").await;

        let err = adapter.request_signature(ALICE, "hi").await.unwrap_err();
        assert!(err.is_signing_unsupported());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_signature_timeout() {
        let adapter = adapter(vec![
            StubExtension::new("talisman")
                .with_accounts(&[ALICE])
                .hang_on_sign(),
        ]);
        adapter.request_access("PolkaPay").await;

        let cancel = CancellationToken::new();
        let err = adapter
            .request_signature_with(ALICE, "hi", &cancel, Some(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_request_signature_cancelled() {
        let adapter = adapter(vec![
            StubExtension::new("talisman")
                .with_accounts(&[ALICE])
                .hang_on_sign(),
        ]);
        adapter.request_access("PolkaPay").await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = adapter
            .request_signature_with(ALICE, "hi", &cancel, None)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
