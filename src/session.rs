//! Wallet session: connection status, accounts, selection and signing.
//!
//! A [`Session`] is an explicit object. Construct it once with the wallet adapter
//! and a [`Storage`], share it behind an `Arc`, and drop it to tear it down.
//!
//! ```text
//!              connect()              success
//! Disconnected ─────────▶ Connecting ─────────▶ Connected
//!      ▲                      │                     │
//!      └──────── failure ─────┘                     │
//!      └────────────────── disconnect() ────────────┘
//! ```
//!
//! Failures never escape [`Session::connect`]; they land in
//! [`SessionState::error`] as a message meant for the user.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use polkapay::{
//!     CancellationToken, api,
//!     session::Session,
//!     storage::MemoryStorage,
//!     wallet::{InjectedRegistry, WalletAdapter},
//! };
//!
//! # async fn example(registry: InjectedRegistry) -> anyhow::Result<()> {
//! let session = Session::open(
//!     Arc::new(WalletAdapter::new(registry)),
//!     Arc::new(MemoryStorage::default()),
//!     "PolkaPay",
//! );
//!
//! if !session.restore().await && !session.connect().await {
//!     anyhow::bail!("{}", session.state().error.unwrap_or_default());
//! }
//!
//! let token = session
//!     .authenticate(&api::local(), &CancellationToken::new())
//!     .await?;
//! println!("logged in, token type {}", token.token_type);
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    api::{
        self, Error, Result,
        types::{TokenResponse, WalletAuthRequest},
    },
    storage::{self, DisplayPreferences, Storage},
    wallet::{Account, InstalledWallet, WalletAdapter, format_address},
};

/// Shown when no extension granted access.
pub const NO_EXTENSION_ERROR: &str =
    "No Polkadot wallet extension found. Please install SubWallet, Polkadot.js, or Talisman.";
/// Shown when the granted extensions expose no accounts.
pub const NO_ACCOUNTS_ERROR: &str =
    "No accounts found. Please create an account in your wallet extension.";

/// Connection status of a [`Session`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display, derive_more::IsVariant,
)]
pub enum ConnectionStatus {
    #[default]
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
}

/// Snapshot of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: ConnectionStatus,
    /// Accounts exposed by the granted extensions.
    pub accounts: Vec<Account>,
    /// Selected account. Always one of `accounts`.
    pub selected: Option<Account>,
    /// Supported wallets and whether each is installed.
    pub installed_wallets: Vec<InstalledWallet>,
    /// Last failure, as a message for the user.
    pub error: Option<String>,
    /// Bearer token obtained by [`Session::authenticate`].
    pub access_token: Option<String>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

/// A wallet session.
pub struct Session {
    adapter: Arc<WalletAdapter>,
    storage: Arc<dyn Storage>,
    app_name: String,
    sign_timeout: Option<Duration>,
    state: watch::Sender<SessionState>,
    connecting: Mutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("app_name", &self.app_name)
            .field("status", &self.state.borrow().status)
            .finish_non_exhaustive()
    }
}

/// Leaves `Connecting` if a `connect` future is dropped midway.
struct ConnectingGuard<'a>(&'a watch::Sender<SessionState>);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if state.status.is_connecting() {
                state.status = ConnectionStatus::Disconnected;
                true
            } else {
                false
            }
        });
    }
}

impl Session {
    /// Creates a session and detects the installed wallets.
    pub fn open(
        adapter: Arc<WalletAdapter>,
        storage: Arc<dyn Storage>,
        app_name: impl Into<String>,
    ) -> Self {
        let state = SessionState {
            installed_wallets: adapter.detect_providers(),
            ..Default::default()
        };

        Self {
            adapter,
            storage,
            app_name: app_name.into(),
            sign_timeout: None,
            state: watch::Sender::new(state),
            connecting: Mutex::new(()),
        }
    }

    /// Gives up on signature prompts after `timeout`.
    pub fn with_sign_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sign_timeout = timeout;
        self
    }

    /// Returns the application name presented to extensions.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observes state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns the supported wallets and whether each is installed.
    pub fn installed_wallets(&self) -> Vec<InstalledWallet> {
        self.state.borrow().installed_wallets.clone()
    }

    /// Returns the selected account.
    pub fn selected(&self) -> Option<Account> {
        self.state.borrow().selected.clone()
    }

    /// Returns the access token obtained by [`Session::authenticate`].
    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    /// Whether a previous run left a connection to restore: the connected flag
    /// and a selected address are both saved.
    pub fn has_saved_connection(&self) -> bool {
        self.saved_address().is_some()
    }

    fn saved_address(&self) -> Option<String> {
        if self.storage.get(storage::WALLET_CONNECTED).as_deref() != Some("true") {
            return None;
        }
        self.storage
            .get(storage::SELECTED_ADDRESS)
            .filter(|address| !address.is_empty())
    }

    /// Connects to the injected wallets.
    ///
    /// Requests access, lists accounts and selects the first account unless the
    /// current selection is still available. Returns whether the session is
    /// connected; on failure the reason is in [`SessionState::error`].
    ///
    /// Concurrent calls run one after the other.
    pub async fn connect(&self) -> bool {
        self.connect_preferring(None).await
    }

    async fn connect_preferring(&self, preferred: Option<&str>) -> bool {
        let _serial = self.connecting.lock().await;

        self.state.send_modify(|state| {
            state.status = ConnectionStatus::Connecting;
            state.error = None;
        });
        let _guard = ConnectingGuard(&self.state);

        let accounts = match self.discover().await {
            Ok(accounts) => accounts,
            Err(message) => {
                log::warn!("wallet connection failed: {message}");
                self.state.send_modify(|state| {
                    state.status = ConnectionStatus::Disconnected;
                    state.accounts.clear();
                    state.selected = None;
                    state.access_token = None;
                    state.error = Some(message.to_owned());
                });
                return false;
            }
        };

        let current = self.selected();
        let selected = preferred
            .and_then(|address| accounts.iter().find(|a| a.address == address))
            .or_else(|| {
                let current = current.as_ref()?;
                accounts.iter().find(|a| a.address == current.address)
            })
            .or_else(|| accounts.first())
            .cloned();

        if let Some(account) = &selected {
            self.storage.set(storage::SELECTED_ADDRESS, &account.address);
        }
        self.storage.set(storage::WALLET_CONNECTED, "true");

        log::info!(
            "connected {} account(s), selected {}",
            accounts.len(),
            selected
                .as_ref()
                .map(|account| format_address(&account.address, 6))
                .unwrap_or_default()
        );

        self.state.send_modify(|state| {
            state.status = ConnectionStatus::Connected;
            state.accounts = accounts;
            state.selected = selected;
            state.error = None;
        });
        true
    }

    async fn discover(&self) -> std::result::Result<Vec<Account>, &'static str> {
        if !self.adapter.request_access(&self.app_name).await {
            return Err(NO_EXTENSION_ERROR);
        }

        let accounts = self.adapter.list_accounts().await;
        if accounts.is_empty() {
            return Err(NO_ACCOUNTS_ERROR);
        }
        Ok(accounts)
    }

    /// Reconnects if a previous run was connected, re-selecting the saved address
    /// when it is still available.
    ///
    /// Returns whether the session is connected afterwards. Without a saved
    /// connection and address this does nothing and returns `false`.
    pub async fn restore(&self) -> bool {
        let Some(saved) = self.saved_address() else {
            return false;
        };

        let connected = self.connect_preferring(Some(&saved)).await;
        if connected && self.selected().is_none_or(|account| account.address != saved) {
            log::debug!("saved account {saved} is no longer available");
        }
        connected
    }

    /// Disconnects, forgetting accounts, selection and token, and clears the
    /// persisted flags. Idempotent.
    pub fn disconnect(&self) {
        self.state.send_modify(|state| {
            state.status = ConnectionStatus::Disconnected;
            state.accounts.clear();
            state.selected = None;
            state.access_token = None;
            state.error = None;
        });

        self.storage.remove(storage::WALLET_CONNECTED);
        self.storage.remove(storage::SELECTED_ADDRESS);
        self.storage.remove(storage::USER_EMAIL);
    }

    /// Selects one of the connected accounts and persists the choice.
    pub fn select_account(&self, account: &Account) -> Result<()> {
        let known = self
            .state
            .borrow()
            .accounts
            .iter()
            .any(|a| a.address == account.address);
        if !known {
            return Err(Error::UnknownAccount(account.address.clone()));
        }

        self.storage.set(storage::SELECTED_ADDRESS, &account.address);
        self.state.send_modify(|state| {
            state.selected = Some(account.clone());
        });
        Ok(())
    }

    /// Asks the selected account to sign `message`.
    ///
    /// Gives up when `cancel` fires or the configured sign timeout elapses.
    /// Failures are also recorded in [`SessionState::error`].
    pub async fn sign(&self, message: &str, cancel: &CancellationToken) -> Result<String> {
        let Some(account) = self.selected() else {
            self.fail(&Error::NoAccountSelected);
            return Err(Error::NoAccountSelected);
        };

        self.adapter
            .request_signature_with(&account.address, message, cancel, self.sign_timeout)
            .await
            .inspect_err(|err| self.fail(err))
    }

    /// Signs a login message and exchanges it for a bearer token.
    ///
    /// The token is kept in [`SessionState::access_token`] until
    /// [`Session::disconnect`].
    pub async fn authenticate(
        &self,
        client: &api::Client,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse> {
        let account = self.selected().ok_or_else(|| {
            self.fail(&Error::NoAccountSelected);
            Error::NoAccountSelected
        })?;

        let message = login_message(&self.app_name);
        let signature = self.sign(&message, cancel).await?;

        let req = WalletAuthRequest {
            wallet_address: account.address,
            message,
            signature,
        };
        let token = client
            .login_with_wallet(&req)
            .await
            .inspect_err(|err| self.fail(err))?;

        self.state.send_modify(|state| {
            state.access_token = Some(token.access_token.clone());
            state.error = None;
        });
        Ok(token)
    }

    /// Returns the selected address shortened for display, or an empty string.
    pub fn formatted_address(&self, visible: usize) -> String {
        self.selected()
            .map(|account| format_address(&account.address, visible))
            .unwrap_or_default()
    }

    /// Loads the saved display preferences.
    pub fn preferences(&self) -> DisplayPreferences {
        DisplayPreferences::load(self.storage.as_ref())
    }

    /// Saves display preferences.
    pub fn save_preferences(&self, preferences: &DisplayPreferences) {
        preferences.save(self.storage.as_ref());
    }

    fn fail(&self, err: &Error) {
        let message = err.to_string();
        self.state.send_modify(|state| state.error = Some(message));
    }
}

fn login_message(app_name: &str) -> String {
    format!("Sign in to {app_name}: {}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::{
        storage::{MemoryStorage, SELECTED_ADDRESS, USER_EMAIL, WALLET_CONNECTED},
        wallet::{InjectedRegistry, stub::StubExtension},
    };

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn session_with(
        extensions: Vec<StubExtension>,
        storage: Arc<MemoryStorage>,
    ) -> Session {
        let mut registry = InjectedRegistry::default();
        for ext in extensions {
            registry.inject(ext);
        }
        Session::open(Arc::new(WalletAdapter::new(registry)), storage, "PolkaPay")
    }

    fn session(extensions: Vec<StubExtension>) -> (Session, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::default());
        (session_with(extensions, storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_connect_without_providers() {
        let (session, storage) = session(vec![]);
        assert!(session.installed_wallets().iter().all(|w| !w.installed));

        assert!(!session.connect().await);
        let state = session.state();
        assert!(state.status.is_disconnected());
        assert_eq!(state.error.as_deref(), Some(NO_EXTENSION_ERROR));
        assert!(storage.get(WALLET_CONNECTED).is_none());
    }

    #[tokio::test]
    async fn test_connect_without_accounts() {
        let (session, _) = session(vec![StubExtension::new("talisman")]);

        assert!(!session.connect().await);
        assert_eq!(session.state().error.as_deref(), Some(NO_ACCOUNTS_ERROR));
    }

    #[tokio::test]
    async fn test_failed_connect_drops_token() {
        let (session, _) = session(vec![StubExtension::new("talisman")]);
        session
            .state
            .send_modify(|state| state.access_token = Some("token-123".into()));

        assert!(!session.connect().await);
        let state = session.state();
        assert!(state.access_token.is_none());
        assert!(state.selected.is_none());
    }

    #[tokio::test]
    async fn test_connect_selects_first_account() {
        let (session, storage) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE, BOB])]);

        assert!(session.connect().await);
        let state = session.state();
        assert!(state.is_connected());
        assert_eq!(state.accounts.len(), 2);
        assert_eq!(state.selected.unwrap().address, ALICE);
        assert!(state.error.is_none());
        assert_eq!(storage.get(WALLET_CONNECTED).as_deref(), Some("true"));
        assert_eq!(storage.get(SELECTED_ADDRESS).as_deref(), Some(ALICE));
        assert_eq!(session.formatted_address(6), "5Grwva...GKutQY");
    }

    #[tokio::test]
    async fn test_reconnect_keeps_selection() {
        let (session, _) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE, BOB])]);
        assert!(session.connect().await);

        let bob = session.state().accounts[1].clone();
        session.select_account(&bob).unwrap();

        assert!(session.connect().await);
        assert_eq!(session.selected().unwrap().address, BOB);
    }

    #[tokio::test]
    async fn test_disconnect_clears_flags() {
        let (session, storage) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE])]);
        storage.set(USER_EMAIL, "user@example.com");
        assert!(session.connect().await);

        session.disconnect();
        session.disconnect();

        let state = session.state();
        assert!(state.status.is_disconnected());
        assert!(state.accounts.is_empty());
        assert!(state.selected.is_none());
        assert!(storage.get(WALLET_CONNECTED).is_none());
        assert!(storage.get(SELECTED_ADDRESS).is_none());
        assert!(storage.get(USER_EMAIL).is_none());
        assert_eq!(session.formatted_address(6), "");
    }

    #[tokio::test]
    async fn test_select_unknown_account() {
        let (session, _) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE])]);
        assert!(session.connect().await);

        let stranger = Account {
            address: BOB.to_owned(),
            name: None,
            source: "polkadot-js".to_owned(),
        };
        assert!(session.select_account(&stranger).unwrap_err().is_unknown_account());
        assert_eq!(session.selected().unwrap().address, ALICE);
    }

    #[tokio::test]
    async fn test_restore_reselects_saved_address() {
        let storage = Arc::new(MemoryStorage::default());
        storage.set(WALLET_CONNECTED, "true");
        storage.set(SELECTED_ADDRESS, BOB);

        let session = session_with(
            vec![StubExtension::new("talisman").with_accounts(&[ALICE, BOB])],
            storage.clone(),
        );
        assert!(session.restore().await);
        assert_eq!(session.selected().unwrap().address, BOB);
        assert_eq!(storage.get(SELECTED_ADDRESS).as_deref(), Some(BOB));
    }

    #[tokio::test]
    async fn test_restore_requires_saved_address() {
        let storage = Arc::new(MemoryStorage::default());
        storage.set(WALLET_CONNECTED, "true");

        let session = session_with(
            vec![StubExtension::new("talisman").with_accounts(&[ALICE])],
            storage.clone(),
        );
        assert!(!session.has_saved_connection());
        assert!(!session.restore().await);
        assert!(session.state().status.is_disconnected());
    }

    #[tokio::test]
    async fn test_restore_falls_back_when_saved_address_is_gone() {
        let storage = Arc::new(MemoryStorage::default());
        storage.set(WALLET_CONNECTED, "true");
        storage.set(SELECTED_ADDRESS, BOB);

        let session = session_with(
            vec![StubExtension::new("talisman").with_accounts(&[ALICE])],
            storage.clone(),
        );
        assert!(session.restore().await);
        assert_eq!(session.selected().unwrap().address, ALICE);
        assert_eq!(storage.get(SELECTED_ADDRESS).as_deref(), Some(ALICE));
    }

    #[tokio::test]
    async fn test_restore_without_saved_connection() {
        let (session, _) = session(vec![StubExtension::new("talisman").with_accounts(&[ALICE])]);
        assert!(!session.restore().await);
        assert!(session.state().status.is_disconnected());
    }

    #[tokio::test]
    async fn test_sign_without_selection() {
        let (session, _) = session(vec![]);
        let err = session
            .sign("hello", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_no_account_selected());
        assert_eq!(session.state().error.as_deref(), Some("No account selected"));
    }

    #[tokio::test]
    async fn test_sign_with_selected_account() {
        let (session, _) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE])]);
        assert!(session.connect().await);

        let signature = session
            .sign("hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(signature, "polkadot-js:0x6869");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_timeout_is_recorded() {
        let (session, _) = session(vec![
            StubExtension::new("polkadot-js")
                .with_accounts(&[ALICE])
                .hang_on_sign(),
        ]);
        let session = session.with_sign_timeout(Some(Duration::from_secs(30)));
        assert!(session.connect().await);

        let err = session
            .sign("hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            session.state().error.as_deref(),
            Some("signature request timed out")
        );
    }

    #[tokio::test]
    async fn test_dropped_connect_leaves_connecting() {
        let (session, _) = session(vec![
            StubExtension::new("polkadot-js")
                .with_accounts(&[ALICE])
                .hang_on_enable(),
        ]);

        {
            let connect = session.connect();
            tokio::pin!(connect);
            assert!(connect.as_mut().now_or_never().is_none());
            assert!(session.state().status.is_connecting());
        }

        assert!(session.state().status.is_disconnected());
    }

    #[tokio::test]
    async fn test_state_is_observable() {
        let (session, _) =
            session(vec![StubExtension::new("polkadot-js").with_accounts(&[ALICE])]);
        let mut rx = session.subscribe();

        assert!(session.connect().await);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_connected());
    }
}
