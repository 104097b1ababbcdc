use std::sync::atomic::{AtomicBool, Ordering};

use futures::{FutureExt, future::BoxFuture};

use super::{
    Extension, InjectedAccount, RawKind, SignRawPayload,
    sr25519::{Keypair, wrap_bytes},
};
use crate::api::{Error, Result};

/// An in-process wallet extension holding local sr25519 keys.
///
/// Access is granted on the first [`Extension::enable`] call; accounts are hidden
/// until then, like a browser extension that has not authorized the application.
/// Accounts are SS58 addresses. `bytes` payloads are signed wrapped in `<Bytes>`
/// tags, `payload` data as is.
///
/// # Example
///
/// ```
/// use polkapay::wallet::{InjectedRegistry, Keypair, LocalExtension};
///
/// # fn example() -> anyhow::Result<()> {
/// let seed = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";
/// let key: Keypair = seed.parse()?;
///
/// let mut registry = InjectedRegistry::default();
/// registry.inject(LocalExtension::new("polkadot-js").with_key(key, Some("alice")));
/// assert!(registry.contains("polkadot-js"));
/// # Ok(())
/// # }
/// ```
pub struct LocalExtension {
    name: String,
    keys: Vec<(Keypair, Option<String>)>,
    authorized: AtomicBool,
}

impl std::fmt::Debug for LocalExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExtension")
            .field("name", &self.name)
            .field("accounts", &self.keys.len())
            .field("authorized", &self.authorized.load(Ordering::Relaxed))
            .finish()
    }
}

impl LocalExtension {
    /// Creates an extension without accounts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            authorized: AtomicBool::new(false),
        }
    }

    /// Adds an account backed by `key`, optionally named.
    pub fn with_key(mut self, key: Keypair, name: Option<&str>) -> Self {
        self.keys.push((key, name.map(str::to_owned)));
        self
    }

    fn key(&self, address: &str) -> Option<&Keypair> {
        self.keys
            .iter()
            .map(|(key, _)| key)
            .find(|key| key.address() == address)
    }

    fn sign(&self, payload: &SignRawPayload) -> Result<String> {
        if !self.authorized.load(Ordering::Acquire) {
            return Err(Error::Wallet(format!("{} has not authorized this application", self.name)));
        }

        let key = self
            .key(&payload.address)
            .ok_or_else(|| Error::UnknownSigner(payload.address.clone()))?;
        let data = const_hex::decode(&payload.data)
            .map_err(|err| Error::Wallet(format!("invalid payload data: {err}")))?;
        let signature = match payload.kind {
            RawKind::Bytes => key.sign(&wrap_bytes(&data)),
            RawKind::Payload => key.sign(&data),
        };

        Ok(const_hex::encode_prefixed(signature))
    }
}

impl Extension for LocalExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        log::debug!("{} authorized {app_name}", self.name);
        self.authorized.store(true, Ordering::Release);
        futures::future::ready(Ok(())).boxed()
    }

    fn accounts(&self) -> BoxFuture<'_, Result<Vec<InjectedAccount>>> {
        let accounts = if self.authorized.load(Ordering::Acquire) {
            self.keys
                .iter()
                .map(|(key, name)| InjectedAccount {
                    address: key.address().to_owned(),
                    name: name.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        futures::future::ready(Ok(accounts)).boxed()
    }

    fn sign_raw(&self, payload: SignRawPayload) -> BoxFuture<'_, Result<String>> {
        futures::future::ready(self.sign(&payload)).boxed()
    }
}
