use futures::{FutureExt, future::BoxFuture};

use super::{Extension, InjectedAccount, SignRawPayload};
use crate::api::{Error, Result};

/// Scriptable extension for tests.
///
/// Signatures are `"{name}:{data}"` so tests can tell which extension signed.
#[derive(Debug, Clone)]
pub(crate) struct StubExtension {
    name: String,
    accounts: Vec<InjectedAccount>,
    deny: bool,
    sign_raw: bool,
    hang_enable: bool,
    hang: bool,
}

impl StubExtension {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            accounts: Vec::new(),
            deny: false,
            sign_raw: true,
            hang_enable: false,
            hang: false,
        }
    }

    pub(crate) fn with_accounts(mut self, addresses: &[&str]) -> Self {
        self.accounts = addresses
            .iter()
            .enumerate()
            .map(|(i, address)| InjectedAccount {
                address: address.to_string(),
                name: Some(format!("{} #{}", self.name, i + 1)),
            })
            .collect();
        self
    }

    pub(crate) fn deny_access(mut self) -> Self {
        self.deny = true;
        self
    }

    pub(crate) fn without_sign_raw(mut self) -> Self {
        self.sign_raw = false;
        self
    }

    pub(crate) fn hang_on_enable(mut self) -> Self {
        self.hang_enable = true;
        self
    }

    pub(crate) fn hang_on_sign(mut self) -> Self {
        self.hang = true;
        self
    }
}

impl Extension for StubExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable<'a>(&'a self, _app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        if self.hang_enable {
            return futures::future::pending().boxed();
        }
        let res = if self.deny {
            Err(Error::Wallet("Rejected".into()))
        } else {
            Ok(())
        };
        futures::future::ready(res).boxed()
    }

    fn accounts(&self) -> BoxFuture<'_, Result<Vec<InjectedAccount>>> {
        futures::future::ready(Ok(self.accounts.clone())).boxed()
    }

    fn sign_raw(&self, payload: SignRawPayload) -> BoxFuture<'_, Result<String>> {
        if self.hang {
            return futures::future::pending().boxed();
        }
        futures::future::ready(Ok(format!("{}:{}", self.name, payload.data))).boxed()
    }

    fn supports_sign_raw(&self) -> bool {
        self.sign_raw
    }
}
