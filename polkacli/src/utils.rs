//! Helpers shared by the commands.
//!
//! This module provides helper functions for:
//! - Loading a local sr25519 key (secret seed or Foundry keystore)
//! - Locating the persisted session file
//! - Building the API client and wallet session
//! - Printing tables

use std::{
    env::home_dir,
    io::{Write, stdout},
    path::PathBuf,
    sync::Arc,
};

use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use polkapay::{
    api::{self, types::Order},
    config::Config,
    limits::{Currency, format_currency, format_relative},
    session::Session,
    storage::{FileStorage, Storage},
    wallet::{InjectedRegistry, Keypair, LocalExtension, WalletAdapter},
};

use crate::SignerArgs;

/// Storage key of the bearer token obtained by `login`.
pub const ACCESS_TOKEN: &str = "accessToken";

/// Name the local signer is injected under.
const EXTENSION_NAME: &str = "polkadot-js";

/// Loads the wallet key from the command line arguments.
///
/// Attempts, in order:
/// 1. Secret seed (`--private-key` or `POLKAPAY_PRIVATE_KEY`)
/// 2. Foundry keystore (`--keystore`) holding the 32-byte seed, prompting for the
///    password if needed
///
/// Returns `None` when neither is given.
pub fn find_signer(cmd: &SignerArgs) -> anyhow::Result<Option<Keypair>> {
    if let Some(key) = cmd.private_key.as_ref() {
        Ok(Some(key.parse()?))
    } else if let Some(filename) = cmd.keystore.as_ref() {
        let home_dir = home_dir().ok_or(anyhow::anyhow!("unable to locate home dir"))?;
        let keypath = home_dir.join(".foundry").join("keystores").join(filename);
        let password = cmd
            .password
            .clone()
            .or_else(|| {
                rpassword::prompt_password(format!("{} password: ", keypath.display())).ok()
            })
            .ok_or(anyhow::anyhow!("keystores require a password!"))?;
        let secret = PrivateKeySigner::decrypt_keystore(keypath, password)?;
        Ok(Some(Keypair::from_seed(secret.to_bytes().as_slice())?))
    } else {
        Ok(None)
    }
}

/// Returns the session file, `~/.polkapay/session.json`.
pub fn session_path() -> anyhow::Result<PathBuf> {
    let home_dir = home_dir().ok_or(anyhow::anyhow!("unable to locate home dir"))?;
    Ok(home_dir.join(".polkapay").join("session.json"))
}

/// Everything a command needs: configuration, persisted session data and signer
/// arguments.
pub struct Context {
    pub config: Config,
    pub storage: Arc<FileStorage>,
    pub signer: SignerArgs,
}

impl Context {
    pub fn new(config: Config, signer: SignerArgs) -> anyhow::Result<Self> {
        let storage = Arc::new(FileStorage::open(session_path()?)?);
        Ok(Self {
            config,
            storage,
            signer,
        })
    }

    /// A client carrying the saved token, if any.
    pub fn client(&self) -> api::Client {
        let mut client = api::Client::from_config(&self.config);
        client.set_token(self.storage.get(ACCESS_TOKEN));
        client
    }

    /// A client carrying the saved token, failing when not logged in.
    pub fn authed_client(&self) -> anyhow::Result<api::Client> {
        let client = self.client();
        anyhow::ensure!(
            client.token().is_some(),
            "not logged in, run `polkacli login` first"
        );
        Ok(client)
    }

    /// Opens a wallet session backed by the local key, if one was given.
    pub fn session(&self) -> anyhow::Result<Session> {
        let mut registry = InjectedRegistry::default();
        if let Some(key) = find_signer(&self.signer)? {
            registry.inject(LocalExtension::new(EXTENSION_NAME).with_key(key, None));
        }

        let storage: Arc<dyn Storage> = self.storage.clone();
        Ok(Session::open(
            Arc::new(WalletAdapter::new(registry)),
            storage,
            self.config.app_name.clone(),
        )
        .with_sign_timeout(self.config.sign_timeout))
    }
}

/// Prints orders as a table.
pub fn print_orders(orders: &[Order]) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut writer = tabwriter::TabWriter::new(stdout());

    writeln!(&mut writer, "id\ttype\tstatus\tdot\tbrl\tusd\tcreated")?;
    for order in orders {
        writeln!(
            &mut writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            order.id,
            order.order_type,
            order.status,
            order.dot_amount,
            format_currency(order.brl_amount, Currency::Brl),
            format_currency(order.usd_amount, Currency::Usd),
            format_relative(order.created_at, now),
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Prints one order with its payment details.
pub fn print_order(order: &Order) -> anyhow::Result<()> {
    let mut writer = tabwriter::TabWriter::new(stdout());

    writeln!(&mut writer, "id\t{}", order.id)?;
    writeln!(&mut writer, "type\t{}", order.order_type)?;
    writeln!(&mut writer, "status\t{}", order.status)?;
    writeln!(&mut writer, "amount\t{} DOT", order.dot_amount)?;
    writeln!(
        &mut writer,
        "total\t{}",
        format_currency(order.brl_amount, Currency::Brl),
    )?;
    writeln!(
        &mut writer,
        "rate\t{}",
        format_currency(order.exchange_rate_dot_brl, Currency::Brl),
    )?;
    writeln!(
        &mut writer,
        "fee\t{}",
        format_currency(order.lp_fee_amount, Currency::Dot),
    )?;
    if let Some(pix_key) = &order.pix_key {
        writeln!(&mut writer, "pix key\t{pix_key}")?;
    }
    if let Some(qr) = &order.pix_qr_code {
        writeln!(&mut writer, "pix code\t{qr}")?;
    }
    if let Some(txid) = &order.pix_txid {
        writeln!(&mut writer, "pix txid\t{txid}")?;
    }
    if let Some(expires_at) = order.expires_at {
        writeln!(&mut writer, "expires\t{expires_at}")?;
    }

    writer.flush()?;
    Ok(())
}
