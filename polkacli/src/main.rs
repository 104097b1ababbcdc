use std::io::{Write, stdout};
use std::time::Duration;

use clap::Args;
use clap::{Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use polkapay::{
    CancellationToken, Decimal,
    api::types::{ConfirmPayment, CreateOrder, OrderType, PixKeyType, RegisterLp},
    config::Config,
    hooks::{self, ActiveOrders, LpProfile, OrderActions},
    limits::{
        Currency, UserLimits, format_currency, mock_social_verifications, verification_progress,
    },
    storage::Storage,
    wallet::{format_address, wallet_display_name},
};
use url::Url;

mod utils;

use utils::{ACCESS_TOKEN, Context, print_order, print_orders};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Backend base URL, overrides POLKAPAY_API_URL.
    #[arg(long, global = true)]
    api_url: Option<Url>,
    #[command(flatten)]
    signer: SignerArgs,
}

/// Where the wallet key comes from.
#[derive(Args, Clone, Default)]
pub struct SignerArgs {
    /// sr25519 secret seed (hex), as printed by `subkey inspect`.
    #[arg(long, global = true, env = "POLKAPAY_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
    /// Foundry keystore name under ~/.foundry/keystores.
    #[arg(long, global = true)]
    pub keystore: Option<String>,
    /// Keystore password. Prompted for when omitted.
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[enum_dispatch]
trait Run {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()>;
}

#[derive(Subcommand)]
#[enum_dispatch(Run)]
enum Commands {
    /// Show current exchange rates
    Rates(RatesCmd),
    /// Print exchange rates as they refresh, until Ctrl-C
    WatchRates(WatchRatesCmd),
    /// List open orders
    Orders(OrdersCmd),
    /// Show one order
    Order(OrderCmd),
    /// List your orders
    MyOrders(MyOrdersCmd),
    /// Create a buy or sell order
    Create(CreateCmd),
    /// Accept an order as a liquidity provider
    Accept(AcceptCmd),
    /// Report the PIX payment of an order as sent
    ConfirmPayment(ConfirmPaymentCmd),
    /// Mark an order as completed
    Complete(CompleteCmd),
    /// List supported wallets and connected accounts
    Wallets(WalletsCmd),
    /// Connect the wallet and sign in
    Login(LoginCmd),
    /// Forget the wallet connection and token
    Logout(LogoutCmd),
    /// Show your profile and limits
    Whoami(WhoamiCmd),
    /// Register as a liquidity provider
    LpRegister(LpRegisterCmd),
    /// Show your liquidity provider profile
    LpProfile(LpProfileCmd),
    /// List orders you can accept as a liquidity provider
    LpAvailable(LpAvailableCmd),
    /// List orders you handled as a liquidity provider
    LpOrders(LpOrdersCmd),
    /// Toggle whether you receive new orders
    LpAvailability(LpAvailabilityCmd),
    /// Show liquidity provider earnings
    LpEarnings(LpEarningsCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init();

    let args = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = args.api_url {
        config.api_url = url;
    }

    let ctx = Context::new(config, args.signer)?;
    args.command.run(&ctx).await
}

#[derive(Args)]
struct RatesCmd;

impl Run for RatesCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let rates = ctx.client().exchange_rates().await?;
        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(&mut writer, "pair\trate")?;
        writeln!(
            &mut writer,
            "DOT/USD\t{}",
            format_currency(rates.dot_to_usd, Currency::Usd),
        )?;
        writeln!(
            &mut writer,
            "DOT/BRL\t{}",
            format_currency(rates.dot_to_brl, Currency::Brl),
        )?;
        writer.flush()?;

        Ok(())
    }
}

#[derive(Args)]
struct WatchRatesCmd {
    /// Refresh period in seconds. Defaults to POLKAPAY_RATES_INTERVAL_SECS.
    #[arg(long)]
    interval: Option<u64>,
}

impl Run for WatchRatesCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let period = self
            .interval
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(ctx.config.rates_interval);

        let rates = hooks::exchange_rates(ctx.client(), period);
        let mut updates = rates.subscribe();

        loop {
            let state = updates.borrow_and_update().clone();
            if !state.loading {
                match (state.data, state.error) {
                    (_, Some(error)) => eprintln!("error: {error}"),
                    (Some(rates), None) => println!(
                        "{}  DOT/USD {}  DOT/BRL {}",
                        chrono::Local::now().format("%H:%M:%S"),
                        format_currency(rates.dot_to_usd, Currency::Usd),
                        format_currency(rates.dot_to_brl, Currency::Brl),
                    ),
                    (None, None) => {}
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Args)]
struct OrdersCmd {
    /// Only show buy or sell orders.
    #[arg(long = "type")]
    order_type: Option<OrderType>,
}

impl Run for OrdersCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let orders = ActiveOrders::new(ctx.client(), self.order_type);
        print_orders(&orders.refetch().await?)
    }
}

#[derive(Args)]
struct OrderCmd {
    id: u64,
}

impl Run for OrderCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        print_order(&ctx.client().order(self.id).await?)
    }
}

#[derive(Args)]
struct MyOrdersCmd;

impl Run for MyOrdersCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let orders = hooks::my_orders(ctx.authed_client()?);
        print_orders(&orders.refetch().await?)
    }
}

#[derive(Args)]
struct CreateCmd {
    /// buy or sell
    order_type: OrderType,
    /// Amount of DOT.
    amount: Decimal,
    /// PIX key receiving BRL, required for sell orders.
    #[arg(long)]
    pix_key: Option<String>,
}

impl Run for CreateCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        anyhow::ensure!(self.amount > Decimal::ZERO, "amount must be positive");

        let req = match (self.order_type, &self.pix_key) {
            (OrderType::Buy, _) => CreateOrder::buy(self.amount),
            (OrderType::Sell, Some(pix_key)) => CreateOrder::sell(self.amount, pix_key),
            (OrderType::Sell, None) => anyhow::bail!("sell orders require --pix-key"),
        };

        let limit = UserLimits::mock().limit_for(self.order_type);
        if self.amount > limit {
            log::warn!(
                "{} exceeds your {} limit of {limit} DOT",
                self.amount,
                self.order_type
            );
        }

        let actions = OrderActions::new(ctx.client());
        let order = actions.create(&req).await?;
        print_order(&order)
    }
}

#[derive(Args)]
struct AcceptCmd {
    id: u64,
}

impl Run for AcceptCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let actions = OrderActions::new(ctx.authed_client()?);
        print_order(&actions.accept(self.id).await?)
    }
}

#[derive(Args)]
struct ConfirmPaymentCmd {
    id: u64,
    /// PIX transaction id.
    #[arg(long)]
    txid: String,
    /// Receipt URL or payload.
    #[arg(long)]
    proof: Option<String>,
}

impl Run for ConfirmPaymentCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let actions = OrderActions::new(ctx.client());
        let req = ConfirmPayment {
            pix_txid: self.txid.clone(),
            payment_proof: self.proof.clone(),
        };
        print_order(&actions.confirm_payment(self.id, &req).await?)
    }
}

#[derive(Args)]
struct CompleteCmd {
    id: u64,
}

impl Run for CompleteCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let actions = OrderActions::new(ctx.authed_client()?);
        print_order(&actions.complete(self.id).await?)
    }
}

#[derive(Args)]
struct WalletsCmd;

impl Run for WalletsCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let session = ctx.session()?;
        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(&mut writer, "\twallet\tinstalled")?;
        for wallet in session.installed_wallets() {
            writeln!(
                &mut writer,
                "{}\t{}\t{}",
                wallet.info.icon, wallet.info.display_name, wallet.installed
            )?;
        }
        writer.flush()?;

        if session.restore().await {
            let state = session.state();
            println!();
            let mut writer = tabwriter::TabWriter::new(stdout());
            writeln!(&mut writer, "\taddress\tname\twallet")?;
            for account in &state.accounts {
                let marker = if state.selected.as_ref() == Some(account) { "*" } else { "" };
                writeln!(
                    &mut writer,
                    "{marker}\t{}\t{}\t{}",
                    account.address,
                    account.name.as_deref().unwrap_or("-"),
                    wallet_display_name(&account.source),
                )?;
            }
            writer.flush()?;
        }

        Ok(())
    }
}

#[derive(Args)]
struct LoginCmd;

impl Run for LoginCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let session = ctx.session()?;
        if !session.connect().await {
            anyhow::bail!("{}", session.state().error.unwrap_or_default());
        }

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let res = session.authenticate(&ctx.client(), &cancel).await;
        interrupt.abort();

        let token = res?;
        ctx.storage.set(ACCESS_TOKEN, &token.access_token);
        println!("logged in as {}", session.formatted_address(6));
        Ok(())
    }
}

#[derive(Args)]
struct LogoutCmd;

impl Run for LogoutCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        ctx.session()?.disconnect();
        ctx.storage.remove(ACCESS_TOKEN);
        println!("logged out");
        Ok(())
    }
}

#[derive(Args)]
struct WhoamiCmd;

impl Run for WhoamiCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let user = ctx.authed_client()?.profile().await?;
        let limits = UserLimits::mock();
        let verifications = mock_social_verifications(chrono::Utc::now());
        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(
            &mut writer,
            "address\t{}",
            format_address(&user.wallet_address, 8),
        )?;
        writeln!(&mut writer, "verified\t{}", user.is_verified)?;
        writeln!(
            &mut writer,
            "orders\t{} ({} successful)",
            user.total_orders,
            user.successful_orders,
        )?;
        writeln!(&mut writer, "rating\t{:.1}", user.rating)?;
        writeln!(
            &mut writer,
            "buy limit\t{} x{}/day",
            format_currency(user.buy_limit_usd, Currency::Usd),
            user.buy_orders_per_day
        )?;
        writeln!(
            &mut writer,
            "sell limit\t{} x{}/day",
            format_currency(user.sell_limit_usd, Currency::Usd),
            user.sell_orders_per_day
        )?;
        writeln!(&mut writer, "daily limit\t{} DOT", limits.daily_limit)?;
        writeln!(&mut writer, "monthly limit\t{} DOT", limits.monthly_limit)?;
        writeln!(&mut writer, "level\t{}", limits.verification_level)?;
        writeln!(
            &mut writer,
            "socials\t{}% verified",
            verification_progress(&verifications).round()
        )?;
        writer.flush()?;

        Ok(())
    }
}

#[derive(Args)]
struct LpRegisterCmd {
    /// PIX key you pay from and receive to.
    pix_key: String,
    /// cpf, email, phone or random
    #[arg(long, default_value = "random")]
    key_type: PixKeyType,
}

impl Run for LpRegisterCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let profile = LpProfile::new(ctx.authed_client()?);
        let lp = profile
            .register(&RegisterLp {
                pix_key: self.pix_key.clone(),
                pix_key_type: self.key_type,
            })
            .await?;
        println!("registered as liquidity provider #{}", lp.id);
        Ok(())
    }
}

#[derive(Args)]
struct LpProfileCmd;

impl Run for LpProfileCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let lp = LpProfile::new(ctx.authed_client()?).fetch().await?;
        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(&mut writer, "id\t{}", lp.id)?;
        writeln!(&mut writer, "pix key\t{} ({})", lp.pix_key, lp.pix_key_type)?;
        writeln!(&mut writer, "active\t{}", lp.is_active)?;
        writeln!(&mut writer, "available\t{}", lp.is_available)?;
        writeln!(&mut writer, "orders\t{}", lp.total_orders_processed)?;
        writeln!(
            &mut writer,
            "volume\t{}",
            format_currency(lp.total_volume_usd, Currency::Usd),
        )?;
        writeln!(
            &mut writer,
            "earnings\t{}",
            format_currency(lp.total_earnings_usd, Currency::Usd),
        )?;
        writeln!(&mut writer, "rating\t{:.1}", lp.rating)?;
        writer.flush()?;

        Ok(())
    }
}

#[derive(Args)]
struct LpAvailableCmd;

impl Run for LpAvailableCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let orders = hooks::lp_available_orders(ctx.authed_client()?);
        print_orders(&orders.refetch().await?)
    }
}

#[derive(Args)]
struct LpOrdersCmd;

impl Run for LpOrdersCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let orders = hooks::lp_orders(ctx.authed_client()?);
        print_orders(&orders.refetch().await?)
    }
}

#[derive(Args)]
struct LpAvailabilityCmd {
    /// true to receive new orders, false to pause.
    #[arg(action = clap::ArgAction::Set)]
    available: bool,
}

impl Run for LpAvailabilityCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let profile = LpProfile::new(ctx.authed_client()?);
        profile.update_availability(self.available).await?;
        println!(
            "{}",
            if self.available {
                "accepting new orders"
            } else {
                "paused"
            }
        );
        Ok(())
    }
}

#[derive(Args)]
struct LpEarningsCmd;

impl Run for LpEarningsCmd {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let earnings = hooks::lp_earnings(ctx.authed_client()?).refetch().await?;
        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(&mut writer, "orders\t{}", earnings.total_orders)?;
        writeln!(
            &mut writer,
            "volume\t{}",
            format_currency(earnings.total_volume_usd, Currency::Usd),
        )?;
        writeln!(
            &mut writer,
            "earnings\t{}",
            format_currency(earnings.total_earnings_usd, Currency::Usd),
        )?;
        writeln!(&mut writer, "rating\t{:.1}", earnings.rating)?;
        writer.flush()?;

        Ok(())
    }
}
