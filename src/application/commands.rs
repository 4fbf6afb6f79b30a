//! CLI commands and handlers
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::async_monitor::AsyncOrderMonitor;
use super::clock::{Sleeper, TokioSleeper};
use super::redemption_service::RedemptionResolver;
use super::sync_monitor::SubmissionMonitor;
use super::trade_executor::TradeExecutor;
use super::wallet_service::WalletService;
use crate::config::Config;
use crate::domain::execution::{TradeRequest, TradeRoute};
use crate::exchanges::{DflowMetadataClient, DflowTradeClient, QuoteApiClient};
use crate::infrastructure::blockchain::{load_wallet, SolanaRpcClient, WalletSigner, WalletSource};
use crate::shared::types::{Amount, SOL_DECIMALS};

#[derive(Parser)]
#[command(name = "outcome-settle")]
#[command(version, about = "Quote, trade and redeem prediction-market outcome tokens on Solana")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the config file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Solana RPC endpoint
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Trade API base URL
    #[arg(long, global = true)]
    pub trade_api_url: Option<String>,

    /// Metadata API base URL
    #[arg(long, global = true)]
    pub metadata_api_url: Option<String>,

    /// API key sent as x-api-key
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Keypair file, base58 secret, or a bare address for read-only use
    #[arg(long, global = true)]
    pub wallet: Option<String>,

    /// Log filter, e.g. `debug` or `outcome_settlement=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.rpc_url {
            config.rpc.url = url.clone();
        }
        if let Some(url) = &self.trade_api_url {
            config.api.trade_url = url.clone();
        }
        if let Some(url) = &self.metadata_api_url {
            config.api.metadata_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api.api_key = Some(key.clone());
        }
        if let Some(wallet) = &self.wallet {
            config.wallet.keypair = Some(wallet.clone());
        }
    }
}

/// Swap parameters shared by `quote` and `trade`
#[derive(Args, Debug, Clone)]
pub struct SwapArgs {
    /// Mint being sold
    #[arg(long)]
    pub input_mint: String,

    /// Mint being bought
    #[arg(long)]
    pub output_mint: String,

    /// Raw integer amount of the input mint
    #[arg(long, conflicts_with = "ui_amount")]
    pub amount: Option<u64>,

    /// Decimal amount of the input mint, e.g. `10` or `0.5`
    #[arg(long)]
    pub ui_amount: Option<String>,

    /// Decimals used with --ui-amount
    #[arg(long)]
    pub decimals: Option<u8>,

    /// `auto` or basis points
    #[arg(long)]
    pub slippage: Option<String>,

    /// order, imperative or declarative
    #[arg(long)]
    pub route: Option<String>,

    /// Market ticker, used for reference price lookups
    #[arg(long)]
    pub market_ticker: Option<String>,

    #[arg(long)]
    pub only_direct_routes: bool,
}

impl SwapArgs {
    /// Same shape the agent layer sends, so both go through one validator
    pub fn to_tool_args(&self, config: &Config) -> Value {
        let mut args = Map::new();
        args.insert("inputMint".into(), json!(self.input_mint));
        args.insert("outputMint".into(), json!(self.output_mint));
        if let Some(amount) = self.amount {
            args.insert("amount".into(), json!(amount.to_string()));
        }
        if let Some(ui) = &self.ui_amount {
            args.insert("uiAmount".into(), json!(ui));
        }
        if let Some(decimals) = self.decimals {
            args.insert("decimals".into(), json!(decimals));
        }
        let slippage = self.slippage.clone().unwrap_or_else(|| config.trade.slippage.clone());
        args.insert("slippageBps".into(), json!(slippage));
        let route = self.route.as_deref().unwrap_or(&config.trade.route);
        // aliases such as `intent` normalize here; unknown names fail validation
        let route = route.parse::<TradeRoute>().map(|r| r.to_string()).unwrap_or_else(|_| route.to_string());
        args.insert("route".into(), json!(route));
        if let Some(ticker) = &self.market_ticker {
            args.insert("marketTicker".into(), json!(ticker));
        }
        if self.only_direct_routes {
            args.insert("onlyDirectRoutes".into(), json!(true));
        }
        Value::Object(args)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a quote without trading
    Quote(SwapArgs),

    /// Quote, sign, submit and monitor a trade
    Trade(SwapArgs),

    /// Poll a submitted transaction until it confirms
    Confirm {
        signature: String,
    },

    /// Show, or follow with --watch, the state of an intent order
    OrderStatus {
        signature: String,

        #[arg(long)]
        watch: bool,

        /// Requested input, used to bound fills while watching
        #[arg(long, default_value_t = u64::MAX)]
        requested_in: u64,
    },

    /// Check whether an outcome token can be redeemed
    Eligibility {
        mint: String,

        #[arg(long)]
        settlement_mint: Option<String>,
    },

    /// List redeemable positions of a wallet
    Redeemable {
        /// Defaults to the configured wallet
        #[arg(long)]
        owner: Option<String>,
    },

    /// Redeem an outcome position for the settlement currency
    Redeem {
        mint: String,

        /// Raw amount; defaults to the whole holding
        #[arg(long)]
        amount: Option<u64>,

        #[arg(long)]
        settlement_mint: Option<String>,
    },

    /// SOL balance, or a token balance with --mint
    Balance {
        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        mint: Option<String>,
    },

    /// Send SOL, or a token with --mint
    Transfer {
        recipient: String,

        /// Decimal amount, e.g. `1.25`
        amount: String,

        #[arg(long)]
        mint: Option<String>,
    },
}

fn parse_pubkey_arg(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|e| anyhow!("invalid {} '{}': {}", field, value, e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serialize output")?);
    Ok(())
}

pub struct CommandExecutor {
    config: Config,
    sleeper: Arc<dyn Sleeper>,
}

impl CommandExecutor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    fn trade_api(&self) -> Result<Arc<DflowTradeClient>> {
        let client = DflowTradeClient::new(
            self.config.api.trade_url.clone(),
            self.config.api.api_key.clone(),
            self.config.api_timeout(),
        )
        .context("create trade API client")?;
        Ok(Arc::new(client))
    }

    fn metadata_api(&self) -> Result<Arc<DflowMetadataClient>> {
        let client = DflowMetadataClient::new(
            self.config.api.metadata_url.clone(),
            self.config.api.api_key.clone(),
            self.config.api_timeout(),
        )
        .context("create metadata API client")?;
        Ok(Arc::new(client))
    }

    fn rpc(&self) -> Result<Arc<SolanaRpcClient>> {
        Ok(Arc::new(SolanaRpcClient::new(self.config.rpc.url.clone(), self.config.commitment()?)))
    }

    fn wallet(&self) -> Result<Arc<dyn WalletSigner>> {
        let value = self
            .config
            .wallet
            .keypair
            .as_deref()
            .ok_or_else(|| anyhow!("no wallet configured; pass --wallet or set [wallet] keypair"))?;
        load_wallet(&WalletSource::detect(value)).context("load wallet")
    }

    fn owner_or_wallet(&self, owner: Option<&str>) -> Result<Pubkey> {
        match owner {
            Some(owner) => parse_pubkey_arg("owner", owner),
            None => Ok(self.wallet()?.address()),
        }
    }

    fn settlement_mint(&self, value: Option<&str>) -> Result<Pubkey> {
        match value {
            Some(mint) => parse_pubkey_arg("settlement mint", mint),
            None => Ok(self.config.settlement_mint()?),
        }
    }

    fn executor(&self) -> Result<TradeExecutor> {
        Ok(TradeExecutor::new(self.trade_api()?, self.rpc()?, self.sleeper.clone())
            .with_confirmation_level(self.config.commitment()?))
    }

    fn resolver(&self) -> Result<RedemptionResolver> {
        let trade_api = self.trade_api()?;
        Ok(RedemptionResolver::new(
            self.metadata_api()?,
            trade_api,
            self.rpc()?,
            Arc::new(self.executor()?),
        ))
    }

    fn wallet_service(&self) -> Result<WalletService> {
        Ok(WalletService::new(self.rpc()?, self.sleeper.clone()).with_confirmation_level(self.config.commitment()?))
    }

    /// Execute the selected command
    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Quote(args) => self.execute_quote(args).await,
            Commands::Trade(args) => self.execute_trade(args).await,
            Commands::Confirm { signature } => self.execute_confirm(&signature).await,
            Commands::OrderStatus {
                signature,
                watch,
                requested_in,
            } => self.execute_order_status(&signature, watch, requested_in).await,
            Commands::Eligibility { mint, settlement_mint } => {
                self.execute_eligibility(&mint, settlement_mint.as_deref()).await
            }
            Commands::Redeemable { owner } => self.execute_redeemable(owner.as_deref()).await,
            Commands::Redeem {
                mint,
                amount,
                settlement_mint,
            } => self.execute_redeem(&mint, amount, settlement_mint.as_deref()).await,
            Commands::Balance { owner, mint } => self.execute_balance(owner.as_deref(), mint.as_deref()).await,
            Commands::Transfer { recipient, amount, mint } => {
                self.execute_transfer(&recipient, &amount, mint.as_deref()).await
            }
        }
    }

    async fn execute_quote(&self, args: SwapArgs) -> Result<()> {
        let request = TradeRequest::from_tool_args(args.to_tool_args(&self.config))?;
        let mut quote_request = request.quote.clone();
        if let Some(wallet) = &self.config.wallet.keypair {
            if let Ok(wallet) = load_wallet(&WalletSource::detect(wallet)) {
                quote_request = quote_request.with_user(wallet.address());
            }
        }
        info!("🔍 Quoting {} {} -> {}", quote_request.amount, quote_request.input_mint, quote_request.output_mint);
        let quote = self.trade_api()?.request_quote(&quote_request, request.route).await?;
        print_json(&quote)
    }

    async fn execute_trade(&self, args: SwapArgs) -> Result<()> {
        let request = TradeRequest::from_tool_args(args.to_tool_args(&self.config))?;
        let wallet = self.wallet()?;
        let result = self
            .executor()?
            .execute_trade(&request, wallet.as_ref(), &self.config.monitor_options())
            .await;
        print_json(&result)?;
        match &result.failure {
            Some(failure) if !result.success => Err(anyhow!(failure.user_message())),
            _ => Ok(()),
        }
    }

    async fn execute_confirm(&self, signature: &str) -> Result<()> {
        let monitor =
            SubmissionMonitor::new(self.rpc()?, self.sleeper.clone()).with_target(self.config.commitment()?);
        let result = monitor.monitor_sync(signature, self.config.monitor_options().sync).await;
        print_json(&result)
    }

    async fn execute_order_status(&self, signature: &str, watch: bool, requested_in: u64) -> Result<()> {
        let api = self.trade_api()?;
        if !watch {
            let snapshot = api.order_status(signature).await.context("fetch order status")?;
            return print_json(&json!({
                "status": snapshot.raw_status,
                "fills": snapshot.fills,
            }));
        }

        let monitor = AsyncOrderMonitor::new(api, self.sleeper.clone());
        let state = monitor
            .monitor_async(signature, requested_in, self.config.monitor_options().intent, |snapshot| {
                info!(
                    "⏳ poll {}: {} fills={} in={} out={}",
                    snapshot.attempt, snapshot.status, snapshot.fills, snapshot.total_in, snapshot.total_out
                )
            })
            .await?;
        print_json(&state)
    }

    async fn execute_eligibility(&self, mint: &str, settlement_mint: Option<&str>) -> Result<()> {
        let mint = parse_pubkey_arg("mint", mint)?;
        let settlement = settlement_mint.map(|m| parse_pubkey_arg("settlement mint", m)).transpose()?;
        let eligibility = self.resolver()?.check_eligibility(&mint, settlement.as_ref()).await?;
        print_json(&eligibility)
    }

    async fn execute_redeemable(&self, owner: Option<&str>) -> Result<()> {
        let owner = self.owner_or_wallet(owner)?;
        let positions = self.resolver()?.get_redeemable_positions(&owner).await?;
        print_json(&positions)
    }

    async fn execute_redeem(&self, mint: &str, amount: Option<u64>, settlement_mint: Option<&str>) -> Result<()> {
        let mint = parse_pubkey_arg("mint", mint)?;
        let settlement = self.settlement_mint(settlement_mint)?;
        let wallet = self.wallet()?;

        let amount = match amount {
            Some(amount) => amount,
            None => {
                let held: u64 = self
                    .wallet_service()?
                    .token_holdings(&wallet.address())
                    .await?
                    .iter()
                    .filter(|h| h.mint == mint)
                    .map(|h| h.amount.value)
                    .max()
                    .unwrap_or(0);
                if held == 0 {
                    return Err(anyhow!("wallet holds no {}", mint));
                }
                held
            }
        };

        let result = self
            .resolver()?
            .redeem(&mint, &settlement, amount, wallet.as_ref(), &self.config.monitor_options())
            .await?;
        print_json(&result)?;
        match &result.failure {
            Some(failure) if !result.success => Err(anyhow!(failure.user_message())),
            _ => Ok(()),
        }
    }

    async fn execute_balance(&self, owner: Option<&str>, mint: Option<&str>) -> Result<()> {
        let owner = self.owner_or_wallet(owner)?;
        let service = self.wallet_service()?;
        match mint {
            None => {
                let balance = service.sol_balance(&owner).await?;
                print_json(&json!({ "owner": owner.to_string(), "sol": balance.to_ui_string(), "lamports": balance.value }))
            }
            Some(mint) => {
                let mint = parse_pubkey_arg("mint", mint)?;
                let holdings: Vec<_> = service
                    .token_holdings(&owner)
                    .await?
                    .into_iter()
                    .filter(|h| h.mint == mint)
                    .collect();
                if holdings.is_empty() {
                    warn!("No token account for {} held by {}", mint, owner);
                }
                print_json(&holdings)
            }
        }
    }

    async fn execute_transfer(&self, recipient: &str, amount: &str, mint: Option<&str>) -> Result<()> {
        let recipient = parse_pubkey_arg("recipient", recipient)?;
        let wallet = self.wallet()?;
        let service = self.wallet_service()?;
        let schedule = self.config.monitor_options().sync;

        let receipt = match mint {
            None => {
                let lamports = Amount::parse_ui(amount, SOL_DECIMALS).context("parse SOL amount")?;
                service.transfer_sol(wallet.as_ref(), &recipient, lamports.value, schedule).await?
            }
            Some(mint) => {
                let mint = parse_pubkey_arg("mint", mint)?;
                service
                    .transfer_token(wallet.as_ref(), &recipient, &mint, amount, schedule)
                    .await?
            }
        };
        print_json(&receipt)?;
        if receipt.confirmation.is_confirmed() {
            Ok(())
        } else {
            Err(anyhow!("transfer {} not confirmed", receipt.signature))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::Slippage;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("outcome-settle").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_trade_args_use_config_defaults() {
        let a = Pubkey::new_unique().to_string();
        let b = Pubkey::new_unique().to_string();
        let cli = parse(&["trade", "--input-mint", &a, "--output-mint", &b, "--ui-amount", "10"]);
        let Commands::Trade(args) = cli.command else {
            panic!("expected trade");
        };

        let mut config = Config::default();
        config.trade.route = "intent".to_string();
        let request = TradeRequest::from_tool_args(args.to_tool_args(&config)).unwrap();
        assert_eq!(request.quote.amount, 10_000_000);
        assert_eq!(request.quote.slippage, Slippage::Auto);
        assert_eq!(request.route, TradeRoute::Declarative);
    }

    #[test]
    fn test_explicit_slippage_and_route() {
        let a = Pubkey::new_unique().to_string();
        let b = Pubkey::new_unique().to_string();
        let cli = parse(&[
            "quote", "--input-mint", &a, "--output-mint", &b, "--amount", "500", "--slippage", "200", "--route",
            "imperative",
        ]);
        let Commands::Quote(args) = cli.command else {
            panic!("expected quote");
        };
        let request = TradeRequest::from_tool_args(args.to_tool_args(&Config::default())).unwrap();
        assert_eq!(request.quote.amount, 500);
        assert_eq!(request.quote.slippage, Slippage::Bps(200));
        assert_eq!(request.route, TradeRoute::Imperative);
    }

    #[test]
    fn test_global_overrides() {
        let cli = parse(&["--rpc-url", "http://localhost:8899", "balance", "--wallet", "abc"]);
        let mut config = Config::default();
        cli.global.apply(&mut config);
        assert_eq!(config.rpc.url, "http://localhost:8899");
        assert_eq!(config.wallet.keypair.as_deref(), Some("abc"));
        assert_eq!(config.api.trade_url, crate::exchanges::api_clients::DEFAULT_TRADE_API_URL);
    }
}
