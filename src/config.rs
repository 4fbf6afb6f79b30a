use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::Path};

use crate::application::clock::PollSchedule;
use crate::application::trade_executor::MonitorOptions;
use crate::domain::execution::TradeRoute;
use crate::domain::quote::Slippage;
use crate::exchanges::api_clients::{DEFAULT_METADATA_API_URL, DEFAULT_TRADE_API_URL};
use crate::infrastructure::blockchain::ConfirmationLevel;
use crate::shared::errors::ConfigError;
use crate::shared::types::USDC_MINT;

/// Upper bound on how long a fetched quote stays usable
pub const MAX_QUOTE_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcCfg {
    pub url: String,
    pub commitment: String,
}

impl Default for RpcCfg {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiCfg {
    pub trade_url: String,
    pub metadata_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ApiCfg {
    fn default() -> Self {
        Self {
            trade_url: DEFAULT_TRADE_API_URL.to_string(),
            metadata_url: DEFAULT_METADATA_API_URL.to_string(),
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

/// Keypair file, base58 secret or bare address (read-only)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WalletCfg {
    pub keypair: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradeCfg {
    /// `"auto"` or a bps ceiling
    pub slippage: String,
    pub route: String,
    pub quote_ttl_secs: u64,
}

impl Default for TradeCfg {
    fn default() -> Self {
        Self {
            slippage: "auto".to_string(),
            route: "order".to_string(),
            quote_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorCfg {
    pub sync_poll_interval_ms: u64,
    pub sync_max_attempts: u32,
    pub intent_poll_interval_ms: u64,
    pub intent_max_attempts: u32,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            sync_poll_interval_ms: 500,
            sync_max_attempts: 60,
            intent_poll_interval_ms: 2_000,
            intent_max_attempts: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementCfg {
    pub default_settlement_mint: String,
}

impl Default for SettlementCfg {
    fn default() -> Self {
        Self {
            default_settlement_mint: USDC_MINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcCfg,
    pub api: ApiCfg,
    pub wallet: WalletCfg,
    pub trade: TradeCfg,
    pub monitor: MonitorCfg,
    pub settlement: SettlementCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.commitment()?;
        self.slippage()?;
        self.route()?;
        self.settlement_mint()?;
        if self.trade.quote_ttl_secs == 0 || self.trade.quote_ttl_secs > MAX_QUOTE_TTL_SECS {
            return Err(invalid(
                "trade.quote_ttl_secs",
                format!("must be between 1 and {}", MAX_QUOTE_TTL_SECS),
            ));
        }
        if self.api.timeout_ms == 0 {
            return Err(invalid("api.timeout_ms", "must be positive"));
        }
        let m = &self.monitor;
        if m.sync_poll_interval_ms == 0 {
            return Err(invalid("monitor.sync_poll_interval_ms", "must be positive"));
        }
        if m.sync_max_attempts == 0 {
            return Err(invalid("monitor.sync_max_attempts", "must be positive"));
        }
        if m.intent_poll_interval_ms == 0 {
            return Err(invalid("monitor.intent_poll_interval_ms", "must be positive"));
        }
        if m.intent_max_attempts == 0 {
            return Err(invalid("monitor.intent_max_attempts", "must be positive"));
        }
        Ok(())
    }

    pub fn commitment(&self) -> Result<ConfirmationLevel, ConfigError> {
        ConfirmationLevel::parse(&self.rpc.commitment)
            .ok_or_else(|| invalid("rpc.commitment", format!("unknown level '{}'", self.rpc.commitment)))
    }

    pub fn slippage(&self) -> Result<Slippage, ConfigError> {
        self.trade.slippage.parse().map_err(|e: String| invalid("trade.slippage", e))
    }

    pub fn route(&self) -> Result<TradeRoute, ConfigError> {
        self.trade.route.parse().map_err(|e: String| invalid("trade.route", e))
    }

    pub fn settlement_mint(&self) -> Result<Pubkey, ConfigError> {
        Pubkey::from_str(&self.settlement.default_settlement_mint)
            .map_err(|e| invalid("settlement.default_settlement_mint", e.to_string()))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    /// Clamped to `MAX_QUOTE_TTL_SECS`
    pub fn quote_ttl(&self) -> chrono::Duration {
        let secs = self.trade.quote_ttl_secs.min(MAX_QUOTE_TTL_SECS) as i64;
        chrono::Duration::seconds(secs)
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        let m = &self.monitor;
        MonitorOptions {
            sync: PollSchedule::new(Duration::from_millis(m.sync_poll_interval_ms), m.sync_max_attempts),
            intent: PollSchedule::new(Duration::from_millis(m.intent_poll_interval_ms), m.intent_max_attempts),
            quote_ttl: self.quote_ttl(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
