use crate::domain::money::Balance;
use crate::error::{Result, VendingError};
use chrono::Duration;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// When a wallet-paid order takes money out of the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WalletCharge {
    /// Debit while the order is created; a failed debit aborts the order.
    OnCreate,
    /// Debit once the hardware confirms delivery.
    OnCompletion,
}

/// Tunables shared by every service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub wallet_cap: Balance,
    pub code_ttl: Duration,
    pub sweep_interval: std::time::Duration,
    pub lane_count: u8,
    pub carrier_capacity: usize,
    pub wallet_charge: WalletCharge,
    pub retry_attempts: u32,
    pub low_stock_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallet_cap: Balance::new(Decimal::from(5000)),
            code_ttl: Duration::minutes(5),
            sweep_interval: std::time::Duration::from_secs(15),
            lane_count: 4,
            carrier_capacity: 10,
            wallet_charge: WalletCharge::OnCompletion,
            retry_attempts: 5,
            low_stock_threshold: 5,
        }
    }
}

/// Command line and environment overrides for [`Settings`].
#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// Maximum wallet balance.
    #[arg(long, global = true, env = "VENDING_WALLET_CAP", default_value = "5000")]
    pub wallet_cap: Decimal,

    /// Lifetime of a payment code, in seconds.
    #[arg(long, global = true, env = "VENDING_CODE_TTL_SECS", default_value_t = 300)]
    pub code_ttl_secs: u64,

    /// How often lapsed payment codes are expired, in seconds.
    #[arg(long, global = true, env = "VENDING_SWEEP_INTERVAL_SECS", default_value_t = 15)]
    pub sweep_interval_secs: u64,

    /// Number of physical lanes per machine.
    #[arg(long, global = true, env = "VENDING_LANE_COUNT", default_value_t = 4)]
    pub lane_count: u8,

    /// Capacity given to carriers created without an explicit one.
    #[arg(long, global = true, env = "VENDING_CARRIER_CAPACITY", default_value_t = 10)]
    pub carrier_capacity: usize,

    #[arg(long, global = true, env = "VENDING_WALLET_CHARGE", value_enum, default_value = "on-completion")]
    pub wallet_charge: WalletCharge,

    /// Attempts for an operation that keeps losing compare-and-swap races.
    #[arg(long, global = true, env = "VENDING_RETRY_ATTEMPTS", default_value_t = 5)]
    pub retry_attempts: u32,
}

impl SettingsArgs {
    pub fn into_settings(self) -> Result<Settings> {
        if self.wallet_cap <= Decimal::ZERO {
            return Err(VendingError::ValidationError(
                "wallet cap must be positive".to_string(),
            ));
        }
        if self.lane_count == 0 || self.carrier_capacity == 0 || self.retry_attempts == 0 {
            return Err(VendingError::ValidationError(
                "lane count, carrier capacity and retry attempts must be at least 1".to_string(),
            ));
        }
        let code_ttl = i64::try_from(self.code_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| VendingError::ValidationError("code TTL is out of range".to_string()))?;

        Ok(Settings {
            wallet_cap: Balance::new(self.wallet_cap),
            code_ttl,
            sweep_interval: std::time::Duration::from_secs(self.sweep_interval_secs.max(1)),
            lane_count: self.lane_count,
            carrier_capacity: self.carrier_capacity,
            wallet_charge: self.wallet_charge,
            retry_attempts: self.retry_attempts,
            ..Settings::default()
        })
    }
}
