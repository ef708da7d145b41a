// ⚙️ Configuration - Ledger rules and runtime settings
//
// Ledger rules are fixed business constants with defaults; the runtime
// settings (database path, bind address) come from the environment.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix every bank account number starts with
pub const BAN_PREFIX: &str = "CAMBYZEBANK";

/// Prefix of person references
pub const PERSON_PREFIX: &str = "CLI";

/// Counter key used to mint bank account numbers
pub const BAN_COUNTER: &str = "bank_account_number";

/// Counter key used to mint person references
pub const PERSON_COUNTER: &str = "person";

pub const DEFAULT_SAVINGS_LIMIT: Decimal = dec!(5000);
pub const DEFAULT_OVERDRAFT_AMOUNT: Decimal = dec!(1500);

// ============================================================================
// LEDGER RULES
// ============================================================================

/// Rules the ledger engine enforces on every money movement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerRules {
    /// Ceiling a savings account balance may never exceed via deposit
    pub savings_limit: Decimal,

    /// Overdraft granted to regular accounts (set, never added)
    pub overdraft_amount: Decimal,

    /// Earliest accepted operation date (inclusive)
    pub min_operation_date: NaiveDate,

    /// Latest accepted operation date (inclusive)
    pub max_operation_date: NaiveDate,
}

impl LedgerRules {
    pub fn accepts_date(&self, date: NaiveDate) -> bool {
        date >= self.min_operation_date && date <= self.max_operation_date
    }
}

impl Default for LedgerRules {
    fn default() -> Self {
        LedgerRules {
            savings_limit: DEFAULT_SAVINGS_LIMIT,
            overdraft_amount: DEFAULT_OVERDRAFT_AMOUNT,
            min_operation_date: ymd(1900, 1, 1),
            max_operation_date: ymd(2999, 12, 31),
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

// ============================================================================
// BANK CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct BankConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    pub rules: LedgerRules,
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            db_path: PathBuf::from("cambyze_bank.db"),
            bind_addr: "0.0.0.0:3000".to_string(),
            rules: LedgerRules::default(),
        }
    }
}

impl BankConfig {
    /// Load configuration from `CAMBYZE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, test maps)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BankConfig::default();

        if let Some(path) = lookup("CAMBYZE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("CAMBYZE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("CAMBYZE_SAVINGS_LIMIT") {
            config.rules.savings_limit = Decimal::from_str(raw.trim())
                .with_context(|| format!("Invalid CAMBYZE_SAVINGS_LIMIT: {}", raw))?;
        }
        if let Some(raw) = lookup("CAMBYZE_OVERDRAFT_AMOUNT") {
            config.rules.overdraft_amount = Decimal::from_str(raw.trim())
                .with_context(|| format!("Invalid CAMBYZE_OVERDRAFT_AMOUNT: {}", raw))?;
        }

        Ok(config)
    }
}
