// 🚫 Banking Errors - Functional rejections vs technical failures
//
// Functional errors are caller-correctable and always leave the ledger
// untouched. Technical errors wrap whatever the storage adapter raised.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR KIND (closed enumeration)
// ============================================================================

/// Kind of a banking error, without its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAccount,
    InvalidAmount,
    InvalidDate,
    InvalidOperationType,
    InsufficientBalance,
    SavingsLimitReached,
    OverdraftForbiddenForSavings,
    AccountNotFound,
    TechnicalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAccount => "invalid_account",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InvalidDate => "invalid_date",
            ErrorKind::InvalidOperationType => "invalid_operation_type",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::SavingsLimitReached => "savings_limit_reached",
            ErrorKind::OverdraftForbiddenForSavings => "overdraft_forbidden_for_savings",
            ErrorKind::AccountNotFound => "account_not_found",
            ErrorKind::TechnicalError => "technical_error",
        }
    }
}

// ============================================================================
// BANK ERROR
// ============================================================================

#[derive(Debug, Error)]
pub enum BankError {
    #[error("The bank account is invalid: {0}")]
    InvalidAccount(String),

    #[error("The amount is invalid: {0}")]
    InvalidAmount(String),

    #[error("The date is invalid: {0}")]
    InvalidDate(String),

    #[error("The operation type is invalid: {0}")]
    InvalidOperationType(String),

    #[error("No sufficient balance for the operation: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("The limit of the savings account is reached: balance would be {new_balance}, limit {limit}")]
    SavingsLimitReached { new_balance: Decimal, limit: Decimal },

    #[error("Overdraft is forbidden for savings account {0}")]
    OverdraftForbiddenForSavings(String),

    #[error("The bank account does not exist: {0}")]
    AccountNotFound(String),

    #[error("Technical error: {0:#}")]
    Technical(#[from] anyhow::Error),
}

pub type BankResult<T> = Result<T, BankError>;

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::InvalidAccount(_) => ErrorKind::InvalidAccount,
            BankError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            BankError::InvalidDate(_) => ErrorKind::InvalidDate,
            BankError::InvalidOperationType(_) => ErrorKind::InvalidOperationType,
            BankError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            BankError::SavingsLimitReached { .. } => ErrorKind::SavingsLimitReached,
            BankError::OverdraftForbiddenForSavings(_) => ErrorKind::OverdraftForbiddenForSavings,
            BankError::AccountNotFound(_) => ErrorKind::AccountNotFound,
            BankError::Technical(_) => ErrorKind::TechnicalError,
        }
    }

    /// Caller-correctable rejection (everything except technical failures)
    pub fn is_functional(&self) -> bool {
        !matches!(self, BankError::Technical(_))
    }

    pub fn technical(message: impl Into<String>) -> Self {
        BankError::Technical(anyhow::anyhow!(message.into()))
    }
}
