// 💳 Account Entity - Balance and overdraft owned by one Person
//
// Identity: internal UUID (foreign key for operations) plus the external
// bank account number "CAMBYZEBANK-########".
// Values: balance and overdraft, mutated only by the ledger engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ACCOUNT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Everyday bank account, may be granted an overdraft
    Bank,

    /// Savings account, capped balance and no overdraft
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Bank => "bank",
            AccountType::Savings => "savings",
        }
    }

    /// Human label printed on statements
    pub fn label(&self) -> &'static str {
        match self {
            AccountType::Bank => "Regular bank account",
            AccountType::Savings => "Savings account",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" => Ok(AccountType::Bank),
            "savings" => Ok(AccountType::Savings),
            other => Err(format!("Unknown account type: {}", other)),
        }
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Internal identity (UUID), never exposed as the BAN
    pub id: String,

    /// Owner reference (Person.id)
    pub person_id: String,

    /// External reference, e.g. "CAMBYZEBANK-00000002"
    pub bank_account_number: String,

    pub account_type: AccountType,

    pub balance: Decimal,

    /// Negative-balance headroom, zero until an overdraft is granted
    pub overdraft: Decimal,
}

impl Account {
    /// Open a new account with zero balance and zero overdraft
    pub fn new(person_id: String, bank_account_number: String, account_type: AccountType) -> Self {
        Account {
            id: uuid::Uuid::new_v4().to_string(),
            person_id,
            bank_account_number,
            account_type,
            balance: Decimal::ZERO,
            overdraft: Decimal::ZERO,
        }
    }

    /// Money that can still be withdrawn (balance + overdraft).
    /// `None` when the sum does not fit in a `Decimal`.
    pub fn available(&self) -> Option<Decimal> {
        self.balance.checked_add(self.overdraft)
    }

    pub fn is_savings(&self) -> bool {
        self.account_type == AccountType::Savings
    }

    pub fn has_overdraft(&self) -> bool {
        self.overdraft > Decimal::ZERO
    }

    pub fn is_overdrawn(&self) -> bool {
        self.balance < Decimal::ZERO
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) balance {:.2}",
            self.bank_account_number, self.account_type, self.balance
        )?;
        if self.has_overdraft() {
            write!(f, " overdraft {:.2}", self.overdraft)?;
        }
        if self.is_overdrawn() {
            write!(f, " [overdrawn]")?;
        }
        Ok(())
    }
}
