// 🧾 Operation Entity - Immutable ledger entry
//
// Append-only: once saved an operation is never updated or deleted.
// The amount is always stored positive; the type carries the sign.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Deposit,
    Withdraw,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
        }
    }

    /// Human label printed on statements
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::Deposit => "Deposit",
            OperationType::Withdraw => "Withdraw",
        }
    }

    /// Apply the operation's sign to a positive amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            OperationType::Deposit => amount,
            OperationType::Withdraw => -amount,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match only: "deposit" or "withdraw"
impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(OperationType::Deposit),
            "withdraw" => Ok(OperationType::Withdraw),
            other => Err(format!("Unknown operation type: {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,

    /// Foreign key to Account.id
    pub account_id: String,

    pub date: NaiveDate,

    pub operation_type: OperationType,

    /// Strictly positive, rounded to 2 decimals
    pub amount: Decimal,
}

impl Operation {
    pub fn new(
        account_id: String,
        date: NaiveDate,
        operation_type: OperationType,
        amount: Decimal,
    ) -> Self {
        Operation {
            id: uuid::Uuid::new_v4().to_string(),
            account_id,
            date,
            operation_type,
            amount,
        }
    }

    /// Effect of this operation on the balance
    pub fn signed_amount(&self) -> Decimal {
        self.operation_type.signed(self.amount)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.id, self.operation_type, self.date, self.amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_signed_amount() {
        let deposit = Operation::new("acc".to_string(), date(2024, 5, 1), OperationType::Deposit, dec!(120.26));
        let withdraw = Operation::new("acc".to_string(), date(2024, 5, 2), OperationType::Withdraw, dec!(20.26));

        assert_eq!(deposit.signed_amount(), dec!(120.26));
        assert_eq!(withdraw.signed_amount(), dec!(-20.26));
    }

    #[test]
    fn test_operation_type_parse_is_exact() {
        assert_eq!("deposit".parse::<OperationType>(), Ok(OperationType::Deposit));
        assert_eq!("withdraw".parse::<OperationType>(), Ok(OperationType::Withdraw));
        assert!("Deposit".parse::<OperationType>().is_err());
        assert!("transfer".parse::<OperationType>().is_err());
        assert!("".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_operation_type_labels() {
        assert_eq!(OperationType::Deposit.label(), "Deposit");
        assert_eq!(OperationType::Withdraw.label(), "Withdraw");
    }
}
