// 📄 Statement Builder - Trailing one-month view of an account
//
// Window: operations dated strictly after (as_of - 1 calendar month).
// An operation dated exactly one month before `as_of` is excluded.
// Lines are ordered by date, most recent first.

use crate::entities::{Account, Operation};
use crate::error::{BankError, BankResult};
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// ============================================================================
// STATEMENT TYPES
// ============================================================================

/// One operation as printed on a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    /// ISO date, e.g. "2025-01-15"
    pub date: String,

    /// "Deposit" or "Withdraw"
    pub label: String,

    /// Signed: deposits positive, withdrawals negative
    pub amount: Decimal,
}

impl From<&Operation> for StatementLine {
    fn from(op: &Operation) -> Self {
        StatementLine {
            date: op.date.format("%Y-%m-%d").to_string(),
            label: op.operation_type.label().to_string(),
            amount: op.signed_amount(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub bank_account_number: String,

    /// "Regular bank account" or "Savings account"
    pub account_type: String,

    pub balance: Decimal,
    pub overdraft: Decimal,

    pub operations: Vec<StatementLine>,
}

impl Statement {
    pub fn total_deposits(&self) -> Decimal {
        self.operations
            .iter()
            .filter(|line| line.amount > Decimal::ZERO)
            .map(|line| line.amount)
            .sum()
    }

    pub fn total_withdrawals(&self) -> Decimal {
        self.operations
            .iter()
            .filter(|line| line.amount < Decimal::ZERO)
            .map(|line| -line.amount)
            .sum()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statement for the BAN: {}", self.bank_account_number)?;
        writeln!(f, "Type:      {}", self.account_type)?;
        writeln!(f, "Balance:   {:.2}", self.balance)?;
        writeln!(f, "Overdraft: {:.2}", self.overdraft)?;
        for line in &self.operations {
            writeln!(f, "  {}  {:<8}  {:>12.2}", line.date, line.label, line.amount)?;
        }
        Ok(())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Exclusive lower bound of the statement window
pub fn window_start(as_of: NaiveDate) -> NaiveDate {
    as_of
        .checked_sub_months(Months::new(1))
        .unwrap_or(NaiveDate::MIN)
}

/// Build the monthly statement of `account` as of `as_of`.
///
/// `operations` may come in any order and may include operations outside
/// the window. Returns `AccountNotFound` when no account was resolved.
pub fn build_monthly_statement(
    account: Option<&Account>,
    operations: &[Operation],
    as_of: NaiveDate,
) -> BankResult<Statement> {
    let account = account.ok_or_else(|| BankError::AccountNotFound("unresolved account".to_string()))?;
    let bound = window_start(as_of);

    let mut retained: Vec<&Operation> = operations.iter().filter(|op| op.date > bound).collect();
    debug!(
        "Statement window after {}: {} of {} operations retained",
        bound,
        retained.len(),
        operations.len()
    );

    retained.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(Statement {
        bank_account_number: account.bank_account_number.clone(),
        account_type: account.account_type.label().to_string(),
        balance: account.balance,
        overdraft: account.overdraft,
        operations: retained.into_iter().map(StatementLine::from).collect(),
    })
}
