// ⚖️ Ledger Engine - Money-movement invariants
//
// Every deposit, withdrawal and overdraft grant passes through here.
// Checks run before any mutation; work happens on a staged copy of the
// account, so a rejection leaves both the caller's account and the store
// exactly as they were.
//
//   deposit:  balance += amount
//   withdraw: balance += -amount   (only if balance + overdraft - amount >= 0)

use crate::config::{LedgerRules, BAN_PREFIX};
use crate::entities::{Account, Operation, OperationType};
use crate::error::{BankError, BankResult};
use crate::store::{AccountStore, OperationStore};
use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, warn};

/// Round to 2 decimals, half-up
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Balance reconstructed from the operation trail (starting at zero)
pub fn replay_balance(operations: &[Operation]) -> Decimal {
    operations.iter().map(Operation::signed_amount).sum()
}

/// `account.balance + delta`, or `InvalidAmount` when it leaves the
/// representable range
fn checked_balance(account: &Account, delta: Decimal) -> BankResult<Decimal> {
    account.balance.checked_add(delta).ok_or_else(|| {
        error!(
            "Operation not created because the balance of {} would overflow",
            account.bank_account_number
        );
        BankError::InvalidAmount(format!("{} overflows the balance", delta))
    })
}

// ============================================================================
// LEDGER ENGINE
// ============================================================================

pub struct LedgerEngine<'a, S: ?Sized> {
    store: &'a S,
    rules: LedgerRules,
}

impl<'a, S> LedgerEngine<'a, S>
where
    S: AccountStore + OperationStore + ?Sized,
{
    pub fn new(store: &'a S, rules: LedgerRules) -> Self {
        LedgerEngine { store, rules }
    }

    /// Validate an operation request and apply it to `account` in memory.
    ///
    /// Checks, first failure wins:
    /// 1. account present with a `CAMBYZEBANK` reference → `InvalidAccount`
    /// 2. date present and inside the operational window → `InvalidDate`
    /// 3. type exactly "deposit" or "withdraw" → `InvalidOperationType`
    /// 4. amount present and > 0 after rounding → `InvalidAmount`
    ///
    /// The returned operation is not persisted.
    pub fn prepare_operation(
        &self,
        account: Option<&mut Account>,
        date: Option<NaiveDate>,
        operation_type: &str,
        amount: Option<Decimal>,
    ) -> BankResult<Operation> {
        let account = match account {
            Some(account)
                if !account.id.is_empty()
                    && account.bank_account_number.starts_with(BAN_PREFIX) =>
            {
                account
            }
            Some(account) => {
                error!("Operation not created because the bank account is invalid: {:?}", account.bank_account_number);
                return Err(BankError::InvalidAccount(account.bank_account_number.clone()));
            }
            None => {
                error!("Operation not created because the bank account is missing");
                return Err(BankError::InvalidAccount("missing account".to_string()));
            }
        };

        let date = match date {
            Some(date) if self.rules.accepts_date(date) => date,
            other => {
                error!("Operation not created because the date is invalid: {:?}", other);
                return Err(BankError::InvalidDate(match other {
                    Some(date) => date.to_string(),
                    None => "missing date".to_string(),
                }));
            }
        };

        let operation_type: OperationType = operation_type.parse().map_err(|e: String| {
            error!("Operation not created because the operation type is wrong: {}", e);
            BankError::InvalidOperationType(e)
        })?;

        let amount = match amount.map(round_amount) {
            Some(amount) if amount > Decimal::ZERO => amount,
            other => {
                error!("Operation not created because the amount is invalid: {:?}", other);
                return Err(BankError::InvalidAmount(match other {
                    Some(amount) => amount.to_string(),
                    None => "missing amount".to_string(),
                }));
            }
        };

        account.balance = checked_balance(account, operation_type.signed(amount))?;

        Ok(Operation::new(account.id.clone(), date, operation_type, amount))
    }

    /// Deposit `amount` dated `date`; returns the reloaded balance
    pub fn apply_deposit(
        &self,
        account: &mut Account,
        amount: Decimal,
        date: NaiveDate,
    ) -> BankResult<Decimal> {
        let amount = round_amount(amount);
        let new_balance = checked_balance(account, amount)?;

        if account.is_savings() && new_balance > self.rules.savings_limit {
            warn!(
                "The limit of the savings account is reached for the BAN: {}",
                account.bank_account_number
            );
            return Err(BankError::SavingsLimitReached {
                new_balance,
                limit: self.rules.savings_limit,
            });
        }

        self.commit(account, date, OperationType::Deposit, amount)
    }

    /// Withdraw `amount` dated `date`; returns the reloaded balance
    pub fn apply_withdrawal(
        &self,
        account: &mut Account,
        amount: Decimal,
        date: NaiveDate,
    ) -> BankResult<Decimal> {
        let amount = round_amount(amount);

        // balance + overdraft - amount >= 0, compared without subtracting.
        // Overdraft is never negative, so an overflowing sum is plenty.
        if let Some(available) = account.available() {
            if available < amount {
                warn!(
                    "Not enough money available for the withdraw for the BAN: {}",
                    account.bank_account_number
                );
                return Err(BankError::InsufficientBalance {
                    requested: amount,
                    available,
                });
            }
        }

        self.commit(account, date, OperationType::Withdraw, amount)
    }

    /// Set the overdraft of a regular account to the configured amount
    pub fn grant_overdraft(&self, account: &mut Account) -> BankResult<Decimal> {
        if account.is_savings() {
            warn!("Overdraft forbidden for savings account {}", account.bank_account_number);
            return Err(BankError::OverdraftForbiddenForSavings(
                account.bank_account_number.clone(),
            ));
        }

        let mut staged = account.clone();
        staged.overdraft = self.rules.overdraft_amount;
        self.store
            .save_account(&staged)
            .with_context(|| format!("Failed to save overdraft for {}", staged.bank_account_number))?;

        debug!(
            "New overdraft amount: {} for the BAN: {}",
            staged.overdraft, staged.bank_account_number
        );
        *account = staged;
        Ok(account.overdraft)
    }

    /// Record an operation without the deposit/withdraw business checks
    /// (validation still applies). Used to seed history.
    pub fn record_operation(
        &self,
        account: &mut Account,
        date: NaiveDate,
        operation_type: OperationType,
        amount: Decimal,
    ) -> BankResult<Decimal> {
        self.commit(account, date, operation_type, amount)
    }

    fn commit(
        &self,
        account: &mut Account,
        date: NaiveDate,
        operation_type: OperationType,
        amount: Decimal,
    ) -> BankResult<Decimal> {
        let mut staged = account.clone();
        let operation = self.prepare_operation(
            Some(&mut staged),
            Some(date),
            operation_type.as_str(),
            Some(amount),
        )?;

        self.store
            .save_operation(&operation)
            .with_context(|| format!("Failed to save operation for {}", staged.bank_account_number))?;
        self.store
            .save_account(&staged)
            .with_context(|| format!("Failed to save account {}", staged.bank_account_number))?;

        let reloaded = self
            .store
            .find_account_by_ban(&staged.bank_account_number)
            .with_context(|| format!("Failed to reload account {}", staged.bank_account_number))?
            .ok_or_else(|| {
                BankError::technical(format!(
                    "Account {} vanished after saving",
                    staged.bank_account_number
                ))
            })?;

        debug!(
            "The {} is ok for the BAN: {} and the new balance is {}",
            operation_type, reloaded.bank_account_number, reloaded.balance
        );
        *account = reloaded;
        Ok(account.balance)
    }
}
