// 🗄️ Stores - Narrow persistence contract consumed by the ledger
//
// Account Store: lookup by reference, save (create or update).
// Operation Store: save (append-only), list by account id.
//
// `MemoryStore` keeps everything in RwLock-guarded vectors; the SQLite
// adapter lives in `db.rs`.

use crate::entities::{Account, Operation, Person};
use crate::sequence::{MemorySequence, SequenceGenerator};
use anyhow::{anyhow, Result};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub trait PersonStore {
    fn save_person(&self, person: &Person) -> Result<()>;

    /// Case-insensitive lookup by reference
    fn find_person(&self, id: &str) -> Result<Option<Person>>;

    fn find_persons_by_email(&self, email: &str) -> Result<Vec<Person>>;
}

pub trait AccountStore {
    /// Create or update
    fn save_account(&self, account: &Account) -> Result<()>;

    /// Case-insensitive lookup by bank account number
    fn find_account_by_ban(&self, ban: &str) -> Result<Option<Account>>;

    fn find_accounts_by_person(&self, person_id: &str) -> Result<Vec<Account>>;
}

pub trait OperationStore {
    /// Append only, operations are never updated
    fn save_operation(&self, operation: &Operation) -> Result<()>;

    /// All operations of an account, order irrelevant
    fn find_operations_by_account(&self, account_id: &str) -> Result<Vec<Operation>>;
}

/// Everything the banking façade needs from persistence
pub trait BankStore: PersonStore + AccountStore + OperationStore + SequenceGenerator {}

impl<T> BankStore for T where T: PersonStore + AccountStore + OperationStore + SequenceGenerator {}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    persons: RwLock<Vec<Person>>,
    accounts: RwLock<Vec<Account>>,
    operations: RwLock<Vec<Operation>>,
    sequence: MemorySequence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored operations across all accounts
    pub fn operation_count(&self) -> Result<usize> {
        Ok(read(&self.operations)?.len())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("Memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("Memory store lock poisoned"))
}

impl PersonStore for MemoryStore {
    fn save_person(&self, person: &Person) -> Result<()> {
        let mut persons = write(&self.persons)?;
        match persons.iter_mut().find(|p| p.id == person.id) {
            Some(existing) => *existing = person.clone(),
            None => persons.push(person.clone()),
        }
        Ok(())
    }

    fn find_person(&self, id: &str) -> Result<Option<Person>> {
        let persons = read(&self.persons)?;
        Ok(persons.iter().find(|p| p.id.eq_ignore_ascii_case(id)).cloned())
    }

    fn find_persons_by_email(&self, email: &str) -> Result<Vec<Person>> {
        let persons = read(&self.persons)?;
        Ok(persons.iter().filter(|p| p.has_email(email)).cloned().collect())
    }
}

impl AccountStore for MemoryStore {
    fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = write(&self.accounts)?;
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => accounts.push(account.clone()),
        }
        Ok(())
    }

    fn find_account_by_ban(&self, ban: &str) -> Result<Option<Account>> {
        let accounts = read(&self.accounts)?;
        Ok(accounts
            .iter()
            .find(|a| a.bank_account_number.eq_ignore_ascii_case(ban))
            .cloned())
    }

    fn find_accounts_by_person(&self, person_id: &str) -> Result<Vec<Account>> {
        let accounts = read(&self.accounts)?;
        Ok(accounts
            .iter()
            .filter(|a| a.person_id.eq_ignore_ascii_case(person_id))
            .cloned()
            .collect())
    }
}

impl OperationStore for MemoryStore {
    fn save_operation(&self, operation: &Operation) -> Result<()> {
        let mut operations = write(&self.operations)?;
        if operations.iter().any(|op| op.id == operation.id) {
            return Err(anyhow!("Operation {} already recorded", operation.id));
        }
        operations.push(operation.clone());
        Ok(())
    }

    fn find_operations_by_account(&self, account_id: &str) -> Result<Vec<Operation>> {
        let operations = read(&self.operations)?;
        Ok(operations
            .iter()
            .filter(|op| op.account_id == account_id)
            .cloned()
            .collect())
    }
}

impl SequenceGenerator for MemoryStore {
    fn next_sequence(&self, key: &str) -> Result<u64> {
        self.sequence.next_sequence(key)
    }
}
