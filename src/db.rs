// SQLite persistence adapter
//
// Tables: persons, accounts, operations, counters.
// Money is stored as TEXT so decimals round-trip exactly; dates are ISO
// TEXT ("YYYY-MM-DD"). Reference columns compare case-insensitively.

use crate::entities::{Account, AccountType, Operation, OperationType, Person};
use crate::sequence::SequenceGenerator;
use crate::store::{AccountStore, OperationStore, PersonStore};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS persons (
            id TEXT PRIMARY KEY COLLATE NOCASE,
            name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            email TEXT NOT NULL COLLATE NOCASE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL COLLATE NOCASE,
            bank_account_number TEXT UNIQUE NOT NULL COLLATE NOCASE,
            account_type TEXT NOT NULL,
            balance TEXT NOT NULL,
            overdraft TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Append-only ledger entries
    conn.execute(
        "CREATE TABLE IF NOT EXISTS operations (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            operation_date TEXT NOT NULL,
            operation_type TEXT NOT NULL,
            amount TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS counters (
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_person ON accounts(person_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_operations_account ON operations(account_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_persons_email ON persons(email)",
        [],
    )?;

    Ok(())
}

/// Run `f` against a store bound to one SQLite transaction.
/// Commits on success; any error rolls everything back.
pub fn in_transaction<T, E, F>(conn: &Connection, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&SqliteStore<'_>) -> std::result::Result<T, E>,
    E: From<anyhow::Error>,
{
    let tx = conn
        .unchecked_transaction()
        .context("Failed to begin transaction")?;
    let value = f(&SqliteStore::new(&tx))?;
    tx.commit().context("Failed to commit transaction")?;
    Ok(value)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, format!("{}: {}", raw, e)))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| conversion_error(idx, format!("{}: {}", raw, e)))
}

fn parsed_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        first_name: row.get(2)?,
        email: row.get(3)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        person_id: row.get(1)?,
        bank_account_number: row.get(2)?,
        account_type: parsed_column::<AccountType>(row, 3)?,
        balance: decimal_column(row, 4)?,
        overdraft: decimal_column(row, 5)?,
    })
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: row.get(0)?,
        account_id: row.get(1)?,
        date: date_column(row, 2)?,
        operation_type: parsed_column::<OperationType>(row, 3)?,
        amount: decimal_column(row, 4)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, person_id, bank_account_number, account_type, balance, overdraft";

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Store bound to a borrowed connection (or transaction)
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }

    pub fn operation_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl PersonStore for SqliteStore<'_> {
    fn save_person(&self, person: &Person) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO persons (id, name, first_name, email) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    first_name = excluded.first_name,
                    email = excluded.email",
                params![person.id, person.name, person.first_name, person.email],
            )
            .with_context(|| format!("Failed to save person {}", person.id))?;
        Ok(())
    }

    fn find_person(&self, id: &str) -> Result<Option<Person>> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name, first_name, email FROM persons WHERE id = ?1",
                params![id],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn find_persons_by_email(&self, email: &str) -> Result<Vec<Person>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, first_name, email FROM persons WHERE email = ?1 ORDER BY id",
        )?;
        let persons = stmt
            .query_map(params![email.trim()], person_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(persons)
    }
}

impl AccountStore for SqliteStore<'_> {
    fn save_account(&self, account: &Account) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO accounts (
                    id, person_id, bank_account_number, account_type, balance, overdraft
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    account_type = excluded.account_type,
                    balance = excluded.balance,
                    overdraft = excluded.overdraft",
                params![
                    account.id,
                    account.person_id,
                    account.bank_account_number,
                    account.account_type.as_str(),
                    account.balance.to_string(),
                    account.overdraft.to_string(),
                ],
            )
            .with_context(|| format!("Failed to save account {}", account.bank_account_number))?;
        Ok(())
    }

    fn find_account_by_ban(&self, ban: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                &format!("SELECT {} FROM accounts WHERE bank_account_number = ?1", ACCOUNT_COLUMNS),
                params![ban],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    fn find_accounts_by_person(&self, person_id: &str) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE person_id = ?1 ORDER BY bank_account_number",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![person_id], account_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }
}

impl OperationStore for SqliteStore<'_> {
    fn save_operation(&self, operation: &Operation) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO operations (id, account_id, operation_date, operation_type, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    operation.id,
                    operation.account_id,
                    operation.date.format("%Y-%m-%d").to_string(),
                    operation.operation_type.as_str(),
                    operation.amount.to_string(),
                ],
            )
            .with_context(|| format!("Failed to save operation {}", operation.id))?;
        Ok(())
    }

    fn find_operations_by_account(&self, account_id: &str) -> Result<Vec<Operation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, operation_date, operation_type, amount
             FROM operations
             WHERE account_id = ?1",
        )?;
        let operations = stmt
            .query_map(params![account_id], operation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(operations)
    }
}

impl SequenceGenerator for SqliteStore<'_> {
    fn next_sequence(&self, key: &str) -> Result<u64> {
        let seq: i64 = self
            .conn
            .query_row(
                "INSERT INTO counters (id, seq) VALUES (?1, 1)
                 ON CONFLICT(id) DO UPDATE SET seq = seq + 1
                 RETURNING seq",
                params![key],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to generate sequence for key: {}", key))?;
        u64::try_from(seq).with_context(|| format!("Negative sequence {} for key: {}", seq, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn test_account() -> Account {
        Account::new(
            "CLI-00000001".to_string(),
            "CAMBYZEBANK-00000001".to_string(),
            AccountType::Savings,
        )
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_connection();
        setup_database(&conn).unwrap();
        assert_eq!(SqliteStore::new(&conn).operation_count().unwrap(), 0);
    }

    #[test]
    fn test_counters_per_key() {
        let conn = test_connection();
        let store = SqliteStore::new(&conn);

        assert_eq!(store.next_sequence("person").unwrap(), 1);
        assert_eq!(store.next_sequence("person").unwrap(), 2);
        assert_eq!(store.next_sequence("bank_account_number").unwrap(), 1);
        assert_eq!(store.next_sequence("person").unwrap(), 3);
    }

    #[test]
    fn test_account_round_trip_keeps_decimals() {
        let conn = test_connection();
        let store = SqliteStore::new(&conn);
        let mut account = test_account();
        account.balance = dec!(4500.10);
        store.save_account(&account).unwrap();

        account.balance = dec!(-1300.05);
        account.overdraft = dec!(1500);
        store.save_account(&account).unwrap();

        let found = store.find_account_by_ban("cambyzebank-00000001").unwrap().unwrap();
        assert_eq!(found, account);
        assert_eq!(found.balance, dec!(-1300.05));
        assert_eq!(store.find_accounts_by_person("CLI-00000001").unwrap().len(), 1);
        assert!(store.find_account_by_ban("CAMBYZEBANK-00000009").unwrap().is_none());
    }

    #[test]
    fn test_operations_by_account() {
        let conn = test_connection();
        let store = SqliteStore::new(&conn);
        let account = test_account();
        store.save_account(&account).unwrap();

        let op = Operation::new(
            account.id.clone(),
            NaiveDate::from_ymd_opt(2024, 12, 24).unwrap(),
            OperationType::Withdraw,
            dec!(18.25),
        );
        store.save_operation(&op).unwrap();

        // Append-only: same id twice is refused
        assert!(store.save_operation(&op).is_err());

        let ops = store.find_operations_by_account(&account.id).unwrap();
        assert_eq!(ops, vec![op]);
    }

    #[test]
    fn test_persons_lookup() {
        let conn = test_connection();
        let store = SqliteStore::new(&conn);
        let person = Person::new(
            "CLI-00000001".to_string(),
            "Doe".to_string(),
            "Jane".to_string(),
            "jane@example.com".to_string(),
        );
        store.save_person(&person).unwrap();

        assert_eq!(store.find_person("cli-00000001").unwrap(), Some(person.clone()));
        assert_eq!(store.find_persons_by_email("JANE@example.com").unwrap(), vec![person]);
        assert!(store.find_persons_by_email("nobody@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let conn = test_connection();

        let result: Result<()> = in_transaction(&conn, |store| {
            store.save_account(&test_account())?;
            Err(anyhow::anyhow!("abort"))
        });
        assert!(result.is_err());
        assert!(SqliteStore::new(&conn)
            .find_account_by_ban("CAMBYZEBANK-00000001")
            .unwrap()
            .is_none());

        let committed: Result<()> = in_transaction(&conn, |store| store.save_account(&test_account()));
        assert!(committed.is_ok());
        assert!(SqliteStore::new(&conn)
            .find_account_by_ban("CAMBYZEBANK-00000001")
            .unwrap()
            .is_some());
    }
}
