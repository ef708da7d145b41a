// 🏦 Banking Services - Façade consumed by the CLI and the REST server
//
// Resolves references through the stores, hands accounts to the ledger
// engine or the statement builder, and returns typed errors. Holds no
// state of its own.

use crate::config::LedgerRules;
use crate::entities::{Account, AccountType, OperationType, Person};
use crate::error::{BankError, BankResult};
use crate::ledger::LedgerEngine;
use crate::sequence::{next_ban, next_person_id};
use crate::statement::{build_monthly_statement, Statement};
use crate::store::{AccountStore, BankStore, OperationStore, PersonStore};
use chrono::{Days, Local, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info};

/// Calendar date used for operations and statements
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct BankingService<'a, S: ?Sized> {
    store: &'a S,
    rules: LedgerRules,
}

impl<'a, S> BankingService<'a, S>
where
    S: BankStore + ?Sized,
{
    pub fn new(store: &'a S, rules: LedgerRules) -> Self {
        BankingService { store, rules }
    }

    fn ledger(&self) -> LedgerEngine<'a, S> {
        LedgerEngine::new(self.store, self.rules)
    }

    /// Resolve a BAN for a money movement; unknown accounts are invalid
    fn resolve_account(&self, ban: &str) -> BankResult<Account> {
        match self.store.find_account_by_ban(ban.trim())? {
            Some(account) => Ok(account),
            None => {
                error!("The bank account does not exist for the BAN: {}", ban);
                Err(BankError::InvalidAccount(ban.to_string()))
            }
        }
    }

    // ========================================================================
    // PERSONS
    // ========================================================================

    /// Register a person and return its `CLI-########` reference
    pub fn create_person(&self, name: &str, first_name: &str, email: &str) -> BankResult<String> {
        let id = next_person_id(self.store)?;
        let person = Person::new(
            id,
            name.trim().to_string(),
            first_name.trim().to_string(),
            email.trim().to_string(),
        );
        self.store.save_person(&person)?;
        info!("New person created: {} ({})", person.id, person.full_name());
        Ok(person.id)
    }

    pub fn find_person(&self, id: &str) -> BankResult<Option<Person>> {
        Ok(self.store.find_person(id.trim())?)
    }

    /// Login lookup: every person registered with this email
    pub fn find_persons_by_email(&self, email: &str) -> BankResult<Vec<Person>> {
        let persons = self.store.find_persons_by_email(email)?;
        debug!("Retrieve {} persons with the mail {}", persons.len(), email);
        Ok(persons)
    }

    /// Accounts owned by a person, empty when the person is unknown
    pub fn accounts_of_person(&self, person_id: &str) -> BankResult<Vec<Account>> {
        let Some(person) = self.store.find_person(person_id.trim())? else {
            error!("The person with the id {} doesn't exist", person_id);
            return Ok(Vec::new());
        };
        Ok(self.store.find_accounts_by_person(&person.id)?)
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Open an account for an existing person and return its BAN
    pub fn create_account(&self, person_id: &str, account_type: AccountType) -> BankResult<String> {
        let person = self.store.find_person(person_id.trim())?.ok_or_else(|| {
            error!("Technical pb when creating a new bank account for {}", person_id);
            BankError::technical(format!("No person with the id {}", person_id))
        })?;

        let ban = next_ban(self.store)?;
        let account = Account::new(person.id, ban, account_type);
        self.store.save_account(&account)?;

        info!("New {} account created: {}", account.account_type, account.bank_account_number);
        Ok(account.bank_account_number)
    }

    // ========================================================================
    // MONEY MOVEMENTS
    // ========================================================================

    /// Deposit dated today; returns the new balance
    pub fn deposit(&self, ban: &str, amount: Decimal) -> BankResult<Decimal> {
        self.deposit_on(ban, amount, today())
    }

    pub fn deposit_on(&self, ban: &str, amount: Decimal, date: NaiveDate) -> BankResult<Decimal> {
        let mut account = self.resolve_account(ban)?;
        self.ledger().apply_deposit(&mut account, amount, date)
    }

    /// Withdraw dated today; returns the new balance
    pub fn withdraw(&self, ban: &str, amount: Decimal) -> BankResult<Decimal> {
        self.withdraw_on(ban, amount, today())
    }

    pub fn withdraw_on(&self, ban: &str, amount: Decimal, date: NaiveDate) -> BankResult<Decimal> {
        let mut account = self.resolve_account(ban)?;
        self.ledger().apply_withdrawal(&mut account, amount, date)
    }

    /// Grant the fixed overdraft; returns the overdraft amount
    pub fn request_overdraft(&self, ban: &str) -> BankResult<Decimal> {
        let mut account = self.resolve_account(ban)?;
        self.ledger().grant_overdraft(&mut account)
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    /// Monthly statement as of `as_of` (today when `None`)
    pub fn monthly_statement(&self, ban: &str, as_of: Option<NaiveDate>) -> BankResult<Statement> {
        let Some(account) = self.store.find_account_by_ban(ban.trim())? else {
            error!("Error when searching the BAN: {}", ban);
            return Err(BankError::AccountNotFound(ban.to_string()));
        };

        let operations = self.store.find_operations_by_account(&account.id)?;
        let statement = build_monthly_statement(Some(&account), &operations, as_of.unwrap_or_else(today))?;

        debug!(
            "Generated bank statement for {} with {} operations",
            statement.bank_account_number,
            statement.operations.len()
        );
        Ok(statement)
    }

    /// Seed a demo history spread over the last year.
    ///
    /// Skips the savings ceiling and sufficiency checks; operation
    /// validation still applies. Returns the resulting balance.
    pub fn create_sample_operations(&self, ban: &str) -> BankResult<Decimal> {
        let mut account = self.resolve_account(ban)?;
        let ledger = self.ledger();
        let now = today();

        let months_ago = |n: u32| now.checked_sub_months(Months::new(n));
        let days_ago = |n: u64| now.checked_sub_days(Days::new(n));

        let samples = [
            (months_ago(12), OperationType::Deposit, dec!(150.25)),
            (months_ago(10), OperationType::Deposit, dec!(2500.50)),
            (months_ago(9), OperationType::Withdraw, dec!(18.25)),
            (months_ago(4), OperationType::Deposit, dec!(1505.0)),
            (days_ago(40), OperationType::Deposit, dec!(100.0)),
            (days_ago(25), OperationType::Deposit, dec!(1510.42)),
            (days_ago(10), OperationType::Withdraw, dec!(100.25)),
            (days_ago(10), OperationType::Deposit, dec!(150.25)),
            (days_ago(5), OperationType::Deposit, dec!(45.0)),
            (Some(now), OperationType::Deposit, dec!(352.14)),
            (Some(now), OperationType::Withdraw, dec!(1150.25)),
        ];

        for (date, operation_type, amount) in samples {
            let date = date.ok_or_else(|| BankError::InvalidDate("sample date out of range".to_string()))?;
            ledger.record_operation(&mut account, date, operation_type, amount)?;
        }

        info!(
            "Sample operations created for the BAN: {}, balance {}",
            account.bank_account_number, account.balance
        );
        Ok(account.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{in_transaction, setup_database, SqliteStore};
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use rusqlite::Connection;

    fn service(store: &MemoryStore) -> BankingService<'_, MemoryStore> {
        BankingService::new(store, LedgerRules::default())
    }

    fn open(service: &BankingService<'_, MemoryStore>, account_type: AccountType) -> String {
        let person = service
            .create_person("Doe", "Jane", "jane@example.com")
            .unwrap();
        service.create_account(&person, account_type).unwrap()
    }

    #[test]
    fn test_create_person_and_accounts() {
        let store = MemoryStore::new();
        let service = service(&store);

        let person = service.create_person("Doe", "Jane", "jane@example.com").unwrap();
        assert_eq!(person, "CLI-00000001");

        let bank = service.create_account(&person, AccountType::Bank).unwrap();
        let savings = service.create_account(&person, AccountType::Savings).unwrap();
        assert_eq!(bank, "CAMBYZEBANK-00000001");
        assert_eq!(savings, "CAMBYZEBANK-00000002");

        let accounts = service.accounts_of_person("cli-00000001").unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().all(|a| a.balance == Decimal::ZERO && a.overdraft == Decimal::ZERO));

        let found = service.find_persons_by_email("JANE@example.com").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Jane");
    }

    #[test]
    fn test_create_account_for_unknown_person_is_technical() {
        let store = MemoryStore::new();
        let service = service(&store);

        let err = service.create_account("CLI-00000099", AccountType::Bank).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TechnicalError);
        assert!(service.accounts_of_person("CLI-00000099").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_ban_is_invalid_account() {
        let store = MemoryStore::new();
        let service = service(&store);

        for result in [
            service.deposit("CAMBYZEBANK-00000042", dec!(10)),
            service.withdraw("CAMBYZEBANK-00000042", dec!(10)),
            service.request_overdraft("CAMBYZEBANK-00000042"),
        ] {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidAccount);
        }

        let err = service.monthly_statement("CAMBYZEBANK-00000042", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountNotFound);
    }

    #[test]
    fn test_deposit_withdraw_statement_round_trip() {
        let store = MemoryStore::new();
        let service = service(&store);
        let ban = open(&service, AccountType::Bank);

        assert_eq!(service.deposit(&ban, dec!(120.26)).unwrap(), dec!(120.26));

        let statement = service.monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.operations.len(), 1);
        assert_eq!(statement.operations[0].label, "Deposit");
        assert_eq!(statement.operations[0].amount, dec!(120.26));

        assert_eq!(service.withdraw(&ban, dec!(20.26)).unwrap(), dec!(100.00));

        let statement = service.monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.balance, dec!(100.00));
        assert_eq!(statement.operations.len(), 2);
        assert!(statement
            .operations
            .iter()
            .any(|line| line.label == "Withdraw" && line.amount == dec!(-20.26)));
    }

    #[test]
    fn test_overdraft_scenario_through_service() {
        let store = MemoryStore::new();
        let service = service(&store);
        let ban = open(&service, AccountType::Bank);

        assert_eq!(service.deposit(&ban, dec!(500.0)).unwrap(), dec!(500.0));
        assert_eq!(service.request_overdraft(&ban).unwrap(), dec!(1500));
        assert_eq!(service.withdraw(&ban, dec!(1800.0)).unwrap(), dec!(-1300.0));

        assert_eq!(service.withdraw(&ban, dec!(1.0)).unwrap(), dec!(-1301.0));

        let err = service.withdraw(&ban, dec!(199.01)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let statement = service.monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.balance, dec!(-1301.0));
        assert_eq!(statement.overdraft, dec!(1500));
        assert_eq!(statement.operations.len(), 3);
    }

    #[test]
    fn test_savings_scenario_through_service() {
        let store = MemoryStore::new();
        let service = service(&store);
        let ban = open(&service, AccountType::Savings);

        assert_eq!(service.deposit(&ban, dec!(4500.0)).unwrap(), dec!(4500.0));
        let err = service.deposit(&ban, dec!(600.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SavingsLimitReached);

        let err = service.request_overdraft(&ban).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverdraftForbiddenForSavings);

        let statement = service.monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.balance, dec!(4500.0));
        assert_eq!(statement.account_type, "Savings account");
        assert_eq!(statement.overdraft, Decimal::ZERO);
    }

    #[test]
    fn test_sample_operations_statement_window() {
        let store = MemoryStore::new();
        let service = service(&store);
        let ban = open(&service, AccountType::Bank);

        assert_eq!(service.create_sample_operations(&ban).unwrap(), dec!(5044.81));

        let account = store.find_account_by_ban(&ban).unwrap().unwrap();
        assert_eq!(store.find_operations_by_account(&account.id).unwrap().len(), 11);

        // 25, 10, 10, 5, 0 and 0 days back fall in the window; 40 days back does not
        let statement = service.monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.operations.len(), 6);
        assert_eq!(statement.operations[0].date, today().to_string());
        assert!(statement
            .operations
            .windows(2)
            .all(|pair| pair[0].date >= pair[1].date));
    }

    #[test]
    fn test_statement_as_of_past_date() {
        let store = MemoryStore::new();
        let service = service(&store);
        let ban = open(&service, AccountType::Bank);

        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        service.deposit_on(&ban, dec!(10), d(2024, 1, 10)).unwrap();
        service.deposit_on(&ban, dec!(30), d(2024, 2, 10)).unwrap();
        service.deposit_on(&ban, dec!(20), d(2024, 2, 11)).unwrap();
        service.withdraw_on(&ban, dec!(5), d(2024, 2, 20)).unwrap();

        // 2024-02-10 is exactly one month before and stays out
        let statement = service.monthly_statement(&ban, Some(d(2024, 3, 10))).unwrap();
        let amounts: Vec<Decimal> = statement.operations.iter().map(|l| l.amount).collect();
        assert_eq!(amounts, vec![dec!(-5), dec!(20)]);
        assert_eq!(statement.balance, dec!(55));
    }

    #[test]
    fn test_service_over_sqlite_transactions() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let rules = LedgerRules::default();

        let ban: String = in_transaction(&conn, |store| -> BankResult<String> {
            let service = BankingService::new(store, rules);
            let person = service.create_person("Doe", "John", "john@example.com")?;
            service.create_account(&person, AccountType::Bank)
        })
        .unwrap();
        assert_eq!(ban, "CAMBYZEBANK-00000001");

        let balance = in_transaction(&conn, |store| BankingService::new(store, rules).deposit(&ban, dec!(120.26)))
            .unwrap();
        assert_eq!(balance, dec!(120.26));

        let err = in_transaction(&conn, |store| BankingService::new(store, rules).withdraw(&ban, dec!(500)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let store = SqliteStore::new(&conn);
        assert_eq!(store.operation_count().unwrap(), 1);
        let statement = BankingService::new(&store, rules).monthly_statement(&ban, None).unwrap();
        assert_eq!(statement.balance, dec!(120.26));
    }
}
