use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use cambyze_bank::{
    in_transaction, init_logging, open_database, AccountType, BankConfig, BankError,
    BankingService, LedgerRules, SqliteStore,
};

const USAGE: &str = "\
Usage: cambyze-bank <command> [args]

Commands:
  init                                  Create the database schema
  person <name> <first_name> <email>    Register a person
  open <person_id> [bank|savings]       Open an account for a person
  accounts <person_id>                  List the accounts of a person
  deposit <ban> <amount> [YYYY-MM-DD]   Deposit money
  withdraw <ban> <amount> [YYYY-MM-DD]  Withdraw money
  overdraft <ban>                       Grant the authorized overdraft
  statement <ban> [YYYY-MM-DD]          Print the monthly statement
  sample <ban>                          Load demonstration operations

Environment: CAMBYZE_DB_PATH, CAMBYZE_SAVINGS_LIMIT, CAMBYZE_OVERDRAFT_AMOUNT, RUST_LOG";

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = BankConfig::from_env()?;
    let conn = open_database(&config.db_path)?;
    let rules = config.rules;

    match command.as_str() {
        "init" => {
            println!("✓ Database ready: {}", config.db_path.display());
            Ok(())
        }
        "person" => run_person(&conn, rules, &args[1..]),
        "open" => run_open(&conn, rules, &args[1..]),
        "accounts" => run_accounts(&conn, rules, &args[1..]),
        "deposit" => run_movement(&conn, rules, &args[1..], Movement::Deposit),
        "withdraw" => run_movement(&conn, rules, &args[1..], Movement::Withdraw),
        "overdraft" => run_overdraft(&conn, rules, &args[1..]),
        "statement" => run_statement(&conn, rules, &args[1..]),
        "sample" => run_sample(&conn, rules, &args[1..]),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

/// Run one service call inside a single SQLite transaction
fn with_service<T, F>(conn: &Connection, rules: LedgerRules, f: F) -> Result<T>
where
    F: FnOnce(&BankingService<'_, SqliteStore<'_>>) -> Result<T, BankError>,
{
    in_transaction(conn, |store| f(&BankingService::new(store, rules))).map_err(report)
}

/// Functional rejections are printed with their kind before bubbling up
fn report(err: BankError) -> anyhow::Error {
    if err.is_functional() {
        eprintln!("❌ Rejected ({}): {}", err.kind().as_str(), err);
    }
    anyhow::Error::new(err)
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("Missing argument <{}>\n\n{}", name, USAGE))
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Invalid amount: {}", raw))
}

fn parse_date(raw: Option<&String>) -> Result<Option<NaiveDate>> {
    raw.map(|d| {
        NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", d))
    })
    .transpose()
}

fn run_person(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let name = arg(args, 0, "name")?;
    let first_name = arg(args, 1, "first_name")?;
    let email = arg(args, 2, "email")?;

    let id = with_service(conn, rules, |svc| svc.create_person(name, first_name, email))?;
    println!("✓ Person registered: {}", id);
    Ok(())
}

fn run_open(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let person_id = arg(args, 0, "person_id")?;
    let account_type = match args.get(1) {
        Some(raw) => AccountType::from_str(raw).map_err(anyhow::Error::msg)?,
        None => AccountType::Bank,
    };

    let ban = with_service(conn, rules, |svc| svc.create_account(person_id, account_type))?;
    println!("✓ {} opened: {}", account_type.label(), ban);
    Ok(())
}

fn run_accounts(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let person_id = arg(args, 0, "person_id")?;
    let accounts = with_service(conn, rules, |svc| svc.accounts_of_person(person_id))?;

    if accounts.is_empty() {
        println!("No accounts for {}", person_id);
    }
    for account in &accounts {
        println!("{}", account);
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Movement {
    Deposit,
    Withdraw,
}

fn run_movement(
    conn: &Connection,
    rules: LedgerRules,
    args: &[String],
    movement: Movement,
) -> Result<()> {
    let ban = arg(args, 0, "ban")?;
    let amount = parse_amount(arg(args, 1, "amount")?)?;
    let date = parse_date(args.get(2))?.unwrap_or_else(cambyze_bank::today);

    let balance = with_service(conn, rules, |svc| match movement {
        Movement::Deposit => svc.deposit_on(ban, amount, date),
        Movement::Withdraw => svc.withdraw_on(ban, amount, date),
    })?;

    println!("✓ New balance of {}: {:.2}", ban, balance);
    Ok(())
}

fn run_overdraft(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let ban = arg(args, 0, "ban")?;
    let overdraft = with_service(conn, rules, |svc| svc.request_overdraft(ban))?;
    println!("✓ Authorized overdraft of {}: {:.2}", ban, overdraft);
    Ok(())
}

fn run_statement(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let ban = arg(args, 0, "ban")?;
    let as_of = parse_date(args.get(1))?;

    let statement = with_service(conn, rules, |svc| svc.monthly_statement(ban, as_of))?;
    print!("{}", statement);
    println!(
        "Deposits: {:.2}  Withdrawals: {:.2}",
        statement.total_deposits(),
        statement.total_withdrawals()
    );
    Ok(())
}

fn run_sample(conn: &Connection, rules: LedgerRules, args: &[String]) -> Result<()> {
    let ban = arg(args, 0, "ban")?;
    let balance = with_service(conn, rules, |svc| svc.create_sample_operations(ban))?;
    println!("✓ Sample operations loaded on {}, balance: {:.2}", ban, balance);
    Ok(())
}
