// Cambyze Bank - Core Library
// Ledger engine, statement builder and stores, shared by the CLI and the API server

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod sequence;
pub mod services;
pub mod statement;
pub mod store;

// Re-export commonly used types
pub use config::{BankConfig, LedgerRules, BAN_PREFIX};
pub use db::{in_transaction, open_database, setup_database, SqliteStore};
pub use entities::{Account, AccountType, Operation, OperationType, Person};
pub use error::{BankError, BankResult, ErrorKind};
pub use ledger::{replay_balance, round_amount, LedgerEngine};
pub use sequence::{format_ban, format_person_id, MemorySequence, SequenceGenerator};
pub use services::{today, BankingService};
pub use statement::{build_monthly_statement, Statement, StatementLine};
pub use store::{AccountStore, BankStore, MemoryStore, OperationStore, PersonStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries.
///
/// Honors `RUST_LOG`; defaults to `cambyze_bank=info`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cambyze_bank=info,cambyze_server=info,tower_http=info".into());

    // A second install (tests, embedding) is not an error worth surfacing
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
