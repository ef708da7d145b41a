// Entity Models
//
// Person 1..* Account 1..* Operation. Accounts hold no live collection of
// operations; those are looked up by account id on demand.

pub mod account;
pub mod operation;
pub mod person;

pub use account::{Account, AccountType};
pub use operation::{Operation, OperationType};
pub use person::Person;
