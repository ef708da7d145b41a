// 👤 Person Entity - Owner of bank accounts
//
// Identity is the `CLI-########` reference minted from the `person` counter.
// A person is created once and never modified.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// External reference, e.g. "CLI-00000001"
    pub id: String,

    /// Last name
    pub name: String,

    pub first_name: String,

    /// Login key (looked up, not enforced unique)
    pub email: String,
}

impl Person {
    pub fn new(id: String, name: String, first_name: String, email: String) -> Self {
        Person {
            id,
            name,
            first_name,
            email,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.name)
    }

    /// Email comparison used by the login lookup
    pub fn has_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}
