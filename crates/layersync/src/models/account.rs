//! Account model for hosts that own periodic syncs

use serde::{Deserialize, Serialize};

/// An account known to the host's account registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    /// Account name (unique within its type)
    pub name: String,
    /// Account type (e.g. `org.layersync.account`)
    pub account_type: String,
}

impl Account {
    pub fn new(name: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type: account_type.into(),
        }
    }
}

/// Selects which accounts of the scheduler's account type a call applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
    /// Every account of the type
    All,
    /// A single account by name
    Named(String),
}

impl AccountSelector {
    pub fn named(name: impl Into<String>) -> Self {
        AccountSelector::Named(name.into())
    }

    /// Check whether an account matches this selector
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            AccountSelector::All => true,
            AccountSelector::Named(name) => account.name == *name,
        }
    }
}

impl std::fmt::Display for AccountSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountSelector::All => f.write_str("all accounts"),
            AccountSelector::Named(name) => write!(f, "account '{}'", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matches() {
        let account = Account::new("alice", "org.layersync.account");
        assert!(AccountSelector::All.matches(&account));
        assert!(AccountSelector::named("alice").matches(&account));
        assert!(!AccountSelector::named("bob").matches(&account));
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(AccountSelector::All.to_string(), "all accounts");
        assert_eq!(AccountSelector::named("bob").to_string(), "account 'bob'");
    }
}
