//! Connected Accounts

use serde::{Deserialize, Serialize};

/// Most accounts ever listed for the storefront
pub const ACCOUNT_LIST_LIMIT: u8 = 10;

/// The slice of a connected account the storefront needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,

    /// `standard`, `express` or `custom`
    #[serde(rename = "type")]
    pub account_type: Option<String>,

    pub email: Option<String>,

    pub capabilities: AccountCapabilities,

    pub charges_enabled: bool,
}

/// Capability statuses relevant to direct charges
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCapabilities {
    /// `active`, `inactive` or `pending`
    pub card_payments: Option<String>,
}

impl ConnectedAccount {
    /// Whether the storefront can sell on behalf of this account
    pub fn can_accept_payments(&self) -> bool {
        self.charges_enabled && self.capabilities.card_payments.as_deref() == Some("active")
    }
}

/// Keep at most `limit` accounts, newest first as the platform returns them.
pub fn cap_accounts(mut accounts: Vec<ConnectedAccount>, limit: u8) -> Vec<ConnectedAccount> {
    accounts.truncate(usize::from(limit));
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, charges_enabled: bool, card_payments: Option<&str>) -> ConnectedAccount {
        ConnectedAccount {
            id: id.into(),
            account_type: Some("express".into()),
            email: Some(format!("{id}@example.com")),
            capabilities: AccountCapabilities {
                card_payments: card_payments.map(str::to_string),
            },
            charges_enabled,
        }
    }

    #[test]
    fn test_can_accept_payments() {
        assert!(account("acct_1", true, Some("active")).can_accept_payments());
        assert!(!account("acct_2", false, Some("active")).can_accept_payments());
        assert!(!account("acct_3", true, Some("pending")).can_accept_payments());
        assert!(!account("acct_4", true, None).can_accept_payments());
    }

    #[test]
    fn test_cap_accounts() {
        let accounts: Vec<_> = (0..25)
            .map(|i| account(&format!("acct_{i}"), true, Some("active")))
            .collect();
        let capped = cap_accounts(accounts, ACCOUNT_LIST_LIMIT);
        assert_eq!(capped.len(), 10);
        assert_eq!(capped[0].id, "acct_0");
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(account("acct_1", true, Some("active"))).unwrap();
        assert_eq!(json["type"], "express");
        assert_eq!(json["capabilities"]["card_payments"], "active");
        assert_eq!(json["charges_enabled"], true);
    }
}
