//! AccountSession - which account, if any, the wallet has authorized
//!
//! Two ways to learn accounts:
//!
//! | Call | Method | Prompts user |
//! |------|--------|--------------|
//! | `read_authorized` | `eth_accounts` | no |
//! | `request_authorization` | `eth_requestAccounts` | yes |

use crate::error::{AtmError, AtmResult, ProviderError};
use crate::provider::{methods, WalletProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// `0x`-prefixed hex account or contract address.
///
/// Kept exactly as the wallet reported it; comparison ignores case.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> AtmResult<Self> {
        let body = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| AtmError::InvalidAddress(value.to_string()))?;
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AtmError::InvalidAddress(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// For compile-time constants already known to be well formed.
    pub(crate) fn trusted(value: &str) -> Self { Self(value.to_string()) }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool { self.0.eq_ignore_ascii_case(&other.0) }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Address {
    type Err = AtmError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for Address {
    type Error = AtmError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<Address> for String {
    fn from(value: Address) -> Self { value.0 }
}

/// Locally held authorization record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    account: Option<Address>,
    authorized: bool,
}

impl Session {
    pub fn account(&self) -> Option<&Address> { self.account.as_ref() }

    pub fn is_authorized(&self) -> bool { self.authorized }

    /// Adopt the first account of a non-empty list. Returns true when the
    /// session's account changed.
    pub fn authorize(&mut self, accounts: &[Address]) -> bool {
        let Some(first) = accounts.first() else { return false };
        let changed = self.account.as_ref() != Some(first);
        self.account = Some(first.clone());
        self.authorized = true;
        changed
    }

    pub fn clear(&mut self) {
        self.account = None;
        self.authorized = false;
    }
}

/// Passive account check. Never prompts and never fails: an absent provider
/// or any provider error yields an empty list.
pub async fn read_authorized(provider: Option<&dyn WalletProvider>) -> Vec<Address> {
    let Some(provider) = provider else { return Vec::new() };
    match provider.request(methods::ACCOUNTS, json!([])).await {
        Ok(reply) => parse_accounts(&reply).unwrap_or_else(|e| {
            tracing::debug!("ignoring account list: {}", e);
            Vec::new()
        }),
        Err(e) => {
            tracing::debug!("eth_accounts failed: {}", e);
            Vec::new()
        }
    }
}

/// Prompt the user for account access.
pub async fn request_authorization(provider: Option<&dyn WalletProvider>) -> AtmResult<Vec<Address>> {
    let provider = provider.ok_or(AtmError::ProviderUnavailable)?;
    match provider.request(methods::REQUEST_ACCOUNTS, json!([])).await {
        Ok(reply) => Ok(parse_accounts(&reply)?),
        Err(e) if e.is_user_rejection() => {
            tracing::info!("authorization rejected by user");
            Err(AtmError::UserRejected)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn parse_accounts(reply: &Value) -> Result<Vec<Address>, ProviderError> {
    let list = reply
        .as_array()
        .ok_or_else(|| ProviderError::Malformed(format!("expected account array, got {reply}")))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .and_then(|s| Address::parse(s).ok())
                .ok_or_else(|| ProviderError::Malformed(format!("bad account entry {v}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts requests and answers each with a fixed reply.
    struct Counting {
        calls: AtomicUsize,
        reply: Result<Value, ProviderError>,
    }

    impl Counting {
        fn new(reply: Result<Value, ProviderError>) -> Self {
            Self { calls: AtomicUsize::new(0), reply }
        }

        fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl WalletProvider for Counting {
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[test]
    fn read_authorized_without_provider_is_empty() {
        assert!(block_on(read_authorized(None)).is_empty());
    }

    #[test]
    fn read_authorized_swallows_provider_errors() {
        let failing = Counting::new(Err(ProviderError::rpc(-32603, "node unreachable")));
        assert!(block_on(read_authorized(Some(&failing))).is_empty());
        assert_eq!(failing.calls(), 1);

        let garbage = Counting::new(Ok(json!({"accounts": "0xabc"})));
        assert!(block_on(read_authorized(Some(&garbage))).is_empty());
    }

    #[test]
    fn read_authorized_returns_wallet_accounts() {
        let wallet = Counting::new(Ok(json!(["0xABC", "0xdef"])));
        let accounts = block_on(read_authorized(Some(&wallet)));
        assert_eq!(accounts, vec![Address::parse("0xabc").unwrap(), Address::parse("0xDEF").unwrap()]);
        assert_eq!(wallet.calls(), 1);
    }

    #[test]
    fn request_authorization_needs_a_provider() {
        let wallet = Counting::new(Ok(json!(["0xABC"])));
        let absent: Option<&dyn WalletProvider> = None;
        assert_eq!(block_on(request_authorization(absent)), Err(AtmError::ProviderUnavailable));
        assert_eq!(wallet.calls(), 0);

        assert_eq!(block_on(request_authorization(Some(&wallet))).unwrap().len(), 1);
        assert_eq!(wallet.calls(), 1);
    }

    #[test]
    fn request_authorization_maps_dismissal() {
        let wallet = Counting::new(Err(ProviderError::user_rejected()));
        assert_eq!(block_on(request_authorization(Some(&wallet))), Err(AtmError::UserRejected));
    }

    #[test]
    fn address_parsing() {
        assert!(Address::parse("0xABC").is_ok());
        assert!(Address::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").is_ok());
        assert!(Address::parse("ABC").is_err());
        assert!(Address::parse("0x").is_err());
        assert!(Address::parse("0xzz").is_err());
    }

    #[test]
    fn address_compares_case_insensitively() {
        let a = Address::parse("0xAbC").unwrap();
        let b = Address::parse("0xabc").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xAbC");
    }

    #[test]
    fn authorize_adopts_first_account() {
        let mut session = Session::default();
        assert!(!session.authorize(&[]));
        assert!(!session.is_authorized());

        let accounts = vec![Address::parse("0xABC").unwrap(), Address::parse("0xDEF").unwrap()];
        assert!(session.authorize(&accounts));
        assert_eq!(session.account().map(|a| a.as_str()), Some("0xABC"));
        assert!(session.is_authorized());
        assert!(!session.authorize(&accounts));

        session.clear();
        assert_eq!(session, Session::default());
    }

    #[test]
    fn parse_accounts_rejects_garbage() {
        assert!(parse_accounts(&json!("0xabc")).is_err());
        assert!(parse_accounts(&json!([42])).is_err());
        assert_eq!(parse_accounts(&json!([])).unwrap(), Vec::<Address>::new());
    }
}
