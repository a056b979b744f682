//! ContractBinding - typed handle to the ledger contract for an authorized session.

use super::abi::AbiDescriptor;
use crate::error::{AtmError, AtmResult};
use crate::provider::Provider;
use crate::session::{Address, Session};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LEDGER_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Where the ledger lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTarget {
    pub address: Address,
    #[serde(default)]
    pub abi: AbiDescriptor,
}

impl Default for LedgerTarget {
    fn default() -> Self {
        Self {
            address: Address::trusted(DEFAULT_LEDGER_ADDRESS),
            abi: AbiDescriptor::default(),
        }
    }
}

/// Handle bound to one signer. Equality ignores the provider reference, so
/// two bindings of the same target for the same account compare equal.
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    abi: AbiDescriptor,
    signer: Address,
    provider: Provider,
}

impl ContractHandle {
    pub fn address(&self) -> &Address { &self.address }
    pub fn abi(&self) -> &AbiDescriptor { &self.abi }
    pub fn signer(&self) -> &Address { &self.signer }
    pub fn provider(&self) -> &Provider { &self.provider }
}

impl PartialEq for ContractHandle {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.abi == other.abi && self.signer == other.signer
    }
}

impl Eq for ContractHandle {}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("signer", &self.signer)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Bind the session's account to the ledger target. Nothing is constructed
/// unless the session is authorized.
pub fn bind(session: &Session, provider: &Provider, target: &LedgerTarget) -> AtmResult<ContractHandle> {
    if !session.is_authorized() {
        return Err(AtmError::Unauthorized);
    }
    let signer = session.account().ok_or(AtmError::Unauthorized)?.clone();
    Ok(ContractHandle {
        address: target.address.clone(),
        abi: target.abi,
        signer,
        provider: provider.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::WalletProvider;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct Null;

    #[async_trait]
    impl WalletProvider for Null {
        async fn request(&self, _: &str, _: Value) -> Result<Value, ProviderError> { Ok(Value::Null) }
    }

    fn provider() -> Provider { Arc::new(Null) }

    #[test]
    fn unauthorized_session_never_binds() {
        let session = Session::default();
        assert_eq!(bind(&session, &provider(), &LedgerTarget::default()), Err(AtmError::Unauthorized));
    }

    #[test]
    fn rebinding_same_account_is_equal() {
        let mut session = Session::default();
        session.authorize(&[Address::parse("0xABC").unwrap()]);
        let target = LedgerTarget::default();
        let first = bind(&session, &provider(), &target).unwrap();
        let second = bind(&session, &provider(), &target).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.address().as_str(), DEFAULT_LEDGER_ADDRESS);
        assert_eq!(first.signer().as_str(), "0xABC");
    }

    #[test]
    fn target_config_defaults_abi() {
        let target: LedgerTarget = serde_json::from_str(r#"{"address":"0x1234"}"#).unwrap();
        assert_eq!(target.abi, AbiDescriptor::default());
        assert!(serde_json::from_str::<LedgerTarget>(r#"{"address":"nope"}"#).is_err());
    }
}
