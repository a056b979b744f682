//! Provider discovery - the wallet capability injected by the host
//!
//! A provider is anything that answers EIP-1193 style `request(method, params)`
//! calls: the browser extension behind `window.ethereum`, a development node
//! over HTTP, or the in-process simulator.
//!
//! ```text
//! ProviderHost::detect()
//!     │
//!     ├── None          → Discovery::Absent    (install a wallet)
//!     └── Some(provider) → Discovery::Detected  (connect)
//! ```

#[cfg(feature = "native")]
mod http;

#[cfg(feature = "native")]
pub use http::{HttpHost, HttpProvider};

use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// JSON-RPC methods the core issues against a provider.
pub mod methods {
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const CALL: &str = "eth_call";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const GET_RECEIPT: &str = "eth_getTransactionReceipt";
}

/// `Send + Sync` on native targets, nothing in the browser where JS handles
/// are single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait WalletProvider: MaybeSendSync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn name(&self) -> &str {
        "wallet"
    }
}

pub type Provider = Arc<dyn WalletProvider>;

/// Host environment that may or may not carry a wallet provider.
pub trait ProviderHost: MaybeSendSync {
    fn detect(&self) -> Option<Provider>;
}

/// Outcome of discovery. `Unchecked` is distinct from `Absent`.
#[derive(Clone, Default)]
pub enum Discovery {
    #[default]
    Unchecked,
    Absent,
    Detected(Provider),
}

impl Discovery {
    pub fn run(host: &dyn ProviderHost) -> Self {
        match host.detect() {
            Some(provider) => {
                tracing::debug!(provider = provider.name(), "wallet provider detected");
                Discovery::Detected(provider)
            }
            None => {
                tracing::debug!("no wallet provider in host environment");
                Discovery::Absent
            }
        }
    }

    pub fn provider(&self) -> Option<&Provider> {
        match self {
            Discovery::Detected(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_checked(&self) -> bool {
        !matches!(self, Discovery::Unchecked)
    }
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discovery::Unchecked => f.write_str("Unchecked"),
            Discovery::Absent => f.write_str("Absent"),
            Discovery::Detected(p) => write!(f, "Detected({})", p.name()),
        }
    }
}

/// Host without any wallet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

impl ProviderHost for NoProvider {
    fn detect(&self) -> Option<Provider> {
        None
    }
}

/// Host that always hands out the same provider.
#[derive(Clone)]
pub struct FixedHost {
    provider: Provider,
}

impl FixedHost {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

impl ProviderHost for FixedHost {
    fn detect(&self) -> Option<Provider> {
        Some(self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl WalletProvider for Echo {
        async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderError> {
            Ok(Value::String(method.to_string()))
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn unchecked_differs_from_absent() {
        let unchecked = Discovery::default();
        assert!(!unchecked.is_checked());
        let absent = Discovery::run(&NoProvider);
        assert!(absent.is_checked());
        assert!(absent.provider().is_none());
    }

    #[test]
    fn fixed_host_detects() {
        let host = FixedHost::new(Arc::new(Echo));
        let found = Discovery::run(&host);
        assert_eq!(format!("{:?}", found), "Detected(echo)");
        assert!(found.provider().is_some());
    }
}
