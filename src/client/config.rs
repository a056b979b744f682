//! Client configuration - built in code, or loaded from JSON plus environment.

use crate::error::{AtmError, AtmResult};
use crate::ledger::{AbiDescriptor, LedgerTarget, OperationPolicy, PollSettings};
use crate::session::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub ledger: LedgerTarget,
    pub policy: OperationPolicy,
    pub poll_interval_ms: u64,
    pub max_polls: Option<u32>,
    /// JSON-RPC endpoint for native hosts; unset means no provider.
    pub rpc_url: Option<String>,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerTarget::default(),
            policy: OperationPolicy::default(),
            poll_interval_ms: 1000,
            max_polls: None,
            rpc_url: None,
            port: 8080,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_ledger_address(mut self, address: Address) -> Self { self.ledger.address = address; self }
    pub fn with_abi(mut self, abi: AbiDescriptor) -> Self { self.ledger.abi = abi; self }
    pub fn with_policy(mut self, policy: OperationPolicy) -> Self { self.policy = policy; self }
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self { self.poll_interval_ms = ms; self }
    pub fn with_max_polls(mut self, max: u32) -> Self { self.max_polls = Some(max); self }
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self { self.rpc_url = Some(url.into()); self }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings { interval: Duration::from_millis(self.poll_interval_ms), max_polls: self.max_polls }
    }
}

#[cfg(feature = "native")]
impl ClientConfig {
    /// Config file (if present) overlaid with environment variables.
    pub fn load() -> AtmResult<Self> {
        let path = config_path();
        let base = if path.exists() { Self::from_file(&path)? } else { Self::default() };
        base.apply_env()
    }

    pub fn from_file(path: &std::path::Path) -> AtmResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AtmError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| AtmError::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn apply_env(mut self) -> AtmResult<Self> {
        if let Some(addr) = env_var("BEEATM_LEDGER_ADDRESS") {
            self.ledger.address = Address::parse(&addr)?;
        }
        if let Some(url) = env_var("BEEATM_RPC_URL") {
            self.rpc_url = Some(url);
        }
        if let Some(policy) = env_var("BEEATM_POLICY") {
            self.policy = OperationPolicy::from_str(&policy)
                .ok_or_else(|| AtmError::Config(format!("unknown policy: {policy}")))?;
        }
        if let Some(port) = env_var("BEEATM_PORT") {
            self.port = port.parse().map_err(|_| AtmError::Config(format!("bad port: {port}")))?;
        }
        Ok(self)
    }
}

#[cfg(feature = "native")]
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// `$BEEATM_ROOT/config.json`, else `<platform config dir>/beeatm/config.json`.
#[cfg(feature = "native")]
pub fn config_path() -> std::path::PathBuf {
    use std::path::PathBuf;
    match std::env::var("BEEATM_ROOT") {
        Ok(root) => PathBuf::from(root).join("config.json"),
        Err(_) => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("beeatm")
            .join("config.json"),
    }
}
