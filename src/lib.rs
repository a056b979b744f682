//! Beeatm: a wallet-connected ATM for a single on-chain ledger contract.
//!
//! # Architecture
//!
//! ```text
//! UI (HTTP routes / AtmApp in the browser)
//!   │
//!   └── Client (connection state machine, events)
//!         ├── Discovery  (ProviderHost → WalletProvider)
//!         ├── Session    (authorized account)
//!         ├── ContractHandle (address + ABI + signer)
//!         └── LedgerOperations
//!               ├── LedgerState     (balance, sequencing guard)
//!               └── TransactionLog  (confirmed records, append-only)
//! ```
//!
//! # Actions
//!
//! | Action | Method | Description |
//! |--------|--------|-------------|
//! | load | `client.load()` | Detect the wallet, pick up an authorized account |
//! | connect | `client.connect()` | Request account access, bind the ledger |
//! | balance | `client.query_balance()` | Read the ledger balance |
//! | deposit | `client.deposit(n)` | Submit, wait for confirmation, record, refresh |
//! | withdraw | `client.withdraw(n)` | Same, debiting the ledger |
//!
//! # Features
//!
//! - `native` - HTTP server, JSON-RPC provider, CLI
//! - `wasm` - browser bindings over `window.ethereum`
//!
//! # Usage
//!
//! ```ignore
//! use beeatm::{Client, ClientConfig, FixedHost, SimWallet, Address, U256};
//! use std::sync::Arc;
//!
//! let owner = Address::parse("0x00000000000000000000000000000000000000a1")?;
//! let client = Client::new(FixedHost::new(Arc::new(SimWallet::new(owner))), ClientConfig::default());
//!
//! client.connect().await?;
//! client.deposit(U256::from(5)).await?;
//! assert_eq!(client.ledger_state().balance(), Some(U256::from(5)));
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod client;
pub mod error;
pub mod history;
pub mod ledger;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod sim;

// =============================================================================
// Native-only modules (server, CLI, tokio)
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod server;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use client::{Client, ClientConfig, ClientEvent, ClientSnapshot, ClientStatus, Notice, Prompt};
pub use error::{AtmError, AtmResult, ProviderError};
pub use history::{TransactionLog, TransactionRecord};
pub use ledger::{
    Confirmation, ContractHandle, Direction, LedgerState, OperationPolicy, TxHash, WaitCancel,
};
pub use provider::{Discovery, FixedHost, NoProvider, Provider, ProviderHost, WalletProvider};
pub use session::{Address, Session};
pub use alloy_primitives::U256;
pub use sim::SimWallet;

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use provider::{HttpHost, HttpProvider};
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};
#[cfg(feature = "native")]
pub use server::{create_router, create_router_with_name};

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use wasm::AtmApp;
