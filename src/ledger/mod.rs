//! Ledger - contract binding and the operations issued through it
//!
//! # Contract interface
//!
//! Selectors are derived from the `sol!` interface in [`abi`].
//!
//! | Function | Selector | Kind |
//! |----------|----------|------|
//! | `getBalance()` | `0x12065fe0` | `eth_call` |
//! | `deposit(uint256)` | `0xb6b55f25` | `eth_sendTransaction` |
//! | `withdraw(uint256)` | `0x2e1a7d4d` | `eth_sendTransaction` |

pub mod abi;
mod binding;
mod ops;
mod state;
mod types;

pub use abi::{AbiDescriptor, LedgerCall, Selector};
pub use binding::{bind, ContractHandle, LedgerTarget, DEFAULT_LEDGER_ADDRESS};
pub use ops::{
    wait_cancel, Confirmation, LedgerOperations, OperationPolicy, PollSettings, WaitCancel,
    WaitCancelHandle,
};
pub use state::{LedgerState, Stamp};
pub use types::{quantity, Amount, Direction, TxHash};
