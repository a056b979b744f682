//! LedgerOperations - balance query, deposit, withdraw through a bound handle
//!
//! ```text
//! submit_deposit(handle, amount)
//!     │
//!     ├── eth_sendTransaction      → tx hash          (OperationRejected on failure)
//!     ├── eth_getTransactionReceipt (poll)            (suspends until confirmed)
//!     ├── TransactionLog::append                      (in confirmation order)
//!     ├── eth_call getBalance()     → stamped refresh (stale reads discarded)
//!     └── eth_call getBalance()     → follow-up       (only if the refresh lost
//!                                                      information and nothing
//!                                                      else is in flight)
//! ```

use super::abi::{self, LedgerCall};
use super::binding::ContractHandle;
use super::state::{LedgerState, Stamp};
use super::types::{quantity, Amount, Direction, TxHash};
use crate::error::{AtmError, AtmResult};
use crate::history::{TransactionLog, TransactionRecord};
use crate::provider::methods;
use alloy_primitives::U256;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How mutating operations may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationPolicy {
    /// One deposit/withdraw at a time; later ones queue.
    #[default]
    SingleFlight,
    /// Operations overlap; only the stamp guard orders balance refreshes.
    Concurrent,
}

impl OperationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPolicy::SingleFlight => "single-flight",
            OperationPolicy::Concurrent => "concurrent",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-flight" | "single" | "serial" => Some(OperationPolicy::SingleFlight),
            "concurrent" | "parallel" => Some(OperationPolicy::Concurrent),
            _ => None,
        }
    }
}

/// Receipt polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until confirmed.
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval: Duration::from_millis(1000), max_polls: None }
    }
}

/// Stops the waiting phase of an operation. The remote operation itself is
/// already submitted and is not retracted.
#[derive(Debug, Clone)]
pub struct WaitCancelHandle(AbortHandle);

impl WaitCancelHandle {
    pub fn cancel(&self) { self.0.abort(); }
}

#[derive(Debug)]
pub struct WaitCancel(AbortRegistration);

pub fn wait_cancel() -> (WaitCancelHandle, WaitCancel) {
    let (handle, registration) = AbortHandle::new_pair();
    (WaitCancelHandle(handle), WaitCancel(registration))
}

/// Result of a confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub seq: u64,
    pub tx: TxHash,
    pub direction: Direction,
    pub amount: Amount,
    /// Refreshed balance; `None` when the refresh was stale or failed.
    #[serde(serialize_with = "quantity::option::serialize")]
    pub balance: Option<U256>,
}

#[derive(Debug, Default)]
struct Book {
    state: LedgerState,
    log: TransactionLog,
    /// Bumped whenever the bound account changes; reads from an older epoch
    /// are not applied.
    epoch: u64,
}

pub struct LedgerOperations {
    book: Arc<Mutex<Book>>,
    gate: futures::lock::Mutex<()>,
    policy: OperationPolicy,
    poll: PollSettings,
}

/// Decrements the in-flight count however the operation ends.
struct InFlight {
    book: Arc<Mutex<Book>>,
    done: bool,
}

impl InFlight {
    /// For callers already holding the book.
    fn release(&mut self, book: &mut Book) {
        if !self.done {
            self.done = true;
            book.state.end();
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            lock(&self.book).state.end();
        }
    }
}

fn lock(book: &Mutex<Book>) -> MutexGuard<'_, Book> {
    book.lock().unwrap_or_else(|p| p.into_inner())
}

impl LedgerOperations {
    pub fn new(policy: OperationPolicy, poll: PollSettings) -> Self {
        Self {
            book: Arc::new(Mutex::new(Book::default())),
            gate: futures::lock::Mutex::new(()),
            policy,
            poll,
        }
    }

    pub fn policy(&self) -> OperationPolicy { self.policy }

    pub fn state(&self) -> LedgerState { lock(&self.book).state.clone() }

    pub fn log(&self) -> TransactionLog { lock(&self.book).log.clone() }

    pub(crate) fn forget(&self) {
        let mut book = lock(&self.book);
        book.epoch += 1;
        book.state.forget();
    }

    /// Read-only; safe to retry; never touches the log.
    pub async fn query_balance(&self, handle: &ContractHandle) -> AtmResult<U256> {
        let (stamp, epoch) = {
            let mut book = lock(&self.book);
            let op = book.state.last_op();
            (book.state.stamp_read(op), book.epoch)
        };
        let balance = read_balance(handle).await?;
        let mut book = lock(&self.book);
        if book.epoch != epoch {
            tracing::debug!(%balance, "account changed during read, not applied");
            return Ok(balance);
        }
        match book.state.apply(stamp, balance) {
            Ok(()) => tracing::debug!(%balance, "balance read"),
            // The caller still gets what the chain said; only the trusted copy is kept.
            Err(_) => tracing::debug!(%balance, ?stamp, "balance read older than the applied one"),
        }
        Ok(balance)
    }

    pub async fn submit_deposit(&self, handle: &ContractHandle, amount: Amount) -> AtmResult<Confirmation> {
        self.submit(handle, Direction::Deposit, amount, None).await
    }

    /// No local balance check; the ledger decides.
    pub async fn submit_withdraw(&self, handle: &ContractHandle, amount: Amount) -> AtmResult<Confirmation> {
        self.submit(handle, Direction::Withdraw, amount, None).await
    }

    pub async fn submit(
        &self,
        handle: &ContractHandle,
        direction: Direction,
        amount: Amount,
        cancel: Option<WaitCancel>,
    ) -> AtmResult<Confirmation> {
        let _serial = match self.policy {
            OperationPolicy::SingleFlight => Some(self.gate.lock().await),
            OperationPolicy::Concurrent => None,
        };

        let (seq, epoch) = {
            let mut book = lock(&self.book);
            book.state.begin();
            (book.state.issue_op(), book.epoch)
        };
        let mut in_flight = InFlight { book: self.book.clone(), done: false };

        let call = match direction {
            Direction::Deposit => LedgerCall::Deposit(amount.get()),
            Direction::Withdraw => LedgerCall::Withdraw(amount.get()),
        };
        let tx = send_transaction(handle, call).await.map_err(|e| {
            tracing::warn!(seq, %direction, %amount, "submission rejected: {}", e);
            e
        })?;
        tracing::info!(seq, %direction, %amount, %tx, "submitted, awaiting confirmation");

        let wait = wait_for_receipt(handle, &tx, self.poll);
        match cancel {
            Some(WaitCancel(registration)) => match Abortable::new(wait, registration).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::info!(seq, %tx, "stopped waiting for confirmation");
                    return Err(AtmError::WaitAbandoned { tx: tx.to_string() });
                }
            },
            None => wait.await?,
        }
        // Recorded when the confirmation is observed, before any refresh.
        let stamp = {
            let mut book = lock(&self.book);
            in_flight.release(&mut book);
            book.log.append(TransactionRecord::new(direction, amount, tx.clone()));
            book.state.stamp_read(seq)
        };
        tracing::info!(seq, %direction, %amount, %tx, "confirmed");

        let mut balance = self.refresh(handle, stamp, epoch, seq).await;
        if balance.is_none() {
            let follow_up = {
                let mut book = lock(&self.book);
                let idle = book.state.in_flight() == 0 && book.epoch == epoch;
                if idle && book.state.needs_refresh() {
                    let op = book.state.last_op();
                    Some(book.state.stamp_read(op))
                } else {
                    None
                }
            };
            if let Some(stamp) = follow_up {
                tracing::debug!(seq, ?stamp, "refresh was superseded, reading again");
                balance = self.refresh(handle, stamp, epoch, seq).await;
            }
        }

        Ok(Confirmation { seq, tx, direction, amount, balance })
    }

    /// Stamped post-confirmation read. `None` if it failed or lost to a newer read.
    async fn refresh(&self, handle: &ContractHandle, stamp: Stamp, epoch: u64, seq: u64) -> Option<U256> {
        let refreshed = read_balance(handle).await;
        let mut book = lock(&self.book);
        match refreshed {
            Ok(b) if book.epoch == epoch => match book.state.apply(stamp, b) {
                Ok(()) => {
                    tracing::debug!(seq, balance = %b, "balance refreshed");
                    Some(b)
                }
                Err(_) => None,
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(seq, "balance refresh failed: {}", e);
                None
            }
        }
    }
}

async fn read_balance(handle: &ContractHandle) -> AtmResult<U256> {
    let params = json!([{
        "from": handle.signer(),
        "to": handle.address(),
        "data": handle.abi().encode(LedgerCall::GetBalance),
    }, "latest"]);
    let reply = handle.provider().request(methods::CALL, params).await?;
    let data = reply
        .as_str()
        .ok_or_else(|| AtmError::Abi(format!("eth_call returned {reply}")))?;
    abi::decode_balance(data)
}

async fn send_transaction(handle: &ContractHandle, call: LedgerCall) -> AtmResult<TxHash> {
    let params = json!([{
        "from": handle.signer(),
        "to": handle.address(),
        "data": handle.abi().encode(call),
    }]);
    let reply = handle
        .provider()
        .request(methods::SEND_TRANSACTION, params)
        .await
        .map_err(|e| {
            if e.is_user_rejection() {
                AtmError::rejected("user denied transaction signature")
            } else {
                AtmError::rejected(e.to_string())
            }
        })?;
    reply
        .as_str()
        .map(TxHash::new)
        .ok_or_else(|| AtmError::rejected(format!("no transaction hash in {reply}")))
}

async fn wait_for_receipt(handle: &ContractHandle, tx: &TxHash, poll: PollSettings) -> AtmResult<()> {
    let mut polls = 0u32;
    loop {
        let receipt = handle.provider().request(methods::GET_RECEIPT, json!([tx])).await?;
        if !receipt.is_null() {
            return check_receipt(&receipt);
        }
        polls += 1;
        if poll.max_polls.is_some_and(|max| polls >= max) {
            return Err(AtmError::ConfirmationTimeout { tx: tx.to_string() });
        }
        crate::runtime::sleep(poll.interval).await;
    }
}

fn check_receipt(receipt: &Value) -> AtmResult<()> {
    match receipt.get("status").and_then(|s| s.as_str()) {
        Some("0x1") | Some("0x01") | None => Ok(()),
        Some(status) => Err(AtmError::rejected(format!("transaction reverted (status {status})"))),
    }
}
