//! Simulator - in-process wallet with a deployed ATM-style ledger contract
//!
//! Answers the same JSON-RPC methods a browser wallet does. Contract rules:
//! only the owner may deposit or withdraw, and a withdrawal may not exceed the
//! balance. Transactions are mined at submission unless manual confirmation is
//! enabled, in which case they stay pending until `confirm` is called.

use crate::error::ProviderError;
use crate::ledger::abi::{self, AbiDescriptor, LedgerCall};
use crate::ledger::{TxHash, DEFAULT_LEDGER_ADDRESS};
use crate::provider::{methods, WalletProvider};
use crate::session::Address;
use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};

const UNAUTHORIZED_CODE: i64 = 4100;
const REVERT_CODE: i64 = -32603;

#[derive(Debug, Clone)]
struct SimTx {
    hash: TxHash,
    call: LedgerCall,
    /// `None` while pending, then whether execution succeeded.
    outcome: Option<bool>,
    block: u64,
}

#[derive(Debug)]
struct SimState {
    accounts: Vec<Address>,
    connected: bool,
    reject_connect: bool,
    reject_signing: bool,
    manual: bool,
    owner: Address,
    balance: U256,
    height: u64,
    txs: Vec<SimTx>,
    calls: Vec<String>,
}

pub struct SimWallet {
    contract: Address,
    abi: AbiDescriptor,
    state: Mutex<SimState>,
}

impl SimWallet {
    /// Wallet holding one account that also owns the contract.
    pub fn new(owner: Address) -> Self {
        Self {
            contract: Address::trusted(DEFAULT_LEDGER_ADDRESS),
            abi: AbiDescriptor::default(),
            state: Mutex::new(SimState {
                accounts: vec![owner.clone()],
                connected: false,
                reject_connect: false,
                reject_signing: false,
                manual: false,
                owner,
                balance: U256::ZERO,
                height: 0,
                txs: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_contract(mut self, address: Address) -> Self { self.contract = address; self }
    pub fn with_balance(mut self, balance: U256) -> Self { self.state_mut().balance = balance; self }
    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self { self.state_mut().accounts = accounts; self }
    /// Site already authorized, as if connected in an earlier visit.
    pub fn connected(mut self) -> Self { self.state_mut().connected = true; self }
    pub fn manual_confirmations(mut self) -> Self { self.state_mut().manual = true; self }

    fn state_mut(&mut self) -> &mut SimState {
        self.state.get_mut().unwrap_or_else(|p| p.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn contract(&self) -> &Address { &self.contract }

    pub fn set_reject_connect(&self, reject: bool) { self.lock().reject_connect = reject; }
    pub fn set_reject_signing(&self, reject: bool) { self.lock().reject_signing = reject; }
    pub fn set_accounts(&self, accounts: Vec<Address>) { self.lock().accounts = accounts; }

    /// On-chain balance, independent of what any client has observed.
    pub fn balance(&self) -> U256 { self.lock().balance }

    /// Pending transactions in submission order.
    pub fn pending(&self) -> Vec<TxHash> {
        self.lock().txs.iter().filter(|t| t.outcome.is_none()).map(|t| t.hash.clone()).collect()
    }

    /// Mine one pending transaction. Returns false if it is unknown or already mined.
    pub fn confirm(&self, hash: &TxHash) -> bool {
        let mut state = self.lock();
        match state.txs.iter().position(|t| &t.hash == hash && t.outcome.is_none()) {
            Some(idx) => {
                mine(&mut state, idx);
                true
            }
            None => false,
        }
    }

    pub fn confirm_all(&self) -> usize {
        let pending = self.pending();
        pending.iter().filter(|h| self.confirm(h)).count()
    }

    /// How many times `method` was requested.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|m| m.as_str() == method).count()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.lock();
        state.calls.push(method.to_string());
        match method {
            methods::ACCOUNTS => Ok(if state.connected { json!(state.accounts) } else { json!([]) }),
            methods::REQUEST_ACCOUNTS => {
                if state.reject_connect {
                    return Err(ProviderError::user_rejected());
                }
                state.connected = true;
                Ok(json!(state.accounts))
            }
            methods::CALL => {
                let tx = &params[0];
                if !self.targets_contract(tx) {
                    return Ok(json!("0x"));
                }
                match self.decode(tx)? {
                    LedgerCall::GetBalance => Ok(json!(abi::encode_balance(state.balance))),
                    _ => Err(ProviderError::rpc(REVERT_CODE, "execution reverted")),
                }
            }
            methods::SEND_TRANSACTION => self.send(&mut state, &params[0]),
            methods::GET_RECEIPT => {
                let hash = params[0].as_str().unwrap_or_default();
                Ok(state
                    .txs
                    .iter()
                    .find(|t| t.hash.as_str() == hash)
                    .and_then(|t| t.outcome.map(|ok| receipt(t, ok)))
                    .unwrap_or(Value::Null))
            }
            _ => Err(ProviderError::rpc(-32601, format!("method {method} not supported"))),
        }
    }

    fn send(&self, state: &mut SimState, tx: &Value) -> Result<Value, ProviderError> {
        let from = tx["from"].as_str().and_then(|s| Address::parse(s).ok());
        let from = match from {
            Some(f) if state.connected && state.accounts.contains(&f) => f,
            _ => return Err(ProviderError::rpc(UNAUTHORIZED_CODE, "The requested account has not been authorized")),
        };
        if state.reject_signing {
            return Err(ProviderError::user_rejected());
        }
        if !self.targets_contract(tx) {
            return Err(ProviderError::rpc(REVERT_CODE, "no contract at target address"));
        }
        let call = self.decode(tx)?;
        if matches!(call, LedgerCall::Deposit(_) | LedgerCall::Withdraw(_)) && from != state.owner {
            return Err(ProviderError::rpc(REVERT_CODE, "execution reverted: You are not the owner of this account"));
        }
        if let LedgerCall::Withdraw(v) = call {
            if v > state.balance {
                return Err(ProviderError::rpc(REVERT_CODE, "execution reverted: Insufficient balance"));
            }
        }

        let hash = TxHash::new(format!("0x{:064x}", state.txs.len() + 1));
        state.txs.push(SimTx { hash: hash.clone(), call, outcome: None, block: 0 });
        if !state.manual {
            let idx = state.txs.len() - 1;
            mine(state, idx);
        }
        Ok(json!(hash))
    }

    fn targets_contract(&self, tx: &Value) -> bool {
        tx["to"]
            .as_str()
            .and_then(|s| Address::parse(s).ok())
            .is_some_and(|to| to == self.contract)
    }

    fn decode(&self, tx: &Value) -> Result<LedgerCall, ProviderError> {
        let data = tx["data"].as_str().unwrap_or("0x");
        self.abi.decode(data).map_err(|e| ProviderError::rpc(REVERT_CODE, e.to_string()))
    }
}

/// Execute a pending transaction against the contract.
fn mine(state: &mut SimState, idx: usize) {
    let call = state.txs[idx].call;
    let ok = match call {
        LedgerCall::Deposit(v) => match state.balance.checked_add(v) {
            Some(b) => {
                state.balance = b;
                true
            }
            None => false,
        },
        LedgerCall::Withdraw(v) if v <= state.balance => {
            state.balance -= v;
            true
        }
        LedgerCall::Withdraw(_) => false,
        LedgerCall::GetBalance => true,
    };
    state.height += 1;
    let tx = &mut state.txs[idx];
    tx.outcome = Some(ok);
    tx.block = state.height;
}

fn receipt(tx: &SimTx, ok: bool) -> Value {
    json!({
        "transactionHash": tx.hash,
        "blockNumber": format!("0x{:x}", tx.block),
        "status": if ok { "0x1" } else { "0x0" },
    })
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl WalletProvider for SimWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }

    fn name(&self) -> &str { "simulator" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address { Address::parse("0x00000000000000000000000000000000000000a1").unwrap() }

    fn send(wallet: &SimWallet, from: &Address, call: LedgerCall) -> Result<Value, ProviderError> {
        let data = AbiDescriptor::default().encode(call);
        wallet.handle(methods::SEND_TRANSACTION, &json!([{"from": from, "to": wallet.contract(), "data": data}]))
    }

    #[test]
    fn accounts_hidden_until_connected() {
        let wallet = SimWallet::new(owner());
        assert_eq!(wallet.handle(methods::ACCOUNTS, &json!([])).unwrap(), json!([]));
        wallet.handle(methods::REQUEST_ACCOUNTS, &json!([])).unwrap();
        assert_eq!(wallet.handle(methods::ACCOUNTS, &json!([])).unwrap(), json!([owner()]));
    }

    #[test]
    fn only_owner_may_deposit() {
        let stranger = Address::parse("0x00000000000000000000000000000000000000b2").unwrap();
        let wallet = SimWallet::new(owner()).with_accounts(vec![owner(), stranger.clone()]).connected();
        assert!(send(&wallet, &stranger, LedgerCall::Deposit(U256::from(1))).is_err());
        assert!(send(&wallet, &owner(), LedgerCall::Deposit(U256::from(1))).is_ok());
        assert_eq!(wallet.balance(), U256::from(1));
    }

    #[test]
    fn manual_mode_keeps_receipt_pending() {
        let wallet = SimWallet::new(owner()).connected().manual_confirmations();
        let hash = send(&wallet, &owner(), LedgerCall::Deposit(U256::from(4))).unwrap();
        let tx = TxHash::new(hash.as_str().unwrap());
        assert_eq!(wallet.handle(methods::GET_RECEIPT, &json!([tx])).unwrap(), Value::Null);
        assert_eq!(wallet.balance(), U256::ZERO);

        assert!(wallet.confirm(&tx));
        assert!(!wallet.confirm(&tx));
        assert_eq!(wallet.balance(), U256::from(4));
        let receipt = wallet.handle(methods::GET_RECEIPT, &json!([tx])).unwrap();
        assert_eq!(receipt["status"], "0x1");
    }

    #[test]
    fn deposit_overflowing_uint256_fails_on_chain() {
        let wallet = SimWallet::new(owner()).connected().with_balance(U256::MAX);
        let hash = send(&wallet, &owner(), LedgerCall::Deposit(U256::from(1))).unwrap();
        let receipt = wallet.handle(methods::GET_RECEIPT, &json!([hash])).unwrap();
        assert_eq!(receipt["status"], "0x0");
        assert_eq!(wallet.balance(), U256::MAX);
    }

    #[test]
    fn overdraw_reverts_at_submission() {
        let wallet = SimWallet::new(owner()).connected().with_balance(U256::from(1));
        let err = send(&wallet, &owner(), LedgerCall::Withdraw(U256::from(2))).unwrap_err();
        assert!(err.to_string().contains("Insufficient balance"));
        assert!(wallet.pending().is_empty());
    }
}
