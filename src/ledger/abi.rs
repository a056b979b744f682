//! Calldata for the ledger contract, generated from its Solidity interface.
//!
//! Selectors default to the ones derived from the function signatures below;
//! a deployment with a different interface can override them in config.

use crate::error::{AtmError, AtmResult};
use alloy_primitives::{hex, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

sol! {
    interface ILedger {
        function getBalance() external view returns (uint256);
        function deposit(uint256 amount) external;
        function withdraw(uint256 amount) external;
    }
}

/// 4-byte function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector([u8; 4]);

impl Selector {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self { Self(bytes) }
    pub fn bytes(&self) -> [u8; 4] { self.0 }
}

impl FromStr for Selector {
    type Err = AtmError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| AtmError::Abi(format!("selector {s}: {e}")))?;
        let bytes: [u8; 4] = raw
            .try_into()
            .map_err(|_| AtmError::Abi(format!("selector {s}: expected 4 bytes")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Selector {
    type Error = AtmError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self { value.to_string() }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&hex::encode_prefixed(self.0)) }
}

/// Interface descriptor of the ledger contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiDescriptor {
    pub get_balance: Selector,
    pub deposit: Selector,
    pub withdraw: Selector,
}

impl Default for AbiDescriptor {
    fn default() -> Self {
        Self {
            get_balance: Selector(ILedger::getBalanceCall::SELECTOR),
            deposit: Selector(ILedger::depositCall::SELECTOR),
            withdraw: Selector(ILedger::withdrawCall::SELECTOR),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerCall {
    GetBalance,
    Deposit(U256),
    Withdraw(U256),
}

impl AbiDescriptor {
    pub fn encode(&self, call: LedgerCall) -> String {
        let mut data = Vec::with_capacity(36);
        match call {
            LedgerCall::GetBalance => data.extend_from_slice(&self.get_balance.0),
            LedgerCall::Deposit(amount) => {
                data.extend_from_slice(&self.deposit.0);
                ILedger::depositCall { amount }.abi_encode_raw(&mut data);
            }
            LedgerCall::Withdraw(amount) => {
                data.extend_from_slice(&self.withdraw.0);
                ILedger::withdrawCall { amount }.abi_encode_raw(&mut data);
            }
        }
        hex::encode_prefixed(data)
    }

    pub fn decode(&self, calldata: &str) -> AtmResult<LedgerCall> {
        let raw = decode_hex(calldata)?;
        if raw.len() < 4 {
            return Err(AtmError::Abi("calldata shorter than a selector".into()));
        }
        let (head, args) = raw.split_at(4);
        let selector = Selector([head[0], head[1], head[2], head[3]]);
        if selector == self.get_balance {
            Ok(LedgerCall::GetBalance)
        } else if selector == self.deposit {
            let call = ILedger::depositCall::abi_decode_raw(args, true).map_err(abi_error)?;
            Ok(LedgerCall::Deposit(call.amount))
        } else if selector == self.withdraw {
            let call = ILedger::withdrawCall::abi_decode_raw(args, true).map_err(abi_error)?;
            Ok(LedgerCall::Withdraw(call.amount))
        } else {
            Err(AtmError::Abi(format!("unknown selector {selector}")))
        }
    }
}

/// Encode the `getBalance()` return value as hex.
pub fn encode_balance(balance: U256) -> String {
    hex::encode_prefixed(ILedger::getBalanceCall::abi_encode_returns(&(balance,)))
}

/// Decode `eth_call` return data of `getBalance()`.
pub fn decode_balance(data: &str) -> AtmResult<U256> {
    let raw = decode_hex(data)?;
    if raw.is_empty() {
        return Err(AtmError::Abi("empty return data (is the contract deployed?)".into()));
    }
    let returns = ILedger::getBalanceCall::abi_decode_returns(&raw, true).map_err(abi_error)?;
    Ok(returns._0)
}

fn decode_hex(data: &str) -> AtmResult<Vec<u8>> {
    hex::decode(data).map_err(|e| AtmError::Abi(format!("hex: {e}")))
}

fn abi_error(e: alloy_sol_types::Error) -> AtmError {
    AtmError::Abi(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_follow_signatures() {
        let abi = AbiDescriptor::default();
        assert_eq!(abi.get_balance.to_string(), "0x12065fe0");
        assert_eq!(abi.deposit.to_string(), "0xb6b55f25");
        assert_eq!(abi.withdraw.to_string(), "0x2e1a7d4d");
    }

    #[test]
    fn deposit_calldata_layout() {
        let abi = AbiDescriptor::default();
        let data = abi.encode(LedgerCall::Deposit(U256::from(1)));
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0xb6b55f25"));
        assert!(data.ends_with("0001"));
        assert_eq!(abi.decode(&data).unwrap(), LedgerCall::Deposit(U256::from(1)));
    }

    #[test]
    fn get_balance_has_no_arguments() {
        let abi = AbiDescriptor::default();
        assert_eq!(abi.encode(LedgerCall::GetBalance), "0x12065fe0");
        assert_eq!(abi.decode("0x12065fe0").unwrap(), LedgerCall::GetBalance);
    }

    #[test]
    fn withdraw_beyond_u128_survives() {
        let abi = AbiDescriptor::default();
        let huge = U256::from(u128::MAX) * U256::from(1000);
        let data = abi.encode(LedgerCall::Withdraw(huge));
        assert_eq!(abi.decode(&data).unwrap(), LedgerCall::Withdraw(huge));
    }

    #[test]
    fn decode_balance_rejects_short_data() {
        assert!(decode_balance("0x").is_err());
        assert!(decode_balance("0x01").is_err());
        assert!(decode_balance("not hex").is_err());
    }

    #[test]
    fn decode_balance_keeps_full_width() {
        let big = U256::from(1) << 200;
        let data = format!("0x{}01{}", "00".repeat(6), "00".repeat(25));
        assert_eq!(decode_balance(&data).unwrap(), big);
        assert_eq!(decode_balance(&encode_balance(U256::MAX)).unwrap(), U256::MAX);
        assert_eq!(decode_balance(&encode_balance(U256::from(42))).unwrap(), U256::from(42));
    }

    #[test]
    fn selector_serde_uses_hex() {
        let abi = AbiDescriptor::default();
        let v = serde_json::to_value(abi).unwrap();
        assert_eq!(v["withdraw"], "0x2e1a7d4d");
        let custom: AbiDescriptor = serde_json::from_value(serde_json::json!({
            "getBalance": "0x00000001", "deposit": "0x00000002", "withdraw": "0x00000003"
        })).unwrap();
        assert_eq!(custom.deposit.bytes(), [0, 0, 0, 2]);
        assert_eq!(custom.decode("0x00000001").unwrap(), LedgerCall::GetBalance);
        assert!("0x1234".parse::<Selector>().is_err());
    }
}
