//! TransactionLog - append-only record of confirmed ledger operations

use crate::ledger::{Amount, Direction, TxHash};
use alloy_primitives::I256;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    timestamp: DateTime<Utc>,
    direction: Direction,
    amount: Amount,
    tx: TxHash,
}

impl TransactionRecord {
    pub fn new(direction: Direction, amount: Amount, tx: TxHash) -> Self {
        Self { timestamp: Utc::now(), direction, amount, tx }
    }

    pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }
    pub fn direction(&self) -> Direction { self.direction }
    pub fn amount(&self) -> Amount { self.amount }
    pub fn tx(&self) -> &TxHash { &self.tx }

    /// Positive for deposits, negative for withdrawals.
    /// Saturates at `I256::MAX` for amounts past the signed range.
    pub fn signed_amount(&self) -> I256 {
        let raw = self.amount.get();
        let a = if raw.bit(255) { I256::MAX } else { I256::from_raw(raw) };
        match self.direction {
            Direction::Deposit => a,
            Direction::Withdraw => -a,
        }
    }

    /// `2024-05-01 12:00:00 - Withdraw: -1 ETH`
    pub fn display_line(&self) -> String {
        format!(
            "{} - {}: {} ETH",
            self.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            self.direction,
            self.signed_amount()
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TransactionLog {
    records: Vec<TransactionRecord>,
}

impl TransactionLog {
    pub fn new() -> Self { Self::default() }

    pub fn append(&mut self, record: TransactionRecord) { self.records.push(record); }

    /// Chronological, restartable (the iterator is `Clone`).
    pub fn all(&self) -> std::slice::Iter<'_, TransactionRecord> { self.records.iter() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn last(&self) -> Option<&TransactionRecord> { self.records.last() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn record(direction: Direction, amount: u64, tx: &str) -> TransactionRecord {
        TransactionRecord::new(direction, Amount::new(U256::from(amount)).unwrap(), TxHash::new(tx))
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut log = TransactionLog::new();
        log.append(record(Direction::Deposit, 2, "0x01"));
        log.append(record(Direction::Withdraw, 1, "0x02"));

        let txs: Vec<_> = log.all().map(|r| r.tx().as_str()).collect();
        assert_eq!(txs, ["0x01", "0x02"]);

        let iter = log.all();
        assert_eq!(iter.clone().count(), 2);
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn withdraw_is_negative() {
        let r = record(Direction::Withdraw, 3, "0x03");
        assert_eq!(r.signed_amount().to_string(), "-3");
        assert!(r.display_line().ends_with("Withdraw: -3 ETH"));
        assert_eq!(record(Direction::Deposit, 3, "0x04").signed_amount().to_string(), "3");
    }

    #[test]
    fn huge_withdrawal_saturates_sign() {
        let r = TransactionRecord::new(Direction::Withdraw, Amount::new(U256::MAX).unwrap(), TxHash::new("0x05"));
        assert_eq!(r.signed_amount(), -I256::MAX);
        let r = TransactionRecord::new(Direction::Deposit, Amount::new(U256::from(1) << 200).unwrap(), TxHash::new("0x06"));
        assert!(r.display_line().ends_with(&format!("Deposit: {} ETH", U256::from(1) << 200)));
    }

    #[test]
    fn serializes_as_list() {
        let mut log = TransactionLog::new();
        log.append(record(Direction::Deposit, 1, "0xaa"));
        let v = serde_json::to_value(&log).unwrap();
        assert_eq!(v[0]["direction"], "Deposit");
        assert_eq!(v[0]["amount"], "1");
        assert_eq!(v[0]["tx"], "0xaa");
    }
}
