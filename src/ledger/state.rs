//! LedgerState - last trusted balance plus the sequencing guard.
//!
//! Every mutating operation takes an operation number at submission. Every
//! balance read takes a stamp `(op, read)` when it is issued. A read is applied
//! only if its stamp is not older than the last applied one, so a slow refresh
//! for an earlier operation can never overwrite a newer balance.
//!
//! A discarded read that was issued after the applied one may have seen an
//! operation the applied read missed (confirmations arriving out of order).
//! The balance then stays untrusted until a read issued later is applied.

use super::types::quantity;
use crate::error::{AtmError, AtmResult};
use alloy_primitives::U256;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Stamp {
    pub op: u64,
    pub read: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerState {
    #[serde(serialize_with = "quantity::option::serialize")]
    balance: Option<U256>,
    in_flight: u32,
    applied: Option<Stamp>,
    discarded: u64,
    /// Read ticket of the newest discarded read that was issued after the
    /// applied one. Cleared by applying a read issued later still.
    refresh_after: Option<u64>,
    #[serde(skip)]
    last_op: u64,
    #[serde(skip)]
    last_read: u64,
}

impl LedgerState {
    /// `None` until the first successful read.
    pub fn balance(&self) -> Option<U256> { self.balance }

    /// True while an operation is between submission and confirmation, or
    /// while the applied balance may miss a confirmed operation.
    pub fn is_stale(&self) -> bool { self.in_flight > 0 || self.needs_refresh() }

    pub fn needs_refresh(&self) -> bool { self.refresh_after.is_some() }

    pub fn in_flight(&self) -> u32 { self.in_flight }

    pub fn applied(&self) -> Option<Stamp> { self.applied }

    /// Refreshes thrown away by the stamp guard so far.
    pub fn discarded(&self) -> u64 { self.discarded }

    pub fn last_op(&self) -> u64 { self.last_op }

    pub(crate) fn issue_op(&mut self) -> u64 {
        self.last_op += 1;
        self.last_op
    }

    pub(crate) fn stamp_read(&mut self, op: u64) -> Stamp {
        self.last_read += 1;
        Stamp { op, read: self.last_read }
    }

    pub(crate) fn begin(&mut self) { self.in_flight += 1; }

    pub(crate) fn end(&mut self) { self.in_flight = self.in_flight.saturating_sub(1); }

    /// Apply a balance read, or discard it when a newer one is already applied.
    pub fn apply(&mut self, stamp: Stamp, balance: U256) -> AtmResult<()> {
        if let Some(applied) = self.applied {
            if stamp < applied {
                self.discarded += 1;
                if stamp.read > applied.read {
                    self.refresh_after = Some(self.refresh_after.map_or(stamp.read, |r| r.max(stamp.read)));
                }
                tracing::debug!(?stamp, ?applied, "discarding stale balance refresh");
                return Err(AtmError::StaleConfirmationDiscarded);
            }
        }
        self.applied = Some(stamp);
        self.balance = Some(balance);
        if self.refresh_after.is_some_and(|r| stamp.read > r) {
            self.refresh_after = None;
        }
        Ok(())
    }

    /// Drop the trusted balance (account changed or disconnected). Counters
    /// keep running so older reads still lose against newer ones.
    pub(crate) fn forget(&mut self) {
        self.balance = None;
        self.refresh_after = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> U256 { U256::from(v) }

    #[test]
    fn unknown_until_first_read() {
        let mut state = LedgerState::default();
        assert_eq!(state.balance(), None);
        let stamp = state.stamp_read(state.last_op());
        state.apply(stamp, n(10)).unwrap();
        assert_eq!(state.balance(), Some(n(10)));
    }

    #[test]
    fn older_operation_refresh_is_discarded() {
        let mut state = LedgerState::default();
        let first = state.issue_op();
        let second = state.issue_op();

        let late = state.stamp_read(second);
        state.apply(late, n(12)).unwrap();

        let early = state.stamp_read(first);
        assert_eq!(state.apply(early, n(11)), Err(AtmError::StaleConfirmationDiscarded));
        assert_eq!(state.balance(), Some(n(12)));
        assert_eq!(state.discarded(), 1);
    }

    #[test]
    fn reads_for_same_operation_order_by_issue() {
        let mut state = LedgerState::default();
        let op = state.issue_op();
        let query = state.stamp_read(op);
        let refresh = state.stamp_read(op);
        state.apply(refresh, n(5)).unwrap();
        assert!(state.apply(query, n(4)).is_err());
        assert_eq!(state.balance(), Some(n(5)));
        assert!(!state.needs_refresh(), "an earlier-issued read knows nothing newer");
    }

    #[test]
    fn later_issued_discard_leaves_balance_untrusted() {
        let mut state = LedgerState::default();
        let first = state.issue_op();
        let second = state.issue_op();

        // #2 confirms first, then #1; #1's refresh is issued last.
        let second_refresh = state.stamp_read(second);
        state.apply(second_refresh, n(2)).unwrap();
        let first_refresh = state.stamp_read(first);
        assert!(state.apply(first_refresh, n(3)).is_err());

        assert_eq!(state.balance(), Some(n(2)));
        assert!(state.needs_refresh());
        assert!(state.is_stale());

        let follow_up = state.stamp_read(state.last_op());
        state.apply(follow_up, n(3)).unwrap();
        assert_eq!(state.balance(), Some(n(3)));
        assert!(!state.is_stale());
    }

    #[test]
    fn read_issued_before_the_discard_keeps_flag() {
        let mut state = LedgerState::default();
        let first = state.issue_op();
        let second = state.issue_op();

        let applied = state.stamp_read(second);
        state.apply(applied, n(2)).unwrap();
        let between = state.stamp_read(second);
        let discarded = state.stamp_read(first);
        assert!(state.apply(discarded, n(3)).is_err());

        state.apply(between, n(2)).unwrap();
        assert!(state.needs_refresh());
    }

    #[test]
    fn in_flight_marks_stale() {
        let mut state = LedgerState::default();
        state.begin();
        assert!(state.is_stale());
        state.end();
        state.end();
        assert!(!state.is_stale());
    }
}
