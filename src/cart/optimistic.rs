//! # Optimistic Commands
//!
//! Every cart mutation follows the same four steps:
//!
//! 1. snapshot the live state as it is *when the mutation is issued*
//! 2. apply the change locally, synchronously
//! 3. invoke the remote authority
//! 4. on failure, restore that mutation's own snapshot
//!
//! [`OptimisticLedger`] owns steps 1, 2 and 4; the caller runs step 3 and
//! reports the outcome with [`OptimisticLedger::settle`]. Each pending
//! mutation keeps its own snapshot, so two interleaved mutations each roll
//! back to their own prior state.
//!
//! [`OptimisticLedger::reset`] forgets every pending mutation (identity
//! change, wholesale reload). Settlements that arrive afterwards are
//! [`Settled::Stale`] and leave the state alone.

use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(u64);

impl Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// An in-flight `(operation, previous snapshot)` pair.
#[derive(Debug, Clone)]
pub struct PendingMutation<S> {
    pub id: MutationId,
    pub label: &'static str,
    pub epoch: u64,
    pub snapshot: S,
}

/// What [`OptimisticLedger::settle`] did with a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Committed,
    RolledBack,
    /// The mutation was forgotten by a reset; state untouched.
    Stale,
}

#[derive(Debug)]
pub struct OptimisticLedger<S> {
    pending: HashMap<MutationId, PendingMutation<S>>,
    next_id: u64,
    epoch: u64,
}

impl<S> Default for OptimisticLedger<S> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
            epoch: 0,
        }
    }
}

impl<S: Clone> OptimisticLedger<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Applies `change` to `state` and records the pre-change snapshot.
    ///
    /// `change` runs against a copy; if it fails, `state` is untouched and
    /// nothing is recorded.
    pub fn begin<E>(
        &mut self,
        label: &'static str,
        state: &mut S,
        change: impl FnOnce(&mut S) -> Result<(), E>,
    ) -> Result<MutationId, E> {
        let snapshot = state.clone();
        let mut candidate = state.clone();
        change(&mut candidate)?;
        *state = candidate;

        let id = MutationId(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingMutation {
                id,
                label,
                epoch: self.epoch,
                snapshot,
            },
        );
        Ok(id)
    }

    /// Finishes a mutation: keeps the optimistic state on success, restores
    /// the mutation's snapshot on failure.
    pub fn settle(&mut self, id: MutationId, state: &mut S, succeeded: bool) -> Settled {
        let Some(pending) = self.pending.remove(&id) else {
            return Settled::Stale;
        };
        if succeeded {
            Settled::Committed
        } else {
            *state = pending.snapshot;
            Settled::RolledBack
        }
    }

    /// Forgets all pending mutations and starts a new epoch.
    pub fn reset(&mut self) -> u64 {
        self.pending.clear();
        self.epoch += 1;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_restores_own_snapshot() {
        let mut ledger = OptimisticLedger::new();
        let mut state = vec![1];

        let id = ledger
            .begin("push", &mut state, |s| {
                s.push(2);
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(state, vec![1, 2]);

        assert_eq!(ledger.settle(id, &mut state, false), Settled::RolledBack);
        assert_eq!(state, vec![1]);
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn interleaved_mutations_keep_separate_snapshots() {
        let mut ledger = OptimisticLedger::new();
        let mut state = vec![1];

        let first = ledger
            .begin("a", &mut state, |s| {
                s.push(2);
                Ok::<_, ()>(())
            })
            .unwrap();
        let second = ledger
            .begin("b", &mut state, |s| {
                s.push(3);
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(ledger.settle(second, &mut state, false), Settled::RolledBack);
        assert_eq!(state, vec![1, 2]);
        assert_eq!(ledger.settle(first, &mut state, true), Settled::Committed);
        assert_eq!(state, vec![1, 2]);
    }

    #[test]
    fn failed_change_records_nothing() {
        let mut ledger = OptimisticLedger::<Vec<i32>>::new();
        let mut state = vec![1];

        let result = ledger.begin("bad", &mut state, |s| {
            s.clear();
            Err("rejected")
        });
        assert_eq!(result, Err("rejected"));
        assert_eq!(state, vec![1]);
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn reset_makes_settlements_stale() {
        let mut ledger = OptimisticLedger::new();
        let mut state = 10;
        let id = ledger
            .begin("inc", &mut state, |s| {
                *s += 1;
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(ledger.reset(), 1);
        state = 0;
        assert_eq!(ledger.settle(id, &mut state, false), Settled::Stale);
        assert_eq!(state, 0);
    }
}
