//! The registry's participant in the ambient two-phase transaction the
//! execution environment offers (component H), re-architected per the
//! design note in §9: instead of a thread-local ambient coordinator, the
//! caller holds an explicit `Transaction` handle and threads it through
//! every mutating call. The snapshot/restore contract is unchanged.

use std::sync::atomic::{AtomicU64, Ordering};

/// A transaction boundary. Pass the same handle to every mutating
/// `Registry` call that should roll back together; call `commit` or
/// `rollback` exactly once to end it.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

impl Transaction {
    pub fn begin() -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::begin()
    }
}

/// What a `Registry` remembers about the transaction it's currently
/// enlisted in: which one, and the snapshot taken the moment it first
/// enlisted.
#[derive(Clone, Debug)]
pub(crate) struct Enlistment<S> {
    pub(crate) transaction_id: u64,
    pub(crate) snapshot: S,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transactions_get_distinct_ids() {
        let a = Transaction::begin();
        let b = Transaction::begin();
        assert_ne!(a.id(), b.id());
    }
}
