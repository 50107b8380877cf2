//! Swap context glue object (spec.md §4.12, component C12).

use crate::lock::LockId;
use swapcore_core::{KeyRequest, Residency, TxId};

/// Carries one key-request's state across the C6 → C7 → C5 → C3 → C4
/// pipeline. Created by the extractor, anchored onto its lock (the
/// `pd` payload the lock's proceed/unlock callbacks close over), and
/// dropped once the completion queue has delivered its result back to
/// the caller.
pub struct SwapCtx {
    /// The request this context was extracted from.
    pub request: KeyRequest,
    /// The lock node guarding this request, once acquired.
    pub lock: Option<LockId>,
    /// Residency observed when the request was extracted; used to
    /// decide the swap intention. Callers that hold a context across a
    /// suspension point (e.g. a background swap) can compare it against
    /// the residency observed once control returns, via
    /// [`Self::raced_with_concurrent_swap`], to detect a concurrent
    /// in-flight swap on the same key. Nothing in this single-threaded
    /// executor does so today — see DESIGN.md.
    pub residency_at_extract: Residency,
    /// Set once the synchronous half of the request has run; a context
    /// with `proceeded == true` is waiting only on background I/O.
    pub proceeded: bool,
}

impl SwapCtx {
    /// A fresh context for `request`, not yet locked.
    pub fn new(request: KeyRequest, residency_at_extract: Residency) -> Self {
        SwapCtx { request, lock: None, residency_at_extract, proceeded: false }
    }

    /// The transaction this context belongs to.
    pub fn txid(&self) -> TxId {
        self.request.txid
    }

    /// `true` if `current` differs from the residency observed at
    /// extraction time — a concurrent swap touched this key while this
    /// context was in flight.
    pub fn raced_with_concurrent_swap(&self, current: Residency) -> bool {
        self.residency_at_extract != current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapcore_core::{Intention, IntentionFlags, KeyRequest};

    #[test]
    fn fresh_context_is_unlocked_and_not_proceeded() {
        let req = KeyRequest::whole_key(
            TxId::from_raw(1),
            0,
            b"k".to_vec(),
            Intention::In,
            IntentionFlags::empty(),
        );
        let ctx = SwapCtx::new(req, Residency::Hot);
        assert!(ctx.lock.is_none());
        assert!(!ctx.proceeded);
    }

    #[test]
    fn raced_with_concurrent_swap_detects_a_residency_change() {
        let req = KeyRequest::whole_key(
            TxId::from_raw(1),
            0,
            b"k".to_vec(),
            Intention::In,
            IntentionFlags::empty(),
        );
        let ctx = SwapCtx::new(req, Residency::Warm);
        assert!(!ctx.raced_with_concurrent_swap(Residency::Warm));
        assert!(ctx.raced_with_concurrent_swap(Residency::Hot));
    }
}
