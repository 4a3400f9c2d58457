// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource-state models, one module per kernel API family.
//!
//! Each model is a small state machine: a guarded transition checks its precondition before it
//! touches the state, and a failed check becomes a [`Violation`]. The only calls that do not
//! treat misuse as a violation are the ones the kernel itself tolerates (e.g. a `module_put`
//! on a null module).

use crate::violation::{Violation, ViolationKind};

pub mod atomic;
pub mod claim;
pub mod err_ptr;
pub mod lock;
pub mod lock_set;
pub mod refcount;
pub mod rwlock;

pub use atomic::AtomicCounter;
pub use claim::{ClaimToken, OwnerId};
pub use err_ptr::ErrPtrCodec;
pub use lock::{BinaryLock, GfpFlags, LockState};
pub use lock_set::{KeyedLockSet, LockId};
pub use refcount::{ModuleRef, RefCountConfig, RefCounter};
pub use rwlock::{IrqFlags, RwLockPair};

/// The part of every stateful model the final-state check relies on.
pub trait ResourceModel {
    /// The instance name violations are attributed to.
    fn name(&self) -> &str;

    /// Whether the model is back in its initial state.
    fn is_idle(&self) -> bool;

    /// Short human readable rendering of the current state.
    fn describe_state(&self) -> String;

    /// Return to the initial state, as if freshly constructed.
    fn reset(&mut self);

    fn check_final_state(&self) -> Result<(), Violation> {
        ensure(self.is_idle(), self.name(), ViolationKind::ResidualStateAtTeardown, || {
            format!("not idle at teardown: {}", self.describe_state())
        })
    }
}

/// Guard of every transition: `Ok(())` when `cond` holds, the violation otherwise.
/// `detail` is only rendered on failure.
pub(crate) fn ensure<F>(
    cond: bool,
    model: &str,
    kind: ViolationKind,
    detail: F,
) -> Result<(), Violation>
where
    F: FnOnce() -> String,
{
    if cond {
        Ok(())
    } else {
        let violation = Violation::new(model, kind, detail());
        tracing::debug!(model, %kind, detail = %violation.detail, "violation");
        Err(violation)
    }
}
