// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary lock model for a single mutex or spinlock.

use super::{ResourceModel, ensure};
use crate::errno::EINTR;
use crate::nondet::NondetSource;
use crate::violation::{Violation, ViolationKind};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LockState {
    #[default]
    Free,
    Locked,
}

/// A lock that is either free or held by the modeled thread.
#[derive(Debug, Clone)]
pub struct BinaryLock {
    name: String,
    state: LockState,
}

impl BinaryLock {
    pub fn new(name: impl Into<String>) -> Self {
        BinaryLock { name: name.into(), state: LockState::Free }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// `mutex_lock` / `spin_lock`.
    pub fn acquire(&mut self) -> Result<(), Violation> {
        self.check_free()?;
        self.set(LockState::Locked);
        Ok(())
    }

    /// `mutex_lock_interruptible`. Either takes the lock and returns 0, or is interrupted and
    /// returns `-EINTR` with the lock untouched. Which one happens is up to `nondet`.
    pub fn acquire_interruptible(
        &mut self,
        nondet: &mut dyn NondetSource,
    ) -> Result<i32, Violation> {
        self.check_free()?;
        if nondet.any_bool() {
            self.set(LockState::Locked);
            Ok(0)
        } else {
            trace!(lock = %self.name, "interrupted");
            Ok(-EINTR)
        }
    }

    /// `mutex_lock_killable` has the same contract as the interruptible variant.
    pub fn acquire_killable(&mut self, nondet: &mut dyn NondetSource) -> Result<i32, Violation> {
        self.acquire_interruptible(nondet)
    }

    /// `mutex_trylock` / `spin_trylock`. Returns `true` when the lock was taken.
    /// Failing to take a held lock is a normal outcome, not a violation.
    pub fn try_acquire(&mut self) -> bool {
        if self.state == LockState::Locked {
            return false;
        }
        self.set(LockState::Locked);
        true
    }

    /// `mutex_unlock` / `spin_unlock`.
    pub fn release(&mut self) -> Result<(), Violation> {
        ensure(self.state == LockState::Locked, &self.name, ViolationKind::ReleaseWithoutAcquire, || {
            "unlock of a lock that is not held".to_string()
        })?;
        self.set(LockState::Free);
        Ok(())
    }

    /// `mutex_is_locked` / `spin_is_locked`.
    ///
    /// Answers `true` when the modeled thread holds the lock, and otherwise lets `nondet`
    /// decide: another thread the model does not see may hold it.
    pub fn is_acquired(&self, nondet: &mut dyn NondetSource) -> bool {
        self.state == LockState::Locked || nondet.any_bool()
    }

    /// Whether the modeled thread itself holds the lock.
    pub fn is_held(&self) -> bool {
        self.state == LockState::Locked
    }

    /// Allocation with `flags` while this lock may be held. A spinlock holder must not sleep,
    /// so an allocation that may block is a violation.
    pub fn check_may_sleep(&self, flags: GfpFlags) -> Result<(), Violation> {
        ensure(
            !(self.is_held() && flags.allows_blocking()),
            &self.name,
            ViolationKind::SleepInAtomicContext,
            || format!("allocation with {flags} may sleep while the lock is held"),
        )
    }

    fn check_free(&self) -> Result<(), Violation> {
        ensure(self.state == LockState::Free, &self.name, ViolationKind::DoubleAcquire, || {
            "lock is already held".to_string()
        })
    }

    fn set(&mut self, state: LockState) {
        trace!(lock = %self.name, from = %self.state, to = %state, "transition");
        self.state = state;
    }
}

impl ResourceModel for BinaryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.state == LockState::Free
    }

    fn describe_state(&self) -> String {
        self.state.to_string()
    }

    fn reset(&mut self) {
        self.state = LockState::Free;
    }
}

/// Memory allocation flags (`gfp_t`), reduced to the bits the sleep check needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GfpFlags(pub u32);

impl GfpFlags {
    pub const HIGH: GfpFlags = GfpFlags(0x20);
    pub const IO: GfpFlags = GfpFlags(0x40);
    pub const FS: GfpFlags = GfpFlags(0x80);
    pub const DIRECT_RECLAIM: GfpFlags = GfpFlags(0x400);
    pub const KSWAPD_RECLAIM: GfpFlags = GfpFlags(0x800);

    pub const ATOMIC: GfpFlags = GfpFlags(Self::HIGH.0 | Self::KSWAPD_RECLAIM.0);
    pub const NOWAIT: GfpFlags = Self::KSWAPD_RECLAIM;
    pub const NOIO: GfpFlags = GfpFlags(Self::DIRECT_RECLAIM.0 | Self::KSWAPD_RECLAIM.0);
    pub const NOFS: GfpFlags = GfpFlags(Self::NOIO.0 | Self::IO.0);
    pub const KERNEL: GfpFlags = GfpFlags(Self::NOFS.0 | Self::FS.0);

    /// `gfpflags_allow_blocking`.
    pub fn allows_blocking(self) -> bool {
        self.0 & Self::DIRECT_RECLAIM.0 != 0
    }
}

impl std::fmt::Display for GfpFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            GfpFlags::ATOMIC => write!(f, "GFP_ATOMIC"),
            GfpFlags::NOWAIT => write!(f, "GFP_NOWAIT"),
            GfpFlags::NOIO => write!(f, "GFP_NOIO"),
            GfpFlags::NOFS => write!(f, "GFP_NOFS"),
            GfpFlags::KERNEL => write!(f, "GFP_KERNEL"),
            GfpFlags(bits) => write!(f, "gfp {bits:#x}"),
        }
    }
}
