// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mutex-per-address model: the set of locks the modeled thread currently holds.

use super::{AtomicCounter, ResourceModel, ensure};
use crate::errno::EINTR;
use crate::nondet::NondetSource;
use crate::violation::{Violation, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// Identity of one lock, i.e. the address of its `struct mutex`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LockId(pub usize);

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct KeyedLockSet {
    name: String,
    held: BTreeSet<LockId>,
}

impl KeyedLockSet {
    pub fn new(name: impl Into<String>) -> Self {
        KeyedLockSet { name: name.into(), held: BTreeSet::new() }
    }

    pub fn held(&self) -> impl Iterator<Item = LockId> + '_ {
        self.held.iter().copied()
    }

    pub fn is_held(&self, id: LockId) -> bool {
        self.held.contains(&id)
    }

    pub fn acquire(&mut self, id: LockId) -> Result<(), Violation> {
        self.check_not_held(id)?;
        self.insert(id);
        Ok(())
    }

    /// Takes `id` and returns 0, or leaves it alone and returns `-EINTR`.
    pub fn acquire_interruptible(
        &mut self,
        id: LockId,
        nondet: &mut dyn NondetSource,
    ) -> Result<i32, Violation> {
        self.check_not_held(id)?;
        if nondet.any_bool() {
            self.insert(id);
            Ok(0)
        } else {
            Ok(-EINTR)
        }
    }

    pub fn try_acquire(&mut self, id: LockId) -> bool {
        if self.held.contains(&id) {
            return false;
        }
        self.insert(id);
        true
    }

    pub fn release(&mut self, id: LockId) -> Result<(), Violation> {
        ensure(self.held.contains(&id), &self.name, ViolationKind::ReleaseWithoutAcquire, || {
            format!("unlock of {id}, which is not held")
        })?;
        trace!(set = %self.name, %id, "release");
        self.held.remove(&id);
        Ok(())
    }

    /// Held by the modeled thread, or possibly by one the model does not see.
    pub fn is_acquired(&self, id: LockId, nondet: &mut dyn NondetSource) -> bool {
        self.held.contains(&id) || nondet.any_bool()
    }

    /// `atomic_dec_and_mutex_lock`: decrement `counter` and take `id` only if the counter
    /// dropped to zero. Returns whether the lock was taken.
    ///
    /// The double-acquire check happens before the counter is touched.
    pub fn decrement_and_acquire(
        &mut self,
        counter: &mut AtomicCounter,
        id: LockId,
    ) -> Result<bool, Violation> {
        if counter.read() == 1 {
            self.check_not_held(id)?;
        }
        if counter.dec_and_test() {
            self.insert(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn check_not_held(&self, id: LockId) -> Result<(), Violation> {
        ensure(!self.held.contains(&id), &self.name, ViolationKind::DoubleAcquire, || {
            format!("{id} is already held")
        })
    }

    fn insert(&mut self, id: LockId) {
        trace!(set = %self.name, %id, "acquire");
        self.held.insert(id);
    }
}

impl ResourceModel for KeyedLockSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.held.is_empty()
    }

    fn describe_state(&self) -> String {
        let held: Vec<String> = self.held.iter().map(ToString::to_string).collect();
        format!("held {{{}}}", held.join(", "))
    }

    fn reset(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nondet::{Choice, ReplaySource};

    const A: LockId = LockId(0x1000);
    const B: LockId = LockId(0x2000);

    #[test]
    fn check_is_acquired_over_approximates() {
        let mut set = KeyedLockSet::new("mutexes");
        let mut nondet = ReplaySource::new([Choice::Bool(true), Choice::Bool(false)]);
        assert!(set.is_acquired(A, &mut nondet));
        assert!(!set.is_acquired(A, &mut nondet));

        // A lock held by the modeled thread answers without drawing a choice.
        set.acquire(B).unwrap();
        let mut empty = ReplaySource::default();
        assert!(set.is_acquired(B, &mut empty));
        assert_eq!(empty.missing(), 0);
    }

    #[test]
    fn check_distinct_locks_nest() {
        let mut set = KeyedLockSet::new("mutexes");
        set.acquire(A).unwrap();
        set.acquire(B).unwrap();
        assert_eq!(set.held().collect::<Vec<_>>(), vec![A, B]);
        set.release(A).unwrap();
        set.release(B).unwrap();
        assert!(set.check_final_state().is_ok());
    }

    #[test]
    fn check_same_lock_twice() {
        let mut set = KeyedLockSet::new("mutexes");
        set.acquire(A).unwrap();
        assert_eq!(set.acquire(A).unwrap_err().kind, ViolationKind::DoubleAcquire);
        assert_eq!(set.release(B).unwrap_err().kind, ViolationKind::ReleaseWithoutAcquire);
        let residual = set.check_final_state().unwrap_err();
        assert_eq!(residual.kind, ViolationKind::ResidualStateAtTeardown);
        assert!(residual.detail.contains("0x1000"));
    }

    #[test]
    fn check_try_and_interruptible() {
        let mut set = KeyedLockSet::new("mutexes");
        assert!(set.try_acquire(A));
        assert!(!set.try_acquire(A));
        let mut nondet = ReplaySource::new([Choice::Bool(false), Choice::Bool(true)]);
        assert_eq!(set.acquire_interruptible(B, &mut nondet), Ok(-EINTR));
        assert!(!set.is_held(B));
        assert_eq!(set.acquire_interruptible(B, &mut nondet), Ok(0));
        assert!(set.is_held(B));
    }

    #[test]
    fn check_decrement_and_acquire() {
        let mut set = KeyedLockSet::new("mutexes");
        let mut counter = AtomicCounter::new(2);
        assert_eq!(set.decrement_and_acquire(&mut counter, A), Ok(false));
        assert!(!set.is_held(A));
        assert_eq!(set.decrement_and_acquire(&mut counter, A), Ok(true));
        assert!(set.is_held(A));
        assert_eq!(counter.read(), 0);
        set.release(A).unwrap();
    }

    #[test]
    fn check_decrement_and_acquire_while_held() {
        let mut set = KeyedLockSet::new("mutexes");
        let mut counter = AtomicCounter::new(1);
        set.acquire(A).unwrap();
        let violation = set.decrement_and_acquire(&mut counter, A).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::DoubleAcquire);
        assert_eq!(counter.read(), 1);
    }
}
