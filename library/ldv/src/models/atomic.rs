// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `atomic_t`. The model has no contract of its own; it is the counter that
//! [`KeyedLockSet::decrement_and_acquire`](super::KeyedLockSet::decrement_and_acquire) works on.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtomicCounter {
    value: i32,
}

impl AtomicCounter {
    /// `ATOMIC_INIT`.
    pub const fn new(value: i32) -> Self {
        AtomicCounter { value }
    }

    pub fn read(&self) -> i32 {
        self.value
    }

    pub fn set(&mut self, value: i32) {
        self.value = value;
    }

    pub fn inc(&mut self) {
        self.add_return(1);
    }

    pub fn dec(&mut self) {
        self.sub_return(1);
    }

    pub fn add_return(&mut self, delta: i32) -> i32 {
        self.value = self.value.wrapping_add(delta);
        trace!(value = self.value, "atomic");
        self.value
    }

    pub fn sub_return(&mut self, delta: i32) -> i32 {
        self.add_return(delta.wrapping_neg())
    }

    /// Decrement and report whether the counter reached zero.
    pub fn dec_and_test(&mut self) -> bool {
        self.sub_return(1) == 0
    }

    pub fn inc_and_test(&mut self) -> bool {
        self.add_return(1) == 0
    }
}
