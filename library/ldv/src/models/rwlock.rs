// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read/write lock model.
//!
//! The state is a pair of counters that both start at 1: `rlock` is one more than the number
//! of readers, `wlock` is 2 while a writer holds the lock. The `_irq`, `_bh` and `_irqsave`
//! variants of the kernel API share these counters; the `_irqsave` ones only thread an
//! [`IrqFlags`] token through.

use super::{ResourceModel, ensure};
use crate::nondet::NondetSource;
use crate::violation::{Violation, ViolationKind};
use tracing::trace;

const FREE: u32 = 1;
const WRITE_HELD: u32 = 2;

/// Interrupt state saved by an `_irqsave` call and handed back to `_irqrestore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqFlags(pub usize);

#[derive(Debug, Clone)]
pub struct RwLockPair {
    name: String,
    rlock: u32,
    wlock: u32,
}

impl RwLockPair {
    pub fn new(name: impl Into<String>) -> Self {
        RwLockPair { name: name.into(), rlock: FREE, wlock: FREE }
    }

    /// Number of read locks currently held.
    pub fn readers(&self) -> u32 {
        self.rlock - FREE
    }

    pub fn is_write_locked(&self) -> bool {
        self.wlock != FREE
    }

    pub fn read_lock(&mut self) -> Result<(), Violation> {
        self.check_no_writer("read_lock")?;
        self.rlock = self.rlock.saturating_add(1);
        trace!(lock = %self.name, readers = self.readers(), "read_lock");
        Ok(())
    }

    pub fn read_unlock(&mut self) -> Result<(), Violation> {
        ensure(self.rlock > FREE, &self.name, ViolationKind::ReleaseWithoutAcquire, || {
            "read_unlock without a read lock held".to_string()
        })?;
        self.rlock -= 1;
        trace!(lock = %self.name, readers = self.readers(), "read_unlock");
        Ok(())
    }

    pub fn write_lock(&mut self) -> Result<(), Violation> {
        self.check_no_writer("write_lock")?;
        self.wlock = WRITE_HELD;
        trace!(lock = %self.name, "write_lock");
        Ok(())
    }

    pub fn write_unlock(&mut self) -> Result<(), Violation> {
        ensure(self.wlock != FREE, &self.name, ViolationKind::ReleaseWithoutAcquire, || {
            "write_unlock without the write lock held".to_string()
        })?;
        self.wlock = FREE;
        trace!(lock = %self.name, "write_unlock");
        Ok(())
    }

    pub fn read_lock_irqsave(&mut self) -> Result<IrqFlags, Violation> {
        self.read_lock()?;
        Ok(IrqFlags::default())
    }

    pub fn read_unlock_irqrestore(&mut self, _flags: IrqFlags) -> Result<(), Violation> {
        self.read_unlock()
    }

    pub fn write_lock_irqsave(&mut self) -> Result<IrqFlags, Violation> {
        self.write_lock()?;
        Ok(IrqFlags::default())
    }

    pub fn write_unlock_irqrestore(&mut self, _flags: IrqFlags) -> Result<(), Violation> {
        self.write_unlock()
    }

    /// `read_trylock`: succeeds only when no writer holds the lock, and even then only if
    /// `nondet` says so.
    pub fn try_read_lock(&mut self, nondet: &mut dyn NondetSource) -> bool {
        if self.wlock == FREE && nondet.any_bool() {
            self.rlock = self.rlock.saturating_add(1);
            trace!(lock = %self.name, readers = self.readers(), "read_trylock");
            true
        } else {
            false
        }
    }

    /// `write_trylock`, with the same rules as [`Self::try_read_lock`].
    pub fn try_write_lock(&mut self, nondet: &mut dyn NondetSource) -> bool {
        if self.wlock == FREE && nondet.any_bool() {
            self.wlock = WRITE_HELD;
            trace!(lock = %self.name, "write_trylock");
            true
        } else {
            false
        }
    }

    fn check_no_writer(&self, op: &str) -> Result<(), Violation> {
        ensure(self.wlock == FREE, &self.name, ViolationKind::DoubleAcquire, || {
            format!("{op} while the write lock is held")
        })
    }
}

impl ResourceModel for RwLockPair {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.rlock == FREE && self.wlock == FREE
    }

    fn describe_state(&self) -> String {
        format!("rlock={} wlock={}", self.rlock, self.wlock)
    }

    fn reset(&mut self) {
        self.rlock = FREE;
        self.wlock = FREE;
    }
}
