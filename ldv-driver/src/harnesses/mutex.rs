// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `mutex_lock` and friends, on the single mutex and on mutexes told apart by address.

use super::{Expectation, HarnessMetadata, ModelFamily};
use ldv::errno::EINTR;
use ldv::models::{AtomicCounter, LockId};
use ldv::{Environment, Halt, NondetSource, ViolationKind};

const DEV_LOCK: LockId = LockId(0x8800_1000);
const LIST_LOCK: LockId = LockId(0x8800_2000);

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "mutex::check_lock_unlock",
        family: ModelFamily::Mutex,
        description: "lock, critical section, unlock",
        expected: Expectation::Safe,
        env: None,
        scenario: check_lock_unlock,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_double_lock",
        family: ModelFamily::Mutex,
        description: "a helper takes the lock its caller already holds",
        expected: Expectation::Violation(ViolationKind::DoubleAcquire),
        env: None,
        scenario: check_double_lock,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_unlock_without_lock",
        family: ModelFamily::Mutex,
        description: "cleanup unlocks a mutex the fast path never took",
        expected: Expectation::Violation(ViolationKind::ReleaseWithoutAcquire),
        env: None,
        scenario: check_unlock_without_lock,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_missing_unlock_on_error_path",
        family: ModelFamily::Mutex,
        description: "an early return on error leaves the mutex locked",
        expected: Expectation::Violation(ViolationKind::ResidualStateAtTeardown),
        env: None,
        scenario: check_missing_unlock_on_error_path,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_interruptible_checked",
        family: ModelFamily::Mutex,
        description: "mutex_lock_interruptible with its result checked",
        expected: Expectation::Safe,
        env: None,
        scenario: check_interruptible_checked,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_interruptible_unchecked",
        family: ModelFamily::Mutex,
        description: "mutex_lock_interruptible with its result ignored",
        expected: Expectation::Violation(ViolationKind::ReleaseWithoutAcquire),
        env: None,
        scenario: check_interruptible_unchecked,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_trylock",
        family: ModelFamily::Mutex,
        description: "mutex_trylock, unlocking only on success",
        expected: Expectation::Safe,
        env: None,
        scenario: check_trylock,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_is_locked_guard",
        family: ModelFamily::Mutex,
        description: "skip the work when mutex_is_locked says someone is busy",
        expected: Expectation::Safe,
        env: None,
        scenario: check_is_locked_guard,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_nested_keyed",
        family: ModelFamily::Mutex,
        description: "two distinct mutexes, nested and released in reverse order",
        expected: Expectation::Safe,
        env: None,
        scenario: check_nested_keyed,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_same_keyed_twice",
        family: ModelFamily::Mutex,
        description: "the device mutex taken again through an alias",
        expected: Expectation::Violation(ViolationKind::DoubleAcquire),
        env: None,
        scenario: check_same_keyed_twice,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_dec_and_lock",
        family: ModelFamily::Mutex,
        description: "atomic_dec_and_mutex_lock on the last reference",
        expected: Expectation::Safe,
        env: None,
        scenario: check_dec_and_lock,
    },
    HarnessMetadata {
        pretty_name: "mutex::check_dec_and_lock_while_held",
        family: ModelFamily::Mutex,
        description: "atomic_dec_and_mutex_lock while already holding the mutex",
        expected: Expectation::Violation(ViolationKind::DoubleAcquire),
        env: None,
        scenario: check_dec_and_lock_while_held,
    },
];

fn check_lock_unlock(env: &mut Environment, _: &mut dyn NondetSource) -> Result<(), Halt> {
    env.mutex.acquire()?;
    env.mutex.release()?;
    Ok(())
}

fn check_double_lock(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.mutex.acquire()?;
    if nondet.any_bool() {
        // Refresh path calls back into a locking helper.
        env.mutex.acquire()?;
    }
    env.mutex.release()?;
    Ok(())
}

fn check_unlock_without_lock(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let cached = nondet.any_bool();
    if !cached {
        env.mutex.acquire()?;
    }
    env.mutex.release()?;
    Ok(())
}

fn check_missing_unlock_on_error_path(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    env.mutex.acquire()?;
    let ret = nondet.undef_int();
    if ret < 0 {
        return Ok(());
    }
    env.mutex.release()?;
    Ok(())
}

fn check_interruptible_checked(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    if env.mutex.acquire_interruptible(nondet)? == -EINTR {
        return Ok(());
    }
    env.mutex.release()?;
    Ok(())
}

fn check_interruptible_unchecked(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let _ = env.mutex.acquire_killable(nondet)?;
    env.mutex.release()?;
    Ok(())
}

fn check_trylock(env: &mut Environment, _: &mut dyn NondetSource) -> Result<(), Halt> {
    if env.mutex.try_acquire() {
        env.mutex.release()?;
    }
    Ok(())
}

fn check_is_locked_guard(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    if env.mutex.is_acquired(nondet) {
        return Ok(());
    }
    env.mutex.acquire()?;
    env.mutex.release()?;
    Ok(())
}

fn check_nested_keyed(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.mutexes.acquire(DEV_LOCK)?;
    if env.mutexes.acquire_interruptible(LIST_LOCK, nondet)? == 0 {
        env.mutexes.release(LIST_LOCK)?;
    }
    env.mutexes.release(DEV_LOCK)?;
    Ok(())
}

fn check_same_keyed_twice(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let target = if nondet.any_bool() { DEV_LOCK } else { LIST_LOCK };
    env.mutexes.acquire(DEV_LOCK)?;
    env.mutexes.acquire(target)?;
    env.mutexes.release(target)?;
    env.mutexes.release(DEV_LOCK)?;
    Ok(())
}

fn check_dec_and_lock(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let mut users = AtomicCounter::new(nondet.undef_int_positive());
    if env.mutexes.decrement_and_acquire(&mut users, DEV_LOCK)? {
        // Last user gone: tear down under the lock.
        env.mutexes.release(DEV_LOCK)?;
    }
    Ok(())
}

fn check_dec_and_lock_while_held(
    env: &mut Environment,
    _: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let mut users = AtomicCounter::new(1);
    env.mutexes.acquire(DEV_LOCK)?;
    if env.mutexes.decrement_and_acquire(&mut users, DEV_LOCK)? {
        env.mutexes.release(DEV_LOCK)?;
    }
    env.mutexes.release(DEV_LOCK)?;
    Ok(())
}
