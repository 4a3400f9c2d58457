// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Expectation, HarnessMetadata, ModelFamily};
use ldv::{Environment, Halt, NondetSource, ViolationKind};

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "rwlock::check_nested_readers",
        family: ModelFamily::Rwlock,
        description: "read_lock taken recursively by a lookup helper",
        expected: Expectation::Safe,
        env: None,
        scenario: check_nested_readers,
    },
    HarnessMetadata {
        pretty_name: "rwlock::check_write_then_read",
        family: ModelFamily::Rwlock,
        description: "an updater calls a reader helper while holding the write lock",
        expected: Expectation::Violation(ViolationKind::DoubleAcquire),
        env: None,
        scenario: check_write_then_read,
    },
    HarnessMetadata {
        pretty_name: "rwlock::check_irqsave_pairs",
        family: ModelFamily::Rwlock,
        description: "read and write sections with the _irqsave variants",
        expected: Expectation::Safe,
        env: None,
        scenario: check_irqsave_pairs,
    },
    HarnessMetadata {
        pretty_name: "rwlock::check_trylock",
        family: ModelFamily::Rwlock,
        description: "write_trylock and read_trylock, unlocking only on success",
        expected: Expectation::Safe,
        env: None,
        scenario: check_trylock,
    },
    HarnessMetadata {
        pretty_name: "rwlock::check_unbalanced_read_unlock",
        family: ModelFamily::Rwlock,
        description: "read_unlock once more than read_lock",
        expected: Expectation::Violation(ViolationKind::ReleaseWithoutAcquire),
        env: None,
        scenario: check_unbalanced_read_unlock,
    },
    HarnessMetadata {
        pretty_name: "rwlock::check_writer_leak",
        family: ModelFamily::Rwlock,
        description: "an error return inside the write section",
        expected: Expectation::Violation(ViolationKind::ResidualStateAtTeardown),
        env: None,
        scenario: check_writer_leak,
    },
];

fn check_nested_readers(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.rwlock.read_lock()?;
    let depth = if nondet.any_bool() { 3 } else { 1 };
    for _ in 0..depth {
        env.rwlock.read_lock()?;
    }
    for _ in 0..depth {
        env.rwlock.read_unlock()?;
    }
    env.rwlock.read_unlock()?;
    Ok(())
}

fn check_write_then_read(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.rwlock.write_lock()?;
    if nondet.any_bool() {
        env.rwlock.read_lock()?;
        env.rwlock.read_unlock()?;
    }
    env.rwlock.write_unlock()?;
    Ok(())
}

fn check_irqsave_pairs(env: &mut Environment, _: &mut dyn NondetSource) -> Result<(), Halt> {
    let flags = env.rwlock.read_lock_irqsave()?;
    env.rwlock.read_unlock_irqrestore(flags)?;
    let flags = env.rwlock.write_lock_irqsave()?;
    env.rwlock.write_unlock_irqrestore(flags)?;
    Ok(())
}

fn check_trylock(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    if env.rwlock.try_write_lock(nondet) {
        ldv::assert(!env.rwlock.try_read_lock(nondet), "read_trylock under the write lock")?;
        env.rwlock.write_unlock()?;
    }
    if env.rwlock.try_read_lock(nondet) {
        env.rwlock.read_unlock()?;
    }
    Ok(())
}

fn check_unbalanced_read_unlock(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    env.rwlock.read_lock()?;
    let retry = nondet.any_bool();
    env.rwlock.read_unlock()?;
    if retry {
        env.rwlock.read_unlock()?;
    }
    Ok(())
}

fn check_writer_leak(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let flags = env.rwlock.write_lock_irqsave()?;
    if nondet.undef_ptr() == 0 {
        return Ok(());
    }
    env.rwlock.write_unlock_irqrestore(flags)?;
    Ok(())
}
