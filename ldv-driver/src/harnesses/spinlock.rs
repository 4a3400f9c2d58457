// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Expectation, HarnessMetadata, ModelFamily};
use ldv::models::GfpFlags;
use ldv::{Environment, Halt, NondetSource, ViolationKind};

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "spinlock::check_gfp_atomic_under_lock",
        family: ModelFamily::Spinlock,
        description: "GFP_ATOMIC allocation inside a spinlock",
        expected: Expectation::Safe,
        env: None,
        scenario: check_gfp_atomic_under_lock,
    },
    HarnessMetadata {
        pretty_name: "spinlock::check_gfp_kernel_under_lock",
        family: ModelFamily::Spinlock,
        description: "GFP_KERNEL allocation inside a spinlock on a rare path",
        expected: Expectation::Violation(ViolationKind::SleepInAtomicContext),
        env: None,
        scenario: check_gfp_kernel_under_lock,
    },
    HarnessMetadata {
        pretty_name: "spinlock::check_gfp_kernel_after_unlock",
        family: ModelFamily::Spinlock,
        description: "GFP_KERNEL allocation once the spinlock is dropped",
        expected: Expectation::Safe,
        env: None,
        scenario: check_gfp_kernel_after_unlock,
    },
    HarnessMetadata {
        pretty_name: "spinlock::check_double_unlock",
        family: ModelFamily::Spinlock,
        description: "the error branch unlocks and falls through to the common unlock",
        expected: Expectation::Violation(ViolationKind::ReleaseWithoutAcquire),
        env: None,
        scenario: check_double_unlock,
    },
];

fn check_gfp_atomic_under_lock(env: &mut Environment, _: &mut dyn NondetSource) -> Result<(), Halt> {
    env.spinlock.acquire()?;
    env.check_alloc_flags(GfpFlags::ATOMIC)?;
    env.check_alloc_flags(GfpFlags::NOWAIT)?;
    env.spinlock.release()?;
    Ok(())
}

fn check_gfp_kernel_under_lock(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    env.spinlock.acquire()?;
    let flags = if nondet.any_bool() { GfpFlags::KERNEL } else { GfpFlags::ATOMIC };
    env.check_alloc_flags(flags)?;
    env.spinlock.release()?;
    Ok(())
}

fn check_gfp_kernel_after_unlock(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let busy = !env.spinlock.try_acquire();
    if !busy {
        env.spinlock.release()?;
    }
    if nondet.any_bool() {
        env.check_alloc_flags(GfpFlags::KERNEL)?;
    }
    Ok(())
}

fn check_double_unlock(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.spinlock.acquire()?;
    if nondet.undef_int() != 0 {
        env.spinlock.release()?;
    }
    env.spinlock.release()?;
    Ok(())
}
