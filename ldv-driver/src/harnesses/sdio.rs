// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SDIO function drivers: register I/O happens between `sdio_claim_host` and
//! `sdio_release_host`.

use super::{Expectation, HarnessMetadata, ModelFamily, owner};
use ldv::models::OwnerId;
use ldv::{Environment, Halt, NondetSource, ViolationKind};

const FUNC1: OwnerId = owner(1);
const FUNC2: OwnerId = owner(2);

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "sdio::check_claimed_io",
        family: ModelFamily::Sdio,
        description: "sdio_readb and sdio_writeb inside the claim",
        expected: Expectation::Safe,
        env: None,
        scenario: check_claimed_io,
    },
    HarnessMetadata {
        pretty_name: "sdio::check_io_without_claim",
        family: ModelFamily::Sdio,
        description: "an interrupt handler reads a register without claiming the host",
        expected: Expectation::Violation(ViolationKind::StaleClaimUse),
        env: None,
        scenario: check_io_without_claim,
    },
    HarnessMetadata {
        pretty_name: "sdio::check_release_by_other",
        family: ModelFamily::Sdio,
        description: "one function releases the host another function claimed",
        expected: Expectation::Violation(ViolationKind::StaleClaimUse),
        env: None,
        scenario: check_release_by_other,
    },
    HarnessMetadata {
        pretty_name: "sdio::check_double_claim",
        family: ModelFamily::Sdio,
        description: "sdio_claim_host called again from a helper",
        expected: Expectation::Violation(ViolationKind::DoubleAcquire),
        env: None,
        scenario: check_double_claim,
    },
    HarnessMetadata {
        pretty_name: "sdio::check_missing_release",
        family: ModelFamily::Sdio,
        description: "an I/O error return skips sdio_release_host",
        expected: Expectation::Violation(ViolationKind::ResidualStateAtTeardown),
        env: None,
        scenario: check_missing_release,
    },
];

fn check_claimed_io(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.sdio_host.claim(FUNC1)?;
    env.sdio_host.check_context(FUNC1)?;
    if nondet.any_bool() {
        env.sdio_host.check_context(FUNC1)?;
    }
    env.sdio_host.release(FUNC1)?;
    // The second function takes its turn once the first is done.
    env.sdio_host.claim(FUNC2)?;
    env.sdio_host.check_context(FUNC2)?;
    env.sdio_host.release(FUNC2)?;
    Ok(())
}

fn check_io_without_claim(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let from_irq = nondet.any_bool();
    if !from_irq {
        env.sdio_host.claim(FUNC1)?;
    }
    env.sdio_host.check_context(FUNC1)?;
    if !from_irq {
        env.sdio_host.release(FUNC1)?;
    }
    Ok(())
}

fn check_release_by_other(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.sdio_host.claim(FUNC1)?;
    let releaser = if nondet.any_bool() { FUNC2 } else { FUNC1 };
    env.sdio_host.release(releaser)?;
    Ok(())
}

fn check_double_claim(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.sdio_host.claim(FUNC1)?;
    if nondet.any_bool() {
        env.sdio_host.claim(FUNC1)?;
        env.sdio_host.release(FUNC1)?;
    }
    env.sdio_host.release(FUNC1)?;
    Ok(())
}

fn check_missing_release(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.sdio_host.claim(FUNC1)?;
    env.sdio_host.check_context(FUNC1)?;
    if nondet.undef_int_nonpositive() != 0 {
        return Ok(());
    }
    env.sdio_host.release(FUNC1)?;
    Ok(())
}
