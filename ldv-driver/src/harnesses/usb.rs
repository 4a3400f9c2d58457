// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! USB device lifetime: `usb_get_dev` / `usb_put_dev` and `usb_lock_device_for_reset`.

use super::{Expectation, HarnessMetadata, ModelFamily, owner};
use ldv::models::{ModuleRef, OwnerId};
use ldv::{Environment, Halt, NondetSource, ViolationKind};

const UDEV: Option<ModuleRef> = Some(ModuleRef(0xc000_0800));
const IFACE: OwnerId = owner(7);

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "usb::check_lock_for_reset",
        family: ModelFamily::Usb,
        description: "usb_lock_device_for_reset with its result checked",
        expected: Expectation::Safe,
        env: None,
        scenario: check_lock_for_reset,
    },
    HarnessMetadata {
        pretty_name: "usb::check_unlock_without_lock",
        family: ModelFamily::Usb,
        description: "usb_unlock_device after a usb_lock_device_for_reset that failed",
        expected: Expectation::Violation(ViolationKind::ReleaseWithoutAcquire),
        env: None,
        scenario: check_unlock_without_lock,
    },
    HarnessMetadata {
        pretty_name: "usb::check_dev_refcount_balanced",
        family: ModelFamily::Usb,
        description: "probe takes a device reference that disconnect drops",
        expected: Expectation::Safe,
        env: None,
        scenario: check_dev_refcount_balanced,
    },
    HarnessMetadata {
        pretty_name: "usb::check_dev_refcount_leak",
        family: ModelFamily::Usb,
        description: "probe fails after usb_get_dev and never drops the reference",
        expected: Expectation::Violation(ViolationKind::ResidualStateAtTeardown),
        env: None,
        scenario: check_dev_refcount_leak,
    },
];

fn check_lock_for_reset(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.usb_dev_refcount.get(UDEV)?;
    if env.usb_device_lock.try_claim(IFACE, nondet)? {
        env.usb_device_lock.check_context(IFACE)?;
        env.usb_device_lock.release(IFACE)?;
    }
    env.usb_dev_refcount.put(UDEV)?;
    Ok(())
}

fn check_unlock_without_lock(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let _locked = env.usb_device_lock.try_claim(IFACE, nondet)?;
    env.usb_device_lock.release(IFACE)?;
    Ok(())
}

fn check_dev_refcount_balanced(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    // probe
    env.usb_dev_refcount.get(UDEV)?;
    if nondet.undef_int_negative() == -1 {
        // probe failed, undo
        env.usb_dev_refcount.put(UDEV)?;
        return Ok(());
    }
    // disconnect
    env.usb_dev_refcount.put(UDEV)?;
    Ok(())
}

fn check_dev_refcount_leak(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.usb_dev_refcount.get(UDEV)?;
    if nondet.undef_int() != 0 {
        return Ok(());
    }
    env.usb_dev_refcount.put(UDEV)?;
    Ok(())
}
