// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Module reference counting: `try_module_get`, `__module_get`, `module_put` and
//! `module_put_and_exit`.

use super::{Expectation, HarnessMetadata, ModelFamily};
use ldv::models::{ModuleRef, RefCountConfig};
use ldv::{EnvConfig, Environment, Halt, NondetSource, ViolationKind};

const THIS_MODULE: Option<ModuleRef> = Some(ModuleRef(0xa000_0000));
const OTHER_MODULE: Option<ModuleRef> = Some(ModuleRef(0xa000_4000));

const BAKED_IN: EnvConfig = EnvConfig {
    module_refcount: RefCountConfig::BAKED_IN,
    usb_dev_refcount: RefCountConfig::EXPLICIT_INIT,
    err_ptr: ldv::models::ErrPtrCodec::STANDARD,
};

const TRACKING_OWNERS: EnvConfig = EnvConfig {
    module_refcount: RefCountConfig::EXPLICIT_INIT.tracking_owners(),
    ..BAKED_IN
};

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "module::check_get_put",
        family: ModelFamily::Module,
        description: "__module_get paired with module_put",
        expected: Expectation::Safe,
        env: None,
        scenario: check_get_put,
    },
    HarnessMetadata {
        pretty_name: "module::check_get_put_baked_in",
        family: ModelFamily::Module,
        description: "the same pairing on a counter whose floor is 1",
        expected: Expectation::Safe,
        env: Some(BAKED_IN),
        scenario: check_get_put,
    },
    HarnessMetadata {
        pretty_name: "module::check_double_put",
        family: ModelFamily::Module,
        description: "module_put in both the error path and the release path",
        expected: Expectation::Violation(ViolationKind::OverRelease),
        env: None,
        scenario: check_double_put,
    },
    HarnessMetadata {
        pretty_name: "module::check_try_get_checked",
        family: ModelFamily::Module,
        description: "try_module_get, with module_put only when it succeeded",
        expected: Expectation::Safe,
        env: None,
        scenario: check_try_get_checked,
    },
    HarnessMetadata {
        pretty_name: "module::check_try_get_unchecked",
        family: ModelFamily::Module,
        description: "try_module_get whose failure is ignored",
        expected: Expectation::Violation(ViolationKind::OverRelease),
        env: None,
        scenario: check_try_get_unchecked,
    },
    HarnessMetadata {
        pretty_name: "module::check_put_and_exit",
        family: ModelFamily::Module,
        description: "a kernel thread dropping its module reference with module_put_and_exit",
        expected: Expectation::Safe,
        env: None,
        scenario: check_put_and_exit,
    },
    HarnessMetadata {
        pretty_name: "module::check_put_and_exit_without_get",
        family: ModelFamily::Module,
        description: "module_put_and_exit from a thread that never took a reference",
        expected: Expectation::Violation(ViolationKind::OverRelease),
        env: None,
        scenario: check_put_and_exit_without_get,
    },
    HarnessMetadata {
        pretty_name: "module::check_leaked_reference",
        family: ModelFamily::Module,
        description: "a failed probe keeps its module reference",
        expected: Expectation::Violation(ViolationKind::ResidualStateAtTeardown),
        env: None,
        scenario: check_leaked_reference,
    },
    HarnessMetadata {
        pretty_name: "module::check_null_module",
        family: ModelFamily::Module,
        description: "built-in code calls the refcount API with a null module",
        expected: Expectation::Safe,
        env: None,
        scenario: check_null_module,
    },
    HarnessMetadata {
        pretty_name: "module::check_foreign_put",
        family: ModelFamily::Module,
        description: "module_put on a module other than the one referenced",
        expected: Expectation::Violation(ViolationKind::OverRelease),
        env: Some(TRACKING_OWNERS),
        scenario: check_foreign_put,
    },
];

fn check_get_put(env: &mut Environment, _: &mut dyn NondetSource) -> Result<(), Halt> {
    env.module_refcount.get(THIS_MODULE)?;
    env.module_refcount.get(THIS_MODULE)?;
    env.module_refcount.put(THIS_MODULE)?;
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_double_put(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.module_refcount.get(THIS_MODULE)?;
    if nondet.undef_int_nonpositive() < 0 {
        env.module_refcount.put(THIS_MODULE)?;
    }
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_try_get_checked(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    if !env.module_refcount.try_get(THIS_MODULE, nondet)? {
        return Ok(());
    }
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_try_get_unchecked(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    env.module_refcount.try_get(THIS_MODULE, nondet)?;
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_put_and_exit(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.module_refcount.get(THIS_MODULE)?;
    if nondet.any_bool() {
        return Err(env.module_refcount.put_and_exit(THIS_MODULE));
    }
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_put_and_exit_without_get(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    if nondet.any_bool() {
        env.module_refcount.get(THIS_MODULE)?;
    }
    Err(env.module_refcount.put_and_exit(THIS_MODULE))
}

fn check_leaked_reference(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    if !env.module_refcount.try_get(THIS_MODULE, nondet)? {
        return Ok(());
    }
    let probe = nondet.undef_int_nonpositive();
    if probe < 0 {
        return Ok(());
    }
    env.module_refcount.put(THIS_MODULE)?;
    Ok(())
}

fn check_null_module(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    if env.module_refcount.try_get(None, nondet)? {
        env.module_refcount.put(None)?;
    }
    env.module_refcount.put(None)?;
    ldv::assert(env.module_refcount.refcount() == 0, "null module took a reference")?;
    Ok(())
}

fn check_foreign_put(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    env.module_refcount.get(THIS_MODULE)?;
    let owner = if nondet.any_bool() { OTHER_MODULE } else { THIS_MODULE };
    env.module_refcount.put(owner)?;
    Ok(())
}
