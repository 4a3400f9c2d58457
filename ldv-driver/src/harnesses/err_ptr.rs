// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callers of functions that return `ERR_PTR`-encoded errors.

use super::{Expectation, HarnessMetadata, ModelFamily};
use ldv::errno::{EBUSY, EINVAL};
use ldv::models::ErrPtrCodec;
use ldv::{EnvConfig, Environment, Halt, NondetSource, ViolationKind};

const NULL_BLIND: EnvConfig = EnvConfig {
    module_refcount: ldv::models::RefCountConfig::EXPLICIT_INIT,
    usb_dev_refcount: ldv::models::RefCountConfig::EXPLICIT_INIT,
    err_ptr: ErrPtrCodec::NULL_BLIND,
};

pub(super) const HARNESSES: &[HarnessMetadata] = &[
    HarnessMetadata {
        pretty_name: "err_ptr::check_round_trip",
        family: ModelFamily::ErrPtr,
        description: "PTR_ERR(ERR_PTR(e)) == e for any positive error number",
        expected: Expectation::Safe,
        env: None,
        scenario: check_round_trip,
    },
    HarnessMetadata {
        pretty_name: "err_ptr::check_lookup_result",
        family: ModelFamily::ErrPtr,
        description: "IS_ERR checked before the returned object is used",
        expected: Expectation::Safe,
        env: None,
        scenario: check_lookup_result,
    },
    HarnessMetadata {
        pretty_name: "err_ptr::check_unchecked_lookup_result",
        family: ModelFamily::ErrPtr,
        description: "the returned object is used without IS_ERR",
        expected: Expectation::Violation(ViolationKind::AssertionFailed),
        env: None,
        scenario: check_unchecked_lookup_result,
    },
    HarnessMetadata {
        pretty_name: "err_ptr::check_err_or_null",
        family: ModelFamily::ErrPtr,
        description: "IS_ERR_OR_NULL guarding a dereference",
        expected: Expectation::Safe,
        env: None,
        scenario: check_err_or_null,
    },
    HarnessMetadata {
        pretty_name: "err_ptr::check_err_or_null_blind",
        family: ModelFamily::ErrPtr,
        description: "the same guard with the IS_ERR_OR_NULL model that always says false",
        expected: Expectation::Violation(ViolationKind::AssertionFailed),
        env: Some(NULL_BLIND),
        scenario: check_err_or_null,
    },
];

fn check_round_trip(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let errno = nondet.undef_int_positive().unsigned_abs() as usize;
    let ptr = env.err_ptr.err_ptr(errno);
    ldv::assert(env.err_ptr.is_err(ptr), "ERR_PTR must be an error")?;
    ldv::assert(env.err_ptr.ptr_err(ptr) == errno, "PTR_ERR must give the error number back")?;
    Ok(())
}

/// A lookup that returns a valid object, or an encoded error chosen by the environment.
fn lookup(env: &Environment, nondet: &mut dyn NondetSource) -> usize {
    if nondet.any_bool() {
        nondet.undef_ptr_non_null().min(env.err_ptr.ptr_max)
    } else if nondet.any_bool() {
        env.err_ptr.err_ptr(EINVAL as usize)
    } else {
        env.err_ptr.err_ptr(EBUSY as usize)
    }
}

fn check_lookup_result(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let obj = lookup(env, nondet);
    if env.err_ptr.is_err(obj) {
        let errno = env.err_ptr.ptr_err(obj);
        ldv::assert(errno == EINVAL as usize || errno == EBUSY as usize, "unexpected error")?;
        return Ok(());
    }
    ldv::assert(obj <= env.err_ptr.ptr_max, "dereference of an error pointer")?;
    Ok(())
}

fn check_unchecked_lookup_result(
    env: &mut Environment,
    nondet: &mut dyn NondetSource,
) -> Result<(), Halt> {
    let obj = lookup(env, nondet);
    ldv::assert(!env.err_ptr.is_err(obj), "dereference of an error pointer")?;
    Ok(())
}

fn check_err_or_null(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let obj = nondet.undef_ptr();
    if env.err_ptr.is_err_or_null(obj) {
        return Ok(());
    }
    ldv::assert(obj != 0, "dereference of a null pointer")?;
    ldv::assert(!env.err_ptr.is_err(obj), "dereference of an error pointer")?;
    Ok(())
}
