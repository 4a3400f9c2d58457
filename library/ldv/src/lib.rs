// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource-state models of Linux kernel APIs.
//!
//! Every model tracks the abstract state of one kernel resource (a lock, a reference counter,
//! a bus claim) and validates the order in which a driver calls into it. A call that breaks
//! the API contract produces a [`Violation`]; nothing is recovered. Choices the real kernel
//! makes on its own (a `trylock` that may fail, an interruptible wait) are drawn from an
//! injected [`NondetSource`], so the same model runs under a model checker, a property-based
//! test, or the exhaustive [`explore::Explorer`].
//!
//! # Example:
//!
//! ```rust
//! use ldv::{Environment, EnvConfig, ViolationKind};
//!
//! let mut env = Environment::new(EnvConfig::default());
//! env.mutex.acquire().unwrap();
//! let err = env.mutex.acquire().unwrap_err();
//! assert_eq!(err.kind, ViolationKind::DoubleAcquire);
//! ```

pub mod env;
pub mod explore;
pub mod models;
pub mod nondet;
pub mod violation;

#[cfg(kani)]
mod proofs;

pub use env::{EnvConfig, Environment};
pub use models::ResourceModel;
pub use nondet::{Choice, NondetSource, ReplaySource};
pub use violation::{Halt, PanicSink, Recorder, Violation, ViolationKind, ViolationSink, report};

/// Error numbers returned by the modeled kernel functions. Functions return them negated.
pub mod errno {
    pub const EINTR: i32 = 4;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
}

/// Model name used for violations raised through [`assert`].
pub const ASSERT_MODEL: &str = "ldv-assert";

/// Checks a caller-level property, the way `ldv_assert` does in a scenario.
///
/// # Example:
///
/// ```rust
/// let e = 5;
/// let ptr = ldv::models::err_ptr::err_ptr(e);
/// ldv::assert(ldv::models::err_ptr::is_err(ptr), "ERR_PTR must be an error").unwrap();
/// assert!(ldv::assert(false, "unreachable").is_err());
/// ```
pub fn assert(cond: bool, msg: &'static str) -> Result<(), Violation> {
    models::ensure(cond, ASSERT_MODEL, ViolationKind::AssertionFailed, || msg.to_string())
}
