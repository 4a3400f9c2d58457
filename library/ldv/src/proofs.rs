// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proof harnesses for `cargo kani`. Every nondeterministic choice of the models becomes a
//! symbolic `kani::any()` value.

use crate::env::{EnvConfig, Environment};
use crate::models::err_ptr::{ErrPtrCodec, LDV_PTR_MAX};
use crate::models::{LockId, ModuleRef, RefCountConfig, RwLockPair};
use crate::nondet::NondetSource;
use crate::violation::{Halt, ViolationKind};

struct KaniSource;

impl NondetSource for KaniSource {
    fn any_bool(&mut self) -> bool {
        kani::any()
    }

    fn any_i32(&mut self) -> i32 {
        kani::any()
    }

    fn any_usize(&mut self) -> usize {
        kani::any()
    }
}

#[kani::proof]
fn check_err_ptr_round_trip() {
    let codec = ErrPtrCodec::STANDARD;
    let errno: usize = kani::any();
    kani::assume(errno > 0 && errno <= codec.max_errno());
    let ptr = codec.err_ptr(errno);
    assert!(codec.is_err(ptr));
    assert!(codec.is_err_or_null(ptr));
    assert_eq!(codec.ptr_err(ptr), errno);
}

#[kani::proof]
fn check_valid_pointers_are_not_errors() {
    let ptr: usize = kani::any();
    kani::assume(ptr <= LDV_PTR_MAX);
    assert!(!ErrPtrCodec::STANDARD.is_err(ptr));
}

#[kani::proof]
fn check_interruptible_lock_balanced() {
    let mut env = Environment::initialized(EnvConfig::default());
    let mut nondet = KaniSource;
    let ret = env.mutex.acquire_interruptible(&mut nondet).unwrap();
    if ret == 0 {
        env.mutex.release().unwrap();
    }
    assert!(env.check_final_state().is_ok());
}

#[kani::proof]
fn check_trylock_never_violates() {
    let mut env = Environment::initialized(EnvConfig::default());
    let first = env.spinlock.try_acquire();
    let second = env.spinlock.try_acquire();
    assert!(first);
    assert!(!second);
    assert!(env.spinlock.release().is_ok());
    assert!(env.spinlock.release().is_err());
}

#[kani::proof]
#[kani::unwind(4)]
fn check_lock_set_distinct_keys() {
    let mut env = Environment::initialized(EnvConfig::default());
    let a = LockId(kani::any());
    let b = LockId(kani::any());
    env.mutexes.acquire(a).unwrap();
    let result = env.mutexes.acquire(b);
    assert_eq!(result.is_err(), a == b);
    if result.is_err() {
        assert_eq!(result.unwrap_err().kind, ViolationKind::DoubleAcquire);
    }
}

#[kani::proof]
fn check_refcount_floor() {
    let baked: bool = kani::any();
    let config = if baked { RefCountConfig::BAKED_IN } else { RefCountConfig::EXPLICIT_INIT };
    let mut env = Environment::initialized(EnvConfig {
        module_refcount: config,
        ..EnvConfig::default()
    });
    let mut nondet = KaniSource;
    let owner = Some(ModuleRef(kani::any()));
    let taken = env.module_refcount.try_get(owner, &mut nondet).unwrap();
    if taken {
        env.module_refcount.put(owner).unwrap();
    }
    let over = env.module_refcount.put(owner).unwrap_err();
    assert_eq!(over.kind, ViolationKind::OverRelease);
    assert_eq!(env.module_refcount.refcount(), 0);
}

#[kani::proof]
fn check_put_and_exit_never_returns() {
    let mut env = Environment::initialized(EnvConfig::default());
    let owner = Some(ModuleRef(kani::any()));
    let extra: bool = kani::any();
    env.module_refcount.get(owner).unwrap();
    if extra {
        env.module_refcount.get(owner).unwrap();
    }
    assert_eq!(env.module_refcount.put_and_exit(owner), Halt::Exit);
}

#[kani::proof]
fn check_rwlock_readers_exclude_nothing_but_writers() {
    let mut lock = RwLockPair::new("rwlock");
    let mut nondet = KaniSource;
    lock.read_lock().unwrap();
    lock.read_lock().unwrap();
    let writer = lock.try_write_lock(&mut nondet);
    lock.read_unlock().unwrap();
    lock.read_unlock().unwrap();
    if writer {
        assert!(lock.read_lock().is_err());
        lock.write_unlock().unwrap();
    }
    assert_eq!(lock.readers(), 0);
}
