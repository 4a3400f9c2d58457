// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole scenarios, written the way a driver calls into the models.

use ldv::explore::{ExploreConfig, Explorer, Verdict, run_path};
use ldv::models::err_ptr::{err_ptr, is_err, ptr_err};
use ldv::models::{AtomicCounter, LockId, ModuleRef, OwnerId, RefCountConfig};
use ldv::{
    EnvConfig, Environment, Halt, NondetSource, PanicSink, Recorder, ReplaySource, ViolationKind,
    report,
};

const OWNER: Option<ModuleRef> = Some(ModuleRef(0xffff_a000));

fn env() -> Environment {
    Environment::default()
}

#[test]
fn check_lock_then_unlock() {
    let mut env = env();
    env.mutex.acquire().unwrap();
    env.mutex.release().unwrap();
    env.check_final_state().unwrap();
}

#[test]
fn check_lock_twice() {
    let mut env = env();
    env.mutex.acquire().unwrap();
    let violation = env.mutex.acquire().unwrap_err();
    assert_eq!(violation.kind, ViolationKind::DoubleAcquire);
    assert_eq!(violation.model, "mutex");
}

#[test]
fn check_lock_without_unlock() {
    let mut env = env();
    env.mutex.acquire().unwrap();
    let violation = env.check_final_state().unwrap_err();
    assert_eq!(violation.kind, ViolationKind::ResidualStateAtTeardown);
    assert_eq!(violation.model, "mutex");
}

#[test]
fn check_get_put_put() {
    for config in [RefCountConfig::BAKED_IN, RefCountConfig::EXPLICIT_INIT] {
        let mut env =
            Environment::initialized(EnvConfig { module_refcount: config, ..EnvConfig::default() });
        env.module_refcount.get(OWNER).unwrap();
        env.module_refcount.put(OWNER).unwrap();
        let violation = env.module_refcount.put(OWNER).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::OverRelease);
    }
}

#[test]
fn check_err_ptr_five() {
    let result = err_ptr(5);
    assert!(is_err(result));
    assert_eq!(ptr_err(result), 5);
    ldv::assert(is_err(result), "ERR_PTR(5) is an error").unwrap();
}

#[test]
fn check_recorder_collects_a_whole_scenario() {
    let mut env = env();
    let mut sink = Recorder::default();
    report(&mut sink, env.spinlock.acquire());
    report(&mut sink, env.check_alloc_flags(ldv::models::GfpFlags::KERNEL));
    report(&mut sink, env.spinlock.release());
    report(&mut sink, env.spinlock.release());
    let kinds: Vec<ViolationKind> = sink.violations().iter().map(|v| v.kind).collect();
    assert_eq!(kinds, [ViolationKind::SleepInAtomicContext, ViolationKind::ReleaseWithoutAcquire]);
}

#[test]
#[should_panic(expected = "double-acquire")]
fn check_panic_sink_stops_the_scenario() {
    let mut env = env();
    let mut sink = PanicSink;
    report(&mut sink, env.sdio_host.claim(OwnerId::new(1).unwrap()));
    report(&mut sink, env.sdio_host.claim(OwnerId::new(2).unwrap()));
}

#[test]
fn check_dec_and_lock_scenario() {
    let mut env = env();
    let mut users = AtomicCounter::new(2);
    let lock = LockId(0xc0de);
    assert!(!env.mutexes.decrement_and_acquire(&mut users, lock).unwrap());
    assert!(env.mutexes.decrement_and_acquire(&mut users, lock).unwrap());
    env.mutexes.release(lock).unwrap();
    env.check_final_state().unwrap();
}

/// A USB driver's reset path: `usb_lock_device_for_reset` may fail, and the driver must only
/// unlock when it succeeded.
fn usb_reset(env: &mut Environment, nondet: &mut dyn NondetSource) -> Result<(), Halt> {
    let owner = OwnerId::new(7).unwrap();
    env.usb_dev_refcount.get(OWNER)?;
    // Bug: the result is ignored and the unlock happens either way.
    let _locked = env.usb_device_lock.try_claim(owner, nondet)?;
    env.usb_device_lock.release(owner)?;
    env.usb_dev_refcount.put(OWNER)?;
    Ok(())
}

#[test]
fn check_explorer_finds_and_replays_counterexample() {
    let explorer = Explorer::new(ExploreConfig::default(), EnvConfig::default());
    let exploration = explorer.explore(usb_reset);
    assert_eq!(exploration.paths, 2);
    assert_eq!(exploration.verdict(), Verdict::Unsafe);

    let cex = exploration.first_counterexample().unwrap();
    assert_eq!(cex.violation.kind, ViolationKind::ReleaseWithoutAcquire);
    assert_eq!(cex.violation.model, "usb-device-lock");

    let mut replay = cex.replay();
    let replayed = run_path(EnvConfig::default(), &mut replay, &usb_reset);
    assert_eq!(replayed, Err(Halt::Violation(cex.violation.clone())));
    assert_eq!(replay.missing(), 0);

    // The other branch of the same choice is fine.
    let mut lucky = ReplaySource::new([ldv::Choice::Bool(true)]);
    assert_eq!(run_path(EnvConfig::default(), &mut lucky, &usb_reset), Ok(()));
}

#[test]
fn check_explorer_report_is_json() {
    let explorer = Explorer::new(ExploreConfig::default(), EnvConfig::default());
    let exploration = explorer.explore(|env, nondet| {
        let owner = Some(ModuleRef(nondet.undef_ptr_non_null()));
        if env.module_refcount.try_get(owner, nondet)? {
            env.module_refcount.put(owner)?;
        }
        Ok(())
    });
    assert_eq!(exploration.verdict(), Verdict::Safe);
    let json = serde_json::to_value(&exploration).unwrap();
    assert_eq!(json["paths"], exploration.paths);
    assert_eq!(json["violated"], 0);
}
