// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference counter model (module refcount, USB device refcount).
//!
//! Two flavors of the same contract exist, picked through [`RefCountConfig`]:
//!
//! - [`RefCountConfig::BAKED_IN`]: the counter starts at its floor of 1 and is usable right away.
//! - [`RefCountConfig::EXPLICIT_INIT`]: the counter starts at 0 and the environment must call
//!   [`RefCounter::initialize`] before any other operation.
//!
//! The two must not be mixed: an explicitly initialized counter reports
//! [`ViolationKind::UseBeforeInitialize`] when it is used before `initialize()`.

use super::{ResourceModel, ensure};
use crate::nondet::NondetSource;
use crate::violation::{Halt, Violation, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Identity of the owner of a reference, i.e. the address of a `struct module` or
/// `struct usb_device`. A null owner is `None` at the call sites.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ModuleRef(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RefCountConfig {
    /// Lowest value the counter may hold; it is also the initial value.
    pub floor: u32,
    /// Whether [`RefCounter::initialize`] must run before the counter is used.
    pub explicit_init: bool,
    /// Match every owner's puts against that owner's own gets.
    pub track_owner_identity: bool,
}

impl RefCountConfig {
    pub const BAKED_IN: RefCountConfig =
        RefCountConfig { floor: 1, explicit_init: false, track_owner_identity: false };
    pub const EXPLICIT_INIT: RefCountConfig =
        RefCountConfig { floor: 0, explicit_init: true, track_owner_identity: false };

    /// An explicitly initialized counter whose floor is not 0 mixes the two flavors.
    pub const fn mixes_variants(self) -> bool {
        self.explicit_init && self.floor != 0
    }

    pub const fn tracking_owners(self) -> Self {
        RefCountConfig { track_owner_identity: true, ..self }
    }
}

impl Default for RefCountConfig {
    fn default() -> Self {
        RefCountConfig::EXPLICIT_INIT
    }
}

#[derive(Debug, Clone)]
pub struct RefCounter {
    name: String,
    config: RefCountConfig,
    counter: u32,
    per_owner: BTreeMap<ModuleRef, u32>,
    initialized: bool,
}

impl RefCounter {
    pub fn new(name: impl Into<String>, config: RefCountConfig) -> Self {
        RefCounter {
            name: name.into(),
            config,
            counter: config.floor,
            per_owner: BTreeMap::new(),
            initialized: !config.explicit_init,
        }
    }

    pub fn config(&self) -> RefCountConfig {
        self.config
    }

    /// Put the counter at its floor. Called once by the environment before the scenario runs.
    pub fn initialize(&mut self) {
        self.counter = self.config.floor;
        self.per_owner.clear();
        self.initialized = true;
    }

    /// `__module_get` / `usb_get_dev`: take a reference unconditionally.
    pub fn get(&mut self, owner: Option<ModuleRef>) -> Result<(), Violation> {
        let Some(owner) = owner else { return Ok(()) };
        self.check_initialized()?;
        self.increment(owner)
    }

    /// `try_module_get`: the reference may or may not be granted. A null owner always succeeds,
    /// since built-in code needs no module reference.
    pub fn try_get(
        &mut self,
        owner: Option<ModuleRef>,
        nondet: &mut dyn NondetSource,
    ) -> Result<bool, Violation> {
        let Some(owner) = owner else { return Ok(true) };
        self.check_initialized()?;
        if nondet.any_bool() {
            self.increment(owner)?;
            Ok(true)
        } else {
            trace!(counter = %self.name, "get refused");
            Ok(false)
        }
    }

    /// `module_put` / `usb_put_dev`: drop a reference taken earlier.
    pub fn put(&mut self, owner: Option<ModuleRef>) -> Result<(), Violation> {
        let Some(owner) = owner else { return Ok(()) };
        self.check_initialized()?;
        ensure(self.counter > self.config.floor, &self.name, ViolationKind::OverRelease, || {
            "put without a matching get".to_string()
        })?;
        if self.config.track_owner_identity {
            let owned = self.per_owner.get(&owner).copied().unwrap_or(0);
            ensure(owned > 0, &self.name, ViolationKind::OverRelease, || {
                format!("put for owner {:#x}, which holds no reference", owner.0)
            })?;
            if owned == 1 {
                self.per_owner.remove(&owner);
            } else {
                self.per_owner.insert(owner, owned - 1);
            }
        }
        self.counter -= 1;
        trace!(counter = %self.name, value = self.counter, "put");
        Ok(())
    }

    /// `module_put_and_exit`: put, then end the execution path. The result is never a normal
    /// return: either the put violated the contract, or the path exits.
    pub fn put_and_exit(&mut self, owner: Option<ModuleRef>) -> Halt {
        match self.put(owner) {
            Ok(()) => Halt::Exit,
            Err(violation) => Halt::Violation(violation),
        }
    }

    /// `module_refcount`: references currently outstanding.
    pub fn refcount(&self) -> u32 {
        self.counter - self.config.floor
    }

    /// The counter is left untouched when it cannot count one more reference.
    fn increment(&mut self, owner: ModuleRef) -> Result<(), Violation> {
        let Some(counter) = self.counter.checked_add(1) else {
            return ensure(false, &self.name, ViolationKind::RefcountOverflow, || {
                format!("get past the largest representable count {}", self.counter)
            });
        };
        self.counter = counter;
        if self.config.track_owner_identity {
            *self.per_owner.entry(owner).or_insert(0) += 1;
        }
        trace!(counter = %self.name, value = self.counter, "get");
        Ok(())
    }

    fn check_initialized(&self) -> Result<(), Violation> {
        ensure(self.initialized, &self.name, ViolationKind::UseBeforeInitialize, || {
            "counter used before initialize()".to_string()
        })
    }
}

impl ResourceModel for RefCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.counter == self.config.floor
    }

    fn describe_state(&self) -> String {
        format!("{} outstanding reference(s)", self.refcount())
    }

    fn reset(&mut self) {
        *self = RefCounter::new(std::mem::take(&mut self.name), self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nondet::{Choice, ReplaySource};

    const OWNER: Option<ModuleRef> = Some(ModuleRef(0xffff_0000));
    const OTHER: Option<ModuleRef> = Some(ModuleRef(0xffff_1000));

    fn ready(config: RefCountConfig) -> RefCounter {
        let mut counter = RefCounter::new("module", config);
        counter.initialize();
        counter
    }

    #[test]
    fn check_get_put_balanced() {
        for config in [RefCountConfig::BAKED_IN, RefCountConfig::EXPLICIT_INIT] {
            let mut counter = ready(config);
            counter.get(OWNER).unwrap();
            counter.get(OWNER).unwrap();
            assert_eq!(counter.refcount(), 2);
            counter.put(OWNER).unwrap();
            counter.put(OWNER).unwrap();
            assert_eq!(counter.refcount(), 0);
            assert!(counter.check_final_state().is_ok());
        }
    }

    #[test]
    fn check_over_release() {
        let mut counter = ready(RefCountConfig::BAKED_IN);
        counter.get(OWNER).unwrap();
        counter.put(OWNER).unwrap();
        let violation = counter.put(OWNER).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::OverRelease);
        assert_eq!(counter.refcount(), 0);
    }

    #[test]
    fn check_null_owner_is_ignored() {
        let mut counter = ready(RefCountConfig::EXPLICIT_INIT);
        counter.put(None).unwrap();
        counter.get(None).unwrap();
        assert_eq!(counter.try_get(None, &mut ReplaySource::default()), Ok(true));
        assert_eq!(counter.refcount(), 0);
    }

    #[test]
    fn check_try_get() {
        let mut counter = ready(RefCountConfig::EXPLICIT_INIT);
        let mut nondet = ReplaySource::new([Choice::Bool(false), Choice::Bool(true)]);
        assert_eq!(counter.try_get(OWNER, &mut nondet), Ok(false));
        assert_eq!(counter.refcount(), 0);
        assert_eq!(counter.try_get(OWNER, &mut nondet), Ok(true));
        assert_eq!(counter.refcount(), 1);
    }

    #[test]
    fn check_put_and_exit() {
        let mut counter = ready(RefCountConfig::BAKED_IN);
        counter.get(OWNER).unwrap();
        assert_eq!(counter.put_and_exit(OWNER), Halt::Exit);
        assert_eq!(counter.refcount(), 0);
        let halt = counter.put_and_exit(OWNER);
        assert_eq!(halt.violation().map(|v| v.kind), Some(ViolationKind::OverRelease));
    }

    #[test]
    fn check_explicit_init_required() {
        let mut counter = RefCounter::new("module", RefCountConfig::EXPLICIT_INIT);
        assert_eq!(counter.get(OWNER).unwrap_err().kind, ViolationKind::UseBeforeInitialize);
        counter.initialize();
        counter.get(OWNER).unwrap();

        let mut baked = RefCounter::new("module", RefCountConfig::BAKED_IN);
        baked.get(OWNER).unwrap();
        assert_eq!(baked.refcount(), 1);
    }

    #[test]
    fn check_owner_tracking() {
        let mut counter = ready(RefCountConfig::EXPLICIT_INIT.tracking_owners());
        counter.get(OWNER).unwrap();
        let violation = counter.put(OTHER).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::OverRelease);
        counter.put(OWNER).unwrap();

        // Without tracking, the same sequence only looks at the total.
        let mut counter = ready(RefCountConfig::EXPLICIT_INIT);
        counter.get(OWNER).unwrap();
        counter.put(OTHER).unwrap();
    }

    #[test]
    fn check_overflow_is_reported() {
        let saturated =
            RefCountConfig { floor: u32::MAX, explicit_init: false, track_owner_identity: false };
        let mut counter = ready(saturated);
        assert_eq!(counter.get(OWNER).unwrap_err().kind, ViolationKind::RefcountOverflow);
        let mut nondet = ReplaySource::new([Choice::Bool(true)]);
        let violation = counter.try_get(OWNER, &mut nondet).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::RefcountOverflow);
        // The refused gets left the counter balanced.
        assert_eq!(counter.refcount(), 0);
        assert!(counter.check_final_state().is_ok());
    }

    #[test]
    fn check_mixed_variants() {
        assert!(!RefCountConfig::BAKED_IN.mixes_variants());
        assert!(!RefCountConfig::EXPLICIT_INIT.tracking_owners().mixes_variants());
        assert!(RefCountConfig { floor: 1, ..RefCountConfig::EXPLICIT_INIT }.mixes_variants());
    }

    #[test]
    fn check_reset() {
        let mut counter = ready(RefCountConfig::EXPLICIT_INIT);
        counter.get(OWNER).unwrap();
        counter.reset();
        assert_eq!(counter.name(), "module");
        assert!(counter.is_idle());
        assert_eq!(counter.get(OWNER).unwrap_err().kind, ViolationKind::UseBeforeInitialize);
    }
}
