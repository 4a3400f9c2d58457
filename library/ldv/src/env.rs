// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The verification context: one instance of every resource model.
//!
//! A scenario gets a fresh [`Environment`], calls into its models in whatever order the driver
//! under test would, and ends with [`Environment::check_final_state`]. Independent runs never
//! share state, so any number of environments can coexist.

use crate::models::{
    BinaryLock, ClaimToken, ErrPtrCodec, GfpFlags, KeyedLockSet, RefCountConfig, RefCounter,
    ResourceModel, RwLockPair,
};
use crate::violation::Violation;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Picks the variant of every model family that has more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct EnvConfig {
    pub module_refcount: RefCountConfig,
    pub usb_dev_refcount: RefCountConfig,
    pub err_ptr: ErrPtrCodec,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            module_refcount: RefCountConfig::EXPLICIT_INIT,
            usb_dev_refcount: RefCountConfig::EXPLICIT_INIT,
            err_ptr: ErrPtrCodec::STANDARD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    /// The classic single-mutex model.
    pub mutex: BinaryLock,
    /// Mutexes told apart by address.
    pub mutexes: KeyedLockSet,
    pub spinlock: BinaryLock,
    pub module_refcount: RefCounter,
    pub usb_dev_refcount: RefCounter,
    pub rwlock: RwLockPair,
    pub sdio_host: ClaimToken,
    pub usb_device_lock: ClaimToken,
    pub err_ptr: ErrPtrCodec,
    config: EnvConfig,
}

impl Environment {
    pub fn new(config: EnvConfig) -> Self {
        Environment {
            mutex: BinaryLock::new("mutex"),
            mutexes: KeyedLockSet::new("mutexes"),
            spinlock: BinaryLock::new("spinlock"),
            module_refcount: RefCounter::new("module-refcount", config.module_refcount),
            usb_dev_refcount: RefCounter::new("usb-dev-refcount", config.usb_dev_refcount),
            rwlock: RwLockPair::new("rwlock"),
            sdio_host: ClaimToken::new("sdio-host"),
            usb_device_lock: ClaimToken::new("usb-device-lock"),
            err_ptr: config.err_ptr,
            config,
        }
    }

    /// A fresh environment with the initialization hooks already run.
    pub fn initialized(config: EnvConfig) -> Self {
        let mut env = Environment::new(config);
        env.initialize();
        env
    }

    pub fn config(&self) -> EnvConfig {
        self.config
    }

    /// Run the initialization hook of every model that has one. The host calls this once,
    /// before any other model operation.
    pub fn initialize(&mut self) {
        self.module_refcount.initialize();
        self.usb_dev_refcount.initialize();
    }

    /// Every model back to its freshly constructed state (initialization hooks not run).
    pub fn reset(&mut self) {
        for model in self.models_mut() {
            model.reset();
        }
    }

    /// The stateful models, in the order the final-state check visits them.
    pub fn models(&self) -> [&dyn ResourceModel; 8] {
        [
            &self.mutex,
            &self.mutexes,
            &self.spinlock,
            &self.module_refcount,
            &self.usb_dev_refcount,
            &self.rwlock,
            &self.sdio_host,
            &self.usb_device_lock,
        ]
    }

    fn models_mut(&mut self) -> [&mut dyn ResourceModel; 8] {
        [
            &mut self.mutex,
            &mut self.mutexes,
            &mut self.spinlock,
            &mut self.module_refcount,
            &mut self.usb_dev_refcount,
            &mut self.rwlock,
            &mut self.sdio_host,
            &mut self.usb_device_lock,
        ]
    }

    /// End-of-scenario check: every model must be idle. Reports the first one that is not.
    pub fn check_final_state(&self) -> Result<(), Violation> {
        self.models().into_iter().try_for_each(|model| model.check_final_state())
    }

    /// Every model that is not idle, not just the first.
    pub fn residual_state(&self) -> Vec<Violation> {
        let residual: Vec<Violation> = self
            .models()
            .into_iter()
            .filter_map(|model| model.check_final_state().err())
            .collect();
        debug!(residual = residual.len(), "residual_state");
        residual
    }

    /// Memory allocation with `flags`: must not sleep while the spinlock is held.
    pub fn check_alloc_flags(&self, flags: GfpFlags) -> Result<(), Violation> {
        self.spinlock.check_may_sleep(flags)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::initialized(EnvConfig::default())
    }
}
