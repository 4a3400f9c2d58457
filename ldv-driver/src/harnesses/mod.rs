// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The harness registry.
//!
//! Every harness is a scenario written the way a Linux driver calls into the kernel API, paired
//! with the outcome the models are expected to report for it. Correct usage is expected to be
//! safe on every path. Known-buggy usage is expected to reach one specific violation kind.

use ldv::explore::{Exploration, Verdict};
use ldv::models::OwnerId;
use ldv::{EnvConfig, Environment, Halt, NondetSource, ViolationKind};
use serde::Serialize;
use std::fmt;

mod err_ptr;
mod module;
mod mutex;
mod rwlock;
mod sdio;
mod spinlock;
mod usb;

pub type Scenario = fn(&mut Environment, &mut dyn NondetSource) -> Result<(), Halt>;

/// The kernel API family a harness exercises.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    clap::ValueEnum,
    strum_macros::Display,
    strum_macros::EnumIter
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelFamily {
    Mutex,
    Spinlock,
    Module,
    Rwlock,
    ErrPtr,
    Usb,
    Sdio,
}

/// What the models should report for a harness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "kebab-case")]
pub enum Expectation {
    /// No path reaches a violation.
    Safe,
    /// Some path reaches a violation of this kind.
    Violation(ViolationKind),
}

impl Expectation {
    pub fn is_met_by(&self, exploration: &Exploration) -> bool {
        match self {
            Expectation::Safe => exploration.verdict() == Verdict::Safe,
            Expectation::Violation(kind) => exploration.violation_kinds().contains(kind),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Safe => write!(f, "safe"),
            Expectation::Violation(kind) => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HarnessMetadata {
    /// Fully qualified name, `<family>::<harness>`.
    pub pretty_name: &'static str,
    pub family: ModelFamily,
    pub description: &'static str,
    pub expected: Expectation,
    /// Model configuration this harness needs, whatever the session configures.
    pub env: Option<EnvConfig>,
    pub scenario: Scenario,
}

impl HarnessMetadata {
    pub fn harness_name_unqualified(&self) -> &str {
        self.pretty_name.rsplit("::").next().unwrap_or(self.pretty_name)
    }

    pub fn env_config(&self, session: EnvConfig) -> EnvConfig {
        self.env.unwrap_or(session)
    }
}

/// Every registered harness, grouped by family in declaration order.
pub fn all_harnesses() -> Vec<&'static HarnessMetadata> {
    [
        mutex::HARNESSES,
        spinlock::HARNESSES,
        module::HARNESSES,
        rwlock::HARNESSES,
        err_ptr::HARNESSES,
        usb::HARNESSES,
        sdio::HARNESSES,
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Owner ids used by the harnesses that need distinct claimants.
const fn owner(id: u32) -> OwnerId {
    match OwnerId::new(id) {
        Some(owner) => owner,
        None => panic!("owner ids are non-zero"),
    }
}
