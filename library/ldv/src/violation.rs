// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The single channel contract violations are reported through.
//!
//! Model operations return `Result<_, Violation>`. Turning a violation into whatever the
//! host analysis expects (a panic, a recorded finding) is the job of a [`ViolationSink`].

use serde::{Deserialize, Serialize};

/// The kind of contract a caller broke.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Acquiring a lock or claim that is already held.
    DoubleAcquire,
    /// Releasing a lock or claim that is not held.
    ReleaseWithoutAcquire,
    /// More puts than gets on a reference counter.
    OverRelease,
    /// A get on a reference counter that already holds the largest count it can represent.
    RefcountOverflow,
    /// Using or releasing a claim held by a different owner, or by none.
    StaleClaimUse,
    /// A model was not back to its idle state at the end of the scenario.
    ResidualStateAtTeardown,
    /// Blocking allocation while a spinlock is held.
    SleepInAtomicContext,
    /// An explicitly initialized model was used before `initialize()`.
    UseBeforeInitialize,
    /// A caller-level assertion did not hold.
    AssertionFailed,
}

/// A contract violation raised by one of the models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{model}: {kind}: {detail}")]
pub struct Violation {
    /// The name of the model instance that detected the violation.
    pub model: String,
    pub kind: ViolationKind,
    pub detail: String,
}

impl Violation {
    pub fn new(model: impl Into<String>, kind: ViolationKind, detail: impl Into<String>) -> Self {
        Violation { model: model.into(), kind, detail: detail.into() }
    }
}

/// Why a modeled execution path stopped before returning normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Halt {
    /// A contract was violated. The verifier reports this path.
    #[error(transparent)]
    Violation(#[from] Violation),
    /// The path ended in a function that never returns (e.g. `module_put_and_exit`).
    /// The verifier prunes this path instead of reporting it.
    #[error("execution path terminated")]
    Exit,
}

impl Halt {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Halt::Violation(violation) => Some(violation),
            Halt::Exit => None,
        }
    }
}

/// Receives every violation a host needs to know about.
pub trait ViolationSink {
    fn report_violation(&mut self, violation: &Violation);
}

/// Sink for hosts that detect failures as panics (unit tests, Kani proof harnesses).
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicSink;

impl ViolationSink for PanicSink {
    fn report_violation(&mut self, violation: &Violation) {
        panic!("ldv violation: {violation}");
    }
}

/// Sink that keeps every violation it receives, in order.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    violations: Vec<Violation>,
}

impl Recorder {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl ViolationSink for Recorder {
    fn report_violation(&mut self, violation: &Violation) {
        tracing::debug!(%violation, "recorded");
        self.violations.push(violation.clone());
    }
}

/// Forward the violation in `result`, if any, to `sink`.
/// Returns the operation's value when the call respected the contract.
pub fn report<T, S>(sink: &mut S, result: Result<T, Violation>) -> Option<T>
where
    S: ViolationSink + ?Sized,
{
    match result {
        Ok(value) => Some(value),
        Err(violation) => {
            sink.report_violation(&violation);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_violation_display() {
        let violation = Violation::new("mutex", ViolationKind::DoubleAcquire, "already locked");
        assert_eq!(violation.to_string(), "mutex: double-acquire: already locked");
    }

    #[test]
    fn check_recorder_keeps_order() {
        let mut recorder = Recorder::default();
        assert_eq!(report(&mut recorder, Ok::<_, Violation>(3)), Some(3));
        assert!(recorder.is_clean());

        let first = Violation::new("a", ViolationKind::OverRelease, "");
        let second = Violation::new("b", ViolationKind::StaleClaimUse, "");
        assert_eq!(report(&mut recorder, Err::<(), _>(first.clone())), None);
        assert_eq!(report(&mut recorder, Err::<(), _>(second.clone())), None);
        assert_eq!(recorder.violations(), &[first, second]);
    }

    #[test]
    #[should_panic(expected = "ldv violation: spinlock: release-without-acquire")]
    fn check_panic_sink() {
        let violation = Violation::new("spinlock", ViolationKind::ReleaseWithoutAcquire, "free");
        report(&mut PanicSink, Err::<(), _>(violation));
    }

    #[test]
    fn check_halt_conversion() {
        let violation = Violation::new("module", ViolationKind::OverRelease, "");
        let halt: Halt = violation.clone().into();
        assert_eq!(halt.violation(), Some(&violation));
        assert_eq!(Halt::Exit.violation(), None);
    }
}
