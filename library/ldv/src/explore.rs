// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exhaustive exploration of a scenario's nondeterministic choices.
//!
//! The [`Explorer`] runs a scenario once per path through its choice tree, depth first, each
//! time from a fresh [`Environment`]. Booleans are enumerated completely; integers and pointers
//! range over the small boundary domains of [`ExploreConfig`]. Every path that returns normally
//! is followed by the final-state check. Paths that end in [`Halt::Exit`] are pruned.
//!
//! # Example:
//!
//! ```rust
//! use ldv::explore::{Explorer, ExploreConfig, Verdict};
//! use ldv::{EnvConfig, ViolationKind};
//!
//! let explorer = Explorer::new(ExploreConfig::default(), EnvConfig::default());
//! let exploration = explorer.explore(|env, nondet| {
//!     if env.mutex.acquire_interruptible(nondet)? == 0 {
//!         env.mutex.release()?;
//!     }
//!     Ok(())
//! });
//! assert_eq!(exploration.paths, 2);
//! assert_eq!(exploration.verdict(), Verdict::Safe);
//! ```

use crate::env::{EnvConfig, Environment};
use crate::models::err_ptr::LDV_PTR_MAX;
use crate::nondet::{Choice, NondetSource, ReplaySource};
use crate::violation::{Halt, Violation, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, debug_span, trace};

/// Bounds and value domains of an exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ExploreConfig {
    /// Stop after this many paths.
    pub max_paths: usize,
    /// Choices drawn past this depth on one path all take the first domain value.
    pub max_choices: usize,
    /// Counterexamples kept in the report. Violating paths past this limit are only counted.
    pub max_counterexamples: usize,
    pub int_domain: Vec<i32>,
    pub ptr_domain: Vec<usize>,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        ExploreConfig {
            max_paths: 100_000,
            max_choices: 64,
            max_counterexamples: 16,
            int_domain: vec![0, 1, -1, i32::MAX, i32::MIN],
            ptr_domain: vec![0, 1, LDV_PTR_MAX, LDV_PTR_MAX + 1, usize::MAX],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// No explored path reaches a violation.
    Safe,
    /// At least one explored path reaches a violation.
    Unsafe,
}

/// A violating path: the violation and the choices that lead to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterexample {
    pub violation: Violation,
    pub trace: Vec<Choice>,
}

impl Counterexample {
    /// A source that plays this path back.
    pub fn replay(&self) -> ReplaySource {
        ReplaySource::new(self.trace.iter().copied())
    }
}

/// Summary of an exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exploration {
    pub paths: usize,
    pub passed: usize,
    /// Paths pruned by a function that never returns.
    pub exited: usize,
    pub violated: usize,
    /// Every violation kind reached, including on paths past `max_counterexamples`.
    pub kinds: BTreeSet<ViolationKind>,
    pub counterexamples: Vec<Counterexample>,
    /// Set when `max_paths` or `max_choices` cut the search short.
    pub bounded: bool,
}

impl Exploration {
    pub fn verdict(&self) -> Verdict {
        if self.violated == 0 { Verdict::Safe } else { Verdict::Unsafe }
    }

    /// The distinct kinds of violation reached on any explored path.
    pub fn violation_kinds(&self) -> &BTreeSet<ViolationKind> {
        &self.kinds
    }

    pub fn first_counterexample(&self) -> Option<&Counterexample> {
        self.counterexamples.first()
    }
}

/// Run `scenario` once against a fresh, initialized environment, followed by the final-state
/// check when it returns normally.
pub fn run_path<F>(config: EnvConfig, nondet: &mut dyn NondetSource, scenario: &F) -> Result<(), Halt>
where
    F: Fn(&mut Environment, &mut dyn NondetSource) -> Result<(), Halt> + ?Sized,
{
    let mut env = Environment::initialized(config);
    scenario(&mut env, nondet)?;
    env.check_final_state()?;
    Ok(())
}

pub struct Explorer {
    config: ExploreConfig,
    env: EnvConfig,
}

impl Explorer {
    pub fn new(config: ExploreConfig, env: EnvConfig) -> Self {
        Explorer { config, env }
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    pub fn explore<F>(&self, scenario: F) -> Exploration
    where
        F: Fn(&mut Environment, &mut dyn NondetSource) -> Result<(), Halt>,
    {
        let span = debug_span!("explore", max_paths = self.config.max_paths);
        let _guard = span.enter();

        let mut exploration = Exploration::default();
        let mut stack: Vec<Branch> = Vec::new();
        loop {
            if exploration.paths >= self.config.max_paths {
                exploration.bounded = true;
                break;
            }
            let mut source = PathSource::new(&self.config, &mut stack);
            let result = run_path(self.env, &mut source, &scenario);
            let PathSource { depth, trace, cut, .. } = source;
            exploration.bounded |= cut;
            self.record(&mut exploration, result, trace);

            stack.truncate(depth);
            if !advance(&mut stack) {
                break;
            }
        }

        debug!(
            paths = exploration.paths,
            passed = exploration.passed,
            exited = exploration.exited,
            violated = exploration.violated,
            bounded = exploration.bounded,
            "explore"
        );
        exploration
    }

    fn record(&self, exploration: &mut Exploration, result: Result<(), Halt>, trace: Vec<Choice>) {
        exploration.paths += 1;
        match result {
            Ok(()) => {
                trace!(?trace, "passed");
                exploration.passed += 1;
            }
            Err(Halt::Exit) => {
                trace!(?trace, "exited");
                exploration.exited += 1;
            }
            Err(Halt::Violation(violation)) => {
                trace!(?trace, %violation, "violated");
                exploration.violated += 1;
                exploration.kinds.insert(violation.kind);
                if exploration.counterexamples.len() < self.config.max_counterexamples {
                    exploration.counterexamples.push(Counterexample { violation, trace });
                }
            }
        }
    }
}

/// One choice point on the current path: the index taken and the size of its domain.
#[derive(Debug, Clone, Copy)]
struct Branch {
    index: usize,
    size: usize,
}

/// Move `stack` to the next unexplored path. Returns `false` once every path was visited.
fn advance(stack: &mut Vec<Branch>) -> bool {
    while let Some(branch) = stack.pop() {
        if branch.index + 1 < branch.size {
            stack.push(Branch { index: branch.index + 1, size: branch.size });
            return true;
        }
    }
    false
}

/// Follows the branches already on `stack` and extends it with first choices past its end.
struct PathSource<'a> {
    config: &'a ExploreConfig,
    stack: &'a mut Vec<Branch>,
    depth: usize,
    trace: Vec<Choice>,
    cut: bool,
}

impl<'a> PathSource<'a> {
    fn new(config: &'a ExploreConfig, stack: &'a mut Vec<Branch>) -> Self {
        PathSource { config, stack, depth: 0, trace: Vec::new(), cut: false }
    }

    fn pick(&mut self, size: usize) -> usize {
        if size <= 1 {
            return 0;
        }
        if self.depth >= self.config.max_choices {
            self.cut = true;
            return 0;
        }
        let index = match self.stack.get(self.depth) {
            Some(branch) => branch.index,
            None => {
                self.stack.push(Branch { index: 0, size });
                0
            }
        };
        self.depth += 1;
        index
    }
}

impl NondetSource for PathSource<'_> {
    fn any_bool(&mut self) -> bool {
        let value = self.pick(2) == 1;
        self.trace.push(Choice::Bool(value));
        value
    }

    fn any_i32(&mut self) -> i32 {
        let config = self.config;
        let domain = &config.int_domain;
        let value = domain.get(self.pick(domain.len())).copied().unwrap_or(0);
        self.trace.push(Choice::Int(value));
        value
    }

    fn any_usize(&mut self) -> usize {
        let config = self.config;
        let domain = &config.ptr_domain;
        let value = domain.get(self.pick(domain.len())).copied().unwrap_or(0);
        self.trace.push(Choice::Ptr(value));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleRef;

    fn explorer() -> Explorer {
        Explorer::new(ExploreConfig::default(), EnvConfig::default())
    }

    #[test]
    fn check_deterministic_scenario_is_one_path() {
        let exploration = explorer().explore(|env, _| {
            env.mutex.acquire()?;
            env.mutex.release()?;
            Ok(())
        });
        assert_eq!(exploration.paths, 1);
        assert_eq!(exploration.passed, 1);
        assert_eq!(exploration.verdict(), Verdict::Safe);
        assert!(!exploration.bounded);
    }

    #[test]
    fn check_bool_tree_is_enumerated() {
        let exploration = explorer().explore(|_, nondet| {
            for _ in 0..3 {
                nondet.any_bool();
            }
            Ok(())
        });
        assert_eq!(exploration.paths, 8);
    }

    #[test]
    fn check_domains_are_enumerated() {
        let config = ExploreConfig {
            int_domain: vec![0, 7],
            ptr_domain: vec![0, 1, 2],
            ..ExploreConfig::default()
        };
        let exploration = Explorer::new(config, EnvConfig::default()).explore(|_, nondet| {
            let ptr = nondet.undef_ptr();
            if ptr != 0 {
                nondet.undef_int();
            }
            Ok(())
        });
        // ptr == 0 ends the path, the two others branch again on the int.
        assert_eq!(exploration.paths, 5);
    }

    #[test]
    fn check_missing_release_on_error_path() {
        let exploration = explorer().explore(|env, nondet| {
            env.mutex.acquire()?;
            if nondet.any_bool() {
                // Error path forgets the unlock.
                return Ok(());
            }
            env.mutex.release()?;
            Ok(())
        });
        assert_eq!(exploration.paths, 2);
        assert_eq!(exploration.violated, 1);
        assert_eq!(exploration.verdict(), Verdict::Unsafe);
        let cex = exploration.first_counterexample().unwrap();
        assert_eq!(cex.violation.kind, ViolationKind::ResidualStateAtTeardown);
        assert_eq!(cex.trace, vec![Choice::Bool(true)]);
    }

    #[test]
    fn check_exit_paths_are_pruned() {
        let exploration = explorer().explore(|env, _| {
            let owner = Some(ModuleRef(0x10));
            env.module_refcount.get(owner)?;
            // The mutex is still held, but the path never returns.
            env.mutex.acquire()?;
            Err(env.module_refcount.put_and_exit(owner))
        });
        assert_eq!(exploration.exited, 1);
        assert_eq!(exploration.verdict(), Verdict::Safe);
    }

    #[test]
    fn check_counterexample_replays() {
        let scenario = |env: &mut Environment, nondet: &mut dyn NondetSource| -> Result<(), Halt> {
            let owner = Some(ModuleRef(0x10));
            let taken = env.module_refcount.try_get(owner, nondet)?;
            if nondet.any_bool() || taken {
                env.module_refcount.put(owner)?;
            }
            Ok(())
        };
        let exploration = explorer().explore(scenario);
        assert_eq!(exploration.violation_kinds(), &BTreeSet::from([ViolationKind::OverRelease]));
        let cex = exploration.first_counterexample().unwrap();
        let mut replay = cex.replay();
        let result = run_path(EnvConfig::default(), &mut replay, &scenario);
        assert_eq!(result, Err(Halt::Violation(cex.violation.clone())));
        assert_eq!(replay.leftover(), 0);
    }

    #[test]
    fn check_kinds_past_the_counterexample_limit() {
        let exploration = explorer().explore(|env, nondet| {
            let mut all = true;
            for _ in 0..5 {
                all &= nondet.any_bool();
            }
            env.mutex.acquire()?;
            if all {
                env.mutex.acquire()?;
            }
            Ok(())
        });
        assert_eq!(exploration.paths, 32);
        assert_eq!(exploration.violated, 32);
        assert_eq!(exploration.counterexamples.len(), 16);
        // The double acquire is only on the last path, long after the stored ones.
        assert!(
            exploration
                .counterexamples
                .iter()
                .all(|cex| cex.violation.kind == ViolationKind::ResidualStateAtTeardown)
        );
        assert_eq!(
            exploration.violation_kinds(),
            &BTreeSet::from([ViolationKind::DoubleAcquire, ViolationKind::ResidualStateAtTeardown])
        );
    }

    #[test]
    fn check_bounds() {
        let config = ExploreConfig { max_paths: 3, ..ExploreConfig::default() };
        let exploration = Explorer::new(config, EnvConfig::default()).explore(|_, nondet| {
            nondet.any_bool();
            nondet.any_bool();
            Ok(())
        });
        assert_eq!(exploration.paths, 3);
        assert!(exploration.bounded);

        let config = ExploreConfig { max_choices: 1, ..ExploreConfig::default() };
        let exploration = Explorer::new(config, EnvConfig::default()).explore(|_, nondet| {
            nondet.any_bool();
            nondet.any_bool();
            Ok(())
        });
        assert_eq!(exploration.paths, 2);
        assert!(exploration.bounded);
    }
}
