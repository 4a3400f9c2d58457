// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::Result;
use ldv::explore::{Exploration, Explorer};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info_span};

use crate::args::OutputFormat;
use crate::harnesses::HarnessMetadata;
use crate::session::LdvSession;

/// A HarnessRunner is responsible for checking all harnesses of a session.
pub(crate) struct HarnessRunner<'sess> {
    /// The underlying session
    pub sess: &'sess LdvSession,
}

/// The result of checking a single harness. This both hangs on to the harness metadata
/// (as a means to identify which harness), and provides that harness's exploration.
#[derive(Debug, Serialize)]
pub(crate) struct HarnessResult<'a> {
    #[serde(serialize_with = "serialize_harness")]
    pub harness: &'a HarnessMetadata,
    pub exploration: Exploration,
}

impl HarnessResult<'_> {
    /// Whether the models reported what the harness expects.
    pub fn matches(&self) -> bool {
        self.harness.expected.is_met_by(&self.exploration)
    }
}

fn serialize_harness<S: serde::Serializer>(
    harness: &&HarnessMetadata,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    json!({
        "name": harness.pretty_name,
        "family": harness.family,
        "expected": harness.expected,
    })
    .serialize(serializer)
}

/// The results of checking all harnesses, partitioned into harnesses whose outcome matches
/// their expectation and those whose outcome does not.
#[derive(Debug, Default)]
pub(crate) struct HarnessResults<'a> {
    pub successes: Vec<HarnessResult<'a>>,
    pub failures: Vec<HarnessResult<'a>>,
}

impl<'sess> HarnessRunner<'sess> {
    /// Explore every harness in `harnesses`, on `--jobs` threads.
    pub(crate) fn check_all_harnesses<'a>(
        &self,
        harnesses: &[&'a HarnessMetadata],
    ) -> Result<HarnessResults<'a>> {
        let pool = {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(x) = self.sess.args.jobs() {
                builder = builder.num_threads(x);
            }
            builder.build()?
        };

        let fail_fast = self.sess.args.fail_fast;
        let outcomes: Vec<HarnessResult<'a>> = pool.install(|| {
            if fail_fast {
                // Stop at the first mismatch, in registry order.
                let mut outcomes = Vec::new();
                for &harness in harnesses {
                    let result = self.sess.check_harness(harness);
                    let stop = !result.matches();
                    outcomes.push(result);
                    if stop {
                        break;
                    }
                }
                outcomes
            } else {
                harnesses.par_iter().map(|&harness| self.sess.check_harness(harness)).collect()
            }
        });

        let mut results = HarnessResults::default();
        for result in outcomes {
            if result.matches() {
                results.successes.push(result);
            } else {
                results.failures.push(result);
            }
        }
        Ok(results)
    }
}

impl LdvSession {
    /// Explore a single harness from a fresh environment per path.
    pub(crate) fn check_harness<'a>(&self, harness: &'a HarnessMetadata) -> HarnessResult<'a> {
        let span = info_span!("check_harness", harness = harness.pretty_name);
        let _guard = span.enter();
        if self.args.common_args.verbose() && self.args.output_format == OutputFormat::Regular {
            println!("Checking harness {}...", harness.pretty_name);
        }

        let env = harness.env_config(self.config.environment);
        let explorer = Explorer::new(self.config.explore.clone(), env);
        let exploration = explorer.explore(harness.scenario);
        debug!(
            harness = harness.pretty_name,
            verdict = %exploration.verdict(),
            paths = exploration.paths,
            "check_harness"
        );
        HarnessResult { harness, exploration }
    }

    /// Concludes a session by printing a summary report. Returns whether every harness matched
    /// its expectation.
    pub(crate) fn print_final_summary(&self, results: &HarnessResults) -> Result<bool> {
        let succeeding = results.successes.len();
        let failing = results.failures.len();
        let total = succeeding + failing;

        match self.args.output_format {
            OutputFormat::Json => {
                let report = json!({
                    "successes": &results.successes,
                    "failures": &results.failures,
                    "totals": { "matched": succeeding, "mismatched": failing, "total": total },
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Regular | OutputFormat::Terse if !self.args.common_args.quiet => {
                let mut all: Vec<&HarnessResult> =
                    results.successes.iter().chain(results.failures.iter()).collect();
                all.sort_by_key(|result| result.harness.pretty_name);
                for result in all {
                    self.print_harness_result(result);
                }
                if failing > 0 {
                    println!("Summary:");
                }
                for failure in results.failures.iter() {
                    println!("Verification failed for - {}", failure.harness.pretty_name);
                }
                println!(
                    "Complete - {succeeding} harnesses as expected, {failing} failures, {total} total."
                );
            }
            OutputFormat::Regular | OutputFormat::Terse => {}
        }

        Ok(failing == 0)
    }

    fn print_harness_result(&self, result: &HarnessResult) {
        let harness = result.harness;
        let exploration = &result.exploration;
        let status = if result.matches() {
            console::style("MATCHED").green()
        } else {
            console::style("MISMATCHED").red()
        };
        if self.args.output_format == OutputFormat::Terse {
            println!(
                "{} {status}: {} (expected {})",
                harness.pretty_name,
                exploration.verdict(),
                harness.expected
            );
            return;
        }

        println!("Harness {}: {}", harness.pretty_name, harness.description);
        println!(
            " - {} paths: {} passed, {} exited, {} violated{}",
            exploration.paths,
            exploration.passed,
            exploration.exited,
            exploration.violated,
            if exploration.bounded { " (bounded)" } else { "" }
        );
        println!(" - expected: {}", harness.expected);
        let show_all = self.args.common_args.verbose();
        for cex in exploration.counterexamples.iter().take(if show_all { usize::MAX } else { 1 }) {
            println!(" - violation: {}", cex.violation);
            if show_all || !result.matches() {
                let trace: Vec<String> = cex.trace.iter().map(ToString::to_string).collect();
                println!("   choices: [{}]", trace.join(", "));
            }
        }
        println!("VERIFICATION:- {} ({status})", exploration.verdict());
        println!();
    }
}
