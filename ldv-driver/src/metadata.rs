// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{Result, bail};
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::harnesses::{HarnessMetadata, ModelFamily};
use crate::session::LdvSession;

impl LdvSession {
    /// Determine which harnesses to run, based on the command-line filters.
    pub fn determine_targets<'a>(
        &self,
        all_harnesses: &[&'a HarnessMetadata],
    ) -> Result<Vec<&'a HarnessMetadata>> {
        let of_families = filter_families(all_harnesses, &self.args.models);
        let harnesses = BTreeSet::from_iter(self.args.harnesses.iter());
        let total_harnesses = harnesses.len();

        if harnesses.is_empty() {
            return Ok(of_families);
        }
        let harnesses_found = find_harnesses(harnesses, &of_families, self.args.exact);
        if harnesses_found.is_empty() {
            bail!("no harness matches the filter(s) {:?}", self.args.harnesses);
        }
        if self.args.exact && harnesses_found.len() < total_harnesses {
            bail!(
                "Please provide exact harness name. One or more of the harnesses provided don't contain the full name.",
            );
        }
        Ok(harnesses_found)
    }
}

/// Keep the harnesses of `families`, or all of them when no family is given.
pub fn filter_families<'a>(
    harnesses: &[&'a HarnessMetadata],
    families: &[ModelFamily],
) -> Vec<&'a HarnessMetadata> {
    harnesses
        .iter()
        .copied()
        .filter(|harness| families.is_empty() || families.contains(&harness.family))
        .collect()
}

/// Search for harnesses matching the given filters.
fn find_harnesses<'a>(
    targets: BTreeSet<&String>,
    all_harnesses: &[&'a HarnessMetadata],
    exact_filter: bool,
) -> Vec<&'a HarnessMetadata> {
    debug!(?targets, "find_harnesses");
    let mut result = vec![];
    for md in all_harnesses.iter() {
        let matches = if exact_filter {
            targets.iter().any(|target| *target == md.pretty_name)
        } else {
            // Either an exact match, or a substring match.
            targets.iter().any(|target| {
                *target == md.pretty_name
                    || *target == md.harness_name_unqualified()
                    || md.pretty_name.contains(target.as_str())
            })
        };
        if matches {
            result.push(*md);
        } else {
            trace!(skip = md.pretty_name, "find_harnesses");
        }
    }
    result
}
