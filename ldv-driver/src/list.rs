// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Implements the list subcommand: print the harness registry.

use crate::args::list_args::{Format, ListArgs};
use crate::harnesses::{Expectation, HarnessMetadata, ModelFamily, all_harnesses};
use crate::metadata::filter_families;
use anyhow::Result;
use comfy_table::Table;
use serde_json::json;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

// Represents the version of our JSON file format.
// Increment this version (according to semantic versioning rules) whenever the JSON output format changes.
const FILE_VERSION: &str = "0.1";

/// Harness counts per family, in family order.
struct Totals {
    per_family: BTreeMap<ModelFamily, (usize, usize)>,
}

impl Totals {
    fn new(harnesses: &[&HarnessMetadata]) -> Self {
        let mut per_family = BTreeMap::new();
        for harness in harnesses {
            let (safe, buggy) = per_family.entry(harness.family).or_insert((0, 0));
            if harness.expected == Expectation::Safe {
                *safe += 1;
            } else {
                *buggy += 1;
            }
        }
        Totals { per_family }
    }
}

pub fn list_main(args: &ListArgs) -> Result<()> {
    let harnesses = filter_families(&all_harnesses(), &args.models);
    let totals = Totals::new(&harnesses);
    match args.format {
        Format::Pretty => pretty(&harnesses, &totals),
        Format::Json => json(&harnesses, &totals),
    }
}

/// Set some defaults for how we format tables
fn list_table_new() -> Table {
    use comfy_table::*;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
        .load_preset(comfy_table::presets::NOTHING)
        .set_style(TableComponent::BottomBorder, '=')
        .set_style(TableComponent::BottomBorderIntersections, '=')
        .set_style(TableComponent::TopBorder, '=')
        .set_style(TableComponent::TopBorderIntersections, '=')
        .set_style(TableComponent::HeaderLines, '-')
        .set_style(TableComponent::MiddleHeaderIntersections, '+')
        .set_style(TableComponent::VerticalLines, '|');
    table
}

fn harness_table(harnesses: &[&HarnessMetadata]) -> Table {
    let mut table = list_table_new();
    table.set_header(vec!["Harness", "Expected", "Description"]);
    for harness in harnesses {
        table.add_row(vec![
            harness.pretty_name.to_string(),
            harness.expected.to_string(),
            harness.description.to_string(),
        ]);
    }
    table
}

fn totals_table(totals: &Totals) -> Table {
    let mut table = list_table_new();
    table.set_header(vec!["Model family", "Safe", "Buggy"]);
    let (mut all_safe, mut all_buggy) = (0, 0);
    for family in ModelFamily::iter() {
        if let Some((safe, buggy)) = totals.per_family.get(&family) {
            table.add_row(vec![family.to_string(), safe.to_string(), buggy.to_string()]);
            all_safe += safe;
            all_buggy += buggy;
        }
    }
    table.add_row(vec!["Total".to_string(), all_safe.to_string(), all_buggy.to_string()]);
    table
}

/// Output the registry as tables printed to the terminal.
fn pretty(harnesses: &[&HarnessMetadata], totals: &Totals) -> Result<()> {
    if harnesses.is_empty() {
        println!("No harnesses found.");
        return Ok(());
    }
    println!("{}", harness_table(harnesses));
    println!();
    println!("{}", totals_table(totals));
    Ok(())
}

/// Output the registry as JSON on stdout.
fn json(harnesses: &[&HarnessMetadata], totals: &Totals) -> Result<()> {
    let json_obj = json_value(harnesses, totals);
    println!("{}", serde_json::to_string_pretty(&json_obj)?);
    Ok(())
}

fn json_value(harnesses: &[&HarnessMetadata], totals: &Totals) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = harnesses
        .iter()
        .map(|harness| {
            json!({
                "name": harness.pretty_name,
                "family": harness.family,
                "description": harness.description,
                "expected": harness.expected,
            })
        })
        .collect();
    let per_family: BTreeMap<String, serde_json::Value> = totals
        .per_family
        .iter()
        .map(|(family, (safe, buggy))| (family.to_string(), json!({ "safe": safe, "buggy": buggy })))
        .collect();
    json!({
        "file-version": FILE_VERSION,
        "harnesses": entries,
        "totals": per_family,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_totals_cover_registry() {
        let harnesses = all_harnesses();
        let totals = Totals::new(&harnesses);
        let counted: usize = totals.per_family.values().map(|(safe, buggy)| safe + buggy).sum();
        assert_eq!(counted, harnesses.len());
        assert_eq!(totals.per_family.len(), ModelFamily::iter().count());
    }

    #[test]
    fn check_json_output() {
        let harnesses = filter_families(&all_harnesses(), &[ModelFamily::Sdio]);
        let value = json_value(&harnesses, &Totals::new(&harnesses));
        let entries = value["harnesses"].as_array().unwrap();
        assert_eq!(entries.len(), harnesses.len());
        assert_eq!(entries[0]["family"], "sdio");
        assert_eq!(entries[0]["expected"]["outcome"], "safe");
        assert_eq!(value["totals"].as_object().unwrap().len(), 1);
        assert!(value["totals"].get("sdio").is_some());
    }

    #[test]
    fn check_expected_violation_serialization() {
        let harnesses = filter_families(&all_harnesses(), &[ModelFamily::Mutex]);
        let value = json_value(&harnesses, &Totals::new(&harnesses));
        let double = value["harnesses"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["name"] == "mutex::check_double_lock")
            .unwrap();
        assert_eq!(double["expected"]["outcome"], "violation");
        assert_eq!(double["expected"]["kind"], "double-acquire");
    }
}
