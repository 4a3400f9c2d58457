// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Implements the subcommand handling of the list subcommand

use crate::args::ValidateArgs;
use crate::harnesses::ModelFamily;
use clap::{Error, Parser, ValueEnum};

/// List the registered harnesses
#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Only list the harnesses of these model families.
    #[arg(long = "model", value_enum, ignore_case = true)]
    pub models: Vec<ModelFamily>,

    /// Output format
    #[clap(long, default_value = "pretty")]
    pub format: Format,
}

/// Message formats available for the subcommand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Format {
    /// Print the registry as a table.
    Pretty,
    /// Print the registry in JSON format.
    Json,
}

impl ValidateArgs for ListArgs {
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}
