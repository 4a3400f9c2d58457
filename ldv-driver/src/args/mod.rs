// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Module that define the driver's command line interface. This includes all subcommands.

pub mod common;
pub mod list_args;

use self::common::*;
use crate::harnesses::ModelFamily;
use clap::{ValueEnum, error::Error, error::ErrorKind};
use std::path::PathBuf;

/// Trait used to perform extra validation after parsing.
pub trait ValidateArgs {
    /// Perform post-parsing validation but do not abort.
    fn validate(&self) -> Result<(), Error>;
}

/// Validate a set of arguments and ensure they are in a valid state.
/// This method will abort execution with a user friendly error message if the state is invalid.
pub fn check_is_valid<T>(command: &T)
where
    T: clap::Parser + ValidateArgs,
{
    if let Err(error) = command.validate() {
        error.format(&mut T::command()).exit()
    }
}

#[derive(Debug, clap::Parser)]
#[command(
    version,
    name = "ldv-driver",
    about = "Check the registered driver scenarios against the LDV resource models",
    args_override_self = true,
    subcommand_negates_reqs = true,
    subcommand_precedence_over_arg = true,
    args_conflicts_with_subcommands = true
)]
pub struct DriverArgs {
    #[command(subcommand)]
    pub command: Option<DriverSubcommand>,

    #[command(flatten)]
    pub verify_opts: VerificationArgs,
}

/// The driver takes optional subcommands to request specialized behavior.
/// When no subcommand is provided, there is an implied verification subcommand.
#[derive(Debug, clap::Subcommand)]
pub enum DriverSubcommand {
    /// List the registered harnesses and what each one is expected to find.
    List(Box<list_args::ListArgs>),
}

#[derive(Debug, clap::Args)]
pub struct VerificationArgs {
    /// If specified, only run harnesses that match this filter. This option can be provided
    /// multiple times, which will run all tests matching any of the filters.
    #[arg(long = "harness", num_args(1), value_name = "HARNESS_FILTER")]
    pub harnesses: Vec<String>,

    /// When specified, the harness filter will only match the exact fully qualified name of a
    /// harness.
    #[arg(long, requires("harnesses"))]
    pub exact: bool,

    /// Only run the harnesses of these model families.
    #[arg(long = "model", value_enum, ignore_case = true)]
    pub models: Vec<ModelFamily>,

    /// TOML file with `[explore]` and `[environment]` tables.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stop exploring a harness after this many paths.
    #[arg(long)]
    pub max_paths: Option<usize>,

    /// Choices drawn past this depth on a single path are no longer branched on.
    #[arg(long)]
    pub max_choices: Option<usize>,

    /// Number of parallel jobs, defaults to 1
    #[arg(short, long)]
    pub jobs: Option<Option<usize>>,

    /// Toggle between different styles of output
    #[arg(long, default_value = "regular", ignore_case = true, value_enum)]
    pub output_format: OutputFormat,

    /// Stop after the first harness whose outcome differs from its expectation.
    #[arg(long)]
    pub fail_fast: bool,

    #[command(flatten)]
    pub common_args: CommonArgs,
}

impl VerificationArgs {
    /// Computes how many threads should be used to verify harnesses.
    pub fn jobs(&self) -> Option<usize> {
        match self.jobs {
            None => Some(1),          // no argument, default 1
            Some(None) => None,       // -j
            Some(Some(x)) => Some(x), // -j=x
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    /// One block per harness, with the counterexample of every unexpected violation.
    Regular,
    /// One line per harness.
    Terse,
    /// The whole run as a JSON document, and JSON log lines.
    Json,
}

impl ValidateArgs for DriverArgs {
    fn validate(&self) -> Result<(), Error> {
        match &self.command {
            Some(DriverSubcommand::List(list)) => list.validate(),
            None => self.verify_opts.validate(),
        }
    }
}

impl ValidateArgs for VerificationArgs {
    fn validate(&self) -> Result<(), Error> {
        self.common_args.validate()?;
        if self.max_paths == Some(0) {
            return Err(Error::raw(
                ErrorKind::InvalidValue,
                "The `--max-paths` option requires a value of at least 1.",
            ));
        }
        if self.jobs == Some(Some(0)) {
            return Err(Error::raw(
                ErrorKind::InvalidValue,
                "The `--jobs` option requires a value of at least 1.",
            ));
        }
        if let Some(config) = &self.config
            && !config.is_file()
        {
            return Err(Error::raw(
                ErrorKind::InvalidValue,
                format!("Configuration file `{}` does not exist.", config.display()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &str) -> Result<DriverArgs, Error> {
        DriverArgs::try_parse_from(args.split_whitespace())
    }

    #[test]
    fn check_arg_parsing() {
        let args = parse("ldv-driver --harness double --harness mutex:: --max-paths 10").unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.verify_opts.harnesses, ["double", "mutex::"]);
        assert_eq!(args.verify_opts.max_paths, Some(10));
        assert_eq!(args.verify_opts.output_format, OutputFormat::Regular);
        assert_eq!(args.verify_opts.jobs(), Some(1));
        args.validate().unwrap();

        let args = parse("ldv-driver --model rwlock --model SDIO --output-format terse").unwrap();
        assert_eq!(args.verify_opts.models, [ModelFamily::Rwlock, ModelFamily::Sdio]);
        assert_eq!(args.verify_opts.output_format, OutputFormat::Terse);
    }

    #[test]
    fn check_exact_requires_harness() {
        assert!(parse("ldv-driver --exact").is_err());
        assert!(parse("ldv-driver --exact --harness mutex::check_double_lock").is_ok());
    }

    #[test]
    fn check_jobs() {
        assert_eq!(parse("ldv-driver -j").unwrap().verify_opts.jobs(), None);
        assert_eq!(parse("ldv-driver --jobs=4").unwrap().verify_opts.jobs(), Some(4));
        assert!(parse("ldv-driver --jobs=0").unwrap().validate().is_err());
    }

    #[test]
    fn check_invalid_values_fail() {
        assert!(parse("ldv-driver --max-paths 0").unwrap().validate().is_err());
        assert!(parse("ldv-driver --debug --quiet").unwrap().validate().is_err());
        assert!(parse("ldv-driver --config /no/such/ldv.toml").unwrap().validate().is_err());
        assert!(parse("ldv-driver --output-format old").is_err());
    }

    #[test]
    fn check_list_subcommand() {
        let args = parse("ldv-driver list --format json").unwrap();
        match args.command {
            Some(DriverSubcommand::List(list)) => {
                assert_eq!(list.format, list_args::Format::Json)
            }
            None => panic!("expected the list subcommand"),
        }
        assert!(parse("ldv-driver list --harness foo").is_err());
    }
}
