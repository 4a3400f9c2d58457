// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Define arguments that should be common to all subcommands of the driver.
use crate::args::ValidateArgs;
use clap::{error::Error, error::ErrorKind};

/// Common arguments that we expect to be included in most subcommands.
#[derive(Debug, Default, clap::Args)]
pub struct CommonArgs {
    /// Produce full debug information
    #[arg(long)]
    pub debug: bool,
    /// Produces no output, just an exit code; overrides --verbose
    #[arg(long, short)]
    pub quiet: bool,
    /// Print every harness as it is checked, along with the choices of each counterexample
    #[arg(long, short, default_value_if("debug", "true", Some("true")))]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn verbose(&self) -> bool {
        self.verbose && !self.quiet
    }
}

impl ValidateArgs for CommonArgs {
    fn validate(&self) -> Result<(), Error> {
        if self.debug && self.quiet {
            return Err(Error::raw(
                ErrorKind::ArgumentConflict,
                "The `--debug` option cannot be used together with `--quiet`.",
            ));
        }
        Ok(())
    }
}
