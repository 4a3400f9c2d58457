// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::args::{DriverArgs, DriverSubcommand, OutputFormat, VerificationArgs, check_is_valid};
use crate::harnesses::all_harnesses;
use crate::session::LdvSession;

mod args;
mod config;
mod harness_runner;
mod harnesses;
mod list;
mod metadata;
mod session;
mod util;

/// The main function for the `ldv-driver`.
/// Without a subcommand, every selected harness is explored and its outcome compared with the
/// outcome the harness expects.
fn main() -> ExitCode {
    let args = DriverArgs::parse();
    check_is_valid(&args);

    let result = match args.command {
        Some(DriverSubcommand::List(list_args)) => list::list_main(&list_args).map(|()| true),
        None => verify_main(args.verify_opts),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        // Failure exit code without additional error message
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            // We are using the debug format for now to print the all the context.
            debug!(?error, "main_failure");
            util::error(&format!("{error:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Run every selected harness. Returns whether all of them matched their expectation.
fn verify_main(args: VerificationArgs) -> Result<bool> {
    let session = LdvSession::new(args)?;
    let all = all_harnesses();
    let harnesses = session.determine_targets(&all)?;
    debug!(n = harnesses.len(), "verify_main");

    let runner = harness_runner::HarnessRunner { sess: &session };
    let results = runner.check_all_harnesses(&harnesses)?;

    let bounded = results
        .successes
        .iter()
        .chain(results.failures.iter())
        .filter(|result| result.exploration.bounded)
        .count();
    if bounded > 0
        && !session.args.common_args.quiet
        && session.args.output_format != OutputFormat::Json
    {
        util::warning(&format!(
            "the exploration of {bounded} harness(es) was cut short by --max-paths or \
            --max-choices; their outcome only covers the explored paths"
        ));
    }

    session.print_final_summary(&results)
}
