// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Module used to configure a verification session.

use crate::args::{OutputFormat, VerificationArgs};
use crate::config::{self, ConfigFile};
use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Environment variable used to control this session log tracing.
const LOG_ENV_VAR: &str = "LDV_LOG";

/// Everything a run needs: the parsed arguments and the resolved configuration.
#[derive(Debug)]
pub struct LdvSession {
    pub args: VerificationArgs,
    pub config: ConfigFile,
}

impl LdvSession {
    pub fn new(args: VerificationArgs) -> Result<Self> {
        init_logger(&args);
        let config = config::resolve(&args)?;
        Ok(LdvSession { args, config })
    }
}

/// Initialize the logger using the LDV_LOG environment variable and the --debug argument.
/// LDV_LOG directives take precedence; `--debug` only lowers the default level.
fn init_logger(args: &VerificationArgs) {
    let default_level =
        if args.common_args.debug { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    if args.output_format == OutputFormat::Json {
        json_logs(filter);
    } else {
        fmt_logs(filter);
    }
}

/// Configure global logger to use a json logger.
fn json_logs(filter: EnvFilter) {
    use tracing_subscriber::fmt::layer;
    let subscriber =
        Registry::default().with(filter).with(layer().json().with_writer(std::io::stderr));
    set_global_default(subscriber);
}

/// Configure global logger to print events to stderr.
fn fmt_logs(filter: EnvFilter) {
    use tracing_subscriber::fmt::layer;
    let subscriber = Registry::default()
        .with(filter)
        .with(layer().with_writer(std::io::stderr).with_target(true));
    set_global_default(subscriber);
}

fn set_global_default<S>(subscriber: S)
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    // A subscriber is already installed when the driver runs inside a test harness.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("set_global_default: subscriber already installed");
    }
}
