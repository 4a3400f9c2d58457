// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The TOML configuration file.
//!
//! ```toml
//! [explore]
//! max-paths = 5000
//! int-domain = [0, 1, -1]
//!
//! [environment.module-refcount]
//! floor = 1
//! explicit-init = false
//! ```
//!
//! Values given on the command line take precedence over the file, and the file over the
//! built-in defaults.

use crate::args::VerificationArgs;
use anyhow::{Context, Result, bail};
use ldv::EnvConfig;
use ldv::explore::ExploreConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigFile {
    pub explore: ExploreConfig,
    pub environment: EnvConfig,
}

impl ConfigFile {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ConfigFile = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        ConfigFile::from_toml(&text)
            .with_context(|| format!("invalid configuration `{}`", path.display()))
    }

    fn check(&self) -> Result<()> {
        if self.explore.max_paths == 0 {
            bail!("`explore.max-paths` must be at least 1");
        }
        if self.explore.int_domain.is_empty() || self.explore.ptr_domain.is_empty() {
            bail!("`explore.int-domain` and `explore.ptr-domain` must not be empty");
        }
        for (key, refcount) in [
            ("module-refcount", self.environment.module_refcount),
            ("usb-dev-refcount", self.environment.usb_dev_refcount),
        ] {
            if refcount.mixes_variants() {
                bail!("`environment.{key}`: an explicitly initialized counter must have floor 0");
            }
        }
        Ok(())
    }
}

/// The configuration a session runs with, after merging the command line over the file.
pub fn resolve(args: &VerificationArgs) -> Result<ConfigFile> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::read(path)?,
        None => ConfigFile::default(),
    };
    if let Some(max_paths) = args.max_paths {
        config.explore.max_paths = max_paths;
    }
    if let Some(max_choices) = args.max_choices {
        config.explore.max_choices = max_choices;
    }
    debug!(?config, "resolve");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::DriverArgs;
    use clap::Parser;
    use ldv::models::{ErrPtrCodec, RefCountConfig};
    use std::io::Write;

    #[test]
    fn check_toml_parsing() {
        let config = ConfigFile::from_toml(
            "[explore]
             max-paths = 50
             int-domain = [0, -1]

             [environment]
             err-ptr = { err-or-null = \"always-false\" }

             [environment.module-refcount]
             floor = 1
             explicit-init = false",
        )
        .unwrap();
        assert_eq!(config.explore.max_paths, 50);
        assert_eq!(config.explore.int_domain, [0, -1]);
        assert_eq!(config.explore.max_choices, ExploreConfig::default().max_choices);
        assert_eq!(config.environment.module_refcount, RefCountConfig::BAKED_IN);
        assert_eq!(config.environment.usb_dev_refcount, RefCountConfig::EXPLICIT_INIT);
        assert_eq!(config.environment.err_ptr, ErrPtrCodec::NULL_BLIND);
    }

    #[test]
    fn check_empty_file_is_default() {
        assert_eq!(ConfigFile::from_toml("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn check_invalid_files_fail() {
        assert!(ConfigFile::from_toml("[explorer]\nmax-paths = 1").is_err());
        assert!(ConfigFile::from_toml("[explore]\nmax-paths = 0").is_err());
        assert!(ConfigFile::from_toml("[explore]\nptr-domain = []").is_err());
        assert!(ConfigFile::from_toml("[explore]\nmax-paths = \"many\"").is_err());
        // Keys are kebab-case at every level.
        assert!(ConfigFile::from_toml("[explore]\nmax_paths = 0\nint_domain = []").is_err());
        assert!(
            ConfigFile::from_toml("[environment.module-refcount]\nexplicit_init = false\nfloor = 1")
                .is_err()
        );
        assert!(ConfigFile::from_toml("[environment.err-ptr]\nerr_or_null = \"always-false\"").is_err());
        assert!(ConfigFile::from_toml("[environment]\nmodule_refcount = {}").is_err());
    }

    #[test]
    fn check_mixed_refcount_variants_fail() {
        let error = ConfigFile::from_toml("[environment.usb-dev-refcount]\nfloor = 1").unwrap_err();
        assert!(error.to_string().contains("usb-dev-refcount"));
        let baked = ConfigFile::from_toml(
            "[environment.usb-dev-refcount]\nfloor = 1\nexplicit-init = false",
        )
        .unwrap();
        assert_eq!(baked.environment.usb_dev_refcount, RefCountConfig::BAKED_IN);
    }

    #[test]
    fn check_command_line_takes_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[explore]\nmax-paths = 50\nmax-choices = 8").unwrap();
        let path = file.path().to_str().unwrap();

        let args = DriverArgs::parse_from(["ldv-driver", "--config", path, "--max-paths", "7"]);
        let config = resolve(&args.verify_opts).unwrap();
        assert_eq!(config.explore.max_paths, 7);
        assert_eq!(config.explore.max_choices, 8);

        let args = DriverArgs::parse_from(["ldv-driver"]);
        assert_eq!(resolve(&args.verify_opts).unwrap(), ConfigFile::default());
    }

    #[test]
    fn check_missing_file_reports_path() {
        let error = ConfigFile::read(Path::new("/no/such/ldv.toml")).unwrap_err();
        assert!(format!("{error:#}").contains("/no/such/ldv.toml"));
    }
}
