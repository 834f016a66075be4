//! Accesses repo-specific configuration.
//!
//! Every setting is resolved once, at start-up, into a [`ChangeConfig`] which
//! is then passed to whatever needs it.

use thiserror::Error;
use tracing::instrument;

use crate::git::repo::{self, Repo};

/// Config key for the name of the remote to fetch from and push to.
pub const REMOTE_CONFIG_KEY: &str = "git-change.remote";

/// Config key for the SSH destination of the Gerrit server.
pub const GERRIT_SSH_HOST_CONFIG_KEY: &str = "git-change.gerrit-ssh-host";

/// Config key enabling automatic reviewers from `OWNERS` files.
pub const INCLUDE_OWNERS_CONFIG_KEY: &str = "git-change.include-owners";

/// The remote used when neither a flag nor the config names one.
pub const DEFAULT_REMOTE: &str = "origin";

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Please define git config option \"git-change.gerrit-ssh-host\" or pass --gerrit-ssh-host."
    )]
    MissingGerritSshHost,

    #[error("invalid boolean value for config option {key}: {value:?}")]
    InvalidBool { key: String, value: String },

    #[error(transparent)]
    Repo(#[from] repo::Error),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Settings given on the command line, which take precedence over the git
/// config.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// `--remote`.
    pub remote: Option<String>,

    /// `--gerrit-ssh-host`.
    pub gerrit_ssh_host: Option<String>,

    /// `--dry-run`.
    pub dry_run: bool,
}

/// The fully-resolved configuration for one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeConfig {
    /// The remote to fetch from and push to.
    pub remote: String,

    /// The SSH destination of the Gerrit server.
    pub gerrit_ssh_host: String,

    /// Whether to add owners from `OWNERS` files as reviewers.
    pub include_owners: bool,

    /// Whether commands are only echoed.
    pub dry_run: bool,
}

impl ChangeConfig {
    /// Resolve each setting from the overrides, then the git config of `repo`,
    /// then the default.
    #[instrument]
    pub fn resolve(repo: &Repo, overrides: ConfigOverrides) -> Result<Self> {
        let ConfigOverrides {
            remote,
            gerrit_ssh_host,
            dry_run,
        } = overrides;

        let remote = match remote {
            Some(remote) => remote,
            None => repo
                .config_value(REMOTE_CONFIG_KEY)?
                .unwrap_or_else(|| DEFAULT_REMOTE.to_owned()),
        };
        let gerrit_ssh_host = match gerrit_ssh_host {
            Some(host) => host,
            None => repo
                .config_value(GERRIT_SSH_HOST_CONFIG_KEY)?
                .filter(|host| !host.is_empty())
                .ok_or(Error::MissingGerritSshHost)?,
        };
        let include_owners = match repo.config_value(INCLUDE_OWNERS_CONFIG_KEY)? {
            Some(value) => parse_bool(INCLUDE_OWNERS_CONFIG_KEY, &value)?,
            None => false,
        };

        Ok(Self {
            remote,
            gerrit_ssh_host,
            include_owners,
            dry_run,
        })
    }
}

/// Interpret a config value the way `git config --type=bool` does.
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        _ => Err(Error::InvalidBool {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// Environment variables which affect the functioning of `git-change`.
pub mod env_vars {
    use std::path::PathBuf;

    use tracing::instrument;

    /// Path to the Git executable to shell out to as a subprocess. This is set
    /// during tests.
    pub const TEST_GIT: &str = "TEST_GIT";

    /// Get the path to the Git executable: the value of `TEST_GIT` if it is
    /// set, otherwise `git` (looked up on `PATH`).
    #[instrument]
    pub fn get_path_to_git() -> PathBuf {
        std::env::var_os(TEST_GIT)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("git"))
    }
}
