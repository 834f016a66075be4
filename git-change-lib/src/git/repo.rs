//! Typed operations on the local repository.
//!
//! Each operation corresponds to one `git` invocation (or a short fixed
//! sequence of them) run through a [`CommandRunner`].

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::git::command::CommandLine;
use crate::git::run::{self, CommandOutput, CommandRunner, RunMode};

/// The name of the branch reported in dry-run mode, where `HEAD` is not
/// actually inspected.
pub const DRY_RUN_BRANCH: &str = "fake-branch";

/// Environment variable read by the `prepare-commit-msg` hook to add a bug ID
/// to the commit message.
pub const BUG_ID_ENV_VAR: &str = "BUG_ID";

/// Environment variable read by the pre-commit hook listing checks to skip.
pub const SKIP_ENV_VAR: &str = "SKIP";

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Run(#[from] run::Error),

    #[error("could not get a branch name from {output:?}")]
    MalformedHead { output: String },

    #[error("could not decode output of `{command}`: {output:?}")]
    Decode { command: String, output: String },
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a tracking branch has commits which its remote counterpart does
/// not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnmergedCommits {
    /// The branch has no commits missing from its remote counterpart.
    UpToDate,

    /// The branch is ahead of its remote counterpart by these commits, as
    /// one-line log summaries (newest first).
    Ahead(Vec<String>),

    /// The check could not be performed, either because commands are only
    /// being echoed or because `git log` failed (e.g. the remote branch does
    /// not exist locally).
    Unknown,
}

/// Options for `git commit`.
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    /// Pass `--amend`.
    pub amend: bool,

    /// Use this as the commit message rather than opening an editor.
    pub message: Option<String>,

    /// Exported to hooks as `BUG_ID`.
    pub bug_id: Option<String>,

    /// Exported to hooks as `SKIP`.
    pub skip: Option<String>,
}

impl CommitOptions {
    fn to_command_line(&self) -> CommandLine {
        let Self {
            amend,
            message,
            bug_id,
            skip,
        } = self;
        let mut command = CommandLine::git(&["commit"]);
        if *amend {
            command = command.arg("--amend");
        }
        if let Some(message) = message {
            command = command.arg("-m").arg(message);
        }
        if let Some(bug_id) = bug_id {
            command = command.env(BUG_ID_ENV_VAR, bug_id);
        }
        if let Some(skip) = skip {
            command = command.env(SKIP_ENV_VAR, skip);
        }
        command
    }
}

/// The local repository, as seen through `git` subprocesses.
#[derive(Clone, Debug)]
pub struct Repo {
    runner: Arc<dyn CommandRunner>,
}

impl Repo {
    /// Constructor.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Whether commands are only being echoed.
    pub fn is_dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }

    /// Run an arbitrary command through this repository's runner.
    pub fn run(&self, command: &CommandLine, mode: RunMode) -> Result<CommandOutput> {
        Ok(self.runner.run(command, mode)?)
    }

    fn git(&self, args: &[&str], mode: RunMode) -> Result<CommandOutput> {
        self.run(&CommandLine::git(args), mode)
    }

    /// Run a read-only query and return its stdout, or `None` in dry-run mode
    /// (where the output would only be a placeholder).
    fn query(&self, args: &[&str]) -> Result<Option<String>> {
        let CommandOutput { stdout, stderr: _ } = self.git(args, RunMode::Silent)?;
        if self.is_dry_run() {
            Ok(None)
        } else {
            Ok(Some(stdout))
        }
    }

    /// Fail unless the working directory is inside a git repository.
    #[instrument]
    pub fn verify(&self) -> Result<()> {
        self.git(&["status"], RunMode::Silent)?;
        Ok(())
    }

    /// The short name of the branch `HEAD` points to. Fails for a detached
    /// `HEAD` and for branch names containing a `/`.
    #[instrument]
    pub fn current_branch(&self) -> Result<String> {
        let output = match self.query(&["symbolic-ref", "HEAD"]) {
            Ok(Some(output)) => output,
            Ok(None) => return Ok(DRY_RUN_BRANCH.to_owned()),
            Err(Error::Run(err)) if err.as_failure().is_some() => {
                let output = err
                    .as_failure()
                    .map(|failure| failure.stderr.trim().to_owned())
                    .unwrap_or_default();
                return Err(Error::MalformedHead { output });
            }
            Err(err) => return Err(err),
        };
        let branch = match output.trim().split('/').collect::<Vec<_>>().as_slice() {
            ["refs", "heads", branch] if !branch.is_empty() => Some(branch.to_string()),
            _ => None,
        };
        branch.ok_or(Error::MalformedHead { output })
    }

    /// Look up a git config value. An unset key is `None`, not an error.
    #[instrument]
    pub fn config_value(&self, key: &str) -> Result<Option<String>> {
        match self.query(&["config", "--get", key]) {
            Ok(value) => Ok(value.map(|value| value.trim().to_owned())),
            Err(Error::Run(err)) if err.as_failure().is_some() => {
                debug!(?key, "Config key not set");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The paths (relative to the repository root) of the files that differ
    /// between `revision` and `HEAD`, in the order `git diff` reports them.
    #[instrument]
    pub fn changed_files_since(&self, revision: &str) -> Result<Vec<String>> {
        let output = self
            .query(&["diff", "--name-only", revision, "HEAD"])?
            .unwrap_or_default();
        Ok(output.lines().map(|line| line.to_owned()).collect())
    }

    /// The absolute path of the top of the working tree, or `None` in dry-run
    /// mode.
    #[instrument]
    pub fn repo_root(&self) -> Result<Option<PathBuf>> {
        let output = match self.query(&["rev-parse", "--show-toplevel"])? {
            Some(output) => output,
            None => return Ok(None),
        };
        let root = output.trim();
        if root.is_empty() {
            return Err(Error::Decode {
                command: "git rev-parse --show-toplevel".to_owned(),
                output,
            });
        }
        Ok(Some(PathBuf::from(root)))
    }

    /// Whether the index contains staged changes. Always true in dry-run mode
    /// so that the rest of the workflow can be echoed.
    #[instrument]
    pub fn has_staged_changes(&self) -> Result<bool> {
        let output = self.query(&["diff", "--cached", "--name-status"])?;
        Ok(output.map_or(true, |output| !output.trim().is_empty()))
    }

    /// Whether the working tree or index has changes to tracked files.
    /// Untracked files are ignored.
    #[instrument]
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = self.query(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(output.map_or(false, |output| !output.trim().is_empty()))
    }

    /// Show `git status` to the user.
    #[instrument]
    pub fn show_status(&self) -> Result<()> {
        self.git(&["status"], RunMode::Visible)?;
        Ok(())
    }

    /// The raw contents of the `HEAD` commit object, as printed by `git
    /// cat-file -p HEAD`. Empty in dry-run mode.
    #[instrument]
    pub fn head_commit_raw(&self) -> Result<String> {
        Ok(self
            .query(&["cat-file", "-p", "HEAD"])?
            .unwrap_or_default())
    }

    /// The full object ID of `revision`.
    #[instrument]
    pub fn rev_parse(&self, revision: &str) -> Result<String> {
        let output = self.git(&["rev-parse", "--verify", revision], RunMode::Silent)?;
        Ok(output.stdout.trim().to_owned())
    }

    /// Run `git commit` attached to the user's terminal, so that an editor
    /// can be opened for the commit message.
    #[instrument]
    pub fn commit(&self, options: &CommitOptions) -> Result<()> {
        self.run(&options.to_command_line(), RunMode::Interactive)?;
        Ok(())
    }

    /// Create a branch at `HEAD` and switch to it.
    #[instrument]
    pub fn create_branch(&self, name: &str) -> Result<()> {
        self.git(&["checkout", "-b", name], RunMode::Silent)?;
        Ok(())
    }

    /// Rename a branch.
    #[instrument]
    pub fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.git(&["branch", "-m", old_name, new_name], RunMode::Visible)?;
        Ok(())
    }

    /// Delete a branch. Unless `force` is set, git refuses to delete a branch
    /// which is not fully merged. The output is captured rather than shown.
    #[instrument]
    pub fn delete_branch(&self, name: &str, force: bool) -> Result<CommandOutput> {
        let flag = if force { "-D" } else { "-d" };
        self.git(&["branch", flag, name], RunMode::Silent)
    }

    /// Switch to the given branch.
    #[instrument]
    pub fn checkout(&self, name: &str) -> Result<()> {
        self.git(&["checkout", name], RunMode::Visible)?;
        Ok(())
    }

    /// The short names of the refs matching `pattern`, sorted by `sort_key`
    /// (a `git for-each-ref --sort` key such as `authordate`).
    #[instrument]
    pub fn list_refs_by_pattern(&self, pattern: &str, sort_key: &str) -> Result<Vec<String>> {
        let sort = format!("--sort={sort_key}");
        let output = self
            .query(&["for-each-ref", "--format=%(refname:short)", &sort, pattern])?
            .unwrap_or_default();
        Ok(output
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_owned())
            .collect())
    }

    /// A one-line summary of the commit `revision` points to, including the
    /// trailing newline.
    #[instrument]
    pub fn log_oneline(&self, revision: &str) -> Result<String> {
        let output = self.git(&["log", "--oneline", "-1", revision, "--"], RunMode::Silent)?;
        Ok(output.stdout)
    }

    /// Compare `branch` against `<remote>/<branch>`.
    #[instrument]
    pub fn unmerged_commits(&self, branch: &str, remote: &str) -> Result<UnmergedCommits> {
        let upstream = format!("^{remote}/{branch}");
        match self.query(&["log", "--oneline", branch, &upstream, "--"]) {
            Ok(None) => Ok(UnmergedCommits::Unknown),
            Ok(Some(output)) => {
                let commits: Vec<String> = output
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| line.to_owned())
                    .collect();
                if commits.is_empty() {
                    Ok(UnmergedCommits::UpToDate)
                } else {
                    Ok(UnmergedCommits::Ahead(commits))
                }
            }
            Err(Error::Run(err)) if err.as_failure().is_some() => {
                debug!(?err, "Could not compare branch against remote");
                Ok(UnmergedCommits::Unknown)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch from the given remote.
    #[instrument]
    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.git(&["fetch", remote], RunMode::Visible)?;
        Ok(())
    }

    /// Run `git pull --rebase` on the current branch.
    #[instrument]
    pub fn pull_rebase(&self) -> Result<()> {
        self.git(&["pull", "--rebase"], RunMode::Visible)?;
        Ok(())
    }

    /// Rebase the current branch onto `upstream`.
    #[instrument]
    pub fn rebase(&self, upstream: &str) -> Result<()> {
        self.git(&["rebase", upstream], RunMode::Visible)?;
        Ok(())
    }

    /// Move the current branch to `revision`, keeping the index and working
    /// tree.
    #[instrument]
    pub fn reset_soft(&self, revision: &str) -> Result<()> {
        self.git(&["reset", "--soft", revision], RunMode::Visible)?;
        Ok(())
    }

    /// Move the current branch to `revision`, discarding changes in the index
    /// and working tree.
    #[instrument]
    pub fn reset_hard(&self, revision: &str) -> Result<()> {
        self.git(&["reset", "--hard", revision], RunMode::Visible)?;
        Ok(())
    }
}
