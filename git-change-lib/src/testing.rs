//! Testing utilities.
//!
//! This is inside `src` rather than `tests` since we use this code in some unit
//! tests.

use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use eyre::Context;
use tempfile::TempDir;
use tracing::instrument;

use crate::core::config::env_vars::get_path_to_git;
use crate::core::effects::Effects;
use crate::git::run::{self, CommandFailure, CommandOutput, DRY_RUN_OUTPUT};
use crate::git::{CommandLine, CommandRunner, ProcessRunner, RunMode};
use crate::util::ExitCode;

const DUMMY_NAME: &str = "Testy McTestface";
const DUMMY_EMAIL: &str = "test@example.com";
const DUMMY_DATE: &str = "Wed 29 Oct 12:34:56 2020 PDT";

/// What a scripted command does when run.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success {
        stdout: String,
        stderr: String,
    },
    Failure {
        exit_code: isize,
        stdout: String,
        stderr: String,
        interrupted: bool,
    },
}

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    outcomes: VecDeque<Outcome>,
}

/// A [`CommandRunner`] which records every command and answers from a script
/// instead of running anything.
///
/// Responses are registered against a prefix of the command's words (the
/// program followed by its arguments). The first registered rule whose prefix
/// matches answers the command. Registering several responses for the same
/// prefix queues them; the last one is repeated once the others are used up.
/// Commands which match no rule succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    dry_run: bool,
    rules: Mutex<Vec<Rule>>,
    history: Mutex<Vec<(CommandLine, RunMode)>>,
}

impl ScriptedRunner {
    /// Constructor.
    pub fn new() -> Self {
        Default::default()
    }

    /// Constructor. Behaves like a runner in dry-run mode: every command
    /// returns the dry-run placeholder output.
    pub fn new_dry_run() -> Self {
        Self {
            dry_run: true,
            ..Default::default()
        }
    }

    /// Queue an outcome for commands starting with `prefix`.
    pub fn respond_with(&self, prefix: &[&str], outcome: Outcome) {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|rule| rule.prefix == prefix) {
            Some(rule) => rule.outcomes.push_back(outcome),
            None => rules.push(Rule {
                prefix: prefix.iter().map(|word| word.to_string()).collect(),
                outcomes: VecDeque::from([outcome]),
            }),
        }
    }

    /// Queue a successful run printing `stdout`.
    pub fn respond(&self, prefix: &[&str], stdout: &str) {
        self.respond_with(
            prefix,
            Outcome::Success {
                stdout: stdout.to_owned(),
                stderr: Default::default(),
            },
        )
    }

    /// Queue a failed run exiting with `exit_code` and printing `stderr`.
    pub fn fail(&self, prefix: &[&str], exit_code: isize, stderr: &str) {
        self.respond_with(
            prefix,
            Outcome::Failure {
                exit_code,
                stdout: Default::default(),
                stderr: stderr.to_owned(),
                interrupted: false,
            },
        )
    }

    /// Queue a run which is killed by an interrupt signal.
    pub fn interrupt(&self, prefix: &[&str]) {
        self.respond_with(
            prefix,
            Outcome::Failure {
                exit_code: 130,
                stdout: Default::default(),
                stderr: Default::default(),
                interrupted: true,
            },
        )
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<CommandLine> {
        let history = self.history.lock().unwrap();
        history.iter().map(|(command, _)| command.clone()).collect()
    }

    /// Every command run so far, with the mode it was run in.
    pub fn commands_with_modes(&self) -> Vec<(CommandLine, RunMode)> {
        self.history.lock().unwrap().clone()
    }

    /// The words (program and arguments) of every command run so far.
    pub fn command_args(&self) -> Vec<Vec<String>> {
        self.commands()
            .iter()
            .map(|command| {
                std::iter::once(command.get_program().to_owned())
                    .chain(command.get_args().iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Every command run so far, one per line, with words joined by spaces
    /// and no quoting. Convenient for snapshots.
    pub fn command_log(&self) -> String {
        self.command_args()
            .iter()
            .map(|words| format!("{}\n", words.join(" ")))
            .collect()
    }

    fn next_outcome(&self, words: &[String]) -> Option<Outcome> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|rule| words.starts_with(&rule.prefix))?;
        if rule.outcomes.len() > 1 {
            rule.outcomes.pop_front()
        } else {
            rule.outcomes.front().cloned()
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandLine, mode: RunMode) -> run::Result<CommandOutput> {
        self.history.lock().unwrap().push((command.clone(), mode));
        if self.dry_run {
            return Ok(CommandOutput {
                stdout: DRY_RUN_OUTPUT.to_owned(),
                stderr: Default::default(),
            });
        }

        let words: Vec<String> = std::iter::once(command.get_program().to_owned())
            .chain(command.get_args().iter().cloned())
            .collect();
        match self.next_outcome(&words) {
            None => Ok(Default::default()),
            Some(Outcome::Success { stdout, stderr }) => Ok(CommandOutput { stdout, stderr }),
            Some(Outcome::Failure {
                exit_code,
                stdout,
                stderr,
                interrupted,
            }) => Err(run::Error::Failure(CommandFailure {
                command: command.to_string(),
                exit_code: ExitCode(exit_code),
                stdout,
                stderr,
                interrupted,
            })),
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// A real git repository in a temporary directory, for testing.
#[derive(Debug)]
pub struct GitRepo {
    /// Guard to clean up the temporary directory. Make sure to bind the
    /// `GitRepo` to a local variable not named `_`.
    pub temp_dir: TempDir,

    /// The path to the working tree.
    pub repo_path: PathBuf,

    /// The path to the git executable.
    pub path_to_git: PathBuf,
}

impl GitRepo {
    /// The environment variables needed to run git deterministically and
    /// without reading the user's configuration.
    pub fn get_base_env(&self) -> HashMap<OsString, OsString> {
        let home = self.temp_dir.path().as_os_str().to_owned();
        let path = std::env::var_os("PATH").unwrap_or_default();
        [
            ("GIT_CONFIG_NOSYSTEM", OsString::from("1")),
            ("GIT_AUTHOR_DATE", OsString::from(DUMMY_DATE)),
            ("GIT_COMMITTER_DATE", OsString::from(DUMMY_DATE)),
            // ":" is understood by `git` to skip editing.
            ("GIT_EDITOR", OsString::from(":")),
            ("HOME", home),
            ("PATH", path),
        ]
        .into_iter()
        .map(|(key, value)| (OsString::from(key), value))
        .collect()
    }

    /// Run a git command in the repository and return its stdout. Fails if
    /// the command exits non-zero.
    #[instrument]
    pub fn run(&self, args: &[&str]) -> eyre::Result<String> {
        let output = Command::new(&self.path_to_git)
            .current_dir(&self.repo_path)
            .args(args)
            .env_clear()
            .envs(self.get_base_env())
            .output()
            .wrap_err_with(|| format!("Running git {args:?}"))?;
        if !output.status.success() {
            eyre::bail!(
                "git {:?} exited with {}\nstdout:\n{}\nstderr:\n{}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            );
        }
        Ok(String::from_utf8(output.stdout)?)
    }

    /// Initialize the repository with an initial commit on `main`.
    #[instrument]
    pub fn init_repo(&self) -> eyre::Result<()> {
        self.run(&["init", "--initial-branch=main"])?;
        self.run(&["config", "user.name", DUMMY_NAME])?;
        self.run(&["config", "user.email", DUMMY_EMAIL])?;
        self.run(&["config", "core.autocrlf", "false"])?;
        self.commit_file("initial", "initial contents\n")?;
        Ok(())
    }

    /// Write the provided contents to the provided path relative to the
    /// repository root, creating directories as needed.
    pub fn write_file(&self, name: &str, contents: &str) -> eyre::Result<()> {
        let path = self.repo_path.join(name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Write and commit a file.
    pub fn commit_file(&self, name: &str, contents: &str) -> eyre::Result<()> {
        self.write_file(name, contents)?;
        self.run(&["add", name])?;
        self.run(&["commit", "-m", &format!("create {name}")])?;
        Ok(())
    }

    /// A [`ProcessRunner`] which runs commands in this repository.
    pub fn make_runner(&self, effects: Effects) -> ProcessRunner {
        ProcessRunner {
            effects,
            working_directory: self.repo_path.clone(),
            path_to_git: self.path_to_git.clone(),
            env: self.get_base_env(),
            dry_run: false,
        }
    }

    /// The path to the working tree.
    pub fn get_path(&self) -> &Path {
        &self.repo_path
    }
}

/// Create a temporary directory containing an initialized repository.
pub fn make_git_repo() -> eyre::Result<GitRepo> {
    let temp_dir = tempfile::tempdir()?;
    let repo_path = temp_dir.path().join("repo");
    std::fs::create_dir_all(&repo_path)?;
    let repo = GitRepo {
        temp_dir,
        repo_path,
        path_to_git: get_path_to_git(),
    };
    repo.init_repo()?;
    Ok(repo)
}
