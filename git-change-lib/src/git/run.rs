//! Running subprocesses.
//!
//! Every interaction with `git` and with the Gerrit server goes through a
//! [`CommandRunner`]. The real implementation is [`ProcessRunner`]; tests use
//! `crate::testing::ScriptedRunner`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::effects::Effects;
use crate::git::command::CommandLine;
use crate::util::ExitCode;

/// What [`ProcessRunner`] returns as stdout in dry-run mode instead of
/// executing anything.
pub const DRY_RUN_OUTPUT: &str = "dry-run-no-output\n";

/// How the child process's streams should be connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Capture stdout and stderr without showing them to the user.
    Silent,

    /// Show stdout and stderr to the user as the command runs, and also keep
    /// a copy for error reporting.
    Visible,

    /// Attach the command to the user's terminal, including stdin, so that
    /// it can run an editor. Nothing is captured.
    Interactive,
}

/// The result of running a command which exited successfully.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The captured stdout contents.
    pub stdout: String,

    /// The captured stderr contents.
    pub stderr: String,
}

/// A command exited with a non-zero status.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("command `{command}` returned non-zero exit status {}", exit_code.0)]
pub struct CommandFailure {
    /// The command line that was run.
    pub command: String,

    /// The exit code of the process.
    pub exit_code: ExitCode,

    /// The captured stdout, if any.
    pub stdout: String,

    /// The captured stderr, if any.
    pub stderr: String,

    /// Whether the process was terminated by a signal (such as when the user
    /// pressed Ctrl-C in an editor) rather than exiting on its own.
    pub interrupted: bool,
}

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("could not wait for `{command}` to complete: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Failure(#[from] CommandFailure),
}

impl Error {
    /// If this error is a non-zero exit of the child process, return it.
    pub fn as_failure(&self) -> Option<&CommandFailure> {
        match self {
            Error::Failure(failure) => Some(failure),
            Error::Spawn { .. } | Error::Wait { .. } => None,
        }
    }

    /// The exit code the process should terminate with because of this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Failure(CommandFailure { exit_code, .. }) => *exit_code,
            Error::Spawn { .. } | Error::Wait { .. } => ExitCode(1),
        }
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Something which can execute a [`CommandLine`].
pub trait CommandRunner: std::fmt::Debug {
    /// Run the command, connecting its streams according to `mode`. A
    /// non-zero exit status is reported as [`Error::Failure`].
    fn run(&self, command: &CommandLine, mode: RunMode) -> Result<CommandOutput>;

    /// Whether commands are only being echoed rather than executed. Callers
    /// use this to avoid interpreting [`DRY_RUN_OUTPUT`] as real output.
    fn is_dry_run(&self) -> bool;
}

/// Runs commands as real subprocesses.
#[derive(Clone)]
pub struct ProcessRunner {
    /// Where to report command output and dry-run echoes.
    pub effects: Effects,

    /// The working directory that commands should be run in.
    pub working_directory: PathBuf,

    /// The path to the `git` executable. Commands whose program is `git` are
    /// run with this executable instead.
    pub path_to_git: PathBuf,

    /// The environment variables that should be passed to every process.
    pub env: HashMap<OsString, OsString>,

    /// If set, commands are echoed and not executed.
    pub dry_run: bool,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<ProcessRunner path_to_git={:?} working_directory={:?} dry_run={:?} env=not shown>",
            self.path_to_git, self.working_directory, self.dry_run
        )
    }
}

impl ProcessRunner {
    fn spawn_writer_thread<InputStream: Read + Send + 'static>(
        stream: Option<InputStream>,
        mut output: impl Write + Send + 'static,
    ) -> JoinHandle<String> {
        thread::spawn(move || {
            let mut captured = String::new();
            let stream = match stream {
                Some(stream) => stream,
                None => return captured,
            };
            let reader = BufReader::new(stream);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                // The user-facing copy is best-effort; the captured copy is
                // what error reporting relies on.
                let _ = writeln!(output, "{line}");
                captured.push_str(&line);
                captured.push('\n');
            }
            captured
        })
    }

    fn make_command(&self, command_line: &CommandLine) -> Command {
        let program = match command_line.get_program() {
            "git" => self.path_to_git.clone().into_os_string(),
            program => OsString::from(program),
        };
        let mut command = Command::new(program);
        command.current_dir(&self.working_directory);
        command.args(command_line.get_args());
        command.env_clear();
        command.envs(self.env.iter());
        command.envs(command_line.get_env());
        command
    }

    fn to_failure(
        command_line: &CommandLine,
        exit_status: ExitStatus,
        stdout: String,
        stderr: String,
    ) -> CommandFailure {
        #[cfg(unix)]
        let interrupted = {
            use std::os::unix::process::ExitStatusExt;
            exit_status.signal().is_some()
        };
        #[cfg(not(unix))]
        let interrupted = false;

        CommandFailure {
            command: command_line.to_string(),
            exit_code: ExitCode::try_from(exit_status).unwrap_or(ExitCode(1)),
            stdout,
            stderr,
            interrupted,
        }
    }
}

impl CommandRunner for ProcessRunner {
    #[instrument]
    fn run(&self, command_line: &CommandLine, mode: RunMode) -> Result<CommandOutput> {
        let command_string = command_line.to_string();
        if self.dry_run {
            // Output errors are not command errors; the echo is informational.
            let _ = writeln!(
                self.effects.get_output_stream(),
                "run_command >>> {command_string}"
            );
            return Ok(CommandOutput {
                stdout: DRY_RUN_OUTPUT.to_owned(),
                stderr: Default::default(),
            });
        }

        let mut command = self.make_command(command_line);
        let spawn_error = |source| Error::Spawn {
            command: command_string.clone(),
            source,
        };
        let wait_error = |source| Error::Wait {
            command: command_string.clone(),
            source,
        };

        let (exit_status, stdout, stderr) = match mode {
            RunMode::Silent => {
                command.stdin(Stdio::null());
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
                let output = command.output().map_err(spawn_error)?;
                (
                    output.status,
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                )
            }

            RunMode::Visible => {
                command.stdin(Stdio::null());
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
                let mut child = command.spawn().map_err(spawn_error)?;
                let stdout_thread = Self::spawn_writer_thread(
                    child.stdout.take(),
                    self.effects.get_output_stream(),
                );
                let stderr_thread = Self::spawn_writer_thread(
                    child.stderr.take(),
                    self.effects.get_error_stream(),
                );
                let exit_status = child.wait().map_err(wait_error)?;
                let stdout = stdout_thread.join().unwrap_or_default();
                let stderr = stderr_thread.join().unwrap_or_default();
                (exit_status, stdout, stderr)
            }

            RunMode::Interactive => {
                command.stdin(Stdio::inherit());
                command.stdout(Stdio::inherit());
                command.stderr(Stdio::inherit());
                let mut child = command.spawn().map_err(spawn_error)?;
                let exit_status = child.wait().map_err(wait_error)?;
                (exit_status, String::new(), String::new())
            }
        };

        if exit_status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            let failure = Self::to_failure(command_line, exit_status, stdout, stderr);
            debug!(?failure, "Command failed");
            Err(Error::Failure(failure))
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
