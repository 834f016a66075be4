//! Sub-commands of `git-change`.
//!
//! Every sub-command runs against a [`ChangeEngine`], which bundles the
//! repository, the Gerrit client and the resolved configuration. The
//! sub-commands return a [`Result`]; [`report`] turns it into what the user
//! sees and the exit code of the process.

pub mod create;
pub mod gc;
pub mod list;
pub mod print;
pub mod push;
pub mod rebase;
pub mod submit;
pub mod update;

use std::fmt::Write;
use std::io::BufRead;
use std::sync::Arc;
use std::time::SystemTime;

use git_change_invoke::CommandContext;
use git_change_opts::{Command, CommitArgs, Opts, PushArgs};
use itertools::Itertools;
use lib::core::config::ChangeConfig;
use lib::core::effects::{Effects, OperationType};
use lib::core::formatting::styles;
use lib::core::owners::{self, OwnersResolver};
use lib::gerrit::{self, Change, GerritClient};
use lib::git::repo;
use lib::git::{
    derive_change_id, parse_change_id_trailer, ChangeId, CommandLine, CommandRunner,
    CommitOptions, Repo, RunMode,
};
use lib::util::{ExitCode, EyreExitOr};
use thiserror::Error;
use tracing::{instrument, warn};

use self::push::build_push_command;

/// The broad classes of failure, used to decide how an error is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A child process exited non-zero.
    CommandFailure,

    /// The repository is not in the shape the operation requires.
    GitState,

    /// Gerrit could not be queried, or did not answer as expected.
    GerritQuery,

    /// The user declined a prompt or interrupted a command.
    UserAbort,

    /// Something went wrong inside `git-change` itself.
    Internal,
}

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("The current branch must be a change branch previously created by git-change.")]
    NotChangeBranch,

    #[error("The commit message at HEAD does not contain a valid change ID header.")]
    MissingHeadChangeId,

    #[error(
        "The change ID in the commit message at HEAD ({head})\n\
         does not match the change ID embedded in the branch name ({branch})."
    )]
    ChangeIdMismatch { head: ChangeId, branch: ChangeId },

    #[error("Change {change_id} is no longer open.")]
    ChangeClosed { change_id: ChangeId },

    #[error("The current branch must be a change branch when you specify --chain.")]
    ChainRequiresChangeBranch,

    #[error("You are in a temporary change branch. If you wish to chain commits, pass --chain.")]
    AlreadyOnChangeBranch,

    #[error("You have no staged changes; exiting.\n(You may want to specify --use-head-commit.)")]
    NoStagedChanges,

    #[error(
        "You have uncommitted changes in your working tree/index. \
         Please stash them and try again."
    )]
    UncommittedChanges,

    #[error("Aborted")]
    Aborted,

    #[error("interrupted")]
    Interrupted,

    /// The failure has already been explained to the user, and any rollback
    /// has been carried out.
    #[error(transparent)]
    Reported(Box<Error>),

    #[error(transparent)]
    Repo(#[from] repo::Error),

    #[error(transparent)]
    Gerrit(#[from] gerrit::Error),

    #[error(transparent)]
    Owners(#[from] owners::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reported(inner) => inner.kind(),

            Error::Repo(repo::Error::Run(_)) => ErrorKind::CommandFailure,
            Error::Repo(repo::Error::MalformedHead { .. } | repo::Error::Decode { .. })
            | Error::NotChangeBranch
            | Error::MissingHeadChangeId
            | Error::ChangeIdMismatch { .. }
            | Error::ChainRequiresChangeBranch
            | Error::AlreadyOnChangeBranch
            | Error::NoStagedChanges
            | Error::UncommittedChanges => ErrorKind::GitState,

            Error::Gerrit(_) | Error::ChangeClosed { .. } => ErrorKind::GerritQuery,

            Error::Aborted | Error::Interrupted => ErrorKind::UserAbort,

            Error::Owners(_) | Error::Fmt(_) => ErrorKind::Internal,
        }
    }

    /// The code the process should exit with. A failed command passes on its
    /// own exit code; everything else exits with 1.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Reported(inner) => inner.exit_code(),
            Error::Repo(repo::Error::Run(err)) => err.exit_code(),
            Error::Gerrit(gerrit::Error::Channel(err)) => err.exit_code(),
            _ => ExitCode(1),
        }
    }

    /// Whether this error is an interrupted child process, such as an editor
    /// closed with Ctrl-C.
    fn is_interrupted_command(&self) -> bool {
        match self {
            Error::Repo(repo::Error::Run(err)) => err
                .as_failure()
                .is_some_and(|failure| failure.interrupted),
            _ => false,
        }
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The collaborators every sub-command works with.
#[derive(Clone, Debug)]
pub struct ChangeEngine {
    effects: Effects,
    config: ChangeConfig,
    repo: Repo,
    gerrit: GerritClient,
}

impl ChangeEngine {
    /// Constructor. All commands are run through `runner`.
    pub fn new(effects: &Effects, runner: Arc<dyn CommandRunner>, config: ChangeConfig) -> Self {
        let gerrit = GerritClient::new(
            effects.clone(),
            Arc::clone(&runner),
            config.gerrit_ssh_host.clone(),
        );
        Self {
            effects: effects.clone(),
            config,
            repo: Repo::new(runner),
            gerrit,
        }
    }

    /// The local repository.
    pub fn get_repo(&self) -> &Repo {
        &self.repo
    }

    /// Make sure that the current branch is a change branch whose name agrees
    /// with the Change-Id trailer of the `HEAD` commit, and return that
    /// Change-Id.
    #[instrument]
    pub fn check_for_change_branch(&self) -> Result<ChangeId> {
        let branch = self.repo.current_branch()?;
        let branch_change_id = derive_change_id(&branch).ok_or(Error::NotChangeBranch)?;
        let head_change_id = self.head_change_id()?.ok_or(Error::MissingHeadChangeId)?;
        if head_change_id != branch_change_id {
            return Err(Error::ChangeIdMismatch {
                head: head_change_id,
                branch: branch_change_id,
            });
        }
        Ok(branch_change_id)
    }

    /// Check the current change branch and look up its change, which must
    /// still be open.
    #[instrument]
    pub fn get_open_change(&self) -> Result<(ChangeId, Change)> {
        let change_id = self.check_for_change_branch()?;
        let change = self.gerrit.get_change(&change_id)?;
        if !change.open {
            return Err(Error::ChangeClosed { change_id });
        }
        Ok((change_id, change))
    }

    /// The Change-Id in the message of the `HEAD` commit, if any.
    pub fn head_change_id(&self) -> Result<Option<ChangeId>> {
        let raw_commit = self.repo.head_commit_raw()?;
        Ok(parse_change_id_trailer(&raw_commit))
    }

    /// Run `git commit` with the hook environment taken from `commit_args`.
    /// A commit killed by a signal is reported as [`Error::Interrupted`].
    pub fn commit(
        &self,
        commit_args: &CommitArgs,
        amend: bool,
        message: Option<&str>,
    ) -> Result<()> {
        let CommitArgs { bug, skip } = commit_args;
        let options = CommitOptions {
            amend,
            message: message.map(|message| message.to_owned()),
            bug_id: bug.clone(),
            skip: skip.clone(),
        };
        match self.repo.commit(&options) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = Error::from(err);
                if err.is_interrupted_command() {
                    Err(Error::Interrupted)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// The reviewers to request: those given on the command line (blank
    /// entries dropped) followed by the owners of the files changed by
    /// `HEAD`, if owners are enabled.
    #[instrument]
    pub fn reviewers(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut reviewers: Vec<String> = requested
            .iter()
            .map(|reviewer| reviewer.trim())
            .filter(|reviewer| !reviewer.is_empty())
            .map(|reviewer| reviewer.to_owned())
            .collect();
        if !self.config.include_owners {
            return Ok(reviewers);
        }

        let repo_root = match self.repo.repo_root()? {
            Some(repo_root) => repo_root,
            None => return Ok(reviewers),
        };
        let owners = {
            let _progress = self.effects.start_operation(OperationType::ResolveOwners);
            let changed_files = self.repo.changed_files_since("HEAD^")?;
            OwnersResolver::new(repo_root).resolve(changed_files)?
        };
        reviewers.extend(owners);
        Ok(reviewers.into_iter().unique().collect())
    }

    /// Build the push command for `HEAD`, including owners as reviewers if
    /// enabled.
    pub fn make_push_command(
        &self,
        push_args: &PushArgs,
        target_branch: &str,
    ) -> Result<CommandLine> {
        let PushArgs {
            reviewers,
            cc,
            topic,
            fake_push,
        } = push_args;
        let reviewers = self.reviewers(reviewers)?;
        Ok(build_push_command(
            &self.config.remote,
            &reviewers,
            cc,
            target_branch,
            topic.as_deref(),
            *fake_push,
        ))
    }

    /// Push `HEAD` for review against `target_branch`.
    #[instrument]
    pub fn push_change(&self, push_args: &PushArgs, target_branch: &str) -> Result<()> {
        let command = self.make_push_command(push_args, target_branch)?;
        if push_args.fake_push {
            writeln!(self.effects.get_output_stream(), "Fake pushing")?;
        }
        self.repo.run(&command, RunMode::Visible)?;
        Ok(())
    }

    /// Warn about a failed rollback step. The remaining steps are still
    /// attempted.
    fn check_rollback_step<T>(&self, description: &str, result: repo::Result<T>) -> Result<()> {
        if let Err(err) = result {
            warn!(?err, ?description, "Rollback step failed");
            writeln!(
                self.effects.get_error_stream(),
                "{}",
                self.effects
                    .get_glyphs()
                    .render(&styles::WARNING, format!("Could not {description}: {err}"))
            )?;
        }
        Ok(())
    }

    /// Ask a yes/no question. Anything starting with `y` or `Y` is a yes;
    /// end of input counts as no.
    pub fn confirm(&self, input: &mut dyn BufRead, prompt: &str) -> Result<bool> {
        write!(self.effects.get_output_stream(), "{prompt}")?;
        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(_) => Ok(answer.trim_start().to_lowercase().starts_with('y')),
            Err(err) => {
                warn!(?err, "Could not read answer");
                Ok(false)
            }
        }
    }
}

/// Print `err` (unless it was already explained) and convert it to the exit
/// code of the process. Internal failures are passed on as `eyre` errors.
pub fn report(effects: &Effects, result: Result<()>) -> EyreExitOr<()> {
    let err = match result {
        Ok(()) => return Ok(Ok(())),
        Err(err) => err,
    };

    match &err {
        Error::Reported(_) | Error::Interrupted => {}
        Error::Aborted => writeln!(effects.get_output_stream(), "{err}")?,
        Error::NoStagedChanges => writeln!(effects.get_error_stream(), "{err}")?,
        Error::Fmt(_) => return Err(err.into()),
        _ => writeln!(
            effects.get_error_stream(),
            "{}",
            effects
                .get_glyphs()
                .render(&styles::ERROR, format!("Error: {err}"))
        )?,
    }
    Ok(Err(err.exit_code()))
}

/// `git-change` entry point.
#[instrument]
pub fn command_main(ctx: CommandContext, opts: Opts) -> EyreExitOr<()> {
    let CommandContext {
        effects,
        runner,
        config,
    } = ctx;
    let Opts {
        global_args: _,
        command,
    } = opts;
    let engine = ChangeEngine::new(&effects, runner, config);

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let result = match command {
        Command::Create(args) => create::create(&engine, &args, &mut input, SystemTime::now()),
        Command::Update(args) => update::update(&engine, &args),
        Command::Rebase => rebase::rebase(&engine),
        Command::List => list::list(&engine, &mut input),
        Command::Submit => submit::submit(&engine),
        Command::Gc => gc::gc(&engine),
        Command::Print(args) => print::print(&engine, &args),
    };
    report(&effects, result)
}
