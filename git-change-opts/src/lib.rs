//! The command-line options for `git-change`.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments)]

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

/// Options shaping the `git push` command which uploads a change.
#[derive(Args, Clone, Debug, Default)]
pub struct PushArgs {
    /// Comma-separated list of reviewers.
    #[clap(value_parser, short = 'r', long = "reviewers", value_delimiter = ',')]
    pub reviewers: Vec<String>,

    /// Comma-separated list of addresses to copy on change notification mails.
    #[clap(value_parser, long = "cc", value_delimiter = ',')]
    pub cc: Vec<String>,

    /// Tag the change with the given topic name.
    #[clap(value_parser, long = "topic")]
    pub topic: Option<String>,

    /// Do everything except for actually pushing the change to Gerrit.
    #[clap(action, long = "fake-push")]
    pub fake_push: bool,
}

/// Options passed through to the commit hooks.
#[derive(Args, Clone, Debug, Default)]
pub struct CommitArgs {
    /// Bug ID to include in the commit message header.
    #[clap(value_parser, short = 'b', long = "bug")]
    pub bug: Option<String>,

    /// Comma-separated list of pre-commit checks to skip.
    #[clap(value_parser, long = "skip")]
    pub skip: Option<String>,
}

/// Options for `create`.
#[derive(Args, Clone, Debug, Default)]
pub struct CreateArgs {
    #[allow(missing_docs)]
    #[clap(flatten)]
    pub push_args: PushArgs,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub commit_args: CommitArgs,

    /// Use the given message as the commit message.
    #[clap(value_parser, short = 'm', long = "message")]
    pub message: Option<String>,

    /// Run `git fetch` first so that the remote branch is in sync with the
    /// central repository.
    #[clap(action, long = "fetch")]
    pub fetch: bool,

    /// Switch to the change branch after creating it.
    #[clap(action, long = "switch")]
    pub switch: bool,

    /// Chain with the previous change. Use when this change depends on the
    /// previous one. The current branch must be a change branch. Implies
    /// `--switch`.
    #[clap(action, long = "chain")]
    pub chain: bool,

    /// Use the HEAD commit as the change to push rather than committing
    /// staged changes.
    #[clap(action, long = "use-head-commit")]
    pub use_head_commit: bool,

    /// Create a change for the merge commit at HEAD of the current tracking
    /// branch. Implies `--use-head-commit`. The usual check for unmerged
    /// commits is skipped, and the merge commit is removed from the tracking
    /// branch once the change branch has been pushed.
    #[clap(action, long = "merge-commit")]
    pub merge_commit: bool,
}

/// Options for `update`.
#[derive(Args, Clone, Debug, Default)]
pub struct UpdateArgs {
    #[allow(missing_docs)]
    #[clap(flatten)]
    pub push_args: PushArgs,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub commit_args: CommitArgs,
}

/// Whether to display terminal colors.
#[derive(Clone, Debug, ValueEnum)]
pub enum ColorSetting {
    /// Automatically determine whether to display colors from the terminal and environment variables.
    /// This is the default behavior.
    Auto,
    /// Always display terminal colors.
    Always,
    /// Never display terminal colors.
    Never,
}

/// Arguments which apply to all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalArgs {
    /// Change to the given directory before executing the rest of the program.
    /// (The option is called `-C` for symmetry with Git.)
    #[clap(value_parser, short = 'C', global = true)]
    pub working_directory: Option<PathBuf>,

    /// Flag to force enable or disable terminal colors.
    #[clap(value_parser, long = "color", value_enum, global = true)]
    pub color: Option<ColorSetting>,

    /// Echo commands but do not execute them.
    #[clap(action, short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Name of the remote repository to fetch from and push to. Defaults to
    /// the `git-change.remote` config option if it is set, otherwise
    /// `origin`.
    #[clap(value_parser, long = "remote", global = true)]
    pub remote: Option<String>,

    /// SSH destination of the Gerrit server. Defaults to the
    /// `git-change.gerrit-ssh-host` config option; one of the two is
    /// required.
    #[clap(value_parser, long = "gerrit-ssh-host", global = true)]
    pub gerrit_ssh_host: Option<String>,
}

/// `git-change` subcommands.
#[derive(Debug, Parser)]
pub enum Command {
    /// Commit the staged changes to a new change branch and upload it to
    /// Gerrit for review. This is the default subcommand.
    Create(CreateArgs),

    /// Upload a new patch set for the change on the current change branch,
    /// amending HEAD first if there are staged changes.
    Update(UpdateArgs),

    /// Pull the target branch and rebase the current change branch onto it.
    Rebase,

    /// List change branches and offer to check one out.
    List,

    /// Submit the change on the current change branch.
    Submit,

    /// Delete change branches which have been fully merged.
    Gc,

    /// Print the command that would be used to push the current change.
    Print(PushArgs),
}

/// Create and manage changes for the Gerrit code review tool.
#[derive(Debug, Parser)]
#[clap(name = "git-change", version = env!("CARGO_PKG_VERSION"))]
pub struct Opts {
    /// Global arguments.
    #[clap(flatten)]
    pub global_args: GlobalArgs,

    /// The `git-change` subcommand to run.
    #[clap(subcommand)]
    pub command: Command,
}

const SUBCOMMAND_NAMES: &[&str] = &[
    "create", "update", "rebase", "list", "submit", "gc", "print", "help",
];

const OPTIONS_TAKING_VALUES: &[&str] = &[
    "-C",
    "--color",
    "--remote",
    "--gerrit-ssh-host",
    "-r",
    "--reviewers",
    "--cc",
    "--topic",
    "-b",
    "--bug",
    "--skip",
    "-m",
    "--message",
];

const INFO_FLAGS: &[&str] = &["-h", "--help", "-V", "--version"];

/// Carry out some rewrites on the command-line arguments for uniformity.
///
/// `create` is the default subcommand, so `git change -r alice` becomes
/// `git change create -r alice`. The `.exe` suffix is removed from the
/// program name on Windows.
pub fn rewrite_args(args: Vec<OsString>) -> Vec<OsString> {
    let mut args = args;
    if let Some(exe_name) = args
        .first()
        .and_then(|arg| PathBuf::from(arg).file_name().map(|name| name.to_owned()))
        .and_then(|name| name.into_string().ok())
    {
        let exe_name = exe_name
            .strip_suffix(std::env::consts::EXE_SUFFIX)
            .unwrap_or(&exe_name)
            .to_owned();
        args[0] = OsString::from(exe_name);
    }

    let mut expecting_value = false;
    let mut has_subcommand = false;
    for arg in args.iter().skip(1) {
        let arg = match arg.to_str() {
            Some(arg) => arg,
            None => continue,
        };
        if expecting_value {
            expecting_value = false;
            continue;
        }
        if arg == "--" {
            break;
        }
        if INFO_FLAGS.contains(&arg) {
            return args;
        }
        if OPTIONS_TAKING_VALUES.contains(&arg) {
            expecting_value = true;
            continue;
        }
        if !arg.starts_with('-') {
            has_subcommand = SUBCOMMAND_NAMES.contains(&arg);
            break;
        }
    }

    if !has_subcommand && !args.is_empty() {
        args.insert(1, OsString::from("create"));
    }
    args
}
