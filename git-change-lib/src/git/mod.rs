//! Tools for interfacing with the Git repository.

mod command;
pub mod reference;
pub mod repo;
pub mod run;

pub use command::CommandLine;
pub use reference::{
    derive_change_id, make_temp_branch_name, parse_change_id_trailer, BranchKind, ChangeId,
};
pub use repo::{CommitOptions, Repo, UnmergedCommits};
pub use run::{CommandFailure, CommandOutput, CommandRunner, ProcessRunner, RunMode};
