//! Show the push command without running it.

use std::fmt::Write;

use git_change_opts::PushArgs;
use lib::git::derive_change_id;
use tracing::instrument;

use super::{ChangeEngine, Result};

/// `print` sub-command. On a change branch, the push targets the branch
/// recorded for the change in Gerrit; otherwise it targets the current
/// branch.
#[instrument]
pub fn print(engine: &ChangeEngine, push_args: &PushArgs) -> Result<()> {
    let current_branch = engine.repo.current_branch()?;
    let target_branch = match derive_change_id(&current_branch) {
        Some(change_id) => engine.gerrit.get_change(&change_id)?.branch,
        None => current_branch,
    };
    let command = engine.make_push_command(push_args, &target_branch)?;
    writeln!(engine.effects.get_output_stream(), "{command}")?;
    Ok(())
}
