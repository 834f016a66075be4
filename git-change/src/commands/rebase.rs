//! Bring the current change branch up to date with its target branch.

use std::fmt::Write;

use tracing::instrument;

use super::{ChangeEngine, Error, Result};

/// `rebase` sub-command.
///
/// The target branch is pulled with `--rebase`, then the change branch is
/// rebased onto it. A conflicted rebase is left in progress for the user to
/// resolve.
#[instrument]
pub fn rebase(engine: &ChangeEngine) -> Result<()> {
    let change_id = engine.check_for_change_branch()?;
    let change = engine.gerrit.get_change(&change_id)?;
    let target_branch = change.branch;
    let change_branch = change_id.to_branch_name();
    let repo = &engine.repo;

    repo.checkout(&target_branch)?;
    if let Err(err) = repo.pull_rebase() {
        writeln!(
            engine.effects.get_output_stream(),
            "Rebase failed for branch {target_branch}. After resolving merge failure(s),\n\
             check out the change branch ({change_branch}) and run \"git change rebase\" again.\n\
             See \"git help rebase\" for help on resolving merge conflicts."
        )?;
        return Err(Error::Reported(Box::new(err.into())));
    }

    repo.checkout(&change_branch)?;
    if let Err(err) = repo.rebase(&target_branch) {
        writeln!(
            engine.effects.get_output_stream(),
            "Rebase failed for branch {change_branch}. After resolving merge failure(s),\n\
             run \"git change rebase\" again. See \"git help rebase\" for help\n\
             on resolving merge conflicts."
        )?;
        return Err(Error::Reported(Box::new(err.into())));
    }
    Ok(())
}
