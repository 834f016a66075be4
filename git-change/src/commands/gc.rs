//! Delete change branches which have been merged.

use std::fmt::Write;

use lib::core::formatting::styles;
use lib::git::repo;
use tracing::{debug, instrument};

use super::list::get_change_branches;
use super::{ChangeEngine, Result};

/// `gc` sub-command.
///
/// Each change branch is deleted with `git branch -d`, which refuses to
/// delete a branch that is not fully merged. Those branches are kept and
/// listed for the user; they are never force-deleted.
#[instrument]
pub fn gc(engine: &ChangeEngine) -> Result<()> {
    let effects = &engine.effects;
    let glyphs = effects.get_glyphs();

    let mut deleted_any = false;
    let mut unmerged_branches = Vec::new();
    for branch in get_change_branches(engine)? {
        match engine.repo.delete_branch(&branch, false) {
            Ok(output) => {
                write!(effects.get_output_stream(), "{}", output.stdout)?;
                deleted_any = true;
            }
            Err(repo::Error::Run(err)) if err.as_failure().is_some() => {
                debug!(?err, ?branch, "Could not delete branch");
                unmerged_branches.push(branch);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if unmerged_branches.is_empty() {
        return Ok(());
    }
    if deleted_any {
        writeln!(effects.get_output_stream())?;
    }
    writeln!(
        effects.get_output_stream(),
        "The following change branches could not be deleted, probably because they\n\
         are not fully merged into the current branch. You might try first running\n\
         git-pull or git-change rebase in order to sync with remote.\n"
    )?;
    for branch in &unmerged_branches {
        writeln!(
            effects.get_output_stream(),
            "{}",
            glyphs.render(&styles::ERROR, branch)
        )?;
    }
    Ok(())
}
