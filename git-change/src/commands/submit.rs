//! Submit the change on the current change branch.

use tracing::instrument;

use super::{ChangeEngine, Result};

/// `submit` sub-command.
#[instrument]
pub fn submit(engine: &ChangeEngine) -> Result<()> {
    let (_change_id, change) = engine.get_open_change()?;
    let commit = engine.repo.rev_parse("HEAD")?;
    engine.gerrit.submit(&change.project, &commit)?;
    Ok(())
}
