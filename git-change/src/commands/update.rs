//! Upload a new patch set for the change on the current change branch.

use git_change_opts::{CommitArgs, PushArgs, UpdateArgs};
use tracing::instrument;

use super::{ChangeEngine, Result};

/// `update` sub-command.
///
/// `HEAD` is amended first if there are staged changes or if any reviewers,
/// CCs or a bug ID were given, so that Gerrit sees a new patch set.
#[instrument]
pub fn update(engine: &ChangeEngine, args: &UpdateArgs) -> Result<()> {
    let UpdateArgs {
        push_args,
        commit_args,
    } = args;
    let (_change_id, change) = engine.get_open_change()?;

    let PushArgs {
        reviewers,
        cc,
        topic: _,
        fake_push: _,
    } = push_args;
    let CommitArgs { bug, skip: _ } = commit_args;
    let should_amend = !reviewers.is_empty()
        || !cc.is_empty()
        || bug.is_some()
        || engine.repo.has_staged_changes()?;
    if should_amend {
        engine.commit(commit_args, true, None)?;
    }

    engine.push_change(push_args, &change.branch)
}
