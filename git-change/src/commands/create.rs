//! Create a new change.
//!
//! The staged changes (or the `HEAD` commit) are committed on a temporary
//! branch, which is renamed after the Change-Id of the new commit and pushed
//! to Gerrit. If the commit or the push fails, the new branch is removed again
//! and the user is returned to the branch they started on.

use std::fmt::Write;
use std::io::BufRead;
use std::time::SystemTime;

use git_change_opts::CreateArgs;
use lib::core::formatting::{styles, Pluralize};
use lib::git::{make_temp_branch_name, BranchKind, UnmergedCommits};
use tracing::instrument;

use super::{ChangeEngine, Error, Result};

/// The branch the user started on, and the branch the change is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branches {
    /// The branch checked out when `create` started.
    pub original_branch: String,

    /// The branch the change will be merged into.
    pub target_branch: String,
}

/// Work out which branch the change targets. When chaining, this is the
/// target of the change on the current change branch; otherwise it is the
/// current branch, which must not be a change branch.
#[instrument]
pub fn determine_branches(engine: &ChangeEngine, chain: bool) -> Result<Branches> {
    let original_branch = engine.repo.current_branch()?;
    let target_branch = match (chain, BranchKind::of(&original_branch)) {
        (true, BranchKind::Change(previous_change_id)) => {
            engine.gerrit.get_change(&previous_change_id)?.branch
        }
        (true, BranchKind::Tracking | BranchKind::Temporary) => {
            return Err(Error::ChainRequiresChangeBranch)
        }
        (false, BranchKind::Change(_)) => return Err(Error::AlreadyOnChangeBranch),
        (false, BranchKind::Tracking | BranchKind::Temporary) => original_branch.clone(),
    };
    Ok(Branches {
        original_branch,
        target_branch,
    })
}

/// Make sure `branch` has no commits that its remote counterpart lacks, or
/// that the user wants to go ahead anyway.
#[instrument(skip(input))]
pub fn check_unmerged_commits(
    engine: &ChangeEngine,
    branch: &str,
    input: &mut dyn BufRead,
) -> Result<()> {
    let effects = &engine.effects;
    let glyphs = effects.get_glyphs();
    let remote = &engine.config.remote;
    let commits = match engine.repo.unmerged_commits(branch, remote)? {
        UnmergedCommits::UpToDate => return Ok(()),
        UnmergedCommits::Unknown if engine.repo.is_dry_run() => {
            writeln!(
                effects.get_output_stream(),
                "Skipping the check for unmerged commits in dry-run mode."
            )?;
            return Ok(());
        }
        UnmergedCommits::Unknown => {
            writeln!(
                effects.get_error_stream(),
                "{}",
                glyphs.render(
                    &styles::WARNING,
                    format!(
                        "Could not compare branch {branch} with {remote}/{branch}; \
                         skipping the check for unmerged commits."
                    )
                )
            )?;
            return Ok(());
        }
        UnmergedCommits::Ahead(commits) => commits,
    };

    writeln!(
        effects.get_output_stream(),
        "Your branch {} is ahead of its remote by the following {}:\n",
        glyphs.render(&styles::BRANCH, branch),
        Pluralize {
            determiner: None,
            amount: commits.len(),
            unit: ("commit", "commits"),
        }
    )?;
    for commit in &commits {
        writeln!(effects.get_output_stream(), "{commit}")?;
    }
    let confirmed = engine.confirm(
        input,
        "\nIf we continue, each of the commits above may result in a new code\n\
         review and a submit dependency in Gerrit. You might try syncing the\n\
         remote branch by passing the --fetch flag.\n\
         Continue? ",
    )?;
    if confirmed {
        Ok(())
    } else {
        writeln!(effects.get_output_stream())?;
        Err(Error::Aborted)
    }
}

/// Fail if the working tree or index has changes to tracked files, after
/// showing them to the user.
#[instrument]
pub fn check_for_pending_changes(engine: &ChangeEngine) -> Result<()> {
    if engine.repo.has_uncommitted_changes()? {
        engine.repo.show_status()?;
        return Err(Error::UncommittedChanges);
    }
    Ok(())
}

/// Whether a raw commit object (as printed by `git cat-file -p`) has at least
/// two parents and a `Merge branch` message line.
pub fn looks_like_merge(raw_commit: &str) -> bool {
    let num_parents = raw_commit
        .lines()
        .filter(|line| line.starts_with("parent "))
        .count();
    let has_merge_message = raw_commit
        .lines()
        .any(|line| line.starts_with("Merge branch "));
    num_parents >= 2 && has_merge_message
}

#[instrument(skip(input))]
fn sanity_check_merge_commit(engine: &ChangeEngine, input: &mut dyn BufRead) -> Result<()> {
    let raw_commit = engine.repo.head_commit_raw()?;
    if looks_like_merge(&raw_commit)
        || engine.confirm(input, "The HEAD commit does not look like a merge. Continue? ")?
    {
        Ok(())
    } else {
        Err(Error::Aborted)
    }
}

/// Return to `original_branch` and delete `branch`. If `undo_commit` is set,
/// the commit made on `branch` is first undone with its changes left staged.
fn roll_back_branch(
    engine: &ChangeEngine,
    original_branch: &str,
    branch: &str,
    undo_commit: bool,
) -> Result<()> {
    let repo = &engine.repo;
    if undo_commit {
        engine.check_rollback_step("undo the commit", repo.reset_soft("HEAD^"))?;
    }
    engine.check_rollback_step(
        &format!("check out {original_branch}"),
        repo.checkout(original_branch),
    )?;
    engine.check_rollback_step(
        &format!("delete branch {branch}"),
        repo.delete_branch(branch, false),
    )?;
    Ok(())
}

/// Return to `original_branch` and delete the temporary branch after the
/// commit failed or was cancelled.
fn abandon_temp_branch(
    engine: &ChangeEngine,
    original_branch: &str,
    temp_branch: &str,
    err: Error,
) -> Result<()> {
    roll_back_branch(engine, original_branch, temp_branch, false)?;
    Err(Error::Reported(Box::new(err)))
}

/// `create` sub-command.
#[instrument(skip(input))]
pub fn create(
    engine: &ChangeEngine,
    args: &CreateArgs,
    input: &mut dyn BufRead,
    now: SystemTime,
) -> Result<()> {
    let CreateArgs {
        push_args,
        commit_args,
        message,
        fetch,
        switch,
        chain,
        use_head_commit,
        merge_commit,
    } = args;
    let use_head_commit = *use_head_commit || *merge_commit;
    let stay_on_new_branch = *switch || *chain;
    let effects = &engine.effects;
    let glyphs = effects.get_glyphs();
    let repo = &engine.repo;

    if !use_head_commit && !repo.has_staged_changes()? {
        return Err(Error::NoStagedChanges);
    }

    if *merge_commit {
        check_for_pending_changes(engine)?;
        sanity_check_merge_commit(engine, input)?;
    }

    let Branches {
        original_branch,
        target_branch,
    } = determine_branches(engine, *chain)?;

    if *fetch {
        repo.fetch(&engine.config.remote)?;
    }

    // A merge commit is expected to bring in commits the remote lacks.
    if !*chain && !*merge_commit {
        check_unmerged_commits(engine, &original_branch, input)?;
    }

    let temp_branch = make_temp_branch_name(now);
    repo.create_branch(&temp_branch)?;

    if !use_head_commit {
        if let Err(err) = engine.commit(commit_args, false, message.as_deref()) {
            return abandon_temp_branch(engine, &original_branch, &temp_branch, err);
        }
    }

    // From here on the temporary branch holds a commit made for this change,
    // unless the existing HEAD commit is being used.
    let undo_commit = !use_head_commit;
    let mut change_id = match engine.head_change_id() {
        Ok(change_id) => change_id,
        Err(err) => {
            roll_back_branch(engine, &original_branch, &temp_branch, undo_commit)?;
            return Err(err);
        }
    };
    if use_head_commit && change_id.is_none() {
        // Amending runs the commit-msg hook, which adds the Change-Id.
        if let Err(err) = engine.commit(commit_args, true, message.as_deref()) {
            return abandon_temp_branch(engine, &original_branch, &temp_branch, err);
        }
        change_id = match engine.head_change_id() {
            Ok(change_id) => change_id,
            Err(err) => {
                roll_back_branch(engine, &original_branch, &temp_branch, undo_commit)?;
                return Err(err);
            }
        };
    }

    let new_branch = match change_id {
        Some(change_id) => {
            let new_branch = change_id.to_branch_name();
            if let Err(err) = repo.rename_branch(&temp_branch, &new_branch) {
                roll_back_branch(engine, &original_branch, &temp_branch, undo_commit)?;
                return Err(Error::Reported(Box::new(err.into())));
            }
            new_branch
        }
        None => {
            writeln!(
                effects.get_output_stream(),
                "\n{}",
                glyphs.render(
                    &styles::WARNING,
                    format!(
                        "WARNING: Reading change ID from the HEAD commit failed. (You may need to\n\
                         install the Gerrit commit-msg hook.) Before continuing, you need to add\n\
                         the change ID header to the HEAD commit message (git commit --amend) and\n\
                         rename the branch {temp_branch} to change-<change-ID> manually."
                    )
                )
            )?;
            temp_branch
        }
    };
    writeln!(
        effects.get_output_stream(),
        "\nCreated branch: {}\n",
        glyphs.render(&styles::BRANCH, &new_branch)
    )?;

    if let Err(err) = engine.push_change(push_args, &target_branch) {
        roll_back_branch(engine, &original_branch, &new_branch, undo_commit)?;
        return Err(Error::Reported(Box::new(err)));
    }

    if *merge_commit {
        // The merge commit now lives on the change branch only.
        repo.checkout(&original_branch)?;
        repo.reset_hard("HEAD^")?;
        writeln!(
            effects.get_output_stream(),
            "Removed HEAD commit from branch {}",
            glyphs.render(&styles::BRANCH, &original_branch)
        )?;
        if stay_on_new_branch {
            repo.checkout(&new_branch)?;
        }
        return Ok(());
    }

    if !stay_on_new_branch {
        repo.checkout(&original_branch)?;
    }
    Ok(())
}
