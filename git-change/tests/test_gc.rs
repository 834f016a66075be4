pub mod util;

use std::sync::Arc;

use git_change::commands::gc::gc;
use git_change::commands::ChangeEngine;
use lib::core::effects::Effects;
use lib::core::formatting::Glyphs;
use lib::git::Repo;
use lib::testing::make_git_repo;
use util::{make_config, Harness};

#[test]
fn test_gc_keeps_unmerged_branches() -> eyre::Result<()> {
    let harness = Harness::new();
    harness
        .runner
        .respond(&["git", "for-each-ref"], "change-I1\nchange-I2\n");
    harness.runner.respond(
        &["git", "branch", "-d", "change-I1"],
        "Deleted branch change-I1 (was abc1234).\n",
    );
    harness.runner.fail(
        &["git", "branch", "-d", "change-I2"],
        1,
        "error: The branch 'change-I2' is not fully merged.\n",
    );

    gc(&harness.engine)?;
    insta::assert_snapshot!(harness.runner.command_log(), @r###"
    git for-each-ref --format=%(refname:short) --sort=authordate refs/heads/change-*
    git branch -d change-I1
    git branch -d change-I2
    "###);
    insta::assert_snapshot!(harness.stdout(), @r###"
    Deleted branch change-I1 (was abc1234).

    The following change branches could not be deleted, probably because they
    are not fully merged into the current branch. You might try first running
    git-pull or git-change rebase in order to sync with remote.

    change-I2
    "###);
    Ok(())
}

#[test]
fn test_gc_everything_merged() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.runner.respond(&["git", "for-each-ref"], "change-I1\n");
    harness.runner.respond(
        &["git", "branch", "-d", "change-I1"],
        "Deleted branch change-I1 (was abc1234).\n",
    );

    gc(&harness.engine)?;
    assert_eq!(
        harness.stdout(),
        "Deleted branch change-I1 (was abc1234).\n"
    );
    Ok(())
}

#[test]
fn test_gc_nothing_merged() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.runner.respond(&["git", "for-each-ref"], "change-I1\n");
    harness.runner.fail(&["git", "branch", "-d"], 1, "");

    gc(&harness.engine)?;
    assert!(harness
        .stdout()
        .starts_with("The following change branches could not be deleted"));
    assert!(harness.stdout().ends_with("\n\nchange-I1\n"));
    Ok(())
}

#[test]
fn test_gc_with_git() -> eyre::Result<()> {
    let git = make_git_repo()?;
    git.run(&["branch", "change-I1"])?;
    git.run(&["checkout", "-b", "change-I2"])?;
    git.commit_file("unmerged", "not merged yet\n")?;
    git.run(&["checkout", "main"])?;

    let effects = Effects::new_suppress_for_test(Glyphs::text());
    let runner = Arc::new(git.make_runner(effects.clone()));
    let engine = ChangeEngine::new(&effects, runner, make_config());
    gc(&engine)?;

    let branches = git.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])?;
    assert_eq!(branches, "change-I2\nmain\n");

    let repo = Repo::new(Arc::new(git.make_runner(effects)));
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}
