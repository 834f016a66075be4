pub mod util;

use std::sync::Arc;

use git_change::commands::create::create;
use git_change::commands::ChangeEngine;
use git_change_opts::{CreateArgs, PushArgs};
use lib::core::effects::Effects;
use lib::core::formatting::Glyphs;
use lib::git::{Repo, UnmergedCommits};
use lib::testing::{make_git_repo, GitRepo};
use util::{fixed_now, make_config};

const CHANGE_ID: &str = "I0123456789abcdef0123456789abcdef01234567";

/// Give the repository a bare `origin` and a commit-msg hook which adds a
/// fixed Change-Id, like Gerrit's.
fn set_up_gerrit_like_remote(git: &GitRepo) -> eyre::Result<()> {
    let remote_path = git.temp_dir.path().join("remote.git");
    let remote_path = remote_path.to_str().unwrap();
    git.run(&["init", "--bare", remote_path])?;
    git.run(&["remote", "add", "origin", remote_path])?;
    git.run(&["push", "origin", "main"])?;
    git.run(&["fetch", "origin"])?;

    git.write_file(
        ".git/hooks/commit-msg",
        &format!("#!/bin/sh\nprintf '\\nChange-Id: {CHANGE_ID}\\n' >> \"$1\"\n"),
    )?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let hook_path = git.get_path().join(".git/hooks/commit-msg");
        std::fs::set_permissions(hook_path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_create_with_git() -> eyre::Result<()> {
    let git = make_git_repo()?;
    set_up_gerrit_like_remote(&git)?;
    git.write_file("foo.txt", "foo\n")?;
    git.run(&["add", "foo.txt"])?;

    let effects = Effects::new_suppress_for_test(Glyphs::text());
    let runner = Arc::new(git.make_runner(effects.clone()));
    let engine = ChangeEngine::new(&effects, runner, make_config());
    let args = CreateArgs {
        message: Some("Add foo".to_owned()),
        ..Default::default()
    };
    create(&engine, &args, &mut &b""[..], fixed_now())?;

    let repo = engine.get_repo();
    assert_eq!(repo.current_branch()?, "main");
    assert!(!repo.has_staged_changes()?);

    let change_branch = format!("change-{CHANGE_ID}");
    assert_eq!(
        repo.list_refs_by_pattern("refs/heads/change-*", "authordate")?,
        vec![change_branch.clone()]
    );
    assert!(repo
        .list_refs_by_pattern("refs/heads/tmp-change-*", "refname")?
        .is_empty());

    let pushed = git.run(&["ls-remote", "origin", "refs/for/main"])?;
    let change_commit = repo.rev_parse(&change_branch)?;
    assert!(pushed.starts_with(&change_commit));
    Ok(())
}

#[test]
fn test_create_with_git_existing_change_branch_rolls_back() -> eyre::Result<()> {
    let git = make_git_repo()?;
    git.run(&["commit", "--allow-empty", "-m", "Add foo\n\nChange-Id: Iabc123"])?;
    git.run(&["branch", "change-Iabc123"])?;

    let effects = Effects::new_suppress_for_test(Glyphs::text());
    let runner = Arc::new(git.make_runner(effects.clone()));
    let engine = ChangeEngine::new(&effects, runner, make_config());
    let args = CreateArgs {
        use_head_commit: true,
        push_args: PushArgs {
            fake_push: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = create(&engine, &args, &mut &b""[..], fixed_now());
    assert!(result.is_err());

    let repo = engine.get_repo();
    assert_eq!(repo.current_branch()?, "main");
    assert!(repo
        .list_refs_by_pattern("refs/heads/tmp-change-*", "refname")?
        .is_empty());
    assert_eq!(
        repo.list_refs_by_pattern("refs/heads/change-*", "refname")?,
        vec!["change-Iabc123".to_owned()]
    );
    Ok(())
}

#[test]
fn test_repo_with_git() -> eyre::Result<()> {
    let git = make_git_repo()?;
    let effects = Effects::new_suppress_for_test(Glyphs::text());
    let repo = Repo::new(Arc::new(git.make_runner(effects)));

    assert_eq!(repo.current_branch()?, "main");
    assert!(!repo.has_staged_changes()?);
    assert!(!repo.has_uncommitted_changes()?);
    assert_eq!(repo.config_value("git-change.remote")?, None);

    git.run(&["config", "git-change.remote", "gerrit"])?;
    assert_eq!(
        repo.config_value("git-change.remote")?,
        Some("gerrit".to_owned())
    );

    // There is no remote, so the comparison cannot be made.
    assert_eq!(
        repo.unmerged_commits("main", "origin")?,
        UnmergedCommits::Unknown
    );

    git.commit_file("second", "second\n")?;
    assert_eq!(repo.changed_files_since("HEAD^")?, vec!["second".to_owned()]);

    git.write_file("second", "changed\n")?;
    assert!(repo.has_uncommitted_changes()?);
    git.run(&["add", "second"])?;
    assert!(repo.has_staged_changes()?);

    git.run(&["checkout", "--detach"])?;
    assert!(repo.current_branch().is_err());
    Ok(())
}
