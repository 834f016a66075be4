//! Building the `git push` command which uploads a change to Gerrit.

use lib::git::CommandLine;

/// Build the command which pushes `HEAD` for review against `target_branch`.
///
/// Reviewers and CCs are passed to Gerrit's receive-pack. The remote runs
/// that option as a shell command line, so each value is shell-quoted. Blank
/// entries (as produced by a trailing comma in a flag value) are left out. If
/// `fake_push` is set, the command only echoes what it would have run.
pub fn build_push_command(
    remote: &str,
    reviewers: &[String],
    cc: &[String],
    target_branch: &str,
    topic: Option<&str>,
    fake_push: bool,
) -> CommandLine {
    let receive_pack_args: Vec<String> = reviewers
        .iter()
        .filter(|reviewer| !reviewer.trim().is_empty())
        .map(|reviewer| format!("--reviewer={}", shell_words::quote(reviewer.trim())))
        .chain(
            cc.iter()
                .filter(|cc| !cc.trim().is_empty())
                .map(|cc| format!("--cc={}", shell_words::quote(cc.trim()))),
        )
        .collect();

    let mut command = CommandLine::git(&["push", remote]);
    if !receive_pack_args.is_empty() {
        command = command.arg(format!(
            "--receive-pack=git receive-pack {}",
            receive_pack_args.join(" ")
        ));
    }

    let refspec = match topic.filter(|topic| !topic.is_empty()) {
        Some(topic) => format!("HEAD:refs/for/{target_branch}/{topic}"),
        None => format!("HEAD:refs/for/{target_branch}"),
    };
    command = command.arg(refspec);

    if fake_push {
        command.echoed()
    } else {
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(command: &CommandLine) -> Vec<String> {
        std::iter::once(command.get_program().to_owned())
            .chain(command.get_args().iter().cloned())
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_build_push_command_plain() {
        let command = build_push_command("origin", &[], &[], "main", None, false);
        assert_eq!(
            words(&command),
            vec!["git", "push", "origin", "HEAD:refs/for/main"]
        );
    }

    #[test]
    fn test_build_push_command_skips_blank_entries() {
        let command = build_push_command(
            "gerrit",
            &strings(&["alice", "", "bob"]),
            &strings(&["", "carol@example.com", " "]),
            "release-1.2",
            Some("speedups"),
            false,
        );
        assert_eq!(
            words(&command),
            vec![
                "git",
                "push",
                "gerrit",
                "--receive-pack=git receive-pack --reviewer=alice --reviewer=bob --cc=carol@example.com",
                "HEAD:refs/for/release-1.2/speedups",
            ]
        );
    }

    #[test]
    fn test_build_push_command_only_blank_entries() {
        let command = build_push_command(
            "origin",
            &strings(&["", ""]),
            &strings(&[""]),
            "main",
            Some(""),
            false,
        );
        assert_eq!(
            words(&command),
            vec!["git", "push", "origin", "HEAD:refs/for/main"]
        );
    }

    #[test]
    fn test_build_push_command_quotes_receive_pack_values() {
        let command = build_push_command(
            "origin",
            &strings(&["Ann O'Neil;touch x"]),
            &strings(&["team lead"]),
            "main",
            None,
            false,
        );
        assert_eq!(
            command.get_args()[2],
            "--receive-pack=git receive-pack --reviewer='Ann O'\\''Neil;touch x' --cc='team lead'"
        );
        let receive_pack = command.get_args()[2]
            .strip_prefix("--receive-pack=")
            .unwrap();
        assert_eq!(
            shell_words::split(receive_pack).unwrap(),
            vec![
                "git",
                "receive-pack",
                "--reviewer=Ann O'Neil;touch x",
                "--cc=team lead",
            ]
        );
    }

    #[test]
    fn test_build_push_command_is_deterministic() {
        let reviewers = strings(&["alice", "bob"]);
        let cc = strings(&["carol"]);
        let first = build_push_command("origin", &reviewers, &cc, "main", Some("t"), false);
        let second = build_push_command("origin", &reviewers, &cc, "main", Some("t"), false);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_build_push_command_fake_push() {
        let command = build_push_command("origin", &strings(&["alice"]), &[], "main", None, true);
        assert_eq!(
            words(&command),
            vec![
                "echo",
                "git",
                "push",
                "origin",
                "--receive-pack=git receive-pack --reviewer=alice",
                "HEAD:refs/for/main",
            ]
        );
    }
}
