//! Branch names and Change-Ids.
//!
//! A change branch encodes the Gerrit Change-Id of the change it carries in
//! its name (`change-<Change-Id>`). Before the Change-Id is known, the branch
//! is created under a temporary name (`tmp-change-<timestamp>`).

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of a change branch name, not including the Change-Id.
pub const CHANGE_BRANCH_PREFIX: &str = "change-";

/// Prefix of a temporary change branch name, not including the timestamp.
pub const TEMP_BRANCH_PREFIX: &str = "tmp-change-";

/// The ref pattern matching all change branches.
pub const CHANGE_BRANCH_REF_PATTERN: &str = "refs/heads/change-*";

/// The commit message trailer key carrying the Change-Id.
pub const CHANGE_ID_TRAILER: &str = "Change-Id:";

/// A Gerrit Change-Id, such as `I0123456789abcdef0123456789abcdef01234567`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeId(String);

impl ChangeId {
    /// Wrap the given string as a Change-Id. Returns `None` unless it starts
    /// with `I` and has at least one more character.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.len() > 1 && id.starts_with('I') {
            Some(Self(id))
        } else {
            None
        }
    }

    /// The Change-Id as a string.
    pub fn as_str(&self) -> &str {
        let Self(id) = self;
        id
    }

    /// The name of the change branch carrying this change.
    pub fn to_branch_name(&self) -> String {
        format!("{CHANGE_BRANCH_PREFIX}{self}")
    }
}

impl Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

/// The role a branch plays in the change workflow, as determined by its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchKind {
    /// A long-lived branch with a remote counterpart of the same name.
    Tracking,

    /// A temporary branch which has not yet been renamed after its Change-Id.
    Temporary,

    /// A branch carrying a single change.
    Change(ChangeId),
}

impl BranchKind {
    /// Classify a (short) branch name.
    pub fn of(branch_name: &str) -> Self {
        if let Some(change_id) = derive_change_id(branch_name) {
            BranchKind::Change(change_id)
        } else if branch_name.starts_with(TEMP_BRANCH_PREFIX) {
            BranchKind::Temporary
        } else {
            BranchKind::Tracking
        }
    }
}

/// Extract the Change-Id from a change branch name. Returns `None` if the name
/// is not of the form `change-I...`.
pub fn derive_change_id(branch_name: &str) -> Option<ChangeId> {
    branch_name
        .strip_prefix(CHANGE_BRANCH_PREFIX)
        .and_then(ChangeId::new)
}

/// Make a temporary branch name which is unique for the given point in time.
pub fn make_temp_branch_name(now: SystemTime) -> String {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!(
        "{TEMP_BRANCH_PREFIX}{}.{:06}",
        since_epoch.as_secs(),
        since_epoch.subsec_micros()
    )
}

/// Find the `Change-Id:` trailer in a commit message (or in the raw output of
/// `git cat-file -p <commit>`), returning the first one found.
pub fn parse_change_id_trailer(message: &str) -> Option<ChangeId> {
    message.lines().find_map(|line| {
        line.strip_prefix(CHANGE_ID_TRAILER)
            .and_then(|change_id| ChangeId::new(change_id.trim()))
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_derive_change_id() {
        let change_id = derive_change_id("change-Id06774ede265426f85d36cca50bba69d8aa54ed8");
        assert_eq!(
            change_id.as_ref().map(ChangeId::as_str),
            Some("Id06774ede265426f85d36cca50bba69d8aa54ed8")
        );

        assert_eq!(derive_change_id("master"), None);
        assert_eq!(derive_change_id("change-"), None);
        assert_eq!(derive_change_id("change-I"), None);
        assert_eq!(derive_change_id("change-abc"), None);
        assert_eq!(derive_change_id("tmp-change-1330051281.000000"), None);
        assert_eq!(derive_change_id("feature/change-Iabc"), None);
    }

    #[test]
    fn test_change_id_branch_name_round_trip() {
        for id in ["Iabc123", "I661e66ee89a862de1f0c03c097b8d57302cade03", "I-with-dash"] {
            let change_id = ChangeId::new(id).unwrap();
            let branch_name = change_id.to_branch_name();
            assert_eq!(derive_change_id(&branch_name), Some(change_id));
        }
    }

    #[test]
    fn test_branch_kind() {
        assert_eq!(BranchKind::of("main"), BranchKind::Tracking);
        assert_eq!(
            BranchKind::of("tmp-change-1330051281.123456"),
            BranchKind::Temporary
        );
        assert_eq!(
            BranchKind::of("change-Iabc123"),
            BranchKind::Change(ChangeId::new("Iabc123").unwrap())
        );
    }

    #[test]
    fn test_make_temp_branch_name() {
        let now = UNIX_EPOCH + Duration::from_micros(1_330_051_281_000_042);
        assert_eq!(make_temp_branch_name(now), "tmp-change-1330051281.000042");
        assert_eq!(BranchKind::of(&make_temp_branch_name(now)), BranchKind::Temporary);
    }

    #[test]
    fn test_parse_change_id_trailer() {
        let cat_file = "\
tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904
parent 5e6d2b1a6e0b0b8b8f0d2cf3b6b8f4c2f4b8f1aa
author Ace Hacker <ace@example.com> 1330051281 -0800
committer Ace Hacker <ace@example.com> 1330051281 -0800

Log interesting events

Change-Id: I661e66ee89a862de1f0c03c097b8d57302cade03
";
        assert_eq!(
            parse_change_id_trailer(cat_file),
            ChangeId::new("I661e66ee89a862de1f0c03c097b8d57302cade03")
        );
        assert_eq!(parse_change_id_trailer("Log interesting events\n"), None);
        assert_eq!(parse_change_id_trailer("Change-Id:\n"), None);
    }
}
