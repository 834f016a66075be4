//! Talking to the Gerrit server over SSH.
//!
//! Queries are sent as `ssh <host> gerrit query --format=JSON <query>`. The
//! response is one JSON object per line: a change record for each result,
//! followed by a single record with `"type": "stats"` summarizing the query.

use std::fmt::Display;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::core::effects::{Effects, OperationType};
use crate::git::reference::ChangeId;
use crate::git::repo::DRY_RUN_BRANCH;
use crate::git::{run, CommandLine, CommandRunner, RunMode};

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not reach Gerrit: {0}")]
    Channel(#[source] run::Error),

    #[error("could not parse Gerrit response line {line:?}: {source}")]
    ParseLine {
        line: String,
        source: serde_json::Error,
    },

    #[error("Gerrit reported an error: {message}")]
    Server { message: String },

    #[error("Unable to find Gerrit change for ID {change_id}.")]
    NoSuchChange { change_id: ChangeId },

    #[error("Got multiple results searching Gerrit for {change_id}.")]
    AmbiguousChange { change_id: ChangeId },
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The owner of a change.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

/// The legacy change number. Older servers send it as a string.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChangeNumber {
    Number(u64),
    String(String),
}

impl Display for ChangeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeNumber::Number(number) => write!(f, "{number}"),
            ChangeNumber::String(number) => write!(f, "{number}"),
        }
    }
}

/// A change record returned by a query.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// The Change-Id.
    pub id: String,

    /// The branch the change will be merged into.
    pub branch: String,

    /// The project (repository) on the server.
    pub project: String,

    /// Whether the change is still open for review.
    #[serde(default)]
    pub open: bool,

    /// e.g. `NEW`, `MERGED` or `ABANDONED`.
    #[serde(default)]
    pub status: Option<String>,

    #[allow(missing_docs)]
    #[serde(default)]
    pub number: Option<ChangeNumber>,

    #[allow(missing_docs)]
    #[serde(default)]
    pub owner: Option<Account>,

    #[allow(missing_docs)]
    #[serde(default)]
    pub subject: Option<String>,

    #[allow(missing_docs)]
    #[serde(default)]
    pub url: Option<String>,
}

/// The summary record at the end of a query response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    /// The number of change records returned.
    pub row_count: u64,

    /// How long the server spent on the query.
    #[serde(default)]
    pub run_time_milliseconds: u64,
}

/// The parsed response to a query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResults {
    /// The change records, in the order the server sent them.
    pub changes: Vec<Change>,

    /// The stats record, if the server sent one.
    pub stats: Option<QueryStats>,
}

#[derive(Deserialize)]
struct RecordType {
    #[serde(rename = "type", default)]
    record_type: Option<String>,

    #[serde(default)]
    message: Option<String>,
}

/// Parse the newline-delimited JSON output of `gerrit query --format=JSON`.
/// Blank lines are skipped.
pub fn parse_query_output(output: &str) -> Result<QueryResults> {
    let mut results = QueryResults::default();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parse_error = |source| Error::ParseLine {
            line: line.to_owned(),
            source,
        };

        let RecordType {
            record_type,
            message,
        } = serde_json::from_str(line).map_err(parse_error)?;
        match record_type.as_deref() {
            Some("stats") => {
                results.stats = Some(serde_json::from_str(line).map_err(parse_error)?);
            }
            Some("error") => {
                return Err(Error::Server {
                    message: message.unwrap_or_default(),
                });
            }
            _ => {
                results
                    .changes
                    .push(serde_json::from_str(line).map_err(parse_error)?);
            }
        }
    }
    Ok(results)
}

/// Client for the Gerrit SSH command interface.
#[derive(Clone, Debug)]
pub struct GerritClient {
    effects: Effects,
    runner: Arc<dyn CommandRunner>,
    ssh_host: String,
}

impl GerritClient {
    /// Constructor. `ssh_host` is anything `ssh` accepts as a destination,
    /// such as a host name or an alias from `~/.ssh/config`.
    pub fn new(effects: Effects, runner: Arc<dyn CommandRunner>, ssh_host: String) -> Self {
        Self {
            effects,
            runner,
            ssh_host,
        }
    }

    fn ssh(&self, args: &[&str]) -> CommandLine {
        CommandLine::new("ssh")
            .arg(self.ssh_host.as_str())
            .arg("gerrit")
            .args(args)
    }

    /// Run a search query.
    #[instrument]
    pub fn search(&self, query: &str) -> Result<QueryResults> {
        let command = self.ssh(&["query", "--format=JSON", query]);
        let output = {
            let _progress = self
                .effects
                .start_operation(OperationType::QueryGerrit(Arc::new(query.to_owned())));
            self.runner
                .run(&command, RunMode::Silent)
                .map_err(Error::Channel)?
        };
        if self.runner.is_dry_run() {
            return Ok(QueryResults::default());
        }
        parse_query_output(&output.stdout)
    }

    /// Look up the single change with the given Change-Id.
    ///
    /// In dry-run mode no query is actually made, so a placeholder open change
    /// targeting the dry-run branch is returned.
    #[instrument]
    pub fn get_change(&self, change_id: &ChangeId) -> Result<Change> {
        let QueryResults { changes, stats: _ } = self.search(&format!("change:{change_id}"))?;
        if self.runner.is_dry_run() {
            return Ok(Change {
                id: change_id.to_string(),
                branch: DRY_RUN_BRANCH.to_owned(),
                project: "dry-run-project".to_owned(),
                open: true,
                status: None,
                number: None,
                owner: None,
                subject: None,
                url: None,
            });
        }

        let mut changes = changes.into_iter();
        match (changes.next(), changes.next()) {
            (None, _) => Err(Error::NoSuchChange {
                change_id: change_id.clone(),
            }),
            (Some(change), None) => Ok(change),
            (Some(_), Some(_)) => Err(Error::AmbiguousChange {
                change_id: change_id.clone(),
            }),
        }
    }

    /// Submit the given patch set. The server's output is shown to the user.
    #[instrument]
    pub fn submit(&self, project: &str, commit: &str) -> Result<()> {
        let command = self.ssh(&["review", "--project", project, "--submit", commit]);
        let _progress = self
            .effects
            .start_operation(OperationType::SubmitChange(Arc::new(commit.to_owned())));
        self.runner
            .run(&command, RunMode::Visible)
            .map_err(Error::Channel)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formatting::Glyphs;
    use crate::testing::ScriptedRunner;

    const QUERY_OUTPUT: &str = r#"{"project":"fooproj","branch":"master","id":"I661e66ee89a862de1f0c03c097b8d57302cade03","number":"45","subject":"Log interesting events","owner":{"name":"Ace Hacker","email":"ace@example.com"},"url":"http://review.example.com/45","createdOn":1330051281,"lastUpdated":1330051281,"sortKey":"001b45410000002d","open":true,"status":"NEW","trackingIds":[{"system":"Bugzilla","id":"442"}]}
{"type":"stats","rowCount":1,"runTimeMilliseconds":10}
"#;

    fn make_client(runner: &Arc<ScriptedRunner>) -> GerritClient {
        let runner: Arc<ScriptedRunner> = Arc::clone(runner);
        GerritClient::new(
            Effects::new_suppress_for_test(Glyphs::text()),
            runner,
            "review.example.com".to_owned(),
        )
    }

    #[test]
    fn test_parse_query_output() -> eyre::Result<()> {
        let QueryResults { changes, stats } = parse_query_output(QUERY_OUTPUT)?;
        assert_eq!(
            stats,
            Some(QueryStats {
                row_count: 1,
                run_time_milliseconds: 10
            })
        );
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.id, "I661e66ee89a862de1f0c03c097b8d57302cade03");
        assert_eq!(change.branch, "master");
        assert_eq!(change.project, "fooproj");
        assert!(change.open);
        assert_eq!(
            change.number.as_ref().map(|number| number.to_string()),
            Some("45".to_owned())
        );
        assert_eq!(
            change.owner.as_ref().and_then(|owner| owner.name.as_deref()),
            Some("Ace Hacker")
        );
        Ok(())
    }

    #[test]
    fn test_parse_query_output_keeps_order() -> eyre::Result<()> {
        let output = r#"{"id":"I2","branch":"main","project":"p","open":true,"number":2}
{"id":"I1","branch":"main","project":"p","open":false,"number":1}
{"type":"stats","rowCount":2,"runTimeMilliseconds":3}
"#;
        let QueryResults { changes, stats } = parse_query_output(output)?;
        let ids: Vec<_> = changes.iter().map(|change| change.id.as_str()).collect();
        assert_eq!(ids, vec!["I2", "I1"]);
        assert_eq!(stats.map(|stats| stats.row_count), Some(2));
        Ok(())
    }

    #[test]
    fn test_parse_query_output_invalid_json() {
        let result = parse_query_output("{\"type\":\"stats\"\nnot json\n");
        assert!(matches!(result, Err(Error::ParseLine { .. })));
    }

    #[test]
    fn test_parse_query_output_server_error() {
        let result = parse_query_output(r#"{"type":"error","message":"permission denied"}"#);
        match result {
            Err(Error::Server { message }) => assert_eq!(message, "permission denied"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_get_change() -> eyre::Result<()> {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(&["ssh", "review.example.com", "gerrit", "query"], QUERY_OUTPUT);
        let client = make_client(&runner);
        let change_id = ChangeId::new("I661e66ee89a862de1f0c03c097b8d57302cade03").unwrap();
        let change = client.get_change(&change_id)?;
        assert_eq!(change.project, "fooproj");
        assert_eq!(
            runner.command_args(),
            vec![vec![
                "ssh",
                "review.example.com",
                "gerrit",
                "query",
                "--format=JSON",
                "change:I661e66ee89a862de1f0c03c097b8d57302cade03",
            ]]
        );
        Ok(())
    }

    #[test]
    fn test_get_change_missing_or_ambiguous() {
        let change_id = ChangeId::new("I1").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(&["ssh"], "{\"type\":\"stats\",\"rowCount\":0}\n");
        let client = make_client(&runner);
        assert!(matches!(
            client.get_change(&change_id),
            Err(Error::NoSuchChange { .. })
        ));

        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            &["ssh"],
            "{\"id\":\"I1\",\"branch\":\"a\",\"project\":\"p\"}\n{\"id\":\"I1\",\"branch\":\"b\",\"project\":\"p\"}\n",
        );
        let client = make_client(&runner);
        assert!(matches!(
            client.get_change(&change_id),
            Err(Error::AmbiguousChange { .. })
        ));
    }

    #[test]
    fn test_submit() -> eyre::Result<()> {
        let runner = Arc::new(ScriptedRunner::new());
        let client = make_client(&runner);
        client.submit("fooproj", "0123abcd")?;
        assert_eq!(
            runner.command_args(),
            vec![vec![
                "ssh",
                "review.example.com",
                "gerrit",
                "review",
                "--project",
                "fooproj",
                "--submit",
                "0123abcd",
            ]]
        );
        Ok(())
    }

    #[test]
    fn test_submit_failure() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail(&["ssh"], 255, "ssh: connect to host review.example.com: refused\n");
        let client = make_client(&runner);
        assert!(matches!(
            client.submit("fooproj", "0123abcd"),
            Err(Error::Channel(_))
        ));
    }
}
