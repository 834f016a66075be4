use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use git_change::commands::ChangeEngine;
use lib::core::config::ChangeConfig;
use lib::core::effects::Effects;
use lib::core::formatting::Glyphs;
use lib::testing::ScriptedRunner;

pub const GERRIT_HOST: &str = "review.example.com";

/// The temporary branch name produced for [`fixed_now`].
pub const TEMP_BRANCH: &str = "tmp-change-1600000000.123456";

pub fn fixed_now() -> SystemTime {
    UNIX_EPOCH + Duration::new(1_600_000_000, 123_456_000)
}

pub fn make_config() -> ChangeConfig {
    ChangeConfig {
        remote: "origin".to_owned(),
        gerrit_ssh_host: GERRIT_HOST.to_owned(),
        include_owners: false,
        dry_run: false,
    }
}

/// The raw `git cat-file -p HEAD` output for a commit with the given message.
pub fn raw_commit(message: &str) -> String {
    format!(
        "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
         parent 1111111111111111111111111111111111111111\n\
         author Testy McTestface <test@example.com> 1604000096 -0700\n\
         committer Testy McTestface <test@example.com> 1604000096 -0700\n\
         \n\
         {message}\n"
    )
}

/// A Gerrit query response containing a single change.
pub fn query_response(change_id: &str, branch: &str, open: bool) -> String {
    format!(
        "{{\"project\":\"fooproj\",\"branch\":\"{branch}\",\"id\":\"{change_id}\",\"number\":\"45\",\"open\":{open},\"status\":\"NEW\"}}\n\
         {{\"type\":\"stats\",\"rowCount\":1,\"runTimeMilliseconds\":7}}\n"
    )
}

pub fn gerrit_query_prefix() -> [&'static str; 4] {
    ["ssh", GERRIT_HOST, "gerrit", "query"]
}

/// A `ChangeEngine` driven by a `ScriptedRunner`, writing its output to
/// buffers.
pub struct Harness {
    pub runner: Arc<ScriptedRunner>,
    pub engine: ChangeEngine,
    pub effects: Effects,
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(ScriptedRunner::new(), make_config())
    }

    pub fn new_dry_run() -> Self {
        Self::with_runner(
            ScriptedRunner::new_dry_run(),
            ChangeConfig {
                dry_run: true,
                ..make_config()
            },
        )
    }

    pub fn with_runner(runner: ScriptedRunner, config: ChangeConfig) -> Self {
        let runner = Arc::new(runner);
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let effects = Effects::new_from_buffer_for_test(Glyphs::text(), &stdout, &stderr);
        let engine_runner: Arc<ScriptedRunner> = Arc::clone(&runner);
        let engine = ChangeEngine::new(&effects, engine_runner, config);
        Self {
            runner,
            engine,
            effects,
            stdout,
            stderr,
        }
    }

    pub fn stdout(&self) -> String {
        String::from_utf8(self.stdout.lock().unwrap().clone()).unwrap()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8(self.stderr.lock().unwrap().clone()).unwrap()
    }

    /// Script the runner so that `HEAD` is `branch`.
    pub fn on_branch(&self, branch: &str) {
        self.runner.respond(
            &["git", "symbolic-ref", "HEAD"],
            &format!("refs/heads/{branch}\n"),
        );
    }

    /// Script the runner so that the `HEAD` commit has the given message.
    pub fn head_message(&self, message: &str) {
        self.runner
            .respond(&["git", "cat-file", "-p", "HEAD"], &raw_commit(message));
    }
}
