//! A typed command line: a program, its arguments, and any extra environment
//! variables. Arguments are never re-split by a shell, so reviewer names or
//! commit messages containing spaces and quotes are passed through intact.

use std::ffi::OsString;
use std::fmt::Display;

use itertools::Itertools;

/// A command to be executed by a [`crate::git::CommandRunner`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandLine {
    /// Start building a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Default::default(),
            env: Default::default(),
        }
    }

    /// Start building a `git` command with the given arguments.
    pub fn git<S: AsRef<str>>(args: &[S]) -> Self {
        Self::new("git").args(args)
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<S: AsRef<str>>(mut self, args: &[S]) -> Self {
        self.args
            .extend(args.iter().map(|arg| arg.as_ref().to_owned()));
        self
    }

    /// Set an environment variable for the command, in addition to whatever
    /// the runner passes through.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Wrap this command so that it is printed rather than executed, i.e.
    /// `echo <program> <args...>`.
    pub fn echoed(self) -> Self {
        let Self { program, args, env } = self;
        let mut echo_args = vec![program];
        echo_args.extend(args);
        Self {
            program: "echo".to_owned(),
            args: echo_args,
            env,
        }
    }

    /// The program to run.
    pub fn get_program(&self) -> &str {
        &self.program
    }

    /// The arguments to the program, not including the program itself.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// The extra environment variables for the command.
    pub fn get_env(&self) -> impl Iterator<Item = (OsString, OsString)> + '_ {
        self.env
            .iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value)))
    }
}

impl Display for CommandLine {
    /// Render the command as it would be typed into a POSIX shell. Arguments
    /// with special characters are quoted. Extra environment variables are
    /// not shown.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let words = std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|word| shell_words::quote(word))
            .join(" ");
        write!(f, "{words}")
    }
}
