//! This crate sets up the process for running a `git-change` command:
//! argument rewriting, working directory, output, tracing and configuration.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments)]

use std::any::Any;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write;
use std::sync::Arc;
use std::time::SystemTime;

use clap::{CommandFactory, FromArgMatches, Parser};
use eyre::Context;
use git_change_opts::{rewrite_args, ColorSetting, GlobalArgs};
use lib::core::config::env_vars::get_path_to_git;
use lib::core::config::{ChangeConfig, ConfigOverrides, Error as ConfigError};
use lib::core::effects::Effects;
use lib::core::formatting::{styles, Glyphs};
use lib::git::repo::Error as RepoError;
use lib::git::{CommandRunner, ProcessRunner, Repo};
use lib::util::{ExitCode, EyreExitOr};
use tracing::instrument;
use tracing::level_filters::LevelFilter;
use tracing_chrome::ChromeLayerBuilder;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Shared context for all commands.
#[derive(Clone, Debug)]
pub struct CommandContext {
    /// The `Effects` to use.
    pub effects: Effects,

    /// Runs `git` and `ssh`. In dry-run mode, it only echoes the commands.
    pub runner: Arc<dyn CommandRunner>,

    /// The resolved configuration.
    pub config: ChangeConfig,
}

#[must_use = "This function returns a guard object to flush traces. Dropping it immediately is probably incorrect. Make sure that the returned value lives until tracing has finished."]
#[instrument]
fn install_tracing(effects: Effects) -> eyre::Result<impl Drop> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse(
            std::env::var(EnvFilter::DEFAULT_ENV)
                .unwrap_or_else(|_| "git_change=warn,gitchange=warn".to_string()),
        )?;
    let fmt_layer = tracing_fmt::layer().with_writer(move || effects.clone().get_error_stream());

    let (profile_layer, flush_guard): (_, Box<dyn Any>) = {
        let should_include_function_args = match std::env::var("RUST_PROFILE_INCLUDE_ARGS") {
            Ok(value) if !value.is_empty() => true,
            Ok(_) | Err(_) => false,
        };

        let filename = match std::env::var("RUST_PROFILE") {
            Ok(value) if value == "1" || value == "true" => Some(format!(
                "trace-{}.json",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)?
                    .as_secs(),
            )),
            Ok(value) if !value.is_empty() => Some(value),
            Ok(_) | Err(_) => None,
        };

        match filename {
            Some(filename) => {
                let (layer, flush_guard) = ChromeLayerBuilder::new()
                    .file(filename)
                    .include_args(should_include_function_args)
                    .build();
                (Some(layer), Box::new(flush_guard))
            }
            None => {
                struct TrivialDrop;
                (None, Box::new(TrivialDrop))
            }
        }
    };

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(fmt_layer.with_filter(env_filter))
        .with(profile_layer)
        .try_init()?;

    Ok(flush_guard)
}

/// Make sure we are running inside a git repository before doing anything
/// else, the same way `git status` would complain.
#[instrument]
fn check_inside_repository(effects: &Effects, repo: &Repo) -> eyre::Result<Option<ExitCode>> {
    match repo.verify() {
        Ok(()) => Ok(None),
        Err(RepoError::Run(err)) => match err.as_failure() {
            Some(failure) => {
                write!(effects.get_error_stream(), "{}", failure.stderr)?;
                Ok(Some(failure.exit_code))
            }
            None => Err(err.into()),
        },
        Err(err) => Err(err.into()),
    }
}

/// Wrapper function for `main` to ensure that `Drop` is called for local
/// variables, since `std::process::exit` will skip them. You probably want to
/// call `invoke_subcommand_main` instead.
#[instrument(skip(f))]
pub fn do_main_and_drop_locals<T: Parser>(
    f: impl Fn(CommandContext, T) -> EyreExitOr<()>,
    args: Vec<OsString>,
) -> eyre::Result<i32> {
    let command = GlobalArgs::command();
    let command_args = T::parse_from(&args);
    let matches = command.ignore_errors(true).get_matches_from(&args);
    let GlobalArgs {
        working_directory,
        color,
        dry_run,
        remote,
        gerrit_ssh_host,
    } = GlobalArgs::from_arg_matches(&matches)
        .map_err(|err| eyre::eyre!("Could not parse global arguments: {err}"))?;

    if let Some(working_directory) = working_directory {
        std::env::set_current_dir(&working_directory).wrap_err_with(|| {
            format!(
                "Could not set working directory to: {:?}",
                &working_directory
            )
        })?;
    }

    let color = match color {
        Some(ColorSetting::Always) => Glyphs::pretty(),
        Some(ColorSetting::Never) => Glyphs::text(),
        Some(ColorSetting::Auto) | None => Glyphs::detect(),
    };
    let effects = Effects::new(color);

    let _tracing_guard = install_tracing(effects.clone());

    let process_runner = ProcessRunner {
        effects: effects.clone(),
        working_directory: std::env::current_dir()?,
        path_to_git: get_path_to_git(),
        env: std::env::vars_os().collect::<HashMap<OsString, OsString>>(),
        dry_run,
    };

    // Config is read from the real repository even in dry-run mode.
    let config_repo = Repo::new(Arc::new(ProcessRunner {
        dry_run: false,
        ..process_runner.clone()
    }));
    let config = match ChangeConfig::resolve(
        &config_repo,
        ConfigOverrides {
            remote,
            gerrit_ssh_host,
            dry_run,
        },
    ) {
        Ok(config) => config,
        Err(err @ (ConfigError::MissingGerritSshHost | ConfigError::InvalidBool { .. })) => {
            writeln!(
                effects.get_error_stream(),
                "{}",
                effects
                    .get_glyphs()
                    .render(&styles::ERROR, format!("Error: {err}"))
            )?;
            return Ok(1);
        }
        Err(err) => return Err(err.into()),
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(process_runner);
    if let Some(ExitCode(exit_code)) =
        check_inside_repository(&effects, &Repo::new(Arc::clone(&runner)))?
    {
        let exit_code: i32 = exit_code.try_into()?;
        return Ok(exit_code);
    }

    let ctx = CommandContext {
        effects,
        runner,
        config,
    };
    let exit_code = match f(ctx, command_args)? {
        Ok(()) => 0,
        Err(ExitCode(exit_code)) => {
            let exit_code: i32 = exit_code.try_into()?;
            exit_code
        }
    };
    Ok(exit_code)
}

/// Invoke the provided subcommand main function. This should be used in the
/// `main.rs` file for the executable. For example:
///
/// ```ignore
/// fn main() {
///     git_change_invoke::invoke_subcommand_main(git_change::commands::command_main)
/// }
/// ```
#[instrument(skip(f))]
pub fn invoke_subcommand_main<T: Parser>(f: impl Fn(CommandContext, T) -> EyreExitOr<()>) {
    // Install panic handler.
    color_eyre::install().expect("Could not install panic handler");
    let args = rewrite_args(std::env::args_os().collect());
    let exit_code = do_main_and_drop_locals(f, args).expect("A fatal error occurred");
    std::process::exit(exit_code);
}
