//! Utility functions.

use std::num::TryFromIntError;
use std::process::ExitStatus;

/// Represents the code to exit the process with.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExitCode(pub isize);

impl TryFrom<ExitStatus> for ExitCode {
    type Error = TryFromIntError;

    fn try_from(status: ExitStatus) -> Result<Self, Self::Error> {
        // On Unix, a process terminated by a signal has no exit code. Report
        // it as a generic failure.
        let exit_code = status.code().unwrap_or(1);
        Ok(Self(exit_code.try_into()?))
    }
}

/// Encapsulate both an `eyre::Error` and an `ExitCode`. The `eyre::Error`
/// indicates an unexpected internal failure, while the `ExitCode` indicates
/// that the user-facing operation failed and the process should exit with
/// that code (usually after some message was already printed).
pub type EyreExitOr<T> = eyre::Result<Result<T, ExitCode>>;
