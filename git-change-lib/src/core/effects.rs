//! Wrappers around various side effects.

use std::fmt::{Display, Write};
use std::io::{self, stderr, stdout, Write as WriteIo};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::core::formatting::Glyphs;

/// A long-running operation which the user may want feedback about.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperationType {
    QueryGerrit(Arc<String>),
    ResolveOwners,
    SubmitChange(Arc<String>),
}

impl Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::QueryGerrit(query) => write!(f, "Querying Gerrit: {query}"),
            OperationType::ResolveOwners => write!(f, "Resolving owners"),
            OperationType::SubmitChange(commit) => write!(f, "Submitting {commit}"),
        }
    }
}

#[derive(Clone, Debug)]
enum OutputDest {
    Stdout,
    Suppress,
    BufferForTest {
        stdout: Arc<Mutex<Vec<u8>>>,
        stderr: Arc<Mutex<Vec<u8>>>,
    },
}

/// Wrapper around side-effectful operations, such as output and progress
/// indicators.
#[derive(Clone)]
pub struct Effects {
    glyphs: Glyphs,
    dest: OutputDest,
}

impl std::fmt::Debug for Effects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Output fancy={}>",
            self.glyphs.should_write_ansi_escape_codes
        )
    }
}

impl Effects {
    /// Constructor. Writes to stdout.
    pub fn new(glyphs: Glyphs) -> Self {
        Effects {
            glyphs,
            dest: OutputDest::Stdout,
        }
    }

    /// Constructor. Suppresses all output.
    pub fn new_suppress_for_test(glyphs: Glyphs) -> Self {
        Effects {
            glyphs,
            dest: OutputDest::Suppress,
        }
    }

    /// Constructor. Writes to the provided buffer.
    pub fn new_from_buffer_for_test(
        glyphs: Glyphs,
        stdout: &Arc<Mutex<Vec<u8>>>,
        stderr: &Arc<Mutex<Vec<u8>>>,
    ) -> Self {
        Effects {
            glyphs,
            dest: OutputDest::BufferForTest {
                stdout: Arc::clone(stdout),
                stderr: Arc::clone(stderr),
            },
        }
    }

    /// Start reporting progress for the specified operation type.
    ///
    /// A spinner is shown on stderr until the returned `ProgressHandle` is
    /// dropped. Nothing is drawn unless output is going to an attended
    /// terminal, so callers must not write other output while the handle is
    /// alive.
    pub fn start_operation(&self, operation_type: OperationType) -> ProgressHandle {
        let progress_bar = match self.dest {
            OutputDest::Stdout if console::user_attended_stderr() => {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_draw_target(ProgressDrawTarget::stderr());
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                    progress_bar.set_style(style);
                }
                progress_bar.set_message(operation_type.to_string());
                progress_bar.enable_steady_tick(Duration::from_millis(100));
                progress_bar
            }
            OutputDest::Stdout | OutputDest::Suppress | OutputDest::BufferForTest { .. } => {
                ProgressBar::hidden()
            }
        };
        ProgressHandle { progress_bar }
    }

    /// Get the set of glyphs associated with the output.
    pub fn get_glyphs(&self) -> &Glyphs {
        &self.glyphs
    }

    /// Create a stream that can be written to.
    pub fn get_output_stream(&self) -> OutputStream {
        OutputStream {
            dest: self.dest.clone(),
        }
    }

    /// Create a stream that error output can be written to, rather than regular
    /// output.
    pub fn get_error_stream(&self) -> ErrorStream {
        ErrorStream {
            dest: self.dest.clone(),
        }
    }
}

/// A handle to stdout.
pub struct OutputStream {
    dest: OutputDest,
}

impl Write for OutputStream {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        match &self.dest {
            OutputDest::Stdout => {
                let mut stream = stdout();
                write!(stream, "{s}").map_err(|_| std::fmt::Error)?;
                stream.flush().map_err(|_| std::fmt::Error)?;
            }

            OutputDest::Suppress => {
                // Do nothing.
            }

            OutputDest::BufferForTest { stdout, stderr: _ } => {
                let mut buffer = stdout.lock().unwrap();
                write!(buffer, "{s}").map_err(|_| std::fmt::Error)?;
            }
        }
        Ok(())
    }
}

/// A handle to stderr.
pub struct ErrorStream {
    dest: OutputDest,
}

impl Write for ErrorStream {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        match &self.dest {
            OutputDest::Stdout => {
                let mut stream = stderr();
                write!(stream, "{s}").map_err(|_| std::fmt::Error)?;
                stream.flush().map_err(|_| std::fmt::Error)?;
            }

            OutputDest::Suppress => {
                // Do nothing.
            }

            OutputDest::BufferForTest { stdout: _, stderr } => {
                let mut buffer = stderr.lock().unwrap();
                write!(buffer, "{s}").map_err(|_| std::fmt::Error)?;
            }
        }
        Ok(())
    }
}

/// You probably don't want this. This implementation is only for `tracing`'s `fmt_layer`, because
/// it needs a writer of type `io::Write`, but `Effects` normally uses its implementation of
/// `fmt::Write`.
impl io::Write for ErrorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.dest {
            OutputDest::Stdout => stderr().write(buf),
            OutputDest::Suppress => Ok(buf.len()),
            OutputDest::BufferForTest { stdout: _, stderr } => {
                let mut buffer = stderr.lock().unwrap();
                buffer.write(buf)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.dest {
            OutputDest::Stdout => stderr().flush(),
            OutputDest::Suppress | OutputDest::BufferForTest { .. } => Ok(()),
        }
    }
}

/// A handle to an operation in progress. This object should be kept live while
/// the operation is underway.
#[derive(Debug)]
pub struct ProgressHandle {
    progress_bar: ProgressBar,
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.progress_bar.finish_and_clear();
    }
}
