use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use proc_exit::Code;

use crate::invocation::Invocation;
use crate::relay::{Relay, RelayStats, Shutdown};

/// Exit code of a process killed by a signal is this plus the signal number, as in shells
#[cfg(unix)]
const SIGNAL_EXIT_BASE: i32 = 128;

/// How long the relays may keep copying once the child has exited
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Failure to run a tool to completion
#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    /// The tool to run is not on disk
    #[error("Destination was not extracted successfully, `{}` does not exist", path.display())]
    NotExtracted {
        /// Expected path of the extracted tool
        path: PathBuf,
    },

    /// The child process could not be created
    #[error("Couldn't create process `{}`", program.display())]
    Spawn {
        /// Program that was executed
        program: PathBuf,
        /// Reason of the failure
        #[source]
        source: std::io::Error,
    },

    /// A thread relaying the output of the child could not be created
    #[error("Failed to relay the output of the process")]
    Relay(#[source] std::io::Error),

    /// Waiting for the child to exit failed
    #[error("Failed to wait for the process to exit")]
    Wait(#[source] std::io::Error),
}

type RelayHandle = (&'static str, JoinHandle<RelayStats>);

/// Runs a single child process while relaying its output and error streams to ours
#[derive(Clone, Debug)]
pub struct Supervisor {
    drain_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl Supervisor {
    /// Creates a supervisor with the default drain timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long to wait for the output of the child once it has exited.
    ///
    /// The child's streams can outlive it when it leaves processes behind;
    /// whatever they write after this delay is discarded.
    pub fn drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Runs the invocation, relaying to the standard output and error of this process.
    ///
    /// Returns the exit code of the child.
    pub fn run(&self, invocation: &Invocation) -> Result<Code, SuperviseError> {
        self.run_with_sinks(invocation, std::io::stdout(), std::io::stderr())
    }

    /// Runs the invocation, relaying the output and error streams of the child to the given sinks.
    ///
    /// Returns the exit code of the child.
    pub fn run_with_sinks<O, E>(
        &self,
        invocation: &Invocation,
        stdout: O,
        stderr: E,
    ) -> Result<Code, SuperviseError>
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        if !invocation.payload().is_file() {
            return Err(SuperviseError::NotExtracted {
                path: invocation.payload().to_owned(),
            });
        }

        let mut command = invocation.to_command();
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(command = %display_tokens(invocation), "executing");

        let mut child = command.spawn().map_err(|source| SuperviseError::Spawn {
            program: invocation.program().into(),
            source,
        })?;

        let shutdown = Shutdown::new();
        let (done_tx, done_rx) = mpsc::channel();
        let relays = match spawn_relays(&mut child, stdout, stderr, &shutdown, done_tx) {
            Ok(relays) => relays,
            Err(e) => {
                shutdown.signal();
                let _ = child.kill();
                let _ = child.wait();

                return Err(SuperviseError::Relay(e));
            }
        };

        let status = child.wait().map_err(SuperviseError::Wait)?;
        tracing::debug!(%status, "process exited");

        let drained = self.drain(&done_rx, relays.len());
        shutdown.signal();

        for (name, handle) in relays {
            if !drained.contains(&name) {
                tracing::debug!(stream = name, "detaching relay still waiting for output");
                continue;
            }
            match handle.join() {
                Ok(stats) => tracing::debug!(
                    stream = name,
                    bytes = stats.bytes,
                    write_errors = stats.write_errors,
                    "relay joined"
                ),
                Err(_) => tracing::warn!(stream = name, "relay panicked"),
            }
        }

        Ok(exit_code(status))
    }

    /// Waits until `pending` relays report the end of their stream, or until the drain timeout.
    ///
    /// Returns the names of the relays that are done.
    fn drain(&self, done: &Receiver<&'static str>, mut pending: usize) -> Vec<&'static str> {
        let deadline = Instant::now() + self.drain_timeout;
        let mut drained = Vec::with_capacity(pending);

        while pending > 0 {
            match done.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(name) => {
                    drained.push(name);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(
                        pending,
                        "streams still open {}ms after the process exited",
                        self.drain_timeout.as_millis()
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        drained
    }
}

fn spawn_relays<O, E>(
    child: &mut Child,
    stdout: O,
    stderr: E,
    shutdown: &Shutdown,
    done: Sender<&'static str>,
) -> std::io::Result<Vec<RelayHandle>>
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    let mut relays = Vec::with_capacity(2);

    if let Some(source) = child.stdout.take() {
        let handle = Relay::new("stdout", source, stdout).spawn(shutdown.clone(), done.clone())?;
        relays.push(("stdout", handle));
    }
    if let Some(source) = child.stderr.take() {
        let handle = Relay::new("stderr", source, stderr).spawn(shutdown.clone(), done)?;
        relays.push(("stderr", handle));
    }

    Ok(relays)
}

/// Exit code reported for the child, `128 + N` when it was killed by signal `N`
fn exit_code(status: ExitStatus) -> Code {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return Code::new(SIGNAL_EXIT_BASE + signal);
        }
    }

    Code::from_status(status)
}

fn display_tokens(invocation: &Invocation) -> String {
    invocation
        .tokens()
        .map(|token| Path::new(token).display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
