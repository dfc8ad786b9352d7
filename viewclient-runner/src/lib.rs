//! Extracts a tool script from the AndroidViewClient archive and runs it.
//!
//! The flow is always the same for a single invocation:
//!
//! 1. [`SelfArchive::open`] the archive the launcher was shipped in,
//! 2. [`Payload::extract`] the `tools/<name>` entry into the home directory,
//! 3. [`InterpreterLocator::locate`] `monkeyrunner` on the search path,
//! 4. [`InvocationBuilder::build`] the command line,
//! 5. [`Supervisor::run`] the child while relaying its output, and return its exit code.
mod archive;
mod executable;
mod extract;
mod interpreter;
mod invocation;
mod platform;
mod relay;
mod supervisor;

pub use archive::SelfArchive;
pub use extract::{ExtractError, ExtractedPayload, Payload, Retention};
pub use interpreter::InterpreterLocator;
pub use invocation::{BuildError, Invocation, InvocationBuilder};
pub use platform::Platform;
pub use relay::{Relay, RelayStats, Shutdown};
pub use supervisor::{SuperviseError, Supervisor};
