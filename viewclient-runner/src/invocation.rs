use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::platform::Platform;

/// Flag telling the interpreter to load the archive as a plugin
const PLUGIN_FLAG: &str = "-plugin";

/// Failure to build a command line able to run a tool
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Without interpreter the tool must run on its own, which requires shebang support
    #[error(
        "monkeyrunner was not found and {platform} does not support shebang in scripts. Aborting."
    )]
    ShebangUnsupported {
        /// Platform the tool was supposed to run on
        platform: Platform,
    },
}

/// Command line running an extracted tool
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Invocation {
    pub(crate) program: OsString,
    pub(crate) args: Vec<OsString>,
    pub(crate) payload: PathBuf,
}

impl Invocation {
    /// Program to execute: the interpreter, or the tool itself
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments given to the program
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Path of the extracted tool this command runs
    pub fn payload(&self) -> &Path {
        &self.payload
    }

    /// Every token of the command line, starting with the program
    pub fn tokens(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }

    /// Creates the [`Command`] to spawn, without any redirection
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        command
    }
}

/// Assembles the command line of a tool.
///
/// When an interpreter is known the command is
/// `<interpreter> -plugin <archive> <tool> [ARGS]...`, otherwise the tool is executed
/// directly as `<tool> [ARGS]...` and relies on its `#!` line.
#[derive(Clone, Debug)]
pub struct InvocationBuilder {
    payload: PathBuf,
    archive: PathBuf,
    interpreter: Option<PathBuf>,
    args: Vec<OsString>,
    platform: Platform,
}

impl InvocationBuilder {
    /// Starts a command line for the tool extracted at `payload` out of `archive`
    pub fn new(payload: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        Self {
            payload: payload.into(),
            archive: archive.into(),
            interpreter: None,
            args: Vec::new(),
            platform: Platform::current(),
        }
    }

    /// Sets the interpreter that runs the tool, if any
    pub fn interpreter(mut self, interpreter: impl Into<Option<PathBuf>>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Appends arguments forwarded verbatim to the tool
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the platform the command runs on
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Builds the command line
    pub fn build(self) -> Result<Invocation, BuildError> {
        let (program, mut args) = match self.interpreter {
            Some(interpreter) => (
                interpreter.into_os_string(),
                vec![
                    PLUGIN_FLAG.into(),
                    self.archive.into_os_string(),
                    self.payload.clone().into_os_string(),
                ],
            ),
            None if !self.platform.supports_shebang() => {
                return Err(BuildError::ShebangUnsupported {
                    platform: self.platform,
                });
            }
            None => (self.payload.clone().into_os_string(), Vec::new()),
        };
        args.extend(self.args);

        Ok(Invocation {
            program,
            args,
            payload: self.payload,
        })
    }
}
