use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;

use proc_exit::Code;

use viewclient_runner::{
    BuildError, ExtractError, InterpreterLocator, InvocationBuilder, Payload, Platform, Retention,
    SelfArchive, SuperviseError, Supervisor,
};

use crate::cli::{Args, Print, Tool, ToolCommand};

/// Fatal condition, the launcher exits with a failure once it is reported
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// No tool was named on the command line
    #[error("No command given")]
    MissingCommand,

    /// The named tool is not bundled
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),

    /// The interpreter was requested but is not in the search path
    #[error("monkeyrunner was not found in the search path")]
    InterpreterNotFound,

    /// The tool could not be extracted
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The tool cannot be run on this platform
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The tool could not be run to completion
    #[error(transparent)]
    Supervise(#[from] SuperviseError),

    /// The home directory or the archive could not be found
    #[error(transparent)]
    Environment(#[from] anyhow::Error),
}

impl LaunchError {
    /// Whether the usage should be shown along with the error
    pub fn shows_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingCommand
                | Self::UnknownCommand(_)
                | Self::Extract(ExtractError::NotAnArchive { .. })
        )
    }
}

/// Runs one tool from the archive, from extraction to exit
pub struct Launcher {
    tool: Tool,
    args: Vec<OsString>,
    archive: PathBuf,
    home: PathBuf,
    retention: Retention,
    platform: Platform,
    supervisor: Supervisor,
}

impl Launcher {
    /// Resolves the tool, its arguments and where to extract it from the command line
    pub fn from_args(args: Args) -> Result<Self, LaunchError> {
        let Some(ToolCommand::Run(command)) = &args.tool else {
            return Err(LaunchError::MissingCommand);
        };
        let mut command = command.iter();
        let name = command.next().ok_or(LaunchError::MissingCommand)?;
        let tool = Tool::from_name(name)
            .ok_or_else(|| LaunchError::UnknownCommand(name.to_string_lossy().into_owned()))?;
        let tool_args = command.cloned().collect();

        tracing::debug!(tool = tool.name(), "selected tool");

        let archive = args.archive()?.into_owned();
        let home = dirs::home_dir().context("Failed to find the home directory")?;
        let retention = if args.keep {
            Retention::Keep
        } else {
            Retention::Delete
        };
        let supervisor = Supervisor::new().drain_timeout(args.drain_timeout());

        Ok(Self {
            tool,
            args: tool_args,
            archive,
            home,
            retention,
            platform: Platform::current(),
            supervisor,
        })
    }

    /// Extracts the tool, runs it and returns its exit code.
    ///
    /// Unless kept, the extracted tool is removed before returning.
    pub fn run(self) -> Result<Code, LaunchError> {
        let mut archive = SelfArchive::open(&self.archive)?;
        let payload =
            Payload::new(self.tool.name()).extract(&mut archive, &self.home, self.retention)?;

        let interpreter = InterpreterLocator::from_env(self.platform).locate();
        let invocation = InvocationBuilder::new(payload.path(), archive.path())
            .interpreter(interpreter)
            .args(self.args)
            .platform(self.platform)
            .build()?;

        let code = self.supervisor.run(&invocation)?;
        tracing::debug!(code = code.as_raw(), "tool exited");

        Ok(code)
    }
}

/// Prints the requested information on stdout
pub fn print(print: Print) -> Result<(), LaunchError> {
    match print {
        Print::Commands => {
            for tool in <Tool as clap::ValueEnum>::value_variants() {
                println!("{}", tool.name());
            }
        }
        Print::Interpreter => {
            let interpreter = InterpreterLocator::from_env(Platform::current())
                .locate()
                .ok_or(LaunchError::InterpreterNotFound)?;
            println!("{}", interpreter.display());
        }
    }

    Ok(())
}
