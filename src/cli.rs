use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{ColorChoice, ValueEnum};

/// Name of the binary, as shown in the usage
const BIN_NAME: &str = "viewclient";

/// Extracts one of the AndroidViewClient tools and runs it
#[derive(clap::Parser)]
#[command(name = BIN_NAME, version, author, about, long_about = None)]
#[command(
    disable_help_subcommand = true,
    override_usage = "viewclient [OPTIONS] COMMAND [ARGS]..."
)]
pub struct Args {
    /// Archive bundling the tools [default: this executable]
    #[clap(long, value_name = "PATH", env = "VIEWCLIENT_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Keep the extracted tool in the home directory after it exits
    #[clap(long)]
    pub keep: bool,

    /// Milliseconds to wait for the output of the tool once it has exited
    #[clap(
        long,
        value_name = "MS",
        env = "VIEWCLIENT_DRAIN_TIMEOUT_MS",
        default_value_t = 1000
    )]
    pub drain_timeout: u64,

    /// Print diagnostics on stderr
    #[clap(short, long)]
    pub verbose: bool,

    /// Color preferences for program output
    #[clap(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Print information on stdout instead of running a tool
    #[clap(long, value_name = "INFORMATION")]
    pub print: Option<Print>,

    #[command(subcommand)]
    pub tool: Option<ToolCommand>,
}

impl Args {
    /// Returns the archive given on the command line, or the default one if none is provided
    pub fn archive(&self) -> anyhow::Result<Cow<'_, Path>> {
        self.archive.as_deref().map_or_else(
            || default_archive().map(Cow::Owned),
            |archive| Ok(archive.into()),
        )
    }

    /// How long the output of the tool is relayed once it has exited
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout)
    }

    /// Applies the color preferences to everything printed with [`console`]
    pub fn apply_color(&self) {
        match self.color {
            ColorChoice::Never => {
                console::set_colors_enabled(false);
                console::set_colors_enabled_stderr(false);
            }
            ColorChoice::Always => {
                console::set_colors_enabled(true);
                console::set_colors_enabled_stderr(true);
            }
            ColorChoice::Auto => (),
        }
    }
}

/// The archive the tools are extracted from when `--archive` is not given:
/// the path chosen when building the launcher, or the launcher itself.
fn default_archive() -> anyhow::Result<PathBuf> {
    if let Some(archive) = option_env!("VIEWCLIENT_ARCHIVE") {
        return Ok(archive.into());
    }

    std::env::current_exe().context("Failed to locate the running executable")
}

/// Everything from the name of the tool onwards
#[derive(clap::Subcommand)]
pub enum ToolCommand {
    /// The tool to run followed by its arguments, taken verbatim
    #[command(external_subcommand)]
    Run(Vec<OsString>),
}

/// Tools bundled in the archive
#[derive(clap::ValueEnum, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tool {
    /// Dumps the view hierarchy of the screen of a device
    Dump,

    /// Generates scripts and tests by inspecting the screen of a device
    Culebra,
}

impl Tool {
    /// Finds a tool from its name, ignoring case
    pub fn from_name(name: &OsStr) -> Option<Self> {
        let name = name.to_str()?;

        <Self as ValueEnum>::from_str(name, true).ok()
    }

    /// Name of the tool, which is also the name of its entry in `tools/`
    pub fn name(self) -> &'static str {
        match self {
            Self::Dump => "dump",
            Self::Culebra => "culebra",
        }
    }
}

/// Type of information to print on stdout
#[derive(clap::ValueEnum, Clone, Copy)]
pub enum Print {
    /// Prints the list of tools that can be run
    Commands,

    /// Prints the path of the interpreter used to run the tools
    Interpreter,
}

/// Returns the token rejected by the parser when it stands where the command is expected.
///
/// A command starting with a dash is seen as an unknown option, but it is an unknown command.
pub fn unknown_command(error: &clap::Error) -> Option<String> {
    if error.kind() != ErrorKind::UnknownArgument {
        return None;
    }

    match error.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => Some(arg.clone()),
        _ => None,
    }
}

/// Usage shown when the command line is not valid
pub fn usage() -> String {
    let mut usage = format!("usage: {BIN_NAME} [OPTIONS] COMMAND [ARGS]...\n\nCommands:\n");

    for tool in Tool::value_variants() {
        let help = tool
            .to_possible_value()
            .and_then(|value| value.get_help().map(ToString::to_string))
            .unwrap_or_default();
        let _ = writeln!(usage, "  {:<10}{help}", tool.name());
    }

    usage
}
