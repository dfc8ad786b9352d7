use std::error::Error;

use clap::Parser;

use console::style;

use proc_exit::Code;

mod cli;
mod launcher;
mod logging;

use crate::cli::Args;
use crate::launcher::{LaunchError, Launcher};

fn main() {
    let result = run();

    proc_exit::exit(result);
}

fn run() -> proc_exit::ExitResult {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match cli::unknown_command(&e) {
            Some(command) => {
                report(&LaunchError::UnknownCommand(command));

                return Code::FAILURE.ok();
            }
            None => e.exit(),
        },
    };
    args.apply_color();

    logging::init(args.verbose)
        .map_err(|e| Code::FAILURE.with_message(format!("ERROR: {e:#}")))?;

    let result = match args.print {
        Some(print) => launcher::print(print).map(|()| Code::SUCCESS),
        None => Launcher::from_args(args).and_then(Launcher::run),
    };

    match result {
        Ok(code) => code.ok(),
        Err(e) => {
            report(&e);

            Code::FAILURE.ok()
        }
    }
}

/// Prints the error, its causes and the usage if relevant on stderr
fn report(error: &LaunchError) {
    if !matches!(error, LaunchError::MissingCommand) {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        eprintln!("{} {message}", style("ERROR:").red().bold().for_stderr());
    }

    if error.shows_usage() {
        eprint!("{}", cli::usage());
    }
}
