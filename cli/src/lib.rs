//! Command-line front end for `apicall-core`.
//!
//! One library drives three programs. `apicall` exposes the `auth`,
//! `endpoint`, `rest` and `jsonrpc` subcommands; `restcall` and `jsonrpccall`
//! accept the `rest` and `jsonrpc` grammars at top level. A copy of the
//! `apicall` binary renamed (or linked) to one of the other names behaves
//! like that program.

pub mod args;
pub mod commands;
pub mod config;
pub mod exit;
pub mod logging;

use std::ffi::{OsStr, OsString};
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use crate::args::Invocation;
use crate::commands::Context;
use crate::config::Locator;

pub use logging::init_logging;

/// Which grammar the command line is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Apicall,
    Restcall,
    Jsonrpccall,
}

impl Program {
    /// Pick the program from the basename of `argv[0]`.
    pub fn from_argv0(arg0: &OsStr) -> Self {
        let name = Path::new(arg0).file_stem().and_then(OsStr::to_str);
        match name {
            Some("restcall") => Program::Restcall,
            Some("jsonrpccall") => Program::Jsonrpccall,
            _ => Program::Apicall,
        }
    }
}

/// Output streams of a run.
pub struct Console {
    pub out: Box<dyn Write>,
    pub err: Box<dyn Write>,
    /// Whether `out` is an interactive terminal; decides pretty-printing.
    pub out_is_terminal: bool,
}

impl Console {
    pub fn stdio() -> Self {
        Self {
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            out_is_terminal: io::stdout().is_terminal(),
        }
    }
}

/// Parse `args` (program name first), load the configuration and run the
/// command. Returns the process exit code.
pub fn run<I, T>(program: Program, args: I, console: &mut Console) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let invocation = match args::parse(program, args) {
        Ok(invocation) => invocation,
        Err(err) => return report_parse_error(console, &err),
    };
    let locator = match Locator::from_env() {
        Ok(locator) => locator,
        Err(err) => {
            let _ = writeln!(console.err, "ERROR: {err:#}");
            return exit::FAILED_TO_INIT;
        }
    };
    run_with(invocation, &locator, console)
}

/// Run an already parsed command with the configuration `locator` finds.
pub fn run_with(invocation: Invocation, locator: &Locator, console: &mut Console) -> u8 {
    let (config_path, config) = match config::load_or_default(locator) {
        Ok(loaded) => loaded,
        Err(err) => {
            let _ = writeln!(console.err, "ERROR: {err:#}");
            return exit::FAILED_TO_INIT;
        }
    };
    let mut ctx = Context {
        config,
        config_path,
        console,
    };
    commands::execute(invocation, &mut ctx)
}

fn report_parse_error(console: &mut Console, err: &clap::Error) -> u8 {
    use clap::error::ErrorKind;

    let text = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = console.out.write_all(text.as_bytes());
            exit::OK
        }
        _ => {
            let _ = console.err.write_all(text.as_bytes());
            exit::INVALID_ARGS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_is_chosen_by_basename() {
        assert_eq!(Program::from_argv0(OsStr::new("restcall")), Program::Restcall);
        assert_eq!(
            Program::from_argv0(OsStr::new("/usr/local/bin/jsonrpccall")),
            Program::Jsonrpccall
        );
        assert_eq!(
            Program::from_argv0(OsStr::new("C:/tools/restcall.exe")),
            Program::Restcall
        );
        assert_eq!(Program::from_argv0(OsStr::new("apicall")), Program::Apicall);
        assert_eq!(Program::from_argv0(OsStr::new("anything")), Program::Apicall);
    }
}
