use std::env;
use std::process::ExitCode;

use apicall::{init_logging, run, Console, Program};

fn main() -> ExitCode {
    init_logging();
    ExitCode::from(run(Program::Restcall, env::args_os(), &mut Console::stdio()))
}
