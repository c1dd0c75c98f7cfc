use std::env;
use std::process::ExitCode;

use apicall::{init_logging, run, Console, Program};

fn main() -> ExitCode {
    init_logging();
    let args: Vec<_> = env::args_os().collect();
    let program = args
        .first()
        .map(|arg0| Program::from_argv0(arg0))
        .unwrap_or(Program::Apicall);
    ExitCode::from(run(program, args, &mut Console::stdio()))
}
