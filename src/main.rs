use std::convert::Infallible;
use std::env;
use std::ffi::OsString;
use std::io;
use std::process;

use structopt::clap::{AppSettings, ErrorKind};
use structopt::StructOpt;

use tracee_launch::error::{Result, EXIT_USAGE};
use tracee_launch::{Bootstrap, Config, Error, Invocation};


/// Stop, then run a program with address space randomization disabled.
///
/// The launcher raises SIGSTOP on itself before doing anything else, so that a tracer can
/// attach. Once resumed, it prints its arguments to stderr and executes the target.
///
/// Set TRACEE_LAUNCH_LOG to a tracing filter (e.g. `debug`) to log the launch, and
/// TRACEE_LAUNCH_STRICT_ASLR=1 to fail if ASLR cannot be disabled.
#[derive(Debug, StructOpt)]
#[structopt(name = "tracee-launch", setting = AppSettings::TrailingVarArg)]
struct Opt {
    /// Target program, searched for in PATH, followed by its own arguments
    #[allow(dead_code)]
    #[structopt(name = "TARGET", required = true, min_values = 1, parse(from_os_str))]
    argv: Vec<OsString>,
}

fn main() {
    // The descriptor is the argv as received. The parsed options only decide whether to
    // print help or a usage error.
    let argv: Vec<OsString> = env::args_os().collect();

    match Opt::from_iter_safe(argv.iter().cloned()) {
        Ok(_) => {},
        Err(err) => match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => err.exit(),
            _ => {
                eprintln!("{}", err.message);
                process::exit(EXIT_USAGE);
            },
        },
    };

    let err = match launch(argv) {
        Ok(never) => match never {},
        Err(err) => err,
    };

    report(&err);
    process::exit(err.exit_code());
}

fn launch(argv: Vec<OsString>) -> Result<Infallible> {
    let config = Config::from_env()?;
    config.init_logging()?;

    let invocation = Invocation::from_os_args(argv)?;
    let bootstrap = Bootstrap::new(invocation).strict_aslr(config.strict_aslr);

    let mut diagnostics = io::stderr().lock();

    Err(bootstrap.launch(&mut diagnostics))
}

fn report(err: &Error) {
    match err.os_error() {
        Some(errno) => eprintln!("tracee-launch: {err}: {errno}"),
        None => eprintln!("tracee-launch: {err}"),
    }
}
