use std::path::PathBuf;
use std::process::Command;

use structopt::StructOpt;
use tracee_launch::observe::{persona, process_state};
use tracee_launch::{Launch, Persona};


/// Run a program under `tracee-launch`, inspect it while halted, then let it run.
#[derive(Debug, StructOpt)]
#[structopt(setting = structopt::clap::AppSettings::TrailingVarArg)]
struct Opt {
    /// Path to the `tracee-launch` binary
    #[structopt(short, long, default_value = "target/debug/tracee-launch", parse(from_os_str))]
    launcher: PathBuf,

    /// Target program and its arguments
    #[structopt(required = true, min_values = 1)]
    argv: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let mut cmd = Command::new(&opt.launcher);
    cmd.args(&opt.argv);

    let mut launch = Launch::spawn(cmd)?;
    launch.wait_halted()?;

    let pid = launch.pid();
    let aslr = if persona(pid)?.contains(Persona::ADDR_NO_RANDOMIZE) { "off" } else { "on" };

    println!("pid = {}, state = {}, aslr = {}", pid, process_state(pid)?, aslr);
    println!("attach now, or press enter to resume");

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    launch.resume()?;
    let done = launch.finish()?;

    println!("status = {:?}", done.status);

    Ok(())
}
