use std::process::{Command, Stdio};

use anyhow::Result;
use tracee_launch::config::{LOG_VAR, STRICT_ASLR_VAR};
use tracee_launch::{Finished, Launch};

/// Path of the launcher binary under test. Also its `argv[0]`.
pub const LAUNCHER: &str = env!("CARGO_BIN_EXE_tracee-launch");

/// Launcher command for `args`, with stdout and stderr captured.
pub fn launcher(args: &[&str]) -> Command {
    let mut cmd = Command::new(LAUNCHER);
    cmd.args(args)
        .env_remove(LOG_VAR)
        .env_remove(STRICT_ASLR_VAR)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Same as [`launcher()`], but make failure to disable ASLR fatal.
#[allow(unused)]
pub fn strict_launcher(args: &[&str]) -> Command {
    let mut cmd = launcher(args);
    cmd.env(STRICT_ASLR_VAR, "1");
    cmd
}

/// Spawn `cmd`, wait for its self-halt, resume it, and collect its output.
#[allow(unused)]
pub fn run_halted(cmd: Command) -> Result<Finished> {
    let mut launch = Launch::spawn(cmd)?;
    launch.wait_halted()?;
    launch.resume()?;

    Ok(launch.finish()?)
}

/// Diagnostic lines expected for a launcher run with `args`.
#[allow(unused)]
pub fn expected_diagnostics(args: &[&str]) -> Vec<String> {
    let mut lines = vec![format!("Program: {LAUNCHER}"), format!("Arg: {LAUNCHER}")];

    for arg in args {
        lines.push(format!("Arg: {arg}"));
    }

    lines
}

#[allow(unused)]
pub fn lines(output: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(output)
        .lines()
        .map(str::to_owned)
        .collect()
}
