use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::Result;
use ntest::timeout;
use pretty_assertions::assert_eq;
use tracee_launch::error::{EXIT_CANNOT_EXECUTE, EXIT_NOT_FOUND, EXIT_USAGE};
use tracee_launch::{Launch, Signal, Status};

mod support;
use support::*;

#[test]
#[timeout(5000)]
fn test_target_exit_status_passes_through() -> Result<()> {
    let done = run_halted(launcher(&["sh", "-c", "exit 7"]))?;

    assert_eq!(done.status, Status::Exited(7));

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_target_killed_by_signal() -> Result<()> {
    let done = run_halted(launcher(&["sh", "-c", "kill -TERM $$"]))?;

    assert_eq!(done.status, Status::Signaled { signal: Signal::SIGTERM, core_dumped: false });

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_missing_target_path() -> Result<()> {
    let args = ["/nonexistent/tracee-launch-target"];
    let done = run_halted(launcher(&args))?;

    assert_eq!(done.status, Status::Exited(EXIT_NOT_FOUND));

    let stderr = lines(&done.stderr);
    let diagnostics = expected_diagnostics(&args);
    assert_eq!(&stderr[..diagnostics.len()], &diagnostics[..]);

    let message = &stderr[diagnostics.len()];
    assert!(message.starts_with("tracee-launch: could not execute"), "{}", message);
    assert!(message.contains("/nonexistent/tracee-launch-target"), "{}", message);
    assert!(message.contains("ENOENT"), "{}", message);

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_target_not_on_path() -> Result<()> {
    let done = run_halted(launcher(&["tracee-launch-no-such-program"]))?;

    assert_eq!(done.status, Status::Exited(EXIT_NOT_FOUND));

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_target_not_executable() -> Result<()> {
    let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("tracee-launch-not-executable");
    fs::write(&path, "#!/bin/sh\nexit 0\n")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

    let path = path.to_str().unwrap();
    let done = run_halted(launcher(&[path]))?;

    assert_eq!(done.status, Status::Exited(EXIT_CANNOT_EXECUTE));
    assert!(lines(&done.stderr).last().unwrap().contains("EACCES"));

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_usage_error_does_not_halt() -> Result<()> {
    let mut launch = Launch::spawn(launcher(&[]))?;

    // Argument errors are reported before the self-halt.
    assert_eq!(launch.wait()?, Status::Exited(EXIT_USAGE));

    Ok(())
}

#[test]
#[timeout(5000)]
fn test_bad_config_does_not_halt() -> Result<()> {
    let mut cmd = strict_launcher(&["true"]);
    cmd.env(tracee_launch::config::STRICT_ASLR_VAR, "sometimes");

    let mut launch = Launch::spawn(cmd)?;

    assert_eq!(launch.wait()?, Status::Exited(EXIT_USAGE));

    Ok(())
}
