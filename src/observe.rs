//! Parent-side view of a launched process.
//!
//! The launcher halts itself before printing anything. A parent uses [`Launch`] to spawn
//! it, wait for that halt, inspect or attach to the stopped process, and resume it.

use std::fs;
use std::io::{self, Read};
use std::process::{Child, Command};
use std::thread;

use nix::{
    errno::Errno,
    sys::{
        personality::Persona,
        signal::{kill, Signal},
        wait::{waitpid, WaitPidFlag, WaitStatus},
    },
    unistd::Pid,
};
use tracing::{debug, info};

use crate::error::{Error, Result};


/// State change of a launched process, as reported by `waitpid()` with `WUNTRACED`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Halted(Signal),
    Exited(i32),
    Signaled {
        signal: Signal,
        core_dumped: bool,
    },
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Halted(_))
    }
}

/// Status and captured output of a launched process.
///
/// Output is only collected once the process terminates. For a [`Status::Halted`] result
/// both buffers are empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Finished {
    pub status: Status,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

type Reader = thread::JoinHandle<io::Result<Vec<u8>>>;

/// A spawned launcher process.
#[derive(Debug)]
pub struct Launch {
    child: Child,

    // Drain piped output while waiting, so a chatty target cannot block on a full pipe.
    stdout: Option<Reader>,
    stderr: Option<Reader>,
}

impl Launch {
    /// Spawn `cmd`, which is expected to run the launcher.
    pub fn spawn(mut cmd: Command) -> Result<Self> {
        let child = cmd.spawn()?;
        info!(pid = child.id(), "spawned launcher");

        Ok(Self { child, stdout: None, stderr: None })
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Block until the process stops or terminates.
    pub fn wait(&mut self) -> Result<Status> {
        let pid = self.pid();

        loop {
            let status = match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            };

            debug!(?status, "launcher status");

            let status = match status {
                WaitStatus::Stopped(_, signal) => Status::Halted(signal),
                WaitStatus::Exited(_, code) => Status::Exited(code),
                WaitStatus::Signaled(_, signal, core_dumped) => Status::Signaled { signal, core_dumped },

                // Only reported to a tracer or with `WCONTINUED`/`WNOHANG`.
                _ => continue,
            };

            return Ok(status);
        }
    }

    /// Wait for the launcher's `SIGSTOP` self-halt.
    pub fn wait_halted(&mut self) -> Result<()> {
        match self.wait()? {
            Status::Halted(Signal::SIGSTOP) => Ok(()),
            status => Err(Error::NotHalted { status }),
        }
    }

    /// Continue a halted launcher with `SIGCONT`.
    pub fn resume(&mut self) -> Result<()> {
        let pid = self.pid();
        info!(pid = pid.as_raw(), "resuming launcher");

        kill(pid, Signal::SIGCONT)?;

        Ok(())
    }

    /// Wait for the process to terminate, and collect any piped output.
    ///
    /// Call this after [`Launch::resume()`]. If the process stops again, the
    /// [`Status::Halted`] result is returned and `self` stays usable: resume it and call
    /// `finish()` again.
    pub fn finish(&mut self) -> Result<Finished> {
        if self.stdout.is_none() {
            self.stdout = self.child.stdout.take().map(drain);
        }

        if self.stderr.is_none() {
            self.stderr = self.child.stderr.take().map(drain);
        }

        let status = self.wait()?;

        if !status.is_terminal() {
            return Ok(Finished { status, stdout: vec![], stderr: vec![] });
        }

        let stdout = join(self.stdout.take())?;
        let stderr = join(self.stderr.take())?;

        Ok(Finished { status, stdout, stderr })
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> Reader {
    thread::spawn(move || {
        let mut buf = vec![];
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join(reader: Option<Reader>) -> Result<Vec<u8>> {
    let reader = match reader {
        Some(reader) => reader,
        None => return Ok(vec![]),
    };

    let buf = reader.join().map_err(|_| {
        io::Error::new(io::ErrorKind::Other, "output reader panicked")
    })??;

    Ok(buf)
}

/// Read the persona of process `pid` from `/proc/<pid>/personality`.
pub fn persona(pid: Pid) -> Result<Persona> {
    let text = fs::read_to_string(format!("/proc/{}/personality", pid))?;

    let raw = i32::from_str_radix(text.trim(), 16).map_err(|err| {
        io::Error::new(io::ErrorKind::InvalidData, err)
    })?;

    Ok(Persona::from_bits_truncate(raw))
}

/// Scheduler state letter of process `pid` from `/proc/<pid>/stat`, e.g. `T` if stopped.
pub fn process_state(pid: Pid) -> Result<char> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid))?;

    // The command name is parenthesized and may itself contain spaces or parens.
    let state = stat
        .rfind(')')
        .and_then(|end| stat[end + 1..].trim_start().chars().next());

    state.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "malformed /proc stat").into()
    })
}
