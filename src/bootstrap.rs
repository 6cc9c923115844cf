//! The launch sequence run inside the future tracee.
//!
//! The sequence is strictly linear: disable ASLR, stop, print diagnostics, exec.

use std::convert::Infallible;
use std::io::{self, Write};

use nix::{
    sys::{
        personality::{self, Persona},
        signal::{raise, Signal},
    },
    unistd::execvp,
};
use tracing::{debug, info, warn};

use crate::cmd::Invocation;
use crate::error::{Error, Result};


/// Adds persona flags to the current process, returning the persona now in effect.
pub type PersonaSetter = fn(Persona) -> nix::Result<Persona>;

/// Progress through the launch sequence.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Stage {
    Start,
    AslrDisabled,
    Halted,
    DiagnosticsEmitted,
}

/// Prepares the current process to be traced, then replaces it with the target.
///
/// No `PTRACE_TRACEME` request is made from here. The launcher stops itself with
/// `SIGSTOP`, and the tracer is expected to attach while it is halted.
#[derive(Debug)]
pub struct Bootstrap {
    invocation: Invocation,

    /// Fail the launch if ASLR cannot be disabled. Defaults to `false`.
    strict_aslr: bool,

    /// Defaults to `personality(2)`.
    set_persona: PersonaSetter,

    stage: Stage,
}

impl Bootstrap {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            strict_aslr: false,
            set_persona: add_persona,
            stage: Stage::Start,
        }
    }

    /// Set the value of the `strict_aslr` flag.
    pub fn strict_aslr(mut self, strict_aslr: bool) -> Self {
        self.strict_aslr = strict_aslr;
        self
    }

    /// Replace the call used to add `ADDR_NO_RANDOMIZE` to the persona.
    pub fn persona_setter(mut self, set_persona: PersonaSetter) -> Self {
        self.set_persona = set_persona;
        self
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run every step in order. Only returns if the launch failed.
    pub fn launch(mut self, diagnostics: &mut impl Write) -> Error {
        if let Err(err) = self.disable_aslr() {
            return err;
        }

        if let Err(err) = self.halt() {
            return err;
        }

        if let Err(err) = self.emit_diagnostics(diagnostics) {
            return err;
        }

        match self.replace_image() {
            Ok(never) => match never {},
            Err(err) => err,
        }
    }

    /// Set `ADDR_NO_RANDOMIZE` in the process persona. The persona survives `exec()`, so
    /// the target runs with a deterministic layout too.
    pub fn disable_aslr(&mut self) -> Result<()> {
        self.enter(Stage::Start)?;

        match (self.set_persona)(Persona::ADDR_NO_RANDOMIZE) {
            Ok(persona) => {
                debug!(?persona, "disabled address space randomization");
            },
            Err(source) if !self.strict_aslr => {
                warn!(%source, "unable to disable address space randomization, continuing");
            },
            Err(source) => {
                return Err(Error::Aslr { source });
            },
        }

        self.advance(Stage::AslrDisabled);

        Ok(())
    }

    /// Stop the process with `SIGSTOP`. Returns once some other process resumes it.
    pub fn halt(&mut self) -> Result<()> {
        self.enter(Stage::AslrDisabled)?;

        info!(pid = nix::unistd::getpid().as_raw(), "halting for tracer");
        raise(Signal::SIGSTOP).map_err(|source| Error::Halt { source })?;
        debug!("resumed");

        self.advance(Stage::Halted);

        Ok(())
    }

    /// Write the `Program:`/`Arg:` lines for the invocation to `out`, and flush it.
    ///
    /// Write failures are logged and otherwise ignored: a closed diagnostic stream must
    /// not stop the target from running.
    pub fn emit_diagnostics(&mut self, out: &mut impl Write) -> Result<()> {
        self.enter(Stage::Halted)?;

        if let Err(err) = write_diagnostics(out, &self.invocation) {
            warn!(%err, "unable to write launch diagnostics");
        }

        self.advance(Stage::DiagnosticsEmitted);

        Ok(())
    }

    /// Replace the process image with the target, searching `PATH`. Never returns `Ok`.
    pub fn replace_image(&mut self) -> Result<Infallible> {
        self.enter(Stage::DiagnosticsEmitted)?;

        let target = self.invocation.target();
        info!(program = %target.to_string_lossy(), "executing target");

        let source = match execvp(target, self.invocation.target_argv()) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };

        let target = self.invocation.target_os().to_owned();
        debug!(%source, "exec failed");

        Err(Error::Exec { target, source })
    }

    fn enter(&self, expected: Stage) -> Result<()> {
        if self.stage != expected {
            return Err(Error::OutOfOrder { expected, found: self.stage });
        }

        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "launch stage");
        self.stage = stage;
    }
}

/// Add `flags` to the current persona, returning the persona now in effect.
pub fn add_persona(flags: Persona) -> nix::Result<Persona> {
    let current = personality::get()?;
    personality::set(current | flags)?;

    let updated = personality::get()?;

    // Some kernels silently ignore unknown persona bits.
    if !updated.contains(flags) {
        return Err(nix::errno::Errno::EINVAL);
    }

    Ok(updated)
}

/// Write `Program: <argv0>` followed by one `Arg: <arg>` line per descriptor element.
pub fn write_diagnostics(out: &mut impl Write, invocation: &Invocation) -> io::Result<()> {
    write_line(out, b"Program: ", invocation.program().to_bytes())?;

    for arg in invocation.args() {
        write_line(out, b"Arg: ", arg.to_bytes())?;
    }

    out.flush()
}

fn write_line(out: &mut impl Write, label: &[u8], value: &[u8]) -> io::Result<()> {
    out.write_all(label)?;
    out.write_all(value)?;
    out.write_all(b"\n")
}
