use std::ffi::{NulError, OsString};
use std::io;

use nix::errno::Errno;

use crate::bootstrap::Stage;
use crate::observe::Status;


pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for usage and configuration errors.
pub const EXIT_USAGE: i32 = 2;

/// Exit status when ASLR could not be disabled in strict mode.
pub const EXIT_ASLR: i32 = 3;

/// Exit status when the launcher could not stop itself.
pub const EXIT_HALT: i32 = 4;

/// Exit status when the target exists but could not be executed.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// Exit status when the target could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing target program (usage: tracee-launch <target-path> [target-arg...])")]
    MissingTarget,

    #[error("argument contains an interior NUL byte")]
    Nul(#[from] NulError),

    #[error("invalid value {value:?} for {var}")]
    Config { var: &'static str, value: OsString },

    #[error("could not disable address space randomization")]
    Aslr { source: nix::Error },

    #[error("could not raise SIGSTOP")]
    Halt { source: nix::Error },

    #[error("could not execute {target:?}")]
    Exec { target: OsString, source: nix::Error },

    #[error("launch step entered from stage {found:?}, expected stage {expected:?}")]
    OutOfOrder { expected: Stage, found: Stage },

    #[error("launched process did not halt, saw {status:?}")]
    NotHalted { status: Status },

    #[error("Input/output error")]
    IO(#[from] io::Error),

    #[error("OS error")]
    OS(#[from] nix::Error),
}

impl Error {
    /// Process exit status to report for this error. Never `0`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingTarget | Error::Nul(_) | Error::Config { .. } => EXIT_USAGE,
            Error::Aslr { .. } => EXIT_ASLR,
            Error::Halt { .. } => EXIT_HALT,
            Error::Exec { source, .. } => match source {
                Errno::ENOENT | Errno::ENOTDIR => EXIT_NOT_FOUND,
                _ => EXIT_CANNOT_EXECUTE,
            },
            _ => 1,
        }
    }

    /// Underlying OS error, if the failure came from a system call.
    pub fn os_error(&self) -> Option<nix::Error> {
        match self {
            Error::Aslr { source } |
            Error::Halt { source } |
            Error::Exec { source, .. } |
            Error::OS(source) => Some(*source),
            _ => None,
        }
    }
}
