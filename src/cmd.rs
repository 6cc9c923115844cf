use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::error::{Error, Result};


/// Invocation descriptor: the launcher's own argument vector.
///
/// Element 0 names the launcher, element 1 names the target program, and any further
/// elements are the target's own arguments. A `--` in place of the target ends the
/// launcher's own options and is skipped: the target is the element after it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// NUL-terminated arguments, ready for `execvp()`. Kept exactly as received.
    argv: Vec<CString>,

    /// Index of the target in `argv`.
    target: usize,
}

/// Marks the end of launcher options.
pub const SEPARATOR: &[u8] = b"--";

impl Invocation {
    pub fn new(argv: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Result<Self> {
        // Own NUL-terminated strings up front, so the exec step does not allocate.
        let argv: std::result::Result<Vec<_>, _> = argv
            .into_iter()
            .map(CString::new)
            .collect();
        let argv = argv?;

        let target = match argv.get(1) {
            Some(arg) if arg.as_bytes() == SEPARATOR => 2,
            _ => 1,
        };

        if argv.len() <= target {
            return Err(Error::MissingTarget);
        }

        Ok(Self { argv, target })
    }

    /// Build a descriptor from OS strings, as found in the process environment.
    pub fn from_os_args(argv: impl IntoIterator<Item = OsString>) -> Result<Self> {
        Self::new(argv.into_iter().map(OsStringExt::into_vec))
    }

    /// Name the launcher was invoked as.
    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }

    /// Path or name of the program to execute.
    pub fn target(&self) -> &CStr {
        &self.argv[self.target]
    }

    /// Target as an `OsStr`, for error reporting.
    pub fn target_os(&self) -> &OsStr {
        OsStr::from_bytes(self.target().to_bytes())
    }

    /// Every element of the descriptor, in order.
    pub fn args(&self) -> &[CString] {
        &self.argv
    }

    /// Argument vector seen by the target: the descriptor from the target on, so the
    /// target sees its own path as `argv[0]`.
    pub fn target_argv(&self) -> &[CString] {
        &self.argv[self.target..]
    }
}
