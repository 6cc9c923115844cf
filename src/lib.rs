pub mod bootstrap;
pub mod cmd;
pub mod config;
pub mod error;
pub mod observe;

pub use bootstrap::{Bootstrap, Stage};
pub use cmd::Invocation;
pub use config::Config;
pub use error::Error;
pub use observe::{Finished, Launch, Status};
pub use nix::sys::personality::Persona;
pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;
