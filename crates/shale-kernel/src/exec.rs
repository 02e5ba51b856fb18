//! External process execution.
//!
//! The runtime's only blocking operation: the `shell.exec` builtin runs
//! a program through a [`ProcessExecutor`] and blocks until the child
//! exits. The trait exists so embedders and tests can substitute their
//! own execution (or none at all).

use std::io;
use std::process::Command;

/// Trait for running an external program to completion.
pub trait ProcessExecutor {
    /// Run `program` with `args`, blocking until it exits. Returns the
    /// exit code.
    fn run(&mut self, program: &str, args: &[String]) -> io::Result<i32>;
}

/// Default executor backed by `std::process`.
pub struct StdExecutor;

impl ProcessExecutor for StdExecutor {
    fn run(&mut self, program: &str, args: &[String]) -> io::Result<i32> {
        let status = Command::new(program).args(args).status()?;
        Ok(status.code().unwrap_or(1))
    }
}

/// An executor that refuses to run anything. Used in tests and
/// embeddings that disallow subprocess execution.
pub struct NoOpExecutor;

impl ProcessExecutor for NoOpExecutor {
    fn run(&mut self, program: &str, _args: &[String]) -> io::Result<i32> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("process execution is disabled (tried to run `{program}`)"),
        ))
    }
}
