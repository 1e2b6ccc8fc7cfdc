//! Subprocess execution: static argument vectors only, never a shell string.

pub mod exec;

pub use exec::{ExecCommand, Output};
