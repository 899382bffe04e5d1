//! Input/Output handling for the CLI.
//!
//! This module provides consistent exit codes for scripting.

pub mod exit_code;

pub use exit_code::ExitCode;
