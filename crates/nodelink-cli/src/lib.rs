//! nodelink CLI library
//!
//! Argument parsing, terminal output and the subcommands behind the
//! `nodelink` binary.

pub mod cli;
pub mod commands;
pub mod console;
