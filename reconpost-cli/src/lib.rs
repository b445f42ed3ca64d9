//! reconpost CLI library: argument parsing, command handlers, and output rendering.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
