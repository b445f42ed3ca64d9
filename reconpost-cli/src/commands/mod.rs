//! Command handlers -- one module per subcommand

pub mod config;
pub mod modules;
pub mod scan;
