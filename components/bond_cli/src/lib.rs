//! Bond command line library
//!
//! Provides the [`Runtime`] session and supporting modules for the `bond`
//! binary: argument parsing, script and archive execution, the archive
//! builder and the REPL.

#![warn(clippy::all)]

pub mod builder;
pub mod cli;
pub mod error;
pub mod repl;
pub mod runtime;

pub use builder::ArchiveBuilder;
pub use cli::{Cli, Command, Mode};
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
