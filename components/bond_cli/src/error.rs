//! Error types for the CLI

use bytecode_system::ArchiveError;
use core_types::{BondError, Diagnostic};
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Runtime error raised by the VM
    #[error("{0}")]
    Runtime(BondError),

    /// Source failed to compile
    #[error("{}", render_diagnostics(.path, .diagnostics))]
    Compile {
        /// File the diagnostics belong to, if any
        path: Option<PathBuf>,
        /// Every diagnostic of the failed compile
        diagnostics: Vec<Diagnostic>,
    },

    /// File I/O error
    #[error("{}: {source}", .path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be read or written
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Line editor failure
    #[error("REPL error: {0}")]
    Repl(String),
}

impl CliError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }

    /// Text for stderr: runtime errors include their stack trace.
    pub fn report(&self) -> String {
        match self {
            CliError::Runtime(e) => e.report(),
            other => other.to_string(),
        }
    }
}

fn render_diagnostics(path: &Option<PathBuf>, diagnostics: &[Diagnostic]) -> String {
    let prefix = path
        .as_ref()
        .map(|p| format!("{}: ", p.display()))
        .unwrap_or_default();
    diagnostics
        .iter()
        .map(|d| format!("{}{}", prefix, d))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<BondError> for CliError {
    fn from(err: BondError) -> Self {
        CliError::Runtime(err)
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
