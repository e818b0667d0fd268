//! Command line arguments

use clap::{Parser, Subcommand};
use interpreter::{ContextConfig, GC_LIMIT_ENV, LIB_PATH_ENV};
use std::path::PathBuf;

/// Run Bond scripts and archives, or start an interactive session.
#[derive(Debug, Parser)]
#[command(name = "bond", version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Script (`.bd`) or archive (`.bar`) to run
    pub file: Option<PathBuf>,

    /// Evaluate CODE instead of reading a file
    #[arg(short, long, value_name = "CODE", conflicts_with = "file")]
    pub eval: Option<String>,

    /// Start the interactive REPL (the default without arguments)
    #[arg(short, long)]
    pub repl: bool,

    /// Print the compiled bytecode instead of running it
    #[arg(long)]
    pub disassemble: bool,

    /// Directory searched first for imports
    #[arg(long, env = LIB_PATH_ENV, value_name = "DIR", global = true)]
    pub lib_path: Option<PathBuf>,

    /// Initial garbage collector allocation threshold
    #[arg(long, env = GC_LIMIT_ENV, value_name = "OBJECTS", global = true)]
    pub gc_limit: Option<usize>,

    /// Log debug events to stderr (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Compile a script and every script it imports into a `.bar` archive
    Build {
        /// Entry script
        file: PathBuf,
        /// Output archive (defaults to FILE with a `.bar` extension)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
}

/// What a parsed command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Repl,
    Eval(String),
    Run(PathBuf),
    Disassemble(PathBuf),
    Build { file: PathBuf, output: PathBuf },
}

impl Cli {
    /// Resolve the flags into a single mode.
    pub fn mode(&self) -> Mode {
        if let Some(Command::Build { file, output }) = &self.command {
            let output = output
                .clone()
                .unwrap_or_else(|| file.with_extension("bar"));
            return Mode::Build {
                file: file.clone(),
                output,
            };
        }
        if let Some(code) = &self.eval {
            return Mode::Eval(code.clone());
        }
        match &self.file {
            Some(file) if self.disassemble => Mode::Disassemble(file.clone()),
            Some(file) if !self.repl => Mode::Run(file.clone()),
            _ => Mode::Repl,
        }
    }

    /// Context configuration: flags and their env vars over the defaults.
    pub fn context_config(&self) -> ContextConfig {
        let mut config = ContextConfig::new();
        if let Some(path) = &self.lib_path {
            config = config.with_lib_path(path);
        }
        if let Some(limit) = self.gc_limit {
            config = config.with_allocation_limit(limit);
        }
        config
    }
}
