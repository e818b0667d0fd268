//! `bond` entry point
//!
//! Parses arguments, sets up logging and dispatches to the runtime.

use bond_cli::repl::run_repl;
use bond_cli::{ArchiveBuilder, Cli, CliResult, Mode, Runtime};
use clap::Parser as ClapParser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> CliResult<()> {
    let config = cli.context_config();
    match cli.mode() {
        Mode::Build { file, output } => {
            let written = ArchiveBuilder::new(config.lib_path).build_to(&file, &output)?;
            println!("wrote {}", written.display());
        }
        Mode::Eval(code) => {
            if let Some(result) = Runtime::new(config).eval(&code)? {
                println!("{}", result);
            }
        }
        Mode::Run(file) => Runtime::new(config).run_file(&file)?,
        Mode::Disassemble(file) => print!("{}", Runtime::new(config).disassemble_file(&file)?),
        Mode::Repl => run_repl(&mut Runtime::new(config))?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::FAILURE
        }
    }
}
