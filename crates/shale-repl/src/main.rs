//! shale CLI entry point.
//!
//! Usage:
//!   shale                  # Interactive REPL
//!   shale -c <code>        # Evaluate a snippet and exit
//!   shale script.shale     # Run a script file

use std::env;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shale_kernel::Session;

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            shale_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("shale {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let code = args.get(2).context("-c requires a code argument")?;
            let mut session = Session::new().context("failed to create session")?;
            match session.eval_source(code) {
                Ok(value) => {
                    let rendered = shale_repl::format_value(&value);
                    if !rendered.is_empty() {
                        println!("{rendered}");
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Some(path) => run_script(Path::new(path)),
    }
}

fn run_script(path: &Path) -> Result<ExitCode> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut session = Session::new().context("failed to create session")?;
    session.set_source_path(path);
    match session.run_script(&source) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        "shale — an embeddable shell-scripting language

Usage:
  shale                  Interactive REPL
  shale -c <code>        Evaluate a snippet and exit
  shale <script.shale>   Run a script file
  shale --help           Show this help
  shale --version        Show version"
    );
}
