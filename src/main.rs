use std::path::PathBuf;
use std::process::exit;

use loxide as lox;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;

use lox::lox::Lox;

/// Tree-walking interpreter for the Lox language.
///
/// With a script path, executes the file; without one, starts an
/// interactive prompt.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a Lox script to execute.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{}", e);
            exit(0);
        }

        // Anything else (extra arguments, unknown flags) is a usage error.
        Err(e) => {
            print!("{}", e);
            exit(64);
        }
    };

    let mut lox = Lox::new();

    match args.script {
        Some(path) => {
            lox.run_file(&path)?;

            if lox.had_error() {
                exit(65);
            }

            if lox.had_runtime_error() {
                exit(70);
            }
        }

        None => lox.run_prompt()?,
    }

    Ok(())
}
