use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use jackc::driver::{self, Config, Emit};

#[derive(Parser, Debug)]
#[command(version, about = "Compile Jack classes to VM code")]
struct Args {
    /// A `.jack` file, or a directory of them
    path: PathBuf,

    /// What to write for each class
    #[arg(long, value_enum, default_value_t = Emit::Vm)]
    emit: Emit,

    /// Write outputs here instead of next to the sources
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config {
        input: args.path,
        emit: args.emit,
        out_dir: args.out_dir,
    };

    let reports = match driver::run(&config) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{}: {e}", config.input.display());
            return ExitCode::FAILURE;
        }
    };
    if reports.is_empty() {
        log::error!("no .jack files in {}", config.input.display());
        return ExitCode::FAILURE;
    }

    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(out) => log::info!("{} -> {}", report.source.display(), out.display()),
            Err(e) => {
                log::error!("{}: {e}", report.source.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        log::error!("{failed} of {} classes failed", reports.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
