//! `mri-prep`: 脑肿瘤 MRI 数据集预处理工具.

mod args;
mod result;
mod runner;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::process::ExitCode;

/// 日志级别的环境变量名. 取值同 `log::LevelFilter`, 如 `debug`.
const LOG_ENV: &str = "MRI_PREP_LOG";

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => std::env::var(LOG_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let cli = args::Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(log_level(cli.verbose)).init() {
        eprintln!("mri-prep: cannot install logger: {e}");
    }

    match runner::run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mri-prep: {e}");
            ExitCode::FAILURE
        }
    }
}
