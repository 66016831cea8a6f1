use std::path::PathBuf;
use std::process::ExitCode;

use env_logger::{Builder, Env};
use particle_field::app::{self, AppOptions};

const USAGE: &str = "usage: particle-field [--preset ID] [--config-dir DIR] [--seed N]";

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<AppOptions, String> {
    let mut options = AppOptions::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--preset" => options.preset = Some(value("--preset")?),
            "--config-dir" => options.config_dir = Some(PathBuf::from(value("--config-dir")?)),
            "--seed" => {
                let raw = value("--seed")?;
                options.seed = raw.parse().map_err(|_| format!("invalid seed '{}'", raw))?;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument '{}'\n{}", other, USAGE)),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    match app::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
