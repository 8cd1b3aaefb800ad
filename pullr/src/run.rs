use std::path::Path;

use anyhow::Context as _;
use pullr_core::{Arena, Config, ConfigError, FileConfig};

use crate::cli::Cli;
use crate::exit_codes::ExitCode;
use crate::output;

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let file = cli.config.as_deref().and_then(load_file_config);

    let cfg = match Config::resolve(file, cli.overrides()) {
        Ok(cfg) => cfg,
        Err(err @ ConfigError::NoUrls) => {
            eprintln!("{err}; pass --urls or a --config file with a urls list (see --help)");
            return Ok(ExitCode::InvalidConfig);
        }
    };

    output::human::print_run_header(&cfg);

    let report = Arena::new(cfg.clone()).run().await;

    output::human::print_report(&report);

    if cfg.detailed() {
        output::csv::export(&report, Path::new(".")).context("export csv results")?;
    }

    Ok(ExitCode::Success)
}

/// A missing or malformed config file is a notice, not an error; the run
/// falls back to flags and defaults.
fn load_file_config(path: &Path) -> Option<FileConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            println!("error when parsing {}", path.display());
            return None;
        }
    };

    match serde_json::from_str(&text) {
        Ok(cfg) => Some(cfg),
        Err(_) => {
            println!("error when parsing {}", path.display());
            None
        }
    }
}
