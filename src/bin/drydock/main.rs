//! Drydock CLI - a build orchestrator for C, C++ and D projects

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drydock::util::config::ConfigStore;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging. --verbose wins, then the environment, then the
    // `log.level` key from the workspace config (default "info").
    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("drydock={}", configured_level())))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::Targets(args) => commands::targets::execute(args),
    }
}

/// The log level this invocation runs at, before any subscriber exists.
/// Outside a workspace the built-in default applies.
fn configured_level() -> String {
    commands::find_workspace_root()
        .ok()
        .and_then(|root| workspace_log_level(&root))
        .unwrap_or_else(|| "info".to_string())
}

/// Read `log.level` from the config layers of the workspace at `root`.
fn workspace_log_level(root: &Path) -> Option<String> {
    let mut config = ConfigStore::with_defaults();
    config.load_standard_layers(root).ok()?;
    config.get_str(&["log", "level"]).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_log_level_reads_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("drydock.toml"),
            "log = { level = \"trace\" }\n",
        )
        .unwrap();

        assert_eq!(workspace_log_level(tmp.path()), Some("trace".to_string()));
    }

    #[test]
    fn test_workspace_log_level_defaults_to_info() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("drydock.toml"), "").unwrap();

        assert_eq!(workspace_log_level(tmp.path()), Some("info".to_string()));
    }
}
