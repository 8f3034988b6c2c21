//! input-ingress - Replay Tool
//!
//! Plays a JSON script of device frames through the ingestion pipeline and
//! prints the resulting action phase log as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use input_ingress::{config::IngressConfig, logging::init_logging, replay, InputRuntime};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "input-ingress",
    version,
    about = "Replay scripted device input and print action phases"
)]
struct Cli {
    /// Replay script (JSON)
    script: PathBuf,

    /// Config file (TOML); defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Print tick totals and rejected bindings along with the events
    #[arg(long)]
    full: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => IngressConfig::load(path)?,
        None => IngressConfig::load_default_location(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    let _guard = init_logging(&config.logging);

    let content = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Failed to read script {}", cli.script.display()))?;
    let script: replay::ReplayScript = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse script {}", cli.script.display()))?;

    let mut runtime = InputRuntime::new(config)?;
    let output = replay::run(&mut runtime, &script)?;
    tracing::info!(
        "Replayed {} ticks, {} action events",
        output.ticks,
        output.events.len()
    );

    let json = if cli.full {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string_pretty(&output.events)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from([
            "input-ingress",
            "script.json",
            "--log-level",
            "trace",
            "--full",
        ]);
        assert_eq!(cli.script, PathBuf::from("script.json"));
        assert_eq!(cli.log_level.as_deref(), Some("trace"));
        assert!(cli.full);
        assert!(cli.config.is_none());
    }
}
