use std::path::Path;

use anyhow::Result;
use clap::Parser;

use codewarden_core::config::WardenConfig;
use codewarden_daemon::cli::DaemonCli;
use codewarden_daemon::logging;
use codewarden_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "codewarden-daemon starting");

    if cli.projects.is_empty() {
        anyhow::bail!("no project directories given");
    }

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    for project in &cli.projects {
        orchestrator.submit(project).await?;
    }

    let report = orchestrator.run().await?;
    let rendered = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    let unsuccessful = report.unsuccessful();
    tracing::info!(
        projects = report.projects.len(),
        unsuccessful = unsuccessful,
        interrupted = report.interrupted,
        "codewarden-daemon shut down"
    );
    if unsuccessful > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Load the config file, falling back to defaults plus environment
/// overrides when the file does not exist.
async fn load_config(path: &Path) -> Result<WardenConfig> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return WardenConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e));
    }

    eprintln!(
        "config file {} not found, using defaults",
        path.display()
    );
    let mut config = WardenConfig::default();
    config.apply_env_overrides();
    Ok(config)
}
