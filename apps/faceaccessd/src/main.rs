use anyhow::{Context, Result};
use clap::Parser;
use faceaccessd::cli::Cli;
use faceaccessd::{bootstrap, kernel, logging};
use faceaccess_models::config::AppConfig;
use faceaccess_store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let _logging_guard = logging::init_tracing(&level, cli.log_dir.as_deref());

    if let Some(export_path) = &cli.export_logs {
        return export_audit_logs(&config, export_path).await;
    }

    let components = bootstrap::build(&config)
        .await
        .context("failed to bootstrap faceaccessd components")?;

    kernel::run(components).await
}

async fn export_audit_logs(config: &AppConfig, export_path: &std::path::Path) -> Result<()> {
    let store = Store::open(&config.database.path)
        .await
        .context("failed to open store for log export")?;
    let records = store
        .get_audit_logs(None, None, None, 1000)
        .await
        .context("failed to read audit logs")?;

    let json = serde_json::to_vec_pretty(&records).context("failed to serialize audit logs")?;
    tokio::fs::write(export_path, json)
        .await
        .with_context(|| format!("failed to write {}", export_path.display()))?;

    tracing::info!(count = records.len(), path = %export_path.display(), "exported audit logs");
    Ok(())
}
