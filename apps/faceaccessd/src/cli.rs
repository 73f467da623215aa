use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "faceaccessd",
    version,
    about = "Offline face-recognition access controller daemon"
)]
pub struct Cli {
    /// Path to the YAML configuration document.
    #[arg(long, env = "FACEACCESSD_CONFIG")]
    pub config: PathBuf,

    /// Overrides the config document's `log_level` field.
    #[arg(long, env = "FACEACCESSD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rotating file logs. Stderr-only when omitted.
    #[arg(long, env = "FACEACCESSD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Export up to the 1000 most recent audit records as JSON to this file
    /// and exit, instead of running the service.
    #[arg(long)]
    pub export_logs: Option<PathBuf>,
}
