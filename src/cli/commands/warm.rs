use clap::Args;
use std::path::PathBuf;

use super::config::LoggingArgs;
use crate::config::ConfigArgs;

/// Run one document through the warm-up pipeline
#[derive(Debug, Args)]
pub struct WarmCommand {
    /// Collection the document belongs to
    #[arg(long, default_value = "default")]
    pub collection: String,

    /// Document whose full text is sent to the model
    pub file: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}
