use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    catalog::{ConfiguredCatalog, ConfiguredSampling, ModelCatalog},
    cli::commands::WarmCommand,
    config::ServiceConfig,
    model::ModelStore,
    orchestrator::{ChannelOutcomes, Collaborators, Orchestrator, WarmupOutcome},
    session::NoSessions,
};

/// Install the global subscriber. Keep the returned guard alive while
/// logging to a file, or buffered lines are lost.
pub fn init_logging(
    level: &str,
    filter: Option<&str>,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    LogTracer::init().context("Failed to initialize log tracer")?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.parse().unwrap_or(LevelFilter::INFO).into())
        .parse_lossy(filter.unwrap_or_default());

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("localdocs")
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("Failed to open log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

/// Push one document through the pipeline and report how the call ended.
pub async fn handle_warm(cmd: WarmCommand, config: ServiceConfig) -> Result<()> {
    let catalog = ConfiguredCatalog::from_config(&config.models);
    let model = catalog
        .default_model()
        .context("No default model configured (set models.default)")?;
    if !model.is_online {
        bail!(
            "'{}' is a local model; the CLI has no chat session to load it, use a remote model",
            model.display_name()
        );
    }

    let content = tokio::fs::read_to_string(&cmd.file)
        .await
        .with_context(|| format!("Failed to read {}", cmd.file.display()))?;
    info!(
        "Warming '{}' with {} bytes from {}",
        model.display_name(),
        content.len(),
        cmd.file.display()
    );

    let (sink, mut outcomes) = ChannelOutcomes::new();
    let deps = Collaborators {
        catalog: Arc::new(catalog),
        sampling: Arc::new(ConfiguredSampling::from_config(&config.sampling)),
        sessions: Arc::new(NoSessions),
        wait: config.wait,
        remote: config.remote.clone(),
        outcomes: Some(Arc::new(sink)),
    };
    let (orchestrator, handle) = Orchestrator::new(ModelStore::new(), deps, None);
    let task = orchestrator.spawn();

    handle
        .document_processed(&cmd.collection, content)
        .context("Failed to submit document")?;

    let outcome = loop {
        tokio::select! {
            event = outcomes.recv() => match event {
                Some((collection, outcome)) if collection == cmd.collection => break Some(outcome),
                Some(_) => continue,
                None => bail!("Orchestrator stopped before the warm-up finished"),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; waiting for in-flight work");
                break None;
            }
        }
    };

    handle.shutdown().context("Failed to stop orchestrator")?;
    task.await.context("Orchestrator task failed")?;
    match outcome {
        Some(outcome) => report_outcome(&cmd.collection, &outcome),
        None => bail!("Interrupted before collection '{}' was warmed", cmd.collection),
    }
}

fn report_outcome(collection: &str, outcome: &WarmupOutcome) -> Result<()> {
    match outcome {
        WarmupOutcome::Completed { .. } => {
            println!("Collection '{}' is ready", collection);
            Ok(())
        }
        WarmupOutcome::Failed { reason } => {
            bail!("Warm-up for collection '{}' failed: {}", collection, reason)
        }
        WarmupOutcome::Aborted { kind, reason } => bail!(
            "Warm-up for collection '{}' skipped ({:?}): {}",
            collection,
            kind,
            reason
        ),
    }
}

/// Print the effective configuration as TOML
pub fn handle_config(config: &ServiceConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::LoggingArgs;
    use crate::config::ConfigArgs;
    use crate::error::FailureKind;

    fn warm(file: &Path) -> WarmCommand {
        WarmCommand {
            collection: "papers".to_string(),
            file: file.to_path_buf(),
            config: ConfigArgs::default(),
            logging: LoggingArgs::default(),
        }
    }

    #[tokio::test]
    async fn test_warm_rejects_local_default_model() {
        let config = ServiceConfig::from_toml(
            r#"
            [models]
            default = "orca"

            [[models.entries]]
            id = "orca"
            filename = "orca-mini.gguf"
            "#,
        )
        .unwrap();

        let err = handle_warm(warm(Path::new("missing.txt")), config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("local model"), "{}", err);
    }

    #[tokio::test]
    async fn test_warm_fails_when_remote_model_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "full text").unwrap();
        let config = ServiceConfig::from_toml(&format!(
            r#"
            [models]
            dir = "{}"
            default = "remote"

            [[models.entries]]
            id = "remote"
            filename = "api.rmodel"
            is_online = true
            is_compatible_api = true
            "#,
            dir.path().display()
        ))
        .unwrap();

        let err = handle_warm(warm(&doc), config).await.unwrap_err();
        assert!(err.to_string().contains("skipped"), "{}", err);
        assert!(err.to_string().contains("Configuration"), "{}", err);
    }

    #[test]
    fn test_only_completed_outcome_reports_ready() {
        assert!(report_outcome(
            "papers",
            &WarmupOutcome::Completed {
                response: "ok".into()
            }
        )
        .is_ok());

        let err = report_outcome(
            "papers",
            &WarmupOutcome::Failed {
                reason: "inference worker panicked".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed"));

        let err = report_outcome(
            "papers",
            &WarmupOutcome::Aborted {
                kind: FailureKind::Contention,
                reason: "No interactive session available to load 'Orca'".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("Contention"));
    }
}
