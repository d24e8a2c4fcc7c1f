use put_if_absent::shared::infrastructure::sandbox::docker::DockerSandbox;
use put_if_absent::shell::bootstrap::{DynamoDbConnector, run};
use put_if_absent::shell::config::AppConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, tearing down");
            interrupt.cancel();
        }
    });

    let connector = Arc::new(DynamoDbConnector::new(config.store.clone()));
    match run(&config, Arc::new(DockerSandbox::new()), connector, &cancel).await {
        Ok(report) => {
            for (index, step) in report.steps.iter().enumerate() {
                info!(write = index + 1, key = %step.key, outcome = ?step.outcome, "verified");
            }
            info!(table = %config.table_name, "insert-if-absent contract holds");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run failed");
            Err(e.into())
        }
    }
}
