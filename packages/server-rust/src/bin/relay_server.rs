//! `relay-server`: HTTP submission/status API plus the background queue consumer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_server::network::{NetworkConfig, NetworkModule};
use relay_server::queue::InMemoryQueue;
use relay_server::service::{
    MessageHandler, PipelineConfig, Producer, QueueProcessor, StatusQuery,
};
use relay_server::storage::{
    BlobEngine, BlobResultStore, FsBlobEngine, HashMapBlobEngine, InMemorySubjectStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relay-server")]
#[command(about = "Asynchronous request/result relay over an at-least-once queue")]
#[command(version)]
struct Cli {
    /// Bind address
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free port)
    #[arg(long, env = "RELAY_PORT", default_value_t = 8080)]
    port: u16,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "RELAY_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Queue name used in logs
    #[arg(long, env = "RELAY_QUEUE_NAME", default_value = "message")]
    queue_name: String,

    /// Maximum concurrently running message handlers
    #[arg(long, env = "RELAY_MAX_CONCURRENT_HANDLERS", default_value_t = 16)]
    max_concurrent_handlers: usize,

    /// Longest single receive wait in milliseconds
    #[arg(long, env = "RELAY_RECEIVE_WAIT_MS", default_value_t = 1_000)]
    receive_wait_ms: u64,

    /// Grace period for in-flight work on shutdown, in milliseconds
    #[arg(long, env = "RELAY_SHUTDOWN_GRACE_MS", default_value_t = 30_000)]
    shutdown_grace_ms: u64,

    /// Create a placeholder subject when a submission names an unknown one
    #[arg(
        long,
        env = "RELAY_AUTO_CREATE_SUBJECTS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    auto_create_subjects: bool,

    /// Delivery lease duration in milliseconds
    #[arg(long, env = "RELAY_VISIBILITY_TIMEOUT_MS", default_value_t = 30_000)]
    visibility_timeout_ms: u64,

    /// Deliveries after which a message is dead-lettered
    #[arg(long, env = "RELAY_MAX_DELIVERY_COUNT", default_value_t = 10)]
    max_delivery_count: u32,

    /// Directory for result blobs; results stay in memory when unset
    #[arg(long, env = "RELAY_RESULT_DIR")]
    result_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "RELAY_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            drain_timeout: Duration::from_millis(self.shutdown_grace_ms),
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_name: self.queue_name.clone(),
            max_concurrent_handlers: self.max_concurrent_handlers,
            receive_wait_ms: self.receive_wait_ms,
            shutdown_grace_ms: self.shutdown_grace_ms,
            auto_create_subjects: self.auto_create_subjects,
            visibility_timeout_ms: self.visibility_timeout_ms,
            max_delivery_count: self.max_delivery_count,
            result_dir: self.result_dir.clone(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };
}

async fn result_engine(config: &PipelineConfig) -> anyhow::Result<Arc<dyn BlobEngine>> {
    let engine: Arc<dyn BlobEngine> = match &config.result_dir {
        Some(dir) => Arc::new(FsBlobEngine::open(dir.clone()).await?),
        None => Arc::new(HashMapBlobEngine::new()),
    };
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let pipeline = cli.pipeline_config();
    let results = Arc::new(BlobResultStore::new(result_engine(&pipeline).await?));
    info!(engine = results.engine_kind(), "Result store ready");

    let subjects = Arc::new(InMemorySubjectStore::new());
    let queue = Arc::new(InMemoryQueue::new(pipeline.queue_config()));

    let producer = Producer::new(subjects.clone(), queue.clone())
        .with_auto_create_subjects(pipeline.auto_create_subjects);
    let status = StatusQuery::new(results.clone());
    let handler = Arc::new(MessageHandler::new(subjects, results));

    let mut processor =
        QueueProcessor::start(queue.clone(), handler, pipeline.processor_config());

    let mut network =
        NetworkModule::new(cli.network_config(), Arc::new(producer), Arc::new(status));
    let port = network.start().await?;
    info!(port, queue = %pipeline.queue_name, "relay-server started");

    network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    processor.stop().await;
    queue.close();
    info!(
        pending = queue.ready_count(),
        dead_letters = queue.dead_letters().len(),
        "relay-server stopped"
    );
    Ok(())
}
