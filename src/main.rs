use minio_template::{init_storage, Config, StorageTemplate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let Some(storage) = init_storage(&config.minio).await? else {
        tracing::info!("Nothing to do, storage is disabled");
        return Ok(());
    };

    let buckets = storage.get_all_buckets().await?;
    tracing::info!("{} bucket(s) visible to the configured credentials", buckets.len());
    for bucket in &buckets {
        tracing::info!("bucket: {}", serde_json::to_string(bucket)?);
    }

    let keys = storage.list_objects(storage.default_bucket()).await?;
    tracing::info!(
        "Default bucket '{}' holds {} object(s)",
        storage.default_bucket(),
        keys.len()
    );

    Ok(())
}
