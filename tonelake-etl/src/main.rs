use mimalloc::MiMalloc;

use tonelake_core::LakeConfig;
use tonelake_etl::EtlError;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("tonelake_etl=info,tonelake_parquet=info,tonelake_storage_aws=info")
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact());

    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}

#[tokio::main]
async fn main() -> Result<(), EtlError> {
    init_logging();

    // Loaded once; configuration and missing-input failures abort the process
    let config = LakeConfig::load()?;

    tonelake_etl::run_pipeline(&config).await
}
