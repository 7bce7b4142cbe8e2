//! Pipeline driver.
//!
//! Entry-point order: build storage handles for the configured roots, run the
//! Song Catalog Transform, then the Activity Log Transform (which performs
//! Fact Assembly against the catalog batch). Fatal errors propagate out
//! uncaught; a failed run is re-executed in full, never resumed.

use std::sync::Arc;
use std::time::Instant;

use tonelake_core::{FileStorage, LakeConfig, Storage};
use tonelake_storage_aws::S3Storage;
use tracing::info;

use crate::error::Result;
use crate::transform::{activity, song_catalog};

/// Build a storage handle for a root: `s3://` URIs get the S3 backend,
/// anything else is a local directory.
pub async fn storage_for_root(
    root: &str,
    aws: Option<&tonelake_core::AwsConfig>,
) -> Result<Arc<dyn Storage>> {
    if root.starts_with("s3://") || root.starts_with("s3a://") {
        Ok(Arc::new(S3Storage::for_root(root, aws).await?))
    } else {
        Ok(Arc::new(FileStorage::new(root)))
    }
}

/// Run the full pipeline against the configured storage roots.
pub async fn run_pipeline(config: &LakeConfig) -> Result<()> {
    let input = storage_for_root(&config.input_data, config.aws.as_ref()).await?;
    let output = storage_for_root(&config.output_data, config.aws.as_ref()).await?;
    run_pipeline_with(input.as_ref(), output.as_ref()).await
}

/// Run the full pipeline against explicit storage handles.
pub async fn run_pipeline_with(input: &dyn Storage, output: &dyn Storage) -> Result<()> {
    let started = Instant::now();

    let catalog = song_catalog::run(input, output).await?;
    activity::run(input, output, &catalog).await?;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline complete"
    );
    Ok(())
}
