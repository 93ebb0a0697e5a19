pub mod config;
pub mod ingest;
pub mod observability;
pub mod pipeline;
pub mod sink;
pub mod storage;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::Settings;
use crate::observability::MetricsRegistry;
use crate::pipeline::{Pipeline, PipelineOptions, RunSummary};
use crate::sink::{DEFAULT_CAPACITY, OutputSink};
use crate::storage::{LocalStore, ObjectStore, S3Store};

/// Build the storage client the settings ask for: a local directory tree
/// when `local_root` is set, S3 otherwise.
pub async fn open_store(settings: &Settings) -> Arc<dyn ObjectStore> {
	match &settings.local_root {
		Some(root) => Arc::new(LocalStore::new(root)),
		None => Arc::new(
			S3Store::connect(settings.region.as_deref(), settings.endpoint_url.as_ref()).await,
		),
	}
}

/// Convert every access log object under `bucket/prefix` from `store` into
/// CSV on `writer`, returning the flushed writer.
///
/// A metrics report that cannot be written is logged and never replaces the
/// outcome of the conversion.
pub async fn convert<W: Write + Send + 'static>(
	settings: &Settings,
	store: Arc<dyn ObjectStore>,
	bucket: &str,
	prefix: &str,
	writer: W,
) -> anyhow::Result<(RunSummary, W)> {
	let metrics = Arc::new(MetricsRegistry::new()?);
	let options = PipelineOptions {
		max_concurrency: settings.max_concurrency,
		list: settings.list_options(),
		staging_dir: PathBuf::from(&settings.staging_dir),
	};

	let sink = OutputSink::open(writer, DEFAULT_CAPACITY)?;
	let mut pipeline = Pipeline::new(store, options, metrics.clone());
	let outcome = pipeline.run(bucket, prefix, sink).await;

	if let Err(e) =
		observability::report(&metrics, settings.metrics_file.as_deref().map(Path::new)).await
	{
		warn!("{:#}", e);
	}

	let (summary, writer) = outcome?;
	info!(
		"converted {} objects: {} records written, {} lines dropped",
		summary.objects, summary.records, summary.dropped
	);
	Ok((summary, writer))
}

/// Convert every access log object under `bucket/prefix` and write the CSV
/// table to standard output. Returns once the output has been flushed.
pub async fn run(settings: &Settings, bucket: &str, prefix: &str) -> anyhow::Result<RunSummary> {
	let store = open_store(settings).await;
	let (summary, _stdout) = convert(settings, store, bucket, prefix, std::io::stdout()).await?;
	Ok(summary)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pipeline::PipelineError;

	fn settings(root: &Path, staging: &Path) -> Settings {
		Settings {
			local_root: Some(root.to_string_lossy().into_owned()),
			staging_dir: staging.to_string_lossy().into_owned(),
			metrics_file: Some("/nonexistent-dir/metrics.prom".to_string()),
			..Settings::default()
		}
	}

	#[tokio::test]
	async fn unwritable_metrics_file_keeps_the_run_error() {
		let root = tempfile::tempdir().expect("root");
		let staging = tempfile::tempdir().expect("staging");
		let settings = settings(root.path(), staging.path());
		let store = open_store(&settings).await;

		let err = convert(&settings, store, "no-such-bucket", "", Vec::new())
			.await
			.expect_err("missing bucket is fatal");

		assert!(
			matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Listing(_))),
			"got {err:#}"
		);
	}

	#[tokio::test]
	async fn unwritable_metrics_file_does_not_fail_a_good_run() {
		let root = tempfile::tempdir().expect("root");
		std::fs::create_dir(root.path().join("logs")).expect("bucket dir");
		let staging = tempfile::tempdir().expect("staging");
		let settings = settings(root.path(), staging.path());
		let store = open_store(&settings).await;

		let (summary, output) = convert(&settings, store, "logs", "", Vec::new())
			.await
			.expect("conversion succeeds");

		assert_eq!(summary.objects, 0);
		assert!(String::from_utf8(output).expect("utf8").starts_with("owner_id,"));
	}
}
