pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::MetricsRegistry;

use std::path::Path;

use anyhow::Context;
use log::info;

/// Log the run counters and, when a path is given, write them out in
/// Prometheus text format.
pub async fn report(metrics: &MetricsRegistry, metrics_file: Option<&Path>) -> anyhow::Result<()> {
	info!(
		"objects listed={} fetched={} bytes={}; lines read={} emitted={} dropped={}",
		metrics.objects_listed.get(),
		metrics.objects_fetched.get(),
		metrics.bytes_fetched.get(),
		metrics.lines_read.get(),
		metrics.records_emitted.get(),
		metrics.lines_dropped.get()
	);

	if let Some(path) = metrics_file {
		tokio::fs::write(path, metrics.encode()?)
			.await
			.with_context(|| format!("writing metrics to {}", path.display()))?;
	}
	Ok(())
}
