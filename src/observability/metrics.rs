use prometheus::{IntCounter, Opts, Registry, TextEncoder};

/// Counters for one conversion run, exportable in Prometheus text format.
pub struct MetricsRegistry {
	registry: Registry,

	// Source metrics
	pub objects_listed: IntCounter,
	pub objects_fetched: IntCounter,
	pub bytes_fetched: IntCounter,

	// Parse metrics
	pub lines_read: IntCounter,
	pub records_emitted: IntCounter,
	pub lines_dropped: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
	let counter = IntCounter::with_opts(Opts::new(name, help).namespace("s3_access_to_csv"))?;
	registry.register(Box::new(counter.clone()))?;
	Ok(counter)
}

impl MetricsRegistry {
	pub fn new() -> prometheus::Result<Self> {
		let registry = Registry::new();

		let objects_listed = counter(
			&registry,
			"objects_listed_total",
			"Log objects returned by the listing",
		)?;
		let objects_fetched = counter(
			&registry,
			"objects_fetched_total",
			"Log objects staged locally",
		)?;
		let bytes_fetched = counter(
			&registry,
			"bytes_fetched_total",
			"Bytes written to the staging area",
		)?;
		let lines_read = counter(&registry, "lines_read_total", "Log lines read")?;
		let records_emitted = counter(
			&registry,
			"records_emitted_total",
			"Normalized records written to the output",
		)?;
		let lines_dropped = counter(
			&registry,
			"lines_dropped_total",
			"Lines dropped because they did not parse",
		)?;

		Ok(Self {
			registry,
			objects_listed,
			objects_fetched,
			bytes_fetched,
			lines_read,
			records_emitted,
			lines_dropped,
		})
	}

	/// Encode metrics in Prometheus text format
	pub fn encode(&self) -> prometheus::Result<String> {
		TextEncoder::new().encode_to_string(&self.registry.gather())
	}
}
