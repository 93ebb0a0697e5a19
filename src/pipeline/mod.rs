//! Orchestrates one conversion run: list, stage every object, read every
//! staged file into the output sink, then clean up.

pub mod staging;

pub use staging::{StagedFile, StagingArea};

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::ingest::{FileSummary, ReadError, read_staged_file};
use crate::observability::MetricsRegistry;
use crate::sink::{OutputSink, SinkError, SinkHandle};
use crate::storage::{ListOptions, ObjectDescriptor, ObjectStore, StorageError};

/// Lifecycle of a run. `Failed` is reachable from every state but `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
	Idle,
	Listing,
	Fetching,
	Parsing,
	Draining,
	Done,
	Failed,
}

#[derive(Debug, Error)]
pub enum PipelineError {
	#[error(transparent)]
	Listing(StorageError),
	#[error(transparent)]
	Fetch(StorageError),
	#[error("staging area error: {0}")]
	Staging(#[source] std::io::Error),
	#[error(transparent)]
	Read(ReadError),
	#[error(transparent)]
	Sink(#[from] SinkError),
	#[error("worker task failed: {0}")]
	Task(String),
}

impl From<ReadError> for PipelineError {
	fn from(e: ReadError) -> Self {
		match e {
			ReadError::Sink(s) => PipelineError::Sink(s),
			other => PipelineError::Read(other),
		}
	}
}

impl From<JoinError> for PipelineError {
	fn from(e: JoinError) -> Self {
		PipelineError::Task(e.to_string())
	}
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
	pub max_concurrency: usize,
	pub list: ListOptions,
	/// Parent of the per-run staging directory.
	pub staging_dir: PathBuf,
}

impl Default for PipelineOptions {
	fn default() -> Self {
		Self {
			max_concurrency: 16,
			list: ListOptions::default(),
			staging_dir: std::env::temp_dir(),
		}
	}
}

/// Totals for a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
	pub objects: usize,
	pub lines: u64,
	pub records: u64,
	pub dropped: u64,
}

pub struct Pipeline {
	store: Arc<dyn ObjectStore>,
	options: PipelineOptions,
	metrics: Arc<MetricsRegistry>,
	state: PipelineState,
}

impl Pipeline {
	pub fn new(
		store: Arc<dyn ObjectStore>,
		options: PipelineOptions,
		metrics: Arc<MetricsRegistry>,
	) -> Self {
		Self {
			store,
			options,
			metrics,
			state: PipelineState::Idle,
		}
	}

	pub fn state(&self) -> PipelineState {
		self.state
	}

	fn transition(&mut self, next: PipelineState) {
		debug!("pipeline {:?} -> {:?}", self.state, next);
		self.state = next;
	}

	/// Convert every log object under `bucket/prefix` into rows of `sink`.
	///
	/// On success the sink is closed and its writer returned once flushed.
	/// On any fatal error in-flight tasks are cancelled, the staging
	/// directory is removed and the sink is aborted before the error is
	/// returned.
	pub async fn run<W: Write + Send + 'static>(
		&mut self,
		bucket: &str,
		prefix: &str,
		sink: OutputSink<W>,
	) -> Result<(RunSummary, W), PipelineError> {
		let staging = match StagingArea::create(&self.options.staging_dir).await {
			Ok(staging) => staging,
			Err(e) => {
				self.transition(PipelineState::Failed);
				if let Err(abort) = sink.abort().await {
					warn!("output sink abort failed: {}", abort);
				}
				return Err(PipelineError::Staging(e));
			}
		};

		let outcome = self.execute(bucket, prefix, &staging, sink.handle()).await;
		let cleanup = staging.cleanup().await;

		match outcome {
			Ok(summary) => {
				self.transition(PipelineState::Draining);
				if let Err(e) = cleanup {
					warn!("failed to remove staging directory: {}", e);
				}
				let writer = match sink.close().await {
					Ok(writer) => writer,
					Err(e) => {
						self.transition(PipelineState::Failed);
						return Err(e.into());
					}
				};
				self.transition(PipelineState::Done);
				Ok((summary, writer))
			}
			Err(err) => {
				self.transition(PipelineState::Failed);
				if let Err(e) = cleanup {
					warn!("failed to remove staging directory: {}", e);
				}
				match (err, sink.abort().await) {
					// The reader only sees a closed channel; the writer task
					// holds the real cause.
					(PipelineError::Sink(SinkError::Closed), Err(cause)) => Err(cause.into()),
					(err, _) => Err(err),
				}
			}
		}
	}

	async fn execute(
		&mut self,
		bucket: &str,
		prefix: &str,
		staging: &StagingArea,
		sink: SinkHandle,
	) -> Result<RunSummary, PipelineError> {
		self.transition(PipelineState::Listing);
		let objects = self
			.store
			.list(bucket, prefix, self.options.list)
			.await
			.map_err(PipelineError::Listing)?;
		self.metrics.objects_listed.inc_by(objects.len() as u64);
		info!("{} log objects under {}/{}", objects.len(), bucket, prefix);

		self.transition(PipelineState::Fetching);
		let staged = self.fetch_all(bucket, objects, staging).await?;

		self.transition(PipelineState::Parsing);
		let files = self.parse_all(staged, sink).await?;

		let mut summary = RunSummary {
			objects: files.len(),
			..RunSummary::default()
		};
		for file in files {
			summary.lines += file.lines;
			summary.records += file.records;
			summary.dropped += file.dropped;
		}
		Ok(summary)
	}

	async fn fetch_all(
		&self,
		bucket: &str,
		objects: Vec<ObjectDescriptor>,
		staging: &StagingArea,
	) -> Result<Vec<StagedFile>, PipelineError> {
		let jobs: Vec<_> = objects
			.into_iter()
			.enumerate()
			.map(|(index, object)| (staging.path_for(index, &object), object))
			.collect();

		let limit = self.options.max_concurrency;
		fan_out(limit, jobs, |(path, object)| {
			let store = self.store.clone();
			let metrics = self.metrics.clone();
			let bucket = bucket.to_string();
			async move {
				let bytes = store
					.download(&bucket, &object.key, &path)
					.await
					.map_err(PipelineError::Fetch)?;
				metrics.objects_fetched.inc();
				metrics.bytes_fetched.inc_by(bytes);
				debug!("staged {} ({} bytes)", object.key, bytes);
				Ok::<_, PipelineError>(StagedFile {
					key: object.key,
					path,
					bytes,
				})
			}
		})
		.await
	}

	async fn parse_all(
		&self,
		staged: Vec<StagedFile>,
		sink: SinkHandle,
	) -> Result<Vec<FileSummary>, PipelineError> {
		let limit = self.options.max_concurrency;
		fan_out(limit, staged, |file| {
			let sink = sink.clone();
			let metrics = self.metrics.clone();
			async move {
				let read = read_staged_file(&file.path, &sink, &metrics).await;
				if let Err(e) = file.remove().await {
					warn!("failed to remove staged file {}: {}", file.path.display(), e);
				}
				Ok::<_, PipelineError>(read?)
			}
		})
		.await
	}
}

/// Run `task` over `items` with at most `limit` in flight, returning the
/// results in item order. Permits are taken in item order, so a limit of 1
/// processes items strictly one after another. The first failure cancels
/// every task still running.
async fn fan_out<I, R, F, Fut>(limit: usize, items: Vec<I>, task: F) -> Result<Vec<R>, PipelineError>
where
	R: Send + 'static,
	F: Fn(I) -> Fut,
	Fut: Future<Output = Result<R, PipelineError>> + Send + 'static,
{
	let semaphore = Arc::new(Semaphore::new(limit.max(1)));
	let mut set: JoinSet<Result<(usize, R), PipelineError>> = JoinSet::new();
	let mut done: Vec<(usize, R)> = Vec::with_capacity(items.len());

	for (index, item) in items.into_iter().enumerate() {
		let permit = semaphore
			.clone()
			.acquire_owned()
			.await
			.map_err(|e| PipelineError::Task(e.to_string()))?;

		// A finished task may have freed this permit by failing.
		while let Some(joined) = set.try_join_next() {
			if let Err(e) = settle(joined, &mut done) {
				set.shutdown().await;
				return Err(e);
			}
		}

		let work = task(item);
		set.spawn(async move {
			let out = work.await;
			drop(permit);
			out.map(|r| (index, r))
		});
	}

	while let Some(joined) = set.join_next().await {
		if let Err(e) = settle(joined, &mut done) {
			set.shutdown().await;
			return Err(e);
		}
	}

	done.sort_by_key(|(index, _)| *index);
	Ok(done.into_iter().map(|(_, r)| r).collect())
}

fn settle<R>(
	joined: Result<Result<(usize, R), PipelineError>, JoinError>,
	done: &mut Vec<(usize, R)>,
) -> Result<(), PipelineError> {
	done.push(joined??);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[tokio::test]
	async fn fan_out_keeps_item_order_and_bounds_concurrency() {
		let active = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));

		let out = fan_out(3, (0..20u64).collect(), |n| {
			let active = active.clone();
			let peak = peak.clone();
			async move {
				let now = active.fetch_add(1, Ordering::SeqCst) + 1;
				peak.fetch_max(now, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(20 - n)).await;
				active.fetch_sub(1, Ordering::SeqCst);
				Ok::<_, PipelineError>(n * 2)
			}
		})
		.await
		.expect("fan out");

		assert_eq!(out, (0..20u64).map(|n| n * 2).collect::<Vec<_>>());
		assert!(peak.load(Ordering::SeqCst) <= 3);
	}

	#[tokio::test]
	async fn fan_out_stops_on_first_failure() {
		let started = Arc::new(AtomicUsize::new(0));
		let result = fan_out(2, (0..50usize).collect(), |n| {
			let started = started.clone();
			async move {
				started.fetch_add(1, Ordering::SeqCst);
				if n == 1 {
					return Err(PipelineError::Task("boom".to_string()));
				}
				tokio::time::sleep(Duration::from_millis(50)).await;
				Ok::<_, PipelineError>(n)
			}
		})
		.await;

		assert!(matches!(result, Err(PipelineError::Task(m)) if m == "boom"));
		assert!(started.load(Ordering::SeqCst) < 50);
	}
}
