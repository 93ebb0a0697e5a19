use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ingest::{LogRecord, header};

/// Records buffered between the readers and the writer task.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum SinkError {
	#[error("failed to write CSV output: {0}")]
	Write(#[from] csv::Error),
	#[error("failed to flush CSV output: {0}")]
	Flush(#[from] std::io::Error),
	#[error("output sink is closed")]
	Closed,
	#[error("output writer task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Cloneable sender side handed to each line reader.
#[derive(Clone)]
pub struct SinkHandle {
	sender: mpsc::Sender<LogRecord>,
}

impl SinkHandle {
	/// Queue one record. Records sent through the same handle are written in
	/// send order; each record becomes exactly one CSV row.
	pub async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
		self.sender.send(record).await.map_err(|_| SinkError::Closed)
	}
}

/// The single CSV output stream of a run.
///
/// The header row is written when the sink opens, so a run that emits no
/// records still produces a well-formed table. A dedicated blocking task owns
/// the `csv::Writer`, which serializes concurrent emitters without
/// interleaving partial rows.
pub struct OutputSink<W> {
	sender: mpsc::Sender<LogRecord>,
	aborted: Arc<AtomicBool>,
	worker: JoinHandle<Result<W, SinkError>>,
}

impl<W: Write + Send + 'static> OutputSink<W> {
	/// Open the sink over `writer`. Must be called inside a tokio runtime.
	pub fn open(writer: W, capacity: usize) -> Result<Self, SinkError> {
		let mut csv = csv::WriterBuilder::new().from_writer(writer);
		csv.write_record(header())?;

		let (sender, mut receiver) = mpsc::channel::<LogRecord>(capacity.max(1));
		let aborted = Arc::new(AtomicBool::new(false));
		let stop = aborted.clone();

		let worker = tokio::task::spawn_blocking(move || {
			let mut written: u64 = 0;
			while let Some(record) = receiver.blocking_recv() {
				if stop.load(Ordering::Acquire) {
					break;
				}
				csv.write_record(record.to_row())?;
				written += 1;
			}
			csv.flush()?;
			debug!("output sink flushed after {} records", written);
			csv.into_inner().map_err(|e| SinkError::Flush(e.into_error()))
		});

		Ok(Self {
			sender,
			aborted,
			worker,
		})
	}

	pub fn handle(&self) -> SinkHandle {
		SinkHandle {
			sender: self.sender.clone(),
		}
	}

	/// Close the stream and wait for the writer to flush. Every
	/// [`SinkHandle`] must be dropped first or this waits forever.
	pub async fn close(self) -> Result<W, SinkError> {
		let OutputSink { sender, worker, .. } = self;
		drop(sender);
		worker.await?
	}

	/// Stop writing queued records, flush what was already written and
	/// release the writer.
	pub async fn abort(self) -> Result<(), SinkError> {
		let OutputSink {
			sender,
			aborted,
			worker,
		} = self;
		aborted.store(true, Ordering::Release);
		drop(sender);
		worker.await?.map(|_| ())
	}
}
