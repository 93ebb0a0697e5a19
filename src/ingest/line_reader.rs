use std::path::Path;

use log::{debug, trace};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::observability::MetricsRegistry;
use crate::sink::{SinkError, SinkHandle};

use super::parse_line;

/// Line counts for one staged file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
	pub lines: u64,
	pub records: u64,
	pub dropped: u64,
}

#[derive(Debug, Error)]
pub enum ReadError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error(transparent)]
	Sink(#[from] SinkError),
}

/// Stream every line of a staged file through the parser and emit the
/// records in file order. Lines that do not parse are counted and skipped;
/// invalid UTF-8 is replaced rather than rejected.
pub async fn read_staged_file(
	path: &Path,
	sink: &SinkHandle,
	metrics: &MetricsRegistry,
) -> Result<FileSummary, ReadError> {
	let io_err = |source| ReadError::Io {
		path: path.display().to_string(),
		source,
	};

	let file = File::open(path).await.map_err(io_err)?;
	let mut reader = BufReader::new(file);
	let mut buf = Vec::with_capacity(1024);
	let mut summary = FileSummary::default();

	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf).await.map_err(io_err)? == 0 {
			break;
		}
		summary.lines += 1;
		metrics.lines_read.inc();

		let line = String::from_utf8_lossy(trim_line_ending(&buf));
		match parse_line(&line) {
			Ok(record) => {
				sink.emit(record).await?;
				summary.records += 1;
				metrics.records_emitted.inc();
			}
			Err(reason) => {
				summary.dropped += 1;
				metrics.lines_dropped.inc();
				trace!("{}:{}: dropped: {}", path.display(), summary.lines, reason);
			}
		}
	}

	debug!(
		"{}: {} lines, {} records, {} dropped",
		path.display(),
		summary.lines,
		summary.records,
		summary.dropped
	);
	Ok(summary)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
	let line = line.strip_suffix(b"\n").unwrap_or(line);
	line.strip_suffix(b"\r").unwrap_or(line)
}
