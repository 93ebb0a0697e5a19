//! Common fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use s3_access_to_csv::storage::{
	ListOptions, LocalStore, ObjectDescriptor, ObjectStore, StorageError,
};

pub const BUCKET: &str = "access-logs";
pub const OWNER: &str = "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be";
pub const HOST_ID: &str =
	"s9lzHYrFp76ZVxRcpX9+5cjAnEH2ROuNkd2BHfIa6UkFVdtjf5mKR3/eTPFvsiP/XV/VLi31234=";

/// A well-formed access log line for `key` at `HH:MM:SS` on 06/Feb/2019.
pub fn log_line(key: &str, time: &str) -> String {
	format!(
		"{OWNER} {BUCKET} [06/Feb/2019:{time} +0000] 192.0.2.3 {OWNER} 891CE47D2EXAMPLE \
REST.GET.OBJECT {key} \"GET /{BUCKET}/{key} HTTP/1.1\" 200 - 4096 4096 12 11 \
\"-\" \"aws-cli/1.16.96 Python/3.6.0 Linux/4.14\" - {HOST_ID} SigV4 \
ECDHE-RSA-AES128-GCM-SHA256 AuthHeader {BUCKET}.s3.amazonaws.com TLSv1.2"
	)
}

/// A directory tree laid out as `<root>/<bucket>/<key>`.
pub struct Layout {
	pub root: tempfile::TempDir,
}

impl Layout {
	pub fn new() -> Self {
		let root = tempfile::tempdir().expect("tempdir");
		std::fs::create_dir_all(root.path().join(BUCKET)).expect("bucket dir");
		Self { root }
	}

	/// Write an object made of `lines`, each terminated by a newline.
	pub fn put(&self, key: &str, lines: &[String]) -> &Self {
		let path = self.root.path().join(BUCKET).join(key);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).expect("key dirs");
		}
		let mut body = lines.join("\n");
		body.push('\n');
		std::fs::write(path, body).expect("write object");
		self
	}

	pub fn store(&self) -> LocalStore {
		LocalStore::new(self.root.path())
	}
}

/// Wraps a store and fails the download of one key.
pub struct FailingStore<S> {
	pub inner: S,
	pub failing_key: String,
	pub downloads: Arc<AtomicUsize>,
}

impl<S> FailingStore<S> {
	pub fn new(inner: S, failing_key: &str) -> Self {
		Self {
			inner,
			failing_key: failing_key.to_string(),
			downloads: Arc::new(AtomicUsize::new(0)),
		}
	}
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for FailingStore<S> {
	async fn list(
		&self,
		bucket: &str,
		prefix: &str,
		options: ListOptions,
	) -> Result<Vec<ObjectDescriptor>, StorageError> {
		self.inner.list(bucket, prefix, options).await
	}

	async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
		self.downloads.fetch_add(1, Ordering::SeqCst);
		if key == self.failing_key {
			return Err(StorageError::fetch(bucket, key, "access denied"));
		}
		self.inner.download(bucket, key, dest).await
	}
}

/// Parse CSV output into its header and data rows.
pub fn parse_output(output: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
	let mut reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.from_reader(output);
	let header = reader
		.headers()
		.expect("header row")
		.iter()
		.map(str::to_string)
		.collect();
	let rows = reader
		.records()
		.map(|r| r.expect("csv row").iter().map(str::to_string).collect())
		.collect();
	(header, rows)
}

/// Entries left under `dir`.
pub fn entries(dir: &Path) -> Vec<PathBuf> {
	std::fs::read_dir(dir)
		.expect("read dir")
		.map(|e| e.expect("dir entry").path())
		.collect()
}

/// Accepts `limit` bytes, then fails every write like a closed pipe.
#[derive(Debug)]
pub struct FailingWriter {
	pub limit: usize,
	pub written: usize,
}

impl FailingWriter {
	pub fn new(limit: usize) -> Self {
		Self { limit, written: 0 }
	}
}

impl std::io::Write for FailingWriter {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		if self.written + buf.len() > self.limit {
			return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader went away"));
		}
		self.written += buf.len();
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}
