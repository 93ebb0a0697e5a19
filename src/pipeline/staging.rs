use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::storage::ObjectDescriptor;

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-run directory holding the downloaded log objects.
#[derive(Debug)]
pub struct StagingArea {
	root: PathBuf,
}

impl StagingArea {
	/// Create a fresh, uniquely named directory under `parent`.
	pub async fn create(parent: &Path) -> io::Result<Self> {
		let millis = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis())
			.unwrap_or_default();
		let name = format!(
			"s3-access-to-csv-{}-{}-{}",
			std::process::id(),
			millis,
			RUN_SEQ.fetch_add(1, Ordering::Relaxed)
		);
		let root = parent.join(name);
		tokio::fs::create_dir_all(parent).await?;
		tokio::fs::create_dir(&root).await?;
		debug!("staging directory {}", root.display());
		Ok(Self { root })
	}

	pub fn path(&self) -> &Path {
		&self.root
	}

	/// Local path for the `index`-th listed object. The index keeps objects
	/// with the same base name under different prefixes apart.
	pub fn path_for(&self, index: usize, object: &ObjectDescriptor) -> PathBuf {
		self.root
			.join(format!("{:06}-{}", index, object.base_name()))
	}

	/// Remove the directory and anything still staged in it.
	pub async fn cleanup(self) -> io::Result<()> {
		match tokio::fs::remove_dir_all(&self.root).await {
			Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
			_ => Ok(()),
		}
	}
}

/// A downloaded log object waiting to be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
	pub key: String,
	pub path: PathBuf,
	pub bytes: u64,
}

impl StagedFile {
	pub async fn remove(&self) -> io::Result<()> {
		tokio::fs::remove_file(&self.path).await
	}
}
