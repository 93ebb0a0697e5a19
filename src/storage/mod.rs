//! Object storage collaborators: listing log objects under a prefix and
//! downloading one object into a local file.

pub mod local;
pub mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Listing page size used by the S3 server access log delivery tooling.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("listing {bucket}/{prefix} failed: {message}")]
	Listing {
		bucket: String,
		prefix: String,
		message: String,
	},
	#[error("fetching {bucket}/{key} failed: {message}")]
	Fetch {
		bucket: String,
		key: String,
		message: String,
	},
}

impl StorageError {
	pub fn listing(bucket: &str, prefix: &str, message: impl ToString) -> Self {
		StorageError::Listing {
			bucket: bucket.to_string(),
			prefix: prefix.to_string(),
			message: message.to_string(),
		}
	}

	pub fn fetch(bucket: &str, key: &str, message: impl ToString) -> Self {
		StorageError::Fetch {
			bucket: bucket.to_string(),
			key: key.to_string(),
			message: message.to_string(),
		}
	}
}

/// One listed log object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
	pub key: String,
	pub size: Option<u64>,
}

impl ObjectDescriptor {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			size: None,
		}
	}

	/// Last path segment of the key, ignoring a trailing `/`.
	pub fn base_name(&self) -> &str {
		let trimmed = self.key.trim_end_matches('/');
		match trimmed.rsplit('/').next() {
			Some(base) if !base.is_empty() => base,
			_ => "object",
		}
	}
}

/// How much of a prefix to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
	/// Maximum keys per page.
	pub page_size: i32,
	/// Follow continuation tokens past the first page.
	pub all_pages: bool,
}

impl Default for ListOptions {
	fn default() -> Self {
		Self {
			page_size: DEFAULT_PAGE_SIZE,
			all_pages: false,
		}
	}
}

/// Trait abstraction over the storage service so tests can substitute an
/// in-memory or failing implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
	/// List objects in `bucket` whose keys start with `prefix`.
	async fn list(
		&self,
		bucket: &str,
		prefix: &str,
		options: ListOptions,
	) -> Result<Vec<ObjectDescriptor>, StorageError>;

	/// Write the full body of `bucket/key` to `dest`, returning the byte count.
	async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError>;
}
