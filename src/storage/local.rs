use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ListOptions, ObjectDescriptor, ObjectStore, StorageError};

/// A directory tree served as object storage: bucket `b` is the directory
/// `<root>/b`, and keys are `/`-joined paths relative to it. Used for
/// converting logs that were already copied to disk, and in tests.
pub struct LocalStore {
	root: PathBuf,
}

impl LocalStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn bucket_dir(&self, bucket: &str) -> Option<PathBuf> {
		let relative = Path::new(bucket);
		let single = relative.components().count() == 1
			&& matches!(relative.components().next(), Some(Component::Normal(_)));
		single.then(|| self.root.join(relative))
	}
}

#[async_trait]
impl ObjectStore for LocalStore {
	async fn list(
		&self,
		bucket: &str,
		prefix: &str,
		options: ListOptions,
	) -> Result<Vec<ObjectDescriptor>, StorageError> {
		let dir = self
			.bucket_dir(bucket)
			.ok_or_else(|| StorageError::listing(bucket, prefix, "invalid bucket name"))?;
		let meta = fs::metadata(&dir)
			.await
			.map_err(|e| StorageError::listing(bucket, prefix, e))?;
		if !meta.is_dir() {
			return Err(StorageError::listing(bucket, prefix, "bucket is not a directory"));
		}

		let mut objects = Vec::new();
		let mut pending = vec![(dir, String::new())];
		while let Some((current, key_prefix)) = pending.pop() {
			let mut entries = fs::read_dir(&current)
				.await
				.map_err(|e| StorageError::listing(bucket, prefix, e))?;
			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| StorageError::listing(bucket, prefix, e))?
			{
				let name = entry.file_name().to_string_lossy().into_owned();
				let key = format!("{key_prefix}{name}");
				let file_type = entry
					.file_type()
					.await
					.map_err(|e| StorageError::listing(bucket, prefix, e))?;
				if file_type.is_dir() {
					pending.push((entry.path(), format!("{key}/")));
				} else if key.starts_with(prefix) {
					let size = entry.metadata().await.ok().map(|m| m.len());
					objects.push(ObjectDescriptor { key, size });
				}
			}
		}

		objects.sort_by(|a, b| a.key.cmp(&b.key));
		if !options.all_pages {
			objects.truncate(usize::try_from(options.page_size).unwrap_or(0));
		}
		Ok(objects)
	}

	async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
		let dir = self
			.bucket_dir(bucket)
			.ok_or_else(|| StorageError::fetch(bucket, key, "invalid bucket name"))?;
		if Path::new(key)
			.components()
			.any(|c| !matches!(c, Component::Normal(_)))
		{
			return Err(StorageError::fetch(bucket, key, "key escapes the bucket"));
		}
		fs::copy(dir.join(key), dest)
			.await
			.map_err(|e| StorageError::fetch(bucket, key, e))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layout() -> tempfile::TempDir {
		let root = tempfile::tempdir().expect("tempdir");
		let bucket = root.path().join("logs-bucket");
		std::fs::create_dir_all(bucket.join("access/2019")).expect("mkdir");
		std::fs::create_dir_all(bucket.join("other")).expect("mkdir");
		std::fs::write(bucket.join("access/2019/b.log"), "b").expect("write");
		std::fs::write(bucket.join("access/2019/a.log"), "aa").expect("write");
		std::fs::write(bucket.join("access/c.log"), "ccc").expect("write");
		std::fs::write(bucket.join("other/d.log"), "d").expect("write");
		root
	}

	#[tokio::test]
	async fn lists_keys_under_prefix_in_order() {
		let root = layout();
		let store = LocalStore::new(root.path());
		let got = store
			.list("logs-bucket", "access/", ListOptions::default())
			.await
			.expect("list");
		let keys: Vec<&str> = got.iter().map(|o| o.key.as_str()).collect();
		assert_eq!(keys, vec!["access/2019/a.log", "access/2019/b.log", "access/c.log"]);
		assert_eq!(got[0].size, Some(2));
	}

	#[tokio::test]
	async fn single_page_is_truncated() {
		let root = layout();
		let store = LocalStore::new(root.path());
		let options = ListOptions {
			page_size: 2,
			all_pages: false,
		};
		let got = store.list("logs-bucket", "", options).await.expect("list");
		assert_eq!(got.len(), 2);

		let all = ListOptions {
			page_size: 2,
			all_pages: true,
		};
		let got = store.list("logs-bucket", "", all).await.expect("list");
		assert_eq!(got.len(), 4);
	}

	#[tokio::test]
	async fn missing_bucket_is_a_listing_error() {
		let root = layout();
		let store = LocalStore::new(root.path());
		let err = store
			.list("no-such-bucket", "", ListOptions::default())
			.await
			.expect_err("missing bucket");
		assert!(matches!(err, StorageError::Listing { .. }));

		let err = store
			.list("../escape", "", ListOptions::default())
			.await
			.expect_err("bad bucket");
		assert!(matches!(err, StorageError::Listing { .. }));
	}

	#[tokio::test]
	async fn download_copies_bytes() {
		let root = layout();
		let store = LocalStore::new(root.path());
		let dest = root.path().join("staged");
		let n = store
			.download("logs-bucket", "access/c.log", &dest)
			.await
			.expect("download");
		assert_eq!(n, 3);
		assert_eq!(std::fs::read_to_string(&dest).expect("read"), "ccc");

		let err = store
			.download("logs-bucket", "access/missing.log", &dest)
			.await
			.expect_err("missing key");
		assert!(matches!(err, StorageError::Fetch { .. }));

		let err = store
			.download("logs-bucket", "../other/d.log", &dest)
			.await
			.expect_err("escaping key");
		assert!(matches!(err, StorageError::Fetch { .. }));
	}
}
