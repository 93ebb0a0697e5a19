use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use log::debug;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{ListOptions, ObjectDescriptor, ObjectStore, StorageError};

/// S3 (or S3-compatible) storage client.
///
/// Credentials come from the standard AWS provider chain (environment,
/// profile, instance role).
pub struct S3Store {
	client: Client,
}

impl S3Store {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Build a client from the ambient AWS configuration with optional
	/// region and endpoint overrides. A custom endpoint switches to path-style
	/// addressing, which most S3-compatible servers expect.
	pub async fn connect(region: Option<&str>, endpoint: Option<&Url>) -> Self {
		let mut loader = aws_config::defaults(BehaviorVersion::latest());
		if let Some(region) = region {
			loader = loader.region(Region::new(region.to_string()));
		}
		let shared = loader.load().await;

		let mut builder = aws_sdk_s3::config::Builder::from(&shared);
		if let Some(endpoint) = endpoint {
			builder = builder
				.endpoint_url(endpoint.as_str())
				.force_path_style(true);
		}
		Self::new(Client::from_conf(builder.build()))
	}
}

#[async_trait]
impl ObjectStore for S3Store {
	async fn list(
		&self,
		bucket: &str,
		prefix: &str,
		options: ListOptions,
	) -> Result<Vec<ObjectDescriptor>, StorageError> {
		let mut objects = Vec::new();
		let mut continuation: Option<String> = None;

		loop {
			let resp = self
				.client
				.list_objects_v2()
				.bucket(bucket)
				.prefix(prefix)
				.max_keys(options.page_size)
				.set_continuation_token(continuation.take())
				.send()
				.await
				.map_err(|e| StorageError::listing(bucket, prefix, DisplayErrorContext(e)))?;

			for obj in resp.contents() {
				let Some(key) = obj.key() else {
					continue;
				};
				objects.push(ObjectDescriptor {
					key: key.to_string(),
					size: obj.size().and_then(|s| u64::try_from(s).ok()),
				});
			}
			debug!("listed {} objects under {}/{}", objects.len(), bucket, prefix);

			continuation = resp.next_continuation_token().map(str::to_string);
			if !options.all_pages || continuation.is_none() {
				break;
			}
		}

		Ok(objects)
	}

	async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
		let mut resp = self
			.client
			.get_object()
			.bucket(bucket)
			.key(key)
			.send()
			.await
			.map_err(|e| StorageError::fetch(bucket, key, DisplayErrorContext(e)))?;

		let mut file = File::create(dest)
			.await
			.map_err(|e| StorageError::fetch(bucket, key, e))?;

		let mut written: u64 = 0;
		while let Some(chunk) = resp
			.body
			.try_next()
			.await
			.map_err(|e| StorageError::fetch(bucket, key, e))?
		{
			file.write_all(&chunk)
				.await
				.map_err(|e| StorageError::fetch(bucket, key, e))?;
			written += chunk.len() as u64;
		}
		file.flush()
			.await
			.map_err(|e| StorageError::fetch(bucket, key, e))?;

		Ok(written)
	}
}
