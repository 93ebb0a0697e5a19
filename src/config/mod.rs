use log::Level;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::storage::{DEFAULT_PAGE_SIZE, ListOptions};

/// Runtime configuration for a conversion run.
///
/// Values are loaded from (in order): `/etc/s3-access-to-csv/config.json`,
/// the same file under the user config folders (all optional), and
/// environment variables prefixed with `S3CSV_` (e.g. `S3CSV_MAX_CONCURRENCY`).
/// Command-line flags are applied on top by the binary.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
	pub log_level: Level,
	/// Parent directory of the per-run staging directory.
	pub staging_dir: String,
	/// Upper bound on concurrent downloads and concurrent file reads.
	pub max_concurrency: usize,
	/// Keys requested per listing page.
	pub page_size: i32,
	/// Follow continuation tokens instead of reading a single page.
	pub list_all_pages: bool,
	pub region: Option<String>,
	/// S3-compatible endpoint override.
	pub endpoint_url: Option<Url>,
	/// Serve buckets from this directory instead of S3.
	pub local_root: Option<String>,
	/// Write a Prometheus text snapshot of the run counters here.
	pub metrics_file: Option<String>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			log_level: Level::Info,
			staging_dir: std::env::temp_dir().to_string_lossy().into_owned(),
			max_concurrency: 16,
			page_size: DEFAULT_PAGE_SIZE,
			list_all_pages: false,
			region: None,
			endpoint_url: None,
			local_root: None,
			metrics_file: None,
		}
	}
}

impl Settings {
	pub fn list_options(&self) -> ListOptions {
		ListOptions {
			page_size: self.page_size,
			all_pages: self.list_all_pages,
		}
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.page_size <= 0 {
			return Err(SettingsError::Invalid(format!(
				"page_size must be positive, got {}",
				self.page_size
			)));
		}
		if self.max_concurrency == 0 {
			return Err(SettingsError::Invalid(
				"max_concurrency must be at least 1".to_string(),
			));
		}
		if self.staging_dir.is_empty() {
			return Err(SettingsError::Invalid(
				"staging_dir must not be empty".to_string(),
			));
		}
		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),
	#[error("invalid setting: {0}")]
	Invalid(String),
}

pub fn load() -> Result<Settings, SettingsError> {
	let mut builder = config::Config::builder().add_source(
		config::File::with_name("/etc/s3-access-to-csv/config.json").required(false),
	);

	if let Some(folder) = dirs::config_dir() {
		let user_config_path = folder.join("s3-access-to-csv").join("config.json");
		builder = builder.add_source(config::File::from(user_config_path).required(false));
	}
	if let Some(folder) = dirs::config_local_dir() {
		let local_config_path = folder.join("s3-access-to-csv").join("config.json");
		builder = builder.add_source(config::File::from(local_config_path).required(false));
	}

	builder = builder.add_source(config::Environment::with_prefix("S3CSV").separator("__"));

	let cfg = builder.build()?;

	let mut s: Settings = cfg.try_deserialize()?;

	// Read the common overrides directly as well; the `config` crate does
	// not split single-underscore names the way these keys are spelled.
	if let Ok(l) = std::env::var("S3CSV_LOG_LEVEL") {
		if let Ok(parsed) = l.parse::<Level>() {
			s.log_level = parsed;
		}
	}
	if let Ok(d) = std::env::var("S3CSV_STAGING_DIR") {
		if !d.is_empty() {
			s.staging_dir = d;
		}
	}
	if let Ok(c) = std::env::var("S3CSV_MAX_CONCURRENCY") {
		if let Ok(parsed) = c.parse::<usize>() {
			s.max_concurrency = parsed;
		}
	}
	if let Ok(p) = std::env::var("S3CSV_PAGE_SIZE") {
		if let Ok(parsed) = p.parse::<i32>() {
			s.page_size = parsed;
		}
	}
	if let Ok(a) = std::env::var("S3CSV_LIST_ALL_PAGES") {
		if let Ok(parsed) = a.parse::<bool>() {
			s.list_all_pages = parsed;
		}
	}
	if let Ok(r) = std::env::var("S3CSV_REGION") {
		if !r.is_empty() {
			s.region = Some(r);
		}
	}
	if let Ok(e) = std::env::var("S3CSV_ENDPOINT_URL") {
		if let Ok(parsed) = Url::parse(&e) {
			s.endpoint_url = Some(parsed);
		}
	}
	if let Ok(r) = std::env::var("S3CSV_LOCAL_ROOT") {
		if !r.is_empty() {
			s.local_root = Some(r);
		}
	}
	if let Ok(m) = std::env::var("S3CSV_METRICS_FILE") {
		if !m.is_empty() {
			s.metrics_file = Some(m);
		}
	}

	s.validate()?;
	Ok(s)
}
