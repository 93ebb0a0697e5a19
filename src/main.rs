use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::{Level, error};
use s3_access_to_csv::config::{self, Settings};
use s3_access_to_csv::observability::init_logging;
use s3_access_to_csv::run;
use url::Url;

#[derive(Parser)]
#[command(
	name = "s3-access-to-csv",
	version,
	about = "Convert S3 server access logs into one CSV table on stdout"
)]
struct Cli {
	/// Bucket holding the access log objects
	bucket: Option<String>,
	/// Key prefix of the log objects
	#[arg(default_value = "")]
	prefix: String,
	/// Maximum concurrent downloads and concurrent file reads
	#[arg(long)]
	concurrency: Option<usize>,
	/// Directory under which downloaded logs are staged
	#[arg(long)]
	staging_dir: Option<String>,
	/// AWS region of the bucket
	#[arg(long)]
	region: Option<String>,
	/// S3-compatible endpoint to use instead of AWS
	#[arg(long)]
	endpoint_url: Option<Url>,
	/// Keys requested per listing page
	#[arg(long)]
	page_size: Option<i32>,
	/// Follow listing continuation tokens instead of reading one page
	#[arg(long)]
	all_pages: bool,
	/// Read buckets from this directory instead of S3
	#[arg(long)]
	local_root: Option<String>,
	/// Write run counters in Prometheus text format to this file
	#[arg(long)]
	metrics_file: Option<String>,
	/// Log verbosity (logs go to stderr)
	#[arg(long)]
	log_level: Option<Level>,
}

impl Cli {
	fn apply(&self, s: &mut Settings) {
		if let Some(c) = self.concurrency {
			s.max_concurrency = c;
		}
		if let Some(d) = &self.staging_dir {
			s.staging_dir = d.clone();
		}
		if let Some(r) = &self.region {
			s.region = Some(r.clone());
		}
		if let Some(e) = &self.endpoint_url {
			s.endpoint_url = Some(e.clone());
		}
		if let Some(p) = self.page_size {
			s.page_size = p;
		}
		if self.all_pages {
			s.list_all_pages = true;
		}
		if let Some(r) = &self.local_root {
			s.local_root = Some(r.clone());
		}
		if let Some(m) = &self.metrics_file {
			s.metrics_file = Some(m.clone());
		}
		if let Some(l) = self.log_level {
			s.log_level = l;
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let Some(bucket) = cli.bucket.as_deref() else {
		// Usage goes to stdout, and no logs are processed.
		if let Err(e) = Cli::command().print_help() {
			eprintln!("failed to print usage: {}", e);
		}
		println!();
		return ExitCode::FAILURE;
	};

	let mut settings = match config::load() {
		Ok(s) => s,
		Err(e) => {
			eprintln!("failed to load config, using defaults: {}", e);
			Settings::default()
		}
	};
	cli.apply(&mut settings);
	if let Err(e) = settings.validate() {
		eprintln!("Error: {}", e);
		return ExitCode::FAILURE;
	}

	if let Err(e) = init_logging(settings.log_level) {
		eprintln!("{}", e);
	}

	match run(&settings, bucket, &cli.prefix).await {
		Ok(_) => ExitCode::SUCCESS,
		Err(e) => {
			error!("Error: {:#}", e);
			ExitCode::FAILURE
		}
	}
}
