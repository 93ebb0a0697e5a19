//! Test fixtures shared by the ingest unit tests.

#![cfg(test)]

pub const OWNER: &str = "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be";
pub const HOST_ID: &str =
	"s9lzHYrFp76ZVxRcpX9+5cjAnEH2ROuNkd2BHfIa6UkFVdtjf5mKR3/eTPFvsiP/XV/VLi31234=";

/// A well-formed server access log line with trailing newer-format fields.
pub fn sample_line() -> String {
	format!(
		"{OWNER} awsexamplebucket1 [06/Feb/2019:00:00:38 +0000] 192.0.2.3 {OWNER} 3E57427F3EXAMPLE \
REST.GET.VERSIONING - \"GET /awsexamplebucket1?versioning HTTP/1.1\" 200 - 113 - 7 - \"-\" \
\"S3Console/0.4\" - {HOST_ID} SigV4 ECDHE-RSA-AES128-GCM-SHA256 AuthHeader \
awsexamplebucket1.s3.us-west-1.amazonaws.com TLSV1.2 \
arn:aws:s3:us-west-1:123456789012:accesspoint/example-AP Yes"
	)
}

/// A well-formed line for `key` with a caller-chosen timestamp.
pub fn line_for(key: &str, timestamp: &str) -> String {
	format!(
		"{OWNER} awsexamplebucket1 [{timestamp} +0000] 192.0.2.3 {OWNER} 891CE47D2EXAMPLE \
REST.GET.OBJECT {key} \"GET /awsexamplebucket1/{key} HTTP/1.1\" 200 - 4096 4096 12 11 \
\"https://example.com/index.html\" \"aws-cli/1.16.96 Python/3.6.0 Linux/4.14\" \
3HL4kqtJvjVBH40Nrjfkd {HOST_ID} SigV4 ECDHE-RSA-AES128-GCM-SHA256 AuthHeader \
awsexamplebucket1.s3.amazonaws.com TLSv1.2"
	)
}
