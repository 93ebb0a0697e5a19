use std::fmt;

/// Number of positional fields in one access-log line.
pub const FIELD_COUNT: usize = 26;

/// Named columns of a normalized access-log record, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
	OwnerId,
	Bucket,
	Timestamp,
	IpAddress,
	Requester,
	RequestId,
	RequestType,
	BucketKey,
	HttpMethod,
	HttpPath,
	HttpVersion,
	HttpStatusCode,
	ErrorCode,
	BytesSent,
	ObjectSize,
	TotalRequestTime,
	TurnAroundTime,
	Referrer,
	UserAgent,
	VersionId,
	HostId,
	SignatureVersion,
	CipherSuite,
	AuthenticationType,
	HostHeader,
	TlsVersion,
}

impl Field {
	/// Every field in column order.
	pub const ALL: [Field; FIELD_COUNT] = [
		Field::OwnerId,
		Field::Bucket,
		Field::Timestamp,
		Field::IpAddress,
		Field::Requester,
		Field::RequestId,
		Field::RequestType,
		Field::BucketKey,
		Field::HttpMethod,
		Field::HttpPath,
		Field::HttpVersion,
		Field::HttpStatusCode,
		Field::ErrorCode,
		Field::BytesSent,
		Field::ObjectSize,
		Field::TotalRequestTime,
		Field::TurnAroundTime,
		Field::Referrer,
		Field::UserAgent,
		Field::VersionId,
		Field::HostId,
		Field::SignatureVersion,
		Field::CipherSuite,
		Field::AuthenticationType,
		Field::HostHeader,
		Field::TlsVersion,
	];

	/// Column header used in the tabular output.
	pub fn name(self) -> &'static str {
		match self {
			Field::OwnerId => "owner_id",
			Field::Bucket => "bucket",
			Field::Timestamp => "timestamp",
			Field::IpAddress => "ip_address",
			Field::Requester => "requester",
			Field::RequestId => "request_id",
			Field::RequestType => "request_type",
			Field::BucketKey => "bucket_key",
			Field::HttpMethod => "http_method",
			Field::HttpPath => "http_path",
			Field::HttpVersion => "http_version",
			Field::HttpStatusCode => "http_status_code",
			Field::ErrorCode => "error_code",
			Field::BytesSent => "bytes_sent",
			Field::ObjectSize => "object_size",
			Field::TotalRequestTime => "total_request_time",
			Field::TurnAroundTime => "turn_around_time",
			Field::Referrer => "referrer",
			Field::UserAgent => "user_agent",
			Field::VersionId => "version_id",
			Field::HostId => "host_id",
			Field::SignatureVersion => "signature_version",
			Field::CipherSuite => "cipher_suite",
			Field::AuthenticationType => "authentication_type",
			Field::HostHeader => "host_header",
			Field::TlsVersion => "tls_version",
		}
	}

	/// Zero-based column position.
	pub fn position(self) -> usize {
		self as usize
	}
}

impl fmt::Display for Field {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Header row for the tabular output.
pub fn header() -> [&'static str; FIELD_COUNT] {
	Field::ALL.map(Field::name)
}

/// A normalized field value. `Absent` replaces the `-` sentinels of the
/// source format and is never rendered as a literal dash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
	Present(String),
	Absent,
}

impl FieldValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			FieldValue::Present(v) => Some(v.as_str()),
			FieldValue::Absent => None,
		}
	}

	pub fn is_absent(&self) -> bool {
		matches!(self, FieldValue::Absent)
	}
}

/// One normalized access-log line: exactly [`FIELD_COUNT`] values in
/// [`Field::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
	values: [FieldValue; FIELD_COUNT],
}

impl LogRecord {
	pub fn new(values: [FieldValue; FIELD_COUNT]) -> Self {
		Self { values }
	}

	pub fn get(&self, field: Field) -> &FieldValue {
		&self.values[field.position()]
	}

	pub fn values(&self) -> &[FieldValue; FIELD_COUNT] {
		&self.values
	}

	/// Pairs every column name with its value, in column order.
	pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
		Field::ALL.into_iter().zip(self.values.iter())
	}

	/// Cells for a CSV row; absent values become empty cells.
	pub fn to_row(&self) -> [&str; FIELD_COUNT] {
		let mut row = [""; FIELD_COUNT];
		for (cell, value) in row.iter_mut().zip(self.values.iter()) {
			*cell = value.as_str().unwrap_or("");
		}
		row
	}
}
