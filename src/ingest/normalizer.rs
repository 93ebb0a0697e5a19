use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::record::{FIELD_COUNT, Field, FieldValue, LogRecord};
use super::tokenizer::RawTokens;

/// Layout of the timestamp as it appears inside the log's brackets.
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";
/// Layout of the timestamp column in the output.
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// chrono accepts unpadded numbers, so the shape is pinned separately.
static TIMESTAMP_SHAPE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2}$").expect("timestamp shape regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
	#[error("invalid timestamp: {0}")]
	InvalidTimestamp(String),
}

/// Map a raw token to a field value: `-`, `'-'` and `"-"` are absent,
/// everything else passes through unchanged.
pub fn normalize_value(token: &str) -> FieldValue {
	match token {
		"-" | "'-'" | "\"-\"" => FieldValue::Absent,
		other => FieldValue::Present(other.to_string()),
	}
}

/// Rewrite `06/Feb/2019:00:00:38` as `2019-02-06 00:00:38`.
pub fn normalize_timestamp(token: &str) -> Result<String, NormalizeError> {
	if !TIMESTAMP_SHAPE.is_match(token) {
		return Err(NormalizeError::InvalidTimestamp(token.to_string()));
	}
	let parsed = NaiveDateTime::parse_from_str(token, SOURCE_TIMESTAMP_FORMAT)
		.map_err(|_| NormalizeError::InvalidTimestamp(token.to_string()))?;
	Ok(parsed.format(OUTPUT_TIMESTAMP_FORMAT).to_string())
}

/// Build a [`LogRecord`] from a tokenized line.
pub fn normalize(tokens: &RawTokens<'_>) -> Result<LogRecord, NormalizeError> {
	let timestamp = normalize_timestamp(tokens.get(Field::Timestamp))?;

	let values: [FieldValue; FIELD_COUNT] = std::array::from_fn(|i| {
		if i == Field::Timestamp.position() {
			FieldValue::Present(timestamp.clone())
		} else {
			normalize_value(tokens.as_array()[i])
		}
	});

	Ok(LogRecord::new(values))
}
