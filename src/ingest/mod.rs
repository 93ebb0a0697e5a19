pub mod line_reader;
pub mod normalizer;
pub mod record;
pub mod tokenizer;

#[cfg(test)]
pub mod test_utils;

pub use line_reader::{FileSummary, ReadError, read_staged_file};
pub use normalizer::{NormalizeError, normalize, normalize_timestamp, normalize_value};
pub use record::{FIELD_COUNT, Field, FieldValue, LogRecord, header};
pub use tokenizer::{RawTokens, TokenizeError, tokenize};

use thiserror::Error;

/// A line that was dropped. Never fatal; the reader counts it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineParseFailure {
	#[error(transparent)]
	Grammar(#[from] TokenizeError),
	#[error(transparent)]
	Normalize(#[from] NormalizeError),
}

/// Tokenize and normalize one access log line.
pub fn parse_line(line: &str) -> Result<LogRecord, LineParseFailure> {
	let tokens = tokenize(line)?;
	Ok(normalize(&tokens)?)
}
