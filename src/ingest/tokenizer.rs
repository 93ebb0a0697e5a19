//! Positional scanner for one server access log line.
//!
//! The line shape is fixed:
//!
//! ```text
//! owner bucket [time offset] ip requester request_id operation key "method path version"
//! status error bytes_sent object_size total_time turn_around referrer "user agent"
//! version_id host_id sig_version cipher auth_type host_header tls_version
//! ```
//!
//! Fields are separated by exactly one space. The timestamp is bracketed, the
//! request line is double-quoted, and the referrer, user agent and version id
//! may each be double-quoted (quoted values can hold spaces). Anything after
//! the TLS version is ignored, so newer log formats with extra trailing
//! columns still tokenize.

use thiserror::Error;

use super::record::{FIELD_COUNT, Field};

/// Why a line did not match the access log grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
	#[error("line ended before field `{0}`")]
	MissingField(Field),
	#[error("expected a single space before field `{0}`")]
	MissingSeparator(Field),
	#[error("field `{0}` is empty")]
	EmptyField(Field),
	#[error("expected `{expected}` to open field `{field}`")]
	MissingDelimiter { field: Field, expected: char },
	#[error("unterminated bracket in field `{0}`")]
	UnterminatedBracket(Field),
	#[error("unterminated quote in field `{0}`")]
	UnterminatedQuote(Field),
	#[error("request line must hold method, path and version")]
	IncompleteRequestLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
	/// One or more non-space characters.
	Bare,
	/// `[date-time offset]`; only the date-time part is kept.
	Bracketed,
	/// `"method path version"`, filling three consecutive fields.
	RequestLine,
	/// A double-quoted group, or a bare token when no quote opens it.
	MaybeQuoted,
}

const LAYOUT: [(Field, Shape); FIELD_COUNT - 2] = [
	(Field::OwnerId, Shape::Bare),
	(Field::Bucket, Shape::Bare),
	(Field::Timestamp, Shape::Bracketed),
	(Field::IpAddress, Shape::Bare),
	(Field::Requester, Shape::Bare),
	(Field::RequestId, Shape::Bare),
	(Field::RequestType, Shape::Bare),
	(Field::BucketKey, Shape::Bare),
	(Field::HttpMethod, Shape::RequestLine),
	(Field::HttpStatusCode, Shape::Bare),
	(Field::ErrorCode, Shape::Bare),
	(Field::BytesSent, Shape::Bare),
	(Field::ObjectSize, Shape::Bare),
	(Field::TotalRequestTime, Shape::Bare),
	(Field::TurnAroundTime, Shape::Bare),
	(Field::Referrer, Shape::MaybeQuoted),
	(Field::UserAgent, Shape::MaybeQuoted),
	(Field::VersionId, Shape::MaybeQuoted),
	(Field::HostId, Shape::Bare),
	(Field::SignatureVersion, Shape::Bare),
	(Field::CipherSuite, Shape::Bare),
	(Field::AuthenticationType, Shape::Bare),
	(Field::HostHeader, Shape::Bare),
	(Field::TlsVersion, Shape::Bare),
];

/// The 26 raw substrings of one line, borrowed from it. Delimiters of the
/// bracketed and quoted groups are already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokens<'a> {
	tokens: [&'a str; FIELD_COUNT],
}

impl<'a> RawTokens<'a> {
	pub fn get(&self, field: Field) -> &'a str {
		self.tokens[field.position()]
	}

	pub fn as_array(&self) -> &[&'a str; FIELD_COUNT] {
		&self.tokens
	}
}

/// Split a line into its 26 positional tokens.
pub fn tokenize(line: &str) -> Result<RawTokens<'_>, TokenizeError> {
	let mut scanner = Scanner { line, pos: 0 };
	let mut tokens = [""; FIELD_COUNT];

	for (i, (field, shape)) in LAYOUT.iter().copied().enumerate() {
		if i > 0 {
			scanner.separator(field)?;
		}
		match shape {
			Shape::Bare => tokens[field.position()] = scanner.bare(field)?,
			Shape::Bracketed => {
				let stamp = scanner.delimited(field, '[', ']')?;
				tokens[field.position()] = stamp.split_once(' ').map_or(stamp, |(dt, _)| dt);
			}
			Shape::RequestLine => {
				let request = scanner.delimited(field, '"', '"')?;
				let mut parts = request.splitn(3, ' ');
				let (Some(method), Some(path), Some(version)) =
					(parts.next(), parts.next(), parts.next())
				else {
					return Err(TokenizeError::IncompleteRequestLine);
				};
				if method.is_empty() || path.is_empty() || version.is_empty() {
					return Err(TokenizeError::IncompleteRequestLine);
				}
				tokens[Field::HttpMethod.position()] = method;
				tokens[Field::HttpPath.position()] = path;
				tokens[Field::HttpVersion.position()] = version;
			}
			Shape::MaybeQuoted => {
				tokens[field.position()] = if scanner.rest().starts_with('"') {
					scanner.delimited(field, '"', '"')?
				} else {
					scanner.bare(field)?
				};
			}
		}
	}

	Ok(RawTokens { tokens })
}

struct Scanner<'a> {
	line: &'a str,
	pos: usize,
}

impl<'a> Scanner<'a> {
	fn rest(&self) -> &'a str {
		&self.line[self.pos..]
	}

	fn separator(&mut self, next: Field) -> Result<(), TokenizeError> {
		let rest = self.rest();
		if rest.is_empty() {
			return Err(TokenizeError::MissingField(next));
		}
		if !rest.starts_with(' ') {
			return Err(TokenizeError::MissingSeparator(next));
		}
		self.pos += 1;
		Ok(())
	}

	fn bare(&mut self, field: Field) -> Result<&'a str, TokenizeError> {
		let rest = self.rest();
		if rest.is_empty() {
			return Err(TokenizeError::MissingField(field));
		}
		let end = rest.find(' ').unwrap_or(rest.len());
		if end == 0 {
			return Err(TokenizeError::EmptyField(field));
		}
		self.pos += end;
		Ok(&rest[..end])
	}

	fn delimited(&mut self, field: Field, open: char, close: char) -> Result<&'a str, TokenizeError> {
		let rest = self.rest();
		if rest.is_empty() {
			return Err(TokenizeError::MissingField(field));
		}
		let Some(body) = rest.strip_prefix(open) else {
			return Err(TokenizeError::MissingDelimiter {
				field,
				expected: open,
			});
		};
		let Some(end) = find_close(body, close) else {
			return Err(if open == '[' {
				TokenizeError::UnterminatedBracket(field)
			} else {
				TokenizeError::UnterminatedQuote(field)
			});
		};
		if end == 0 {
			return Err(TokenizeError::EmptyField(field));
		}
		self.pos += open.len_utf8() + end + close.len_utf8();
		Ok(&body[..end])
	}
}

// Backslash escapes a quote inside a quoted group; brackets have no escapes.
fn find_close(body: &str, close: char) -> Option<usize> {
	if close != '"' {
		return body.find(close);
	}
	let mut escaped = false;
	for (i, c) in body.char_indices() {
		match c {
			_ if escaped => escaped = false,
			'\\' => escaped = true,
			'"' => return Some(i),
			_ => {}
		}
	}
	None
}
