//! Body classification: empty, too long, binary or printable text.

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;

/// How many leading bytes are inspected when sniffing for binary content.
pub const SNIFF_LEN: usize = 512;

/// What the renderer should do with a captured body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyClass {
    /// Nothing to print.
    Empty,
    /// Larger than the configured ceiling.
    TooLong { size: u64, limit: usize },
    /// Not printable as text.
    Binary,
    /// Safe to print.
    Text,
}

/// Lowercased essence of the `Content-Type` header, without parameters.
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

/// The `Content-Length` header, when present and well formed.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Media types that are never printed, whatever their bytes look like.
pub fn is_binary_media_type(media_type: &str) -> bool {
    let Some((kind, subtype)) = media_type.split_once('/') else {
        return false;
    };

    match kind {
        "image" => subtype != "svg+xml",
        "audio" | "video" | "font" => true,
        "application" => matches!(
            subtype,
            "octet-stream"
                | "pdf"
                | "zip"
                | "gzip"
                | "x-gzip"
                | "x-tar"
                | "wasm"
                | "x-protobuf"
                | "protobuf"
                | "grpc"
        ),
        _ => false,
    }
}

/// Sniff the start of a body for binary content.
///
/// Only the first [`SNIFF_LEN`] bytes are examined. A UTF-8 byte order mark
/// means text. A NUL byte or an invalid UTF-8 sequence means binary, except
/// for a multi-byte character cut off by the end of the sample. Otherwise the
/// sample is binary when more than 30% of it is control bytes other than
/// tab, newline, carriage return, form feed and escape.
pub fn looks_binary(body: &[u8]) -> bool {
    let sample = &body[..body.len().min(SNIFF_LEN)];
    if sample.is_empty() || sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    if let Err(err) = std::str::from_utf8(sample) {
        if err.error_len().is_some() {
            return true;
        }
    }

    let control = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f)
        .count();
    control * 10 > sample.len() * 3
}

/// Decide how a body is presented.
///
/// `observed` is the number of bytes seen on the wire and `declared` the
/// advertised `Content-Length`; the declared size wins when known. A body
/// with no bytes on the wire is empty whatever it declared.
pub fn classify(
    media_type: Option<&str>,
    sample: &[u8],
    observed: u64,
    declared: Option<u64>,
    limit: Option<usize>,
) -> BodyClass {
    if observed == 0 {
        return BodyClass::Empty;
    }
    let size = declared.unwrap_or(observed);

    if let Some(limit) = limit {
        if size > limit as u64 {
            return BodyClass::TooLong { size, limit };
        }
    }

    if media_type.is_some_and(is_binary_media_type) || looks_binary(sample) {
        return BodyClass::Binary;
    }

    BodyClass::Text
}
