//! Trace text for each part of an exchange.

use crate::classify::{self, BodyClass};
use crate::config::TraceConfig;
use crate::connection::{ConnectionInfo, TlsInfo};
use crate::filter::{self, Side};
use crate::sanitize::HeaderSanitizer;
use crate::writer::Trace;
use chrono::{DateTime, Local, Utc};
use http::header::HOST;
use http::request::Parts;
use http::{HeaderMap, StatusCode, Version};
use std::time::Duration;

/// `Sat Jan 25 20:12:36 UTC 2020`
const CERT_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

/// Host as the client addressed it: the `Host` header, else the URI authority.
pub(crate) fn request_host(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HOST)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .or_else(|| parts.uri.authority().map(|a| a.as_str().to_owned()))
}

fn path_and_query(parts: &Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/")
}

/// Status lines printed before the request head.
pub(crate) fn preamble(
    trace: &mut Trace,
    config: &TraceConfig,
    parts: &Parts,
    connection: Option<&ConnectionInfo>,
    filter_note: Option<String>,
) {
    if let Some(note) = filter_note {
        trace.note(note);
    }

    let tls = connection.and_then(|conn| conn.tls.as_ref());

    if !config.skip_request_info {
        let scheme = if tls.is_some() {
            "https"
        } else {
            parts.uri.scheme_str().unwrap_or("http")
        };
        let host = request_host(parts).unwrap_or_default();
        trace.note(format!("Request to {scheme}://{host}{}", path_and_query(parts)));

        if let Some(conn) = connection {
            trace.note(format!("Request from {}", conn.remote_addr));
        }
    }

    if config.time {
        trace.note(format!("Request at {}", Local::now().to_rfc3339()));
    }

    if config.tls {
        if let Some(tls) = tls {
            tls_summary(trace, tls);
        }
    }
}

fn tls_summary(trace: &mut Trace, tls: &TlsInfo) {
    trace.note(format!(
        "TLS connection using {} / {}",
        tls.version, tls.cipher_suite
    ));

    if let Some(alpn) = &tls.alpn {
        trace.note(format!("ALPN: {alpn} accepted"));
    }

    if let Some(cert) = &tls.peer_certificate {
        trace.note("Client certificate:");
        trace.note(format!(" subject: {}", cert.subject));
        trace.note(format!(" start date: {}", cert_date(&cert.not_before)));
        trace.note(format!(" expire date: {}", cert_date(&cert.not_after)));
        trace.note(format!(" issuer: {}", cert.issuer));
    }
}

fn cert_date(date: &DateTime<Utc>) -> String {
    date.format(CERT_DATE_FORMAT).to_string()
}

/// `> GET /path HTTP/1.1`, the header block and the separator.
pub(crate) fn request_head(trace: &mut Trace, sanitizer: &HeaderSanitizer, parts: &Parts) {
    trace.line(format!(
        "> {} {} {}",
        parts.method,
        path_and_query(parts),
        version_str(parts.version)
    ));

    let host = request_host(parts);
    for line in sanitizer.render(">", &parts.headers, host.as_deref()) {
        trace.line(line);
    }
    trace.blank();
}

/// `< HTTP/1.1 200 OK`, the header block and the separator.
pub(crate) fn response_head(
    trace: &mut Trace,
    sanitizer: &HeaderSanitizer,
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
) {
    let status_line = format!(
        "< {} {} {}",
        version_str(version),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    trace.line(status_line.trim_end());

    for line in sanitizer.render("<", headers, None) {
        trace.line(line);
    }
    trace.blank();
}

/// A body as seen by one side of the exchange.
pub(crate) struct BodyView<'a> {
    pub(crate) side: Side,
    pub(crate) headers: &'a HeaderMap,
    /// Captured bytes; the whole body unless it outgrew the capture cap.
    pub(crate) bytes: &'a [u8],
    /// Bytes that went over the wire.
    pub(crate) observed: u64,
    pub(crate) limit: Option<usize>,
}

/// Body filter, then size and content checks, then formatters.
pub(crate) fn body(trace: &mut Trace, config: &TraceConfig, view: BodyView<'_>) {
    let decision = filter::apply_body_filter(config.body_filter.as_ref(), view.side, view.headers);
    if let Some(note) = decision.note {
        trace.note(note);
    }
    if !decision.print {
        return;
    }

    let media_type = classify::media_type(view.headers);
    let class = classify::classify(
        media_type.as_deref(),
        view.bytes,
        view.observed,
        classify::declared_length(view.headers),
        view.limit,
    );

    match class {
        BodyClass::Empty => {}
        BodyClass::TooLong { size, limit } => trace.note(format!(
            "body is too long ({size} bytes) to print, skipping (longer than {limit} bytes)"
        )),
        BodyClass::Binary => trace.note("body contains binary data"),
        BodyClass::Text => {
            let formatted = config
                .formatters
                .format(media_type.as_deref().unwrap_or_default(), view.bytes);
            for note in formatted.notes {
                trace.note(note);
            }
            trace.line(formatted.text);
        }
    }
}

/// Whether a response to `method` with `status` may carry a body.
pub(crate) fn response_has_body(is_head: bool, status: StatusCode) -> bool {
    !(is_head
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

pub(crate) fn took(trace: &mut Trace, elapsed: Duration) {
    trace.note(format!("Request took {elapsed:?}"));
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}
