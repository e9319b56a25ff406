//! Header rendering with skip lists and credential masking.

use http::header::{AUTHORIZATION, COOKIE, HOST, PROXY_AUTHORIZATION, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashSet;

/// Replacement for secret values. Fixed width so the mask leaks no length.
pub const MASK: &str = "████████████████████";

/// Renders header blocks for one side of an exchange.
#[derive(Debug, Clone, Default)]
pub struct HeaderSanitizer {
    skip: HashSet<HeaderName>,
    sensitive: HashSet<HeaderName>,
    enabled: bool,
}

impl HeaderSanitizer {
    /// `skip` names are omitted, `sensitive` names are masked wholesale and
    /// `enabled` switches credential masking on.
    pub fn new(skip: HashSet<HeaderName>, sensitive: HashSet<HeaderName>, enabled: bool) -> Self {
        Self {
            skip,
            sensitive,
            enabled,
        }
    }

    /// Whether a header is left out of the trace.
    pub fn is_skipped(&self, name: &HeaderName) -> bool {
        self.skip.contains(name)
    }

    /// Render a header block as `"<prefix> Name: value"` lines.
    ///
    /// When `host` is given it is printed first as the `Host` line and any
    /// `Host` header in the map is not repeated. Names are sorted, values of
    /// one name keep their wire order.
    pub fn render(&self, prefix: &str, headers: &HeaderMap, host: Option<&str>) -> Vec<String> {
        let mut lines = Vec::with_capacity(headers.len() + 1);

        if let Some(host) = host {
            if !self.is_skipped(&HOST) {
                lines.push(format!("{prefix} Host: {host}"));
            }
        }

        let mut names: Vec<&HeaderName> = headers
            .keys()
            .filter(|name| !(host.is_some() && **name == HOST))
            .filter(|name| !self.is_skipped(name))
            .collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        for name in names {
            let canonical = canonical_name(name);
            for value in headers.get_all(name) {
                lines.push(format!("{prefix} {canonical}: {}", self.value(name, value)));
            }
        }

        lines
    }

    /// The printable form of one header value, masked when needed.
    pub fn value(&self, name: &HeaderName, value: &HeaderValue) -> String {
        let raw = String::from_utf8_lossy(value.as_bytes());
        if !self.enabled {
            return raw.into_owned();
        }

        if self.sensitive.contains(name) {
            return MASK.to_string();
        }

        if name == AUTHORIZATION || name == PROXY_AUTHORIZATION {
            mask_credentials(&raw)
        } else if name == COOKIE {
            mask_cookie(&raw)
        } else if name == SET_COOKIE {
            mask_set_cookie(&raw)
        } else {
            raw.into_owned()
        }
    }
}

/// `user-agent` becomes `User-Agent`.
pub fn canonical_name(name: &HeaderName) -> String {
    let mut out = String::with_capacity(name.as_str().len());
    let mut upper = true;
    for c in name.as_str().chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

fn mask_credentials(value: &str) -> String {
    match value.trim().split_once(' ') {
        Some((scheme, _)) if !scheme.is_empty() => format!("{scheme} {MASK}"),
        _ => MASK.to_string(),
    }
}

fn mask_cookie(value: &str) -> String {
    value
        .split(';')
        .map(str::trim)
        .filter(|crumb| !crumb.is_empty())
        .map(|crumb| match crumb.split_once('=') {
            Some((name, _)) => format!("{}={MASK}", name.trim()),
            None => MASK.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn mask_set_cookie(value: &str) -> String {
    let (pair, attributes) = match value.split_once(';') {
        Some((pair, rest)) => (pair, Some(rest)),
        None => (value, None),
    };

    let masked = match pair.split_once('=') {
        Some((name, _)) => format!("{}={MASK}", name.trim()),
        None => MASK.to_string(),
    };

    match attributes {
        Some(rest) => format!("{masked};{rest}"),
        None => masked,
    }
}
