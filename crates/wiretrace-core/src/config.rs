//! Configuration for the [`TraceLayer`](crate::TraceLayer).
//!
//! [`TraceConfig`] is a plain builder. Nothing is checked until the layer is
//! built, at which point bad header names or zero body limits are rejected.
//! A built layer holds an immutable snapshot of its configuration; to change
//! settings, build a new layer.

use crate::error::{BodyLimitSide, ConfigError, FilterError};
use crate::filter::{BodyFilter, RequestFilter};
use crate::format::{Formatter, FormatterRegistry};
use crate::sanitize::HeaderSanitizer;
use crate::writer::{FlushStrategy, TraceWriter};
use http::request::Parts;
use http::{HeaderMap, HeaderName};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Default ceiling for printed response bodies, in bytes.
pub const DEFAULT_MAX_RESPONSE_BODY: usize = 4096;

/// What to trace and where to write it.
///
/// ```
/// use wiretrace_core::{JsonFormatter, TraceConfig};
///
/// let config = TraceConfig::new()
///     .request_header(true)
///     .response_header(true)
///     .response_body(true)
///     .max_response_body(16 * 1024)
///     .skip_header("x-request-id")
///     .formatter(JsonFormatter);
/// ```
#[derive(Clone)]
pub struct TraceConfig {
    pub(crate) request_header: bool,
    pub(crate) request_body: bool,
    pub(crate) response_header: bool,
    pub(crate) response_body: bool,
    pub(crate) tls: bool,
    pub(crate) time: bool,
    pub(crate) skip_request_info: bool,
    pub(crate) skip_sanitize: bool,

    /// Request bodies above this size print a placeholder. Unbounded by default.
    pub(crate) max_request_body: Option<usize>,

    /// Response bodies above this size print a placeholder. Default: 4096.
    pub(crate) max_response_body: usize,

    pub(crate) skip_headers: Vec<String>,
    pub(crate) sensitive_headers: Vec<String>,
    pub(crate) formatters: FormatterRegistry,
    pub(crate) request_filter: Option<RequestFilter>,
    pub(crate) body_filter: Option<BodyFilter>,
    pub(crate) flush: FlushStrategy,
    pub(crate) writer: TraceWriter,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceConfig {
    /// The minimal configuration: request lines only, written to stdout.
    pub fn new() -> Self {
        Self {
            request_header: false,
            request_body: false,
            response_header: false,
            response_body: false,
            tls: false,
            time: false,
            skip_request_info: false,
            skip_sanitize: false,
            max_request_body: None,
            max_response_body: DEFAULT_MAX_RESPONSE_BODY,
            skip_headers: Vec::new(),
            sensitive_headers: Vec::new(),
            formatters: FormatterRegistry::new(),
            request_filter: None,
            body_filter: None,
            flush: FlushStrategy::default(),
            writer: TraceWriter::default(),
        }
    }

    /// Headers and bodies on both sides.
    pub fn verbose() -> Self {
        Self::new()
            .request_header(true)
            .request_body(true)
            .response_header(true)
            .response_body(true)
    }

    /// Print the request line and request headers.
    pub fn request_header(mut self, enabled: bool) -> Self {
        self.request_header = enabled;
        self
    }

    /// Print the request body.
    pub fn request_body(mut self, enabled: bool) -> Self {
        self.request_body = enabled;
        self
    }

    /// Print the status line and response headers.
    pub fn response_header(mut self, enabled: bool) -> Self {
        self.response_header = enabled;
        self
    }

    /// Print the response body.
    pub fn response_body(mut self, enabled: bool) -> Self {
        self.response_body = enabled;
        self
    }

    /// Print the TLS summary when the connection carries TLS metadata.
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Print the request timestamp and the time taken.
    pub fn time(mut self, enabled: bool) -> Self {
        self.time = enabled;
        self
    }

    /// Leave out the `* Request to` and `* Request from` lines.
    pub fn skip_request_info(mut self, skip: bool) -> Self {
        self.skip_request_info = skip;
        self
    }

    /// Print credentials and cookies unmasked.
    pub fn skip_sanitize(mut self, skip: bool) -> Self {
        self.skip_sanitize = skip;
        self
    }

    /// Ceiling for printed request bodies.
    pub fn max_request_body(mut self, bytes: usize) -> Self {
        self.max_request_body = Some(bytes);
        self
    }

    /// Ceiling for printed response bodies.
    pub fn max_response_body(mut self, bytes: usize) -> Self {
        self.max_response_body = bytes;
        self
    }

    /// Leave a header out of the trace. Case-insensitive.
    pub fn skip_header(mut self, name: impl Into<String>) -> Self {
        self.skip_headers.push(name.into());
        self
    }

    /// Leave several headers out of the trace.
    pub fn skip_headers(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skip_headers.extend(names.into_iter().map(Into::into));
        self
    }

    /// Mask a header's whole value, in addition to the built-in credential
    /// headers.
    pub fn sensitive_header(mut self, name: impl Into<String>) -> Self {
        self.sensitive_headers.push(name.into());
        self
    }

    /// Register a body formatter. Formatters are tried in registration order.
    pub fn formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatters.push(Arc::new(formatter));
        self
    }

    /// Replace the formatter list.
    pub fn formatters(mut self, formatters: FormatterRegistry) -> Self {
        self.formatters = formatters;
        self
    }

    /// Decide per request whether to trace it. Returning `Ok(true)` skips
    /// the request.
    pub fn request_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Parts) -> Result<bool, FilterError> + Send + Sync + 'static,
    {
        self.request_filter = Some(Arc::new(filter));
        self
    }

    /// Decide per body whether to print it, given that side's headers.
    /// Returning `Ok(true)` skips the body.
    pub fn body_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&HeaderMap) -> Result<bool, FilterError> + Send + Sync + 'static,
    {
        self.body_filter = Some(Arc::new(filter));
        self
    }

    /// When traces reach the output.
    pub fn flush(mut self, flush: FlushStrategy) -> Self {
        self.flush = flush;
        self
    }

    /// Where traces are written.
    pub fn writer(mut self, writer: TraceWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Check the configuration and prepare the header sanitizer.
    pub(crate) fn validate(&self) -> Result<HeaderSanitizer, ConfigError> {
        if self.max_response_body == 0 {
            return Err(ConfigError::ZeroBodyLimit(BodyLimitSide::Response));
        }
        if self.max_request_body == Some(0) {
            return Err(ConfigError::ZeroBodyLimit(BodyLimitSide::Request));
        }

        let skip = parse_header_names(&self.skip_headers)?;
        let sensitive = parse_header_names(&self.sensitive_headers)?;
        Ok(HeaderSanitizer::new(skip, sensitive, !self.skip_sanitize))
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceConfig")
            .field("request_header", &self.request_header)
            .field("request_body", &self.request_body)
            .field("response_header", &self.response_header)
            .field("response_body", &self.response_body)
            .field("tls", &self.tls)
            .field("time", &self.time)
            .field("skip_request_info", &self.skip_request_info)
            .field("skip_sanitize", &self.skip_sanitize)
            .field("max_request_body", &self.max_request_body)
            .field("max_response_body", &self.max_response_body)
            .field("skip_headers", &self.skip_headers)
            .field("sensitive_headers", &self.sensitive_headers)
            .field("formatters", &self.formatters)
            .field("request_filter", &self.request_filter.is_some())
            .field("body_filter", &self.body_filter.is_some())
            .field("flush", &self.flush)
            .finish()
    }
}

fn parse_header_names(names: &[String]) -> Result<HashSet<HeaderName>, ConfigError> {
    names
        .iter()
        .map(|name| {
            HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName(name.clone()))
        })
        .collect()
}

#[cfg(feature = "config")]
pub use env::{load_dotenv, load_dotenv_from, TraceSettings};

#[cfg(feature = "config")]
mod env {
    use super::TraceConfig;
    use crate::error::ConfigError;
    use crate::writer::{FlushStrategy, TraceWriter};
    use serde::Deserialize;

    /// Environment prefix for [`TraceSettings::from_env`].
    const PREFIX: &str = "WIRETRACE_";

    /// Serializable subset of [`TraceConfig`], typically read from the
    /// environment.
    ///
    /// Each field maps to a `WIRETRACE_` variable: `WIRETRACE_REQUEST_HEADER=true`,
    /// `WIRETRACE_SKIP_HEADERS=authorization,cookie`, `WIRETRACE_FLUSH=on-end`,
    /// `WIRETRACE_OUTPUT=stderr` and so on. `OUTPUT` accepts `stdout`,
    /// `stderr` or a file path.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    pub struct TraceSettings {
        pub request_header: bool,
        pub request_body: bool,
        pub response_header: bool,
        pub response_body: bool,
        pub tls: bool,
        pub time: bool,
        pub skip_request_info: bool,
        pub skip_sanitize: bool,
        pub max_request_body: Option<usize>,
        pub max_response_body: Option<usize>,
        pub skip_headers: Vec<String>,
        pub sensitive_headers: Vec<String>,
        pub flush: FlushStrategy,
        pub output: Option<String>,
    }

    impl TraceSettings {
        /// Read settings from `WIRETRACE_*` environment variables.
        pub fn from_env() -> Result<Self, ConfigError> {
            Ok(envy::prefixed(PREFIX).from_env::<Self>()?)
        }
    }

    impl TraceConfig {
        /// Apply settings on top of the defaults.
        ///
        /// Fails only when `output` names a file that cannot be opened.
        pub fn from_settings(settings: TraceSettings) -> Result<Self, ConfigError> {
            let writer = match settings.output.as_deref().map(str::trim) {
                None | Some("") | Some("stdout") => TraceWriter::stdout(),
                Some("stderr") => TraceWriter::stderr(),
                Some(path) => TraceWriter::file(path)?,
            };

            let mut config = TraceConfig::new()
                .request_header(settings.request_header)
                .request_body(settings.request_body)
                .response_header(settings.response_header)
                .response_body(settings.response_body)
                .tls(settings.tls)
                .time(settings.time)
                .skip_request_info(settings.skip_request_info)
                .skip_sanitize(settings.skip_sanitize)
                .skip_headers(settings.skip_headers)
                .flush(settings.flush)
                .writer(writer);

            for name in settings.sensitive_headers {
                config = config.sensitive_header(name);
            }
            if let Some(limit) = settings.max_request_body {
                config = config.max_request_body(limit);
            }
            if let Some(limit) = settings.max_response_body {
                config = config.max_response_body(limit);
            }

            Ok(config)
        }

        /// Shorthand for [`TraceSettings::from_env`] followed by
        /// [`TraceConfig::from_settings`].
        pub fn from_env() -> Result<Self, ConfigError> {
            Self::from_settings(TraceSettings::from_env()?)
        }
    }

    /// Load a `.env` file from the current directory, if there is one.
    pub fn load_dotenv() {
        let _ = dotenvy::dotenv();
    }

    /// Load environment variables from a specific file, if it exists.
    pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
        let _ = dotenvy::from_path(path);
    }

}
