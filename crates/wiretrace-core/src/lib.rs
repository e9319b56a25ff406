//! # wiretrace core
//!
//! The capture, filter, format and render pipeline behind wiretrace.
//!
//! This crate is not meant to be used directly. Use `wiretrace` instead.

mod capture;
pub mod classify;
mod config;
mod connection;
mod error;
mod fault;
mod filter;
mod format;
mod layer;
mod render;
pub mod sanitize;
mod writer;

// Public API
pub use capture::{CaptureBuffer, TeeBody};
pub use config::{TraceConfig, DEFAULT_MAX_RESPONSE_BODY};
#[cfg(feature = "config")]
pub use config::{load_dotenv, load_dotenv_from, TraceSettings};
pub use connection::{hide, ConnectionInfo, Hide, HideLayer, HideService, PeerCertificate, TlsInfo};
pub use error::{BodyLimitSide, BoxError, ConfigError, FilterError, FormatError};
pub use filter::{BodyFilter, RequestFilter};
pub use format::{Formatter, FormatterRegistry, JsonFormatter};
pub use layer::{RequestBody, TraceLayer, TraceService};
pub use writer::{FlushStrategy, MemorySink, TraceWriter};
