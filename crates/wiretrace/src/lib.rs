//! # wiretrace
//!
//! An in-process HTTP traffic inspector for tower services.
//!
//! Wrap a service in [`TraceLayer`] and every request and response passing
//! through it is printed in a curl-like layout: the request line and headers
//! prefixed with `> `, the response status and headers prefixed with `< `,
//! bodies in between. Credentials in `Authorization`, `Cookie` and
//! `Set-Cookie` headers are masked by default.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wiretrace::prelude::*;
//!
//! let layer = TraceLayer::new(
//!     TraceConfig::verbose()
//!         .skip_header("x-request-id")
//!         .formatter(JsonFormatter)
//!         .writer(TraceWriter::stderr()),
//! )?;
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service_fn(handler);
//! ```
//!
//! A traced exchange looks like this:
//!
//! ```text
//! * Request to http://localhost:8080/hello
//! * Request from 127.0.0.1:51234
//! > GET /hello HTTP/1.1
//! > Host: localhost:8080
//! > Authorization: Bearer ████████████████████
//!
//! < HTTP/1.1 200 OK
//! < Content-Type: text/plain
//!
//! Hello, world!
//! ```
//!
//! ## Connection details
//!
//! The layer only sees what is in the request. Accept loops that want the
//! `* Request from` and TLS lines insert a [`ConnectionInfo`] into the
//! request extensions before the request reaches the layer.
//!
//! ## Optional Features
//!
//! - `config` (default) - build a [`TraceConfig`] from `WIRETRACE_*`
//!   environment variables, with `.env` file support
//!
//! ```toml
//! [dependencies]
//! wiretrace = { version = "0.1", default-features = false }
//! ```

// Re-export core functionality
pub use wiretrace_core::*;

/// Prelude module - import everything you need with `use wiretrace::prelude::*`
pub mod prelude {
    pub use wiretrace_core::{
        hide,
        BodyFilter,
        // Errors
        BoxError,
        ConfigError,
        // Connection metadata
        ConnectionInfo,
        FilterError,
        FlushStrategy,
        FormatError,
        // Formatting
        Formatter,
        FormatterRegistry,
        HideLayer,
        JsonFormatter,
        MemorySink,
        RequestBody,
        RequestFilter,
        TlsInfo,
        // Configuration
        TraceConfig,
        // Middleware
        TraceLayer,
        TraceService,
        // Output
        TraceWriter,
    };

    #[cfg(feature = "config")]
    pub use wiretrace_core::{load_dotenv, load_dotenv_from, TraceSettings};

    // Re-export commonly used external types
    pub use tower::{Layer, Service, ServiceBuilder};
}
