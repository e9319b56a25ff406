//! Testing utilities for wiretrace
//!
//! # Test server
//!
//! [`TestServer`] serves any tower service over real TCP so traces can be
//! checked against what a client actually sent and received. It attaches
//! a [`ConnectionInfo`](wiretrace_core::ConnectionInfo) to every request,
//! the same way a production accept loop would.

pub mod server;

pub use server::TestServer;

/// Install a `tracing` subscriber for test output.
///
/// Honors `RUST_LOG`, falling back to `wiretrace_core=debug`. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wiretrace_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
