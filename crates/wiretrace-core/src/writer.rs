//! Output sinks and per-request trace buffering.
//!
//! A [`TraceWriter`] is the only state shared between concurrent requests.
//! Each request assembles its text in a private [`Trace`] and hands complete
//! sections to the writer, which appends each one under a single lock so two
//! requests never interleave inside a section.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// When a request's trace reaches the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushStrategy {
    /// Write each section (request, then response) as soon as it is rendered.
    #[default]
    Streaming,
    /// Buffer the whole trace and write it once the response has completed.
    OnEnd,
}

/// Thread-safe handle to the trace output.
///
/// Cloning is cheap; all clones append to the same sink.
///
/// # Example
///
/// ```
/// use wiretrace_core::{MemorySink, TraceWriter};
///
/// let sink = MemorySink::new();
/// let writer = TraceWriter::new(sink.clone());
/// writer.emit("* Request to http://example.com/\n");
/// assert_eq!(sink.contents(), "* Request to http://example.com/\n");
/// ```
#[derive(Clone)]
pub struct TraceWriter {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl TraceWriter {
    /// Write traces to any `Write` implementation.
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Write traces to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write traces to standard error.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Append traces to a file, creating it if needed.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(file))
    }

    /// Append `text` to the sink as one unit.
    ///
    /// Failures are logged and dropped: tracing must never break the
    /// exchange it observes.
    pub fn emit(&self, text: &str) {
        if text.is_empty() {
            return;
        }

        let mut sink = match self.sink.lock() {
            Ok(sink) => sink,
            Err(poisoned) => {
                tracing::warn!("trace output lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        if let Err(err) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            tracing::warn!(error = %err, bytes = text.len(), "failed to write trace");
        }
    }
}

impl Default for TraceWriter {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceWriter").finish_non_exhaustive()
    }
}

/// In-memory sink, handy for tests and for inspecting traces in-process.
#[derive(Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything written so far.
    pub fn clear(&self) {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink").field("len", &self.len()).finish()
    }
}

/// The text of one request/response pair while it is being rendered.
///
/// Owned by a single request. Lines are appended in order; the flush
/// strategy decides whether finished sections leave early.
pub(crate) struct Trace {
    writer: TraceWriter,
    flush: FlushStrategy,
    buf: String,
}

impl Trace {
    pub(crate) fn new(writer: TraceWriter, flush: FlushStrategy) -> Self {
        Self {
            writer,
            flush,
            buf: String::new(),
        }
    }

    /// Append a line; the newline is added here.
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    /// Append a `*` status line, used for metadata and soft errors alike.
    pub(crate) fn note(&mut self, text: impl AsRef<str>) {
        self.buf.push_str("* ");
        self.line(text);
    }

    /// Append an empty separator line.
    pub(crate) fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// A logical section (request or response) is complete.
    pub(crate) fn section_done(&mut self) {
        if self.flush == FlushStrategy::Streaming {
            self.emit_pending();
        }
    }

    /// Emit whatever is left.
    pub(crate) fn finish(mut self) {
        self.emit_pending();
    }

    fn emit_pending(&mut self) {
        if !self.buf.is_empty() {
            self.writer.emit(&self.buf);
            self.buf.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &str {
        &self.buf
    }
}
