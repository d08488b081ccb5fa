//! Per-test observation sink: log stream, request/response records and
//! attachments.
//!
//! # Design
//! A `Sink` belongs to exactly one test case. It buffers everything in memory
//! behind a mutex and writes the log file once, at `flush`. Nothing in here
//! returns an error to the caller: a failure to attach or persist is an
//! `ObservabilityError` that is logged to the buffer and to `tracing`, then
//! dropped, so instrumentation can never replace the outcome of the call or
//! step it was describing.
//!
//! JSON payloads are rendered through `codec::render_canonical`, which sorts
//! keys, so two runs of the same test produce diffable logs.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::codec;
use crate::error::ObservabilityError;
use crate::http::HttpMethod;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

/// One line of the plain-text log stream.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub at: OffsetDateTime,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.level.tag(), clock(self.at), self.message)
    }
}

/// Snapshot of one half of an HTTP exchange. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Request {
        at: OffsetDateTime,
        method: HttpMethod,
        endpoint: String,
        body: Option<String>,
    },
    Response {
        at: OffsetDateTime,
        method: HttpMethod,
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    /// The call produced no response at all.
    Failure {
        at: OffsetDateTime,
        method: HttpMethod,
        endpoint: String,
        message: String,
    },
}

/// A stored (label, mime type, content) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub label: String,
    pub mime: String,
    pub content: String,
}

/// Destination for attachments and step markers of a report.
pub trait AttachmentSink: Send + Sync {
    fn attach(&self, label: &str, mime: &str, content: &str) -> Result<(), ObservabilityError>;

    fn start_step(&self, _name: &str) -> Result<(), ObservabilityError> {
        Ok(())
    }

    fn stop_step(&self, _name: &str, _passed: bool) -> Result<(), ObservabilityError> {
        Ok(())
    }
}

/// Writes each attachment to its own file in a results directory, using the
/// `{uuid}-attachment.{ext}` naming the report builder picks up.
#[derive(Debug, Clone)]
pub struct DirectoryAttachments {
    dir: PathBuf,
}

impl DirectoryAttachments {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AttachmentSink for DirectoryAttachments {
    fn attach(&self, label: &str, mime: &str, content: &str) -> Result<(), ObservabilityError> {
        let ext = if mime == JSON { "json" } else { "txt" };
        let path = self.dir.join(format!("{}-attachment.{ext}", Uuid::new_v4()));
        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, content))
            .map_err(|e| ObservabilityError::Attachment {
                label: label.to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }
}

/// Keeps attachments and step markers in memory.
#[derive(Debug, Default)]
pub struct MemoryAttachments {
    items: Mutex<Vec<Attachment>>,
    steps: Mutex<Vec<(String, Option<bool>)>>,
}

impl MemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        lock(&self.items).clone()
    }

    /// Step names with their outcome; `None` while a step is still open.
    pub fn steps(&self) -> Vec<(String, Option<bool>)> {
        lock(&self.steps).clone()
    }
}

impl AttachmentSink for MemoryAttachments {
    fn attach(&self, label: &str, mime: &str, content: &str) -> Result<(), ObservabilityError> {
        lock(&self.items).push(Attachment {
            label: label.to_string(),
            mime: mime.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    fn start_step(&self, name: &str) -> Result<(), ObservabilityError> {
        lock(&self.steps).push((name.to_string(), None));
        Ok(())
    }

    fn stop_step(&self, name: &str, passed: bool) -> Result<(), ObservabilityError> {
        let mut steps = lock(&self.steps);
        if let Some(step) = steps.iter_mut().rev().find(|(n, done)| n == name && done.is_none()) {
            step.1 = Some(passed);
        }
        Ok(())
    }
}

/// Directory that receives one log file per test case. Shared by every test
/// in the process; writes are serialized.
#[derive(Debug)]
pub struct LogDirectory {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LogDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `contents` to `{test_name}_{yyyyMMdd_HHmmss}.log` and return the
    /// path. A name already taken gets a numeric suffix.
    pub fn write(&self, test_name: &str, at: OffsetDateTime, contents: &str) -> Result<PathBuf, ObservabilityError> {
        let _guard = lock(&self.write_lock);
        let stem = format!("{}_{}", file_safe(test_name), file_stamp(at));
        let log_error = |path: &Path, e: std::io::Error| ObservabilityError::LogFile {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(|e| log_error(&self.dir, e))?;
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.log")
            } else {
                format!("{stem}_{attempt}.log")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes()).map_err(|e| log_error(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(log_error(&path, e)),
            }
        }
    }
}

#[derive(Debug, Default)]
struct Buffer {
    lines: Vec<LogLine>,
    observations: Vec<Observation>,
    assertions: Vec<String>,
}

/// Observation sink scoped to one test case.
pub struct Sink {
    test_name: String,
    started_at: OffsetDateTime,
    attachments: Arc<dyn AttachmentSink>,
    buffer: Mutex<Buffer>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("test_name", &self.test_name)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl Sink {
    pub fn new(test_name: &str, attachments: Arc<dyn AttachmentSink>) -> Self {
        let sink = Self {
            test_name: test_name.to_string(),
            started_at: OffsetDateTime::now_utc(),
            attachments,
            buffer: Mutex::new(Buffer::default()),
        };
        sink.info(&format!("Starting test: {test_name}"));
        sink
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn info(&self, message: &str) {
        tracing::info!(test = %self.test_name, "{message}");
        self.push_line(Level::Info, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(test = %self.test_name, "{message}");
        self.push_line(Level::Error, message);
    }

    pub fn record_request(&self, method: HttpMethod, endpoint: &str, body: Option<&str>) {
        let body = body.map(codec::render_canonical);
        self.info(&format!("REQUEST: {method} {endpoint}"));
        if let Some(body) = &body {
            self.info(&format!("REQUEST BODY:\n{body}"));
            self.attach("Request Body", JSON, body);
        }
        self.push_observation(Observation::Request {
            at: OffsetDateTime::now_utc(),
            method,
            endpoint: endpoint.to_string(),
            body,
        });
    }

    pub fn record_response(&self, method: HttpMethod, endpoint: &str, status: u16, body: Option<&str>) {
        let body = body.map(codec::render_canonical);
        self.info(&format!("RESPONSE: {status}"));
        if let Some(body) = &body {
            self.info(&format!("RESPONSE BODY:\n{body}"));
            self.attach("Response Body", JSON, body);
        }
        self.attach("Status Code", TEXT, &status.to_string());
        self.push_observation(Observation::Response {
            at: OffsetDateTime::now_utc(),
            method,
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    /// Record a call that never produced a response.
    pub fn record_failure(&self, method: HttpMethod, endpoint: &str, message: &str) {
        self.error(&format!("NO RESPONSE: {method} {endpoint}: {message}"));
        self.push_observation(Observation::Failure {
            at: OffsetDateTime::now_utc(),
            method,
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        });
    }

    pub fn record_assertion(&self, description: &str) {
        self.info(&format!("ASSERTION: {description}"));
        lock(&self.buffer).assertions.push(description.to_string());
    }

    /// Log a labelled snapshot of test data and attach it as JSON.
    pub fn record_data<T: Serialize + ?Sized>(&self, label: &str, data: &T) {
        match codec::render_value(data) {
            Ok(json) => {
                self.info(&format!("TEST DATA [{label}]: {json}"));
                self.attach(label, JSON, &json);
            }
            Err(e) => self.discard(ObservabilityError::Render {
                label: label.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Run `action` as a named step. The action always runs and its value is
    /// returned unchanged, whatever happens to the step markers. A panic
    /// inside the action closes the step as failed before unwinding on.
    pub fn record_step<R>(&self, name: &str, action: impl FnOnce() -> R) -> R {
        let step = StepGuard::open(self, name);
        let value = action();
        step.close(true);
        value
    }

    /// `record_step` for fallible actions: the step is marked failed when the
    /// action returns `Err`, and that error is what propagates.
    pub fn try_step<T, E: fmt::Display>(
        &self,
        name: &str,
        action: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let step = StepGuard::open(self, name);
        let result = action();
        if let Err(e) = &result {
            self.error(&format!("STEP FAILED: {name}: {e}"));
        }
        step.close(result.is_ok());
        result
    }

    pub fn observations(&self) -> Vec<Observation> {
        lock(&self.buffer).observations.clone()
    }

    pub fn assertions(&self) -> Vec<String> {
        lock(&self.buffer).assertions.clone()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        lock(&self.buffer).lines.clone()
    }

    /// The log stream as it would be written to the log file.
    pub fn transcript(&self) -> String {
        lock(&self.buffer)
            .lines
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }

    /// Close the test with `status`, persist the log and clear the buffer.
    /// Returns the log file path, or `None` if persisting failed.
    pub fn flush(&self, logs: &LogDirectory, status: &str) -> Option<PathBuf> {
        self.info(&format!("Test {status}: {}", self.test_name));
        let contents = self.transcript();
        let written = logs.write(&self.test_name, self.started_at, &contents);
        *lock(&self.buffer) = Buffer::default();
        match written {
            Ok(path) => {
                tracing::info!(test = %self.test_name, path = %path.display(), "log saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(test = %self.test_name, error = %e, "log not saved");
                None
            }
        }
    }

    fn begin_step(&self, name: &str) {
        self.info(&format!("STEP: {name}"));
        if let Err(e) = self.attachments.start_step(name) {
            self.discard(e);
        }
    }

    fn end_step(&self, name: &str, passed: bool) {
        if let Err(e) = self.attachments.stop_step(name, passed) {
            self.discard(e);
        }
    }

    fn attach(&self, label: &str, mime: &str, content: &str) {
        if let Err(e) = self.attachments.attach(label, mime, content) {
            self.discard(e);
        }
    }

    fn discard(&self, err: ObservabilityError) {
        tracing::warn!(test = %self.test_name, error = %err, "observability failure");
        self.push_line(Level::Error, &format!("Observability failure: {err}"));
    }

    fn push_line(&self, level: Level, message: &str) {
        lock(&self.buffer).lines.push(LogLine {
            level,
            at: OffsetDateTime::now_utc(),
            message: message.to_string(),
        });
    }

    fn push_observation(&self, observation: Observation) {
        lock(&self.buffer).observations.push(observation);
    }
}

/// Open step marker. Closed explicitly on return, or as failed on drop while
/// the action is unwinding.
struct StepGuard<'a> {
    sink: &'a Sink,
    name: &'a str,
    _span: tracing::span::EnteredSpan,
    closed: bool,
}

impl<'a> StepGuard<'a> {
    fn open(sink: &'a Sink, name: &'a str) -> Self {
        sink.begin_step(name);
        let span = tracing::info_span!("step", test = %sink.test_name, step = name).entered();
        Self {
            sink,
            name,
            _span: span,
            closed: false,
        }
    }

    fn close(mut self, passed: bool) {
        self.closed = true;
        self.sink.end_step(self.name, passed);
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if std::thread::panicking() {
            self.sink.error(&format!("STEP FAILED: {}: panicked", self.name));
        }
        self.sink.end_step(self.name, false);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn clock(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]:[second].[subsecond digits:3]"))
        .unwrap_or_default()
}

fn file_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_default()
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
