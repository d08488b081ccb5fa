//! Run-wide harness and per-test scoped context.
//!
//! # Design
//! `Harness` is built once per run from a `TestConfig` and shared by every
//! test. `Harness::start` hands out a `TestCase`, which owns that test's
//! `Sink` and builds clients bound to it. Ending the test is explicit
//! (`finish`) or implicit (drop, including while unwinding from a failed
//! assertion): either way the registered cleanups run first, in reverse
//! order, then the log is flushed. A failing cleanup is logged and never
//! replaces the test's own outcome. `Harness::run` wraps a test body so a
//! panic's message lands in the log before the test is marked `FAILED`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::{
    AbilitiesClient, ApiClient, AuthClient, CasesClient, DetectivesClient, Executor,
};
use crate::codec::EntityCodec;
use crate::config::TestConfig;
use crate::error::ApiError;
use crate::observe::{AttachmentSink, DirectoryAttachments, LogDirectory, Sink};
use crate::report::ReportBuilder;
use crate::resource::Resource;
use crate::transport::{Transport, UreqTransport};
use crate::types::Entity;

/// Shared, immutable state of a test run.
pub struct Harness {
    config: TestConfig,
    transport: Arc<dyn Transport>,
    attachments: Arc<dyn AttachmentSink>,
    logs: Arc<LogDirectory>,
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Production wiring: ureq transport with the configured timeout,
    /// attachments and logs in the configured directories.
    pub fn new(config: TestConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(config.timeout()));
        let attachments = Arc::new(DirectoryAttachments::new(config.attachments_dir.clone()));
        Self::with_parts(config, transport, attachments)
    }

    pub fn with_parts(
        config: TestConfig,
        transport: Arc<dyn Transport>,
        attachments: Arc<dyn AttachmentSink>,
    ) -> Self {
        let logs = Arc::new(LogDirectory::new(config.logs_dir.clone()));
        tracing::info!(
            base_url = %config.base_url,
            logs = %logs.dir().display(),
            "harness ready"
        );
        Self {
            config,
            transport,
            attachments,
            logs,
        }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn start(&self, test_name: &str) -> TestCase {
        let sink = Arc::new(Sink::new(test_name, self.attachments.clone()));
        sink.info(&format!("Base URL: {}", self.config.base_url));
        TestCase {
            executor: Executor::new(self.transport.clone(), sink.clone()),
            sink,
            base_url: self.config.base_url.clone(),
            logs: self.logs.clone(),
            cleanups: Vec::new(),
            finished: false,
        }
    }

    /// Run `test` in a fresh `TestCase`. A panic is logged with its message,
    /// the test is finished as `FAILED`, and the panic is re-raised.
    pub fn run<R>(&self, test_name: &str, test: impl FnOnce(&mut TestCase) -> R) -> R {
        let mut case = self.start(test_name);
        match panic::catch_unwind(AssertUnwindSafe(|| test(&mut case))) {
            Ok(value) => {
                case.finish("PASSED");
                value
            }
            Err(payload) => {
                case.sink
                    .error(&format!("Test failed: {}", panic_message(payload.as_ref())));
                case.finish("FAILED");
                panic::resume_unwind(payload)
            }
        }
    }

    /// Report builder over this run's attachment and report directories.
    pub fn report_builder(&self) -> ReportBuilder {
        ReportBuilder::new(
            self.config.attachments_dir.clone(),
            self.config.report_dir.clone(),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

type CleanupFn = Box<dyn FnOnce() -> Result<bool, ApiError> + Send>;

struct Cleanup {
    label: String,
    run: CleanupFn,
}

/// Context of one running test.
pub struct TestCase {
    sink: Arc<Sink>,
    executor: Executor,
    base_url: String,
    logs: Arc<LogDirectory>,
    cleanups: Vec<Cleanup>,
    finished: bool,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("sink", &self.sink)
            .field("pending_cleanups", &self.cleanups.len())
            .finish_non_exhaustive()
    }
}

impl TestCase {
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn client<C>(&self, resource: Resource<C>) -> ApiClient<C>
    where
        C: EntityCodec,
        C::Entity: Entity,
    {
        ApiClient::new(resource, self.executor.clone())
    }

    pub fn detectives(&self) -> DetectivesClient {
        self.client(Resource::detectives(&self.base_url))
    }

    pub fn cases(&self) -> CasesClient {
        self.client(Resource::cases(&self.base_url))
    }

    pub fn abilities(&self) -> AbilitiesClient {
        self.client(Resource::abilities(&self.base_url))
    }

    pub fn auth(&self) -> AuthClient {
        AuthClient::new(&self.base_url, self.executor.clone())
    }

    /// Record an assertion and fail the test if it does not hold.
    pub fn check(&self, holds: bool, description: &str) {
        if holds {
            self.sink.record_assertion(description);
        } else {
            self.sink.error(&format!("ASSERTION FAILED: {description}"));
            panic!("assertion failed: {description}");
        }
    }

    /// Delete `id` through `client` when the test ends, pass or fail.
    pub fn delete_on_teardown<C>(&mut self, client: &ApiClient<C>, id: &str)
    where
        C: EntityCodec + Clone + 'static,
        C::Entity: Entity,
    {
        let client = client.clone();
        let owned = id.to_string();
        self.cleanups.push(Cleanup {
            label: format!("{} {id}", <C::Entity as Entity>::KIND),
            run: Box::new(move || client.delete(&owned)),
        });
    }

    /// End the test with `status` ("PASSED", "FAILED", ...). Returns the log
    /// file path when it was written.
    pub fn finish(mut self, status: &str) -> Option<PathBuf> {
        self.teardown(status)
    }

    fn teardown(&mut self, status: &str) -> Option<PathBuf> {
        self.finished = true;
        while let Some(cleanup) = self.cleanups.pop() {
            self.sink.info(&format!("Cleanup: delete {}", cleanup.label));
            match (cleanup.run)() {
                Ok(true) => {}
                Ok(false) => self
                    .sink
                    .info(&format!("Cleanup: {} was already gone", cleanup.label)),
                Err(e) => self.sink.error(&format!("Cleanup failed: {e}")),
            }
        }
        self.sink.flush(&self.logs, status)
    }
}

impl Drop for TestCase {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let status = if std::thread::panicking() {
            "FAILED"
        } else {
            "COMPLETED"
        };
        self.teardown(status);
    }
}
