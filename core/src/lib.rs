//! Test harness core for the detective agency API.
//!
//! # Overview
//! Turns a logical operation ("create an ability") into one observed HTTP
//! round trip: the payload is encoded, the request and response are recorded
//! in the test's `Sink`, and the outcome comes back as a typed entity or a
//! classified `ApiError`.
//!
//! # Design
//! - `Resource<C>` builds requests and parses responses without I/O; the
//!   codec type parameter is the only difference between entity clients.
//! - `Transport` is the only I/O seam; `UreqTransport` is the real one.
//! - `ApiClient<C>` glues the two together through a shared `Executor`.
//! - `Sink` is per test case and never fails the test it observes.
//! - `Harness`/`TestCase` scope the sink, the clients and teardown cleanups.
//! - DTOs are defined independently from the mock-server crate; the scenario
//!   tests catch schema drift.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod harness;
pub mod http;
pub mod observe;
pub mod report;
pub mod resource;
pub mod transport;
pub mod types;
pub mod validate;

pub use client::{AbilitiesClient, ApiClient, AuthClient, CasesClient, DetectivesClient, Executor};
pub use codec::{EntityCodec, JsonCodec};
pub use config::TestConfig;
pub use error::{ApiError, CodecError, ConfigError, ObservabilityError, TransportError};
pub use generator::EntityGenerator;
pub use harness::{Harness, TestCase};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use observe::{AttachmentSink, DirectoryAttachments, LogDirectory, MemoryAttachments, Observation, Sink};
pub use report::ReportBuilder;
pub use resource::Resource;
pub use transport::{Transport, UreqTransport};
pub use types::{
    Ability, AbilityPatch, AuthResponse, Case, CasePatch, Detective, DetectivePatch, Entity,
    LoginCredentials, User,
};
pub use validate::{Rule, Validate, Verdict, Violation};
