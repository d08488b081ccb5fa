//! Executing clients: one HTTP round trip per call, observed on both sides.
//!
//! # Design
//! `Executor` is the shared call path. It records the request, performs the
//! call exactly once through the `Transport`, records whatever came back and
//! hands the response on for classification. `ApiClient<C>` pairs an
//! executor with a `Resource<C>`; it is the same code for every entity, the
//! codec type parameter is the only thing that varies. Clients hold nothing
//! mutable, so every test case simply builds its own.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::codec::{self, EntityCodec, JsonCodec};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::observe::Sink;
use crate::resource::{self, Resource, LOGIN_PATH};
use crate::transport::Transport;
use crate::types::{Ability, AuthResponse, Case, Detective, Entity, LoginCredentials};

pub type DetectivesClient = ApiClient<JsonCodec<Detective>>;
pub type CasesClient = ApiClient<JsonCodec<Case>>;
pub type AbilitiesClient = ApiClient<JsonCodec<Ability>>;

/// Performs single observed HTTP exchanges on behalf of a test case.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    sink: Arc<Sink>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").field("sink", &self.sink).finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, sink: Arc<Sink>) -> Self {
        Self { transport, sink }
    }

    pub fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    /// Send `request` once. Any answer from the server is `Ok`, whatever its
    /// status; `Err` means no answer was obtained.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.sink
            .record_request(request.method, &request.url, request.body.as_deref());

        match self.transport.execute(request) {
            Ok(response) => {
                self.sink.record_response(
                    request.method,
                    &request.url,
                    response.status,
                    response.body_text(),
                );
                if !response.is_success() {
                    self.sink.error(&format!(
                        "Request failed: {} {} -> {} {}",
                        request.method, request.url, response.status, response.body
                    ));
                }
                Ok(response)
            }
            Err(e) => {
                self.sink.record_failure(request.method, &request.url, &e.0);
                Err(ApiError::Transport {
                    method: request.method,
                    endpoint: request.url.clone(),
                    message: e.0,
                })
            }
        }
    }
}

/// CRUD client for one entity collection.
#[derive(Debug, Clone)]
pub struct ApiClient<C> {
    resource: Resource<C>,
    executor: Executor,
}

impl<C> ApiClient<C>
where
    C: EntityCodec,
    C::Entity: Entity,
{
    pub fn new(resource: Resource<C>, executor: Executor) -> Self {
        Self { resource, executor }
    }

    pub fn resource(&self) -> &Resource<C> {
        &self.resource
    }

    pub fn sink(&self) -> &Arc<Sink> {
        self.executor.sink()
    }

    /// Every entity in server order. An empty collection is an empty vec.
    pub fn list(&self) -> Result<Vec<C::Entity>, ApiError> {
        let request = self.resource.build_list();
        let response = self.executor.send(&request)?;
        self.resource.parse_list(&request, &response)
    }

    pub fn get(&self, id: &str) -> Result<C::Entity, ApiError> {
        require_id(HttpMethod::Get, id)?;
        let request = self.resource.build_get(id);
        let response = self.executor.send(&request)?;
        self.resource.parse_one(&request, &response)
    }

    /// Create `entity` and return the server's canonical copy, id included.
    pub fn create(&self, entity: &C::Entity) -> Result<C::Entity, ApiError> {
        let request = self.resource.build_create(entity)?;
        let response = self.executor.send(&request)?;
        let created = self.resource.parse_one(&request, &response)?;
        self.sink()
            .info(&format!("Created {} {}", <C::Entity as Entity>::KIND, created.id()));
        Ok(created)
    }

    /// Apply a partial update. Only the fields present in `patch` change.
    pub fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Result<C::Entity, ApiError> {
        require_id(HttpMethod::Put, id)?;
        let request = self.resource.build_update(id, patch)?;
        let response = self.executor.send(&request)?;
        self.resource.parse_one(&request, &response)
    }

    /// `Ok(false)` when the server refuses (e.g. already deleted); `Err` only
    /// when no answer was obtained.
    pub fn delete(&self, id: &str) -> Result<bool, ApiError> {
        require_id(HttpMethod::Delete, id)?;
        let request = self.resource.build_delete(id);
        let response = self.executor.send(&request)?;
        let deleted = self.resource.parse_delete(&response);
        if deleted {
            self.sink().info(&format!("Deleted {} {id}", <C::Entity as Entity>::KIND));
        }
        Ok(deleted)
    }
}

/// Client for `POST /api/auth/login`.
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    executor: Executor,
}

impl AuthClient {
    pub fn new(base_url: &str, executor: Executor) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
        }
    }

    pub fn build_login(&self, credentials: &LoginCredentials) -> Result<HttpRequest, ApiError> {
        let url = format!("{}{LOGIN_PATH}", self.base_url);
        let body = codec::encode_payload(credentials)
            .map_err(|e| resource::encode_error(HttpMethod::Post, &url, e))?;
        Ok(resource::json_request(HttpMethod::Post, url, body))
    }

    pub fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        let request = self.build_login(credentials)?;
        let response = self.executor.send(&request)?;
        resource::check_status(&request, &response)?;
        JsonCodec::<AuthResponse>::new()
            .decode(&response.body)
            .map_err(|e| resource::decode_error(&request, &response, e))
    }

    /// Whether the login is accepted. Failures are logged, not returned.
    pub fn login_succeeds(&self, credentials: &LoginCredentials) -> bool {
        match self.login(credentials) {
            Ok(_) => true,
            Err(e) => {
                self.executor.sink().error(&format!("Login rejected: {e}"));
                false
            }
        }
    }
}

fn require_id(method: HttpMethod, id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::InvalidArgument(format!(
            "{method} requires a non-empty entity id"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::TransportError;
    use crate::observe::{MemoryAttachments, Observation};
    use crate::types::AbilityPatch;

    /// Replays canned responses and remembers the requests it saw.
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .expect("no scripted reply left")
        }
    }

    fn reply(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    fn abilities(transport: Arc<ScriptedTransport>) -> (AbilitiesClient, Arc<Sink>) {
        let sink = Arc::new(Sink::new("client_test", Arc::new(MemoryAttachments::new())));
        let executor = Executor::new(transport, sink.clone());
        (ApiClient::new(Resource::abilities("http://api.test"), executor), sink)
    }

    #[test]
    fn get_decodes_entity_and_observes_both_halves() {
        let transport = ScriptedTransport::new(vec![reply(200, r#"{"id":"a-1","dangerLevel":5}"#)]);
        let (client, sink) = abilities(transport.clone());

        let ability = client.get("a-1").unwrap();
        assert_eq!(ability.id, "a-1");
        assert_eq!(ability.danger_level, 5);
        assert_eq!(transport.calls(), 1);

        let observations = sink.observations();
        assert!(matches!(&observations[0], Observation::Request { method: HttpMethod::Get, .. }));
        assert!(matches!(&observations[1], Observation::Response { status: 200, .. }));
    }

    #[test]
    fn non_success_is_api_failure_with_context() {
        let transport = ScriptedTransport::new(vec![reply(404, r#"{"message":"Ability not found"}"#)]);
        let (client, _) = abilities(transport);

        let err = client.get("invalid-ability-id-999").unwrap_err();
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("GET http://api.test/api/abilities/invalid-ability-id-999"));
        assert!(msg.contains("Ability not found"));
    }

    #[test]
    fn transport_failure_is_classified_and_still_observed() {
        let transport = ScriptedTransport::new(vec![Err(TransportError("timed out".to_string()))]);
        let (client, sink) = abilities(transport.clone());

        let err = client.list().unwrap_err();
        assert!(matches!(err, ApiError::Transport { ref message, .. } if message == "timed out"));
        assert_eq!(transport.calls(), 1, "no retry");

        let observations = sink.observations();
        assert_eq!(observations.len(), 2);
        assert!(matches!(&observations[1], Observation::Failure { .. }));
    }

    #[test]
    fn empty_id_fails_without_a_call() {
        let transport = ScriptedTransport::new(Vec::new());
        let (client, _) = abilities(transport.clone());

        assert!(matches!(client.get(""), Err(ApiError::InvalidArgument(_))));
        assert!(matches!(client.delete("  "), Err(ApiError::InvalidArgument(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn list_with_empty_success_body_is_empty() {
        let transport = ScriptedTransport::new(vec![reply(200, "")]);
        let (client, _) = abilities(transport);
        assert!(client.list().unwrap().is_empty());
    }

    #[test]
    fn create_with_empty_success_body_is_decode_failure() {
        let transport = ScriptedTransport::new(vec![reply(201, "")]);
        let (client, _) = abilities(transport);
        let err = client.create(&Ability::default()).unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 201, .. }));
    }

    #[test]
    fn update_sends_patch_and_returns_canonical_entity() {
        let transport = ScriptedTransport::new(vec![reply(
            200,
            r#"{"id":"a-1","type":"support","dangerLevel":8}"#,
        )]);
        let (client, _) = abilities(transport.clone());

        let patch = AbilityPatch {
            danger_level: Some(8),
            ..AbilityPatch::default()
        };
        let updated = client.update("a-1", &patch).unwrap();
        assert_eq!(updated.danger_level, 8);
        assert_eq!(updated.kind, "support");

        let sent = transport.seen.lock().unwrap()[0].clone();
        assert_eq!(sent.method, HttpMethod::Put);
        assert_eq!(sent.body.as_deref(), Some(r#"{"dangerLevel":8}"#));
    }

    #[test]
    fn delete_reports_flag() {
        let transport = ScriptedTransport::new(vec![reply(204, ""), reply(404, "")]);
        let (client, sink) = abilities(transport);
        assert!(client.delete("a-1").unwrap());
        assert!(!client.delete("a-1").unwrap());
        assert_eq!(sink.transcript().matches("Deleted ability a-1").count(), 1);
    }

    #[test]
    fn create_logs_kind_and_assigned_id() {
        let transport = ScriptedTransport::new(vec![reply(201, r#"{"id":"a-7","name":"New"}"#)]);
        let (client, sink) = abilities(transport);
        let created = client.create(&Ability::default()).unwrap();
        assert_eq!(created.id(), "a-7");
        assert!(sink.transcript().contains("Created ability a-7"));
    }

    #[test]
    fn login_succeeds_swallows_rejection_into_the_log() {
        let transport = ScriptedTransport::new(vec![reply(401, r#"{"message":"Invalid credentials"}"#)]);
        let sink = Arc::new(Sink::new("auth_test", Arc::new(MemoryAttachments::new())));
        let auth = AuthClient::new("http://api.test/", Executor::new(transport, sink.clone()));

        let credentials = LoginCredentials {
            username: "invalid_user".to_string(),
            password: "wrong_password_123".to_string(),
        };
        assert!(!auth.login_succeeds(&credentials));
        assert!(sink.transcript().contains("Login rejected"));
    }

    #[test]
    fn login_decodes_session() {
        let transport = ScriptedTransport::new(vec![reply(
            200,
            r#"{"message":"Login successful","user":{"id":"1","username":"admin","role":"admin"}}"#,
        )]);
        let sink = Arc::new(Sink::new("auth_test", Arc::new(MemoryAttachments::new())));
        let auth = AuthClient::new("http://api.test", Executor::new(transport.clone(), sink));

        let credentials = LoginCredentials {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        };
        let session = auth.login(&credentials).unwrap();
        assert_eq!(session.user.role, "admin");
        assert_eq!(transport.seen.lock().unwrap()[0].url, "http://api.test/api/auth/login");
    }
}
