//! Stateless request builder and response parser for one entity collection.
//!
//! # Design
//! A `Resource` is a plain configuration value: the base URL, the collection
//! path and the codec of its entity. There is one generic implementation for
//! every entity; detectives, cases and abilities differ only in the value
//! they are constructed with. Each CRUD operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that
//! classifies an `HttpResponse`, so none of this touches the network.

use serde::Serialize;

use crate::codec::{self, EntityCodec, JsonCodec};
use crate::error::{ApiError, CodecError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Ability, Case, Detective};

pub const DETECTIVES_PATH: &str = "/api/detectives";
pub const CASES_PATH: &str = "/api/cases";
pub const ABILITIES_PATH: &str = "/api/abilities";
pub const LOGIN_PATH: &str = "/api/auth/login";

/// One CRUD collection of the API, bound to a base URL.
#[derive(Debug, Clone)]
pub struct Resource<C> {
    base_url: String,
    path: &'static str,
    codec: C,
}

impl Resource<JsonCodec<Detective>> {
    pub fn detectives(base_url: &str) -> Self {
        Resource::new(base_url, DETECTIVES_PATH, JsonCodec::new())
    }
}

impl Resource<JsonCodec<Case>> {
    pub fn cases(base_url: &str) -> Self {
        Resource::new(base_url, CASES_PATH, JsonCodec::new())
    }
}

impl Resource<JsonCodec<Ability>> {
    pub fn abilities(base_url: &str) -> Self {
        Resource::new(base_url, ABILITIES_PATH, JsonCodec::new())
    }
}

impl<C: EntityCodec> Resource<C> {
    pub fn new(base_url: &str, path: &'static str, codec: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path,
            codec,
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    pub fn item_url(&self, id: &str) -> String {
        format!("{}{}/{}", self.base_url, self.path, encode_segment(id))
    }

    pub fn build_list(&self) -> HttpRequest {
        bodyless(HttpMethod::Get, self.collection_url())
    }

    pub fn build_get(&self, id: &str) -> HttpRequest {
        bodyless(HttpMethod::Get, self.item_url(id))
    }

    pub fn build_create(&self, entity: &C::Entity) -> Result<HttpRequest, ApiError> {
        let url = self.collection_url();
        let body = self
            .codec
            .encode(entity)
            .map_err(|e| encode_error(HttpMethod::Post, &url, e))?;
        Ok(json_request(HttpMethod::Post, url, body))
    }

    pub fn build_update<P: Serialize + ?Sized>(
        &self,
        id: &str,
        patch: &P,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.item_url(id);
        let body = codec::encode_payload(patch).map_err(|e| encode_error(HttpMethod::Put, &url, e))?;
        Ok(json_request(HttpMethod::Put, url, body))
    }

    pub fn build_delete(&self, id: &str) -> HttpRequest {
        bodyless(HttpMethod::Delete, self.item_url(id))
    }

    pub fn parse_list(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<Vec<C::Entity>, ApiError> {
        check_status(request, response)?;
        self.codec
            .decode_list(&response.body)
            .map_err(|e| decode_error(request, response, e))
    }

    pub fn parse_one(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<C::Entity, ApiError> {
        check_status(request, response)?;
        self.codec
            .decode(&response.body)
            .map_err(|e| decode_error(request, response, e))
    }

    /// Delete reports success as a flag; a non-2xx answer is `false`.
    pub fn parse_delete(&self, response: &HttpResponse) -> bool {
        response.is_success()
    }
}

fn bodyless(method: HttpMethod, url: String) -> HttpRequest {
    HttpRequest {
        method,
        url,
        headers: vec![("accept".to_string(), "application/json".to_string())],
        body: None,
    }
}

pub(crate) fn json_request(method: HttpMethod, url: String, body: String) -> HttpRequest {
    HttpRequest {
        method,
        url,
        headers: vec![
            ("accept".to_string(), "application/json".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ],
        body: Some(body),
    }
}

/// Map a non-2xx status to `ApiError::Api`.
pub(crate) fn check_status(request: &HttpRequest, response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Api {
        method: request.method,
        endpoint: request.url.clone(),
        status: response.status,
        body: response.body.clone(),
    })
}

pub(crate) fn decode_error(request: &HttpRequest, response: &HttpResponse, err: CodecError) -> ApiError {
    ApiError::Decode {
        method: request.method,
        endpoint: request.url.clone(),
        status: response.status,
        body: response.body.clone(),
        message: err.to_string(),
    }
}

pub(crate) fn encode_error(method: HttpMethod, url: &str, err: CodecError) -> ApiError {
    ApiError::Encode {
        method,
        endpoint: url.to_string(),
        message: err.to_string(),
    }
}

/// Percent-encode an id for use as a single path segment.
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(ch),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}
