//! HTTP transport types shared by the request builders and the transport.
//!
//! # Design
//! Requests and responses are plain data. `Resource` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network;
//! only a `Transport` implementation performs I/O. Keeping the two apart lets
//! the build/parse half be tested without a server.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute (base URL plus resource path) so it can be logged as the
/// endpoint of the call without further context.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status falls in the 2xx class.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body, or `None` when the server sent nothing.
    pub fn body_text(&self) -> Option<&str> {
        if self.body.trim().is_empty() {
            None
        } else {
            Some(&self.body)
        }
    }
}
