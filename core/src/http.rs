//! HTTP transport types for the injected-transport pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! client builds `HttpRequest` values and interprets `HttpResponse` values;
//! the [`Transport`](crate::transport::Transport) collaborator is the only
//! party that touches the network. Parameters stay as unencoded pairs in the
//! descriptor — the transport decides the wire encoding (query string for
//! GET/DELETE, form body or multipart for POST/PUT), so tests can assert the
//! exact mapping the collaborator receives.
//!
//! All fields use owned types (`String`, `Vec`) so descriptors can be
//! recorded by test transports without lifetime concerns.

use std::time::Duration;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// The method name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One file payload for a multipart upload.
///
/// `name` is the multipart field name, `filename` the client-side file name
/// reported to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(name: &str, filename: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            filename: filename.to_string(),
            data: data.into(),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by the client's dispatch primitive with the authentication headers
/// already attached. `url` is the full URL (host prefix included) without a
/// query string; `params` are the unencoded parameter pairs the transport
/// serializes according to the method.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub files: Vec<FilePart>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then
/// interpreted by the client (status check, content-type-gated JSON decode).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the response declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|v| v.contains("application/json"))
    }
}
