//! The HTTP collaborator boundary.
//!
//! # Design
//! `Transport` is the seam between the client (which only builds and
//! interprets plain data) and the network. The default implementation,
//! `UreqTransport`, executes one blocking round trip per call with a fresh
//! agent, status codes returned as data rather than errors so the client
//! owns status interpretation. Swapping in a recording implementation gives
//! tests full visibility into every emitted request.

use std::time::Duration;

use url::form_urlencoded;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse};

/// Executes an `HttpRequest` and produces an `HttpResponse`.
///
/// Implementations report I/O failure (DNS, connection, timeout) as
/// `ApiError::Transport`; error *statuses* are not failures here — they come
/// back as data and the client raises on them.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Default blocking transport backed by ureq.
///
/// Encodes `params` as the query string for GET/DELETE and as a
/// form-encoded body for POST/PUT, switching to multipart/form-data when the
/// request carries file parts. Builds a fresh agent per call configured with
/// the request's timeout; connection reuse is deliberately not managed here.
#[derive(Debug, Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = agent_for(request.timeout);

        let url = match request.method {
            HttpMethod::Get | HttpMethod::Delete if !request.params.is_empty() => {
                format!("{}?{}", request.url, encode_pairs(&request.params))
            }
            _ => request.url.clone(),
        };

        let response = match request.method {
            HttpMethod::Get | HttpMethod::Delete => {
                let mut builder = match request.method {
                    HttpMethod::Get => agent.get(&url),
                    _ => agent.delete(&url),
                };
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post | HttpMethod::Put => {
                let mut builder = match request.method {
                    HttpMethod::Post => agent.post(&url),
                    _ => agent.put(&url),
                };
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if !request.files.is_empty() {
                    let boundary = format!("----discourse-{}", Uuid::new_v4().simple());
                    let body = multipart_body(&boundary, &request.params, &request.files);
                    builder
                        .content_type(format!("multipart/form-data; boundary={boundary}"))
                        .send(&body[..])
                } else if !request.params.is_empty() {
                    let body = encode_pairs(&request.params);
                    builder
                        .content_type("application/x-www-form-urlencoded")
                        .send(body.as_bytes())
                } else {
                    builder.send_empty()
                }
            }
        }
        .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let mut response = response;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Fresh agent per call: status codes as data, global timeout from the
/// request descriptor.
fn agent_for(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

/// Percent-encode parameter pairs into `k=v&k=v` form.
fn encode_pairs(params: &[(String, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

/// Assemble a multipart/form-data body: plain fields first, then file parts.
fn multipart_body(boundary: &str, params: &[(String, String)], files: &[FilePart]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in params {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                file.name, file.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
