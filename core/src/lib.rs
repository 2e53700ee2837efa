//! Synchronous client for the Discourse forum HTTP API.
//!
//! # Overview
//! A thin layer over the remote REST surface: each public method on
//! [`DiscourseClient`] assembles a path and a parameter mapping, funnels it
//! through one dispatch primitive that attaches the `Api-Key` /
//! `Api-Username` headers, and returns the JSON response as a dynamic
//! `serde_json::Value`. Error statuses raise [`ApiError`]; nothing is
//! retried, cached, or paginated.
//!
//! # Design
//! - `DiscourseClient` is stateless between calls — it holds only the host,
//!   the credential pair, a timeout, and a transport handle.
//! - Requests and responses cross the transport boundary as plain data
//!   (`HttpRequest` / `HttpResponse`); the [`Transport`] trait is the seam
//!   where the network lives, with [`UreqTransport`] as the blocking
//!   default. Tests swap in recording transports for full request
//!   visibility.
//! - Parameters stay as unencoded pairs in the descriptor; the transport
//!   owns wire encoding (query string, form body, or multipart).

pub mod client;
pub mod error;
pub mod http;
pub mod transport;

pub use client::{DiscourseClient, DEFAULT_TIMEOUT};
pub use error::ApiError;
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
