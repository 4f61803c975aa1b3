// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bon::Builder;
use bytes::Bytes;
use http::HeaderMap;
use reqwest::Method;

use crate::error::LoaderError;

/// A request for one resource, reused by every retrieval made from a loader
#[derive(Debug, Clone, Builder)]
pub struct ResourceRequest {
    /// Location of the resource: an absolute URL, a `file://` URL or a path
    #[builder(into)]
    pub location:     String,
    /// Request method (default: GET)
    #[builder(default = Method::GET)]
    pub method:       Method,
    /// Value of the `Content-Type` request header, if any
    #[builder(into)]
    pub content_type: Option<String>,
    /// Request body; an empty body is sent when absent
    #[builder(into)]
    pub body:         Option<Bytes>,
}

impl ResourceRequest {
    /// GET request for `location` with no body
    #[must_use]
    pub fn get(location: impl Into<String>) -> Self { Self::builder().location(location).build() }
}

/// Byte counters reported alongside data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes received so far
    pub loaded: u64,
    /// Expected length, 0 when the transport does not report one
    pub total:  u64,
}

/// A piece of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Only the bytes that became available with this chunk
    pub data:     Bytes,
    pub progress: TransferProgress,
}

/// Status line and headers, reported once when headers become available
#[derive(Debug, Clone)]
pub struct HttpStatus {
    pub location: String,
    /// Status code; 0 for non-HTTP schemes
    pub status:   u16,
    pub headers:  HeaderMap,
}

/// Final result of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success(Bytes),
    Failure(String),
}

impl TransferOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool { matches!(self, Self::Success(_)) }
}

impl From<Result<Bytes, LoaderError>> for TransferOutcome {
    fn from(result: Result<Bytes, LoaderError>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(err) => Self::Failure(err.reason()),
        }
    }
}

/// Events of a streaming retrieval, in the order they occur.
///
/// `Open` comes first. `HttpStatus` precedes every `Chunk`. Exactly one of
/// `Complete` or `Error` ends the sequence and nothing follows it.
#[derive(Debug)]
pub enum LoaderEvent {
    Open,
    HttpStatus(HttpStatus),
    Chunk(StreamChunk),
    Complete,
    Error(LoaderError),
}

impl LoaderEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool { matches!(self, Self::Complete | Self::Error(_)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_get_without_body() {
        let request = ResourceRequest::get("movie.swf");
        assert_eq!(request.method, Method::GET);
        assert!(request.content_type.is_none());
        assert!(request.body.is_none());
    }

    #[test]
    fn request_builder_keeps_payload() {
        let request = ResourceRequest::builder()
            .location("http://example.com/gateway")
            .method(Method::POST)
            .content_type("application/x-amf")
            .body(Bytes::from_static(b"\x00\x03"))
            .build();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.content_type.as_deref(), Some("application/x-amf"));
        assert_eq!(request.body.as_deref(), Some(&b"\x00\x03"[..]));
    }

    #[test]
    fn outcome_from_failure_carries_reason() {
        let outcome = TransferOutcome::from(Err(LoaderError::Http {
            location:    "missing.bin".to_string(),
            status:      404,
            status_text: "Not Found".to_string(),
        }));
        assert_eq!(outcome, TransferOutcome::Failure("Not Found".to_string()));

        let outcome = TransferOutcome::from(Ok(Bytes::from_static(b"FWS")));
        assert!(outcome.is_success());
    }
}
