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

//! Transports move bytes for the loader.
//!
//! A transport sends one request and hands back the status line, headers and
//! an optional body stream. A missing body is the "null payload" case and is
//! treated as a failure by the loader.

mod file;
mod network;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use http::HeaderMap;

pub use self::{file::FileTransport, network::HttpTransport};
use crate::{error::LoaderError, location::Target, types::ResourceRequest};

/// Body of a response, yielded in transfer order
pub type BodyStream = BoxStream<'static, Result<Bytes, LoaderError>>;

/// Response returned by [`Transport::send`]
pub struct TransportResponse {
    /// Status code; 0 for non-HTTP schemes
    pub status:         u16,
    /// Reason phrase, possibly empty
    pub status_text:    String,
    pub headers:        HeaderMap,
    /// Expected body length when known
    pub content_length: Option<u64>,
    /// `None` when the transport produced no payload at all
    pub body:           Option<BodyStream>,
}

impl TransportResponse {
    /// Status 200, or 0 for schemes without HTTP status codes
    #[must_use]
    pub const fn is_success_status(&self) -> bool { self.status == 200 || self.status == 0 }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("content_length", &self.content_length)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

/// A network or local mechanism able to fetch binary data
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether response bodies can be handed out before the transfer ends.
    /// Queried once per request, before it is sent.
    fn supports_progressive(&self) -> bool;

    /// Send `request` to `target` and return once headers are available
    async fn send(
        &self,
        request: &ResourceRequest,
        target: &Target,
    ) -> Result<TransportResponse, LoaderError>;
}
