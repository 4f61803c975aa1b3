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

use async_trait::async_trait;
use futures::StreamExt;
use snafu::ResultExt;

use super::{Transport, TransportResponse};
use crate::{
    config::LoaderConfig,
    error::{ClientBuildSnafu, LoaderError, NetworkSnafu, UnsupportedSchemeSnafu},
    location::Target,
    types::ResourceRequest,
};

/// HTTP(S) transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client:      reqwest::Client,
    progressive: bool,
}

impl HttpTransport {
    /// Build a transport with a client configured from `config`
    pub fn new(config: &LoaderConfig) -> Result<Self, LoaderError> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout.unsigned_abs());
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        let client = builder.build().context(ClientBuildSnafu)?;
        Ok(Self::with_client(client, config.progressive))
    }

    /// Wrap an existing client
    #[must_use]
    pub const fn with_client(client: reqwest::Client, progressive: bool) -> Self {
        Self {
            client,
            progressive,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn supports_progressive(&self) -> bool { self.progressive }

    async fn send(
        &self,
        request: &ResourceRequest,
        target: &Target,
    ) -> Result<TransportResponse, LoaderError> {
        let Target::Http(url) = target else {
            return UnsupportedSchemeSnafu {
                location: &request.location,
                scheme:   "file",
            }
            .fail();
        };

        let mut builder = self.client.request(request.method.clone(), url.clone());
        if let Some(ref content_type) = request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let response = builder
            .body(request.body.clone().unwrap_or_default())
            .send()
            .await
            .context(NetworkSnafu {
                location: &request.location,
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let content_length = response.content_length();

        let location = request.location.clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.context(NetworkSnafu {
                    location: location.as_str(),
                })
            })
            .boxed();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            content_length,
            body: Some(body),
        })
    }
}
