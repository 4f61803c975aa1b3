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
use http::{HeaderMap, HeaderValue, header};
use snafu::ResultExt;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::{Transport, TransportResponse};
use crate::{
    config::LoaderConfig,
    error::{FileReadSnafu, LoaderError, UnsupportedSchemeSnafu},
    location::Target,
    types::ResourceRequest,
};

/// Local file transport.
///
/// Reports status 0 like any non-HTTP scheme. A file that cannot be opened
/// gives a response without payload rather than an error, so the loader
/// treats it the same way as an unreachable remote resource.
#[derive(Debug, Clone)]
pub struct FileTransport {
    chunk_size:  usize,
    progressive: bool,
}

impl FileTransport {
    #[must_use]
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            chunk_size:  config.file_chunk_size.max(1),
            progressive: config.progressive,
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn supports_progressive(&self) -> bool { self.progressive }

    async fn send(
        &self,
        request: &ResourceRequest,
        target: &Target,
    ) -> Result<TransportResponse, LoaderError> {
        let Target::File(path) = target else {
            return UnsupportedSchemeSnafu {
                location: &request.location,
                scheme:   "http",
            }
            .fail();
        };

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cannot open local resource");
                return Ok(TransportResponse {
                    status:         0,
                    status_text:    err.to_string(),
                    headers:        HeaderMap::new(),
                    content_length: None,
                    body:           None,
                });
            }
        };

        let content_length = file.metadata().await.ok().map(|m| m.len());
        let mut headers = HeaderMap::new();
        if let Some(len) = content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }

        let location = request.location.clone();
        let body = ReaderStream::with_capacity(file, self.chunk_size)
            .map(move |chunk| {
                chunk.context(FileReadSnafu {
                    location: location.as_str(),
                })
            })
            .boxed();

        Ok(TransportResponse {
            status: 0,
            status_text: String::new(),
            headers,
            content_length,
            body: Some(body),
        })
    }
}
