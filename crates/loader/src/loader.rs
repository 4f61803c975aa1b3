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

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use snafu::ensure;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::{
    config::LoaderConfig,
    error::{HttpSnafu, LoaderError, NullPayloadSnafu},
    location::{Target, resolve},
    state::{DeliveryMode, Transfer},
    stream::{ResourceStream, StreamHandlers},
    transport::{BodyStream, FileTransport, HttpTransport, Transport, TransportResponse},
    types::{HttpStatus, LoaderEvent, ResourceRequest, StreamChunk, TransferProgress},
};

/// Upper bound for preallocating a whole-buffer payload from the reported
/// length.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Loader bound to one resource request.
///
/// Two retrieval modes share the same transport:
/// - [`fetch_whole`](Self::fetch_whole) resolves to the complete payload
/// - [`fetch_streaming`](Self::fetch_streaming) yields [`LoaderEvent`]s as
///   the transfer advances
///
/// Every retrieval is independent: it sends the stored request again and owns
/// its response exclusively. No retry is attempted on failure.
pub struct StreamingResourceLoader {
    request:      Arc<ResourceRequest>,
    target:       Target,
    transport:    Arc<dyn Transport>,
    event_buffer: usize,
}

impl StreamingResourceLoader {
    /// Create a loader, choosing the transport from the resolved location
    pub fn new(request: ResourceRequest, config: &LoaderConfig) -> Result<Self, LoaderError> {
        let target = resolve(&request.location, config.base_url.as_ref())?;
        let transport: Arc<dyn Transport> = match target {
            Target::Http(_) => Arc::new(HttpTransport::new(config)?),
            Target::File(_) => Arc::new(FileTransport::new(config)),
        };
        Ok(Self::assemble(request, target, transport, config))
    }

    /// Create a loader that sends through `transport`
    pub fn with_transport(
        request: ResourceRequest,
        transport: Arc<dyn Transport>,
        config: &LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let target = resolve(&request.location, config.base_url.as_ref())?;
        Ok(Self::assemble(request, target, transport, config))
    }

    fn assemble(
        request: ResourceRequest,
        target: Target,
        transport: Arc<dyn Transport>,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            request: Arc::new(request),
            target,
            transport,
            event_buffer: config.event_buffer.max(1),
        }
    }

    #[must_use]
    pub fn request(&self) -> &ResourceRequest { &self.request }

    #[must_use]
    pub const fn target(&self) -> &Target { &self.target }

    /// Fetch the complete payload
    pub async fn fetch_whole(&self) -> Result<Bytes, LoaderError> {
        self.fetch_whole_with_progress(|_| {}).await
    }

    /// Fetch the complete payload, reporting cumulative progress each time new
    /// bytes arrive. `loaded` never decreases between calls.
    pub async fn fetch_whole_with_progress<F>(&self, mut on_progress: F) -> Result<Bytes, LoaderError>
    where
        F: FnMut(TransferProgress) + Send,
    {
        let mut transfer = Transfer::new(DeliveryMode::Buffered);
        let result = self.read_whole(&mut transfer, &mut on_progress).await;

        if let Err(ref err) = result {
            if transfer.fail().is_err() {
                error!(location = %self.request.location, error = %err, "whole fetch failed after completion");
            }
            report_failure(&self.request.location, err);
        }
        result
    }

    async fn read_whole<F>(
        &self,
        transfer: &mut Transfer,
        on_progress: &mut F,
    ) -> Result<Bytes, LoaderError>
    where
        F: FnMut(TransferProgress) + Send,
    {
        transfer.open()?;
        let response = self.transport.send(&self.request, &self.target).await?;
        let total = response.content_length.unwrap_or(0);
        transfer.headers_received(total)?;

        let mut body = accept(response, &self.request.location)?;
        #[allow(clippy::cast_possible_truncation)]
        let mut buffer = BytesMut::with_capacity(total.min(MAX_PREALLOC) as usize);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            let progress = transfer.data(chunk.len())?;
            buffer.extend_from_slice(&chunk);
            on_progress(progress);
        }

        transfer.finish()?;
        Ok(buffer.freeze())
    }

    /// Start a streaming retrieval.
    ///
    /// The delivery mode is fixed before the request is sent: progressive when
    /// the transport supports it, otherwise one buffered chunk reported with
    /// `loaded = 0` and `total` equal to the payload length.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn fetch_streaming(&self) -> ResourceStream {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let driver = StreamDriver {
            request:   Arc::clone(&self.request),
            target:    self.target.clone(),
            transport: Arc::clone(&self.transport),
            events:    tx,
        };
        let task = tokio::spawn(driver.run());
        ResourceStream::new(self.request.location.clone(), rx, task)
    }

    /// Run a streaming retrieval to its end, routing every event to
    /// `handlers`
    pub async fn fetch_streaming_with(&self, mut handlers: StreamHandlers) {
        let mut stream = self.fetch_streaming();
        while let Some(event) = stream.next().await {
            if handlers.dispatch(event) {
                break;
            }
        }
    }
}

/// Check the status and payload of a response, yielding its body
fn accept(response: TransportResponse, location: &str) -> Result<BodyStream, LoaderError> {
    let success = response.is_success_status();
    let TransportResponse {
        status,
        status_text,
        body,
        ..
    } = response;

    ensure!(
        success,
        HttpSnafu {
            location,
            status,
            status_text,
        }
    );
    body.ok_or_else(|| {
        NullPayloadSnafu {
            location,
            status_text,
        }
        .build()
    })
}

fn report_failure(location: &str, err: &LoaderError) {
    if err.is_transport_failure() {
        warn!(location, reason = %err.reason(), "Path: {location} not found");
    } else {
        error!(location, error = %err, "resource fetch failed");
    }
}

/// Why a streaming transfer stopped early
enum Halt {
    /// The consumer dropped the stream
    Closed,
    Failed(LoaderError),
}

impl From<LoaderError> for Halt {
    fn from(err: LoaderError) -> Self { Self::Failed(err) }
}

/// Drives one streaming transfer inside its own task
struct StreamDriver {
    request:   Arc<ResourceRequest>,
    target:    Target,
    transport: Arc<dyn Transport>,
    events:    mpsc::Sender<LoaderEvent>,
}

impl StreamDriver {
    async fn run(self) {
        let mode = DeliveryMode::detect(self.transport.supports_progressive());
        let mut transfer = Transfer::new(mode);
        debug!(location = %self.request.location, %mode, "streaming transfer started");

        match self.drive(&mut transfer).await {
            Ok(()) => debug!(
                location = %self.request.location,
                loaded = transfer.progress().loaded,
                "streaming transfer completed"
            ),
            Err(Halt::Closed) => {
                debug!(location = %self.request.location, "stream consumer went away");
            }
            Err(Halt::Failed(err)) => {
                if transfer.fail().is_err() {
                    error!(location = %self.request.location, error = %err, "failure after terminal phase");
                    return;
                }
                report_failure(&self.request.location, &err);
                let _ = self.emit(LoaderEvent::Error(err)).await;
            }
        }
    }

    async fn drive(&self, transfer: &mut Transfer) -> Result<(), Halt> {
        transfer.open()?;
        self.emit(LoaderEvent::Open).await?;

        let response = self.transport.send(&self.request, &self.target).await?;
        transfer.headers_received(response.content_length.unwrap_or(0))?;
        self.emit(LoaderEvent::HttpStatus(HttpStatus {
            location: self.request.location.clone(),
            status:   response.status,
            headers:  response.headers.clone(),
        }))
        .await?;

        let mut body = accept(response, &self.request.location)?;
        match transfer.mode() {
            DeliveryMode::Progressive => {
                while let Some(chunk) = body.next().await {
                    let data = chunk?;
                    if data.is_empty() {
                        continue;
                    }
                    let progress = transfer.data(data.len())?;
                    self.emit(LoaderEvent::Chunk(StreamChunk { data, progress }))
                        .await?;
                }
            }
            DeliveryMode::Buffered => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = body.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                let data = buffer.freeze();
                transfer.data(data.len())?;
                // Reports the payload length, not a running counter.
                let progress = TransferProgress {
                    loaded: 0,
                    total:  data.len() as u64,
                };
                self.emit(LoaderEvent::Chunk(StreamChunk { data, progress }))
                    .await?;
            }
        }

        transfer.finish()?;
        self.emit(LoaderEvent::Complete).await
    }

    async fn emit(&self, event: LoaderEvent) -> Result<(), Halt> {
        self.events.send(event).await.map_err(|_| Halt::Closed)
    }
}
