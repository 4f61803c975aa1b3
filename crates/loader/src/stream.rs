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

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use http::HeaderMap;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::LoaderError,
    types::{LoaderEvent, TransferProgress},
};

/// Events of one streaming retrieval.
///
/// The stream ends right after the terminal event (`Complete` or `Error`).
/// If the transfer task goes away without one, for instance because the
/// transport panicked, a `TaskAborted` error is yielded in its place.
/// Dropping the stream aborts the transfer if it is still running.
pub struct ResourceStream {
    location: String,
    events:   mpsc::Receiver<LoaderEvent>,
    task:     JoinHandle<()>,
    finished: bool,
}

impl ResourceStream {
    pub(crate) const fn new(
        location: String,
        events: mpsc::Receiver<LoaderEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            location,
            events,
            task,
            finished: false,
        }
    }

    /// Stop the transfer; no further events are delivered
    pub fn cancel(self) { drop(self); }
}

impl Stream for ResourceStream {
    type Item = LoaderEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                this.finished = event.is_terminal();
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                tracing::error!(location = %this.location, "transfer task ended without a terminal event");
                Poll::Ready(Some(LoaderEvent::Error(LoaderError::TaskAborted {
                    location: std::mem::take(&mut this.location),
                })))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResourceStream {
    fn drop(&mut self) { self.task.abort(); }
}

type ChunkHandler = Box<dyn FnMut(Bytes, TransferProgress) + Send>;
type ErrorHandler = Box<dyn FnOnce(String) + Send>;
type HttpStatusHandler = Box<dyn FnOnce(&str, u16, &HeaderMap) + Send>;

/// Callback set for [`fetch_streaming_with`].
///
/// `on_chunk` and `on_error` are mandatory and taken by [`StreamHandlers::new`];
/// the rest are optional and simply never called when absent.
///
/// [`fetch_streaming_with`]: crate::StreamingResourceLoader::fetch_streaming_with
pub struct StreamHandlers {
    on_chunk:       ChunkHandler,
    on_error:       Option<ErrorHandler>,
    on_open:        Option<Box<dyn FnOnce() + Send>>,
    on_complete:    Option<Box<dyn FnOnce() + Send>>,
    on_http_status: Option<HttpStatusHandler>,
}

impl StreamHandlers {
    pub fn new<C, E>(on_chunk: C, on_error: E) -> Self
    where
        C: FnMut(Bytes, TransferProgress) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        Self {
            on_chunk:       Box::new(on_chunk),
            on_error:       Some(Box::new(on_error)),
            on_open:        None,
            on_complete:    None,
            on_http_status: None,
        }
    }

    #[must_use]
    pub fn on_open(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called with `(location, status, headers)` once headers are available
    #[must_use]
    pub fn on_http_status(mut self, f: impl FnOnce(&str, u16, &HeaderMap) + Send + 'static) -> Self {
        self.on_http_status = Some(Box::new(f));
        self
    }

    /// Route one event to its handler. Returns true once a terminal event has
    /// been handled.
    pub(crate) fn dispatch(&mut self, event: LoaderEvent) -> bool {
        match event {
            LoaderEvent::Open => {
                if let Some(f) = self.on_open.take() {
                    f();
                }
            }
            LoaderEvent::HttpStatus(status) => {
                if let Some(f) = self.on_http_status.take() {
                    f(&status.location, status.status, &status.headers);
                }
            }
            LoaderEvent::Chunk(chunk) => (self.on_chunk)(chunk.data, chunk.progress),
            LoaderEvent::Complete => {
                if let Some(f) = self.on_complete.take() {
                    f();
                }
                return true;
            }
            LoaderEvent::Error(err) => {
                if let Some(f) = self.on_error.take() {
                    f(err.reason());
                }
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::StreamExt;

    use super::*;
    use crate::types::StreamChunk;

    fn recording_handlers(log: &Arc<Mutex<Vec<String>>>) -> StreamHandlers {
        let (chunks, errors, opens, completes, statuses) = (
            Arc::clone(log),
            Arc::clone(log),
            Arc::clone(log),
            Arc::clone(log),
            Arc::clone(log),
        );
        StreamHandlers::new(
            move |data, progress| {
                chunks
                    .lock()
                    .unwrap()
                    .push(format!("chunk:{}:{}", data.len(), progress.loaded));
            },
            move |reason| errors.lock().unwrap().push(format!("error:{reason}")),
        )
        .on_open(move || opens.lock().unwrap().push("open".to_string()))
        .on_complete(move || completes.lock().unwrap().push("complete".to_string()))
        .on_http_status(move |location, status, _| {
            statuses
                .lock()
                .unwrap()
                .push(format!("status:{location}:{status}"));
        })
    }

    #[test]
    fn test_dispatch_routes_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = recording_handlers(&log);

        assert!(!handlers.dispatch(LoaderEvent::Open));
        assert!(!handlers.dispatch(LoaderEvent::HttpStatus(crate::types::HttpStatus {
            location: "data.bin".to_string(),
            status:   200,
            headers:  HeaderMap::new(),
        })));
        assert!(!handlers.dispatch(LoaderEvent::Chunk(StreamChunk {
            data:     Bytes::from_static(b"abc"),
            progress: TransferProgress {
                loaded: 3,
                total:  3,
            },
        })));
        assert!(handlers.dispatch(LoaderEvent::Complete));

        assert_eq!(*log.lock().unwrap(), vec![
            "open",
            "status:data.bin:200",
            "chunk:3:3",
            "complete"
        ]);
    }

    #[test]
    fn test_dispatch_error_uses_reason() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = recording_handlers(&log);
        assert!(handlers.dispatch(LoaderEvent::Error(LoaderError::Http {
            location:    "missing.bin".to_string(),
            status:      404,
            status_text: "Not Found".to_string(),
        })));
        assert_eq!(*log.lock().unwrap(), vec!["error:Not Found"]);
    }

    #[tokio::test]
    async fn test_stream_stops_after_terminal_event() {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async {});
        let mut stream = ResourceStream::new("data.bin".to_string(), rx, task);

        tx.send(LoaderEvent::Open).await.unwrap();
        tx.send(LoaderEvent::Complete).await.unwrap();
        tx.send(LoaderEvent::Open).await.unwrap();

        assert!(matches!(stream.next().await, Some(LoaderEvent::Open)));
        assert!(matches!(stream.next().await, Some(LoaderEvent::Complete)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_without_terminal_event_is_error() {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async {});
        let mut stream = ResourceStream::new("data.bin".to_string(), rx, task);

        tx.send(LoaderEvent::Open).await.unwrap();
        drop(tx);

        assert!(matches!(stream.next().await, Some(LoaderEvent::Open)));
        match stream.next().await {
            Some(LoaderEvent::Error(LoaderError::TaskAborted { location })) => {
                assert_eq!(location, "data.bin");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (_tx, rx) = mpsc::channel::<LoaderEvent>(1);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = started_tx.send(());
            futures::future::pending::<()>().await;
        });
        let abort = task.abort_handle();
        let stream = ResourceStream::new("data.bin".to_string(), rx, task);

        started_rx.await.unwrap();
        stream.cancel();
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
