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

use std::path::{Path, PathBuf};

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use reqwest::Method;
use resload_common_telemetry::{LogFormat, LoggingOptions, init_global_logging, set_panic_hook};
use resload_loader::{
    LoaderConfig, LoaderEvent, ResourceRequest, StreamingResourceLoader, TransferOutcome,
};
use snafu::{ResultExt, Whatever, ensure_whatever, whatever};
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug, Parser)]
#[clap(
name = "resload",
about= "Fetch binary resources over HTTP or from local files",
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Level filter, e.g. "debug" or "info,resload_loader=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log line format: text or json
    #[arg(long, global = true, default_value = "text", value_parser = parse_log_format)]
    log_format: LogFormat,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Fetch(FetchArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Fetch one resource and write it to a file, or report its size.
Examples:

resload fetch https://example.com/movie.swf --output movie.swf

resload fetch data.bin --base-url http://localhost:8080/assets/ --stream

resload fetch ./local/movie.swf --stream --no-progressive

")]
struct FetchArgs {
    /// Absolute URL, file:// URL, or path; relative to --base-url if given
    location: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    method: Method,

    /// Content-Type header sent with the request
    #[arg(long)]
    content_type: Option<String>,

    /// Request body
    #[arg(long)]
    data: Option<String>,

    /// Write the payload here instead of only reporting its size
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Consume the resource as a stream of chunks
    #[arg(long)]
    stream: bool,

    /// Deliver the streamed resource as a single chunk
    #[arg(long)]
    no_progressive: bool,

    /// Base URL for relative locations
    #[arg(long)]
    base_url: Option<Url>,
}

impl FetchArgs {
    fn loader(&self) -> Result<StreamingResourceLoader, Whatever> {
        let request = ResourceRequest::builder()
            .location(self.location.clone())
            .method(self.method.clone())
            .maybe_content_type(self.content_type.clone())
            .maybe_body(self.data.clone().map(Bytes::from))
            .build();
        let config = LoaderConfig::builder()
            .maybe_base_url(self.base_url.clone())
            .user_agent(concat!("resload/", env!("CARGO_PKG_VERSION")))
            .progressive(!self.no_progressive)
            .build();
        StreamingResourceLoader::new(request, &config)
            .with_whatever_context(|_| format!("cannot load {}", self.location))
    }

    async fn run(&self) -> Result<(), Whatever> {
        let loader = self.loader()?;
        if self.stream {
            self.run_streaming(&loader).await
        } else {
            self.run_whole(&loader).await
        }
    }

    async fn run_whole(&self, loader: &StreamingResourceLoader) -> Result<(), Whatever> {
        let outcome = TransferOutcome::from(
            loader
                .fetch_whole_with_progress(|progress| {
                    tracing::debug!(loaded = progress.loaded, total = progress.total, "progress");
                })
                .await,
        );
        let payload = match outcome {
            TransferOutcome::Success(payload) => payload,
            TransferOutcome::Failure(reason) => {
                whatever!("failed to fetch {}: {}", self.location, reason)
            }
        };

        if let Some(path) = &self.output {
            tokio::fs::write(path, &payload)
                .await
                .with_whatever_context(|_| format!("failed to write {}", path.display()))?;
        }
        report(&self.location, payload.len() as u64, self.output.as_deref());
        Ok(())
    }

    async fn run_streaming(&self, loader: &StreamingResourceLoader) -> Result<(), Whatever> {
        let mut file = match &self.output {
            Some(path) => Some(
                tokio::fs::File::create(path)
                    .await
                    .with_whatever_context(|_| format!("failed to create {}", path.display()))?,
            ),
            None => None,
        };

        let mut written = 0u64;
        let mut completed = false;
        let mut events = loader.fetch_streaming();
        while let Some(event) = events.next().await {
            match event {
                LoaderEvent::Open => tracing::debug!(location = %self.location, "opened"),
                LoaderEvent::HttpStatus(status) => {
                    tracing::info!(location = %status.location, status = status.status, "headers received");
                }
                LoaderEvent::Chunk(chunk) => {
                    tracing::debug!(
                        len = chunk.data.len(),
                        loaded = chunk.progress.loaded,
                        total = chunk.progress.total,
                        "chunk"
                    );
                    if let Some(file) = file.as_mut() {
                        file.write_all(&chunk.data)
                            .await
                            .whatever_context("failed to write chunk")?;
                    }
                    written += chunk.data.len() as u64;
                }
                LoaderEvent::Complete => {
                    completed = true;
                    break;
                }
                LoaderEvent::Error(err) => {
                    whatever!("failed to fetch {}: {}", self.location, err.reason())
                }
            }
        }

        ensure_whatever!(
            completed,
            "transfer of {} ended without completing",
            self.location
        );

        if let Some(mut file) = file {
            file.flush().await.whatever_context("failed to flush output")?;
        }
        report(&self.location, written, self.output.as_deref());
        Ok(())
    }
}

fn report(location: &str, len: u64, output: Option<&Path>) {
    match output {
        Some(path) => println!("{location}: {len} bytes written to {}", path.display()),
        None => println!("{location}: {len} bytes"),
    }
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes()).map_err(|e| e.to_string())
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}', expected text or json")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let opts = LoggingOptions::builder()
        .maybe_level(cli.log_level.clone())
        .log_format(cli.log_format)
        .build();
    let _guards =
        init_global_logging("resload", &opts).whatever_context("failed to initialize logging")?;
    set_panic_hook();

    let run = async {
        match &cli.commands {
            Commands::Fetch(args) => args.run().await,
        }
    };
    run_until_interrupted(run, tokio::signal::ctrl_c()).await
}

/// Run `task` unless `interrupt` resolves first, which cancels it and fails
async fn run_until_interrupted<T, I>(task: T, interrupt: I) -> Result<(), Whatever>
where
    T: Future<Output = Result<(), Whatever>>,
    I: Future,
{
    tokio::select! {
        result = task => result,
        _ = interrupt => {
            tracing::warn!("interrupted");
            whatever!("interrupted")
        }
    }
}
