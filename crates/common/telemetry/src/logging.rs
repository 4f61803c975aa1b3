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
    env,
    io::IsTerminal,
    sync::{
        Arc, Mutex, Once,
        atomic::{AtomicBool, Ordering},
    },
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, fmt::MakeWriter, layer::SubscriberExt,
    registry::LookupSpan,
};

use crate::error::{
    AlreadyInitializedSnafu, FileAppenderSnafu, InvalidLevelSnafu, LogTracerSnafu,
    NotInitializedSnafu, ReloadSnafu, SetGlobalSnafu, TelemetryError,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Lets configuration files spell "use the default" as `""` as well as by
/// omitting the field.
///
/// # Errors
/// Returns an error if the non-empty string does not parse as `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default log level filter when neither `LoggingOptions::level` nor
/// `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Handle for changing the level filter after initialization.
///
/// Only populated once `init_global_logging` has succeeded.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rolling log files. Empty means stdout only.
    ///
    /// Files rotate hourly; a second, error-only set of files is written next
    /// to the main one.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Level filter such as `"info"` or `"info,resload_loader=debug"`.
    ///
    /// Falls back to `RUST_LOG`, then to `info`.
    #[builder(into)]
    pub level: Option<String>,

    /// Output format for log lines
    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Maximum number of rotated files kept per set (default: 720, a month of
    /// hourly files)
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Whether to also log to stdout (default: true)
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation
    ///
    /// ```json
    /// {"timestamp":"2024-01-01T12:00:00Z","level":"INFO","target":"resload","message":"fetch started"}
    /// ```
    Json,

    /// Human-readable lines
    ///
    /// ```text
    /// 2024-01-01T12:00:00.123Z  INFO resload: fetch started
    /// ```
    #[default]
    Text,
}

/// Initialize stdout-only logging with default options.
///
/// The returned guards must stay alive for log lines to be flushed.
///
/// # Errors
/// Fails when logging was already initialized.
pub fn init_tracing_subscriber(app_name: &str) -> Result<Vec<WorkerGuard>, TelemetryError> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for unit tests.
///
/// Safe to call from every test; only the first call does anything. Reads
/// `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) and
/// `UNITTEST_LOG_LEVEL`.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,hyper_util=warn,tower=warn,reqwest=warn,h2=info".to_string()
        });
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut slot) = GLOBAL_UT_LOG_GUARD.lock() {
                    *slot = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(err) => eprintln!("unit test logging disabled: {err}"),
        }
    });
}

/// Keeps the unit test writers alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Initialize the global subscriber.
///
/// Layers, depending on `opts`:
/// - stdout, when `append_stdout` is set
/// - hourly rolling files named after `app_name`, when `dir` is set
/// - error-only rolling files (`{app_name}-err`), when `dir` is set
///
/// All writers are non-blocking; keep the returned guards alive until
/// shutdown. `log` records are forwarded into `tracing`.
///
/// # Errors
/// Fails on a second call, on an unparsable level, or when the log directory
/// cannot be used.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, TelemetryError> {
    ensure!(!INITIALIZED.load(Ordering::SeqCst), AlreadyInitializedSnafu);

    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let targets = parse_level(&level)?;

    let mut guards = vec![];

    let stdout_layer = if opts.append_stdout {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        Some(fmt_layer(
            writer,
            opts.log_format,
            std::io::stdout().is_terminal(),
        ))
    } else {
        None
    };

    let (file_layer, err_file_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            &opts.dir,
            app_name,
            opts.max_log_files,
        )?);
        guards.push(guard);
        let file_layer = fmt_layer(writer, opts.log_format, false);

        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            &opts.dir,
            &format!("{app_name}-err"),
            opts.max_log_files,
        )?);
        guards.push(guard);
        let err_file_layer = fmt_layer(writer, opts.log_format, false)
            .with_filter(filter::LevelFilter::ERROR)
            .boxed();

        (Some(file_layer), Some(err_file_layer))
    };

    let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(targets);

    let subscriber = Registry::default()
        .with(dyn_filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(err_file_layer);

    // Claimed only once every fallible setup step above has passed.
    ensure!(
        !INITIALIZED.swap(true, Ordering::SeqCst),
        AlreadyInitializedSnafu
    );
    LogTracer::init().context(LogTracerSnafu)?;
    tracing::subscriber::set_global_default(subscriber).context(SetGlobalSnafu)?;
    let _ = RELOAD_HANDLE.set(reload_handle);

    Ok(guards)
}

/// Replace the level filter of the running subscriber.
///
/// # Errors
/// Fails on an unparsable level or before logging was initialized.
pub fn set_log_level(level: &str) -> Result<(), TelemetryError> {
    let targets = parse_level(level)?;
    let handle = RELOAD_HANDLE.get().context(NotInitializedSnafu)?;
    handle.reload(targets).context(ReloadSnafu)
}

fn parse_level(level: &str) -> Result<filter::Targets, TelemetryError> {
    level
        .parse::<filter::Targets>()
        .context(InvalidLevelSnafu { level })
}

fn rolling_appender(
    dir: &str,
    prefix: &str,
    max_log_files: usize,
) -> Result<RollingFileAppender, TelemetryError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_log_files)
        .build(dir)
        .context(FileAppenderSnafu { dir })
}

fn fmt_layer<S, W>(writer: W, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => layer.boxed(),
    }
}
