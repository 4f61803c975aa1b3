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

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TelemetryError {
    #[snafu(display("Global logging has already been initialized"))]
    AlreadyInitialized,

    #[snafu(display("Logging has not been initialized"))]
    NotInitialized,

    #[snafu(display("Invalid log level '{level}'"))]
    InvalidLevel {
        level:  String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[snafu(display("Failed to create log files in {dir}"))]
    FileAppender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("Failed to forward log records"))]
    LogTracer {
        source: tracing_log::log::SetLoggerError,
    },

    #[snafu(display("Failed to install global subscriber"))]
    SetGlobal {
        source: tracing::subscriber::SetGlobalDefaultError,
    },

    #[snafu(display("Failed to reload log level"))]
    Reload {
        source: tracing_subscriber::reload::Error,
    },
}
