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

use crate::state::TransferPhase;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoaderError {
    #[snafu(display("Network error for {location}: {source}"))]
    Network {
        location: String,
        source:   reqwest::Error,
    },

    #[snafu(display("HTTP error {status} ({status_text}) for location: {location}"))]
    Http {
        location:    String,
        status:      u16,
        status_text: String,
    },

    #[snafu(display("No response payload for location: {location}"))]
    NullPayload {
        location:    String,
        status_text: String,
    },

    #[snafu(display("File read error for {location}: {source}"))]
    FileRead {
        location: String,
        source:   std::io::Error,
    },

    #[snafu(display("Invalid location {location}: {source}"))]
    InvalidLocation {
        location: String,
        source:   url::ParseError,
    },

    #[snafu(display("Unsupported scheme {scheme} in location: {location}"))]
    UnsupportedScheme { location: String, scheme: String },

    #[snafu(display("Illegal transfer event {event} in phase {from}"))]
    IllegalTransition {
        from:  TransferPhase,
        event: &'static str,
    },

    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("Transfer of {location} stopped before finishing"))]
    TaskAborted { location: String },
}

impl LoaderError {
    /// Human-readable reason handed to error callbacks.
    ///
    /// HTTP failures report the status text alone (e.g. `Not Found`); every
    /// other kind reports its display form. Never empty.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Http {
                status,
                status_text,
                ..
            } => {
                if status_text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    status_text.clone()
                }
            }
            Self::NullPayload { status_text, .. } if !status_text.is_empty() => {
                status_text.clone()
            }
            other => other.to_string(),
        }
    }

    /// Whether the error came from the remote side rather than from a local
    /// defect or misconfiguration
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Http { .. } | Self::NullPayload { .. } | Self::FileRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_reason_is_status_text() {
        let err = LoaderError::Http {
            location:    "missing.bin".to_string(),
            status:      404,
            status_text: "Not Found".to_string(),
        };
        assert_eq!(err.reason(), "Not Found");
        assert!(err.is_transport_failure());
    }

    #[test]
    fn http_reason_falls_back_to_status_code() {
        let err = LoaderError::Http {
            location:    "odd.bin".to_string(),
            status:      599,
            status_text: String::new(),
        };
        assert_eq!(err.reason(), "HTTP 599");
    }

    #[test]
    fn null_payload_reason_is_never_empty() {
        let err = LoaderError::NullPayload {
            location:    "local.bin".to_string(),
            status_text: String::new(),
        };
        assert!(!err.reason().is_empty());

        let err = LoaderError::IllegalTransition {
            from:  TransferPhase::Completed,
            event: "data",
        };
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn task_aborted_reason_names_location() {
        let err = LoaderError::TaskAborted {
            location: "data.bin".to_string(),
        };
        assert_eq!(err.reason(), "Transfer of data.bin stopped before finishing");
        assert!(!err.is_transport_failure());
    }
}
