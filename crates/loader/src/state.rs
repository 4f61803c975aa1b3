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

use snafu::ensure;
use strum_macros::{Display, EnumString};

use crate::{
    error::{IllegalTransitionSnafu, LoaderError},
    types::TransferProgress,
};

/// Lifecycle phase of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransferPhase {
    /// Nothing sent yet
    Idle,
    /// Request sent, waiting for headers
    Opened,
    /// Status and headers are known, no data yet
    HeadersReceived,
    /// At least one piece of data arrived
    Transferring,
    /// Terminal: payload fully delivered
    Completed,
    /// Terminal: the request failed
    Failed,
}

impl TransferPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// How response bytes reach the caller, fixed for the whole request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryMode {
    /// Each received piece is forwarded as it arrives
    Progressive,
    /// The payload is held back and delivered once as a single piece
    Buffered,
}

impl DeliveryMode {
    #[must_use]
    pub const fn detect(supports_progressive: bool) -> Self {
        if supports_progressive {
            Self::Progressive
        } else {
            Self::Buffered
        }
    }
}

/// State machine guarding the order of transport events for one request.
///
/// Every event is checked against the current phase; an event arriving in a
/// phase that cannot accept it yields [`LoaderError::IllegalTransition`] and
/// leaves the phase untouched.
#[derive(Debug, Clone)]
pub struct Transfer {
    phase:    TransferPhase,
    mode:     DeliveryMode,
    progress: TransferProgress,
}

impl Transfer {
    #[must_use]
    pub const fn new(mode: DeliveryMode) -> Self {
        Self {
            phase: TransferPhase::Idle,
            mode,
            progress: TransferProgress {
                loaded: 0,
                total:  0,
            },
        }
    }

    #[must_use]
    pub const fn phase(&self) -> TransferPhase { self.phase }

    #[must_use]
    pub const fn mode(&self) -> DeliveryMode { self.mode }

    #[must_use]
    pub const fn progress(&self) -> TransferProgress { self.progress }

    /// Idle -> Opened
    pub fn open(&mut self) -> Result<(), LoaderError> {
        self.expect("open", matches!(self.phase, TransferPhase::Idle))?;
        self.phase = TransferPhase::Opened;
        Ok(())
    }

    /// Opened -> HeadersReceived, recording the expected length
    pub fn headers_received(&mut self, total: u64) -> Result<(), LoaderError> {
        self.expect("headers", matches!(self.phase, TransferPhase::Opened))?;
        self.phase = TransferPhase::HeadersReceived;
        self.progress.total = total;
        Ok(())
    }

    /// HeadersReceived | Transferring -> Transferring, returning the
    /// cumulative counters after `len` new bytes
    pub fn data(&mut self, len: usize) -> Result<TransferProgress, LoaderError> {
        self.expect(
            "data",
            matches!(
                self.phase,
                TransferPhase::HeadersReceived | TransferPhase::Transferring
            ),
        )?;
        self.phase = TransferPhase::Transferring;
        self.progress.loaded += len as u64;
        // Servers may under-report; never let total lag behind loaded.
        if self.progress.total != 0 && self.progress.loaded > self.progress.total {
            self.progress.total = self.progress.loaded;
        }
        Ok(self.progress)
    }

    /// HeadersReceived | Transferring -> Completed
    pub fn finish(&mut self) -> Result<(), LoaderError> {
        self.expect(
            "finish",
            matches!(
                self.phase,
                TransferPhase::HeadersReceived | TransferPhase::Transferring
            ),
        )?;
        self.phase = TransferPhase::Completed;
        Ok(())
    }

    /// Any non-terminal phase -> Failed
    pub fn fail(&mut self) -> Result<(), LoaderError> {
        self.expect("fail", !self.phase.is_terminal())?;
        self.phase = TransferPhase::Failed;
        Ok(())
    }

    fn expect(&self, event: &'static str, allowed: bool) -> Result<(), LoaderError> {
        ensure!(
            allowed,
            IllegalTransitionSnafu {
                from: self.phase,
                event,
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        transfer.headers_received(10).unwrap();
        assert_eq!(transfer.data(4).unwrap().loaded, 4);
        let progress = transfer.data(6).unwrap();
        assert_eq!(progress, TransferProgress {
            loaded: 10,
            total:  10,
        });
        transfer.finish().unwrap();
        assert_eq!(transfer.phase(), TransferPhase::Completed);
    }

    #[test]
    fn test_empty_body_completes_from_headers() {
        let mut transfer = Transfer::new(DeliveryMode::Buffered);
        transfer.open().unwrap();
        transfer.headers_received(0).unwrap();
        transfer.finish().unwrap();
        assert!(transfer.phase().is_terminal());
    }

    #[test]
    fn test_data_before_headers_is_rejected() {
        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        let err = transfer.data(1).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::IllegalTransition {
                from: TransferPhase::Opened,
                event: "data",
            }
        ));
        assert_eq!(transfer.phase(), TransferPhase::Opened);
    }

    #[test]
    fn test_terminal_phases_accept_nothing() {
        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        transfer.fail().unwrap();
        assert!(transfer.fail().is_err());
        assert!(transfer.finish().is_err());
        assert!(transfer.data(1).is_err());

        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        transfer.headers_received(0).unwrap();
        transfer.finish().unwrap();
        assert!(transfer.fail().is_err());
        assert!(transfer.open().is_err());
    }

    #[test]
    fn test_total_never_lags_loaded() {
        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        transfer.headers_received(2).unwrap();
        let progress = transfer.data(5).unwrap();
        assert_eq!(progress.loaded, 5);
        assert_eq!(progress.total, 5);
    }

    #[test]
    fn test_unknown_total_stays_zero() {
        let mut transfer = Transfer::new(DeliveryMode::Progressive);
        transfer.open().unwrap();
        transfer.headers_received(0).unwrap();
        assert_eq!(transfer.data(7).unwrap().total, 0);
    }

    #[test]
    fn test_mode_detection() {
        assert_eq!(DeliveryMode::detect(true), DeliveryMode::Progressive);
        assert_eq!(DeliveryMode::detect(false), DeliveryMode::Buffered);
        assert_eq!(
            "headers_received".parse::<TransferPhase>().unwrap(),
            TransferPhase::HeadersReceived
        );
    }
}
