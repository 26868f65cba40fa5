//! Frame ordering for file transfers.
//!
//! In both directions the header frame comes first and exactly once; every
//! later frame is data. Both sides run incoming frames through a
//! [`FrameSequencer`].

use lockbox_common::TransferError;

use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    Streaming,
}

/// Enforces frame order on one stream.
#[derive(Debug)]
pub struct FrameSequencer {
    state: State,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingHeader,
        }
    }

    /// Check the next frame against the stream so far.
    ///
    /// # Errors
    /// - `DataBeforeHeader` if a data frame precedes the header
    /// - `DuplicateHeader` on a second header frame
    pub fn accept(&mut self, frame: &Frame) -> Result<(), TransferError> {
        match (self.state, frame) {
            (State::AwaitingHeader, Frame::Header(_)) => {
                self.state = State::Streaming;
                Ok(())
            }
            (State::AwaitingHeader, Frame::Data(_)) => Err(TransferError::DataBeforeHeader),
            (State::Streaming, Frame::Header(_)) => Err(TransferError::DuplicateHeader),
            (State::Streaming, Frame::Data(_)) => Ok(()),
        }
    }

    pub fn header_seen(&self) -> bool {
        self.state == State::Streaming
    }

    /// Check an upload at end of stream.
    ///
    /// # Errors
    /// - `EmptyUpload` if no frame arrived
    pub fn finish_upload(&self) -> Result<(), TransferError> {
        if self.header_seen() {
            Ok(())
        } else {
            Err(TransferError::EmptyUpload)
        }
    }

    /// Check a download at end of stream.
    ///
    /// # Errors
    /// - `MissingHeader` if no header arrived
    pub fn finish_download(&self) -> Result<(), TransferError> {
        if self.header_seen() {
            Ok(())
        } else {
            Err(TransferError::MissingHeader)
        }
    }
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}
