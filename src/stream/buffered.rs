// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright © 2024 RemasteredArch
//
// This file is part of smtp_command_parser.
//
// smtp_command_parser is free software: you can redistribute it and/or modify it under the terms
// of the GNU Affero General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
//
// smtp_command_parser is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License along with
// smtp_command_parser. If not, see <https://www.gnu.org/licenses/>.

use std::io;

use bytes::{Buf, BytesMut};

use super::{InputStream, ReadStatus, StreamError, DEFAULT_MAX_BUFFER_SIZE};

/// The smallest [`InputStream::max_buffer_size`] a [`BufferedInput`] accepts.
///
/// Large enough to always hold a complete command name and its terminator.
pub const MIN_BUFFER_SIZE: usize = 64;

/// An [`InputStream`] that is fed by whoever owns the transport.
///
/// Bytes passed to [`Self::feed`] become visible through [`InputStream::read`], at most
/// [`InputStream::max_buffer_size`] of them at a time.
#[derive(Debug)]
pub struct BufferedInput {
    buffer: BytesMut,
    pending: BytesMut,
    max_buffer_size: usize,
    closed: bool,
    failure: Option<(io::ErrorKind, String)>,
}

impl BufferedInput {
    /// Construct an empty [`Self`] with [`DEFAULT_MAX_BUFFER_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    /// Construct an empty [`Self`] that buffers at most `max_buffer_size` bytes at a time.
    ///
    /// Values below [`MIN_BUFFER_SIZE`] are raised to it.
    #[must_use]
    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        let max_buffer_size = max_buffer_size.max(MIN_BUFFER_SIZE);

        Self {
            buffer: BytesMut::with_capacity(max_buffer_size),
            pending: BytesMut::new(),
            max_buffer_size,
            closed: false,
            failure: None,
        }
    }

    /// Construct a [`Self`] that already holds `bytes` and has been closed.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut input = Self::new();
        input.feed(bytes);
        input.close();

        input
    }

    /// Queue bytes received from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Mark the transport as cleanly closed. Queued bytes can still be read.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Mark the transport as failed. Queued bytes can still be read, after which every read fails
    /// with [`StreamError::Io`].
    pub fn fail(&mut self, error: &io::Error) {
        self.failure = Some((error.kind(), error.to_string()));
    }

    /// The number of bytes fed but not yet made visible by a read.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for BufferedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputStream for BufferedInput {
    fn read(&mut self) -> Result<ReadStatus, StreamError> {
        if !self.pending.is_empty() {
            let space = self.max_buffer_size.saturating_sub(self.buffer.len());
            if space == 0 {
                return Ok(ReadStatus::BufferFull);
            }

            let chunk = self.pending.split_to(space.min(self.pending.len()));
            self.buffer.extend_from_slice(&chunk);

            return Ok(ReadStatus::Data);
        }

        if let Some((kind, reason)) = &self.failure {
            return Err(io::Error::new(*kind, reason.clone()).into());
        }

        Ok(if self.closed {
            ReadStatus::Eof
        } else {
            ReadStatus::WouldBlock
        })
    }

    fn data(&self) -> &[u8] {
        &self.buffer
    }

    fn skip(&mut self, count: usize) {
        self.buffer.advance(count);
    }

    fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    fn is_eof(&self) -> bool {
        self.pending.is_empty() && (self.closed || self.failure.is_some())
    }
}
