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

use std::rc::Rc;

use bytes::{Buf, BytesMut};

use super::{InputStream, ReadStatus, StreamError, StreamHandle};

/// Passes through the first `offset` bytes of a parent stream, then fails with
/// [`StreamError::TooLarge`] if the parent has anything more to give.
///
/// A parent that ends at exactly `offset` bytes ends this stream cleanly.
pub struct FailureAtStream {
    parent: StreamHandle,
    buffer: BytesMut,
    offset: u64,
    position: u64,
    message: String,
    max_buffer_size: usize,
    ended: bool,
    failed: bool,
}

impl FailureAtStream {
    #[must_use]
    pub fn new(parent: StreamHandle, offset: u64, message: String) -> Self {
        let max_buffer_size = parent.borrow().max_buffer_size();

        Self {
            parent,
            buffer: BytesMut::new(),
            offset,
            position: 0,
            message,
            max_buffer_size,
            ended: false,
            failed: false,
        }
    }
}

impl InputStream for FailureAtStream {
    fn read(&mut self) -> Result<ReadStatus, StreamError> {
        if self.failed {
            return Err(StreamError::TooLarge(self.message.clone()));
        }
        if self.ended {
            return Ok(ReadStatus::Eof);
        }

        let space = self.max_buffer_size.saturating_sub(self.buffer.len());
        if space == 0 {
            return Ok(ReadStatus::BufferFull);
        }

        let parent = Rc::clone(&self.parent);
        let mut parent = parent.borrow_mut();

        if parent.data().is_empty() {
            match parent.read()? {
                ReadStatus::Data => (),
                ReadStatus::Eof => {
                    self.ended = true;
                    return Ok(ReadStatus::Eof);
                }
                status @ (ReadStatus::WouldBlock | ReadStatus::BufferFull) => return Ok(status),
            }
        }

        let allowed = usize::try_from(self.offset - self.position).unwrap_or(usize::MAX);
        if allowed == 0 {
            self.failed = true;
            return Err(StreamError::TooLarge(self.message.clone()));
        }

        let available = parent.data();
        let take = available.len().min(allowed).min(space);

        self.buffer.extend_from_slice(&available[..take]);
        parent.skip(take);
        self.position += take as u64;

        Ok(ReadStatus::Data)
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
        self.ended || self.failed
    }
}

/// A stream that fails with [`StreamError::TooLarge`] as soon as it is read.
///
/// Reports its end only after that first failure, so a reader that never looked at it still gets
/// to see the error.
pub struct ErrorStream {
    message: String,
    failed: bool,
}

impl ErrorStream {
    #[must_use]
    pub const fn too_large(message: String) -> Self {
        Self {
            message,
            failed: false,
        }
    }
}

impl InputStream for ErrorStream {
    fn read(&mut self) -> Result<ReadStatus, StreamError> {
        self.failed = true;

        Err(StreamError::TooLarge(self.message.clone()))
    }

    fn data(&self) -> &[u8] {
        &[]
    }

    fn skip(&mut self, count: usize) {
        debug_assert_eq!(count, 0, "an error stream never has data to skip");
    }

    fn max_buffer_size(&self) -> usize {
        0
    }

    fn is_eof(&self) -> bool {
        self.failed
    }
}
