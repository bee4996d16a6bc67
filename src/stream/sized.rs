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

/// A window of exactly `size` bytes over a parent stream.
///
/// Never takes more than `size` bytes from the parent, so whatever follows stays there for the
/// next reader. If the parent ends before `size` bytes were seen, the stream fails with
/// [`StreamError::Truncated`].
pub struct ExactSizeStream {
    parent: StreamHandle,
    buffer: BytesMut,
    size: u64,
    received: u64,
    max_buffer_size: usize,
    truncated: bool,
}

impl ExactSizeStream {
    #[must_use]
    pub fn new(parent: StreamHandle, size: u64) -> Self {
        let max_buffer_size = parent.borrow().max_buffer_size();

        Self {
            parent,
            buffer: BytesMut::new(),
            size,
            received: 0,
            max_buffer_size,
            truncated: false,
        }
    }

    fn truncated(&self) -> StreamError {
        StreamError::Truncated {
            expected: self.size,
            received: self.received,
        }
    }
}

impl InputStream for ExactSizeStream {
    fn read(&mut self) -> Result<ReadStatus, StreamError> {
        if self.truncated {
            return Err(self.truncated());
        }

        let remaining = self.size - self.received;
        if remaining == 0 {
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
                    self.truncated = true;
                    return Err(self.truncated());
                }
                status @ (ReadStatus::WouldBlock | ReadStatus::BufferFull) => return Ok(status),
            }
        }

        let available = parent.data();
        let take = available
            .len()
            .min(space)
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));

        self.buffer.extend_from_slice(&available[..take]);
        parent.skip(take);
        self.received += take as u64;

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
        self.truncated || self.received == self.size
    }
}
