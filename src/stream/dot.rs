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

//! Reading of dot-stuffed mail data.
//!
//! [RFC 5321 section 4.5.2](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.2): the
//! sender doubles any `.` at the start of a line, and the data ends with a line consisting only
//! of `.`. The receiver deletes the first `.` of every line that starts with one.

use std::rc::Rc;

use bytes::{Buf, BytesMut};

use super::{InputStream, ReadStatus, StreamError, StreamHandle};

/// Where in a line the unstuffer currently is.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
enum State {
    /// At the start of a line, including the very start of the data.
    LineStart,
    /// After a `.` at the start of a line.
    Dot,
    /// After `.` and `CR` at the start of a line.
    DotCr,
    /// Inside a line.
    Text,
    /// After a `CR` inside a line.
    Cr,
}

/// Removes dot-stuffing from a parent stream and ends at the terminating `.` line.
///
/// The line ending before the terminating line is part of the output, the terminating line is
/// not. Nothing after the terminating line is taken from the parent. Bare `LF` is accepted as a
/// line ending.
pub struct DotStream {
    parent: StreamHandle,
    buffer: BytesMut,
    state: State,
    max_buffer_size: usize,
    terminated: bool,
    unterminated: bool,
}

impl DotStream {
    #[must_use]
    pub fn new(parent: StreamHandle) -> Self {
        let max_buffer_size = parent.borrow().max_buffer_size();

        Self {
            parent,
            buffer: BytesMut::new(),
            state: State::LineStart,
            max_buffer_size,
            terminated: false,
            unterminated: false,
        }
    }

    /// Feed one byte through the unstuffer. Returns `true` once the terminating line is complete.
    fn unstuff(&mut self, byte: u8) -> bool {
        self.state = match (self.state, byte) {
            (State::LineStart, b'.') => State::Dot,
            (State::Dot, b'\r') => State::DotCr,
            (State::Dot | State::DotCr, b'\n') => return true,
            (State::DotCr, _) => {
                // A lone `CR` after the dot, which is just text.
                self.buffer.extend_from_slice(b"\r");
                self.state = State::Text;

                return self.unstuff(byte);
            }
            (_, b'\r') => {
                self.buffer.extend_from_slice(&[byte]);
                State::Cr
            }
            (_, b'\n') => {
                self.buffer.extend_from_slice(&[byte]);
                State::LineStart
            }
            (_, _) => {
                self.buffer.extend_from_slice(&[byte]);
                State::Text
            }
        };

        false
    }
}

impl InputStream for DotStream {
    fn read(&mut self) -> Result<ReadStatus, StreamError> {
        if self.unterminated {
            return Err(StreamError::Unterminated);
        }
        if self.terminated {
            return Ok(ReadStatus::Eof);
        }

        // One byte of input produces at most two bytes of output.
        if self.buffer.len() + 2 > self.max_buffer_size {
            return Ok(ReadStatus::BufferFull);
        }

        let parent = Rc::clone(&self.parent);
        let mut parent = parent.borrow_mut();
        let before = self.buffer.len();

        loop {
            if parent.data().is_empty() {
                match parent.read()? {
                    ReadStatus::Data => (),
                    ReadStatus::Eof => {
                        self.unterminated = true;
                        return Err(StreamError::Unterminated);
                    }
                    status @ (ReadStatus::WouldBlock | ReadStatus::BufferFull) => {
                        return Ok(status);
                    }
                }
            }

            let mut consumed = 0;
            for &byte in parent.data() {
                if self.buffer.len() + 2 > self.max_buffer_size {
                    break;
                }

                consumed += 1;
                if self.unstuff(byte) {
                    self.terminated = true;
                    break;
                }
            }
            parent.skip(consumed);

            if self.buffer.len() > before {
                return Ok(ReadStatus::Data);
            }
            if self.terminated {
                return Ok(ReadStatus::Eof);
            }
        }
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
        self.terminated || self.unterminated
    }
}
