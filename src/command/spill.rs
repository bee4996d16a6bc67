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

use bytes::BytesMut;

/// The smallest allocation a [`SpillBuffer`] makes, unless its ceiling is lower.
pub const SPILL_FLOOR: usize = 2048;

/// Holds the front of a parameter token once it no longer fits in the input stream's buffer.
#[derive(Debug)]
pub struct SpillBuffer {
    bytes: BytesMut,
    ceiling: usize,
}

/// Appending would have taken a [`SpillBuffer`] past its ceiling.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct CeilingExceeded;

impl SpillBuffer {
    /// Construct a [`Self`] for an input stream that buffers `max_input` bytes and a token that
    /// may be at most `ceiling` bytes long.
    pub fn new(max_input: usize, ceiling: usize) -> Self {
        let capacity = max_input.saturating_mul(2).max(SPILL_FLOOR).min(ceiling);

        Self {
            bytes: BytesMut::with_capacity(capacity),
            ceiling,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Append `bytes`, doubling the allocation if needed.
    ///
    /// Checks the ceiling before anything is copied or allocated.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), CeilingExceeded> {
        let needed = self.bytes.len() + bytes.len();
        if needed > self.ceiling {
            return Err(CeilingExceeded);
        }

        if needed > self.bytes.capacity() {
            let capacity = self
                .bytes
                .capacity()
                .saturating_mul(2)
                .max(needed)
                .max(SPILL_FLOOR)
                .min(self.ceiling);
            self.bytes.reserve(capacity - self.bytes.len());
        }

        self.bytes.extend_from_slice(bytes);

        Ok(())
    }

    pub fn into_inner(self) -> BytesMut {
        self.bytes
    }
}
