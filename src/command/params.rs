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
use tracing::trace;

use super::{
    spill::{CeilingExceeded, SpillBuffer},
    state::Scan,
    CommandParser, ParseError, ParseErrorKind,
};
use crate::str::{decode_char, is_textstr, is_wsp, sequence_len, Utf8Char};

impl CommandParser {
    fn line_too_long(&self) -> ParseError {
        ParseError::new(
            ParseErrorKind::LineTooLong,
            if self.auth_response {
                "AUTH response line is too long"
            } else {
                "Command line is too long"
            },
        )
    }

    /// Scan the parameters of a command, or an entire `AUTH` response.
    ///
    /// Returns `Ok(false)` if the chunk ends before the parameters do. The bytes scanned so far
    /// stay in the input stream, unless keeping them there would fill its buffer, in which case
    /// they are moved to the spill buffer.
    pub(super) fn parse_parameters(
        &mut self,
        scan: &mut Scan<'_>,
        max_input: usize,
    ) -> Result<bool, ParseError> {
        let max_size = if self.auth_response {
            self.limits.max_auth_size
        } else {
            self.limits.max_parameters_size
        };
        let buffered = self.spill.as_ref().map_or(0, SpillBuffer::len);
        let rest = scan.rest();

        let mut end = self.state.offset;
        let mut terminated = false;
        while end < rest.len() {
            let width = if self.auth_response {
                if matches!(rest[end], b'\r' | b'\n') {
                    terminated = true;
                    break;
                }
                1
            } else {
                match decode_char(&rest[end..]) {
                    Utf8Char::Complete(1) if !is_textstr(rest[end]) => {
                        terminated = true;
                        break;
                    }
                    Utf8Char::Complete(width) => width,
                    Utf8Char::Incomplete => break,
                    Utf8Char::Invalid => {
                        return Err(ParseError::bad_command(
                            "Invalid UTF-8 character in command parameters",
                        ))
                    }
                }
            };
            end += width;
        }

        if end > max_size.saturating_sub(buffered) {
            return Err(self.line_too_long());
        }

        if terminated {
            self.finish_parameters(&rest[..end])?;
            scan.cur += end;
            return Ok(true);
        }

        // One more character has to fit behind what is already buffered.
        let next = rest.get(end).copied().map_or(1, sequence_len);
        if end + next >= max_input {
            trace!(bytes = end, buffered, "spilling parameters");

            let spill = self
                .spill
                .get_or_insert_with(|| SpillBuffer::new(max_input, max_size));
            let appended = spill.append(&rest[..end]);
            appended.map_err(|CeilingExceeded| self.line_too_long())?;

            scan.cur += end;
            end = 0;
        }

        self.state.offset = end;

        Ok(false)
    }

    /// Assemble the token from the spill buffer and the final chunk, then trim it.
    fn finish_parameters(&mut self, tail: &[u8]) -> Result<(), ParseError> {
        let mut token = match self.spill.take() {
            Some(spill) => {
                let mut token = spill.into_inner();
                token.extend_from_slice(tail);
                token
            }
            None => BytesMut::from(tail),
        };

        let trimmed = token.iter().rposition(|&byte| !is_wsp(byte)).map_or(0, |i| i + 1);
        token.truncate(trimmed);

        if !self.auth_response && token.first() == Some(&b' ') {
            return Err(ParseError::bad_command("Duplicate space after command name"));
        }

        self.state.parameters = Some(token);
        self.state.offset = 0;

        Ok(())
    }
}
