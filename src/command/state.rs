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

//! The line tokenizer.
//!
//! [RFC 5321 section 4.1.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1):
//!
//! > SMTP commands are character strings terminated by \<CRLF\>. The commands themselves are
//! > alphabetic characters terminated by \<SP\> if parameters follow and \<CRLF\> otherwise. (In
//! > the interest of improved interoperability, SMTP receivers SHOULD tolerate trailing white
//! > space before the terminating \<CRLF\>.)

use ascii::{AsAsciiStr, AsciiString};
use bytes::BytesMut;
use tracing::trace;

use super::{CommandParser, ParseError, MAX_COMMAND_NAME_LENGTH};
use crate::str::sanitize;

/// Where in a line the tokenizer is.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub(super) enum Phase {
    /// Between lines.
    #[default]
    Init,
    /// Inside the command name.
    CommandName,
    /// After the command name, expecting a space or the line ending.
    Separator,
    /// Inside the parameters, or inside an `AUTH` response.
    Parameters,
    /// Expecting `CR`, or a bare `LF`.
    Cr,
    /// Expecting the `LF` after `CR`.
    Lf,
    /// Discarding the rest of a malformed line.
    Error,
}

/// Everything the tokenizer needs to resume a line where the last chunk of input ended.
#[derive(Debug, Default)]
pub(super) struct State {
    pub phase: Phase,
    pub name: Option<AsciiString>,
    pub parameters: Option<BytesMut>,
    /// How far scanning got past the first unconsumed byte of input.
    pub offset: usize,
}

/// Whether [`CommandParser::parse_line`] finished a line.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub(super) enum Progress {
    Pending,
    Line,
}

/// A chunk of input and how much of it has been consumed.
pub(super) struct Scan<'a> {
    pub chunk: &'a [u8],
    pub cur: usize,
}

impl<'a> Scan<'a> {
    pub const fn new(chunk: &'a [u8]) -> Self {
        Self { chunk, cur: 0 }
    }

    /// The unconsumed part of the chunk.
    pub fn rest(&self) -> &'a [u8] {
        &self.chunk[self.cur..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.chunk.get(self.cur).copied()
    }
}

impl CommandParser {
    /// Forget the line in progress.
    pub(super) fn restart(&mut self) {
        self.spill = None;
        self.state = State::default();
    }

    /// What the current line is, for error messages.
    pub(super) const fn line_description(&self) -> &'static str {
        if self.auth_response {
            "AUTH response"
        } else {
            "command"
        }
    }

    /// Advance through `scan` until a line is complete or the chunk runs out.
    ///
    /// Consumed bytes are counted in `scan.cur`, including when an error is returned.
    pub(super) fn parse_line(
        &mut self,
        scan: &mut Scan<'_>,
        max_input: usize,
    ) -> Result<Progress, ParseError> {
        loop {
            match self.state.phase {
                Phase::Init => {
                    self.restart();
                    if scan.peek().is_none() {
                        return Ok(Progress::Pending);
                    }

                    self.state.phase = if self.auth_response {
                        // Bare parameters, with no name and no separator.
                        Phase::Parameters
                    } else {
                        Phase::CommandName
                    };
                }
                Phase::CommandName => {
                    if !self.parse_command_name(scan)? {
                        return Ok(Progress::Pending);
                    }
                    self.state.phase = Phase::Separator;
                }
                Phase::Separator => {
                    let Some(byte) = scan.peek() else {
                        return Ok(Progress::Pending);
                    };

                    self.state.phase = match byte {
                        b'\r' => Phase::Cr,
                        b'\n' => Phase::Lf,
                        b' ' => {
                            scan.cur += 1;
                            Phase::Parameters
                        }
                        _ => {
                            return Err(ParseError::bad_command(format!(
                                "Unexpected character {} in command name",
                                sanitize(byte)
                            )))
                        }
                    };
                }
                Phase::Parameters => {
                    if !self.parse_parameters(scan, max_input)? {
                        return Ok(Progress::Pending);
                    }
                    self.state.phase = Phase::Cr;
                }
                Phase::Cr => {
                    let Some(byte) = scan.peek() else {
                        return Ok(Progress::Pending);
                    };

                    match byte {
                        b'\r' => scan.cur += 1,
                        // Tolerated, and checked again by [`Phase::Lf`].
                        b'\n' => (),
                        _ => {
                            return Err(ParseError::bad_command(format!(
                                "Unexpected character {} in {}",
                                sanitize(byte),
                                if self.auth_response {
                                    "AUTH response"
                                } else {
                                    "command parameters"
                                }
                            )))
                        }
                    }
                    self.state.phase = Phase::Lf;
                }
                Phase::Lf => {
                    let Some(byte) = scan.peek() else {
                        return Ok(Progress::Pending);
                    };

                    if byte != b'\n' {
                        return Err(ParseError::bad_command(format!(
                            "Expected LF after CR at end of {}, but found {}",
                            self.line_description(),
                            sanitize(byte)
                        )));
                    }

                    scan.cur += 1;
                    self.state.phase = Phase::Init;

                    return Ok(Progress::Line);
                }
                Phase::Error => {
                    // Skip until the end of the line.
                    if let Some(index) = scan.rest().iter().position(|&byte| byte == b'\n') {
                        scan.cur += index + 1;
                        trace!("skipped the rest of a malformed line");
                        self.state.phase = Phase::Init;
                    } else {
                        scan.cur = scan.chunk.len();
                        return Ok(Progress::Pending);
                    }
                }
            }
        }
    }

    /// Scan the alphabetic command name.
    ///
    /// Returns `Ok(false)` if the chunk ends before the name does.
    fn parse_command_name(&mut self, scan: &mut Scan<'_>) -> Result<bool, ParseError> {
        let rest = scan.rest();

        let mut end = self.state.offset;
        while end < rest.len() && rest[end].is_ascii_alphabetic() {
            end += 1;
        }

        if end > MAX_COMMAND_NAME_LENGTH {
            return Err(ParseError::bad_command("Command name is too long"));
        }

        self.state.offset = end;
        if end == rest.len() {
            return Ok(false);
        }

        let name = rest[..end]
            .as_ascii_str()
            .map_err(|_| ParseError::bad_command("Command name is not ASCII"))?;
        self.state.name = Some(name.to_ascii_string());
        scan.cur += end;
        self.state.offset = 0;

        Ok(true)
    }
}
