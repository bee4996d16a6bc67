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

//! Incremental parsing of SMTP command lines.
//!
//! A [`CommandParser`] reads from a shared [`StreamHandle`] and never blocks: every parse either
//! produces a complete unit, reports that more input is needed, or fails with a [`ParseError`].
//! After a failure the parser discards the rest of the offending line by itself, so the caller
//! only has to reply to the peer and parse again.
//!
//! ```rust
//! # use smtp_command_parser::{command::{CommandParser, Limits}, stream::{self, BufferedInput}};
//! let input = stream::share(BufferedInput::from_bytes(b"MAIL FROM:<a@b.c>  \r\nQUIT\r\n"));
//! let mut parser = CommandParser::new(input, Limits::default());
//!
//! let mail = parser.parse_next_command()?.expect("a whole line was available");
//! assert_eq!(mail.name.as_str(), "MAIL");
//! assert_eq!(mail.parameters, "FROM:<a@b.c>");
//!
//! let quit = parser.parse_next_command()?.expect("a whole line was available");
//! assert_eq!(quit.name.as_str(), "QUIT");
//! assert!(parser.parse_next_command().is_err_and(|error| error.is_clean_close()));
//! # Ok::<(), smtp_command_parser::command::ParseError>(())
//! ```

use std::rc::Rc;

use ascii::AsciiString;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::stream::{ReadStatus, StreamHandle};

mod error;
mod limits;
mod params;
mod payload;
mod spill;
mod state;

pub use error::{ParseError, ParseErrorKind};
pub use limits::Limits;
use spill::SpillBuffer;
use state::{Phase, Progress, Scan, State};

/// The longest command name accepted, in bytes.
pub const MAX_COMMAND_NAME_LENGTH: usize = 32;

/// One parsed command line.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Command {
    /// The alphabetic command name, as sent. Empty for a line with no name at all.
    pub name: AsciiString,
    /// Everything after the separating space, with trailing white space removed.
    pub parameters: String,
}

/// Parses command lines, `AUTH` responses, and command payloads from a single input stream.
pub struct CommandParser {
    input: StreamHandle,
    limits: Limits,
    state: State,
    spill: Option<SpillBuffer>,
    /// The payload most recently handed out, until it has been read to its end.
    data: Option<StreamHandle>,
    error: Option<ParseError>,
    auth_response: bool,
}

impl CommandParser {
    /// Construct a [`Self`] reading from `input`.
    ///
    /// Ceilings of `0` in `limits` are replaced by their defaults.
    #[must_use]
    pub fn new(input: StreamHandle, limits: Limits) -> Self {
        Self {
            input,
            limits: limits.normalized(),
            state: State::default(),
            spill: None,
            data: None,
            error: None,
            auth_response: false,
        }
    }

    /// Read from `input` from now on, keeping the limits.
    ///
    /// Meant to be called between lines, such as after a TLS handshake.
    pub fn set_stream(&mut self, input: StreamHandle) {
        self.input = input;
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The error returned by the most recent parse, if it failed.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Parse the next command line.
    ///
    /// Returns `Ok(None)` if the input does not hold a complete line yet. Discards the rest of any
    /// payload that was handed out before.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for a malformed or oversized line, an oversized or broken payload,
    /// or a closed or broken input. See [`ParseError::is_clean_close`] for how a normal disconnect
    /// is reported.
    ///
    /// # Panics
    ///
    /// Panics if an `AUTH` response is half parsed.
    pub fn parse_next_command(&mut self) -> Result<Option<Command>, ParseError> {
        assert!(
            !self.auth_response || self.is_between_lines(),
            "parsed a command in the middle of an AUTH response"
        );
        self.auth_response = false;

        if !self.next_line()? {
            return Ok(None);
        }

        let name = self.state.name.take().unwrap_or_else(AsciiString::new);
        let parameters = match self.state.parameters.take() {
            // Validated character by character while scanning, and spilled only on boundaries.
            Some(parameters) => String::from_utf8_lossy(&parameters).into_owned(),
            None => String::new(),
        };

        trace!(%name, parameters = parameters.as_str(), "parsed command");

        Ok(Some(Command { name, parameters }))
    }

    /// Parse an `AUTH` continuation line: raw bytes, with no command name.
    ///
    /// Returns `Ok(None)` if the input does not hold a complete line yet.
    ///
    /// # Errors
    ///
    /// The same as [`Self::parse_next_command`], measured against
    /// [`Limits::max_auth_size`] instead.
    ///
    /// # Panics
    ///
    /// Panics if a command line is half parsed.
    pub fn parse_auth_response(&mut self) -> Result<Option<Bytes>, ParseError> {
        assert!(
            self.auth_response || self.is_between_lines(),
            "parsed an AUTH response in the middle of a command"
        );
        self.auth_response = true;

        if !self.next_line()? {
            return Ok(None);
        }

        let response = self.state.parameters.take().unwrap_or_default().freeze();
        trace!(bytes = response.len(), "parsed AUTH response");

        Ok(Some(response))
    }

    const fn is_between_lines(&self) -> bool {
        matches!(self.state.phase, Phase::Init | Phase::Error)
    }

    fn record(&mut self, error: ParseError) -> ParseError {
        debug!(kind = %error.kind(), message = error.message(), "parse failed");
        self.error = Some(error.clone());

        error
    }

    /// Finish the active payload, then try to complete a line.
    fn next_line(&mut self) -> Result<bool, ParseError> {
        self.error = None;

        match self.finish_payload() {
            Ok(true) => (),
            Ok(false) => return Ok(false),
            Err(error) => return Err(self.record(error)),
        }

        self.parse().map_err(|error| {
            // Skip to the next line on the following parse.
            self.spill = None;
            self.state.offset = 0;
            self.state.phase = Phase::Error;

            self.record(error)
        })
    }

    /// Feed the tokenizer from the input until a line is complete or the input runs dry.
    fn parse(&mut self) -> Result<bool, ParseError> {
        let input = Rc::clone(&self.input);
        let mut input = input.borrow_mut();
        let max_input = input.max_buffer_size();

        let mut read = input.data().is_empty();
        loop {
            if read {
                match input.read() {
                    Ok(ReadStatus::Data) => (),
                    Ok(ReadStatus::WouldBlock) => return Ok(false),
                    Ok(ReadStatus::BufferFull) => {
                        return Err(ParseError::new(
                            ParseErrorKind::BrokenStream,
                            "Input buffer is full",
                        ))
                    }
                    Ok(ReadStatus::Eof) => {
                        return Err(
                            if self.state.phase == Phase::Init && input.data().is_empty() {
                                ParseError::closed()
                            } else {
                                ParseError::new(
                                    ParseErrorKind::BrokenCommand,
                                    "Premature end of input",
                                )
                            },
                        )
                    }
                    Err(error) => {
                        return Err(ParseError::new(
                            ParseErrorKind::BrokenStream,
                            error.to_string(),
                        ))
                    }
                }
            }
            read = true;

            let mut scan = Scan::new(input.data());
            let progress = self.parse_line(&mut scan, max_input);
            let consumed = scan.cur;
            input.skip(consumed);

            if progress? == Progress::Line {
                return Ok(true);
            }
        }
    }
}
