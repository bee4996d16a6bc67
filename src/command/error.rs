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

use std::fmt::Display;

use thiserror::Error;

/// The classes of failure [`super::CommandParser`] reports.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum ParseErrorKind {
    /// Malformed syntax: an invalid character, a duplicate separator, a missing or garbled line
    /// ending, invalid UTF-8, or a command name that is too long.
    BadCommand,
    /// The parameters or the `AUTH` response exceeded their ceiling.
    LineTooLong,
    /// A payload exceeded its ceiling.
    DataTooLarge,
    /// The input ended cleanly, but in the middle of a line.
    BrokenCommand,
    /// The input failed.
    BrokenStream,
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BadCommand => "bad command",
            Self::LineTooLong => "line too long",
            Self::DataTooLarge => "data too large",
            Self::BrokenCommand => "broken command",
            Self::BrokenStream => "broken stream",
        })
    }
}

/// A failed parse: its [`ParseErrorKind`] and a message fit for the remote peer.
#[derive(PartialEq, Eq, Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    kind: ParseErrorKind,
    message: String,
    clean_close: bool,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            clean_close: false,
        }
    }

    pub(crate) fn bad_command(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::BadCommand, message)
    }

    /// The input ended between two lines. Still [`ParseErrorKind::BrokenCommand`], but not a
    /// protocol violation.
    pub(crate) fn closed() -> Self {
        Self {
            clean_close: true,
            ..Self::new(ParseErrorKind::BrokenCommand, "Premature end of input")
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the input ended cleanly before the first byte of a new line.
    ///
    /// This is how a peer normally disconnects, so it calls for closing the session rather than
    /// for an error reply.
    #[must_use]
    pub const fn is_clean_close(&self) -> bool {
        self.clean_close
    }
}
