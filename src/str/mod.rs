// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright © 2024 RemasteredArch
// Copyright © 2024 Jaxydog
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

//! Character classes and string helpers for SMTP.

use std::borrow::Cow;

pub(crate) mod max_lengths;

pub const CRLF: &str = "\r\n";

/// Whether `byte` may appear in the parameters of a command.
///
/// [RFC 5321 section 4.1.2](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.2):
///
/// ```text
/// textstring = 1*(%d09 / %d32-126) ; HT, SP, Printable US-ASCII
/// ```
#[must_use]
pub const fn is_textstr(byte: u8) -> bool {
    matches!(byte, b'\t' | 0x20..=0x7E)
}

/// Whether `byte` is white space, which SMTP receivers should tolerate before the line ending.
///
/// [RFC 5321 section 4.1.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1).
#[must_use]
pub const fn is_wsp(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t')
}

/// Describe a single byte for use in an error message.
///
/// Printable ASCII is quoted, line endings are spelled out, and anything else is shown in hex.
///
/// # Examples
///
/// ```rust
/// # use smtp_command_parser::str::sanitize;
/// assert_eq!(sanitize(b'x'), "'x'");
/// assert_eq!(sanitize(b'\r'), "<CR>");
/// assert_eq!(sanitize(0x01), "<0x01>");
/// ```
#[must_use]
pub fn sanitize(byte: u8) -> Cow<'static, str> {
    match byte {
        b'\r' => Cow::Borrowed("<CR>"),
        b'\n' => Cow::Borrowed("<LF>"),
        0x20..=0x7E => Cow::Owned(format!("'{}'", char::from(byte))),
        _ => Cow::Owned(format!("<0x{byte:02x}>")),
    }
}

/// The result of looking at the start of a possibly incomplete UTF-8 sequence.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub(crate) enum Utf8Char {
    /// A complete, valid character of this many bytes.
    Complete(usize),
    /// A valid prefix of a character; more bytes are needed.
    Incomplete,
    /// Not valid UTF-8, no matter what follows.
    Invalid,
}

/// The length of the sequence a UTF-8 lead byte introduces.
///
/// Bytes that cannot start a sequence count as one byte.
pub(crate) const fn sequence_len(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

/// Decode the width of the first character in `bytes`.
pub(crate) fn decode_char(bytes: &[u8]) -> Utf8Char {
    let Some(&lead) = bytes.first() else {
        return Utf8Char::Incomplete;
    };

    if lead.is_ascii() {
        return Utf8Char::Complete(1);
    }
    if !matches!(lead, 0xC2..=0xF4) {
        return Utf8Char::Invalid;
    }

    let width = self::sequence_len(lead);
    let available = &bytes[..bytes.len().min(width)];

    // Leaves overlong encodings and surrogates to the standard library.
    match std::str::from_utf8(available) {
        Ok(_) => Utf8Char::Complete(width),
        Err(error) if error.error_len().is_none() => Utf8Char::Incomplete,
        Err(_) => Utf8Char::Invalid,
    }
}
