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

//! Timeouts from [RFC 5321 section 4.5.3.2](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.2),
//! which defines how long participants in an SMTP session wait for one another, in minutes.
//!
//! [`SERVER_TIMEOUT`] bounds how long a session waits for client input. [`INITIAL_220_MESSAGE`]
//! is the client side of the greeting, used by the tests that play the client.
//!
//! When testing, every timeout is overridden to [`EXPECTED`].

/// A very strict timeout for how long participants should wait for anything.
///
/// Not specified by RFC 5321. Anything slower than this in a test is a bug.
pub const EXPECTED: std::time::Duration = std::time::Duration::from_secs(3);

/// Generate `const` items with [`std::time::Duration`] values in minutes, optionally including
/// documentation comments.
///
/// A "minute" is 60 of whatever [`std::time::Duration`] considers to be a "second."
macro_rules! minute_durations {
        [$(
            $( #[$attr:meta] )*
            $label:ident = $minutes:expr
        ),+ ,] => {
            $(
                $( #[$attr] )*
                #[cfg(not(test))]
                pub const $label: ::std::time::Duration =
                    ::std::time::Duration::from_secs($minutes * 60);

                $( #[$attr] )*
                #[cfg(test)]
                pub const $label: ::std::time::Duration =
                    $crate::timeouts::EXPECTED;
            )+
        };
    }

minute_durations![
    /// How long a client should wait after the connection is accepted for the `220` greeting.
    ///
    /// [RFC 5321 § 4.5.3.2.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.2.1).
    INITIAL_220_MESSAGE = 2,
    /// How long a server should wait for the next command, or the next chunk of a payload, before
    /// closing the session.
    ///
    /// [RFC 5321 § 4.5.3.2.7](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.2.7).
    SERVER_TIMEOUT = 5,
];
