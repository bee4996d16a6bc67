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

//! The maximum length, in number of 8-bit bytes, of the envelope items the session checks.
//!
//! These are the *minimum* values that SMTP servers must be able to handle, per [RFC 5321
//! section 4.5.3.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.1). The session
//! rejects anything longer.
//!
//! Command lines themselves are bounded by [`crate::command::Limits`] instead, which defaults to
//! well above the 512 bytes of section 4.5.3.1.4 to leave room for ESMTP parameters.

/// The maximum length of the local-part (such as the username of an email address) in bytes.
///
/// [RFC 5321 § 4.5.3.1.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.1.1).
pub const LOCAL_PART: usize = 64;

/// The maximum length of a domain name or number in bytes.
///
/// [RFC 5321 § 4.5.3.1.2](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.1.2).
pub const DOMAIN: usize = 255;

/// The maximum length of a reverse-path or forward-path (including punctuation and separators)
/// in bytes.
///
/// [RFC 5321 § 4.5.3.1.3](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.1.3).
pub const PATH: usize = 256;
