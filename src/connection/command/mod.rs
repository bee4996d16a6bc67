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


//! Handles responding to a command from an SMTP client.
//!
//! See [`handle`].

mod commands;
#[cfg(test)]
mod test;

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use super::{Session, ShouldClose};
use crate::{command::Command, str::max_lengths};

/// Reply to a command from the client in an SMTP session.
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub(super) async fn handle<R, W>(
    session: &mut Session<R, W>,
    command: Command,
) -> io::Result<ShouldClose>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Command names are case-insensitive, parameters are not.
    //
    // https://www.rfc-editor.org/rfc/rfc5321.html#section-2.4
    let verb = command.name.as_str().to_ascii_uppercase();
    let parameters = command.parameters.as_str();
    trace!(verb, parameters, "handling command");

    match verb.as_str() {
        "" => commands::empty(session).await,
        "HELO" => commands::hello(session, parameters).await,
        "EHLO" => commands::extended_hello(session, parameters).await,
        "MAIL" => commands::mail(session, parameters).await,
        "RCPT" => commands::recipient(session, parameters).await,
        "DATA" => commands::data(session, parameters).await,
        "BDAT" => commands::binary_data(session, parameters).await,
        "AUTH" => commands::authenticate(session, parameters).await,
        "RSET" => commands::reset(session).await,
        "NOOP" => commands::noop(session).await,
        "QUIT" => commands::quit(session).await,
        "VRFY" | "EXPN" | "HELP" | "STARTTLS" | "TURN" => commands::not_implemented(session).await,
        _ => commands::unrecognized(session).await,
    }
}

/// Why the arguments of a command were rejected.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Error)]
enum ArgumentError {
    #[error("Expected {0}<address>")]
    MissingKeyword(&'static str),
    #[error("Address must be enclosed in <>")]
    MissingBrackets,
    #[error("Path too long")]
    PathTooLong,
    #[error("Local part too long")]
    LocalPartTooLong,
    #[error("Domain too long")]
    DomainTooLong,
    #[error("Invalid address")]
    InvalidAddress,
    #[error("Unsupported parameter")]
    UnsupportedParameter,
    #[error("Invalid SIZE parameter")]
    InvalidSize,
    #[error("Invalid BDAT parameters")]
    InvalidChunk,
}

impl ArgumentError {
    /// The reply code and enhanced status code to send for [`Self`].
    const fn code(self) -> &'static str {
        match self {
            Self::UnsupportedParameter => "555 5.5.4",
            Self::PathTooLong | Self::LocalPartTooLong | Self::DomainTooLong => "501 5.5.2",
            _ => "501 5.5.4",
        }
    }
}

/// Split `{keyword}<path> rest` into the mailbox of the path and whatever follows it.
///
/// `keyword` is matched case-insensitively. An empty mailbox is returned for the null path `<>`.
fn parse_path<'a>(
    argument: &'a str,
    keyword: &'static str,
) -> Result<(&'a str, &'a str), ArgumentError> {
    let rest = match (argument.get(..keyword.len()), argument.get(keyword.len()..)) {
        (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case(keyword) => rest.trim_start(),
        _ => return Err(ArgumentError::MissingKeyword(keyword)),
    };

    let (path, rest) = rest
        .strip_prefix('<')
        .and_then(|rest| rest.split_once('>'))
        .ok_or(ArgumentError::MissingBrackets)?;

    // Counting the brackets.
    if path.len() + 2 > max_lengths::PATH {
        return Err(ArgumentError::PathTooLong);
    }

    Ok((parse_mailbox(path)?, rest.trim_start()))
}

/// Check the mailbox of a path, dropping any source route.
///
/// [RFC 5321 appendix C](https://www.rfc-editor.org/rfc/rfc5321.html#appendix-C).
fn parse_mailbox(path: &str) -> Result<&str, ArgumentError> {
    let mailbox = match path.strip_prefix('@') {
        Some(route) => route
            .split_once(':')
            .map(|(_, mailbox)| mailbox)
            .ok_or(ArgumentError::InvalidAddress)?,
        None => path,
    };

    if mailbox.is_empty() || mailbox.eq_ignore_ascii_case("postmaster") {
        return Ok(mailbox);
    }

    let (local_part, domain) = mailbox
        .rsplit_once('@')
        .ok_or(ArgumentError::InvalidAddress)?;

    if local_part.is_empty()
        || domain.is_empty()
        || mailbox.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ArgumentError::InvalidAddress);
    }
    if local_part.len() > max_lengths::LOCAL_PART {
        return Err(ArgumentError::LocalPartTooLong);
    }
    if domain.len() > max_lengths::DOMAIN {
        return Err(ArgumentError::DomainTooLong);
    }

    Ok(mailbox)
}

/// The `MAIL` parameters the session understands.
#[derive(PartialEq, Eq, Debug, Default)]
struct MailParameters {
    /// The declared message size.
    ///
    /// [RFC 1870](https://www.rfc-editor.org/rfc/rfc1870.html).
    size: Option<u64>,
}

fn parse_mail_parameters(parameters: &str) -> Result<MailParameters, ArgumentError> {
    let mut parsed = MailParameters::default();

    for parameter in parameters.split_ascii_whitespace() {
        let (keyword, value) = parameter.split_once('=').unwrap_or((parameter, ""));

        if keyword.eq_ignore_ascii_case("SIZE") {
            let size = value.parse().map_err(|_| ArgumentError::InvalidSize)?;
            parsed.size = Some(size);
        } else if keyword.eq_ignore_ascii_case("BODY")
            && (value.eq_ignore_ascii_case("7BIT") || value.eq_ignore_ascii_case("8BITMIME"))
        {
            // Every body is passed through as-is.
        } else {
            return Err(ArgumentError::UnsupportedParameter);
        }
    }

    Ok(parsed)
}

/// Parse `BDAT` arguments: the chunk size, and whether this is the last chunk.
///
/// [RFC 3030 section 2](https://www.rfc-editor.org/rfc/rfc3030.html#section-2).
fn parse_chunk(parameters: &str) -> Result<(u64, bool), ArgumentError> {
    let mut words = parameters.split_ascii_whitespace();

    let size = words
        .next()
        .filter(|size| size.bytes().all(|byte| byte.is_ascii_digit()))
        .and_then(|size| size.parse().ok())
        .ok_or(ArgumentError::InvalidChunk)?;
    let last = match words.next() {
        None => false,
        Some(word) if word.eq_ignore_ascii_case("LAST") => true,
        Some(_) => return Err(ArgumentError::InvalidChunk),
    };

    if words.next().is_some() {
        return Err(ArgumentError::InvalidChunk);
    }

    Ok((size, last))
}
