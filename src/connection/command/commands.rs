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


//! Handles responding to particular commands from SMTP clients.

use std::io::Result;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::{
    super::{transaction::MAX_RECIPIENTS, CloseReason, Message, Payload, Session, ShouldClose},
    parse_chunk, parse_mail_parameters, parse_path, ArgumentError,
};
use crate::{write_fmt_line, write_line};

/// Send a reply into the session's writer and return with [`ShouldClose::Keep`].
///
/// # Errors
///
/// - Any errors that could come out of the writer's `write_all` function.
macro_rules! reply_and_keep {
    ( $session:expr, $($reply:tt)* ) => {{
        $crate::write_fmt_line!($session.writer, $($reply)*)?;
        return Ok(ShouldClose::Keep);
    }};
}

/// Send the reply for an [`ArgumentError`] and return with [`ShouldClose::Keep`].
macro_rules! reject_arguments {
    ( $session:expr, $error:expr ) => {{
        let error: ArgumentError = $error;
        reply_and_keep!($session, "{} {error}", error.code());
    }};
}

/// Reply to a line with no command name at all.
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn empty<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    write_line!(session.writer, "500 5.5.2 Invalid command syntax")?;

    Ok(ShouldClose::Keep)
}

/// Reply to an unrecognized command from a client.
///
/// See [`not_implemented`] for commands that are recognized, but not implemented. See [RFC 5321
/// section 4.2.4](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.2.4) for more details.
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn unrecognized<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    write_line!(session.writer, "500 5.5.1 Unknown command")?;

    Ok(ShouldClose::Keep)
}

/// Reply to a command from the client that is recognized but not implemented.
///
/// [RFC 5321 section 4.2.4](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.2.4).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn not_implemented<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    write_line!(session.writer, "502 5.5.1 Command not implemented")?;

    Ok(ShouldClose::Keep)
}

/// Reply to the hello (`HELO`) command from a client.
///
/// [RFC 5321 section 4.1.1.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.1).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn hello<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    domain: &str,
) -> Result<ShouldClose> {
    if domain.is_empty() {
        reply_and_keep!(session, "501 5.5.4 Missing domain");
    }

    session.transaction.greet(domain.to_string());
    write_fmt_line!(session.writer, "250 {}", session.config.hostname)?;

    Ok(ShouldClose::Keep)
}

/// Reply to the extended hello (`EHLO`) command from a client, listing the supported extensions.
///
/// [RFC 5321 section 4.1.1.1](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.1).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn extended_hello<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    domain: &str,
) -> Result<ShouldClose> {
    if domain.is_empty() {
        reply_and_keep!(session, "501 5.5.4 Missing domain");
    }

    session.transaction.greet(domain.to_string());

    let limits = session.parser.limits();
    // RFC 1870 section 4: a bare `SIZE` announces no fixed maximum.
    let size = if limits.is_data_size_bounded() {
        format!("SIZE {}", limits.max_data_size)
    } else {
        "SIZE".to_string()
    };

    write_fmt_line!(
        session.writer,
        "250-{}\r\n250-PIPELINING\r\n250-8BITMIME\r\n250-CHUNKING\r\n250-{size}\r\n250 AUTH PLAIN",
        session.config.hostname
    )?;

    Ok(ShouldClose::Keep)
}

/// Reply to the mail (`MAIL`) command from a client, starting a mail transaction.
///
/// [RFC 5321 section 4.1.1.2](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.2).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn mail<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    argument: &str,
) -> Result<ShouldClose> {
    if session.transaction.helo.is_none() {
        reply_and_keep!(session, "503 5.5.1 Send HELO or EHLO first");
    }
    if session.transaction.from.is_some() {
        reply_and_keep!(session, "503 5.5.1 Sender already specified");
    }

    let (from, rest) = match parse_path(argument, "FROM:") {
        Ok(path) => path,
        Err(error) => reject_arguments!(session, error),
    };
    let parameters = match parse_mail_parameters(rest) {
        Ok(parameters) => parameters,
        Err(error) => reject_arguments!(session, error),
    };

    let limits = session.parser.limits();
    if limits.is_data_size_bounded()
        && parameters
            .size
            .is_some_and(|size| size > limits.max_data_size)
    {
        reply_and_keep!(
            session,
            "552 5.3.4 Message size exceeds fixed maximum message size"
        );
    }

    session.transaction.from = Some(from.to_string());
    write_line!(session.writer, "250 2.1.0 Ok")?;

    Ok(ShouldClose::Keep)
}

/// Reply to the recipient (`RCPT`) command from a client.
///
/// [RFC 5321 section 4.1.1.3](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.3).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn recipient<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    argument: &str,
) -> Result<ShouldClose> {
    if session.transaction.from.is_none() {
        reply_and_keep!(session, "503 5.5.1 Need MAIL command first");
    }
    if session.transaction.recipients.len() >= MAX_RECIPIENTS {
        reply_and_keep!(session, "452 4.5.3 Too many recipients");
    }

    let to = match parse_path(argument, "TO:") {
        Ok(("", _)) => reject_arguments!(session, ArgumentError::InvalidAddress),
        Ok((_, rest)) if !rest.is_empty() => {
            reject_arguments!(session, ArgumentError::UnsupportedParameter)
        }
        Ok((to, _)) => to,
        Err(error) => reject_arguments!(session, error),
    };

    session.transaction.recipients.push(to.to_string());
    write_line!(session.writer, "250 2.1.5 Ok")?;

    Ok(ShouldClose::Keep)
}

/// Reply to the data (`DATA`) command from a client, then read the message that follows.
///
/// [RFC 5321 section 4.1.1.4](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.4).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn data<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    parameters: &str,
) -> Result<ShouldClose> {
    if !parameters.is_empty() {
        reply_and_keep!(session, "501 5.5.4 DATA takes no parameters");
    }
    if session.transaction.chunks.is_some() {
        reply_and_keep!(session, "503 5.5.1 DATA cannot follow BDAT");
    }
    if session.transaction.from.is_none() {
        reply_and_keep!(session, "503 5.5.1 Need MAIL command first");
    }
    if session.transaction.recipients.is_empty() {
        reply_and_keep!(session, "554 5.5.1 No valid recipients");
    }

    write_line!(session.writer, "354 End data with <CR><LF>.<CR><LF>")?;

    let data = session.parser.request_payload_dot_terminated();
    let body = match session.read_payload(&data).await {
        Payload::Complete(body) => body,
        Payload::Failed => return Ok(ShouldClose::Keep),
        Payload::Closed(reason) => return Ok(ShouldClose::Close(reason)),
    };

    match session.transaction.finish(body) {
        Some(message) => deliver(session, message).await,
        None => reply_and_keep!(session, "554 5.5.1 No valid recipients"),
    }
}

/// Reply to the binary data (`BDAT`) command from a client, after reading the chunk it announces.
///
/// [RFC 3030 section 2](https://www.rfc-editor.org/rfc/rfc3030.html#section-2).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn binary_data<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    parameters: &str,
) -> Result<ShouldClose> {
    let (size, last) = match parse_chunk(parameters) {
        Ok(chunk) => chunk,
        Err(error) => reject_arguments!(session, error),
    };

    // The chunk follows whether or not it is wanted.
    let data = session.parser.request_payload(size);
    let chunk = match session.read_payload(&data).await {
        Payload::Complete(chunk) => chunk,
        Payload::Failed => return Ok(ShouldClose::Keep),
        Payload::Closed(reason) => return Ok(ShouldClose::Close(reason)),
    };

    if session.transaction.from.is_none() {
        reply_and_keep!(session, "503 5.5.1 Need MAIL command first");
    }
    if session.transaction.recipients.is_empty() {
        reply_and_keep!(session, "554 5.5.1 No valid recipients");
    }

    let total = session.transaction.push_chunk(&chunk);
    let limits = session.parser.limits();
    if limits.is_data_size_bounded()
        && u64::try_from(total).unwrap_or(u64::MAX) > limits.max_data_size
    {
        session.transaction.reset();
        reply_and_keep!(
            session,
            "552 5.3.4 Message size exceeds fixed maximum message size"
        );
    }

    if !last {
        reply_and_keep!(session, "250 2.0.0 {size} octets received");
    }

    match session.transaction.finish_chunks() {
        Some(message) => deliver(session, message).await,
        None => reply_and_keep!(session, "554 5.5.1 No valid recipients"),
    }
}

/// Hand an accepted message to the session's receiver, and tell the client.
async fn deliver<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    message: Message,
) -> Result<ShouldClose> {
    info!(
        from = message.from.as_str(),
        recipients = message.recipients.len(),
        size = message.data.len(),
        "message accepted"
    );

    if let Some(sender) = &session.sender {
        if sender.send(message).is_err() {
            warn!("message receiver is gone, dropping message");
        }
    }

    write_line!(session.writer, "250 2.0.0 Message accepted")?;

    Ok(ShouldClose::Keep)
}

/// Reply to the authenticate (`AUTH`) command from a client.
///
/// Only the `PLAIN` mechanism is offered, and any well-formed credentials are accepted.
///
/// [RFC 4954 section 4](https://www.rfc-editor.org/rfc/rfc4954.html#section-4).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn authenticate<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
    parameters: &str,
) -> Result<ShouldClose> {
    let (mechanism, initial_response) = match parameters.split_once(' ') {
        Some((mechanism, initial_response)) => (mechanism, Some(initial_response)),
        None => (parameters, None),
    };

    if session.transaction.helo.is_none() {
        reply_and_keep!(session, "503 5.5.1 Send EHLO first");
    }
    if session.authenticated {
        reply_and_keep!(session, "503 5.5.1 Already authenticated");
    }
    if session.transaction.from.is_some() {
        reply_and_keep!(session, "503 5.5.1 Mail transaction in progress");
    }
    if !mechanism.eq_ignore_ascii_case("PLAIN") {
        reply_and_keep!(session, "504 5.5.4 Unrecognized authentication type");
    }

    let response = match initial_response {
        Some(initial_response) => Bytes::copy_from_slice(initial_response.as_bytes()),
        None => {
            write_line!(session.writer, "334 ")?;

            match session.read_auth_response().await? {
                Ok(response) => response,
                Err(flow) => return Ok(flow),
            }
        }
    };

    if response.as_ref() == b"*" {
        reply_and_keep!(session, "501 5.0.0 Authentication cancelled");
    }
    if !is_base64(&response) {
        reply_and_keep!(session, "501 5.5.2 Invalid base64 data");
    }

    debug!(bytes = response.len(), "accepting credentials");
    session.authenticated = true;
    write_line!(session.writer, "235 2.7.0 Authentication successful")?;

    Ok(ShouldClose::Keep)
}

fn is_base64(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'/' | b'='))
}

/// Reply to the reset (`RSET`) command from a client, aborting the mail transaction.
///
/// [RFC 5321 section 4.1.1.5](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.5).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn reset<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    session.transaction.reset();
    write_line!(session.writer, "250 2.0.0 Ok")?;

    Ok(ShouldClose::Keep)
}

/// [RFC 5321 section 4.1.1.9](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.9).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn noop<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    write_line!(session.writer, "250 2.0.0 Ok")?;

    Ok(ShouldClose::Keep)
}

/// Reply to the quit (`QUIT`) command from a client.
///
/// [RFC 5321 section 4.1.1.10](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.1.1.10).
///
/// # Errors
///
/// [`std::io::Error`] from writing the reply.
pub async fn quit<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    session: &mut Session<R, W>,
) -> Result<ShouldClose> {
    write_line!(session.writer, "221 2.0.0 Bye")?;

    Ok(ShouldClose::Close(CloseReason::Quit))
}
