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

//! Handles TCP connections as SMTP sessions.
//!
//! See [`handle`] and [`Session`].

mod command;
#[cfg(test)]
mod test;
mod transaction;

use std::{cell::RefCell, io, rc::Rc};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc::UnboundedSender,
    time::error::Elapsed,
};
use tracing::{debug, info, warn};

pub use transaction::Message;
use transaction::Transaction;

use crate::{
    command::{CommandParser, ParseError, ParseErrorKind},
    config::ServerConfig,
    stream::{self, BufferedInput, ReadStatus, StreamHandle},
    write_fmt_line,
};

/// Handle a TCP connection as an SMTP session.
///
/// # Errors
///
/// This function will return [`std::io::Error`] from [`TcpStream::local_addr`] and
/// [`TcpStream::peer_addr`], and from writing replies. See [`Session::run`].
pub async fn handle(
    stream: TcpStream,
    config: Rc<ServerConfig>,
    sender: Option<UnboundedSender<Message>>,
) -> io::Result<CloseReason> {
    let local_socket = stream.local_addr()?;
    let client_socket = stream.peer_addr()?;
    info!(%local_socket, %client_socket, "connection opened");

    let (reader, writer) = stream.into_split();
    let close_reason = Session::new(reader, writer, config, sender).run().await?;

    info!(%local_socket, %client_socket, ?close_reason, "connection closed");
    Ok(close_reason)
}

/// One SMTP session over a reader and a writer.
///
/// Everything read from `reader` goes through a [`CommandParser`], which is pumped by
/// [`Self::run`]: whenever the parser needs more input, the session reads from the transport
/// (giving up after [`ServerConfig::idle_timeout`]) and tries again.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    config: Rc<ServerConfig>,
    input: Rc<RefCell<BufferedInput>>,
    parser: CommandParser,
    read_buffer: BytesMut,
    transaction: Transaction,
    authenticated: bool,
    sender: Option<UnboundedSender<Message>>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Construct a [`Self`]. Completed messages are sent to `sender`, if there is one.
    pub fn new(
        reader: R,
        writer: W,
        config: Rc<ServerConfig>,
        sender: Option<UnboundedSender<Message>>,
    ) -> Self {
        let input = Rc::new(RefCell::new(BufferedInput::with_max_buffer_size(
            config.input_buffer_size,
        )));
        let parser = CommandParser::new(Rc::clone(&input) as StreamHandle, config.limits);

        Self {
            reader,
            writer,
            read_buffer: BytesMut::with_capacity(config.input_buffer_size),
            config,
            input,
            parser,
            transaction: Transaction::default(),
            authenticated: false,
            sender,
        }
    }

    /// Greet the client, then handle commands until the session ends.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if a reply could not be written. Failures reading from the
    /// client end the session with a [`CloseReason`] instead.
    pub async fn run(mut self) -> io::Result<CloseReason> {
        write_fmt_line!(self.writer, "220 {} ESMTP ready", self.config.hostname)?;

        loop {
            let flow = match self.parser.parse_next_command() {
                Ok(Some(command)) => command::handle(&mut self, command).await?,
                Ok(None) => self.fill().await,
                Err(error) => self.reject(&error).await?,
            };

            if let ShouldClose::Close(reason) = flow {
                return Ok(reason);
            }
        }
    }

    /// Read once from the client into the parser's input.
    ///
    /// End of file and read errors are handed to the input, where the parser finds them.
    async fn fill(&mut self) -> ShouldClose {
        self.read_buffer.clear();
        self.read_buffer.reserve(self.config.input_buffer_size);

        let read = self.reader.read_buf(&mut self.read_buffer);
        let read = tokio::time::timeout(self.config.idle_timeout(), read).await;
        match read {
            Ok(Ok(0)) => self.input.borrow_mut().close(),
            Ok(Ok(_)) => self.input.borrow_mut().feed(&self.read_buffer),
            Ok(Err(error)) => {
                debug!(%error, "failed to read from client");
                self.input.borrow_mut().fail(&error);
            }
            Err(elapsed) => {
                let reply = format!("421 4.4.2 {} Timeout exceeded\r\n", self.config.hostname);
                self.farewell(&reply).await;

                return ShouldClose::Close(CloseReason::TimedOut(elapsed));
            }
        }

        ShouldClose::Keep
    }

    /// Send a last reply before closing. A failure is logged and otherwise ignored.
    async fn farewell(&mut self, reply: &str) {
        if let Err(error) = self.writer.write_all(reply.as_bytes()).await {
            debug!(%error, "failed to send final reply");
        }
    }

    /// Reply to a failed parse.
    async fn reject(&mut self, error: &ParseError) -> io::Result<ShouldClose> {
        if error.is_clean_close() {
            return Ok(ShouldClose::Close(CloseReason::ClosedByClient));
        }

        warn!(kind = %error.kind(), %error, "rejecting client input");

        Ok(match error.kind() {
            ParseErrorKind::BadCommand => {
                write_fmt_line!(self.writer, "500 5.5.2 {error}")?;
                ShouldClose::Keep
            }
            ParseErrorKind::LineTooLong => {
                write_fmt_line!(self.writer, "500 5.5.6 {error}")?;
                ShouldClose::Keep
            }
            // The rest of the payload is still on its way.
            ParseErrorKind::DataTooLarge => {
                write_fmt_line!(self.writer, "552 5.3.4 {error}")?;
                ShouldClose::Close(CloseReason::Error)
            }
            ParseErrorKind::BrokenCommand => {
                let reply = format!("421 4.4.0 {} {error}\r\n", self.config.hostname);
                self.farewell(&reply).await;

                ShouldClose::Close(CloseReason::ClosedByClient)
            }
            ParseErrorKind::BrokenStream => {
                let reply = format!("421 4.4.0 {} {error}\r\n", self.config.hostname);
                self.farewell(&reply).await;

                ShouldClose::Close(CloseReason::Error)
            }
        })
    }

    /// Read a payload handed out by the parser to its end.
    ///
    /// A payload that fails is reported by the next parse, so it only needs to be abandoned here.
    async fn read_payload(&mut self, data: &StreamHandle) -> Payload {
        let mut body = Vec::new();

        loop {
            let status = stream::read_into(&mut *data.borrow_mut(), &mut body);

            match status {
                Ok(ReadStatus::Data | ReadStatus::BufferFull) => (),
                Ok(ReadStatus::Eof) => return Payload::Complete(Bytes::from(body)),
                Ok(ReadStatus::WouldBlock) => {
                    if let ShouldClose::Close(reason) = self.fill().await {
                        return Payload::Closed(reason);
                    }
                }
                Err(error) => {
                    debug!(%error, received = body.len(), "payload failed");
                    return Payload::Failed;
                }
            }
        }
    }

    /// Read one `AUTH` continuation line.
    ///
    /// On a parse failure, the client is sent its error reply and [`Err`] holds what the session
    /// should do next.
    async fn read_auth_response(&mut self) -> io::Result<Result<Bytes, ShouldClose>> {
        loop {
            match self.parser.parse_auth_response() {
                Ok(Some(response)) => return Ok(Ok(response)),
                Ok(None) => {
                    if let close @ ShouldClose::Close(_) = self.fill().await {
                        return Ok(Err(close));
                    }
                }
                Err(error) => return self.reject(&error).await.map(Err),
            }
        }
    }
}

/// The outcome of [`Session::read_payload`].
enum Payload {
    Complete(Bytes),
    /// The parser will report why.
    Failed,
    Closed(CloseReason),
}

/// Indicates if and why a TCP connection should be closed.
#[derive(PartialEq, Eq, Debug)]
enum ShouldClose {
    /// The TCP connection should be kept open.
    Keep,
    /// The TCP connection should be closed because [`CloseReason`].
    Close(CloseReason),
}

/// Indicates why a TCP connection was closed.
#[derive(PartialEq, Eq, Debug)]
pub enum CloseReason {
    /// The SMTP client requested to quit the session.
    Quit,
    /// The session could not continue, such as after a broken payload or a failed read.
    Error,
    /// More time [`Elapsed`] than [`ServerConfig::idle_timeout`] allows.
    TimedOut(Elapsed),
    /// The client closed the connection without quitting.
    ClosedByClient,
}
