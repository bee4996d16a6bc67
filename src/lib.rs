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


//! An incremental SMTP command parser, and the session layer that drives it over TCP.
//!
//! [`command::CommandParser`] turns bytes from an [`stream::InputStream`] into command lines,
//! `AUTH` responses, and `DATA`/`BDAT` payloads, one non-blocking step at a time.
//! [`connection::Session`] feeds it from a socket and answers the client.

#![warn(clippy::nursery, clippy::pedantic)]
#![cfg_attr(debug_assertions, allow(clippy::missing_errors_doc))]

use std::{io, rc::Rc};

use async_stream::stream;
use futures_core::Stream;
use tokio::{net::TcpListener, sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{debug, warn};

pub mod command;
pub mod config;
pub mod connection;
pub mod str;
pub mod stream;
pub mod timeouts;

#[cfg(test)]
mod test;

use config::ServerConfig;
use connection::{CloseReason, Message};

/// Write a string literal and `CRLF` into `$stream`. Implicitly calls `.await`.
macro_rules! write_line {
    ( $stream:expr, $line:literal ) => {
        ::tokio::io::AsyncWriteExt::write_all(&mut $stream, concat!($line, "\r\n").as_bytes())
            .await
    };
}
pub(crate) use write_line;

/// Format a line and `CRLF` into `$stream`. Implicitly calls `.await`.
macro_rules! write_fmt_line {
    ( $stream:expr, $($arg:tt)* ) => {
        ::tokio::io::AsyncWriteExt::write_all(
            &mut $stream,
            format!("{}{}", format_args!($($arg)*), $crate::str::CRLF).as_bytes(),
        )
        .await
    };
}
pub(crate) use write_fmt_line;

/// Read a line, `CRLF` included, from an [`tokio::io::AsyncBufRead`]. Evaluates to a future of
/// `io::Result<String>`.
#[cfg(test)]
macro_rules! read_line {
    ( $reader:expr ) => {
        async {
            let mut line = String::new();
            ::tokio::io::AsyncBufReadExt::read_line(&mut $reader, &mut line)
                .await
                .map(|_| line)
        }
    };
}
#[cfg(test)]
pub(crate) use read_line;

/// Accept connections from `listener`, handling each as an SMTP session.
///
/// Sessions are spawned with [`tokio::task::spawn_local`], so the stream must be polled from
/// within a [`tokio::task::LocalSet`]. Messages accepted by any session go to `sender`.
pub fn listen(
    listener: TcpListener,
    config: Rc<ServerConfig>,
    sender: Option<UnboundedSender<Message>>,
) -> impl Stream<Item = io::Result<JoinHandle<io::Result<CloseReason>>>> {
    stream! {
        loop {
            match listener.accept().await {
                Ok((stream, client_socket)) => {
                    debug!(%client_socket, "accepted connection");

                    let session = connection::handle(stream, Rc::clone(&config), sender.clone());
                    yield Ok(tokio::task::spawn_local(session));
                }
                Err(error) => {
                    warn!(%error, "failed to accept connection");
                    yield Err(error);
                }
            }
        }
    }
}
