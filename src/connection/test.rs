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


//! Tests for [`super`].

use std::{io, rc::Rc};

use tokio::{
    io::{duplex, AsyncReadExt, AsyncWriteExt},
    sync::mpsc::unbounded_channel,
};

use super::*;
use crate::command::Limits;

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

pub(super) const GREETING: &str = "220 localhost ESMTP ready";

/// A whole session, as seen by the client.
pub(super) struct Transcript {
    pub output: String,
    pub close_reason: CloseReason,
    pub messages: Vec<Message>,
}

/// Run a session over `input`. The client closes its side once everything is sent.
pub(super) async fn transcript(config: ServerConfig, input: &[u8]) -> io::Result<Transcript> {
    let (mut client, server) = duplex(1 << 20);
    let (reader, writer) = tokio::io::split(server);
    let (sender, mut receiver) = unbounded_channel();

    client.write_all(input).await?;
    client.shutdown().await?;

    let close_reason = Session::new(reader, writer, Rc::new(config), Some(sender))
        .run()
        .await?;

    let mut output = String::new();
    client.read_to_string(&mut output).await?;

    let mut messages = Vec::new();
    while let Some(message) = receiver.recv().await {
        messages.push(message);
    }

    Ok(Transcript {
        output,
        close_reason,
        messages,
    })
}

/// Join reply lines the way the server sends them.
pub(super) fn replies(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{line}\r\n")).collect()
}

#[tokio::test]
async fn test_quit() -> Result {
    let session = transcript(ServerConfig::default(), b"QUIT\r\nNOOP\r\n").await?;

    assert_eq!(session.output, replies(&[GREETING, "221 2.0.0 Bye"]));
    assert_eq!(session.close_reason, CloseReason::Quit);

    Ok(())
}

#[tokio::test]
async fn test_closed_by_client() -> Result {
    let session = transcript(ServerConfig::default(), b"NOOP\r\n").await?;

    assert_eq!(session.output, replies(&[GREETING, "250 2.0.0 Ok"]));
    assert_eq!(session.close_reason, CloseReason::ClosedByClient);

    // Nothing at all.
    let session = transcript(ServerConfig::default(), b"").await?;
    assert_eq!(session.output, replies(&[GREETING]));
    assert_eq!(session.close_reason, CloseReason::ClosedByClient);

    Ok(())
}

#[tokio::test]
async fn test_premature_end() -> Result {
    let session = transcript(ServerConfig::default(), b"NOOP\r\nNOO").await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 2.0.0 Ok",
            "421 4.4.0 localhost Premature end of input"
        ])
    );
    assert_eq!(session.close_reason, CloseReason::ClosedByClient);

    Ok(())
}

#[tokio::test]
async fn test_parse_errors_are_answered() -> Result {
    let mut input = b"NOOP  x\r\n".to_vec();
    input.extend_from_slice(format!("NOOP {}\r\n", "a".repeat(5000)).as_bytes());
    input.extend_from_slice(b"HELO\tclient\r\n");
    input.extend_from_slice(b"QUIT\r\n");

    let session = transcript(ServerConfig::default(), &input).await?;

    let lines: Vec<&str> = session.output.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 5, "{lines:?}");
    assert_eq!(lines[0], GREETING);
    assert_eq!(lines[1], "500 5.5.2 Duplicate space after command name");
    assert_eq!(lines[2], "500 5.5.6 Command line is too long");
    assert!(lines[3].starts_with("500 5.5.2 Unexpected character"));
    assert_eq!(lines[4], "221 2.0.0 Bye");
    assert_eq!(session.close_reason, CloseReason::Quit);

    Ok(())
}

#[tokio::test]
async fn test_small_input_buffer() -> Result {
    let config = ServerConfig {
        input_buffer_size: 64,
        ..ServerConfig::default()
    };
    let recipient = format!("{}@example.com", "r".repeat(60));
    let input = format!(
        "HELO client\r\nMAIL FROM:<>\r\nRCPT TO:<{recipient}>\r\nDATA\r\n{}\r\n.\r\nQUIT\r\n",
        "body ".repeat(40)
    );

    let session = transcript(config, input.as_bytes()).await?;

    assert_eq!(session.close_reason, CloseReason::Quit);
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].from, "");
    assert_eq!(session.messages[0].recipients, [recipient]);
    assert_eq!(
        session.messages[0].data,
        format!("{}\r\n", "body ".repeat(40)).as_bytes()
    );

    Ok(())
}

#[tokio::test]
async fn test_data_too_large() -> Result {
    let config = ServerConfig {
        limits: Limits::default().with_max_data_size(16),
        ..ServerConfig::default()
    };
    let input = format!(
        "HELO client\r\nMAIL FROM:<a@b.c>\r\nRCPT TO:<d@e.f>\r\nDATA\r\n{}\r\n.\r\nQUIT\r\n",
        "x".repeat(40)
    );

    let session = transcript(config, input.as_bytes()).await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 localhost",
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "354 End data with <CR><LF>.<CR><LF>",
            "552 5.3.4 Command data too large",
        ])
    );
    assert_eq!(session.close_reason, CloseReason::Error);
    assert!(session.messages.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_truncated_data() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"HELO client\r\nMAIL FROM:<a@b.c>\r\nRCPT TO:<d@e.f>\r\nDATA\r\nunfinished\r\n",
    )
    .await?;

    assert!(session.output.ends_with(&replies(&[
        "354 End data with <CR><LF>.<CR><LF>",
        "421 4.4.0 localhost Input doesn't end with \".\" line",
    ])));
    assert_eq!(session.close_reason, CloseReason::Error);
    assert!(session.messages.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_timeout() -> Result {
    let config = ServerConfig {
        idle_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let (mut client, server) = duplex(1024);
    let (reader, writer) = tokio::io::split(server);

    client.write_all(b"NOOP\r\n").await?;
    let close_reason = Session::new(reader, writer, Rc::new(config), None)
        .run()
        .await?;

    assert!(matches!(close_reason, CloseReason::TimedOut(_)));

    let mut output = String::new();
    client.read_to_string(&mut output).await?;
    assert_eq!(
        output,
        replies(&[
            GREETING,
            "250 2.0.0 Ok",
            "421 4.4.2 localhost Timeout exceeded"
        ])
    );

    Ok(())
}

#[tokio::test]
async fn test_scripted_transport() -> Result {
    // Reads arrive in pieces, splitting lines anywhere.
    let reader = tokio_test::io::Builder::new()
        .read(b"HE")
        .read(b"LO client\r")
        .read(b"\nNOOP\r\nQU")
        .read(b"IT\r\n")
        .build();
    let writer = tokio_test::io::Builder::new()
        .write(b"220 localhost ESMTP ready\r\n")
        .write(b"250 localhost\r\n")
        .write(b"250 2.0.0 Ok\r\n")
        .write(b"221 2.0.0 Bye\r\n")
        .build();

    let session = Session::new(reader, writer, Rc::new(ServerConfig::default()), None);
    assert_eq!(session.run().await?, CloseReason::Quit);

    Ok(())
}
