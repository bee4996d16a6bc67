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

use super::{
    super::{
        test::{replies, transcript, GREETING},
        CloseReason,
    },
    *,
};
use crate::{command::Limits, config::ServerConfig};

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

const EHLO: [&str; 6] = [
    "250-localhost",
    "250-PIPELINING",
    "250-8BITMIME",
    "250-CHUNKING",
    "250-SIZE 41943040",
    "250 AUTH PLAIN",
];

/// The greeting, then an `EHLO` reply, then `rest`.
fn after_ehlo(rest: &[&str]) -> String {
    let mut lines = vec![GREETING];
    lines.extend(EHLO);
    lines.extend(rest);

    replies(&lines)
}

#[test]
fn test_parse_path() {
    assert_eq!(parse_path("FROM:<a@b.c>", "FROM:"), Ok(("a@b.c", "")));
    assert_eq!(
        parse_path("from:<a@b.c>  SIZE=10", "FROM:"),
        Ok(("a@b.c", "SIZE=10"))
    );
    // Postel's Law.
    assert_eq!(parse_path("FROM: <a@b.c>", "FROM:"), Ok(("a@b.c", "")));

    // The null path.
    assert_eq!(parse_path("FROM:<>", "FROM:"), Ok(("", "")));
    // Source routes are dropped.
    assert_eq!(
        parse_path("TO:<@relay.example,@other.example:a@b.c>", "TO:"),
        Ok(("a@b.c", ""))
    );
    assert_eq!(parse_path("TO:<Postmaster>", "TO:"), Ok(("Postmaster", "")));

    assert_eq!(
        parse_path("TO:<a@b.c>", "FROM:"),
        Err(ArgumentError::MissingKeyword("FROM:"))
    );
    assert_eq!(
        parse_path("", "TO:"),
        Err(ArgumentError::MissingKeyword("TO:"))
    );
    assert_eq!(
        parse_path("FROM:a@b.c", "FROM:"),
        Err(ArgumentError::MissingBrackets)
    );
    assert_eq!(
        parse_path("FROM:<a@b.c", "FROM:"),
        Err(ArgumentError::MissingBrackets)
    );

    for invalid in ["<ab.c>", "<@b.c>", "<a@>", "<a b@c.d>"] {
        assert_eq!(
            parse_path(&format!("FROM:{invalid}"), "FROM:"),
            Err(ArgumentError::InvalidAddress),
            "{invalid}"
        );
    }
}

#[test]
fn test_path_lengths() {
    use crate::str::max_lengths;

    let local_part = "l".repeat(max_lengths::LOCAL_PART);
    let path = format!("TO:<{local_part}@example.com>");
    assert_eq!(parse_path(&path, "TO:").map(|(to, _)| to.len()), Ok(76));

    let path = format!("TO:<{local_part}l@example.com>");
    assert_eq!(
        parse_path(&path, "TO:"),
        Err(ArgumentError::LocalPartTooLong)
    );

    let path = format!("TO:<a@{}>", "d".repeat(max_lengths::PATH));
    assert_eq!(parse_path(&path, "TO:"), Err(ArgumentError::PathTooLong));

    let mailbox = format!("a@{}", "d".repeat(max_lengths::DOMAIN + 1));
    assert_eq!(parse_mailbox(&mailbox), Err(ArgumentError::DomainTooLong));
}

#[test]
fn test_parse_mail_parameters() {
    assert_eq!(parse_mail_parameters(""), Ok(MailParameters::default()));
    assert_eq!(
        parse_mail_parameters("SIZE=1000"),
        Ok(MailParameters { size: Some(1000) })
    );
    assert_eq!(
        parse_mail_parameters("body=8BITMIME size=10"),
        Ok(MailParameters { size: Some(10) })
    );

    assert_eq!(
        parse_mail_parameters("SIZE=ten"),
        Err(ArgumentError::InvalidSize)
    );
    assert_eq!(parse_mail_parameters("SIZE"), Err(ArgumentError::InvalidSize));
    assert_eq!(
        parse_mail_parameters("SMTPUTF8"),
        Err(ArgumentError::UnsupportedParameter)
    );
    assert_eq!(
        parse_mail_parameters("BODY=BINARYMIME"),
        Err(ArgumentError::UnsupportedParameter)
    );
}

#[test]
fn test_parse_chunk() {
    assert_eq!(parse_chunk("10"), Ok((10, false)));
    assert_eq!(parse_chunk("10 LAST"), Ok((10, true)));
    assert_eq!(parse_chunk("0 last"), Ok((0, true)));

    for invalid in ["", "x", "-1", "+5", "10 FIRST", "10 LAST x"] {
        assert_eq!(
            parse_chunk(invalid),
            Err(ArgumentError::InvalidChunk),
            "{invalid:?}"
        );
    }
}

#[test]
fn test_argument_error_codes() {
    assert_eq!(ArgumentError::UnsupportedParameter.code(), "555 5.5.4");
    assert_eq!(ArgumentError::PathTooLong.code(), "501 5.5.2");
    assert_eq!(ArgumentError::MissingBrackets.code(), "501 5.5.4");
    assert_eq!(
        ArgumentError::MissingKeyword("TO:").to_string(),
        "Expected TO:<address>"
    );
}

#[tokio::test]
async fn test_mail_transaction() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"EHLO client.example\r\n\
          MAIL FROM:<a@b.c> SIZE=20\r\n\
          RCPT TO:<d@e.f>\r\n\
          RCPT TO:<postmaster>\r\n\
          DATA\r\n\
          hello\r\n\
          ..world\r\n\
          .\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        after_ehlo(&[
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "250 2.1.5 Ok",
            "354 End data with <CR><LF>.<CR><LF>",
            "250 2.0.0 Message accepted",
            "221 2.0.0 Bye",
        ])
    );
    assert_eq!(session.close_reason, CloseReason::Quit);

    let [message] = session.messages.as_slice() else {
        panic!("expected one message, got {:?}", session.messages);
    };
    assert_eq!(message.helo, "client.example");
    assert_eq!(message.from, "a@b.c");
    assert_eq!(message.recipients, ["d@e.f", "postmaster"]);
    assert_eq!(&message.data[..], b"hello\r\n.world\r\n");

    Ok(())
}

#[tokio::test]
async fn test_command_sequence() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"MAIL FROM:<a@b.c>\r\n\
          HELO\r\n\
          HELO c\r\n\
          RCPT TO:<a@b.c>\r\n\
          DATA\r\n\
          MAIL FROM:<a@b.c>\r\n\
          MAIL FROM:<a@b.c>\r\n\
          DATA\r\n\
          DATA x\r\n\
          RSET\r\n\
          RCPT TO:<d@e.f>\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "503 5.5.1 Send HELO or EHLO first",
            "501 5.5.4 Missing domain",
            "250 localhost",
            "503 5.5.1 Need MAIL command first",
            "503 5.5.1 Need MAIL command first",
            "250 2.1.0 Ok",
            "503 5.5.1 Sender already specified",
            "554 5.5.1 No valid recipients",
            "501 5.5.4 DATA takes no parameters",
            "250 2.0.0 Ok",
            "503 5.5.1 Need MAIL command first",
            "221 2.0.0 Bye",
        ])
    );
    assert!(session.messages.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_argument_errors() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"HELO c\r\n\
          MAIL FROM:a@b.c\r\n\
          MAIL FROM:<a@b.c> SIZE=99999999999\r\n\
          MAIL FROM:<a@b.c> SMTPUTF8\r\n\
          MAIL TO:<a@b.c>\r\n\
          MAIL FROM:<a@b.c>\r\n\
          RCPT TO:<>\r\n\
          RCPT TO:<d@e.f> NOTIFY=NEVER\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 localhost",
            "501 5.5.4 Address must be enclosed in <>",
            "552 5.3.4 Message size exceeds fixed maximum message size",
            "555 5.5.4 Unsupported parameter",
            "501 5.5.4 Expected FROM:<address>",
            "250 2.1.0 Ok",
            "501 5.5.4 Invalid address",
            "555 5.5.4 Unsupported parameter",
            "221 2.0.0 Bye",
        ])
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_commands() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"\r\nFOO\r\nVRFY someone\r\nSTARTTLS\r\nnoop\r\nQUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "500 5.5.2 Invalid command syntax",
            "500 5.5.1 Unknown command",
            "502 5.5.1 Command not implemented",
            "502 5.5.1 Command not implemented",
            "250 2.0.0 Ok",
            "221 2.0.0 Bye",
        ])
    );

    Ok(())
}

#[tokio::test]
async fn test_unbounded_size() -> Result {
    let config = ServerConfig {
        limits: Limits::default().with_max_data_size(Limits::UNBOUNDED),
        ..ServerConfig::default()
    };
    let session = transcript(config, b"EHLO c\r\n").await?;

    assert!(session.output.contains("\r\n250-SIZE\r\n"));

    Ok(())
}

#[tokio::test]
async fn test_chunking() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"EHLO c\r\n\
          MAIL FROM:<a@b.c>\r\n\
          RCPT TO:<d@e.f>\r\n\
          BDAT 5\r\n\
          helloBDAT 9 LAST\r\n\
          , world\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        after_ehlo(&[
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "250 2.0.0 5 octets received",
            "250 2.0.0 Message accepted",
            "221 2.0.0 Bye",
        ])
    );

    let [message] = session.messages.as_slice() else {
        panic!("expected one message, got {:?}", session.messages);
    };
    assert_eq!(&message.data[..], b"hello, world\r\n");

    Ok(())
}

#[tokio::test]
async fn test_chunking_errors() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"HELO c\r\n\
          BDAT 3\r\n\
          abcBDAT x\r\n\
          MAIL FROM:<a@b.c>\r\n\
          RCPT TO:<d@e.f>\r\n\
          BDAT 2\r\n\
          abDATA\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 localhost",
            // The chunk is still read.
            "503 5.5.1 Need MAIL command first",
            "501 5.5.4 Invalid BDAT parameters",
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "250 2.0.0 2 octets received",
            "503 5.5.1 DATA cannot follow BDAT",
            "221 2.0.0 Bye",
        ])
    );
    assert!(session.messages.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_chunks_too_large() -> Result {
    let config = ServerConfig {
        limits: Limits::default().with_max_data_size(8),
        ..ServerConfig::default()
    };

    // Too large together.
    let session = transcript(
        config.clone(),
        b"HELO c\r\n\
          MAIL FROM:<a@b.c>\r\n\
          RCPT TO:<d@e.f>\r\n\
          BDAT 6\r\n\
          abcdefBDAT 6 LAST\r\n\
          ghijklQUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 localhost",
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "250 2.0.0 6 octets received",
            "552 5.3.4 Message size exceeds fixed maximum message size",
            "221 2.0.0 Bye",
        ])
    );
    assert!(session.messages.is_empty());

    // Too large by itself.
    let session = transcript(config, b"HELO c\r\nBDAT 100\r\n").await?;

    assert_eq!(
        session.output,
        replies(&[
            GREETING,
            "250 localhost",
            "552 5.3.4 Command data too large"
        ])
    );
    assert_eq!(session.close_reason, CloseReason::Error);

    Ok(())
}

#[tokio::test]
async fn test_auth() -> Result {
    let session = transcript(
        ServerConfig::default(),
        b"EHLO c\r\n\
          AUTH PLAIN\r\n\
          AGEAYg==\r\n\
          AUTH PLAIN AGEAYg==\r\n\
          QUIT\r\n",
    )
    .await?;

    assert_eq!(
        session.output,
        after_ehlo(&[
            "334 ",
            "235 2.7.0 Authentication successful",
            "503 5.5.1 Already authenticated",
            "221 2.0.0 Bye",
        ])
    );

    Ok(())
}

#[tokio::test]
async fn test_auth_failures() -> Result {
    let mut input = b"AUTH PLAIN\r\n\
                      EHLO c\r\n\
                      AUTH LOGIN\r\n\
                      AUTH PLAIN\r\n\
                      *\r\n\
                      AUTH PLAIN\r\n\
                      not base64!\r\n\
                      AUTH PLAIN\r\n"
        .to_vec();
    input.extend_from_slice(&[b'A'; 9000]);
    input.extend_from_slice(b"\r\nQUIT\r\n");

    let session = transcript(ServerConfig::default(), &input).await?;

    let mut expected = vec![GREETING, "503 5.5.1 Send EHLO first"];
    expected.extend(EHLO);
    expected.extend([
        "504 5.5.4 Unrecognized authentication type",
        "334 ",
        "501 5.0.0 Authentication cancelled",
        "334 ",
        "501 5.5.2 Invalid base64 data",
        "334 ",
        "500 5.5.6 AUTH response line is too long",
        "221 2.0.0 Bye",
    ]);
    assert_eq!(session.output, replies(&expected));
    assert_eq!(session.close_reason, CloseReason::Quit);

    Ok(())
}
