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


use std::{error::Error, rc::Rc};

use futures_util::{pin_mut, StreamExt};
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    sync::mpsc::unbounded_channel,
    task::LocalSet,
    time::timeout,
};

use crate::{config::ServerConfig, connection::CloseReason, read_line, timeouts, write_line};


type Result = std::result::Result<(), Box<dyn Error>>;

// 4.5.1 Minimum Implementation:
//
// - [x] `EHLO`
// - [x] `HELO`
// - [x] `MAIL`
// - [x] `RCPT`
// - [x] `DATA`
// - [x] `RSET`
// - [x] `NOOP`
// - [ ] `VRFY`
// - [x] `QUIT`
//
// <https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.1>
#[tokio::test]
async fn test_listen() -> Result {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;

    let (sender, mut receiver) = unbounded_channel();
    let stream = crate::listen(listener, Rc::new(ServerConfig::default()), Some(sender));

    LocalSet::new()
        .run_until(async move {
            // Serve a single session.
            let server = tokio::task::spawn_local(async move {
                pin_mut!(stream);

                stream
                    // Get the `Next` and unwrap it
                    .next()
                    .await
                    .unwrap()
                    // Unwrap the [`TcpListener::accept`]
                    .unwrap()
                    // Await and unwrap the [`JoinHandle`]
                    .await
                    .unwrap()
            });

            let mut stream = TcpStream::connect(address).await?;
            let (read_stream, mut write_stream) = stream.split();

            let mut reader = BufReader::new(read_stream);

            let greeting = timeout(timeouts::INITIAL_220_MESSAGE, read_line!(reader)).await??;
            assert!(is_valid_response::server_greeting(&greeting));

            write_line!(write_stream, "HELO client.example")?;
            assert!(is_valid_response::helo(&read_line!(reader).await?));

            write_line!(write_stream, "EHLO client.example")?;
            let mut extensions = Vec::new();
            loop {
                let line = read_line!(reader).await?;
                assert!(is_valid_response::ehlo(&line), "{line:?}");

                extensions.push(line[4..].trim_end().to_string());
                if is_valid_response::is_last_line(&line) {
                    break;
                }
            }
            assert!(extensions.iter().any(|extension| extension == "PIPELINING"));
            assert!(extensions.iter().any(|extension| extension == "CHUNKING"));

            write_line!(write_stream, "NOOP")?;
            assert!(is_valid_response::ok(&read_line!(reader).await?));

            write_line!(write_stream, "MAIL FROM:<sender@client.example>")?;
            assert!(is_valid_response::ok(&read_line!(reader).await?));

            write_line!(write_stream, "RCPT TO:<recipient@localhost>")?;
            assert!(is_valid_response::ok(&read_line!(reader).await?));

            write_line!(write_stream, "DATA")?;
            assert!(is_valid_response::start_data(&read_line!(reader).await?));

            write_line!(write_stream, "Subject: test\r\n\r\n..hidden dot\r\n.")?;
            assert!(is_valid_response::ok(&read_line!(reader).await?));

            write_line!(write_stream, "RSET")?;
            assert!(is_valid_response::ok(&read_line!(reader).await?));

            write_line!(write_stream, "QUIT")?;
            assert!(is_valid_response::quit(&read_line!(reader).await?));

            assert_eq!(server.await??, CloseReason::Quit);

            let message = receiver.recv().await.ok_or("no message was accepted")?;
            assert_eq!(message.helo, "client.example");
            assert_eq!(message.from, "sender@client.example");
            assert_eq!(message.recipients, ["recipient@localhost"]);
            assert_eq!(&message.data[..], b"Subject: test\r\n\r\n.hidden dot\r\n");

            Ok::<_, Box<dyn Error>>(())
        })
        .await
}
