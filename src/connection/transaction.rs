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


//! The mail transaction built up over a session.

use bytes::{Bytes, BytesMut};

/// The most recipients accepted for a single message.
///
/// [RFC 5321 section 4.5.3.1.8](https://www.rfc-editor.org/rfc/rfc5321.html#section-4.5.3.1.8).
pub const MAX_RECIPIENTS: usize = 100;

/// A message accepted from a client.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Message {
    /// The domain the client gave in `HELO` or `EHLO`.
    pub helo: String,
    /// The reverse path. Empty for a null sender (`MAIL FROM:<>`).
    pub from: String,
    pub recipients: Vec<String>,
    /// The message content, dot-unstuffed if it came from `DATA`.
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct Transaction {
    pub helo: Option<String>,
    pub from: Option<String>,
    pub recipients: Vec<String>,
    /// `BDAT` chunks received so far, if any.
    pub chunks: Option<BytesMut>,
}

impl Transaction {
    /// Start over after a new `HELO` or `EHLO`.
    pub fn greet(&mut self, helo: String) {
        *self = Self {
            helo: Some(helo),
            ..Self::default()
        };
    }

    /// Forget the envelope, keeping the greeting.
    pub fn reset(&mut self) {
        self.from = None;
        self.recipients.clear();
        self.chunks = None;
    }

    /// Whether the envelope is complete enough to take message content.
    pub fn has_recipients(&self) -> bool {
        self.from.is_some() && !self.recipients.is_empty()
    }

    /// Append a `BDAT` chunk, returning the total size so far.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> usize {
        let chunks = self.chunks.get_or_insert_with(BytesMut::new);
        chunks.extend_from_slice(chunk);

        chunks.len()
    }

    /// Take the finished message out of the envelope, leaving the transaction reset.
    ///
    /// Returns [`None`] if there is no sender or recipient.
    pub fn finish(&mut self, data: Bytes) -> Option<Message> {
        if !self.has_recipients() {
            return None;
        }

        let message = Message {
            helo: self.helo.clone().unwrap_or_default(),
            from: self.from.take().unwrap_or_default(),
            recipients: std::mem::take(&mut self.recipients),
            data,
        };
        self.reset();

        Some(message)
    }

    /// Take the finished message out of the accumulated `BDAT` chunks.
    pub fn finish_chunks(&mut self) -> Option<Message> {
        let data = self.chunks.take().unwrap_or_default().freeze();

        self.finish(data)
    }
}
