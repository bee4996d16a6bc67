// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright © 2024 RemasteredArch
// Copyright © 2024 Jaxydog
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

//! Pull-based, non-blocking byte streams.
//!
//! Everything in this module follows the same contract, described by [`InputStream`]: a stream
//! owns a buffer of bytes that have been read but not yet consumed, [`InputStream::read`] tries
//! to append more of them without ever blocking, and the consumer releases bytes with
//! [`InputStream::skip`] once it is done with them.
//!
//! Streams are shared through a [`StreamHandle`]. The command parser and the payload streams it
//! hands out all read from the same underlying source, but only ever one at a time.

use std::{cell::RefCell, io, rc::Rc};

use thiserror::Error;

mod buffered;
mod dot;
mod failure;
mod sized;

pub use buffered::BufferedInput;
pub use dot::DotStream;
pub use failure::{ErrorStream, FailureAtStream};
pub use sized::ExactSizeStream;

/// The default for [`InputStream::max_buffer_size`].
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4096;

/// A shared, reference-counted handle to an [`InputStream`].
///
/// Only one holder may read from the stream at a time. Borrowing it twice is a bug in the caller
/// and panics.
pub type StreamHandle = Rc<RefCell<dyn InputStream>>;

/// Wrap a stream into a [`StreamHandle`].
pub fn share<S: InputStream + 'static>(stream: S) -> StreamHandle {
    Rc::new(RefCell::new(stream))
}

/// The outcome of a successful [`InputStream::read`].
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ReadStatus {
    /// At least one new byte was appended to [`InputStream::data`].
    Data,
    /// Nothing more is available right now without blocking.
    WouldBlock,
    /// The buffer already holds [`InputStream::max_buffer_size`] bytes. Skip some first.
    BufferFull,
    /// The stream ended cleanly and no new bytes were appended.
    Eof,
}

/// Why a stream stopped producing bytes before its natural end.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The stream crossed a configured size ceiling.
    #[error("{0}")]
    TooLarge(String),
    /// The source ended before an exact-size stream received all of its bytes.
    #[error("Premature end of data: expected {expected} bytes, but received only {received}")]
    Truncated { expected: u64, received: u64 },
    /// The source ended before a dot-terminated stream saw its terminating line.
    #[error("Input doesn't end with \".\" line")]
    Unterminated,
    /// The transport failed.
    #[error("Connection lost: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Whether this error means that a size ceiling was crossed, as opposed to a broken stream.
    #[must_use]
    pub const fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge(_))
    }
}

/// A non-blocking source of bytes with its own read buffer.
pub trait InputStream {
    /// Try to append more bytes to [`Self::data`] without blocking.
    ///
    /// # Errors
    ///
    /// Returns a [`StreamError`] if the stream failed. A failed stream keeps failing.
    fn read(&mut self) -> Result<ReadStatus, StreamError>;

    /// The bytes that have been read but not yet skipped.
    fn data(&self) -> &[u8];

    /// Consume `count` bytes from the front of [`Self::data`].
    ///
    /// # Panics
    ///
    /// May panic if `count` is larger than `self.data().len()`.
    fn skip(&mut self, count: usize);

    /// The most bytes [`Self::data`] will ever hold at once.
    fn max_buffer_size(&self) -> usize;

    /// Whether the stream has ended or failed, so no further bytes will be read.
    fn is_eof(&self) -> bool;

    /// Whether there is anything left to consume, either buffered or yet to be read.
    fn have_bytes_left(&self) -> bool {
        !self.data().is_empty() || !self.is_eof()
    }
}

/// Read from `stream` once, unless it already has buffered data, and move everything it has
/// buffered into `out`.
///
/// Returns [`ReadStatus::Data`] when bytes were moved.
///
/// # Errors
///
/// Whatever [`InputStream::read`] returns.
pub fn read_into<S>(stream: &mut S, out: &mut Vec<u8>) -> Result<ReadStatus, StreamError>
where
    S: InputStream + ?Sized,
{
    let status = if stream.data().is_empty() {
        stream.read()?
    } else {
        ReadStatus::Data
    };

    let data = stream.data();
    let len = data.len();
    out.extend_from_slice(data);
    stream.skip(len);

    Ok(status)
}

/// Read `stream` until it ends, ignoring everything it produces.
///
/// Returns `Ok(false)` if the stream would block before reaching its end.
///
/// # Errors
///
/// Whatever [`InputStream::read`] returns.
pub fn discard<S>(stream: &mut S) -> Result<bool, StreamError>
where
    S: InputStream + ?Sized,
{
    loop {
        let len = stream.data().len();
        stream.skip(len);

        match stream.read()? {
            ReadStatus::Data | ReadStatus::BufferFull => (),
            ReadStatus::WouldBlock => return Ok(false),
            ReadStatus::Eof => return Ok(true),
        }
    }
}
