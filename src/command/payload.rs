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

//! Handing the input stream over to a command's payload, and taking it back.

use std::rc::Rc;

use tracing::debug;

use super::{CommandParser, ParseError, ParseErrorKind};
use crate::stream::{
    self, DotStream, ErrorStream, ExactSizeStream, FailureAtStream, InputStream, StreamHandle,
};

impl CommandParser {
    /// Hand out a stream of exactly `size` bytes of payload, as `BDAT` sends it.
    ///
    /// A `size` above [`super::Limits::max_data_size`] produces a stream that fails on its first
    /// read. The session is expected to check the size before asking.
    ///
    /// Whatever the caller does not read is discarded by the next parse.
    ///
    /// # Panics
    ///
    /// Panics if the previous payload has not been finished by a parse yet.
    pub fn request_payload(&mut self, size: u64) -> StreamHandle {
        assert!(
            self.data.is_none(),
            "requested a payload while another one is still active"
        );

        let max = self.limits.max_data_size;
        let data = if size > max {
            stream::share(ErrorStream::too_large(format!(
                "Command data size exceeds maximum ({size} > {max})"
            )))
        } else {
            stream::share(ExactSizeStream::new(Rc::clone(&self.input), size))
        };

        self.data = Some(Rc::clone(&data));
        data
    }

    /// Hand out a dot-unstuffed stream that ends at the terminating `.` line, as `DATA` sends it.
    ///
    /// Unless [`super::Limits::max_data_size`] is [`super::Limits::UNBOUNDED`], the stream fails
    /// once the payload grows past it.
    ///
    /// # Panics
    ///
    /// Panics if the previous payload has not been finished by a parse yet.
    pub fn request_payload_dot_terminated(&mut self) -> StreamHandle {
        assert!(
            self.data.is_none(),
            "requested a payload while another one is still active"
        );

        let dot = stream::share(DotStream::new(Rc::clone(&self.input)));
        let data = if self.limits.is_data_size_bounded() {
            let max = self.limits.max_data_size;
            stream::share(FailureAtStream::new(
                dot,
                max,
                format!("Command data size exceeds maximum (> {max})"),
            ))
        } else {
            dot
        };

        self.data = Some(Rc::clone(&data));
        data
    }

    /// Whether the active payload still has bytes to give, buffered or not.
    #[must_use]
    pub fn has_pending_payload_data(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.borrow().have_bytes_left())
    }

    /// Read the active payload to its end, if there is one.
    ///
    /// Returns `Ok(false)` if the payload is not finished yet because the input would block.
    /// The payload is released once it ends or fails.
    pub(super) fn finish_payload(&mut self) -> Result<bool, ParseError> {
        let Some(data) = &self.data else {
            return Ok(true);
        };

        let finished = stream::discard(&mut *data.borrow_mut());
        match finished {
            Ok(false) => Ok(false),
            Ok(true) => {
                self.data = None;
                Ok(true)
            }
            Err(error) => {
                self.data = None;
                debug!(%error, "payload failed while it was discarded");

                Err(if error.is_too_large() {
                    ParseError::new(ParseErrorKind::DataTooLarge, "Command data too large")
                } else {
                    ParseError::new(ParseErrorKind::BrokenStream, error.to_string())
                })
            }
        }
    }
}
