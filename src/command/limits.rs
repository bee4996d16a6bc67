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

use serde::{Deserialize, Serialize};

/// Size ceilings enforced by [`super::CommandParser`], in bytes.
///
/// A ceiling of `0` means "use the default". Only [`Self::max_data_size`] can be lifted entirely,
/// with [`Self::UNBOUNDED`].
#[derive(PartialEq, Eq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// The most bytes of parameters a command line may carry.
    pub max_parameters_size: usize,
    /// The most bytes an `AUTH` continuation line may carry.
    pub max_auth_size: usize,
    /// The most bytes of payload a command may send.
    pub max_data_size: u64,
}

impl Limits {
    pub const DEFAULT_MAX_PARAMETERS_SIZE: usize = 4 * 1024;
    pub const DEFAULT_MAX_AUTH_SIZE: usize = 8 * 1024;
    pub const DEFAULT_MAX_DATA_SIZE: u64 = 40 * 1024 * 1024;

    /// Disables the payload ceiling.
    pub const UNBOUNDED: u64 = u64::MAX;

    #[must_use]
    pub const fn with_max_parameters_size(mut self, size: usize) -> Self {
        self.max_parameters_size = size;
        self
    }

    #[must_use]
    pub const fn with_max_auth_size(mut self, size: usize) -> Self {
        self.max_auth_size = size;
        self
    }

    #[must_use]
    pub const fn with_max_data_size(mut self, size: u64) -> Self {
        self.max_data_size = size;
        self
    }

    /// Replace every ceiling of `0` with its default.
    #[must_use]
    pub const fn normalized(self) -> Self {
        const fn or(value: usize, default: usize) -> usize {
            if value == 0 {
                default
            } else {
                value
            }
        }

        Self {
            max_parameters_size: or(self.max_parameters_size, Self::DEFAULT_MAX_PARAMETERS_SIZE),
            max_auth_size: or(self.max_auth_size, Self::DEFAULT_MAX_AUTH_SIZE),
            max_data_size: if self.max_data_size == 0 {
                Self::DEFAULT_MAX_DATA_SIZE
            } else {
                self.max_data_size
            },
        }
    }

    /// Whether a payload ceiling is in effect.
    #[must_use]
    pub const fn is_data_size_bounded(&self) -> bool {
        self.max_data_size != Self::UNBOUNDED
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_parameters_size: Self::DEFAULT_MAX_PARAMETERS_SIZE,
            max_auth_size: Self::DEFAULT_MAX_AUTH_SIZE,
            max_data_size: Self::DEFAULT_MAX_DATA_SIZE,
        }
    }
}
