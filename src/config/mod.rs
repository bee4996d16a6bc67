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

//! Server configuration, loaded from TOML.
//!
//! Every field is optional:
//!
//! ```toml
//! hostname = "mx.example.com"
//! bind = "0.0.0.0:2525"
//! input_buffer_size = 4096
//! idle_timeout_secs = 300
//!
//! [limits]
//! max_parameters_size = 4096
//! max_auth_size = 8192
//! max_data_size = 41943040
//! ```


use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{command::Limits, stream::DEFAULT_MAX_BUFFER_SIZE, timeouts};

/// The port used when none is configured. Not 25, so the server runs without privileges.
pub const DEFAULT_PORT: u16 = 2525;

/// Errors encountered loading a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The name the server gives itself in its greeting and `EHLO` reply.
    pub hostname: String,
    pub bind: SocketAddr,
    pub limits: Limits,
    /// The most bytes of client input the parser buffers at once.
    pub input_buffer_size: usize,
    /// How long to wait for the client before giving up on the session.
    pub idle_timeout_secs: u64,
}

impl ServerConfig {
    /// Load a [`Self`] from the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file could not be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    /// Load a [`Self`] from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the string could not be parsed or validated.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() || !self.hostname.is_ascii() {
            return Err(ConfigError::Invalid("hostname must be non-empty ASCII"));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid("idle_timeout_secs must be positive"));
        }

        Ok(())
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            limits: Limits::default(),
            input_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            idle_timeout_secs: timeouts::SERVER_TIMEOUT.as_secs(),
        }
    }
}
