/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Runtime options and the JSON5 tunnel configuration file.

use crate::addr::TunnelAddr;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on opening a channel or connecting to a target.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Behaviour switches of a [`crate::P2pTunnels`] instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelOptions {
    /// Accept protocols outside the `/x/` namespace.
    pub allow_custom_protocol: bool,
    pub dial_timeout: Duration,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            allow_custom_protocol: false,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

impl TunnelOptions {
    pub fn with_allow_custom_protocol(mut self, allow: bool) -> Self {
        self.allow_custom_protocol = allow;
        self
    }

    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TunnelConfig {
    #[serde(default)]
    pub allow_custom_protocol: bool,
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    #[serde(default)]
    pub forwards: Vec<ForwardRule>,
    #[serde(default)]
    pub listens: Vec<ListenRule>,
}

/// Forward local connections on `listen` to the peer in `target`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ForwardRule {
    pub protocol: String,
    pub listen: TunnelAddr,
    pub target: TunnelAddr,
}

/// Serve `protocol` by connecting inbound channels to `target`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListenRule {
    pub protocol: String,
    pub target: TunnelAddr,
    #[serde(default)]
    pub report_peer_id: bool,
}

fn default_dial_timeout_secs() -> u64 {
    DEFAULT_DIAL_TIMEOUT.as_secs()
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            allow_custom_protocol: false,
            dial_timeout_secs: default_dial_timeout_secs(),
            forwards: Vec::new(),
            listens: Vec::new(),
        }
    }
}

impl TunnelConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        json5::from_str(contents).map_err(ConfigError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn options(&self) -> TunnelOptions {
        TunnelOptions::default()
            .with_allow_custom_protocol(self.allow_custom_protocol)
            .with_dial_timeout(Duration::from_secs(self.dial_timeout_secs))
    }
}

/// Failures while loading a [`TunnelConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(json5::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "unable to read config file {}: {source}", path.display())
            }
            ConfigError::Parse(err) => write!(f, "invalid tunnel config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
        }
    }
}
