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

//! Peer identities and multi-segment tunnel addresses.
//!
//! Addresses are rendered the way overlay tooling prints them:
//! `/ip4/127.0.0.1/tcp/8080`, `/ip6/::1/tcp/8080` or `/p2p/<peer-id>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Opaque identity of a peer on the p2p transport.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Listen, origin or target address of a listener or stream.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TunnelAddr {
    /// A local network endpoint.
    Socket(SocketAddr),
    /// A peer endpoint on the overlay.
    Peer(PeerId),
}

impl TunnelAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            TunnelAddr::Socket(addr) => Some(*addr),
            TunnelAddr::Peer(_) => None,
        }
    }

    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            TunnelAddr::Socket(_) => None,
            TunnelAddr::Peer(peer) => Some(peer),
        }
    }
}

impl From<SocketAddr> for TunnelAddr {
    fn from(addr: SocketAddr) -> Self {
        TunnelAddr::Socket(addr)
    }
}

impl From<PeerId> for TunnelAddr {
    fn from(peer: PeerId) -> Self {
        TunnelAddr::Peer(peer)
    }
}

impl Display for TunnelAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TunnelAddr::Socket(SocketAddr::V4(addr)) => {
                write!(f, "/ip4/{}/tcp/{}", addr.ip(), addr.port())
            }
            TunnelAddr::Socket(SocketAddr::V6(addr)) => {
                write!(f, "/ip6/{}/tcp/{}", addr.ip(), addr.port())
            }
            TunnelAddr::Peer(peer) => write!(f, "/p2p/{peer}"),
        }
    }
}

/// Failures while parsing a [`TunnelAddr`].
#[derive(Debug, Eq, PartialEq)]
pub enum AddrParseError {
    Empty,
    MissingLeadingSlash(String),
    UnsupportedSegment(String),
    MissingValue(&'static str),
    InvalidIp(String),
    InvalidPort(String),
    TrailingSegments(String),
}

impl Display for AddrParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddrParseError::Empty => write!(f, "address is empty"),
            AddrParseError::MissingLeadingSlash(addr) => {
                write!(f, "address must start with '/': {addr}")
            }
            AddrParseError::UnsupportedSegment(segment) => {
                write!(f, "unsupported address segment: {segment}")
            }
            AddrParseError::MissingValue(segment) => {
                write!(f, "missing value for '{segment}' segment")
            }
            AddrParseError::InvalidIp(ip) => write!(f, "invalid ip address: {ip}"),
            AddrParseError::InvalidPort(port) => write!(f, "invalid tcp port: {port}"),
            AddrParseError::TrailingSegments(rest) => {
                write!(f, "unexpected trailing segments: {rest}")
            }
        }
    }
}

impl Error for AddrParseError {}

impl FromStr for TunnelAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddrParseError::Empty);
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(AddrParseError::MissingLeadingSlash(s.to_string()));
        };

        let mut segments = rest.split('/');
        let addr = match segments.next() {
            Some(family @ ("ip4" | "ip6")) => {
                let ip_text = segments
                    .next()
                    .filter(|value| !value.is_empty())
                    .ok_or(AddrParseError::MissingValue("ip"))?;
                let ip: IpAddr = ip_text
                    .parse()
                    .map_err(|_| AddrParseError::InvalidIp(ip_text.to_string()))?;
                if (family == "ip4") != ip.is_ipv4() {
                    return Err(AddrParseError::InvalidIp(ip_text.to_string()));
                }

                match segments.next() {
                    Some("tcp") => {}
                    Some(other) => return Err(AddrParseError::UnsupportedSegment(other.into())),
                    None => return Err(AddrParseError::MissingValue("tcp")),
                }
                let port_text = segments
                    .next()
                    .filter(|value| !value.is_empty())
                    .ok_or(AddrParseError::MissingValue("tcp"))?;
                let port: u16 = port_text
                    .parse()
                    .map_err(|_| AddrParseError::InvalidPort(port_text.to_string()))?;

                TunnelAddr::Socket(SocketAddr::new(ip, port))
            }
            Some("p2p") => {
                let peer = segments
                    .next()
                    .filter(|value| !value.is_empty())
                    .ok_or(AddrParseError::MissingValue("p2p"))?;
                TunnelAddr::Peer(PeerId::new(peer))
            }
            Some(other) => return Err(AddrParseError::UnsupportedSegment(other.to_string())),
            None => return Err(AddrParseError::Empty),
        };

        let trailing: Vec<&str> = segments.collect();
        if !trailing.is_empty() {
            return Err(AddrParseError::TrailingSegments(trailing.join("/")));
        }

        Ok(addr)
    }
}

impl Serialize for TunnelAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TunnelAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
