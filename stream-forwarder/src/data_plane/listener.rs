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

//! The two listener variants behind one registry-facing type.

use crate::addr::TunnelAddr;
use crate::control_plane::listener_key::{ListenerDirection, ListenerKey};
use crate::data_plane::local_listener::LocalListener;
use crate::data_plane::remote_listener::{RemoteListener, ServeContext};
use serde::Serialize;

/// A registered tunnel endpoint.
pub enum Listener {
    /// Local TCP listener forwarding to a remote peer.
    Forwarding(LocalListener),
    /// Protocol served on this node, connecting to a local target.
    Serving(RemoteListener),
}

/// Listing snapshot of a registered listener.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ListenerInfo {
    pub protocol: String,
    pub direction: ListenerDirection,
    pub listen_addr: TunnelAddr,
    pub target_addr: TunnelAddr,
}

impl ListenerInfo {
    pub fn key(&self) -> ListenerKey {
        ListenerKey::new(&self.protocol, self.direction)
    }
}

impl Listener {
    pub fn protocol(&self) -> &str {
        match self {
            Listener::Forwarding(listener) => listener.protocol(),
            Listener::Serving(listener) => listener.protocol(),
        }
    }

    pub fn direction(&self) -> ListenerDirection {
        match self {
            Listener::Forwarding(_) => ListenerDirection::Outbound,
            Listener::Serving(_) => ListenerDirection::Inbound,
        }
    }

    pub fn key(&self) -> ListenerKey {
        ListenerKey::new(self.protocol(), self.direction())
    }

    pub fn listen_addr(&self) -> TunnelAddr {
        match self {
            Listener::Forwarding(listener) => TunnelAddr::Socket(listener.listen_addr()),
            Listener::Serving(listener) => TunnelAddr::Peer(listener.local_peer().clone()),
        }
    }

    pub fn target_addr(&self) -> TunnelAddr {
        match self {
            Listener::Forwarding(listener) => TunnelAddr::Peer(listener.peer().clone()),
            Listener::Serving(listener) => TunnelAddr::Socket(listener.target()),
        }
    }

    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            protocol: self.protocol().to_string(),
            direction: self.direction(),
            listen_addr: self.listen_addr(),
            target_addr: self.target_addr(),
        }
    }

    pub(crate) fn serve_context(&self) -> Option<ServeContext> {
        match self {
            Listener::Forwarding(_) => None,
            Listener::Serving(listener) => Some(listener.serve_context()),
        }
    }

    pub(crate) fn start(&mut self) {
        match self {
            Listener::Forwarding(listener) => listener.start(),
            Listener::Serving(_) => {}
        }
    }

    pub(crate) fn close(self) {
        match self {
            Listener::Forwarding(listener) => listener.close(),
            Listener::Serving(listener) => listener.close(),
        }
    }
}

impl From<LocalListener> for Listener {
    fn from(listener: LocalListener) -> Self {
        Listener::Forwarding(listener)
    }
}

impl From<RemoteListener> for Listener {
    fn from(listener: RemoteListener) -> Self {
        Listener::Serving(listener)
    }
}
