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

//! Conflict-checked listener registry and inbound protocol dispatch.

use crate::control_plane::listener_key::ListenerKey;
use crate::data_plane::listener::{Listener, ListenerInfo};
use crate::data_plane::remote_listener::ServeContext;
use crate::observability::{events, fields};
use crate::transport::P2pChannel;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use tracing::{debug, info, warn};

const COMPONENT: &str = "listener_registry";

/// Listener registration failures.
#[derive(Debug, Eq, PartialEq)]
pub enum ListenerRegistrationError {
    AlreadyRegistered(ListenerKey),
}

impl Display for ListenerRegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ListenerRegistrationError::AlreadyRegistered(key) => {
                write!(f, "listener already registered: {key}")
            }
        }
    }
}

impl Error for ListenerRegistrationError {}

/// Active listeners keyed by protocol and direction.
///
/// The lock only covers map mutation and lookup; accept loops and stream setup
/// never run under it.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<ListenerKey, Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `listener` and starts accepting.
    ///
    /// A listener whose key is taken is dropped without being started, which
    /// releases any socket it bound.
    pub fn register(
        &self,
        listener: impl Into<Listener>,
    ) -> Result<ListenerInfo, ListenerRegistrationError> {
        let listener = listener.into();
        let key = listener.key();
        let info = listener.info();

        let inserted = {
            let mut listeners = self.listeners.write();
            match listeners.entry(key.clone()) {
                Entry::Occupied(_) => Err(listener),
                Entry::Vacant(slot) => {
                    slot.insert(listener).start();
                    Ok(())
                }
            }
        };

        if let Err(rejected) = inserted {
            drop(rejected);
            warn!(
                event = events::LISTENER_REGISTER_CONFLICT,
                component = COMPONENT,
                listener_key = %key,
                "listener key already registered"
            );
            return Err(ListenerRegistrationError::AlreadyRegistered(key));
        }

        info!(
            event = events::LISTENER_REGISTER_OK,
            component = COMPONENT,
            listener_key = %key,
            listen_addr = %info.listen_addr,
            target_addr = %info.target_addr,
            "registered listener"
        );
        Ok(info)
    }

    /// Removes every listener matching `predicate` and closes it outside the lock.
    ///
    /// Returns how many listeners were closed. Streams they produced keep running.
    pub fn close<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&Listener) -> bool,
    {
        let closed: Vec<Listener> = {
            let mut listeners = self.listeners.write();
            let keys: Vec<ListenerKey> = listeners
                .iter()
                .filter(|(_, listener)| predicate(listener))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| listeners.remove(key))
                .collect()
        };

        let count = closed.len();
        for listener in closed {
            info!(
                event = events::LISTENER_CLOSE,
                component = COMPONENT,
                listener_key = %listener.key(),
                "closing listener"
            );
            listener.close();
        }
        count
    }

    pub fn contains(&self, key: &ListenerKey) -> bool {
        self.listeners.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Snapshot of registered listeners ordered by key.
    pub fn infos(&self) -> Vec<ListenerInfo> {
        let mut infos: Vec<ListenerInfo> = self
            .listeners
            .read()
            .values()
            .map(Listener::info)
            .collect();
        infos.sort_by_key(ListenerInfo::key);
        infos
    }

    /// Whether an inbound-serving listener exists for `protocol`.
    pub(crate) fn is_serving(&self, protocol: &str) -> bool {
        self.contains(&ListenerKey::inbound(protocol))
    }

    fn serve_context(&self, protocol: &str) -> Option<ServeContext> {
        self.listeners
            .read()
            .get(&ListenerKey::inbound(protocol))
            .and_then(Listener::serve_context)
    }

    /// Hands `channel` to the listener serving its protocol.
    ///
    /// The channel is dropped when that listener was closed after the host's
    /// matcher accepted the protocol.
    pub(crate) async fn dispatch(&self, channel: P2pChannel) {
        let Some(serve) = self.serve_context(channel.protocol()) else {
            debug!(
                event = events::INBOUND_DISPATCH_MISS,
                component = COMPONENT,
                protocol = %channel.protocol(),
                peer = %channel.remote_peer(),
                reason = fields::REASON_NO_SERVING_LISTENER,
                "no serving listener, dropping channel"
            );
            return;
        };

        debug!(
            event = events::INBOUND_DISPATCH,
            component = COMPONENT,
            protocol = %channel.protocol(),
            peer = %channel.remote_peer(),
            "dispatching inbound channel"
        );
        serve.handle_channel(channel).await;
    }
}
