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

//! Per-node tunnel facade owning both registries.

use crate::addr::{PeerId, TunnelAddr};
use crate::config::{TunnelConfig, TunnelOptions};
use crate::control_plane::listener_key::ListenerKey;
use crate::control_plane::listener_registry::{ListenerRegistrationError, ListenerRegistry};
use crate::data_plane::listener::{Listener, ListenerInfo};
use crate::data_plane::local_listener::LocalListener;
use crate::data_plane::remote_listener::RemoteListener;
use crate::data_plane::stream::{StreamId, StreamInfo};
use crate::data_plane::stream_registry::StreamRegistry;
use crate::observability::{events, fields};
use crate::transport::{ConnManager, InboundChannelHandler, P2pChannel, P2pHost, ProtocolMatcher};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

const COMPONENT: &str = "p2p_tunnels";

/// Namespace required for tunnel protocols unless custom protocols are allowed.
pub const PROTOCOL_PREFIX: &str = "/x/";

/// Failures of the tunnel management operations.
#[derive(Debug)]
pub enum ForwardError {
    InvalidProtocol(String),
    AlreadyRegistered(ListenerKey),
    Bind { addr: SocketAddr, source: io::Error },
    UnsupportedAddress(TunnelAddr),
    RuntimeUnavailable,
}

impl Display for ForwardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ForwardError::InvalidProtocol(protocol) => {
                write!(f, "protocol name must start with {PROTOCOL_PREFIX}: {protocol:?}")
            }
            ForwardError::AlreadyRegistered(key) => {
                write!(f, "listener already registered: {key}")
            }
            ForwardError::Bind { addr, source } => {
                write!(f, "failed to listen on {addr}: {source}")
            }
            ForwardError::UnsupportedAddress(addr) => {
                write!(f, "unsupported address for this rule: {addr}")
            }
            ForwardError::RuntimeUnavailable => {
                write!(f, "tunnels must be created inside a tokio runtime")
            }
        }
    }
}

impl Error for ForwardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ForwardError::Bind { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ListenerRegistrationError> for ForwardError {
    fn from(err: ListenerRegistrationError) -> Self {
        match err {
            ListenerRegistrationError::AlreadyRegistered(key) => {
                ForwardError::AlreadyRegistered(key)
            }
        }
    }
}

/// Stream tunneling for one node.
///
/// Installs a protocol handler on the host at construction and removes it on
/// [`P2pTunnels::shutdown`].
pub struct P2pTunnels {
    host: Arc<dyn P2pHost>,
    listeners: Arc<ListenerRegistry>,
    streams: Arc<StreamRegistry>,
    options: TunnelOptions,
    handler_prefix: &'static str,
}

impl P2pTunnels {
    /// Must be called from within a tokio runtime; inbound channels are
    /// dispatched onto it.
    pub fn new(
        host: Arc<dyn P2pHost>,
        conn_manager: Arc<dyn ConnManager>,
        options: TunnelOptions,
    ) -> Result<Self, ForwardError> {
        let runtime = Handle::try_current().map_err(|_| ForwardError::RuntimeUnavailable)?;
        let listeners = Arc::new(ListenerRegistry::new());
        let streams = Arc::new(StreamRegistry::new(conn_manager));
        let handler_prefix = if options.allow_custom_protocol {
            ""
        } else {
            PROTOCOL_PREFIX
        };

        let matcher_registry = Arc::downgrade(&listeners);
        let matcher: ProtocolMatcher = Arc::new(move |protocol: &str| {
            matcher_registry
                .upgrade()
                .is_some_and(|registry| registry.is_serving(protocol))
        });

        let handler_registry = Arc::downgrade(&listeners);
        let handler: InboundChannelHandler = Arc::new(move |channel: P2pChannel| {
            let Some(registry) = handler_registry.upgrade() else {
                debug!(
                    event = events::INBOUND_DISPATCH_MISS,
                    component = COMPONENT,
                    protocol = %channel.protocol(),
                    reason = fields::REASON_REGISTRY_DROPPED,
                    "tunnels dropped, ignoring inbound channel"
                );
                return;
            };
            runtime.spawn(async move { registry.dispatch(channel).await });
        });

        host.set_stream_handler_match(handler_prefix, matcher, handler);
        info!(
            event = events::TUNNELS_START,
            component = COMPONENT,
            local_peer = %host.local_peer(),
            handler_prefix,
            "installed tunnel protocol handler"
        );

        Ok(Self {
            host,
            listeners,
            streams,
            options,
            handler_prefix,
        })
    }

    pub fn options(&self) -> &TunnelOptions {
        &self.options
    }

    pub fn listener_registry(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub fn stream_registry(&self) -> &Arc<StreamRegistry> {
        &self.streams
    }

    fn check_protocol(&self, protocol: &str) -> Result<(), ForwardError> {
        let valid = if self.options.allow_custom_protocol {
            !protocol.is_empty()
        } else {
            protocol.len() > PROTOCOL_PREFIX.len() && protocol.starts_with(PROTOCOL_PREFIX)
        };
        if valid {
            Ok(())
        } else {
            Err(ForwardError::InvalidProtocol(protocol.to_string()))
        }
    }

    /// Listens on `listen_addr` and tunnels each accepted connection to `peer`.
    ///
    /// Port `0` binds an OS-assigned port; the returned info carries the bound address.
    pub async fn forward(
        &self,
        protocol: &str,
        listen_addr: SocketAddr,
        peer: PeerId,
    ) -> Result<ListenerInfo, ForwardError> {
        self.check_protocol(protocol)?;
        let listener = LocalListener::bind(
            protocol,
            listen_addr,
            peer,
            self.host.clone(),
            self.streams.clone(),
            self.options.dial_timeout,
        )
        .await
        .map_err(|source| ForwardError::Bind {
            addr: listen_addr,
            source,
        })?;

        Ok(self.listeners.register(listener)?)
    }

    /// Serves `protocol`, connecting each inbound channel to `target`.
    ///
    /// With `report_peer_id` the remote peer id and a newline are written to the
    /// target connection before any tunneled bytes.
    pub fn listen(
        &self,
        protocol: &str,
        target: SocketAddr,
        report_peer_id: bool,
    ) -> Result<ListenerInfo, ForwardError> {
        self.check_protocol(protocol)?;
        let listener = RemoteListener::new(
            protocol,
            self.host.local_peer(),
            target,
            report_peer_id,
            self.streams.clone(),
            self.options.dial_timeout,
        );

        Ok(self.listeners.register(listener)?)
    }

    /// Closes every listener matching `predicate`; running streams are untouched.
    pub fn close_listeners<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&Listener) -> bool,
    {
        self.listeners.close(predicate)
    }

    /// Closes both directions of `protocol`.
    pub fn close_protocol(&self, protocol: &str) -> usize {
        self.listeners.close(|listener| listener.protocol() == protocol)
    }

    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.listeners.infos()
    }

    pub fn streams(&self) -> Vec<StreamInfo> {
        self.streams.streams()
    }

    /// Resets one stream. Returns `false` when no such stream is registered.
    pub fn close_stream(&self, id: StreamId) -> bool {
        self.streams.reset_stream(id)
    }

    pub fn close_all_streams(&self) -> usize {
        self.streams.reset_all()
    }

    /// Registers every rule of `config`, stopping at the first failure.
    ///
    /// Rules registered before a failure stay registered. The config's option
    /// switches apply through [`TunnelConfig::options`] at construction.
    pub async fn apply_config(
        &self,
        config: &TunnelConfig,
    ) -> Result<Vec<ListenerInfo>, ForwardError> {
        let mut registered = Vec::with_capacity(config.forwards.len() + config.listens.len());

        for rule in &config.forwards {
            let listen_addr = rule
                .listen
                .socket_addr()
                .ok_or_else(|| ForwardError::UnsupportedAddress(rule.listen.clone()))?;
            let peer = rule
                .target
                .peer()
                .cloned()
                .ok_or_else(|| ForwardError::UnsupportedAddress(rule.target.clone()))?;
            registered.push(self.forward(&rule.protocol, listen_addr, peer).await?);
        }

        for rule in &config.listens {
            let target = rule
                .target
                .socket_addr()
                .ok_or_else(|| ForwardError::UnsupportedAddress(rule.target.clone()))?;
            registered.push(self.listen(&rule.protocol, target, rule.report_peer_id)?);
        }

        info!(
            event = events::CONFIG_APPLY,
            component = COMPONENT,
            forwards = config.forwards.len(),
            listens = config.listens.len(),
            "applied tunnel config"
        );
        Ok(registered)
    }

    /// Closes all listeners, resets all streams and removes the protocol handler.
    pub fn shutdown(&self) {
        let listeners_closed = self.listeners.close(|_| true);
        let streams_reset = self.streams.reset_all();
        self.host.remove_stream_handler(self.handler_prefix);

        info!(
            event = events::TUNNELS_SHUTDOWN,
            component = COMPONENT,
            listeners_closed,
            streams_reset,
            reason = fields::REASON_SHUTDOWN,
            "tunnels shut down"
        );
    }
}
