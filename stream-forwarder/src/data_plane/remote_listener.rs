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

//! Inbound-serving listener: p2p channels connected to a local target service.

use crate::addr::{PeerId, TunnelAddr};
use crate::data_plane::stream::Stream;
use crate::data_plane::stream_registry::StreamRegistry;
use crate::observability::{events, fields};
use crate::transport::{LocalConn, P2pChannel};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

const COMPONENT: &str = "remote_listener";

/// Serves a protocol on this node. Inbound channels reach it through the
/// listener registry's protocol dispatch.
pub struct RemoteListener {
    local_peer: PeerId,
    serve: ServeContext,
}

/// Everything needed to turn one inbound channel into a stream, detached from
/// the registry lock.
#[derive(Clone)]
pub(crate) struct ServeContext {
    protocol: String,
    target: SocketAddr,
    report_peer_id: bool,
    streams: Arc<StreamRegistry>,
    dial_timeout: Duration,
}

impl RemoteListener {
    pub(crate) fn new(
        protocol: &str,
        local_peer: PeerId,
        target: SocketAddr,
        report_peer_id: bool,
        streams: Arc<StreamRegistry>,
        dial_timeout: Duration,
    ) -> Self {
        Self {
            local_peer,
            serve: ServeContext {
                protocol: protocol.to_string(),
                target,
                report_peer_id,
                streams,
                dial_timeout,
            },
        }
    }

    pub fn protocol(&self) -> &str {
        &self.serve.protocol
    }

    /// This node's peer endpoint.
    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn target(&self) -> SocketAddr {
        self.serve.target
    }

    pub fn report_peer_id(&self) -> bool {
        self.serve.report_peer_id
    }

    pub(crate) fn serve_context(&self) -> ServeContext {
        self.serve.clone()
    }

    pub(crate) fn close(self) {
        debug!(
            event = events::LISTENER_ACCEPT_STOPPED,
            component = COMPONENT,
            protocol = %self.serve.protocol,
            target_addr = %self.serve.target,
            "stopped serving protocol"
        );
    }
}

impl ServeContext {
    /// Connects `channel` to the target, registering the resulting stream.
    ///
    /// The channel is reset when the target cannot be reached or the peer-id
    /// header cannot be written.
    pub(crate) async fn handle_channel(self, channel: P2pChannel) {
        let remote_peer = channel.remote_peer().clone();

        let connected =
            tokio::time::timeout(self.dial_timeout, TcpStream::connect(self.target)).await;
        let conn = match connected {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => {
                warn!(
                    event = events::SERVE_CONNECT_TARGET_FAILED,
                    component = COMPONENT,
                    protocol = %self.protocol,
                    peer = %remote_peer,
                    target_addr = %self.target,
                    err = %err,
                    "failed to connect to target, resetting channel"
                );
                channel.reset();
                return;
            }
            Err(_) => {
                warn!(
                    event = events::SERVE_CONNECT_TARGET_FAILED,
                    component = COMPONENT,
                    protocol = %self.protocol,
                    peer = %remote_peer,
                    target_addr = %self.target,
                    reason = fields::REASON_DIAL_TIMEOUT,
                    "timed out connecting to target, resetting channel"
                );
                channel.reset();
                return;
            }
        };

        let mut local = LocalConn::from_tcp(conn, TunnelAddr::Socket(self.target));
        if self.report_peer_id {
            let header = format!("{remote_peer}\n");
            if let Err(err) = local.writer_mut().write_all(header.as_bytes()).await {
                warn!(
                    event = events::SERVE_REPORT_PEER_FAILED,
                    component = COMPONENT,
                    protocol = %self.protocol,
                    peer = %remote_peer,
                    target_addr = %self.target,
                    err = %err,
                    "failed to report peer id, resetting channel"
                );
                channel.reset();
                return;
            }
        }

        let stream = Stream::new(
            TunnelAddr::Peer(remote_peer),
            TunnelAddr::Socket(self.target),
            local,
            channel,
        );
        self.streams.register(stream);
    }
}
