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

//! Outbound-forwarding listener: local TCP connections tunneled to a remote peer.

use crate::addr::{PeerId, TunnelAddr};
use crate::data_plane::stream::Stream;
use crate::data_plane::stream_registry::StreamRegistry;
use crate::observability::{events, fields};
use crate::transport::{LocalConn, P2pHost};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, warn};

const COMPONENT: &str = "local_listener";

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Source of accepted local connections.
#[async_trait]
trait Accept: Send + 'static {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Accept for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Accepts local connections and opens one p2p channel to `peer` per connection.
pub struct LocalListener {
    protocol: String,
    listen_addr: SocketAddr,
    forward: ForwardContext,
    socket: Option<TcpListener>,
    shutdown: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ForwardContext {
    protocol: String,
    peer: PeerId,
    host: Arc<dyn P2pHost>,
    streams: Arc<StreamRegistry>,
    dial_timeout: Duration,
}

impl LocalListener {
    /// Binds `listen_addr`; the accept loop only runs once [`LocalListener::start`] is called.
    pub(crate) async fn bind(
        protocol: &str,
        listen_addr: SocketAddr,
        peer: PeerId,
        host: Arc<dyn P2pHost>,
        streams: Arc<StreamRegistry>,
        dial_timeout: Duration,
    ) -> io::Result<Self> {
        let socket = TcpListener::bind(listen_addr).await?;
        let listen_addr = socket.local_addr()?;

        Ok(Self {
            protocol: protocol.to_string(),
            listen_addr,
            forward: ForwardContext {
                protocol: protocol.to_string(),
                peer,
                host,
                streams,
                dial_timeout,
            },
            socket: Some(socket),
            shutdown: None,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Bound local address, including an OS-assigned port.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn peer(&self) -> &PeerId {
        &self.forward.peer
    }

    pub(crate) fn start(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);

        tokio::spawn(accept_loop(
            socket,
            self.listen_addr,
            shutdown_rx,
            self.forward.clone(),
        ));
    }

    /// Stops accepting. Streams already registered keep running.
    pub(crate) fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Accepts until shutdown. Accept errors are logged and retried after a backoff,
/// so the listener keeps its key and its port through transient failures.
async fn accept_loop<A: Accept>(
    mut socket: A,
    listen_addr: SocketAddr,
    mut shutdown: oneshot::Receiver<()>,
    forward: ForwardContext,
) {
    loop {
        let accepted = tokio::select! {
            _ = &mut shutdown => break,
            accepted = socket.accept() => accepted,
        };

        match accepted {
            Ok((conn, client_addr)) => {
                let forward = forward.clone();
                tokio::spawn(async move { forward.handle_connection(conn, client_addr).await });
            }
            Err(err) => {
                warn!(
                    event = events::LISTENER_ACCEPT_FAILED,
                    component = COMPONENT,
                    protocol = %forward.protocol,
                    listen_addr = %listen_addr,
                    err = %err,
                    "accept failed, retrying"
                );
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(ACCEPT_RETRY_BACKOFF) => {}
                }
            }
        }
    }

    debug!(
        event = events::LISTENER_ACCEPT_STOPPED,
        component = COMPONENT,
        protocol = %forward.protocol,
        listen_addr = %listen_addr,
        "accept loop stopped"
    );
}

impl ForwardContext {
    async fn handle_connection(self, conn: TcpStream, client_addr: SocketAddr) {
        let opened = tokio::time::timeout(
            self.dial_timeout,
            self.host.open_channel(&self.peer, &self.protocol),
        )
        .await;

        let channel = match opened {
            Ok(Ok(channel)) => channel,
            Ok(Err(err)) => {
                warn!(
                    event = events::FORWARD_OPEN_CHANNEL_FAILED,
                    component = COMPONENT,
                    protocol = %self.protocol,
                    peer = %self.peer,
                    origin_addr = %client_addr,
                    err = %err,
                    "failed to open channel, dropping local connection"
                );
                return;
            }
            Err(_) => {
                warn!(
                    event = events::FORWARD_OPEN_CHANNEL_FAILED,
                    component = COMPONENT,
                    protocol = %self.protocol,
                    peer = %self.peer,
                    origin_addr = %client_addr,
                    reason = fields::REASON_DIAL_TIMEOUT,
                    "timed out opening channel, dropping local connection"
                );
                return;
            }
        };

        let origin_addr = TunnelAddr::Socket(client_addr);
        let local = LocalConn::from_tcp(conn, origin_addr.clone());
        let stream = Stream::new(
            origin_addr,
            TunnelAddr::Peer(self.peer.clone()),
            local,
            channel,
        );
        self.streams.register(stream);
    }
}
