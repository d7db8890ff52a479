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

//! Boundary contracts consumed from the p2p host, the local network and the
//! connection manager.

use crate::addr::{PeerId, TunnelAddr};
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Read half of a local connection or p2p channel.
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a local connection.
pub type LocalWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write half of a p2p channel.
///
/// Graceful close is `AsyncWriteExt::shutdown`. [`ChannelWrite::reset`] aborts the
/// channel so the remote side observes an error rather than end-of-stream.
pub trait ChannelWrite: AsyncWrite + Send + Unpin {
    fn reset(&mut self);
}

pub type ChannelWriter = Box<dyn ChannelWrite>;

/// Predicate deciding whether an inbound protocol is claimed.
pub type ProtocolMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Receives inbound channels whose protocol was claimed by the matcher.
pub type InboundChannelHandler = Arc<dyn Fn(P2pChannel) + Send + Sync>;

/// A protocol-tagged bidirectional byte channel to one remote peer.
pub struct P2pChannel {
    protocol: String,
    remote_peer: PeerId,
    reader: ChannelReader,
    writer: ChannelWriter,
}

impl P2pChannel {
    pub fn new(
        protocol: impl Into<String>,
        remote_peer: PeerId,
        reader: ChannelReader,
        writer: ChannelWriter,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            remote_peer,
            reader,
            writer,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn remote_peer(&self) -> &PeerId {
        &self.remote_peer
    }

    pub fn into_split(self) -> (ChannelReader, ChannelWriter) {
        (self.reader, self.writer)
    }

    /// Abortively terminates the channel.
    pub fn reset(mut self) {
        self.writer.reset();
    }
}

impl Debug for P2pChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pChannel")
            .field("protocol", &self.protocol)
            .field("remote_peer", &self.remote_peer)
            .finish_non_exhaustive()
    }
}

/// A local network connection split into independently owned halves.
pub struct LocalConn {
    peer_addr: TunnelAddr,
    reader: ChannelReader,
    writer: LocalWriter,
}

impl LocalConn {
    pub fn new(peer_addr: TunnelAddr, reader: ChannelReader, writer: LocalWriter) -> Self {
        Self {
            peer_addr,
            reader,
            writer,
        }
    }

    /// Wraps a TCP connection; `peer_addr` is the address of the other end.
    pub fn from_tcp(stream: TcpStream, peer_addr: TunnelAddr) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(peer_addr, Box::new(reader), Box::new(writer))
    }

    pub fn peer_addr(&self) -> &TunnelAddr {
        &self.peer_addr
    }

    pub(crate) fn writer_mut(&mut self) -> &mut LocalWriter {
        &mut self.writer
    }

    pub fn into_split(self) -> (ChannelReader, LocalWriter) {
        (self.reader, self.writer)
    }
}

impl Debug for LocalConn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConn")
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

/// Peer-to-peer host capability.
#[async_trait]
pub trait P2pHost: Send + Sync {
    /// Identity of this node on the overlay.
    fn local_peer(&self) -> PeerId;

    /// Opens a new outbound channel to `peer` speaking `protocol`.
    async fn open_channel(&self, peer: &PeerId, protocol: &str) -> io::Result<P2pChannel>;

    /// Installs `handler` for inbound protocols starting with `prefix` that `matcher` accepts.
    fn set_stream_handler_match(
        &self,
        prefix: &str,
        matcher: ProtocolMatcher,
        handler: InboundChannelHandler,
    );

    fn remove_stream_handler(&self, prefix: &str);
}

/// Connection-manager capability used to keep tunnel peers connected.
pub trait ConnManager: Send + Sync {
    fn tag_peer(&self, peer: &PeerId, tag: &str, weight: i32);

    fn untag_peer(&self, peer: &PeerId, tag: &str);
}
