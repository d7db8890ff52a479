/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use stream_forwarder::{
    ChannelWrite, InboundChannelHandler, P2pChannel, P2pHost, PeerId, ProtocolMatcher,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tracing::debug;

const PIPE_CAPACITY: usize = 64 * 1024;

/// A set of in-process hosts that can open channels to each other.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hosts: Arc<Mutex<HashMap<PeerId, Weak<MemoryHost>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host with identity `peer` attached to this network.
    pub fn host(&self, peer: &str) -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost {
            peer: PeerId::new(peer),
            network: self.clone(),
            handlers: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
        });
        self.hosts
            .lock()
            .insert(host.peer.clone(), Arc::downgrade(&host));
        host
    }

    fn lookup(&self, peer: &PeerId) -> Option<Arc<MemoryHost>> {
        self.hosts.lock().get(peer).and_then(Weak::upgrade)
    }
}

#[derive(Clone)]
struct HandlerEntry {
    prefix: String,
    matcher: ProtocolMatcher,
    handler: InboundChannelHandler,
}

/// In-memory [`P2pHost`]. Channels opened to another host of the same network
/// are delivered to that host's installed protocol handler.
pub struct MemoryHost {
    peer: PeerId,
    network: MemoryNetwork,
    handlers: Mutex<Vec<HandlerEntry>>,
    opened: AtomicUsize,
}

impl MemoryHost {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Number of prefixes with an installed handler.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Number of outbound channels this host opened successfully.
    pub fn opened_channels(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Returns the handler claiming `protocol`, if any.
    fn claim(&self, protocol: &str) -> Option<InboundChannelHandler> {
        let handlers = self.handlers.lock().clone();
        handlers
            .into_iter()
            .find(|entry| protocol.starts_with(&entry.prefix) && (entry.matcher)(protocol))
            .map(|entry| entry.handler)
    }
}

#[async_trait]
impl P2pHost for MemoryHost {
    fn local_peer(&self) -> PeerId {
        self.peer.clone()
    }

    async fn open_channel(&self, peer: &PeerId, protocol: &str) -> io::Result<P2pChannel> {
        let remote = self.network.lookup(peer).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("unknown peer {peer}"))
        })?;
        let handler = remote.claim(protocol).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{peer} does not serve {protocol}"),
            )
        })?;

        let (local_end, remote_end) = channel_pair(protocol, &self.peer, peer);
        debug!("{}: opened {protocol} channel to {peer}", self.peer);
        self.opened.fetch_add(1, Ordering::SeqCst);
        handler(remote_end);
        Ok(local_end)
    }

    fn set_stream_handler_match(
        &self,
        prefix: &str,
        matcher: ProtocolMatcher,
        handler: InboundChannelHandler,
    ) {
        let mut handlers = self.handlers.lock();
        handlers.retain(|entry| entry.prefix != prefix);
        handlers.push(HandlerEntry {
            prefix: prefix.to_string(),
            matcher,
            handler,
        });
    }

    fn remove_stream_handler(&self, prefix: &str) {
        self.handlers.lock().retain(|entry| entry.prefix != prefix);
    }
}

/// Builds both ends of a channel between `dialer` and `listener`.
///
/// Each direction is its own pipe, so a reset on one end is observed by the
/// other end's reader as `ConnectionReset` instead of end-of-stream.
pub fn channel_pair(protocol: &str, dialer: &PeerId, listener: &PeerId) -> (P2pChannel, P2pChannel) {
    let (dialer_writer, listener_reader) = one_way_pipe();
    let (listener_writer, dialer_reader) = one_way_pipe();

    let dialer_end = P2pChannel::new(
        protocol,
        listener.clone(),
        Box::new(dialer_reader),
        Box::new(dialer_writer),
    );
    let listener_end = P2pChannel::new(
        protocol,
        dialer.clone(),
        Box::new(listener_reader),
        Box::new(listener_writer),
    );
    (dialer_end, listener_end)
}

fn one_way_pipe() -> (MemoryChannelWriter, MemoryChannelReader) {
    let (write_end, read_end) = tokio::io::duplex(PIPE_CAPACITY);
    let reset = Arc::new(AtomicBool::new(false));
    (
        MemoryChannelWriter {
            inner: Some(write_end),
            reset: reset.clone(),
        },
        MemoryChannelReader {
            inner: read_end,
            reset,
        },
    )
}

pub struct MemoryChannelWriter {
    inner: Option<DuplexStream>,
    reset: Arc<AtomicBool>,
}

impl AsyncWrite for MemoryChannelWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_write(cx, buf),
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl ChannelWrite for MemoryChannelWriter {
    fn reset(&mut self) {
        self.reset.store(true, Ordering::SeqCst);
        self.inner = None;
    }
}

pub struct MemoryChannelReader {
    inner: DuplexStream,
    reset: Arc<AtomicBool>,
}

impl AsyncRead for MemoryChannelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let filled_before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(()))
                if buf.filled().len() == filled_before
                    && buf.remaining() > 0
                    && self.reset.load(Ordering::SeqCst) =>
            {
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "channel reset by remote",
                )))
            }
            other => other,
        }
    }
}
