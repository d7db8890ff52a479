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

//! In-memory endpoints shared by data-plane unit tests.

use crate::addr::{PeerId, TunnelAddr};
use crate::data_plane::stream::Stream;
use crate::transport::{
    ChannelWrite, ConnManager, InboundChannelHandler, LocalConn, P2pChannel, P2pHost,
    ProtocolMatcher,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf, WriteHalf};
use tokio::sync::mpsc;

pub(crate) const TEST_PROTOCOL: &str = "/x/test";
pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Connection manager that remembers the current tags and counts every call.
#[derive(Default)]
pub(crate) struct RecordingConnManager {
    tags: Mutex<HashMap<(PeerId, String), i32>>,
    tag_calls: AtomicUsize,
    untag_calls: AtomicUsize,
}

impl RecordingConnManager {
    /// Weight of `tag` on `peer`, when tagged.
    pub(crate) fn tag_weight(&self, peer: &PeerId, tag: &str) -> Option<i32> {
        self.tags
            .lock()
            .get(&(peer.clone(), tag.to_string()))
            .copied()
    }

    pub(crate) fn is_tagged(&self, peer: &PeerId, tag: &str) -> bool {
        self.tag_weight(peer, tag).is_some()
    }

    pub(crate) fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn untag_calls(&self) -> usize {
        self.untag_calls.load(Ordering::SeqCst)
    }
}

impl ConnManager for RecordingConnManager {
    fn tag_peer(&self, peer: &PeerId, tag: &str, weight: i32) {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .insert((peer.clone(), tag.to_string()), weight);
    }

    fn untag_peer(&self, peer: &PeerId, tag: &str) {
        self.untag_calls.fetch_add(1, Ordering::SeqCst);
        self.tags.lock().remove(&(peer.clone(), tag.to_string()));
    }
}

#[derive(Clone, Default)]
pub(crate) struct ResetFlag(Arc<AtomicBool>);

impl ResetFlag {
    pub(crate) fn is_reset(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Channel writer over one half of a duplex pipe that records resets.
pub(crate) struct FlaggedWriter {
    inner: Option<WriteHalf<DuplexStream>>,
    flag: ResetFlag,
}

impl FlaggedWriter {
    pub(crate) fn new(inner: WriteHalf<DuplexStream>, flag: ResetFlag) -> Self {
        Self {
            inner: Some(inner),
            flag,
        }
    }
}

impl AsyncWrite for FlaggedWriter {
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

impl ChannelWrite for FlaggedWriter {
    fn reset(&mut self) {
        self.flag.0.store(true, Ordering::SeqCst);
        self.inner = None;
    }
}

/// Reader that fails on first poll, standing in for a connection reset by its peer.
pub(crate) struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "channel reset by remote",
        )))
    }
}

/// Test-side ends of a fixture stream.
pub(crate) struct FixtureEnds {
    /// The local application's side of the forwarded connection.
    pub(crate) local: DuplexStream,
    /// The remote peer's side of the p2p channel.
    pub(crate) remote: DuplexStream,
    pub(crate) remote_reset: ResetFlag,
}

/// Builds a [`Stream`] whose local connection and p2p channel are in-memory pipes.
pub(crate) struct StreamFixture {
    peer: PeerId,
    failing_local_reader: bool,
    failing_remote_reader: bool,
}

impl StreamFixture {
    pub(crate) fn new(peer: &str) -> Self {
        Self {
            peer: PeerId::new(peer),
            failing_local_reader: false,
            failing_remote_reader: false,
        }
    }

    pub(crate) fn failing_local_reader(mut self) -> Self {
        self.failing_local_reader = true;
        self
    }

    pub(crate) fn failing_remote_reader(mut self) -> Self {
        self.failing_remote_reader = true;
        self
    }

    pub(crate) fn split(self) -> (Stream, FixtureEnds) {
        let (local_app, local_fwd) = tokio::io::duplex(1024);
        let (local_reader, local_writer) = tokio::io::split(local_fwd);
        let origin = TunnelAddr::Socket(([127, 0, 0, 1], 40000).into());
        let local = if self.failing_local_reader {
            LocalConn::new(origin, Box::new(FailingReader), Box::new(local_writer))
        } else {
            LocalConn::new(origin, Box::new(local_reader), Box::new(local_writer))
        };

        let (remote_peer, remote_fwd) = tokio::io::duplex(1024);
        let (remote_reader, remote_writer) = tokio::io::split(remote_fwd);
        let remote_reset = ResetFlag::default();
        let writer = FlaggedWriter::new(remote_writer, remote_reset.clone());
        let remote = if self.failing_remote_reader {
            P2pChannel::new(
                TEST_PROTOCOL,
                self.peer.clone(),
                Box::new(FailingReader),
                Box::new(writer),
            )
        } else {
            P2pChannel::new(
                TEST_PROTOCOL,
                self.peer.clone(),
                Box::new(remote_reader),
                Box::new(writer),
            )
        };

        let stream = Stream::new(
            local.peer_addr().clone(),
            TunnelAddr::Peer(self.peer),
            local,
            remote,
        );
        let ends = FixtureEnds {
            local: local_app,
            remote: remote_peer,
            remote_reset,
        };
        (stream, ends)
    }
}

/// Host side of a channel opened through [`PipeHost`].
pub(crate) struct OpenedChannel {
    pub(crate) protocol: String,
    pub(crate) peer: PeerId,
    /// The remote peer's side of the channel.
    pub(crate) pipe: DuplexStream,
    pub(crate) reset: ResetFlag,
}

/// Host whose outbound channels are in-memory pipes handed to the test.
pub(crate) struct PipeHost {
    local_peer: PeerId,
    refuse: bool,
    opened_tx: mpsc::UnboundedSender<OpenedChannel>,
    opened_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<OpenedChannel>>,
}

impl PipeHost {
    pub(crate) fn new(local_peer: &str) -> Self {
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        Self {
            local_peer: PeerId::new(local_peer),
            refuse: false,
            opened_tx,
            opened_rx: tokio::sync::Mutex::new(opened_rx),
        }
    }

    /// Makes every `open_channel` call fail.
    pub(crate) fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) async fn next_opened(&self) -> OpenedChannel {
        self.opened_rx
            .lock()
            .await
            .recv()
            .await
            .expect("host should have opened a channel")
    }
}

#[async_trait]
impl P2pHost for PipeHost {
    fn local_peer(&self) -> PeerId {
        self.local_peer.clone()
    }

    async fn open_channel(&self, peer: &PeerId, protocol: &str) -> io::Result<P2pChannel> {
        if self.refuse {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "peer unreachable",
            ));
        }

        let (pipe, channel_end) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(channel_end);
        let reset = ResetFlag::default();
        let _ = self.opened_tx.send(OpenedChannel {
            protocol: protocol.to_string(),
            peer: peer.clone(),
            pipe,
            reset: reset.clone(),
        });

        Ok(P2pChannel::new(
            protocol,
            peer.clone(),
            Box::new(reader),
            Box::new(FlaggedWriter::new(writer, reset)),
        ))
    }

    fn set_stream_handler_match(
        &self,
        _prefix: &str,
        _matcher: ProtocolMatcher,
        _handler: InboundChannelHandler,
    ) {
    }

    fn remove_stream_handler(&self, _prefix: &str) {}
}

/// Builds an inbound channel from `peer`, returning it with the remote side's pipe.
pub(crate) fn inbound_channel(protocol: &str, peer: &str) -> (P2pChannel, DuplexStream, ResetFlag) {
    let (pipe, channel_end) = tokio::io::duplex(1024);
    let (reader, writer) = tokio::io::split(channel_end);
    let reset = ResetFlag::default();
    let channel = P2pChannel::new(
        protocol,
        PeerId::new(peer),
        Box::new(reader),
        Box::new(FlaggedWriter::new(writer, reset.clone())),
    );
    (channel, pipe, reset)
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub(crate) async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
