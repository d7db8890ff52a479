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

//! One tunneled connection and its two copy loops.

use crate::addr::{PeerId, TunnelAddr};
use crate::data_plane::stream_registry::StreamRegistry;
use crate::observability::{events, fields};
use crate::transport::{ChannelReader, ChannelWriter, LocalConn, LocalWriter, P2pChannel};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tracing::debug;

const COMPONENT: &str = "stream";

/// Identifier assigned to a stream at registration. Never reused.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Listing snapshot of a registered stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StreamInfo {
    pub id: StreamId,
    pub protocol: String,
    pub origin_addr: TunnelAddr,
    pub target_addr: TunnelAddr,
    pub peer: PeerId,
}

/// Terminal action taken on a stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamTermination {
    /// Both endpoints were shut down gracefully.
    Closed,
    /// The local side was shut down and the remote channel was reset.
    Reset,
}

impl StreamTermination {
    fn as_str(self) -> &'static str {
        match self {
            StreamTermination::Closed => "closed",
            StreamTermination::Reset => "reset",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CopyDirection {
    LocalToRemote,
    RemoteToLocal,
}

impl CopyDirection {
    fn as_str(self) -> &'static str {
        match self {
            CopyDirection::LocalToRemote => "local_to_remote",
            CopyDirection::RemoteToLocal => "remote_to_local",
        }
    }
}

/// A local connection paired with a p2p channel, not yet registered.
pub(crate) struct Stream {
    protocol: String,
    origin_addr: TunnelAddr,
    target_addr: TunnelAddr,
    peer: PeerId,
    local: LocalConn,
    remote: P2pChannel,
}

impl Stream {
    pub(crate) fn new(
        origin_addr: TunnelAddr,
        target_addr: TunnelAddr,
        local: LocalConn,
        remote: P2pChannel,
    ) -> Self {
        Self {
            protocol: remote.protocol().to_string(),
            peer: remote.remote_peer().clone(),
            origin_addr,
            target_addr,
            local,
            remote,
        }
    }

    pub(crate) fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Splits the stream into its listing snapshot and the endpoints driven by the copy loops.
    pub(crate) fn into_endpoints(self, id: StreamId) -> (StreamInfo, StreamEndpoints) {
        let info = StreamInfo {
            id,
            protocol: self.protocol,
            origin_addr: self.origin_addr,
            target_addr: self.target_addr,
            peer: self.peer,
        };
        let (local_reader, local_writer) = self.local.into_split();
        let (remote_reader, remote_writer) = self.remote.into_split();

        let endpoints = StreamEndpoints {
            control: Arc::new(StreamControl::new(id, local_writer, remote_writer)),
            local_reader,
            remote_reader,
        };
        (info, endpoints)
    }
}

/// Readers owned by the copy loops plus the shared teardown control.
pub(crate) struct StreamEndpoints {
    pub(crate) control: Arc<StreamControl>,
    local_reader: ChannelReader,
    remote_reader: ChannelReader,
}

impl StreamEndpoints {
    /// Spawns the local->remote and remote->local copy loops.
    pub(crate) fn start(self, registry: Arc<StreamRegistry>) {
        tokio::spawn(copy_loop(
            self.control.clone(),
            registry.clone(),
            CopyDirection::LocalToRemote,
            self.local_reader,
        ));
        tokio::spawn(copy_loop(
            self.control,
            registry,
            CopyDirection::RemoteToLocal,
            self.remote_reader,
        ));
    }
}

/// Teardown state shared by both copy loops of one stream.
///
/// The writers live here so whichever loop terminates first can shut down both
/// endpoints. The first recorded [`StreamTermination`] wins.
pub(crate) struct StreamControl {
    id: StreamId,
    termination: watch::Sender<Option<StreamTermination>>,
    local_writer: Mutex<Option<LocalWriter>>,
    remote_writer: Mutex<Option<ChannelWriter>>,
}

impl StreamControl {
    fn new(id: StreamId, local_writer: LocalWriter, remote_writer: ChannelWriter) -> Self {
        let (termination, _) = watch::channel(None);
        Self {
            id,
            termination,
            local_writer: Mutex::new(Some(local_writer)),
            remote_writer: Mutex::new(Some(remote_writer)),
        }
    }

    pub(crate) fn termination(&self) -> Option<StreamTermination> {
        *self.termination.borrow()
    }

    /// Records `requested` unless a termination was already recorded; returns the effective one.
    pub(crate) fn record(&self, requested: StreamTermination) -> StreamTermination {
        let mut effective = requested;
        self.termination.send_if_modified(|current| match current {
            Some(existing) => {
                effective = *existing;
                false
            }
            None => {
                *current = Some(requested);
                true
            }
        });
        effective
    }

    /// Gracefully closes both endpoints, then deregisters.
    pub(crate) async fn close(&self, registry: &StreamRegistry) {
        self.finish(StreamTermination::Closed, registry).await;
    }

    /// Closes the local endpoint, resets the remote channel, then deregisters.
    pub(crate) async fn reset(&self, registry: &StreamRegistry) {
        self.finish(StreamTermination::Reset, registry).await;
    }

    async fn finish(&self, requested: StreamTermination, registry: &StreamRegistry) {
        let termination = self.record(requested);
        self.shutdown_endpoints(termination).await;
        registry.deregister(self.id);
    }

    async fn shutdown_endpoints(&self, termination: StreamTermination) {
        let stream_id = self.id.value();

        let local_writer = self.local_writer.lock().await.take();
        if let Some(mut local_writer) = local_writer {
            if let Err(err) = local_writer.shutdown().await {
                debug!(
                    event = events::STREAM_ENDPOINT_SHUTDOWN_FAILED,
                    component = COMPONENT,
                    stream_id,
                    endpoint = fields::ENDPOINT_LOCAL,
                    err = %err,
                    "local endpoint shutdown failed"
                );
            }
        }

        let remote_writer = self.remote_writer.lock().await.take();
        let Some(mut remote_writer) = remote_writer else {
            return;
        };
        match termination {
            StreamTermination::Closed => {
                if let Err(err) = remote_writer.shutdown().await {
                    debug!(
                        event = events::STREAM_ENDPOINT_SHUTDOWN_FAILED,
                        component = COMPONENT,
                        stream_id,
                        endpoint = fields::ENDPOINT_REMOTE,
                        err = %err,
                        "remote endpoint shutdown failed"
                    );
                }
                debug!(
                    event = events::STREAM_CLOSE,
                    component = COMPONENT,
                    stream_id,
                    "stream closed"
                );
            }
            StreamTermination::Reset => {
                remote_writer.reset();
                debug!(
                    event = events::STREAM_RESET,
                    component = COMPONENT,
                    stream_id,
                    "stream reset"
                );
            }
        }
    }

    async fn pump(&self, direction: CopyDirection, reader: &mut ChannelReader) -> io::Result<u64> {
        match direction {
            CopyDirection::LocalToRemote => {
                let mut remote_writer = self.remote_writer.lock().await;
                match remote_writer.as_mut() {
                    Some(writer) => tokio::io::copy(reader, writer).await,
                    None => Ok(0),
                }
            }
            CopyDirection::RemoteToLocal => {
                let mut local_writer = self.local_writer.lock().await;
                match local_writer.as_mut() {
                    Some(writer) => tokio::io::copy(reader, writer).await,
                    None => Ok(0),
                }
            }
        }
    }
}

/// Copies one direction until end-of-stream (close), error (reset), or until the
/// stream is terminated from elsewhere.
async fn copy_loop(
    control: Arc<StreamControl>,
    registry: Arc<StreamRegistry>,
    direction: CopyDirection,
    mut reader: ChannelReader,
) {
    let stream_id = control.id.value();
    let mut termination = control.termination.subscribe();

    let copied = tokio::select! {
        copied = control.pump(direction, &mut reader) => Some(copied),
        _ = termination.wait_for(Option::is_some) => None,
    };

    match copied {
        Some(Ok(bytes)) => {
            debug!(
                event = events::STREAM_COPY_EOF,
                component = COMPONENT,
                stream_id,
                direction = direction.as_str(),
                bytes,
                "copy reached end of stream"
            );
            control.close(&registry).await;
        }
        Some(Err(err)) => {
            debug!(
                event = events::STREAM_COPY_FAILED,
                component = COMPONENT,
                stream_id,
                direction = direction.as_str(),
                err = %err,
                "copy failed"
            );
            control.reset(&registry).await;
        }
        None => {
            let recorded = control.termination().unwrap_or(StreamTermination::Reset);
            debug!(
                event = events::STREAM_COPY_EOF,
                component = COMPONENT,
                stream_id,
                direction = direction.as_str(),
                termination = recorded.as_str(),
                reason = fields::REASON_TERMINATED_ELSEWHERE,
                "copy stopped by stream termination"
            );
            control.finish(recorded, &registry).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StreamId, StreamTermination};
    use crate::data_plane::stream_registry::StreamRegistry;
    use crate::data_plane::test_support::{RecordingConnManager, StreamFixture};
    use std::sync::Arc;

    #[test]
    fn first_recorded_termination_wins() {
        let (stream, _ends) = StreamFixture::new("peer-a").split();
        let (info, endpoints) = stream.into_endpoints(StreamId::new(7));

        assert_eq!(info.id.value(), 7);
        assert_eq!(info.origin_addr.to_string(), "/ip4/127.0.0.1/tcp/40000");
        assert_eq!(info.target_addr.to_string(), "/p2p/peer-a");

        assert_eq!(endpoints.control.termination(), None);
        assert_eq!(
            endpoints.control.record(StreamTermination::Closed),
            StreamTermination::Closed
        );
        assert_eq!(
            endpoints.control.record(StreamTermination::Reset),
            StreamTermination::Closed
        );
        assert_eq!(
            endpoints.control.termination(),
            Some(StreamTermination::Closed)
        );
    }

    #[tokio::test]
    async fn repeated_close_and_reset_only_act_once() {
        let conn_manager = Arc::new(RecordingConnManager::default());
        let registry = Arc::new(StreamRegistry::new(conn_manager.clone()));
        let (stream, ends) = StreamFixture::new("peer-a").split();
        let (_info, endpoints) = stream.into_endpoints(StreamId::new(0));

        endpoints.control.close(&registry).await;
        endpoints.control.reset(&registry).await;
        endpoints.control.close(&registry).await;

        assert_eq!(
            endpoints.control.termination(),
            Some(StreamTermination::Closed)
        );
        assert!(!ends.remote_reset.is_reset());
        assert_eq!(conn_manager.untag_calls(), 0);
    }
}
