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

//! Live stream registry with per-peer reference counting.
//!
//! The first stream to a peer tags it in the connection manager and the last
//! one to go away untags it. Counting and tagging happen under the same lock so
//! concurrent register/deregister for one peer cannot interleave a tag with an
//! untag.

use crate::addr::PeerId;
use crate::data_plane::stream::{Stream, StreamControl, StreamId, StreamInfo, StreamTermination};
use crate::observability::events;
use crate::transport::ConnManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "stream_registry";

/// Tag applied to peers that carry at least one tunneled stream.
pub const CONN_MANAGER_TAG: &str = "stream-fwd";

/// Weight of [`CONN_MANAGER_TAG`].
pub const CONN_MANAGER_TAG_WEIGHT: i32 = 20;

struct StreamEntry {
    info: StreamInfo,
    control: Arc<StreamControl>,
}

#[derive(Default)]
struct StreamTable {
    streams: HashMap<StreamId, StreamEntry>,
    peer_refs: HashMap<PeerId, usize>,
    next_id: u64,
}

/// Tracks every live stream and the number of streams per remote peer.
pub struct StreamRegistry {
    table: Mutex<StreamTable>,
    conn_manager: Arc<dyn ConnManager>,
}

impl StreamRegistry {
    pub fn new(conn_manager: Arc<dyn ConnManager>) -> Self {
        Self {
            table: Mutex::new(StreamTable::default()),
            conn_manager,
        }
    }

    /// Registers `stream`, tags its peer and starts both copy loops.
    pub(crate) fn register(self: &Arc<Self>, stream: Stream) -> StreamId {
        let peer = stream.peer().clone();

        let (info, endpoints, ref_count) = {
            let mut table = self.table.lock();
            let id = StreamId::new(table.next_id);
            table.next_id += 1;

            self.conn_manager
                .tag_peer(&peer, CONN_MANAGER_TAG, CONN_MANAGER_TAG_WEIGHT);
            let ref_count = {
                let count = table.peer_refs.entry(peer.clone()).or_insert(0);
                *count += 1;
                *count
            };

            let (info, endpoints) = stream.into_endpoints(id);
            table.streams.insert(
                id,
                StreamEntry {
                    info: info.clone(),
                    control: endpoints.control.clone(),
                },
            );
            (info, endpoints, ref_count)
        };

        debug!(
            event = events::STREAM_REGISTER,
            component = COMPONENT,
            stream_id = info.id.value(),
            protocol = %info.protocol,
            origin_addr = %info.origin_addr,
            target_addr = %info.target_addr,
            peer = %peer,
            ref_count,
            "registered stream"
        );
        if ref_count == 1 {
            debug!(
                event = events::PEER_TAG,
                component = COMPONENT,
                peer = %peer,
                "tagged peer for its first stream"
            );
        }

        endpoints.start(Arc::clone(self));
        info.id
    }

    /// Removes the stream if present and releases its peer reference.
    ///
    /// Returns `false` when the stream was already gone; repeated calls never
    /// touch the peer count twice.
    pub fn deregister(&self, id: StreamId) -> bool {
        let mut table = self.table.lock();
        let Some(entry) = table.streams.remove(&id) else {
            debug!(
                event = events::STREAM_DEREGISTER_UNKNOWN,
                component = COMPONENT,
                stream_id = id.value(),
                "stream already deregistered"
            );
            return false;
        };

        let peer = &entry.info.peer;
        let ref_count = match table.peer_refs.get_mut(peer) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                table.peer_refs.remove(peer);
                self.conn_manager.untag_peer(peer, CONN_MANAGER_TAG);
                debug!(
                    event = events::PEER_UNTAG,
                    component = COMPONENT,
                    peer = %peer,
                    "untagged peer with no remaining streams"
                );
                0
            }
            None => {
                warn!(
                    event = events::PEER_COUNT_UNDERFLOW,
                    component = COMPONENT,
                    stream_id = id.value(),
                    peer = %peer,
                    "peer stream count missing on deregister"
                );
                0
            }
        };

        debug!(
            event = events::STREAM_DEREGISTER,
            component = COMPONENT,
            stream_id = id.value(),
            peer = %peer,
            ref_count,
            "deregistered stream"
        );
        true
    }

    /// Snapshot of live streams ordered by id.
    pub fn streams(&self) -> Vec<StreamInfo> {
        let table = self.table.lock();
        let mut streams: Vec<StreamInfo> =
            table.streams.values().map(|entry| entry.info.clone()).collect();
        streams.sort_by_key(|info| info.id);
        streams
    }

    pub fn get(&self, id: StreamId) -> Option<StreamInfo> {
        self.table
            .lock()
            .streams
            .get(&id)
            .map(|entry| entry.info.clone())
    }

    /// Number of live streams to `peer`.
    pub fn peer_stream_count(&self, peer: &PeerId) -> usize {
        self.table.lock().peer_refs.get(peer).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.table.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().streams.is_empty()
    }

    /// Asks the stream's copy loops to reset it. Returns `false` for unknown ids.
    ///
    /// Teardown and deregistration complete asynchronously on the copy loops.
    pub fn reset_stream(&self, id: StreamId) -> bool {
        let control = self
            .table
            .lock()
            .streams
            .get(&id)
            .map(|entry| entry.control.clone());
        match control {
            Some(control) => {
                control.record(StreamTermination::Reset);
                true
            }
            None => false,
        }
    }

    /// Asks every live stream to reset; returns how many were signalled.
    pub fn reset_all(&self) -> usize {
        let controls: Vec<Arc<StreamControl>> = self
            .table
            .lock()
            .streams
            .values()
            .map(|entry| entry.control.clone())
            .collect();
        for control in &controls {
            control.record(StreamTermination::Reset);
        }
        controls.len()
    }
}
