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

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use stream_forwarder::{ConnManager, PeerId};
use tracing::debug;

/// Connection manager that remembers the current tags and counts every call.
#[derive(Default)]
pub struct RecordingConnManager {
    tags: Mutex<HashMap<(PeerId, String), i32>>,
    tag_calls: AtomicUsize,
    untag_calls: AtomicUsize,
}

impl RecordingConnManager {
    /// Weight of `tag` on `peer`, when tagged.
    pub fn tag_weight(&self, peer: &PeerId, tag: &str) -> Option<i32> {
        self.tags
            .lock()
            .get(&(peer.clone(), tag.to_string()))
            .copied()
    }

    pub fn is_tagged(&self, peer: &PeerId, tag: &str) -> bool {
        self.tag_weight(peer, tag).is_some()
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub fn untag_calls(&self) -> usize {
        self.untag_calls.load(Ordering::SeqCst)
    }
}

impl ConnManager for RecordingConnManager {
    fn tag_peer(&self, peer: &PeerId, tag: &str, weight: i32) {
        debug!("tag {peer} {tag}={weight}");
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .insert((peer.clone(), tag.to_string()), weight);
    }

    fn untag_peer(&self, peer: &PeerId, tag: &str) {
        debug!("untag {peer} {tag}");
        self.untag_calls.fetch_add(1, Ordering::SeqCst);
        self.tags.lock().remove(&(peer.clone(), tag.to_string()));
    }
}
