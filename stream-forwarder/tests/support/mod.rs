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

#![allow(dead_code)]

use integration_test_utils::{MemoryHost, MemoryNetwork, RecordingConnManager};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use stream_forwarder::{P2pTunnels, PeerId, TunnelOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) struct Node {
    pub(crate) host: Arc<MemoryHost>,
    pub(crate) conn_manager: Arc<RecordingConnManager>,
    pub(crate) tunnels: P2pTunnels,
}

impl Node {
    pub(crate) fn peer(&self) -> PeerId {
        self.host.peer().clone()
    }
}

pub(crate) fn make_node(network: &MemoryNetwork, peer: &str, options: TunnelOptions) -> Node {
    let host = network.host(peer);
    let conn_manager = Arc::new(RecordingConnManager::default());
    let tunnels = P2pTunnels::new(host.clone(), conn_manager.clone(), options)
        .expect("tunnels creation should succeed inside a runtime");

    Node {
        host,
        conn_manager,
        tunnels,
    }
}

pub(crate) fn any_local_port() -> SocketAddr {
    "127.0.0.1:0".parse().expect("valid socket address")
}

/// Forwards an OS-assigned local port on `from` to `protocol` on `to`.
pub(crate) async fn forward_to(from: &Node, to: &Node, protocol: &str) -> SocketAddr {
    from.tunnels
        .forward(protocol, any_local_port(), to.peer())
        .await
        .expect("forward should register")
        .listen_addr
        .socket_addr()
        .expect("forward listens on a socket")
}

pub(crate) async fn assert_echo(client: &mut TcpStream, payload: &[u8]) {
    client.write_all(payload).await.expect("client write");
    let mut echoed = vec![0u8; payload.len()];
    client.read_exact(&mut echoed).await.expect("client read");
    assert_eq!(echoed, payload);
}
