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

mod support;

use integration_test_utils::{spawn_echo_server, MemoryNetwork};
use stream_forwarder::{ForwardError, ListenerDirection, ListenerKey, TunnelOptions};
use support::{any_local_port, assert_echo, forward_to, make_node};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

fn custom_protocols() -> TunnelOptions {
    TunnelOptions::default().with_allow_custom_protocol(true)
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_outbound_key_fails_and_first_listener_keeps_serving() {
    integration_test_utils::init_logging();

    let network = MemoryNetwork::new();
    let node_a = make_node(&network, "QmNodeA", custom_protocols());
    let node_b = make_node(&network, "QmNodeB", custom_protocols());

    let (echo_addr, _echo) = spawn_echo_server().await;
    node_b
        .tunnels
        .listen("echo", echo_addr, false)
        .expect("listen should register");
    let entry = forward_to(&node_a, &node_b, "echo").await;

    let duplicate = node_a
        .tunnels
        .forward("echo", any_local_port(), node_b.peer())
        .await;
    match duplicate {
        Err(ForwardError::AlreadyRegistered(key)) => {
            assert_eq!(key.to_string(), "echo/out");
        }
        other => panic!("expected duplicate key error, got {other:?}"),
    }

    let listeners = node_a.tunnels.listeners();
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].listen_addr.socket_addr(), Some(entry));

    let mut client = TcpStream::connect(entry).await.expect("connect to forward");
    assert_echo(&mut client, b"still forwarding").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn close_by_protocol_closes_both_directions_and_keeps_other() {
    integration_test_utils::init_logging();

    let network = MemoryNetwork::new();
    let node_a = make_node(&network, "QmNodeA", custom_protocols());
    let node_b = make_node(&network, "QmNodeB", custom_protocols());

    let (echo_addr, _echo) = spawn_echo_server().await;
    node_a
        .tunnels
        .listen("echo", echo_addr, false)
        .expect("listen echo");
    node_a
        .tunnels
        .listen("other", echo_addr, false)
        .expect("listen other");
    node_b
        .tunnels
        .listen("echo", echo_addr, false)
        .expect("listen echo on b");
    forward_to(&node_a, &node_b, "echo").await;

    let closed = node_a
        .tunnels
        .close_listeners(|listener| listener.protocol() == "echo");
    assert_eq!(closed, 2);

    let keys: Vec<ListenerKey> = node_a
        .tunnels
        .listeners()
        .iter()
        .map(|info| info.key())
        .collect();
    assert_eq!(keys, vec![ListenerKey::new("other", ListenerDirection::Inbound)]);

    // "other" is still reachable from a remote peer.
    let other_entry = forward_to(&node_b, &node_a, "other").await;
    let mut client = TcpStream::connect(other_entry).await.expect("connect other");
    assert_echo(&mut client, b"other works").await;

    // "echo" is no longer served, so the forwarding side drops the connection.
    let echo_entry = forward_to(&node_b, &node_a, "echo").await;
    let mut refused = TcpStream::connect(echo_entry).await.expect("connect echo");
    let mut rest = Vec::new();
    let _ = refused.read_to_end(&mut rest).await;
    assert!(rest.is_empty());
    assert_eq!(node_b.tunnels.streams().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_a_listener_keeps_its_streams_running() {
    integration_test_utils::init_logging();

    let network = MemoryNetwork::new();
    let node_a = make_node(&network, "QmNodeA", TunnelOptions::default());
    let node_b = make_node(&network, "QmNodeB", TunnelOptions::default());

    let (echo_addr, _echo) = spawn_echo_server().await;
    node_b
        .tunnels
        .listen("/x/echo", echo_addr, false)
        .expect("listen should register");
    let entry = forward_to(&node_a, &node_b, "/x/echo").await;

    let mut client = TcpStream::connect(entry).await.expect("connect to forward");
    assert_echo(&mut client, b"before close").await;

    assert_eq!(node_a.tunnels.close_protocol("/x/echo"), 1);
    assert_eq!(node_b.tunnels.close_protocol("/x/echo"), 1);

    assert_echo(&mut client, b"after close").await;
    assert_eq!(node_a.tunnels.streams().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn protocols_outside_namespace_need_opt_in() {
    integration_test_utils::init_logging();

    let network = MemoryNetwork::new();
    let node = make_node(&network, "QmNodeA", TunnelOptions::default());

    let err = node
        .tunnels
        .forward("echo", any_local_port(), "QmNodeB".into())
        .await
        .expect_err("plain protocol names are rejected");
    assert!(matches!(err, ForwardError::InvalidProtocol(_)));
    assert_eq!(err.to_string(), "protocol name must start with /x/: \"echo\"");
    assert!(node.tunnels.listeners().is_empty());
}
