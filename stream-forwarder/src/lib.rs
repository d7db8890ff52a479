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

//! # stream-forwarder
//!
//! `stream-forwarder` tunnels ordinary byte-stream connections over
//! protocol-tagged channels of a peer-to-peer host.
//!
//! A node can *forward* a local TCP port to a protocol served by a remote peer,
//! and *listen* on a protocol so remote peers reach a local TCP service. Usage is
//! centered on [`P2pTunnels`], which owns the listener registry and the stream
//! registry of one node.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use integration_test_utils::{MemoryNetwork, RecordingConnManager};
//! use stream_forwarder::{ForwardError, P2pTunnels, TunnelOptions};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let network = MemoryNetwork::new();
//! let host = network.host("QmNodeA");
//! let tunnels = P2pTunnels::new(
//!     host,
//!     Arc::new(RecordingConnManager::default()),
//!     TunnelOptions::default(),
//! )
//! .unwrap();
//!
//! let target = "127.0.0.1:8080".parse().unwrap();
//! let info = tunnels.listen("/x/web", target, false).unwrap();
//! assert_eq!(info.key().to_string(), "/x/web/in");
//! assert_eq!(info.listen_addr.to_string(), "/p2p/QmNodeA");
//!
//! // One listener per protocol and direction.
//! assert!(matches!(
//!     tunnels.listen("/x/web", target, true),
//!     Err(ForwardError::AlreadyRegistered(_))
//! ));
//! assert_eq!(tunnels.close_protocol("/x/web"), 1);
//! # });
//! ```
//!
//! ## Architecture map
//!
//! - `control_plane`: listener keys and the conflict-checked
//!   listener registry, including dispatch of inbound channels.
//! - `data_plane`: forwarding and serving listeners, streams
//!   and their copy loops, and the stream registry with per-peer tagging.
//! - [`transport`]: contracts of the p2p host, channels, local connections and the
//!   connection manager.
//!
//! ## Observability
//!
//! All events are emitted through `tracing` with canonical names from
//! `observability::events`. Installing a subscriber is left to the embedding
//! binary.

pub mod addr;
pub mod config;
mod control_plane;
mod data_plane;
#[doc(hidden)]
pub mod observability;
pub mod transport;
mod tunnels;

pub use addr::{AddrParseError, PeerId, TunnelAddr};
pub use config::{
    ConfigError, ForwardRule, ListenRule, TunnelConfig, TunnelOptions, DEFAULT_DIAL_TIMEOUT,
};
pub use control_plane::listener_key::{ListenerDirection, ListenerKey};
pub use control_plane::listener_registry::{ListenerRegistrationError, ListenerRegistry};
pub use data_plane::listener::{Listener, ListenerInfo};
pub use data_plane::local_listener::LocalListener;
pub use data_plane::remote_listener::RemoteListener;
pub use data_plane::stream::{StreamId, StreamInfo, StreamTermination};
pub use data_plane::stream_registry::{StreamRegistry, CONN_MANAGER_TAG, CONN_MANAGER_TAG_WEIGHT};
pub use transport::{
    ChannelReader, ChannelWrite, ChannelWriter, ConnManager, InboundChannelHandler, LocalConn,
    LocalWriter, P2pChannel, P2pHost, ProtocolMatcher,
};
pub use tunnels::{ForwardError, P2pTunnels, PROTOCOL_PREFIX};
