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

//! Data-plane runtime: listeners that accept connections and the streams that
//! copy bytes between a local connection and a p2p channel.
//!
//! A [`listener::Listener`] turns every accepted connection or inbound channel
//! into a [`stream::Stream`]. [`stream_registry::StreamRegistry`] owns each
//! registered stream until one of its two copy loops tears it down.

pub(crate) mod listener;
pub(crate) mod local_listener;
pub(crate) mod remote_listener;
pub(crate) mod stream;
pub(crate) mod stream_registry;

#[cfg(test)]
pub(crate) mod test_support;
