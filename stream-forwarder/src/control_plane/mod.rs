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

//! Control-plane state: which listeners exist and which inbound protocols are
//! served.
//!
//! Keys are unique per protocol and direction, so a node can both forward to
//! and serve the same protocol, but never twice in one direction.

pub(crate) mod listener_key;
pub(crate) mod listener_registry;
