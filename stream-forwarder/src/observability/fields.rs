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

//! Canonical structured field keys and fixed field values.

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const PROTOCOL: &str = "protocol";
pub const DIRECTION: &str = "direction";
pub const LISTENER_KEY: &str = "listener_key";
pub const LISTEN_ADDR: &str = "listen_addr";
pub const TARGET_ADDR: &str = "target_addr";
pub const ORIGIN_ADDR: &str = "origin_addr";
pub const STREAM_ID: &str = "stream_id";
pub const PEER: &str = "peer";
pub const REF_COUNT: &str = "ref_count";
pub const ENDPOINT: &str = "endpoint";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const ENDPOINT_LOCAL: &str = "local";
pub const ENDPOINT_REMOTE: &str = "remote";

pub const REASON_TERMINATED_ELSEWHERE: &str = "terminated_elsewhere";
pub const REASON_DIAL_TIMEOUT: &str = "dial_timeout";
pub const REASON_NO_SERVING_LISTENER: &str = "no_serving_listener";
pub const REASON_REGISTRY_DROPPED: &str = "registry_dropped";
pub const REASON_SHUTDOWN: &str = "shutdown";
