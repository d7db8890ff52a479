//! Canonical structured event names used across `stream-forwarder`.

// Listener registry and accept-loop events.
pub const LISTENER_REGISTER_OK: &str = "listener_register_ok";
pub const LISTENER_REGISTER_CONFLICT: &str = "listener_register_conflict";
pub const LISTENER_CLOSE: &str = "listener_close";
pub const LISTENER_ACCEPT_FAILED: &str = "listener_accept_failed";
pub const LISTENER_ACCEPT_STOPPED: &str = "listener_accept_stopped";

// Outbound-forwarding and inbound-serving setup events.
pub const FORWARD_OPEN_CHANNEL_FAILED: &str = "forward_open_channel_failed";
pub const SERVE_CONNECT_TARGET_FAILED: &str = "serve_connect_target_failed";
pub const SERVE_REPORT_PEER_FAILED: &str = "serve_report_peer_failed";
pub const INBOUND_DISPATCH: &str = "inbound_dispatch";
pub const INBOUND_DISPATCH_MISS: &str = "inbound_dispatch_miss";

// Stream lifecycle events.
pub const STREAM_REGISTER: &str = "stream_register";
pub const STREAM_COPY_EOF: &str = "stream_copy_eof";
pub const STREAM_COPY_FAILED: &str = "stream_copy_failed";
pub const STREAM_CLOSE: &str = "stream_close";
pub const STREAM_RESET: &str = "stream_reset";
pub const STREAM_DEREGISTER: &str = "stream_deregister";
pub const STREAM_DEREGISTER_UNKNOWN: &str = "stream_deregister_unknown";
pub const STREAM_ENDPOINT_SHUTDOWN_FAILED: &str = "stream_endpoint_shutdown_failed";

// Connection-manager tagging events.
pub const PEER_TAG: &str = "peer_tag";
pub const PEER_UNTAG: &str = "peer_untag";
pub const PEER_COUNT_UNDERFLOW: &str = "peer_count_underflow";

// Facade lifecycle events.
pub const TUNNELS_START: &str = "tunnels_start";
pub const TUNNELS_SHUTDOWN: &str = "tunnels_shutdown";
pub const CONFIG_APPLY: &str = "config_apply";
