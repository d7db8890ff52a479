//! Uniqueness identity for registered listeners.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Which side of the tunnel a listener accepts connections on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerDirection {
    /// Accepts local connections and forwards them to a remote peer.
    Outbound,
    /// Accepts p2p channels and forwards them to a local target.
    Inbound,
}

impl ListenerDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ListenerDirection::Outbound => "out",
            ListenerDirection::Inbound => "in",
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// Registry key of a listener, rendered as `<protocol>/<out|in>`.
///
/// At most one listener per protocol and direction can be registered.
pub struct ListenerKey {
    protocol: String,
    direction: ListenerDirection,
}

impl ListenerKey {
    pub fn new(protocol: &str, direction: ListenerDirection) -> Self {
        Self {
            protocol: protocol.to_string(),
            direction,
        }
    }

    #[inline(always)]
    pub fn outbound(protocol: &str) -> Self {
        Self::new(protocol, ListenerDirection::Outbound)
    }

    #[inline(always)]
    pub fn inbound(protocol: &str) -> Self {
        Self::new(protocol, ListenerDirection::Inbound)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn direction(&self) -> ListenerDirection {
        self.direction
    }
}

impl Display for ListenerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.protocol, self.direction.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ListenerDirection, ListenerKey};

    #[test]
    fn key_renders_protocol_and_direction() {
        assert_eq!(ListenerKey::outbound("echo").to_string(), "echo/out");
        assert_eq!(ListenerKey::inbound("/x/echo").to_string(), "/x/echo/in");
    }

    #[test]
    fn same_protocol_in_both_directions_is_distinct() {
        let outbound = ListenerKey::outbound("/x/echo");
        let inbound = ListenerKey::inbound("/x/echo");

        assert_ne!(outbound, inbound);
        assert_eq!(outbound.protocol(), inbound.protocol());
        assert_eq!(inbound.direction(), ListenerDirection::Inbound);
    }
}
