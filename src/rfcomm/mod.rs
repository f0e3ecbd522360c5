//! RFCOMM Session Management
//!
//! This module tracks RFCOMM data-link connections and listening servers.
//! The RFCOMM multiplexer itself (frame encoding, credit flow control)
//! lives in the transport collaborator; what is modelled here is the
//! connection lifecycle the session API exposes: listen/accept, connect,
//! ordered byte exchange, and teardown.

pub mod connection;
pub mod server;

pub use connection::{ConnectionManager, ConnectionState, RfcommConnection};
pub use server::{RfcommServer, ServerManager};

/// Opaque handle identifying one RFCOMM data-link connection
pub type ConnectionHandle = u32;

/// Opaque handle identifying one listening RFCOMM server
pub type ServerHandle = u32;

/// RFCOMM server channel number (1..=30)
pub type ServerChannel = u8;

/// Transport-level identifier of a data link, assigned by the transport
pub type LinkId = u32;

/// Check whether a server channel number is within the valid RFCOMM range
#[must_use]
pub const fn is_valid_channel(channel: ServerChannel) -> bool {
    channel >= crate::constants::RFCOMM_CHANNEL_MIN && channel <= crate::constants::RFCOMM_CHANNEL_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_range() {
        assert!(!is_valid_channel(0));
        assert!(is_valid_channel(1));
        assert!(is_valid_channel(30));
        assert!(!is_valid_channel(31));
    }
}
