//! RFCOMM Server Management
//!
//! A server couples three resources allocated together at start and
//! released together at stop: a listening transport channel, the service
//! record advertising it, and the accept queue inbound links are parked
//! on until an accept call claims them.

use super::{ServerChannel, ServerHandle};
use crate::{SessionError, constants::MAX_SERVERS, sdp::ServiceRecordHandle};
use heapless::FnvIndexMap;

/// One listening RFCOMM server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfcommServer {
    /// Handle callers use to accept on and stop this server
    pub handle: ServerHandle,
    /// Server channel the transport listens on
    pub channel: ServerChannel,
    /// Index of the static accept queue inbound links are parked on
    pub accept_slot: usize,
    /// Handle of the service record advertising this server
    pub record_handle: ServiceRecordHandle,
}

/// RFCOMM Server Manager
///
/// Tracks listening servers by handle and allocates the static accept
/// queue each server's inbound links are routed to.
#[derive(Debug, Default)]
pub struct ServerManager {
    servers: FnvIndexMap<ServerHandle, RfcommServer, MAX_SERVERS>,
    accept_slots: [bool; MAX_SERVERS],
    next_handle: ServerHandle,
}

impl ServerManager {
    /// Create a new server manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            servers: FnvIndexMap::new(),
            accept_slots: [false; MAX_SERVERS],
            next_handle: 1,
        }
    }

    /// Allocate a free accept queue slot
    ///
    /// # Errors
    /// Returns `SessionError::TooManyServers` if all slots are in use.
    pub fn allocate_accept_slot(&mut self) -> Result<usize, SessionError> {
        let slot = self
            .accept_slots
            .iter()
            .position(|used| !used)
            .ok_or(SessionError::TooManyServers)?;
        self.accept_slots[slot] = true;
        Ok(slot)
    }

    /// Release an accept slot without inserting a server
    ///
    /// Used to roll back when a later step of server start-up fails.
    pub fn release_accept_slot(&mut self, slot: usize) {
        if slot < MAX_SERVERS {
            self.accept_slots[slot] = false;
        }
    }

    /// Insert a server under a freshly allocated handle
    ///
    /// # Errors
    /// Returns `SessionError::TooManyServers` if the map is full; the
    /// accept slot is freed again in that case.
    pub fn insert(
        &mut self,
        channel: ServerChannel,
        accept_slot: usize,
        record_handle: ServiceRecordHandle,
    ) -> Result<ServerHandle, SessionError> {
        let handle = self.next_handle;
        let server = RfcommServer {
            handle,
            channel,
            accept_slot,
            record_handle,
        };
        self.servers.insert(handle, server).map_err(|_| {
            self.release_accept_slot(accept_slot);
            SessionError::TooManyServers
        })?;
        self.next_handle = self.next_handle.wrapping_add(1);
        Ok(handle)
    }

    /// Get a server by handle
    #[must_use]
    pub fn get(&self, handle: ServerHandle) -> Option<&RfcommServer> {
        self.servers.get(&handle)
    }

    /// Find the server listening on a channel
    #[must_use]
    pub fn find_by_channel(&self, channel: ServerChannel) -> Option<&RfcommServer> {
        self.servers.values().find(|s| s.channel == channel)
    }

    /// Remove a server, freeing its accept slot
    pub fn remove(&mut self, handle: ServerHandle) -> Option<RfcommServer> {
        let server = self.servers.remove(&handle)?;
        self.release_accept_slot(server.accept_slot);
        Some(server)
    }

    /// Number of listening servers
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut manager = ServerManager::new();
        let slot = manager.allocate_accept_slot().unwrap();
        let handle = manager.insert(5, slot, 0x0001_0000).unwrap();

        let server = manager.get(handle).unwrap();
        assert_eq!(server.channel, 5);
        assert_eq!(server.record_handle, 0x0001_0000);
        assert_eq!(manager.find_by_channel(5), Some(server).copied().as_ref());
        assert!(manager.find_by_channel(6).is_none());
    }

    #[test]
    fn test_handles_distinct() {
        let mut manager = ServerManager::new();
        let slot_a = manager.allocate_accept_slot().unwrap();
        let a = manager.insert(1, slot_a, 0x0001_0000).unwrap();
        let slot_b = manager.allocate_accept_slot().unwrap();
        let b = manager.insert(2, slot_b, 0x0001_0001).unwrap();
        assert_ne!(a, b);
        assert_ne!(slot_a, slot_b);
    }

    #[test]
    fn test_remove_frees_accept_slot() {
        let mut manager = ServerManager::new();
        let slot = manager.allocate_accept_slot().unwrap();
        let handle = manager.insert(3, slot, 0x0001_0000).unwrap();

        let removed = manager.remove(handle).unwrap();
        assert_eq!(removed.accept_slot, slot);
        assert!(manager.get(handle).is_none());
        assert_eq!(manager.allocate_accept_slot().unwrap(), slot);
    }

    #[test]
    fn test_slot_exhaustion() {
        let mut manager = ServerManager::new();
        for _ in 0..MAX_SERVERS {
            manager.allocate_accept_slot().unwrap();
        }
        assert_eq!(
            manager.allocate_accept_slot(),
            Err(SessionError::TooManyServers)
        );
    }

    #[test]
    fn test_failed_start_rolls_back_slot() {
        let mut manager = ServerManager::new();
        let slot = manager.allocate_accept_slot().unwrap();
        manager.release_accept_slot(slot);
        assert_eq!(manager.allocate_accept_slot().unwrap(), slot);
    }
}
