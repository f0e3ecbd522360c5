//! RFCOMM Connection Management
//!
//! This module implements per-connection state tracking with the lifecycle
//! state machine enforced by the session API, plus the inbound byte buffer
//! each connection's receive sink fills.

use super::{ConnectionHandle, ServerChannel};
use crate::{BluetoothAddress, SessionError, constants::MAX_CONNECTIONS, constants::MAX_RX_BUFFER};
use heapless::{FnvIndexMap, Vec};

/// RFCOMM Connection State
///
/// `Idle → Connecting → Open → Closing → Closed`. Send and receive are
/// only valid in `Open`; every other state rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, defmt::Format)]
pub enum ConnectionState {
    /// No connection attempt yet
    #[default]
    Idle,
    /// Waiting for the transport handshake to complete
    Connecting,
    /// Data link established, ready for transfer
    Open,
    /// Local or remote teardown initiated, waiting for confirmation
    Closing,
    /// Data link torn down
    Closed,
}

/// One RFCOMM data-link connection
///
/// Owned by the (initiator, acceptor) pair for its lifetime; destroyed on
/// explicit disconnect or peer-initiated teardown.
#[derive(Debug, Clone)]
pub struct RfcommConnection {
    /// Opaque connection handle (the transport's link identifier)
    pub handle: ConnectionHandle,
    /// Index of the static signal slot used to wake waiters
    pub slot: usize,
    /// Server channel the link was accepted on, if inbound
    pub channel: Option<ServerChannel>,
    /// Remote device address, if known (outbound connections)
    pub remote_addr: Option<BluetoothAddress>,
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Inbound bytes delivered by the receive sink, not yet consumed
    rx_buffer: Vec<u8, MAX_RX_BUFFER>,
}

impl RfcommConnection {
    /// Create an outbound connection awaiting handshake completion
    #[must_use]
    pub fn new_outgoing(handle: ConnectionHandle, slot: usize, remote_addr: BluetoothAddress) -> Self {
        Self {
            handle,
            slot,
            channel: None,
            remote_addr: Some(remote_addr),
            state: ConnectionState::Connecting,
            rx_buffer: Vec::new(),
        }
    }

    /// Create an inbound connection, already established by the transport
    #[must_use]
    pub fn new_incoming(handle: ConnectionHandle, slot: usize, channel: ServerChannel) -> Self {
        Self {
            handle,
            slot,
            channel: Some(channel),
            remote_addr: None,
            state: ConnectionState::Open,
            rx_buffer: Vec::new(),
        }
    }

    /// Check if the connection is ready for data transfer
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Verify the connection accepts send/receive in its current state
    ///
    /// # Errors
    /// - `SessionError::ConnectionClosed` in `Closing` or `Closed`
    /// - `SessionError::InvalidState` in `Idle` or `Connecting`
    pub fn check_transfer_allowed(&self) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(SessionError::ConnectionClosed)
            }
            ConnectionState::Idle | ConnectionState::Connecting => Err(SessionError::InvalidState),
        }
    }

    /// Mark the transport handshake as complete
    ///
    /// # Errors
    /// Returns `SessionError::InvalidState` unless currently `Connecting`.
    pub fn open(&mut self) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(SessionError::InvalidState);
        }
        self.state = ConnectionState::Open;
        Ok(())
    }

    /// Begin teardown of the data link
    ///
    /// # Errors
    /// - `SessionError::ConnectionClosed` if teardown already happened
    /// - `SessionError::InvalidState` if no link was ever established
    pub fn begin_close(&mut self) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                self.state = ConnectionState::Closing;
                Ok(())
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(SessionError::ConnectionClosed)
            }
            ConnectionState::Idle => Err(SessionError::InvalidState),
        }
    }

    /// Record transport confirmation of teardown
    pub fn finish_close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Append inbound bytes to the receive buffer
    ///
    /// Bytes past the buffer capacity are dropped; the caller logs the
    /// overflow. Byte order within the connection is preserved.
    ///
    /// Returns the number of bytes actually buffered.
    pub fn push_rx(&mut self, data: &[u8]) -> usize {
        let room = MAX_RX_BUFFER - self.rx_buffer.len();
        let take = data.len().min(room);
        self.rx_buffer.extend_from_slice(&data[..take]).ok();
        take
    }

    /// Take all currently buffered inbound bytes
    #[must_use]
    pub fn take_rx(&mut self) -> Vec<u8, MAX_RX_BUFFER> {
        core::mem::take(&mut self.rx_buffer)
    }

    /// Number of buffered inbound bytes
    #[must_use]
    pub fn rx_len(&self) -> usize {
        self.rx_buffer.len()
    }
}

/// RFCOMM Connection Manager
///
/// Tracks every connection by its opaque handle and allocates the static
/// signal slot each connection's waiters park on. Closed connections stay
/// in the map so late send/receive calls fail with `ConnectionClosed`
/// instead of an unknown-handle error; once every slot is taken, closed
/// connections with drained receive buffers are reclaimed to make room.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: FnvIndexMap<ConnectionHandle, RfcommConnection, MAX_CONNECTIONS>,
    slots: [bool; MAX_CONNECTIONS],
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: FnvIndexMap::new(),
            slots: [false; MAX_CONNECTIONS],
        }
    }

    /// Allocate a free signal slot
    ///
    /// When every slot is in use, closed connections whose receive buffers
    /// are drained are dropped to free theirs up first.
    ///
    /// # Errors
    /// Returns `SessionError::TooManyConnections` if all slots belong to
    /// live connections or closed ones with unread bytes.
    pub fn allocate_slot(&mut self) -> Result<usize, SessionError> {
        if let Some(slot) = self.slots.iter().position(|used| !used) {
            self.slots[slot] = true;
            return Ok(slot);
        }
        self.reclaim_closed();
        let slot = self
            .slots
            .iter()
            .position(|used| !used)
            .ok_or(SessionError::TooManyConnections)?;
        self.slots[slot] = true;
        Ok(slot)
    }

    /// Drop closed connections with drained receive buffers, freeing
    /// their slots
    ///
    /// Entries still holding unread bytes survive so a late receive can
    /// drain them.
    fn reclaim_closed(&mut self) {
        let mut stale: Vec<ConnectionHandle, MAX_CONNECTIONS> = Vec::new();
        for (handle, conn) in &self.connections {
            if conn.state == ConnectionState::Closed && conn.rx_len() == 0 {
                stale.push(*handle).ok();
            }
        }
        for handle in stale {
            self.remove(handle);
        }
    }

    /// Release a slot without inserting a connection
    ///
    /// Used to roll back when a later step of connection setup fails.
    pub fn release_slot(&mut self, slot: usize) {
        if slot < MAX_CONNECTIONS {
            self.slots[slot] = false;
        }
    }

    /// Insert a connection; frees its slot again on failure
    ///
    /// # Errors
    /// Returns `SessionError::TooManyConnections` if the map is full.
    pub fn insert(&mut self, connection: RfcommConnection) -> Result<(), SessionError> {
        let slot = connection.slot;
        self.connections
            .insert(connection.handle, connection)
            .map(|_| ())
            .map_err(|_| {
                self.slots[slot] = false;
                SessionError::TooManyConnections
            })
    }

    /// Get a connection by handle
    #[must_use]
    pub fn get(&self, handle: ConnectionHandle) -> Option<&RfcommConnection> {
        self.connections.get(&handle)
    }

    /// Get a mutable connection by handle
    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut RfcommConnection> {
        self.connections.get_mut(&handle)
    }

    /// Remove a connection, freeing its signal slot
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<RfcommConnection> {
        let connection = self.connections.remove(&handle)?;
        self.slots[connection.slot] = false;
        Some(connection)
    }

    /// Number of tracked connections (any state)
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Count connections currently open for transfer
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.is_open())
            .count()
    }
}
