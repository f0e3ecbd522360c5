#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(dead_code, clippy::unused_async, clippy::too_many_lines)]

mod address;
pub mod api;
pub mod constants;
pub mod opp;
pub mod processor;
pub mod rfcomm;
pub mod sdp;
pub mod transport;

use crate::constants::{
    API_CHANNEL_DEPTH, MAX_CONNECTIONS, MAX_FRAME, MAX_PENDING_ACCEPTS, MAX_SERVERS,
    MAX_SERVICE_NAME_LENGTH, SERVICE_RECORD_HANDLE_RANGE_START,
};
use crate::rfcomm::{
    ConnectionHandle, ConnectionManager, ServerChannel, ServerHandle, ServerManager,
};
use crate::sdp::{SdpError, ServiceRecordHandle, ServiceRecordRegistry, ServiceUuid};
use crate::transport::TransportError;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    mutex::{MappedMutexGuard, Mutex, MutexGuard},
};
use heapless::{String, Vec};

pub use address::BluetoothAddress;

pub(crate) static REQUEST_CHANNEL: Channel<CriticalSectionRawMutex, ApiRequest, API_CHANNEL_DEPTH> =
    Channel::new();

/// Per-request reply slots.
///
/// Every request carries the index of the signal its response is
/// delivered on, so concurrent callers can never receive each other's
/// responses. Free indices circulate through the pool, seeded once at
/// host initialization.
pub(crate) static REPLY_SIGNALS: [Signal<CriticalSectionRawMutex, Response>; API_CHANNEL_DEPTH] =
    [const { Signal::new() }; API_CHANNEL_DEPTH];

pub(crate) static REPLY_SLOT_POOL: Channel<CriticalSectionRawMutex, usize, API_CHANNEL_DEPTH> =
    Channel::new();

/// Per-server queues of inbound connections awaiting an accept call.
///
/// The processor pushes established inbound links here, tagged with the
/// owning server's handle; accept calls pop them in arrival order without
/// holding the host lock. The tag lets a waiter parked since before the
/// slot was recycled recognize that its server is gone and hand the link
/// back.
pub(crate) static ACCEPT_QUEUES: [Channel<
    CriticalSectionRawMutex,
    (ServerHandle, ConnectionHandle),
    MAX_PENDING_ACCEPTS,
>; MAX_SERVERS] = [const { Channel::new() }; MAX_SERVERS];

/// Per-connection wakeups for state or receive-buffer changes.
///
/// Indexed by the connection's signal slot. Waiters re-check the
/// connection under the host lock after each wakeup.
pub(crate) static CONNECTION_SIGNALS: [Signal<CriticalSectionRawMutex, ()>; MAX_CONNECTIONS] =
    [const { Signal::new() }; MAX_CONNECTIONS];

/// Global `SessionHost`, initialized by client at runtime
pub(crate) static SESSION_HOST: Mutex<CriticalSectionRawMutex, Option<SessionHost>> =
    Mutex::new(None);

/// Initialize the global `SessionHost` with the given options.
///
/// This function must be called before using any API functions or spawning
/// the processor task.
///
/// # Errors
///
/// This function will return an error if the `SessionHost` has already been
/// initialized.
pub async fn init_session_host(options: SessionHostOptions) -> Result<(), &'static str> {
    let mut guard = SESSION_HOST.lock().await;
    if guard.is_some() {
        return Err("SessionHost already initialized");
    }
    *guard = Some(SessionHost::with_options(options));
    for slot in 0..API_CHANNEL_DEPTH {
        REPLY_SLOT_POOL.sender().try_send(slot).ok();
    }
    Ok(())
}

/// Get a locked reference to the global `SessionHost`.
///
/// Returns a mapped mutex guard with direct access to the host. Primarily
/// intended for the processor task; API users should use the functions in
/// the `api` module instead.
///
/// # Errors
///
/// This function will return an error if the `SessionHost` has not been
/// initialized.
///
/// # Panics
///
/// This function panics if the mutex guard cannot be mapped (should never
/// happen in practice).
pub async fn session_host<'a>()
-> Result<MappedMutexGuard<'a, CriticalSectionRawMutex, SessionHost>, &'static str> {
    let guard = SESSION_HOST.lock().await;
    if guard.is_none() {
        return Err("SessionHost not initialized");
    }
    Ok(MutexGuard::map(guard, |opt| opt.as_mut().unwrap()))
}

/// Session-layer errors with detailed error information
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum SessionError {
    /// No free service record handle remains in the allocatable range
    HandleExhausted,
    /// Outbound connection attempt was refused or timed out
    ConnectFailed,
    /// Operation not valid in the connection's current state
    InvalidState,
    /// Connection was torn down, locally or by the remote
    ConnectionClosed,
    /// Invalid parameter provided (e.g., malformed address)
    InvalidParameter,
    /// All server slots are in use
    TooManyServers,
    /// All connection slots are in use
    TooManyConnections,
    /// Transport layer failure
    Transport,
    /// `SessionHost` has not been initialized
    NotInitialized,
    /// Service record construction or registration failed
    Sdp(SdpError),
}

impl From<SdpError> for SessionError {
    fn from(e: SdpError) -> Self {
        match e {
            SdpError::HandleExhausted => Self::HandleExhausted,
            other => Self::Sdp(other),
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(_: TransportError) -> Self {
        Self::Transport
    }
}

/// Options for configuring a `SessionHost` instance
#[derive(Debug, Clone, Copy)]
pub struct SessionHostOptions {
    /// First service record handle the registry tries to allocate.
    ///
    /// Must lie at or above `0x0001_0000`; handles below that are reserved
    /// for the SDP server itself.
    pub record_handle_base: ServiceRecordHandle,
}

impl Default for SessionHostOptions {
    fn default() -> Self {
        Self {
            record_handle_base: SERVICE_RECORD_HANDLE_RANGE_START,
        }
    }
}

/// Shared session data: advertised records, listening servers, connections
#[derive(Debug)]
pub struct SessionHost {
    /// Advertised service records
    pub(crate) registry: ServiceRecordRegistry,
    /// Listening RFCOMM servers
    pub(crate) servers: ServerManager,
    /// RFCOMM data-link connections
    pub(crate) connections: ConnectionManager,
    /// Host configuration options
    options: SessionHostOptions,
}

impl SessionHost {
    /// Create a new `SessionHost` with default options
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(SessionHostOptions::default())
    }

    /// Create a new `SessionHost` with custom options
    #[must_use]
    pub fn with_options(options: SessionHostOptions) -> Self {
        Self {
            registry: ServiceRecordRegistry::new(),
            servers: ServerManager::new(),
            connections: ConnectionManager::new(),
            options,
        }
    }

    /// Get a reference to the options
    #[must_use]
    pub fn options(&self) -> &SessionHostOptions {
        &self.options
    }

    /// Get a reference to the advertised service records
    #[must_use]
    pub fn registry(&self) -> &ServiceRecordRegistry {
        &self.registry
    }

    /// Get a reference to the listening servers
    #[must_use]
    pub fn servers(&self) -> &ServerManager {
        &self.servers
    }

    /// Get a reference to the tracked connections
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }
}

impl Default for SessionHost {
    fn default() -> Self {
        Self::new()
    }
}

/// One request on its way to the processor, with the reply slot the
/// response must be signalled on
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub(crate) reply_slot: usize,
    pub(crate) op: Request,
}

/// API requests sent to the session processor task
#[derive(Debug, Clone)]
pub(crate) enum Request {
    /// Start a server advertised under the given name and service class
    StartServer {
        name: String<MAX_SERVICE_NAME_LENGTH>,
        uuid: ServiceUuid,
    },
    /// Stop a listening server
    StopServer(ServerHandle),
    /// Begin an outbound connection to a remote service
    Connect {
        addr: BluetoothAddress,
        uuid: ServiceUuid,
    },
    /// Send bytes on an open connection
    Send {
        handle: ConnectionHandle,
        data: Vec<u8, MAX_FRAME>,
    },
    /// Begin teardown of a connection
    Disconnect(ConnectionHandle),
}

/// API responses sent back from the session processor task
#[derive(Debug, Clone)]
pub(crate) enum Response {
    /// Server is listening and its record is advertised
    ServerStarted {
        handle: ServerHandle,
        channel: ServerChannel,
        record_handle: ServiceRecordHandle,
    },
    /// Server stopped and its record withdrawn
    ServerStopped,
    /// Outbound connection attempt started; completion is signalled on
    /// the connection's slot
    Connecting {
        handle: ConnectionHandle,
        slot: usize,
    },
    /// Bytes handed to the transport
    SendComplete,
    /// Teardown started; completion is signalled on the connection's slot
    Disconnecting { slot: usize },
    /// Error occurred
    Error(SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[defmt::global_logger]
    struct NullLogger;

    unsafe impl defmt::Logger for NullLogger {
        fn acquire() {}
        unsafe fn flush() {}
        unsafe fn release() {}
        unsafe fn write(_bytes: &[u8]) {}
    }

    #[test]
    fn test_session_host_defaults() {
        let host = SessionHost::new();
        assert_eq!(host.registry.record_count(), 0);
        assert_eq!(host.servers.server_count(), 0);
        assert_eq!(host.connections.connection_count(), 0);
        assert_eq!(
            host.options().record_handle_base,
            SERVICE_RECORD_HANDLE_RANGE_START
        );
    }

    #[test]
    fn test_session_host_custom_handle_base() {
        let host = SessionHost::with_options(SessionHostOptions {
            record_handle_base: 0x0002_0000,
        });
        assert_eq!(host.options().record_handle_base, 0x0002_0000);
    }

    #[test]
    fn test_sdp_error_conversion() {
        assert_eq!(
            SessionError::from(SdpError::HandleExhausted),
            SessionError::HandleExhausted
        );
        assert_eq!(
            SessionError::from(SdpError::TooManyRecords),
            SessionError::Sdp(SdpError::TooManyRecords)
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        assert_eq!(
            SessionError::from(TransportError),
            SessionError::Transport
        );
    }
}
