//! `Carrierbird` API Functions
//!
//! This module provides the public API functions for interacting with the
//! session processor task. These functions use static channels to
//! communicate with the processor and are designed to be called from
//! application code.
//!
//! Quick operations (start/stop server, connect, send, disconnect) are
//! served by the processor through the request channel. Waiting
//! operations (accept, receive, completion waits) park on static accept
//! queues and connection signals instead, so a suspended accept or
//! receive never blocks the processor or other connections.
//!
//! # Usage
//!
//! ```rust,no_run
//! use carrierbird::api::{start_server, accept_connection, receive};
//! use carrierbird::opp;
//!
//! # async fn example() -> Result<(), carrierbird::SessionError> {
//! let server = start_server("OBEX Object Push", opp::service_uuid()).await?;
//! let conn = accept_connection(server.handle).await?;
//! let data = receive(conn).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    ApiRequest, BluetoothAddress, CONNECTION_SIGNALS, REPLY_SIGNALS, REPLY_SLOT_POOL,
    REQUEST_CHANNEL, Request, Response, SessionError,
    constants::{MAX_FRAME, MAX_RX_BUFFER, MAX_SERVICE_NAME_LENGTH},
    rfcomm::{ConnectionHandle, ConnectionState, ServerChannel, ServerHandle},
    sdp::{ServiceRecordHandle, ServiceUuid},
    session_host,
};
use heapless::{String, Vec};

/// Send one request to the processor and wait for its response.
///
/// Each in-flight request holds a reply slot; the processor signals the
/// response on that slot, so concurrent callers never see each other's
/// responses. A future dropped mid-flight retires its slot instead of
/// leaving a stray response for the next caller.
async fn transact(op: Request) -> Response {
    let reply_slot = REPLY_SLOT_POOL.receiver().receive().await;
    REPLY_SIGNALS[reply_slot].reset();
    REQUEST_CHANNEL
        .sender()
        .send(ApiRequest { reply_slot, op })
        .await;
    let response = REPLY_SIGNALS[reply_slot].wait().await;
    REPLY_SLOT_POOL.sender().try_send(reply_slot).ok();
    response
}

/// A started server and the advertisement that announces it
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct StartedServer {
    /// Handle to accept on and stop the server with
    pub handle: ServerHandle,
    /// Server channel the transport listens on
    pub channel: ServerChannel,
    /// Handle of the registered service record
    pub record_handle: ServiceRecordHandle,
}

/// Start a server for the given service class and advertise it under `name`.
///
/// The transport picks a free server channel and GOEP PSM; the service
/// record announcing them is registered before this function returns, so
/// a peer that reads the record can connect immediately. Starting two
/// servers yields two independent records with distinct handles. Names
/// longer than [`MAX_SERVICE_NAME_LENGTH`] bytes are truncated at a
/// character boundary.
///
/// # Errors
///
/// Returns an error if the transport cannot listen, no server or record
/// capacity remains, or the host is not initialized.
pub async fn start_server(name: &str, uuid: ServiceUuid) -> Result<StartedServer, SessionError> {
    let mut end = name.len().min(MAX_SERVICE_NAME_LENGTH);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let name =
        String::try_from(&name[..end]).map_err(|()| SessionError::InvalidParameter)?;
    match transact(Request::StartServer { name, uuid }).await {
        Response::ServerStarted {
            handle,
            channel,
            record_handle,
        } => Ok(StartedServer {
            handle,
            channel,
            record_handle,
        }),
        Response::Error(e) => Err(e),
        _ => Err(SessionError::InvalidState),
    }
}

/// Stop a listening server and withdraw its service record.
///
/// Connections already accepted stay open; inbound links not yet claimed
/// by an accept call are torn down. New connection attempts against the
/// withdrawn record are refused by the transport.
///
/// # Errors
///
/// Returns an error if the handle does not name a listening server or
/// communication with the processor fails.
pub async fn stop_server(handle: ServerHandle) -> Result<(), SessionError> {
    match transact(Request::StopServer(handle)).await {
        Response::ServerStopped => Ok(()),
        Response::Error(e) => Err(e),
        _ => Err(SessionError::InvalidState),
    }
}

/// Wait for the next inbound connection on a listening server.
///
/// Suspends until a remote device connects. Pending inbound connections
/// are handed out in arrival order; the returned connection is already
/// open for transfer.
///
/// # Errors
///
/// Returns `SessionError::InvalidParameter` if the handle does not name
/// a listening server, including a server stopped while the accept was
/// suspended and its queue reused by a newer one.
pub async fn accept_connection(handle: ServerHandle) -> Result<ConnectionHandle, SessionError> {
    let accept_slot = {
        let host = session_host()
            .await
            .map_err(|_| SessionError::NotInitialized)?;
        host.servers
            .get(handle)
            .ok_or(SessionError::InvalidParameter)?
            .accept_slot
    };
    let (owner, link) = crate::ACCEPT_QUEUES[accept_slot].receive().await;
    if owner == handle {
        return Ok(link);
    }
    // The queue was recycled by a newer server while this accept was
    // parked; hand its link back and report the stopped server.
    crate::ACCEPT_QUEUES[accept_slot].try_send((owner, link)).ok();
    Err(SessionError::InvalidParameter)
}

/// Connect to a remote device's service identified by UUID.
///
/// Resolves the service on the remote device, establishes the data link
/// and returns once the connection is open. On failure the connection
/// ends up `Closed` and an error is returned.
///
/// # Errors
///
/// Returns `SessionError::ConnectFailed` if the remote refuses or the
/// handshake fails, or other errors for capacity and state problems.
pub async fn connect_to_server(
    addr: BluetoothAddress,
    uuid: ServiceUuid,
) -> Result<ConnectionHandle, SessionError> {
    let (handle, slot) = match transact(Request::Connect { addr, uuid }).await {
        Response::Connecting { handle, slot } => (handle, slot),
        Response::Error(e) => return Err(e),
        _ => return Err(SessionError::InvalidState),
    };

    loop {
        {
            let host = session_host()
                .await
                .map_err(|_| SessionError::NotInitialized)?;
            match host.connections.get(handle).map(|c| c.state) {
                Some(ConnectionState::Open) => return Ok(handle),
                Some(ConnectionState::Connecting) => {}
                _ => return Err(SessionError::ConnectFailed),
            }
        }
        CONNECTION_SIGNALS[slot].wait().await;
    }
}

/// Send bytes on an open connection.
///
/// Delivery is ordered; payloads larger than one transport frame are
/// split and handed to the transport in order.
///
/// # Errors
///
/// Returns `SessionError::ConnectionClosed` if the connection was torn
/// down, `SessionError::InvalidState` if it is not open yet, or an error
/// if the transport rejects the data.
pub async fn send(handle: ConnectionHandle, data: &[u8]) -> Result<(), SessionError> {
    if data.is_empty() {
        // Nothing to hand to the transport, but the state rules still apply
        let host = session_host()
            .await
            .map_err(|_| SessionError::NotInitialized)?;
        return host
            .connections
            .get(handle)
            .ok_or(SessionError::InvalidParameter)?
            .check_transfer_allowed();
    }
    for chunk in data.chunks(MAX_FRAME) {
        let payload =
            Vec::from_slice(chunk).map_err(|()| SessionError::InvalidParameter)?;
        match transact(Request::Send {
            handle,
            data: payload,
        })
        .await
        {
            Response::SendComplete => {}
            Response::Error(e) => return Err(e),
            _ => return Err(SessionError::InvalidState),
        }
    }
    Ok(())
}

/// Receive bytes from an open connection.
///
/// Returns all bytes currently buffered for the connection, suspending
/// until at least one byte is available. Bytes are delivered in the
/// order the remote sent them. Bytes buffered before a teardown are
/// still delivered; once the buffer is drained, calls on a closed
/// connection fail.
///
/// # Errors
///
/// Returns `SessionError::ConnectionClosed` if the connection was torn
/// down, or `SessionError::InvalidState` if it is not open yet.
pub async fn receive(handle: ConnectionHandle) -> Result<Vec<u8, MAX_RX_BUFFER>, SessionError> {
    loop {
        let slot = {
            let mut host = session_host()
                .await
                .map_err(|_| SessionError::NotInitialized)?;
            let conn = host
                .connections
                .get_mut(handle)
                .ok_or(SessionError::InvalidParameter)?;
            if conn.rx_len() > 0 {
                return Ok(conn.take_rx());
            }
            conn.check_transfer_allowed()?;
            conn.slot
        };
        CONNECTION_SIGNALS[slot].wait().await;
    }
}

/// Disconnect a connection, waiting for teardown to complete.
///
/// After this returns, further send and receive calls on the handle fail
/// with `SessionError::ConnectionClosed`. Other connections and servers
/// are unaffected.
///
/// # Errors
///
/// Returns `SessionError::ConnectionClosed` if the connection was
/// already torn down, or an error if the transport rejects the request.
pub async fn disconnect(handle: ConnectionHandle) -> Result<(), SessionError> {
    let slot = match transact(Request::Disconnect(handle)).await {
        Response::Disconnecting { slot } => slot,
        Response::Error(e) => return Err(e),
        _ => return Err(SessionError::InvalidState),
    };

    loop {
        {
            let host = session_host()
                .await
                .map_err(|_| SessionError::NotInitialized)?;
            match host.connections.get(handle).map(|c| c.state) {
                Some(ConnectionState::Closed) | None => return Ok(()),
                _ => {}
            }
        }
        CONNECTION_SIGNALS[slot].wait().await;
    }
}
