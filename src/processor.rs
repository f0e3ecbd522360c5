//! Processor Tasks - Transport Event and API Request processing
//!
//! This module contains the two processing tasks that drive a session
//! endpoint: one consumes link events from the transport, the other
//! serves API requests. Both share the `SessionHost` state via a mutex.
//!
//! # Usage
//!
//! Spawn [`run`] as a single Embassy task, or embed it in an executor of
//! your choice:
//!
//! ```rust,no_run
//! use carrierbird::{SessionHostOptions, processor};
//!
//! # async fn example(transport: &'static impl carrierbird::transport::RfcommTransport) {
//! processor::run(SessionHostOptions::default(), transport).await;
//! # }
//! ```
//!
//! # Architecture
//!
//! * **Transport Event Processor**: applies link events (inbound
//!   connections, connect/disconnect completions, received data) to the
//!   shared state and wakes waiters parked on the connection signals
//! * **API Request Processor**: handles external API requests with
//!   responses
//!
//! Blocking API calls (accept, receive, completion waits) never go
//! through the request channel; they park on the static accept queues
//! and connection signals so the processor stays responsive.

use crate::{
    ACCEPT_QUEUES, ApiRequest, CONNECTION_SIGNALS, REPLY_SIGNALS, REQUEST_CHANNEL, Request,
    Response, SessionError, SessionHostOptions, opp,
    rfcomm::{ConnectionHandle, LinkId, RfcommConnection, ServerChannel},
    session_host,
    transport::{RfcommTransport, TransportEvent},
};

async fn transport_event_processor<T: RfcommTransport>(transport: &'static T) -> ! {
    loop {
        let event = transport.read_event().await;
        defmt::debug!(
            "[PROCESSOR] Transport event: {:?}",
            defmt::Debug2Format(&event)
        );
        handle_transport_event(transport, event).await;
    }
}

async fn handle_transport_event<T: RfcommTransport>(transport: &'static T, event: TransportEvent) {
    match event {
        TransportEvent::ConnectionRequest { channel, link } => {
            handle_connection_request(transport, channel, link).await;
        }
        TransportEvent::ConnectComplete { link, success } => {
            let Ok(mut host) = session_host().await else {
                return;
            };
            let Some(conn) = host.connections.get_mut(link) else {
                defmt::warn!("[PROCESSOR] Connect complete for unknown link {}", link);
                return;
            };
            if success {
                conn.open().ok();
            } else {
                conn.finish_close();
            }
            CONNECTION_SIGNALS[conn.slot].signal(());
        }
        TransportEvent::DataReceived { link, data } => {
            let Ok(mut host) = session_host().await else {
                return;
            };
            let Some(conn) = host.connections.get_mut(link) else {
                defmt::warn!(
                    "[PROCESSOR] Dropping {} bytes for unknown link {}",
                    data.len(),
                    link
                );
                return;
            };
            let buffered = conn.push_rx(&data);
            if buffered < data.len() {
                defmt::warn!(
                    "[PROCESSOR] Receive buffer full on link {}, dropped {} bytes",
                    link,
                    data.len() - buffered
                );
            }
            CONNECTION_SIGNALS[conn.slot].signal(());
        }
        TransportEvent::DisconnectComplete { link } => {
            let Ok(mut host) = session_host().await else {
                return;
            };
            let Some(conn) = host.connections.get_mut(link) else {
                return;
            };
            conn.finish_close();
            CONNECTION_SIGNALS[conn.slot].signal(());
        }
    }
}

/// Route an established inbound link to its server's accept queue
///
/// The transport only completes the handshake on channels it was told to
/// listen on, so a missing server here means the server was stopped while
/// the handshake was in flight; the link is torn down again.
async fn handle_connection_request<T: RfcommTransport>(
    transport: &'static T,
    channel: ServerChannel,
    link: LinkId,
) {
    let (server_handle, accept_slot) = {
        let Ok(mut host) = session_host().await else {
            return;
        };
        let Some(server) = host.servers.find_by_channel(channel) else {
            defmt::warn!(
                "[PROCESSOR] Inbound link {} on channel {} with no server",
                link,
                channel
            );
            drop(host);
            transport.disconnect(link).await.ok();
            return;
        };
        let server_handle = server.handle;
        let accept_slot = server.accept_slot;
        let conn_slot = match host.connections.allocate_slot() {
            Ok(slot) => slot,
            Err(_) => {
                defmt::warn!("[PROCESSOR] No free connection slot for inbound link {}", link);
                drop(host);
                transport.disconnect(link).await.ok();
                return;
            }
        };
        CONNECTION_SIGNALS[conn_slot].reset();
        if host
            .connections
            .insert(RfcommConnection::new_incoming(link, conn_slot, channel))
            .is_err()
        {
            drop(host);
            transport.disconnect(link).await.ok();
            return;
        }
        (server_handle, accept_slot)
    };

    if ACCEPT_QUEUES[accept_slot]
        .try_send((server_handle, link))
        .is_err()
    {
        defmt::warn!("[PROCESSOR] Accept queue full, refusing inbound link {}", link);
        if let Ok(mut host) = session_host().await {
            host.connections.remove(link);
        }
        transport.disconnect(link).await.ok();
    }
}

async fn api_request_processor<T: RfcommTransport>(transport: &'static T) -> ! {
    let api_receiver = REQUEST_CHANNEL.receiver();

    loop {
        let ApiRequest { reply_slot, op } = api_receiver.receive().await;
        defmt::debug!("[PROCESSOR] API request: {:?}", defmt::Debug2Format(&op));
        let response = handle_api_request(transport, op).await;
        defmt::debug!(
            "[PROCESSOR] API response: {:?}",
            defmt::Debug2Format(&response)
        );
        REPLY_SIGNALS[reply_slot].signal(response);
    }
}

async fn handle_api_request<T: RfcommTransport>(
    transport: &'static T,
    request: Request,
) -> Response {
    match request {
        Request::StartServer { name, uuid } => start_server(transport, &name, uuid).await,
        Request::StopServer(handle) => stop_server(transport, handle).await,
        Request::Connect { addr, uuid } => connect(transport, addr, uuid).await,
        Request::Send { handle, data } => send(transport, handle, &data).await,
        Request::Disconnect(handle) => disconnect(transport, handle).await,
    }
}

/// Bring up a listening server advertising the given service class
///
/// Transport listeners are created first; the record is only registered
/// once the channel and PSM it advertises actually exist. A failure on
/// any later step rolls the earlier ones back, so a started server is
/// always fully advertised and a failed start leaves nothing behind.
/// The Object Push UUID gets the full profile advertisement; any other
/// service class gets a plain OBEX-over-RFCOMM record.
async fn start_server<T: RfcommTransport>(
    transport: &'static T,
    name: &str,
    uuid: crate::sdp::ServiceUuid,
) -> Response {
    let psm = match transport.create_l2cap_listener().await {
        Ok(psm) => psm,
        Err(_) => return Response::Error(SessionError::Transport),
    };
    let channel = match transport.rfcomm_listen().await {
        Ok(channel) => channel,
        Err(_) => return Response::Error(SessionError::Transport),
    };

    let result = {
        let Ok(mut host) = session_host().await else {
            return Response::Error(SessionError::NotInitialized);
        };
        let handle_base = host.options().record_handle_base;
        match host.servers.allocate_accept_slot() {
            Err(e) => Err(e),
            Ok(accept_slot) => match build_record(name, uuid, psm, channel)
                .map_err(SessionError::from)
                .and_then(|builder| {
                    host.registry
                        .register_from(builder, handle_base)
                        .map_err(SessionError::from)
                }) {
                Err(e) => {
                    host.servers.release_accept_slot(accept_slot);
                    Err(e)
                }
                Ok(record_handle) => {
                    match host.servers.insert(channel, accept_slot, record_handle) {
                        Err(e) => {
                            host.registry.deregister(record_handle);
                            Err(e)
                        }
                        Ok(handle) => {
                            // Stale links from a previous occupant of the slot
                            while ACCEPT_QUEUES[accept_slot].try_receive().is_ok() {}
                            Ok((handle, record_handle))
                        }
                    }
                }
            },
        }
    };

    match result {
        Ok((handle, record_handle)) => Response::ServerStarted {
            handle,
            channel,
            record_handle,
        },
        Err(e) => {
            transport.stop_listen(channel).await.ok();
            Response::Error(e)
        }
    }
}

fn build_record(
    name: &str,
    uuid: crate::sdp::ServiceUuid,
    psm: u16,
    channel: ServerChannel,
) -> Result<crate::sdp::ServiceRecordBuilder, crate::sdp::SdpError> {
    if uuid == opp::service_uuid() {
        opp::object_push_record(name, psm, channel)
    } else {
        Ok(crate::sdp::ServiceRecordBuilder::new(uuid, channel).service_name(name))
    }
}

/// Stop a listening server and withdraw its advertisement
///
/// Links already accepted stay open; links still parked on the accept
/// queue are torn down.
async fn stop_server<T: RfcommTransport>(
    transport: &'static T,
    handle: crate::rfcomm::ServerHandle,
) -> Response {
    let server = {
        let Ok(mut host) = session_host().await else {
            return Response::Error(SessionError::NotInitialized);
        };
        let Some(server) = host.servers.remove(handle) else {
            return Response::Error(SessionError::InvalidParameter);
        };
        host.registry.deregister(server.record_handle);
        server
    };

    transport.stop_listen(server.channel).await.ok();
    while let Ok((_, link)) = ACCEPT_QUEUES[server.accept_slot].try_receive() {
        if let Ok(mut host) = session_host().await {
            if let Some(conn) = host.connections.get_mut(link) {
                conn.begin_close().ok();
            }
        }
        transport.disconnect(link).await.ok();
    }
    Response::ServerStopped
}

async fn connect<T: RfcommTransport>(
    transport: &'static T,
    addr: crate::BluetoothAddress,
    uuid: crate::sdp::ServiceUuid,
) -> Response {
    let slot = {
        let Ok(mut host) = session_host().await else {
            return Response::Error(SessionError::NotInitialized);
        };
        match host.connections.allocate_slot() {
            Ok(slot) => slot,
            Err(e) => return Response::Error(e),
        }
    };

    let link = match transport.rfcomm_connect(addr, uuid).await {
        Ok(link) => link,
        Err(_) => {
            if let Ok(mut host) = session_host().await {
                host.connections.release_slot(slot);
            }
            return Response::Error(SessionError::ConnectFailed);
        }
    };

    let Ok(mut host) = session_host().await else {
        return Response::Error(SessionError::NotInitialized);
    };
    CONNECTION_SIGNALS[slot].reset();
    if let Err(e) = host
        .connections
        .insert(RfcommConnection::new_outgoing(link, slot, addr))
    {
        return Response::Error(e);
    }
    Response::Connecting { handle: link, slot }
}

async fn send<T: RfcommTransport>(
    transport: &'static T,
    handle: ConnectionHandle,
    data: &[u8],
) -> Response {
    {
        let Ok(host) = session_host().await else {
            return Response::Error(SessionError::NotInitialized);
        };
        let Some(conn) = host.connections.get(handle) else {
            return Response::Error(SessionError::InvalidParameter);
        };
        if let Err(e) = conn.check_transfer_allowed() {
            return Response::Error(e);
        }
    }
    match transport.send(handle, data).await {
        Ok(()) => Response::SendComplete,
        Err(_) => Response::Error(SessionError::Transport),
    }
}

async fn disconnect<T: RfcommTransport>(transport: &'static T, handle: ConnectionHandle) -> Response {
    let slot = {
        let Ok(mut host) = session_host().await else {
            return Response::Error(SessionError::NotInitialized);
        };
        let Some(conn) = host.connections.get_mut(handle) else {
            return Response::Error(SessionError::InvalidParameter);
        };
        if let Err(e) = conn.begin_close() {
            return Response::Error(e);
        }
        conn.slot
    };
    match transport.disconnect(handle).await {
        Ok(()) => Response::Disconnecting { slot },
        Err(_) => Response::Error(SessionError::Transport),
    }
}

/// Run the session processor tasks
///
/// # Panics
///
/// This function will panic if session host initialization fails.
/// The panic occurs if `init_session_host(options)` returns an error.
pub async fn run<T: RfcommTransport + 'static>(options: SessionHostOptions, transport: &'static T) {
    crate::init_session_host(options)
        .await
        .expect("Failed to initialize session host");

    embassy_futures::select::select(
        transport_event_processor(transport),
        api_request_processor(transport),
    )
    .await;
}
