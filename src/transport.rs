//! RFCOMM Transport Abstraction
//!
//! The session layer does not implement the RFCOMM multiplexer or the
//! L2CAP channels underneath it; it drives a transport collaborator
//! through this trait. The transport owns frame encoding, credit-based
//! flow control and the radio, and reports asynchronous link activity as
//! [`TransportEvent`]s consumed by the processor task.

use crate::BluetoothAddress;
use crate::constants::MAX_FRAME;
use core::future::Future;
use crate::rfcomm::{LinkId, ServerChannel};
use crate::sdp::ServiceUuid;
use heapless::Vec;

/// Transport-level failure, opaque to the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct TransportError;

/// Asynchronous link activity reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote device connected to a listening server channel. The data
    /// link is already established; `link` is ready for transfer.
    ConnectionRequest {
        /// Server channel the remote connected to
        channel: ServerChannel,
        /// Identifier of the new data link
        link: LinkId,
    },
    /// An outbound connection attempt finished
    ConnectComplete {
        /// Link identifier returned by [`RfcommTransport::rfcomm_connect`]
        link: LinkId,
        /// Whether the data link was established
        success: bool,
    },
    /// Bytes arrived on an established data link
    DataReceived {
        /// Link the bytes arrived on
        link: LinkId,
        /// Payload, in arrival order
        data: Vec<u8, MAX_FRAME>,
    },
    /// A data link was torn down, locally or by the remote
    DisconnectComplete {
        /// Link that was torn down
        link: LinkId,
    },
}

/// RFCOMM transport driven by the session processor
///
/// One implementation instance is shared with the processor task for the
/// lifetime of the program; all methods take `&self`.
pub trait RfcommTransport {
    /// Open a dynamic L2CAP PSM for GOEP traffic, returning the PSM to
    /// advertise in the service record
    fn create_l2cap_listener(&self) -> impl Future<Output = Result<u16, TransportError>>;

    /// Start listening on a free server channel, returning the channel
    /// number to advertise
    fn rfcomm_listen(&self) -> impl Future<Output = Result<ServerChannel, TransportError>>;

    /// Stop listening on a server channel
    ///
    /// Established links on the channel are unaffected.
    fn stop_listen(
        &self,
        channel: ServerChannel,
    ) -> impl Future<Output = Result<(), TransportError>>;

    /// Begin an outbound connection to the remote service advertising
    /// `uuid`, returning the link identifier the completion event will
    /// carry
    fn rfcomm_connect(
        &self,
        addr: BluetoothAddress,
        uuid: ServiceUuid,
    ) -> impl Future<Output = Result<LinkId, TransportError>>;

    /// Send bytes on an established data link
    fn send(&self, link: LinkId, data: &[u8]) -> impl Future<Output = Result<(), TransportError>>;

    /// Begin teardown of a data link
    ///
    /// Completion is reported via [`TransportEvent::DisconnectComplete`].
    fn disconnect(&self, link: LinkId) -> impl Future<Output = Result<(), TransportError>>;

    /// Wait for the next link event
    fn read_event(&self) -> impl Future<Output = TransportEvent>;
}
