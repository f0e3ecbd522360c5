//! Shared test harness: an in-process loopback transport.
//!
//! Both endpoints of every link live in the same process; bytes sent on
//! one end come back as receive events on the other. Outbound connects
//! resolve the service UUID against the local record registry, the same
//! lookup a remote SDP client would perform.

use carrierbird::constants::MAX_FRAME;
use carrierbird::rfcomm::{LinkId, ServerChannel};
use carrierbird::sdp::ServiceUuid;
use carrierbird::transport::{RfcommTransport, TransportError, TransportEvent};
use carrierbird::{BluetoothAddress, session_host};
use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{FnvIndexMap, Vec};

#[defmt::global_logger]
struct NullLogger;

unsafe impl defmt::Logger for NullLogger {
    fn acquire() {}
    unsafe fn flush() {}
    unsafe fn release() {}
    unsafe fn write(_bytes: &[u8]) {}
}

defmt::timestamp!("");

#[defmt::panic_handler]
fn defmt_panic() -> ! {
    panic!()
}

struct LoopbackState {
    next_link: u32,
    next_channel: u8,
    next_psm: u16,
    listeners: Vec<ServerChannel, 8>,
    links: FnvIndexMap<LinkId, LinkId, 16>,
}

pub struct LoopbackTransport {
    state: Mutex<CriticalSectionRawMutex, RefCell<LoopbackState>>,
    events: Channel<CriticalSectionRawMutex, TransportEvent, 16>,
}

impl LoopbackTransport {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(LoopbackState {
                next_link: 1,
                next_channel: 1,
                next_psm: 0x1001,
                listeners: Vec::new(),
                links: FnvIndexMap::new(),
            })),
            events: Channel::new(),
        }
    }
}

impl RfcommTransport for LoopbackTransport {
    async fn create_l2cap_listener(&self) -> Result<u16, TransportError> {
        Ok(self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let psm = s.next_psm;
            s.next_psm += 2;
            psm
        }))
    }

    async fn rfcomm_listen(&self) -> Result<ServerChannel, TransportError> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let channel = s.next_channel;
            s.next_channel += 1;
            s.listeners.push(channel).map_err(|_| TransportError)?;
            Ok(channel)
        })
    }

    async fn stop_listen(&self, channel: ServerChannel) -> Result<(), TransportError> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if let Some(pos) = s.listeners.iter().position(|&c| c == channel) {
                s.listeners.swap_remove(pos);
            }
        });
        Ok(())
    }

    async fn rfcomm_connect(
        &self,
        _addr: BluetoothAddress,
        uuid: ServiceUuid,
    ) -> Result<LinkId, TransportError> {
        // The lookup a remote peer would do over SDP
        let channel = {
            let host = session_host().await.map_err(|_| TransportError)?;
            host.registry()
                .find_by_service_class(uuid)
                .and_then(|record| record.rfcomm_channel())
        };

        let (link, queued) = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let local = s.next_link;
            let remote = local + 1;
            s.next_link += 2;
            match channel.filter(|ch| s.listeners.contains(ch)) {
                Some(ch) => {
                    s.links.insert(local, remote).ok();
                    s.links.insert(remote, local).ok();
                    (
                        local,
                        [
                            Some(TransportEvent::ConnectionRequest {
                                channel: ch,
                                link: remote,
                            }),
                            Some(TransportEvent::ConnectComplete {
                                link: local,
                                success: true,
                            }),
                        ],
                    )
                }
                None => (
                    local,
                    [
                        Some(TransportEvent::ConnectComplete {
                            link: local,
                            success: false,
                        }),
                        None,
                    ],
                ),
            }
        });

        for event in queued.into_iter().flatten() {
            self.events.send(event).await;
        }
        Ok(link)
    }

    async fn send(&self, link: LinkId, data: &[u8]) -> Result<(), TransportError> {
        let peer = self
            .state
            .lock(|s| s.borrow().links.get(&link).copied())
            .ok_or(TransportError)?;
        let data: Vec<u8, MAX_FRAME> = Vec::from_slice(data).map_err(|()| TransportError)?;
        self.events
            .send(TransportEvent::DataReceived { link: peer, data })
            .await;
        Ok(())
    }

    async fn disconnect(&self, link: LinkId) -> Result<(), TransportError> {
        let peer = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let peer = s.links.remove(&link);
            if let Some(peer) = peer {
                s.links.remove(&peer);
            }
            peer
        });
        self.events
            .send(TransportEvent::DisconnectComplete { link })
            .await;
        if let Some(peer) = peer {
            self.events
                .send(TransportEvent::DisconnectComplete { link: peer })
                .await;
        }
        Ok(())
    }

    async fn read_event(&self) -> TransportEvent {
        self.events.receive().await
    }
}
