//! Concurrent API callers over the loopback transport: each caller must
//! get its own response, even when one operation fails while another
//! succeeds in flight at the same time.

mod common;

use carrierbird::{BluetoothAddress, SessionError, SessionHostOptions, api, opp, processor};
use common::LoopbackTransport;
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::select::{Either, select};

static TRANSPORT: LoopbackTransport = LoopbackTransport::new();

#[test]
fn concurrent_requests() {
    block_on(async {
        match select(
            processor::run(SessionHostOptions::default(), &TRANSPORT),
            scenario(),
        )
        .await
        {
            Either::First(()) => unreachable!("processor exited"),
            Either::Second(result) => result.unwrap(),
        }
    });
}

async fn scenario() -> Result<(), SessionError> {
    let first = api::start_server("OBEX Object Push", opp::service_uuid()).await?;
    let remote = BluetoothAddress::new([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]);

    let conn = api::connect_to_server(remote, opp::service_uuid()).await?;
    let _accepted = api::accept_connection(first.handle).await?;
    api::disconnect(conn).await?;

    // One caller's failure must not leak into a concurrent caller's result
    let (late_send, started) = join(
        api::send(conn, b"too late"),
        api::start_server("OBEX Object Push", opp::service_uuid()),
    )
    .await;
    assert_eq!(late_send, Err(SessionError::ConnectionClosed));
    let second = started?;
    assert_ne!(second.handle, first.handle);
    {
        let host = carrierbird::session_host()
            .await
            .map_err(|_| SessionError::NotInitialized)?;
        assert_eq!(host.registry().record_count(), 2);
        assert!(host.registry().get(second.record_handle).is_some());
    }

    // Concurrent sends on independent connections each land on their own link
    let c2 = api::connect_to_server(remote, opp::service_uuid()).await?;
    let a2 = api::accept_connection(first.handle).await?;
    let (sent_c2, sent_a2) = join(api::send(c2, b"from c2"), api::send(a2, b"from a2")).await;
    sent_c2?;
    sent_a2?;
    assert_eq!(api::receive(a2).await?.as_slice(), b"from c2");
    assert_eq!(api::receive(c2).await?.as_slice(), b"from a2");
    Ok(())
}
