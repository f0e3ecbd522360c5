//! Session churn over the loopback transport: connection resources must
//! be recycled after teardown, so an endpoint can keep serving far more
//! sessions than it has simultaneous connection slots.

mod common;

use carrierbird::constants::MAX_CONNECTIONS;
use carrierbird::{BluetoothAddress, SessionError, SessionHostOptions, api, opp, processor};
use common::LoopbackTransport;
use embassy_futures::block_on;
use embassy_futures::select::{Either, select};

static TRANSPORT: LoopbackTransport = LoopbackTransport::new();

#[test]
fn connection_recycling() {
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
    let server = api::start_server("OBEX Object Push", opp::service_uuid()).await?;
    let remote = BluetoothAddress::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    // Far more sequential sessions than there are connection slots; every
    // round must get a fresh pair once the previous one is torn down
    for round in 0..3 * MAX_CONNECTIONS {
        let initiator = api::connect_to_server(remote, opp::service_uuid()).await?;
        let acceptor = api::accept_connection(server.handle).await?;

        api::send(initiator, b"ping").await?;
        assert_eq!(api::receive(acceptor).await?.as_slice(), b"ping");
        api::send(acceptor, b"pong").await?;
        assert_eq!(api::receive(initiator).await?.as_slice(), b"pong");

        api::disconnect(initiator).await?;
        assert_eq!(
            api::send(initiator, b"late").await,
            Err(SessionError::ConnectionClosed),
            "round {round}"
        );
    }

    let host = carrierbird::session_host()
        .await
        .map_err(|_| SessionError::NotInitialized)?;
    assert!(host.connections().connection_count() <= MAX_CONNECTIONS);
    Ok(())
}
