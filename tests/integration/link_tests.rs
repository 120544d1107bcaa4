//! End-to-end tests of the TCP adapter link: listener, sessions, framing
//! and hot swap.

use std::net::SocketAddr;
use std::time::Duration;

use dispenser::adapters::adapter_listener::{AdapterListener, ListenerHandle};
use dispenser::error::PourError;
use dispenser::link::SessionId;
use dispenser::link::protocol::PumpCommand;
use dispenser::task::PourState;

use crate::mock_hw::{FakeAdapter, Rig, wait_until};

const PATIENCE: Duration = Duration::from_secs(5);

/// Rig whose link writer is owned by a real listener on an ephemeral port.
fn listening_rig() -> (Rig, SocketAddr, ListenerHandle) {
    let mut rig = Rig::new();
    let listener = AdapterListener::bind(
        "127.0.0.1:0",
        rig.take_controller(),
        Duration::from_millis(500),
    )
    .unwrap();
    let addr = listener.local_addr().unwrap();
    (rig, addr, listener.spawn().unwrap())
}

#[test]
fn adapter_receives_start_and_stop_frames() {
    let (rig, addr, _listener) = listening_rig();
    assert!(!rig.link.is_connected());

    let adapter = FakeAdapter::connect(addr);
    assert!(wait_until(PATIENCE, || rig.link.is_connected()));

    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert_eq!(pour.state(), PourState::Running);
    assert!(pour.cancel());

    let mut starts: Vec<_> = adapter.commands().into_iter().filter(|c| !c.is_stop()).collect();
    starts.sort_by_key(|c| c.pos);
    assert_eq!(
        starts,
        vec![
            PumpCommand::start(0, 2.0, 20_000),
            PumpCommand::start(1, 3.0, 20_000)
        ]
    );
    let mut stops: Vec<_> = adapter.commands().into_iter().filter(PumpCommand::is_stop).collect();
    stops.sort_by_key(|c| c.pos);
    assert_eq!(stops, vec![PumpCommand::stop(0), PumpCommand::stop(1)]);
}

#[test]
fn hang_up_detaches_on_next_command() {
    let (rig, addr, _listener) = listening_rig();
    let adapter = FakeAdapter::connect(addr);
    assert!(wait_until(PATIENCE, || rig.link.is_connected()));
    adapter.hang_up();

    let pour = rig.engine.pour_beverage("still", 30.0);
    assert!(
        matches!(pour.state(), PourState::Failed(PourError::Transport(_))),
        "got {:?}",
        pour.state()
    );
    assert!(wait_until(PATIENCE, || !rig.link.is_connected()));

    let retry = rig.engine.pour_beverage("still", 30.0);
    assert_eq!(retry.state(), PourState::Failed(PourError::NotConnected));
}

#[test]
fn second_adapter_replaces_first() {
    let (rig, addr, _listener) = listening_rig();
    let first = FakeAdapter::connect(addr);
    assert!(wait_until(PATIENCE, || rig.link.session_id() == Some(SessionId(1))));
    let second = FakeAdapter::connect(addr);
    assert!(wait_until(PATIENCE, || rig.link.session_id() == Some(SessionId(2))));

    let pour = rig.engine.pour_beverage("still", 30.0);
    assert_eq!(pour.state(), PourState::Running);
    assert!(first.commands().is_empty());
    assert_eq!(second.commands(), vec![PumpCommand::start(5, 30.0, 1000)]);

    // The old connection closing must not detach the new one.
    first.hang_up();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.link.session_id(), Some(SessionId(2)));
}

#[test]
fn stopping_listener_detaches_link() {
    let (rig, addr, listener) = listening_rig();
    let _adapter = FakeAdapter::connect(addr);
    assert!(wait_until(PATIENCE, || rig.link.is_connected()));

    listener.stop();
    assert!(!rig.link.is_connected());
}
