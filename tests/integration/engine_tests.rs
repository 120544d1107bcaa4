//! Integration tests for the PourEngine → planner → pumps → link pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dispenser::adapters::executor_timer::ExecutorTimer;
use dispenser::adapters::sim_board::SimBoard;
use dispenser::app::events::DispenseEvent;
use dispenser::app::service::{POUR_NAME, PourEngine};
use dispenser::config::{DispenserConfig, PourConfig};
use dispenser::drivers::board::Board;
use dispenser::error::{PourError, TransportError};
use dispenser::link::hardware_link;
use dispenser::link::protocol::{API_PUMP, PumpCommand};
use dispenser::task::{PourOutcome, PourState, sequenced};

use crate::mock_hw::{RecordingSink, Rig, assignments, brandset};

// ── Scenario A: citrus 100 ml ────────────────────────────────

#[test]
fn citrus_pours_both_pumps_for_twenty_seconds() {
    let rig = Rig::new();
    let session = rig.connect(1);

    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert_eq!(pour.name(), POUR_NAME);
    assert_eq!(pour.state(), PourState::Running);

    let mut starts = session.starts();
    starts.sort_by_key(|c| c.pos);
    assert_eq!(
        starts,
        vec![
            PumpCommand { pos: 0, rate_q8: 512, duration_ms: 20_000 },
            PumpCommand { pos: 1, rate_q8: 768, duration_ms: 20_000 },
        ]
    );
    assert!(session.frames().iter().all(|(api, _)| *api == API_PUMP));
    assert_eq!(rig.timer.pending(), 2);

    assert_eq!(
        rig.sink.events(),
        vec![DispenseEvent::PumpsEngaged {
            beverage_id: "citrus".into(),
            pumps: vec![rig.pump("micro1"), rig.pump("micro2")],
            duration_ms: 20_000,
        }]
    );

    rig.advance_ms(19_999);
    assert_eq!(pour.state(), PourState::Running);
    rig.advance_ms(1);
    assert_eq!(pour.state(), PourState::Succeeded);
    assert_eq!(pour.wait(), PourOutcome::Succeeded);
    assert!(session.stops().is_empty(), "completion sends no stop");
}

// ── Scenario B: zero volume ──────────────────────────────────

#[test]
fn zero_volume_fails_without_wire_traffic() {
    let rig = Rig::new();
    let session = rig.connect(1);

    let pour = rig.engine.pour_beverage("citrus", 0.0);
    assert_eq!(pour.state(), PourState::Failed(PourError::InvalidPourable));
    assert!(session.frames().is_empty());
    assert_eq!(rig.timer.scheduled_count(), 0);
    assert_eq!(
        rig.sink.events(),
        vec![DispenseEvent::PourRejected {
            beverage_id: "citrus".into(),
            reason: PourError::InvalidPourable,
        }]
    );
}

// ── Scenario C: disconnected link ────────────────────────────

#[test]
fn disconnected_pour_fails_not_connected_without_timer() {
    let rig = Rig::new();

    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert_eq!(pour.state(), PourState::Failed(PourError::NotConnected));
    assert_eq!(rig.timer.scheduled_count(), 0);
    assert!(PourError::NotConnected.is_recoverable());
}

#[test]
fn pour_after_reconnect_uses_new_session() {
    let rig = Rig::new();
    let first = rig.connect(1);
    rig.controller().on_detach();
    assert_eq!(
        rig.engine.pour_beverage("still", 30.0).state(),
        PourState::Failed(PourError::NotConnected)
    );

    let second = rig.connect(2);
    let pour = rig.engine.pour_beverage("still", 30.0);
    assert_eq!(pour.state(), PourState::Running);
    assert!(first.frames().is_empty());
    assert_eq!(second.starts(), vec![PumpCommand::start(5, 30.0, 1000)]);
}

// ── Scenario D: two parts on one pump ────────────────────────

#[test]
fn shared_pump_gets_one_command_with_summed_rate() {
    let rig = Rig::new();
    let session = rig.connect(1);

    let pour = rig.engine.pour_beverage("double-cherry", 50.0);
    assert_eq!(
        session.commands(),
        vec![PumpCommand { pos: 2, rate_q8: 640, duration_ms: 20_000 }]
    );
    rig.advance_ms(20_000);
    assert_eq!(pour.state(), PourState::Succeeded);
}

// ── Availability ─────────────────────────────────────────────

#[test]
fn unassigned_ingredient_is_unavailable() {
    let rig = Rig::new();
    let session = rig.connect(1);

    assert!(!rig.engine.is_pourable("kiwi"));
    let pour = rig.engine.pour_beverage("kiwi", 100.0);
    assert_eq!(pour.state(), PourState::Failed(PourError::Unavailable));
    assert!(session.frames().is_empty());
}

#[test]
fn blocked_pump_makes_beverage_unavailable() {
    let rig = Rig::new();
    rig.connect(1);
    assert!(rig.engine.is_pourable("citrus"));

    rig.resolver.block_pump(rig.pump("micro2"));
    assert_eq!(
        rig.engine.pour_beverage("citrus", 100.0).state(),
        PourState::Failed(PourError::Unavailable)
    );

    rig.resolver.unblock_pump(rig.pump("micro2"));
    assert_eq!(rig.engine.pour_beverage("citrus", 100.0).state(), PourState::Running);
}

#[test]
fn oversized_volume_is_clamped() {
    let rig = Rig::new();
    let session = rig.connect(1);
    rig.engine.pour_beverage("citrus", 1000.0);
    assert!(session.starts().iter().all(|c| c.duration_ms == 70_000));
}

// ── Cancellation ─────────────────────────────────────────────

#[test]
fn cancelling_pour_stops_every_pump_once() {
    let rig = Rig::new();
    let session = rig.connect(1);
    let pour = rig.engine.pour_beverage("citrus", 100.0);

    let completions = Arc::new(AtomicUsize::new(0));
    let c = completions.clone();
    pour.on_complete(move |_, outcome| {
        assert_eq!(outcome, PourOutcome::Cancelled);
        c.fetch_add(1, Ordering::SeqCst);
    });

    assert!(pour.cancel());
    assert!(!pour.cancel());
    assert_eq!(pour.state(), PourState::Cancelled);

    let mut stops: Vec<i32> = session.stops().iter().map(|c| c.pos).collect();
    stops.sort_unstable();
    assert_eq!(stops, vec![0, 1]);
    assert_eq!(rig.timer.pending(), 0, "completion timers disarmed");

    rig.advance_ms(60_000);
    assert_eq!(pour.state(), PourState::Cancelled);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn cancel_after_success_is_noop() {
    let rig = Rig::new();
    let session = rig.connect(1);
    let pour = rig.engine.pour_beverage("still", 30.0);
    rig.advance_ms(1000);
    assert!(!pour.cancel());
    assert_eq!(pour.state(), PourState::Succeeded);
    assert!(session.stops().is_empty());
}

// ── Link loss while pouring ──────────────────────────────────

#[test]
fn disconnect_does_not_cancel_running_pour() {
    let rig = Rig::new();
    rig.connect(1);
    let pour = rig.engine.pour_beverage("citrus", 100.0);

    rig.controller().on_detach();
    assert_eq!(pour.state(), PourState::Running);
    rig.advance_ms(20_000);
    assert_eq!(pour.state(), PourState::Succeeded);
}

#[test]
fn cancel_while_disconnected_sends_nothing() {
    let rig = Rig::new();
    let session = rig.connect(1);
    let pour = rig.engine.pour_beverage("citrus", 100.0);

    rig.controller().on_detach();
    assert!(pour.cancel());
    assert_eq!(pour.state(), PourState::Cancelled);
    assert!(session.stops().is_empty());
}

// ── Partial failure ──────────────────────────────────────────

#[test]
fn failing_pump_fails_pour_and_leaves_sibling_running() {
    let rig = Rig::new();
    let session = rig.connect(1);
    session.fail_position(1, TransportError::Io);

    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert_eq!(
        pour.state(),
        PourState::Failed(PourError::Transport(TransportError::Io))
    );
    assert_eq!(session.starts(), vec![PumpCommand::start(0, 2.0, 20_000)]);
    assert!(session.stops().is_empty());
    assert_eq!(rig.timer.pending(), 1, "lemon keeps pouring");
}

#[test]
fn cancel_after_partial_failure_stops_surviving_pump() {
    let rig = Rig::new();
    let session = rig.connect(1);
    session.fail_position(1, TransportError::Io);
    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert!(matches!(pour.state(), PourState::Failed(_)));

    assert!(pour.cancel());
    assert_eq!(session.stops(), vec![PumpCommand::stop(0)]);
    assert_eq!(rig.timer.pending(), 0);
    assert_eq!(
        pour.state(),
        PourState::Failed(PourError::Transport(TransportError::Io))
    );

    assert!(!pour.cancel());
    assert_eq!(session.stops().len(), 1);
}

#[test]
fn failing_pump_can_cancel_siblings() {
    let rig = Rig::with_pour_config(PourConfig {
        cancel_siblings_on_failure: true,
        ..PourConfig::default()
    });
    let session = rig.connect(1);
    session.fail_position(1, TransportError::Timeout);

    let pour = rig.engine.pour_beverage("citrus", 100.0);
    assert_eq!(
        pour.state(),
        PourState::Failed(PourError::Transport(TransportError::Timeout))
    );
    assert_eq!(session.stops(), vec![PumpCommand::stop(0)]);
    assert_eq!(rig.timer.pending(), 0);
}

// ── Composition with real pumps ──────────────────────────────

#[test]
fn sequenced_pours_run_back_to_back() {
    let rig = Rig::new();
    let session = rig.connect(1);
    let water = rig.board.pump_by_name("water").unwrap();
    let carb = rig.board.pump_by_name("carb").unwrap();

    let seq = sequenced(
        "rinse",
        vec![water.timed_pour(500, 30.0), carb.timed_pour(250, 30.0)],
    );
    seq.start();
    assert_eq!(session.starts().len(), 1);
    rig.advance_ms(500);
    assert_eq!(session.starts().len(), 2);
    assert_eq!(session.starts()[1].pos, 4);
    rig.advance_ms(250);
    assert_eq!(seq.state(), PourState::Succeeded);
}

// ── Real timer thread ────────────────────────────────────────

#[test]
fn pour_completes_on_timer_thread() {
    let config = DispenserConfig::default();
    let brandset = Arc::new(brandset());
    let (controller, link) = hardware_link();
    let sim = SimBoard::new(1);
    controller.on_attach(sim.clone());
    let timer = Arc::new(ExecutorTimer::start().unwrap());
    let board = Arc::new(Board::new(&config.board, link, timer).unwrap());
    let resolver = dispenser::adapters::assignments::AssignmentResolver::new(
        Arc::clone(&brandset),
        &board,
        &assignments(),
    );
    let engine = PourEngine::new(
        brandset,
        board,
        resolver,
        Arc::new(RecordingSink::default()),
        config.pour,
    );

    // 0.1 ml at 5 ml/s is 20 ms
    let pour = engine.pour_beverage("citrus", 0.1);
    let started = std::time::Instant::now();
    assert_eq!(pour.wait(), PourOutcome::Succeeded);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sim.starts().len(), 2);
    assert!(sim.starts().iter().all(|c| c.duration_ms == 20));
}
