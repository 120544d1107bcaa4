//! Mock board, sink and rig for integration tests.
//!
//! Records every frame sent to the board and every dispense event so tests
//! can assert on the full history without a native adapter.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dispenser::adapters::assignments::AssignmentResolver;
use dispenser::adapters::manual_timer::ManualTimer;
use dispenser::app::events::DispenseEvent;
use dispenser::app::ports::EventSink;
use dispenser::app::service::PourEngine;
use dispenser::brandset::{Beverage, Brandset, RecipePart};
use dispenser::config::{Assignment, DispenserConfig, PourConfig};
use dispenser::drivers::board::Board;
use dispenser::drivers::pump::PumpHandle;
use dispenser::error::TransportError;
use dispenser::link::codec::{FrameDecoder, encode_frame};
use dispenser::link::protocol::PumpCommand;
use dispenser::link::{BoardSession, HardwareLink, LinkController, SessionId, hardware_link};

// ── Recording session ─────────────────────────────────────────

#[derive(Default)]
struct Recorded {
    frames: Vec<(u8, Vec<u8>)>,
    fail_pos: Option<(i32, TransportError)>,
}

/// Board session that acknowledges everything and keeps raw payloads.
pub struct RecordingSession {
    id: SessionId,
    inner: Mutex<Recorded>,
}

#[allow(dead_code)]
impl RecordingSession {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id),
            inner: Mutex::new(Recorded::default()),
        })
    }

    /// Fail every request addressed to `pos` with `error`.
    pub fn fail_position(&self, pos: i32, error: TransportError) {
        self.inner.lock().unwrap().fail_pos = Some((pos, error));
    }

    pub fn frames(&self) -> Vec<(u8, Vec<u8>)> {
        self.inner.lock().unwrap().frames.clone()
    }

    pub fn commands(&self) -> Vec<PumpCommand> {
        self.frames()
            .iter()
            .map(|(_, payload)| PumpCommand::decode(payload).unwrap())
            .collect()
    }

    pub fn starts(&self) -> Vec<PumpCommand> {
        self.commands().into_iter().filter(|c| !c.is_stop()).collect()
    }

    pub fn stops(&self) -> Vec<PumpCommand> {
        self.commands().into_iter().filter(PumpCommand::is_stop).collect()
    }
}

impl BoardSession for RecordingSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send_and_recv(&self, api: u8, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if let (Some((pos, error)), Some(cmd)) = (inner.fail_pos, PumpCommand::decode(payload)) {
            if cmd.pos == pos {
                return Err(error);
            }
        }
        inner.frames.push((api, payload.to_vec()));
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<DispenseEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<DispenseEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DispenseEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Catalog ───────────────────────────────────────────────────

fn beverage(id: &str, parts: &[(&str, f64)]) -> Beverage {
    Beverage {
        id: id.into(),
        name: id.into(),
        rate: parts.iter().map(|(_, r)| r).sum(),
        recipe: parts.iter().map(|(i, r)| RecipePart::new(i, *r)).collect(),
    }
}

/// Citrus (lemon 2.0 + lime 3.0), a two-ingredient single-pump mix,
/// still water and a beverage nobody has installed.
pub fn brandset() -> Brandset {
    Brandset {
        ingredients: Vec::new(),
        beverages: vec![
            beverage("citrus", &[("lemon", 2.0), ("lime", 3.0)]),
            beverage("double-cherry", &[("cherry", 1.0), ("cherry-syrup", 1.5)]),
            beverage("still", &[("water", 30.0)]),
            beverage("kiwi", &[("kiwi", 1.0)]),
        ],
    }
}

pub fn assignments() -> Vec<Assignment> {
    let mut a = Assignment::intrinsics();
    a.push(Assignment::new("cherry-syrup", "micro3"));
    a
}

// ── Rig ───────────────────────────────────────────────────────

pub type TestEngine = PourEngine<Arc<AssignmentResolver>, Arc<RecordingSink>>;

/// Engine wired to a manual timer and a link that starts disconnected.
pub struct Rig {
    controller: Option<LinkController>,
    pub link: HardwareLink,
    pub timer: Arc<ManualTimer>,
    pub board: Arc<Board>,
    pub resolver: Arc<AssignmentResolver>,
    pub sink: Arc<RecordingSink>,
    pub engine: TestEngine,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_pour_config(PourConfig::default())
    }

    pub fn with_pour_config(pour: PourConfig) -> Self {
        let config = DispenserConfig::default();
        let brandset = Arc::new(brandset());
        let (controller, link) = hardware_link();
        let timer = Arc::new(ManualTimer::new());
        let board = Arc::new(Board::new(&config.board, link.clone(), timer.clone()).unwrap());
        let resolver = Arc::new(AssignmentResolver::new(
            Arc::clone(&brandset),
            &board,
            &assignments(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let engine = PourEngine::new(
            brandset,
            Arc::clone(&board),
            Arc::clone(&resolver),
            Arc::clone(&sink),
            pour,
        );
        Self {
            controller: Some(controller),
            link,
            timer,
            board,
            resolver,
            sink,
            engine,
        }
    }

    pub fn controller(&self) -> &LinkController {
        self.controller.as_ref().expect("controller handed off")
    }

    /// Hand the link writer to a connection-event source.
    pub fn take_controller(&mut self) -> LinkController {
        self.controller.take().expect("controller handed off")
    }

    /// Attach a fresh recording session and return it.
    pub fn connect(&self, id: u64) -> Arc<RecordingSession> {
        let session = RecordingSession::new(id);
        self.controller().on_attach(session.clone());
        session
    }

    pub fn pump(&self, name: &str) -> PumpHandle {
        self.board.pump_by_name(name).unwrap().handle()
    }

    pub fn advance_ms(&self, ms: u64) -> usize {
        self.timer.advance(Duration::from_millis(ms))
    }
}

// ── Fake native adapter over TCP ──────────────────────────────

/// Connects to an adapter listener and acknowledges every frame.
pub struct FakeAdapter {
    stream: TcpStream,
    commands: Arc<Mutex<Vec<PumpCommand>>>,
    reader: Option<JoinHandle<()>>,
}

#[allow(dead_code)]
impl FakeAdapter {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let (mut rx, seen) = (stream.try_clone().unwrap(), commands.clone());
        let reader = std::thread::spawn(move || {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 256];
            loop {
                let n = match rx.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                if let Some(frame) = decoder.feed(&buf[..n]) {
                    let api = frame.api;
                    if let Some(cmd) = PumpCommand::decode(frame.payload) {
                        seen.lock().unwrap().push(cmd);
                    }
                    let ack = encode_frame::<8>(api, &[]).unwrap();
                    if rx.write_all(&ack).is_err() {
                        return;
                    }
                }
            }
        });
        Self {
            stream,
            commands,
            reader: Some(reader),
        }
    }

    pub fn commands(&self) -> Vec<PumpCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Close the connection and wait for the reader to exit.
    pub fn hang_up(mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            reader.join().unwrap();
        }
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
