//! Board session over a TCP connection from the native adapter.
//!
//! Each request is written as one frame and the call blocks until the
//! adapter acknowledges it with a frame carrying the same api code and an
//! empty payload, or until the acknowledge timeout expires. Any failure
//! other than an oversized request tears the connection down and reports
//! the session as closed, since the stream can no longer be trusted to be
//! frame-aligned.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::error::TransportError;
use crate::link::codec::{FrameDecoder, HEADER_SIZE, MAX_FRAME_SIZE, encode_frame};
use crate::link::{BoardSession, SessionId};

const READ_BUF_SIZE: usize = 64;

/// Depth of the session-closed notification channel.
pub const CLOSED_DEPTH: usize = 4;

/// Session-closed notifications: sessions → adapter listener.
pub type ClosedChannel = Channel<CriticalSectionRawMutex, SessionId, CLOSED_DEPTH>;

struct Wire {
    stream: TcpStream,
    decoder: FrameDecoder,
    closed: bool,
}

pub struct TcpSession {
    id: SessionId,
    wire: Mutex<Wire>,
    closed_tx: Arc<ClosedChannel>,
}

impl TcpSession {
    pub fn new(
        id: SessionId,
        stream: TcpStream,
        ack_timeout: Duration,
        closed_tx: Arc<ClosedChannel>,
    ) -> std::io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(ack_timeout))?;
        Ok(Self {
            id,
            wire: Mutex::new(Wire {
                stream,
                decoder: FrameDecoder::new(),
                closed: false,
            }),
            closed_tx,
        })
    }

    fn exchange(wire: &mut Wire, api: u8, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame::<{ HEADER_SIZE + MAX_FRAME_SIZE }>(api, payload)
            .ok_or(TransportError::FrameTooLarge)?;
        wire.decoder.reset();
        wire.stream.write_all(&frame)?;
        wire.stream.flush()?;

        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let n = wire.stream.read(&mut buf)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            if let Some(ack) = wire.decoder.feed(&buf[..n]) {
                return if ack.api == api && ack.payload.is_empty() {
                    Ok(())
                } else {
                    Err(TransportError::BadAck)
                };
            }
        }
    }
}

impl BoardSession for TcpSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send_and_recv(&self, api: u8, payload: &[u8]) -> Result<(), TransportError> {
        let mut wire = self.wire.lock().unwrap_or_else(PoisonError::into_inner);
        if wire.closed {
            return Err(TransportError::Closed);
        }
        let result = Self::exchange(&mut wire, api, payload);
        match result {
            Ok(()) => debug!("{}: api {} acked", self.id, api),
            Err(TransportError::FrameTooLarge) => {}
            Err(e) => {
                warn!("{}: {}, closing", self.id, e);
                wire.closed = true;
                let _ = wire.stream.shutdown(Shutdown::Both);
                if self.closed_tx.try_send(self.id).is_err() {
                    warn!("{}: closed channel full", self.id);
                }
            }
        }
        result
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        let wire = self.wire.get_mut().unwrap_or_else(PoisonError::into_inner);
        let _ = wire.stream.shutdown(Shutdown::Both);
    }
}
