//! Length-prefix frame codec for the adapter session.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────┬─────────────────────┐
//! │ Length (4B)│ API (1B) │ Payload (Length-1 B)│
//! │ LE u32     │          │                     │
//! └────────────┴──────────┴─────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete frames, so a
//! single socket read may return part of the header, part of the body, or a
//! whole frame. Requests and acknowledges alternate strictly, so bytes that
//! follow a completed frame in the same read are discarded.

use heapless::Vec;

/// Maximum frame body size, API byte included.
pub const MAX_FRAME_SIZE: usize = 4096;

/// Frame header size (4-byte little-endian length).
pub const HEADER_SIZE: usize = 4;

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub api: u8,
    pub payload: &'a [u8],
}

/// Decoder state machine.
enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader { collected: usize },
    /// Header received, reading the body.
    ReadingBody { expected: usize, collected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_SIZE],
    body_buf: [u8; MAX_FRAME_SIZE],
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_SIZE],
            body_buf: [0; MAX_FRAME_SIZE],
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// Returns `Some(Frame)` when a complete frame is available.
    /// The frame borrows the decoder until the next call to `feed`.
    pub fn feed(&mut self, data: &[u8]) -> Option<Frame<'_>> {
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let needed = HEADER_SIZE - *collected;
                    let to_copy = needed.min(data.len() - offset);

                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);

                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let expected = u32::from_le_bytes(self.header_buf) as usize;

                        if expected == 0 || expected > MAX_FRAME_SIZE {
                            // Bad length, resync on the next header.
                            self.state = DecoderState::ReadingHeader { collected: 0 };
                            continue;
                        }

                        self.state = DecoderState::ReadingBody {
                            expected,
                            collected: 0,
                        };
                    }
                }

                DecoderState::ReadingBody { expected, collected } => {
                    let needed = *expected - *collected;
                    let to_copy = needed.min(data.len() - offset);

                    self.body_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);

                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = *expected;
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        return Some(Frame {
                            api: self.body_buf[0],
                            payload: &self.body_buf[1..len],
                        });
                    }
                }
            }
        }

        None // No complete frame yet.
    }

    /// Reset decoder state (e.g. after a session is replaced).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
    }
}

/// Encode one frame into a fixed-capacity buffer.
///
/// Returns `None` if the frame does not fit in `N` bytes or exceeds
/// [`MAX_FRAME_SIZE`].
pub fn encode_frame<const N: usize>(api: u8, payload: &[u8]) -> Option<Vec<u8, N>> {
    let body_len = payload.len() + 1;
    if body_len > MAX_FRAME_SIZE {
        return None;
    }
    let mut out = Vec::new();
    out.extend_from_slice(&(body_len as u32).to_le_bytes()).ok()?;
    out.push(api).ok()?;
    out.extend_from_slice(payload).ok()?;
    Some(out)
}
