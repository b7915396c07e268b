// ABOUTME: Connect protocol streaming envelopes used by the E2B envd process API
// ABOUTME: Each frame is one flag byte, a big-endian u32 length, then a JSON payload

use super::{ProviderError, Result};

/// Set on the trailing frame that carries end-of-stream metadata
pub const FLAG_END_STREAM: u8 = 0b0000_0010;
const FLAG_COMPRESSED: u8 = 0b0000_0001;
const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }
}

/// Wrap a single JSON message for a server-streaming request
pub fn encode(payload: &[u8]) -> Vec<u8> {
    encode_with_flags(0, payload)
}

pub fn encode_with_flags(flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(flags);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental decoder; feed response chunks as they arrive
#[derive(Debug, Default)]
pub struct Decoder {
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, or `None` if more bytes are needed
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let flags = self.buf[0];
        if flags & FLAG_COMPRESSED != 0 {
            return Err(ProviderError::ProtocolError(
                "compressed envelopes are not supported".to_string(),
            ));
        }

        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buf.drain(..HEADER_LEN + len);
        Ok(Some(Frame { flags, payload }))
    }

    /// Bytes received that do not yet form a whole frame
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}
