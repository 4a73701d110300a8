//! Wire frame encoder/decoder.
//!
//! The device speaks a fixed binary framing over the raw I2C byte stream.
//! This module handles the pure byte-level encoding and decoding: request
//! construction, response validation, and the flow-control field of the
//! firmware chunk sub-protocol.
//!
//! # Frame format
//!
//! ```text
//! request:  0xCD <opcode> 0x01 <len_hi> <len_lo> [<payload>...] <crc_hi> <crc_lo>
//! response: 0xDC <opcode> 0x02 <len_hi> <len_lo> [<payload>...] <trailer x2>
//! ```
//!
//! Every frame carries a 5-byte header and a 2-byte trailer. Responses come
//! back at a fixed total length negotiated per command; a response is valid
//! only if its first byte is [`START_BYTE_RECEIVED`] and its total length
//! matches that expectation. Nothing else is checked — a frame failing
//! either test is treated as no response at all, so the retry layer handles
//! corruption and silence identically.

use bytes::{BufMut, BytesMut};
use pmulib_core::{Error, Result};

/// Start marker for host-to-device frames.
pub const START_BYTE_SENT: u8 = 0xCD;

/// Start marker for device-to-host frames.
pub const START_BYTE_RECEIVED: u8 = 0xDC;

/// Direction marker for request frames.
pub const DIR_REQUEST: u8 = 0x01;

/// Direction marker for response frames.
pub const DIR_RESPONSE: u8 = 0x02;

/// Fixed header width shared by requests and responses.
pub const HEADER_SIZE: usize = 5;

/// Trailer width (CRC on requests; uninspected on responses).
pub const TRAILER_SIZE: usize = 2;

/// Total framing overhead: header plus trailer.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Widest payload an ordinary command may carry.
///
/// The scheduled-event descriptor (10 bytes) is the largest payload in the
/// command set. Firmware chunk frames are exempt: they use
/// [`encode_chunk_request`], which has its own layout.
pub const MAX_REQUEST_PAYLOAD: usize = 10;

/// Reserved chunk id the device reports when every chunk has been received.
pub const CHUNK_COMPLETE: u16 = 0xFFFF;

/// Total response length for a command whose payload is `payload_len` bytes.
pub const fn response_size(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + TRAILER_SIZE
}

/// Response length for single-byte payloads (status codes, u8 readings).
pub const RESPONSE_SIZE_U8: usize = response_size(1);

/// Response length for 16-bit payloads.
pub const RESPONSE_SIZE_I16: usize = response_size(2);

/// Response length for 32-bit payloads.
pub const RESPONSE_SIZE_I32: usize = response_size(4);

/// Response length for float payloads. Same width as the 32-bit class.
pub const RESPONSE_SIZE_F32: usize = response_size(4);

/// Response length for the double class (6 payload bytes on this device).
pub const RESPONSE_SIZE_F64: usize = response_size(6);

/// Response length for 64-bit payloads (also the firmware version string).
pub const RESPONSE_SIZE_I64: usize = response_size(8);

/// A validated response frame.
///
/// Produced by [`decode_response`] once the start marker and total length
/// have checked out. The payload is the region between header and trailer;
/// interpretation (endianness, signedness, status codes) is the caller's
/// business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Opcode byte echoed in the response header.
    pub opcode: u8,
    /// Payload region, `expected_size - 7` bytes.
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    /// First payload byte, used by set commands as an accept/reject status.
    pub fn status(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

/// CRC-16/CCITT-FALSE over `data` (poly 0x1021, init 0xFFFF).
///
/// Fills the request trailer. The device does not echo a checksum worth
/// validating, so this is outbound-only.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Frame an opcode and payload without any width policy applied.
fn build_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.put_u8(START_BYTE_SENT);
    buf.put_u8(opcode);
    buf.put_u8(DIR_REQUEST);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    let crc = crc16_ccitt(&buf);
    buf.put_u16(crc);
    buf.to_vec()
}

/// Encode an ordinary request frame.
///
/// `payload` may be empty (telemetry reads) or up to
/// [`MAX_REQUEST_PAYLOAD`] bytes (multi-field set commands). Anything wider
/// is a caller bug and fails with
/// [`Error::InvalidPayloadLength`](pmulib_core::Error::InvalidPayloadLength)
/// rather than going out on the wire.
///
/// # Example
///
/// ```
/// use pmulib_protocol::frame::{encode_request, crc16_ccitt};
///
/// let frame = encode_request(0x0B, &[0x01]).unwrap();
/// assert_eq!(&frame[..6], &[0xCD, 0x0B, 0x01, 0x00, 0x01, 0x01]);
/// assert_eq!(frame[6..], crc16_ccitt(&frame[..6]).to_be_bytes());
/// ```
pub fn encode_request(opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_REQUEST_PAYLOAD {
        return Err(Error::InvalidPayloadLength {
            expected: MAX_REQUEST_PAYLOAD,
            got: payload.len(),
        });
    }
    Ok(build_frame(opcode, payload))
}

/// Encode a firmware chunk request frame.
///
/// The chunk payload layout rides inside the ordinary framing:
///
/// ```text
/// <count_hi> <count_lo> <id_hi> <id_lo> <declared_len> <data>...
/// ```
///
/// `declared_len` is the number of image bytes in this chunk — the chunk
/// size for all chunks except possibly the last, which declares the true
/// remaining byte count.
pub fn encode_chunk_request(
    opcode: u8,
    chunk_count: u16,
    chunk_id: u16,
    data: &[u8],
) -> Vec<u8> {
    let mut payload = BytesMut::with_capacity(5 + data.len());
    payload.put_u16(chunk_count);
    payload.put_u16(chunk_id);
    payload.put_u8(data.len() as u8);
    payload.put_slice(data);
    build_frame(opcode, &payload)
}

/// Encode a response frame, device-side.
///
/// The library never sends responses; this exists so tests and the mock bus
/// can script byte-exact device replies, and it keeps the round-trip
/// property (`decode_response(encode_response(p)) == p`) checkable in one
/// place.
pub fn encode_response(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.put_u8(START_BYTE_RECEIVED);
    buf.put_u8(opcode);
    buf.put_u8(DIR_RESPONSE);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    let crc = crc16_ccitt(&buf);
    buf.put_u16(crc);
    buf.to_vec()
}

/// Validate and decode a response frame.
///
/// Returns `None` — never an error — unless `raw` is exactly
/// `expected_size` bytes long and starts with [`START_BYTE_RECEIVED`].
/// Short reads, oversized buffers, wrong markers, and empty input all look
/// the same to the caller: no response. That is deliberate; the retry layer
/// re-issues the request without caring why this attempt produced nothing.
///
/// # Example
///
/// ```
/// use pmulib_protocol::frame::{decode_response, encode_response, response_size};
///
/// let raw = encode_response(0x04, &[0x00, 0x00, 0x2F, 0x9E]);
/// let frame = decode_response(&raw, response_size(4)).unwrap();
/// assert_eq!(frame.opcode, 0x04);
/// assert_eq!(frame.payload, vec![0x00, 0x00, 0x2F, 0x9E]);
///
/// // Wrong start marker: not a response at all.
/// let mut bad = raw.clone();
/// bad[0] = 0xCD;
/// assert!(decode_response(&bad, response_size(4)).is_none());
/// ```
pub fn decode_response(raw: &[u8], expected_size: usize) -> Option<ResponseFrame> {
    if expected_size < FRAME_OVERHEAD {
        return None;
    }
    if raw.len() != expected_size {
        return None;
    }
    if raw[0] != START_BYTE_RECEIVED {
        return None;
    }
    Some(ResponseFrame {
        opcode: raw[1],
        payload: raw[HEADER_SIZE..expected_size - TRAILER_SIZE].to_vec(),
    })
}

/// Flow-control field of a firmware chunk reply.
///
/// The device answers every chunk with the id of the chunk it wants next.
/// Decoding it once into this enum keeps sentinel comparisons out of the
/// session control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkAck {
    /// The device expects chunk `next_id` (1-based) in the next frame.
    ///
    /// Re-requesting the in-flight chunk means "send it again"; requesting
    /// the following id means "got it, move on".
    Continue(u16),

    /// Every chunk has been received; streaming is over.
    Complete,
}

impl ChunkAck {
    /// Decode the flow-control field from a chunk reply payload.
    ///
    /// The requested id is the first two payload bytes, big-endian, with
    /// [`CHUNK_COMPLETE`] reserved to mean the transfer is finished.
    pub fn decode(payload: &[u8]) -> Result<ChunkAck> {
        let id = read_u16_be(payload)?;
        if id == CHUNK_COMPLETE {
            Ok(ChunkAck::Complete)
        } else {
            Ok(ChunkAck::Continue(id))
        }
    }
}

/// Read a big-endian u16 from the front of a payload.
pub fn read_u16_be(payload: &[u8]) -> Result<u16> {
    if payload.len() < 2 {
        return Err(Error::Protocol(format!(
            "payload too short for u16: {} bytes",
            payload.len()
        )));
    }
    Ok(u16::from_be_bytes([payload[0], payload[1]]))
}

/// Read a big-endian u32 from the front of a payload.
pub fn read_u32_be(payload: &[u8]) -> Result<u32> {
    if payload.len() < 4 {
        return Err(Error::Protocol(format!(
            "payload too short for u32: {} bytes",
            payload.len()
        )));
    }
    Ok(u32::from_be_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

/// Read a big-endian two's-complement i32 from the front of a payload.
///
/// Only battery current and battery power use this; every other 32-bit
/// field is unsigned. The distinction is per-field protocol knowledge, so
/// callers pick the signed or unsigned reader explicitly.
pub fn read_i32_be(payload: &[u8]) -> Result<i32> {
    if payload.len() < 4 {
        return Err(Error::Protocol(format!(
            "payload too short for i32: {} bytes",
            payload.len()
        )));
    }
    Ok(i32::from_be_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}
