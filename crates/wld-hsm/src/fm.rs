//! Function-module request framing.
//!
//! The key-check request carries two big-endian 32-bit arguments followed by
//! a zero-length terminator:
//!
//! | # | Field | Encoding |
//! |---|-------|----------|
//! | 0 | embedded slot | u32, big-endian |
//! | 1 | object handle | u32, big-endian |
//! | 2 | terminator | empty buffer |
//!
//! The function module answers with a status word: [`FM_STATUS_OK`],
//! [`FM_STATUS_ARGUMENTS_BAD`] when the arguments cannot be read, or
//! [`FM_STATUS_HANDLE_INVALID`] when the object is missing or its handle does
//! not match.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use crate::dispatch::MdBuffer;
use crate::token::CkRv;
use crate::types::{EmbeddedSlotId, ObjectHandle};

/// Label of the credential object the function module looks up.
pub const KEY_LABEL: &str = "MyAESKey";

pub const FM_STATUS_OK: u32 = CkRv::OK.0;
pub const FM_STATUS_ARGUMENTS_BAD: u32 = CkRv::ARGUMENTS_BAD.0;
pub const FM_STATUS_HANDLE_INVALID: u32 = CkRv::OBJECT_HANDLE_INVALID.0;

/// Decoded key-check request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCheckRequest {
    pub embedded_slot: EmbeddedSlotId,
    pub handle: ObjectHandle,
}

/// Reasons a key-check request cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FmDecodeError {
    #[error("argument {index} missing")]
    MissingArgument { index: usize },

    #[error("argument {index} is {len} bytes, expected 4")]
    BadLength { index: usize, len: usize },
}

/// Builds the three-buffer key-check request.
pub fn encode_key_check(embedded_slot: EmbeddedSlotId, handle: ObjectHandle) -> Vec<MdBuffer> {
    vec![
        encode_u32(embedded_slot.as_raw()),
        encode_u32(handle.as_raw()),
        MdBuffer::terminator(),
    ]
}

/// Reads the two key-check arguments.
///
/// Buffers after the terminator are ignored, as is a missing terminator.
pub fn decode_key_check(request: &[MdBuffer]) -> Result<KeyCheckRequest, FmDecodeError> {
    let embedded_slot = read_u32(request, 0)?;
    let handle = read_u32(request, 1)?;
    Ok(KeyCheckRequest {
        embedded_slot: EmbeddedSlotId::new(embedded_slot),
        handle: ObjectHandle::new(handle),
    })
}

fn encode_u32(value: u32) -> MdBuffer {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    MdBuffer::new(bytes)
}

fn read_u32(request: &[MdBuffer], index: usize) -> Result<u32, FmDecodeError> {
    let buffer = request
        .iter()
        .take_while(|b| !b.is_terminator())
        .nth(index)
        .ok_or(FmDecodeError::MissingArgument { index })?;

    if buffer.len() != 4 {
        return Err(FmDecodeError::BadLength {
            index,
            len: buffer.len(),
        });
    }
    Ok(BigEndian::read_u32(buffer.as_bytes()))
}
