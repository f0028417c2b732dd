//! RLP helpers for arbitrary-precision integers.
//!
//! Stakes, deposits and difficulties are [`U256`] values that must encode
//! exactly like a minimal big-endian byte string: zero is the empty string and
//! leading zero bytes are rejected on decode.

use alloy_primitives::U256;
use rlp::{DecoderError, Rlp, RlpStream};

/// Returns the minimal big-endian encoding of `value`.
pub fn to_be_trimmed(value: &U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Appends `value` to the stream as a canonical integer.
pub fn append_u256(s: &mut RlpStream, value: &U256) {
    s.append(&to_be_trimmed(value));
}

/// Decodes a canonical integer item.
pub fn decode_u256(rlp: &Rlp<'_>) -> Result<U256, DecoderError> {
    let bytes: Vec<u8> = rlp.as_val()?;
    if bytes.len() > 32 {
        return Err(DecoderError::RlpIsTooBig);
    }
    if bytes.first() == Some(&0) {
        return Err(DecoderError::RlpInvalidIndirection);
    }
    Ok(U256::from_be_slice(&bytes))
}

/// Decodes the integer at list position `index`.
pub fn u256_at(rlp: &Rlp<'_>, index: usize) -> Result<U256, DecoderError> {
    decode_u256(&rlp.at(index)?)
}
