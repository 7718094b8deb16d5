// codec.rs - Open Interface wire primitives
//
// Everything the robot speaks is big-endian. Stateless by construction.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("expected {expected} byte(s), got {actual}")]
    MalformedInput { expected: usize, actual: usize },

    #[error("invalid command literal: {0:?}")]
    InvalidCommandLiteral(String),
}

/// `[opcode, a_hi, a_lo, b_hi, b_lo]`, two's complement.
pub fn encode_drive_packet(opcode: u8, a: i16, b: i16) -> [u8; 5] {
    let [a_hi, a_lo] = a.to_be_bytes();
    let [b_hi, b_lo] = b.to_be_bytes();
    [opcode, a_hi, a_lo, b_hi, b_lo]
}

// Decoders take exactly N leading bytes; short input is rejected, never padded.
fn take<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CodecError> {
    bytes
        .get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(CodecError::MalformedInput {
            expected: N,
            actual: bytes.len(),
        })
}

pub fn decode_u8(bytes: &[u8]) -> Result<u8, CodecError> {
    take::<1>(bytes).map(u8::from_be_bytes)
}

pub fn decode_i8(bytes: &[u8]) -> Result<i8, CodecError> {
    take::<1>(bytes).map(i8::from_be_bytes)
}

pub fn decode_u16_be(bytes: &[u8]) -> Result<u16, CodecError> {
    take::<2>(bytes).map(u16::from_be_bytes)
}

pub fn decode_i16_be(bytes: &[u8]) -> Result<i16, CodecError> {
    take::<2>(bytes).map(i16::from_be_bytes)
}

/// Parses `"140 3 1 64"` style literals into raw bytes.
pub fn encode_ascii_command(literal: &str) -> Result<Vec<u8>, CodecError> {
    literal
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u8>()
                .map_err(|_| CodecError::InvalidCommandLiteral(token.to_string()))
        })
        .collect()
}
