//! Float16 encoding for compact vector files.
//!
//! Conversion goes through [`half::f16`], which rounds to nearest-even and
//! keeps NaN payloads quiet.

use half::f16;

/// Bytes per element for each on-disk dtype.
pub const BYTES_PER_F32: usize = 4;
pub const BYTES_PER_F16: usize = 2;

pub fn f32_to_f16_bits(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

pub fn f16_bits_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Value as it reads back from an f16 vector file.
pub fn quantise_f16(value: f32) -> f32 {
    f16::from_f32(value).to_f32()
}

/// Little-endian float32 bytes.
pub fn encode_f32(values: &[f32], out: &mut Vec<u8>) {
    out.reserve(values.len() * BYTES_PER_F32);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Little-endian float16 bytes.
pub fn encode_f16(values: &[f32], out: &mut Vec<u8>) {
    out.reserve(values.len() * BYTES_PER_F16);
    for value in values {
        out.extend_from_slice(&f32_to_f16_bits(*value).to_le_bytes());
    }
}

pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_F32)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn decode_f16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_F16)
        .map(|c| f16_bits_to_f32(u16::from_le_bytes([c[0], c[1]])))
        .collect()
}
