//! The byte layout of a parameter vector.
//!
//! `MAGIC`, then the amount of parameters as a little endian `u64`, then the parameters
//! themselves as little endian `f32`s.

use crate::{ModelErr, Result};

pub const MAGIC: &[u8; 4] = b"FLM1";

type LenType = u64;
const HEADER_SIZE: usize = MAGIC.len() + size_of::<LenType>();
const PARAM_SIZE: usize = size_of::<f32>();

/// Encodes `params` into a new buffer.
pub fn encode(params: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + params.len() * PARAM_SIZE);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(params.len() as LenType).to_le_bytes());

    if cfg!(target_endian = "little") {
        buf.extend_from_slice(bytemuck::cast_slice(params));
    } else {
        params
            .iter()
            .for_each(|p| buf.extend_from_slice(&p.to_le_bytes()));
    }

    buf
}

/// Decodes a parameter vector previously produced by `encode`.
///
/// # Errors
/// `BadMagic` if the header doesn't match, `Truncated` if the length doesn't.
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < HEADER_SIZE || &bytes[..MAGIC.len()] != MAGIC {
        return Err(ModelErr::BadMagic);
    }

    let (header, body) = bytes.split_at(HEADER_SIZE);
    let len: [u8; size_of::<LenType>()] = bytemuck::pod_read_unaligned(&header[MAGIC.len()..]);
    let len = LenType::from_le_bytes(len) as usize;

    let expected = len.saturating_mul(PARAM_SIZE);
    if body.len() != expected {
        return Err(ModelErr::Truncated {
            got: body.len(),
            expected,
        });
    }

    let params = body
        .chunks_exact(PARAM_SIZE)
        .map(|chunk| f32::from_le_bytes(bytemuck::pod_read_unaligned(chunk)))
        .collect();

    Ok(params)
}
