//! Flat `f32` buffers exchanged with packing workers.
//!
//! Request: `[id, width, height, options, w0, h0, w1, h1, ...]`.
//! Response: the same buffer, header rewritten with the packed width and
//! height, and the pairs replaced by `left, top` slots.

use thiserror::Error;

use super::packer::{LayoutId, LayoutRequest, LayoutResult, Packer, PackerOptions};
use crate::sys::geometry::Size;

pub const HEADER_LEN: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("Buffer of {0} values is shorter than the header")]
    Truncated(usize),
    #[error("Payload of {0} values does not hold whole pairs")]
    UnpairedPayload(usize),
    #[error("Invalid layout id {0}")]
    InvalidId(f32),
    #[error("Unknown option bits {0:#x}")]
    InvalidOptions(u32),
}

pub fn encode_request(request: &LayoutRequest) -> Vec<f32> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + request.sizes.len() * 2);
    buffer.extend_from_slice(&[
        request.id.0 as f32,
        request.container.width as f32,
        request.container.height as f32,
        request.options.bits() as f32,
    ]);
    for size in &request.sizes {
        buffer.push(size.width as f32);
        buffer.push(size.height as f32);
    }
    buffer
}

pub fn decode_request(buffer: &[f32]) -> Result<LayoutRequest, WireError> {
    let (id, width, height, options) = decode_header(buffer)?;
    let options = decode_options(options)?;
    let sizes = buffer[HEADER_LEN..]
        .chunks_exact(2)
        .map(|pair| Size::new(f64::from(pair[0]), f64::from(pair[1])))
        .collect();
    Ok(LayoutRequest {
        id,
        container: Size::new(width, height),
        options,
        sizes,
    })
}

/// Writes `result` into `buffer`, reusing its allocation.
pub fn encode_response(result: &LayoutResult, options: PackerOptions, mut buffer: Vec<f32>) -> Vec<f32> {
    buffer.clear();
    buffer.reserve(HEADER_LEN + result.slots.len());
    buffer.extend_from_slice(&[
        result.id.0 as f32,
        result.width as f32,
        result.height as f32,
        options.bits() as f32,
    ]);
    buffer.extend(result.slots.iter().map(|v| *v as f32));
    buffer
}

pub fn decode_response(buffer: &[f32]) -> Result<LayoutResult, WireError> {
    let (id, width, height, _) = decode_header(buffer)?;
    Ok(LayoutResult {
        id,
        width,
        height,
        slots: buffer[HEADER_LEN..].iter().map(|v| f64::from(*v)).collect(),
    })
}

/// Worker side of the protocol: decodes a request, packs it and turns the
/// same buffer into the response.
pub fn process_buffer(packer: &mut Packer, buffer: Vec<f32>) -> Result<Vec<f32>, WireError> {
    let request = decode_request(&buffer)?;
    let result = packer.run(&request);
    Ok(encode_response(&result, request.options, buffer))
}

fn decode_header(buffer: &[f32]) -> Result<(LayoutId, f64, f64, f32), WireError> {
    if buffer.len() < HEADER_LEN {
        return Err(WireError::Truncated(buffer.len()));
    }
    let payload = buffer.len() - HEADER_LEN;
    if payload % 2 != 0 {
        return Err(WireError::UnpairedPayload(payload));
    }
    let id = buffer[0];
    if !id.is_finite() || id < 0.0 || id.fract() != 0.0 {
        return Err(WireError::InvalidId(id));
    }
    Ok((LayoutId(id as u64), f64::from(buffer[1]), f64::from(buffer[2]), buffer[3]))
}

fn decode_options(raw: f32) -> Result<PackerOptions, WireError> {
    let bits = raw as u32;
    if raw.fract() != 0.0 || raw < 0.0 {
        return Err(WireError::InvalidOptions(bits));
    }
    PackerOptions::from_bits(bits).ok_or(WireError::InvalidOptions(bits))
}
