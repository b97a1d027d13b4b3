//! Row-binary decoder — C3.
//!
//! Parses the backend's `SELECT ... FORMAT RowBinary` encoding:
//! `varuint len | len bytes UTF-8 Path | u32 LE Time | f64 LE Value | u32
//! LE Timestamp`, repeated to the end of the buffer. Grounded on the
//! decode loop in `original_source/backend/render.go`, generalized from
//! its fixed `[1024*1024]byte` scratch buffer to a buffer that grows for
//! metric names longer than 1 MiB instead of truncating them.

use bytes::Buf;

use crate::error::GatewayError;
use crate::point::Point;

/// Initial size of the reusable name-read buffer (spec.md §4.3).
const INITIAL_BUF_SIZE: usize = 1024 * 1024;

/// Decodes every row-binary record in `data` into `Point`s.
///
/// A clean EOF exactly on a record boundary ends the stream
/// successfully. Any short read in the middle of a record (not enough
/// bytes left for the varuint length, the name, or the three fixed
/// fields) is fatal and reported as [`GatewayError::TruncatedResponse`].
pub fn decode_points(mut data: &[u8]) -> Result<Vec<Point>, GatewayError> {
    let mut points = Vec::new();
    let mut scratch = vec![0u8; INITIAL_BUF_SIZE];

    while !data.is_empty() {
        let namelen = read_uvarint(&mut data)?;
        let namelen = namelen as usize;

        if namelen > scratch.len() {
            scratch.resize(namelen, 0);
        }

        read_exact(&mut data, &mut scratch[..namelen])?;
        let name = std::str::from_utf8(&scratch[..namelen])
            .map_err(|_| GatewayError::TruncatedResponse)?
            .to_string();

        if data.remaining() < 4 + 8 + 4 {
            return Err(GatewayError::TruncatedResponse);
        }
        let time = data.get_u32_le();
        let value = data.get_f64_le();
        let timestamp = data.get_u32_le();

        points.push(Point {
            metric: name,
            time: i64::from(time),
            value,
            timestamp: i64::from(timestamp),
        });
    }

    Ok(points)
}

/// Reads a protobuf-style unsigned LEB128 varint, or `None` via error if
/// the slice is empty (a clean end-of-stream at a record boundary is
/// handled by the caller checking `data.is_empty()` first, so any error
/// here means the stream ended mid-varint).
fn read_uvarint(data: &mut &[u8]) -> Result<u64, GatewayError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if data.is_empty() {
            return Err(GatewayError::TruncatedResponse);
        }
        let byte = data.get_u8();
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(GatewayError::TruncatedResponse);
        }
    }
}

fn read_exact(data: &mut &[u8], out: &mut [u8]) -> Result<(), GatewayError> {
    if data.remaining() < out.len() {
        return Err(GatewayError::TruncatedResponse);
    }
    data.copy_to_slice(out);
    Ok(())
}
