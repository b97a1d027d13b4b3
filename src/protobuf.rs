//! Protobuf encoder — C8.
//!
//! Hand-rolled wire encoding of the `MultiFetchResponse`/`FetchResponse`
//! messages spec.md §4.8 describes, grounded the same way
//! `original_source/backend/render.go` builds these by hand rather than
//! through `protoc`-generated bindings: manual varint/tag writing, no
//! `.proto` file or `prost` codegen anywhere in this crate.
//!
//! Wire layout (field numbers match the reference Graphite carbonapi v2
//! schema):
//!
//! ```text
//! FetchResponse {
//!   1: string name
//!   2: int64 start_time
//!   3: int64 stop_time
//!   4: int64 step_time
//!   5: repeated double values    (unpacked fixed64, per spec.md §4.8)
//!   6: repeated bool is_absent   (unpacked varint, per spec.md §4.8)
//! }
//! MultiFetchResponse {
//!   1: repeated FetchResponse metrics
//! }
//! ```

use crate::align::{AlignedSeries, AlignedValue};

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn write_tag(out: &mut Vec<u8>, field: u32, wire_type: u8) {
    write_varint(out, ((field as u64) << 3) | wire_type as u64);
}

fn write_string_field(out: &mut Vec<u8>, field: u32, s: &str) {
    write_tag(out, field, 2);
    write_varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

fn write_varint_field(out: &mut Vec<u8>, field: u32, v: i64) {
    write_tag(out, field, 0);
    write_varint(out, v as u64);
}

/// Writes `values` as an unpacked repeated `fixed64` field: spec.md
/// §4.8 gives this field wire type "64-bit fixed" (wire type 1), not
/// the length-delimited "packed" encoding — matching the proto2
/// `FetchResponse` message real Graphite/carbonapi consumers expect,
/// which declares no `[packed=true]` option.
fn write_doubles(out: &mut Vec<u8>, field: u32, values: &[f64]) {
    for v in values {
        write_tag(out, field, 1);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Writes `isAbsent` as an unpacked repeated `varint` field (wire type
/// 0), one tag+value pair per bucket, per spec.md §4.8.
fn write_bools(out: &mut Vec<u8>, field: u32, values: &[bool]) {
    for v in values {
        write_tag(out, field, 0);
        out.push(if *v { 1 } else { 0 });
    }
}

/// Encodes one `FetchResponse` message body (without an outer tag/length
/// — the caller, [`encode_multi`], embeds it as a length-delimited
/// field of the enclosing `MultiFetchResponse`).
fn encode_fetch_response(name: &str, aligned: &AlignedSeries) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_field(&mut out, 1, name);
    write_varint_field(&mut out, 2, aligned.start);
    write_varint_field(&mut out, 3, aligned.end);
    write_varint_field(&mut out, 4, aligned.step);

    let values: Vec<f64> = aligned
        .values
        .iter()
        .map(|v| match v {
            AlignedValue::Value(f) => *f,
            AlignedValue::Null => 0.0,
        })
        .collect();
    let is_absent: Vec<bool> = aligned
        .values
        .iter()
        .map(|v| matches!(v, AlignedValue::Null))
        .collect();

    write_doubles(&mut out, 5, &values);
    write_bools(&mut out, 6, &is_absent);
    out
}

/// Encodes a full `MultiFetchResponse`. An empty `series` iterator
/// produces the empty byte string — a `MultiFetchResponse` with zero
/// `metrics` entries serializes to nothing, so no special-casing is
/// needed the way [`crate::pickle::EMPTY_PICKLED_LIST`] requires one.
pub fn encode_multi<'a>(series: impl Iterator<Item = (&'a str, &'a AlignedSeries)>) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, aligned) in series {
        let body = encode_fetch_response(name, aligned);
        write_tag(&mut out, 1, 2);
        write_varint(&mut out, body.len() as u64);
        out.extend_from_slice(&body);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned(start: i64, end: i64, step: i64, values: Vec<AlignedValue>) -> AlignedSeries {
        AlignedSeries {
            start,
            end,
            step,
            values,
        }
    }

    fn read_varint(buf: &[u8], pos: &mut usize) -> u64 {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = buf[*pos];
            *pos += 1;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        result
    }

    #[test]
    fn empty_series_set_encodes_to_empty_bytes() {
        let out = encode_multi(std::iter::empty());
        assert!(out.is_empty());
    }

    #[test]
    fn single_metric_round_trips_manually() {
        let series = aligned(
            60,
            180,
            60,
            vec![
                AlignedValue::Value(1.5),
                AlignedValue::Null,
                AlignedValue::Value(3.5),
            ],
        );
        let out = encode_multi(std::iter::once(("x.y", &series)));

        let mut pos = 0;
        let tag = read_varint(&out, &mut pos);
        assert_eq!(tag, (1 << 3) | 2); // field 1 (metrics), length-delimited
        let len = read_varint(&out, &mut pos) as usize;
        let body = &out[pos..pos + len];
        pos += len;
        assert_eq!(pos, out.len());

        // body starts with the name field
        let mut bpos = 0;
        let name_tag = read_varint(body, &mut bpos);
        assert_eq!(name_tag, (1 << 3) | 2);
        let name_len = read_varint(body, &mut bpos) as usize;
        assert_eq!(&body[bpos..bpos + name_len], b"x.y");
    }

    #[test]
    fn values_use_unpacked_little_endian_fixed64() {
        let series = aligned(60, 60, 60, vec![AlignedValue::Value(2.0)]);
        let body = encode_fetch_response("m", &series);
        // field 5, wire type 1 (fixed64), followed by the LE double
        let tag = (5 << 3) | 1u8;
        let pos = body.iter().position(|&b| b == tag).expect("values tag present");
        assert_eq!(&body[pos + 1..pos + 9], &2.0f64.to_le_bytes());
    }

    #[test]
    fn is_absent_marks_null_slots() {
        let series = aligned(
            60,
            180,
            60,
            vec![
                AlignedValue::Value(1.0),
                AlignedValue::Null,
                AlignedValue::Value(1.0),
            ],
        );
        let body = encode_fetch_response("m", &series);
        // field 6, wire type 0 (varint), one tag+value pair per bucket
        let tag = (6 << 3) | 0u8;
        let positions: Vec<usize> = body
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == tag)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(positions.len(), 3);
        let bools: Vec<u8> = positions.iter().map(|&p| body[p + 1]).collect();
        assert_eq!(bools, vec![0, 1, 0]);
    }
}
