//! Series aligner — C6.
//!
//! Gap-fills a rolled series onto a contiguous step grid covering
//! `[start, end]`, emitting [`AlignedValue::Null`] markers for absent
//! buckets. Grounded on the `writeMetric` alignment loop in
//! `original_source/backend/render.go` (shared, byte-for-byte, by both
//! the pickle and protobuf encoders there — this module is the one
//! place that logic lives here, consumed by both C7 and C8).

use crate::point::Point;

/// One output slot: either a real value or an absent bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignedValue {
    Value(f64),
    Null,
}

/// An aligned, gap-filled window: `values.len() == (end - start)/step + 1`.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub values: Vec<AlignedValue>,
}

/// Aligns `points` (sorted ascending by time, already rolled to `step`)
/// onto `[from, until]`'s step grid.
///
/// `start = ceil(from/step)*step`, `end = floor(until/step)*step`. Any
/// point outside `[from, until]` is skipped; gaps between consecutive
/// kept points are filled with null markers, as are leading/trailing
/// gaps relative to `start`/`end`.
pub fn align(points: &[Point], from: i64, until: i64, step: i64) -> AlignedSeries {
    let mut start = from - from.rem_euclid(step);
    if start < from {
        start += step;
    }
    let end = until - until.rem_euclid(step);

    let mut values = Vec::new();
    let mut last = start - step;

    for point in points {
        if point.time < from || point.time > until {
            continue;
        }

        if point.time > last + step {
            let nulls = (point.time - last) / step - 1;
            for _ in 0..nulls {
                values.push(AlignedValue::Null);
            }
        }

        values.push(AlignedValue::Value(point.value));
        last = point.time;
    }

    if end > last {
        let nulls = (end - last) / step;
        for _ in 0..nulls {
            values.push(AlignedValue::Null);
        }
    }

    AlignedSeries {
        start,
        end,
        step,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(time: i64, value: f64) -> Point {
        Point {
            metric: "x".to_string(),
            time,
            value,
            timestamp: time,
        }
    }

    #[test]
    fn fully_aligned_series_has_no_gaps() {
        let points = vec![p(60, 1.0), p(120, 2.0), p(180, 3.0)];
        let aligned = align(&points, 60, 180, 60);
        assert_eq!(aligned.start, 60);
        assert_eq!(aligned.end, 180);
        assert_eq!(
            aligned.values,
            vec![
                AlignedValue::Value(1.0),
                AlignedValue::Value(2.0),
                AlignedValue::Value(3.0),
            ]
        );
    }

    #[test]
    fn fills_gap_with_null() {
        let points = vec![p(60, 1.0), p(180, 3.0)];
        let aligned = align(&points, 60, 180, 60);
        assert_eq!(
            aligned.values,
            vec![
                AlignedValue::Value(1.0),
                AlignedValue::Null,
                AlignedValue::Value(3.0),
            ]
        );
    }

    #[test]
    fn completeness_exact_count_and_bounds() {
        let points = vec![p(120, 2.0)];
        let aligned = align(&points, 61, 241, 60);
        // start = ceil(61/60)*60 = 120, end = floor(241/60)*60 = 240
        assert_eq!(aligned.start, 120);
        assert_eq!(aligned.end, 240);
        let expected_len = ((aligned.end - aligned.start) / 60 + 1) as usize;
        assert_eq!(aligned.values.len(), expected_len);
    }

    #[test]
    fn drops_points_outside_from_until() {
        let points = vec![p(0, 9.0), p(60, 1.0), p(999_999, 9.0)];
        let aligned = align(&points, 60, 120, 60);
        assert_eq!(aligned.values.len(), 2);
        assert_eq!(aligned.values[0], AlignedValue::Value(1.0));
        assert_eq!(aligned.values[1], AlignedValue::Null);
    }
}
