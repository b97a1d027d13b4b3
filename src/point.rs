//! The `Point` type and the normalizer (sort, de-dup, NaN drop) — C3/C4.
//!
//! Grounded on `original_source/backend/render.go` (the `Point`/`ByKey`
//! sort) and `original_source/helper/point/func.go` (`Uniq`/`CleanUp`).
//! The Go source uses a sentinel `MetricID == 0` plus in-place
//! compaction; this keeps the same two-pass compaction shape but the
//! sentinel is an empty `metric` string, since this crate never builds
//! an interned id table for metric names (spec.md §9 flags both designs
//! as acceptable).

use std::cmp::Ordering;

/// A single datapoint read from the backend's row-binary stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub metric: String,
    /// Seconds since epoch.
    pub time: i64,
    /// `NaN` means "unknown/absent".
    pub value: f64,
    /// Write-time of the datapoint; used only to break `(metric, time)`
    /// ties during de-duplication.
    pub timestamp: i64,
}

impl Point {
    fn key(&self) -> (&str, i64) {
        (&self.metric, self.time)
    }
}

/// Sorts `points` by `(metric, time)` ascending, stable so that among
/// equal keys the highest `timestamp` sorts first, then de-duplicates
/// equal `(metric, time)` runs (keeping the first, i.e. highest
/// `timestamp`) and drops NaN values and the empty-metric sentinel.
///
/// Post-condition: the result is strictly increasing under `(metric,
/// time)` and contains no NaNs.
pub fn normalize(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| match a.metric.cmp(&b.metric) {
        Ordering::Equal => match a.time.cmp(&b.time) {
            Ordering::Equal => b.timestamp.cmp(&a.timestamp),
            ord => ord,
        },
        ord => ord,
    });

    dedup_mark(&mut points);
    clean_up(points)
}

/// Marks every point after the first in a `(metric, time)` run for
/// removal by clearing its metric to the empty sentinel.
fn dedup_mark(points: &mut [Point]) {
    let len = points.len();
    let mut run_start = 0;
    for i in 1..len {
        if points[i].key() != points[run_start].key() {
            run_start = i;
            continue;
        }
        points[i].metric.clear();
    }
}

/// Compacts out sentinel (`metric == ""`) and NaN-valued points in a
/// single forward pass, preserving relative order.
fn clean_up(mut points: Vec<Point>) -> Vec<Point> {
    let len = points.len();
    let mut squashed = 0;
    for i in 0..len {
        if points[i].metric.is_empty() || points[i].value.is_nan() {
            squashed += 1;
            continue;
        }
        if squashed > 0 {
            points.swap(i - squashed, i);
        }
    }
    points.truncate(len - squashed);
    points
}

/// A contiguous run of points sharing one metric, already normalized:
/// sorted by `time` ascending with unique times.
pub type Series<'a> = &'a [Point];

/// Splits a normalized point slice into per-metric groups by a linear
/// scan for metric-name boundaries (mirrors the `writeMetric` grouping
/// loop in `original_source/backend/render.go`).
pub fn group_by_metric(points: &[Point]) -> Vec<&[Point]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..points.len() {
        if points[i].metric != points[start].metric {
            groups.push(&points[start..i]);
            start = i;
        }
    }
    if start < points.len() {
        groups.push(&points[start..]);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(metric: &str, time: i64, value: f64, timestamp: i64) -> Point {
        Point {
            metric: metric.to_string(),
            time,
            value,
            timestamp,
        }
    }

    #[test]
    fn drops_nan_and_dedups() {
        let points = vec![
            p("x", 60, f64::NAN, 1),
            p("x", 60, 2.0, 2),
            p("x", 60, 2.0, 1),
            p("x", 120, 1.0, 1),
        ];
        let result = normalize(points);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].time, 60);
        assert_eq!(result[0].value, 2.0);
        assert_eq!(result[1].time, 120);
        assert_eq!(result[1].value, 1.0);
    }

    #[test]
    fn keeps_highest_timestamp_on_tie() {
        let points = vec![p("x", 60, 1.0, 5), p("x", 60, 2.0, 9)];
        let result = normalize(points);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value, 2.0);
        assert_eq!(result[0].timestamp, 9);
    }

    #[test]
    fn idempotent() {
        let points = vec![
            p("b", 60, 1.0, 1),
            p("a", 120, 2.0, 1),
            p("a", 60, 3.0, 1),
        ];
        let once = normalize(points);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn groups_by_metric() {
        let points = normalize(vec![
            p("a", 60, 1.0, 1),
            p("a", 120, 2.0, 1),
            p("b", 60, 3.0, 1),
        ]);
        let groups = group_by_metric(&points);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }
}
