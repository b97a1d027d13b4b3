//! End-to-end scenarios from spec.md §8, driven directly against the
//! pure pipeline stages (decode → normalize → group → rollup → align →
//! encode) without a live backend — the transport itself is out of
//! scope (spec.md §1) and covered separately by `transport`'s own unit
//! tests.

use ch_graphite_gw::align::align;
use ch_graphite_gw::finder::glob::build_where;
use ch_graphite_gw::pickle::{self, EMPTY_PICKLED_LIST};
use ch_graphite_gw::point::{group_by_metric, normalize, Point};
use ch_graphite_gw::rollup::RollupRules;

fn p(metric: &str, time: i64, value: f64, timestamp: i64) -> Point {
    Point {
        metric: metric.to_string(),
        time,
        value,
        timestamp,
    }
}

#[test]
fn scenario_1_empty_set_is_pre_serialized_empty_list() {
    let out = pickle::encode(Vec::new(), std::iter::empty()).unwrap();
    assert_eq!(out, EMPTY_PICKLED_LIST);
}

#[test]
fn scenario_2_single_path_aligned_has_no_gaps() {
    let points = normalize(vec![p("x", 60, 1.0, 1), p("x", 120, 2.0, 1), p("x", 180, 3.0, 1)]);
    let groups = group_by_metric(&points);
    assert_eq!(groups.len(), 1);

    let rules = RollupRules::compile(&[]).unwrap();
    let (rolled, step) = rules.rollup_metric(groups[0], 1_000_000_000).unwrap();
    let aligned = align(&rolled, 60, 180, step);

    assert_eq!(aligned.start, 60);
    assert_eq!(aligned.end, 180);
    let values: Vec<f64> = aligned
        .values
        .iter()
        .map(|v| match v {
            ch_graphite_gw::align::AlignedValue::Value(f) => *f,
            ch_graphite_gw::align::AlignedValue::Null => f64::NAN,
        })
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
}

#[test]
fn scenario_3_gap_filling_inserts_null() {
    let points = normalize(vec![p("x", 60, 1.0, 1), p("x", 180, 3.0, 1)]);
    let groups = group_by_metric(&points);
    let rules = RollupRules::compile(&[]).unwrap();
    let (rolled, step) = rules.rollup_metric(groups[0], 1_000_000_000).unwrap();
    let aligned = align(&rolled, 60, 180, step);

    assert_eq!(aligned.values.len(), 3);
    assert!(matches!(aligned.values[1], ch_graphite_gw::align::AlignedValue::Null));
}

#[test]
fn scenario_4_nan_drop_and_dedup() {
    let points = vec![
        p("x", 60, f64::NAN, 1),
        p("x", 60, 2.0, 1),
        p("x", 60, 2.0, 1),
        p("x", 120, 1.0, 1),
    ];
    let normalized = normalize(points);
    assert_eq!(normalized.len(), 2);
    assert_eq!(normalized[0].time, 60);
    assert_eq!(normalized[0].value, 2.0);
    assert_eq!(normalized[1].time, 120);
    assert_eq!(normalized[1].value, 1.0);
}

#[test]
fn scenario_5_glob_predicate_for_single_trailing_star() {
    let (w, expand) = build_where("a.b.*").unwrap();
    assert!(!expand);
    let sql = w.to_string();
    assert!(sql.contains("Level = 3"));
    assert!(sql.contains("Path LIKE 'a.b.%'"));
}

#[test]
fn scenario_6_expand_marker_drops_level_and_needs_limit() {
    let (w, expand) = build_where("a.b.**").unwrap();
    assert!(expand);
    assert!(!w.to_string().contains("Level ="));
}
