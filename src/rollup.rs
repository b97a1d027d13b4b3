//! Rollup engine — C5.
//!
//! Picks a rollup rule by matching the metric name against an ordered
//! rule list (first match wins; ties are broken by config order), bins
//! each point into the retention whose `age_seconds` threshold is the
//! largest value not exceeding the point's age, aggregates within each
//! `(step, bucket)` group by the rule's function, and re-sorts the
//! result by time. Grounded on spec.md §4.5 and §9's guidance to
//! dispatch aggregation by a tagged variant rather than a function
//! pointer — `AggFunction` below is that tag.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::point::Point;

/// One `(age_seconds, step_seconds)` retention tier.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Retention {
    pub age: i64,
    pub step: i64,
}

/// The aggregation function a rollup rule applies within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunction {
    Avg,
    Sum,
    Min,
    Max,
    Last,
}

/// One rule as read from configuration: an uncompiled regex plus its
/// aggregation function and retentions.
#[derive(Debug, Clone, Deserialize)]
pub struct RollupRule {
    pub regex: String,
    pub function: AggFunction,
    pub retentions: Vec<Retention>,
}

struct CompiledRule {
    regex: Regex,
    function: AggFunction,
    retentions: Vec<Retention>,
}

impl CompiledRule {
    /// The retention whose `age` threshold is the largest value `<=
    /// age`, assuming `retentions` is sorted ascending by `age`.
    fn retention_for(&self, age: i64) -> Retention {
        let mut selected = self.retentions[0];
        for r in &self.retentions {
            if r.age <= age {
                selected = *r;
            } else {
                break;
            }
        }
        selected
    }
}

/// The compiled, validated rollup rule set used at request time.
pub struct RollupRules {
    rules: Vec<CompiledRule>,
}

impl RollupRules {
    /// Compiles and validates a raw rule list from configuration.
    ///
    /// Fails with [`GatewayError::RollupConfigInvalid`] if any rule's
    /// retentions are not sorted by ascending `age` with strictly
    /// increasing `step`, or if a regex fails to compile. If the
    /// supplied list doesn't already end in a catch-all (`.*`) rule,
    /// one is appended (1 point per minute, averaged) so that rule
    /// matching can never come up empty at request time.
    pub fn compile(rules: &[RollupRule]) -> Result<Self, GatewayError> {
        let mut compiled = Vec::with_capacity(rules.len() + 1);
        for rule in rules {
            compiled.push(compile_rule(rule)?);
        }

        let has_catch_all = rules.last().is_some_and(|r| r.regex == ".*");
        if !has_catch_all {
            compiled.push(
                compile_rule(&RollupRule {
                    regex: ".*".to_string(),
                    function: AggFunction::Avg,
                    retentions: vec![Retention { age: 0, step: 60 }],
                })
                .expect("built-in default rule is always valid"),
            );
        }

        Ok(Self { rules: compiled })
    }

    fn match_rule(&self, metric: &str) -> &CompiledRule {
        self.rules
            .iter()
            .find(|r| r.regex.is_match(metric))
            .unwrap_or_else(|| self.rules.last().expect("at least the default rule exists"))
    }

    /// Rolls up a single metric's normalized series at wall-clock `now`.
    ///
    /// Returns the aggregated, time-sorted series and the step used for
    /// alignment: the coarsest step actually applied, when the series
    /// spans more than one retention tier (spec.md §4.5, decided in
    /// DESIGN.md).
    pub fn rollup_metric(&self, points: &[Point], now: i64) -> Result<(Vec<Point>, i64), GatewayError> {
        if points.is_empty() {
            return Err(GatewayError::InternalInvariant(
                "rollup_metric called with an empty group".to_string(),
            ));
        }

        let metric = points[0].metric.clone();
        let rule = self.match_rule(&metric);

        let mut buckets: HashMap<(i64, i64), Bucket> = HashMap::new();
        let mut coarsest_step = 0i64;

        for p in points {
            let age = now - p.time;
            let retention = rule.retention_for(age);
            coarsest_step = coarsest_step.max(retention.step);
            let bucket_time = p.time - p.time.rem_euclid(retention.step);
            buckets
                .entry((retention.step, bucket_time))
                .or_insert_with(Bucket::default)
                .add(p.value, p.time);
        }

        let mut out: Vec<Point> = buckets
            .into_iter()
            .map(|((_, bucket_time), bucket)| Point {
                metric: metric.clone(),
                time: bucket_time,
                value: bucket.finish(rule.function),
                timestamp: 0,
            })
            .collect();
        out.sort_by_key(|p| p.time);

        Ok((out, coarsest_step))
    }
}

fn compile_rule(rule: &RollupRule) -> Result<CompiledRule, GatewayError> {
    if rule.retentions.is_empty() {
        return Err(GatewayError::RollupConfigInvalid(format!(
            "rule {:?} has no retentions",
            rule.regex
        )));
    }
    for pair in rule.retentions.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.age <= a.age || b.step <= a.step {
            return Err(GatewayError::RollupConfigInvalid(format!(
                "rule {:?} retentions are not monotonic: ({}, {}) -> ({}, {})",
                rule.regex, a.age, a.step, b.age, b.step
            )));
        }
    }
    let regex = Regex::new(&rule.regex)
        .map_err(|e| GatewayError::RollupConfigInvalid(format!("bad regex {:?}: {e}", rule.regex)))?;
    Ok(CompiledRule {
        regex,
        function: rule.function,
        retentions: rule.retentions.clone(),
    })
}

#[derive(Default)]
struct Bucket {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
    last_value: f64,
    last_time: i64,
    initialized: bool,
}

impl Bucket {
    fn add(&mut self, value: f64, time: i64) {
        if !self.initialized {
            self.min = value;
            self.max = value;
            self.last_value = value;
            self.last_time = time;
            self.initialized = true;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            if time >= self.last_time {
                self.last_value = value;
                self.last_time = time;
            }
        }
        self.sum += value;
        self.count += 1;
    }

    fn finish(&self, function: AggFunction) -> f64 {
        match function {
            AggFunction::Avg => self.sum / self.count as f64,
            AggFunction::Sum => self.sum,
            AggFunction::Min => self.min,
            AggFunction::Max => self.max,
            AggFunction::Last => self.last_value,
        }
    }
}
