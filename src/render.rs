//! Render orchestrator — C9.
//!
//! Wires every other module together per spec.md §4.9: parse request
//! params, strip/remember the extra-prefix, run the finder, short-circuit
//! on an empty match set, build and run the data-table SQL, decode,
//! normalize, group, roll up, align, and encode — re-prepending the
//! extra-prefix on the way out.

use chrono::{TimeZone, Utc};

use crate::align::{align, AlignedSeries};
use crate::config::Config;
use crate::decode::decode_points;
use crate::error::GatewayError;
use crate::finder::glob::quote;
use crate::finder::{build_finder, Finder};
use crate::pickle;
use crate::point::{group_by_metric, normalize};
use crate::protobuf;
use crate::rollup::RollupRules;
use crate::transport;

/// Output wire format requested via `?format=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pickle,
    Protobuf,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        match s {
            "pickle" => Ok(Format::Pickle),
            "protobuf" => Ok(Format::Protobuf),
            other => Err(GatewayError::BadRequest(format!("unsupported format {other:?}"))),
        }
    }
}

/// A parsed `/metrics/find` request.
pub struct FindRequest {
    pub query: String,
    pub from: i64,
    pub until: i64,
    pub format: Format,
}

/// A parsed `/render` request.
pub struct RenderRequest {
    pub target: String,
    pub from: i64,
    pub until: i64,
    pub format: Format,
}

fn reject_quotes(s: &str) -> Result<(), GatewayError> {
    if s.contains('\'') {
        return Err(GatewayError::BadRequest(format!(
            "query must not contain a single quote: {s:?}"
        )));
    }
    Ok(())
}

/// Strips `prefix` (plus a following `.`) from `target` if present;
/// returns the stripped target and the prefix to re-prepend on output
/// (empty if `prefix` is unset or didn't match).
fn strip_prefix<'a>(target: &'a str, prefix: &str) -> (&'a str, &'a str) {
    if prefix.is_empty() {
        return (target, "");
    }
    if let Some(rest) = target.strip_prefix(&format!("{prefix}.")) {
        (rest, prefix)
    } else if target == prefix {
        ("", prefix)
    } else {
        (target, "")
    }
}

fn date_string(unix_seconds: i64) -> String {
    Utc.timestamp_opt(unix_seconds, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// Handles `/metrics/find`: runs the finder and returns the matched
/// path list, pickle/protobuf-encoded as a flat list of names.
pub async fn find(
    config: &Config,
    client: &reqwest::Client,
    req: &FindRequest,
) -> Result<Vec<u8>, GatewayError> {
    reject_quotes(&req.query)?;

    let mut finder = build_finder(config, &req.query, req.from, req.until, true)?;
    finder.execute(client, &req.query, req.from, req.until).await?;
    let paths = finder.series();

    let names: Vec<String> = paths
        .iter()
        .map(|p| finder.abs(p))
        .map(|p| String::from_utf8_lossy(&p).trim_end_matches('.').to_string())
        .collect();

    encode_find_response(req.format, &names)
}

fn encode_find_response(format: Format, names: &[String]) -> Result<Vec<u8>, GatewayError> {
    // Re-use the series render encoders with a zero-width placeholder
    // series per name: the find response only carries names, never
    // values, but the wire containers are shared with /render.
    let placeholder = AlignedSeries {
        start: 0,
        end: 0,
        step: 60,
        values: Vec::new(),
    };
    match format {
        Format::Pickle => {
            let out = pickle::encode(
                Vec::new(),
                names.iter().map(|n| (n.as_str(), &placeholder)),
            )
            .map_err(|e| GatewayError::InternalInvariant(e.to_string()))?;
            Ok(out)
        }
        Format::Protobuf => Ok(protobuf::encode_multi(names.iter().map(|n| (n.as_str(), &placeholder)))),
    }
}

/// Handles `/render`: the full finder → data-fetch → decode → normalize
/// → rollup → align → encode pipeline.
pub async fn render(
    config: &Config,
    client: &reqwest::Client,
    rollup_rules: &RollupRules,
    now: i64,
    req: &RenderRequest,
) -> Result<Vec<u8>, GatewayError> {
    reject_quotes(&req.target)?;

    let (stripped_target, prefix) = strip_prefix(&req.target, &config.clickhouse.extra_prefix);

    let mut finder = build_finder(config, stripped_target, req.from, req.until, false)?;
    finder.execute(client, stripped_target, req.from, req.until).await?;
    let paths = finder.series();

    if paths.is_empty() {
        return match req.format {
            Format::Pickle => Ok(pickle::EMPTY_PICKLED_LIST.to_vec()),
            Format::Protobuf => Ok(Vec::new()),
        };
    }

    let quoted_paths: Vec<String> = paths
        .iter()
        .map(|p| finder.abs(p))
        .map(|p| quote(&String::from_utf8_lossy(&p)))
        .collect();
    let sql = format!(
        "SELECT Path, Time, Value, Timestamp FROM {} WHERE Path IN ({}) AND (Date BETWEEN {} AND {}) AND (Time BETWEEN {} AND {}) FORMAT RowBinary",
        config.clickhouse.data_table,
        quoted_paths.join(", "),
        quote(&date_string(req.from)),
        quote(&date_string(req.until)),
        req.from,
        req.until,
    );

    let body = transport::query(client, &config.clickhouse.url, &sql, config.clickhouse.data_timeout()).await?;
    let points = decode_points(&body)?;
    let normalized = normalize(points);

    let mut series: Vec<(String, AlignedSeries)> = Vec::new();
    for group in group_by_metric(&normalized) {
        let (rolled, step) = rollup_rules.rollup_metric(group, now)?;
        let aligned = align(&rolled, req.from, req.until, step);
        let mut name = group[0].metric.clone();
        if !prefix.is_empty() {
            name = format!("{prefix}.{name}");
        }
        series.push((name, aligned));
    }

    match req.format {
        Format::Pickle => pickle::encode(Vec::new(), series.iter().map(|(n, s)| (n.as_str(), s)))
            .map_err(|e| GatewayError::InternalInvariant(e.to_string())),
        Format::Protobuf => Ok(protobuf::encode_multi(series.iter().map(|(n, s)| (n.as_str(), s)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_known_values() {
        assert_eq!(Format::parse("pickle").unwrap(), Format::Pickle);
        assert_eq!(Format::parse("protobuf").unwrap(), Format::Protobuf);
        assert!(Format::parse("json").is_err());
    }

    #[test]
    fn reject_quotes_catches_injection_attempt() {
        assert!(reject_quotes("a.b'; DROP TABLE").is_err());
        assert!(reject_quotes("a.b.c").is_ok());
    }

    #[test]
    fn strip_prefix_removes_configured_prefix() {
        let (t, p) = strip_prefix("dc1.a.b", "dc1");
        assert_eq!(t, "a.b");
        assert_eq!(p, "dc1");

        let (t, p) = strip_prefix("other.a.b", "dc1");
        assert_eq!(t, "other.a.b");
        assert_eq!(p, "");

        let (t, p) = strip_prefix("a.b", "");
        assert_eq!(t, "a.b");
        assert_eq!(p, "");
    }
}
