//! `ch-graphite-gw`
//!
//! A read-only Graphite-compatible query gateway in front of a
//! ClickHouse-style columnar time-series backend: glob-to-SQL finder
//! pipeline, row-binary decoder, point normalizer, rollup engine,
//! series aligner, and pickle/protobuf render encoders, behind a small
//! HTTP surface (`/metrics/find`, `/render`, `/health`).

pub mod align;
pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod finder;
pub mod pickle;
pub mod point;
pub mod protobuf;
pub mod render;
pub mod rollup;
pub mod transport;
