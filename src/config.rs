//! Gateway configuration.
//!
//! Loaded from a TOML file (path from the `CH_GRAPHITE_GW_CONFIG` env
//! var, default `/etc/ch-graphite-gw/config.toml`), following
//! `original_source/graphite-clickhouse.go`'s config-file-by-path
//! startup sequence. The recognized keys are exactly the set spec.md
//! §6 enumerates; this module only parses them — it never validates
//! rollup rule monotonicity (see [`crate::rollup`] for that).

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::rollup::RollupRule;

/// Top-level configuration, mirroring the `[ClickHouse]`, `[Common]`,
/// and `[Rollup]` sections of the legacy config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "ClickHouse")]
    pub clickhouse: ClickHouseConfig,
    #[serde(rename = "Common", default)]
    pub common: CommonConfig,
    #[serde(rename = "Rollup", default)]
    pub rollup: RollupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    /// SQL transport endpoint.
    pub url: String,
    /// Metric-name index table.
    pub tree_table: String,
    /// Date-partitioned metric-name index table (empty disables it).
    #[serde(default)]
    pub date_tree_table: String,
    /// Reverse-indexed metric-name table (empty disables it).
    #[serde(default)]
    pub reverse_tree_table: String,
    /// Tag side-table for the `Tag` finder decorator (empty disables it).
    #[serde(default)]
    pub tag_table: String,
    /// Tag-index table used for `seriesByTag` queries (empty disables it).
    #[serde(default)]
    pub tagged_table: String,
    /// Datapoint fact table.
    pub data_table: String,
    /// Per-query deadline for index (tree) queries, in seconds.
    #[serde(default = "default_tree_timeout_secs")]
    pub tree_timeout_secs: u64,
    /// Per-query deadline for data queries, in seconds.
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,
    /// Prefix stripped from incoming targets, re-prepended to outputs.
    #[serde(default)]
    pub extra_prefix: String,
    /// Row cap applied to expand-mode (`**`) finder queries.
    #[serde(default = "default_expand_limit")]
    pub metric_limit_with_expand: u64,
}

impl ClickHouseConfig {
    #[must_use]
    pub fn tree_timeout(&self) -> Duration {
        Duration::from_secs(self.tree_timeout_secs)
    }

    #[must_use]
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}

fn default_tree_timeout_secs() -> u64 {
    10
}

fn default_data_timeout_secs() -> u64 {
    60
}

fn default_expand_limit() -> u64 {
    10_000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonConfig {
    /// Listen address for the HTTP surface, e.g. `"0.0.0.0:9090"`.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Regex patterns; finder results matching any of them are dropped.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

fn default_listen() -> String {
    "0.0.0.0:9090".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollupConfig {
    #[serde(default)]
    pub rules: Vec<RollupRule>,
}

impl Config {
    /// Loads and parses the config file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file at {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Parses config TOML text directly (used by `from_file` and tests).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing config TOML")
    }

    /// Resolves the config path from `CH_GRAPHITE_GW_CONFIG`, falling
    /// back to the package default.
    #[must_use]
    pub fn resolve_path() -> String {
        env::var("CH_GRAPHITE_GW_CONFIG")
            .unwrap_or_else(|_| "/etc/ch-graphite-gw/config.toml".to_string())
    }

    /// A configuration suitable for unit and integration tests.
    #[must_use]
    pub fn example() -> Self {
        Self {
            clickhouse: ClickHouseConfig {
                url: "http://localhost:8123".to_string(),
                tree_table: "graphite_tree".to_string(),
                date_tree_table: String::new(),
                reverse_tree_table: String::new(),
                tag_table: String::new(),
                tagged_table: String::new(),
                data_table: "graphite_data".to_string(),
                tree_timeout_secs: default_tree_timeout_secs(),
                data_timeout_secs: default_data_timeout_secs(),
                extra_prefix: String::new(),
                metric_limit_with_expand: default_expand_limit(),
            },
            common: CommonConfig::default(),
            rollup: RollupConfig::default(),
        }
    }
}
