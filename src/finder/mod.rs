//! Finder pipeline — C2.
//!
//! A capability-interface (`Box<dyn Finder>`) rather than the source's
//! struct embedding, per spec.md §9. Concrete variants (`BaseFinder`,
//! `DateFinder`, `TaggedFinder`, `DeletedFinder`) talk to a tree table;
//! decorators (`ReverseFinder`, `TagFinder`, `PrefixFinder`,
//! `BlacklistFinder`) wrap an inner finder. `build_finder` reproduces
//! `original_source/finder/finder.go`'s `Find()` dispatcher: composition
//! order Blacklist → Prefix → Tag → Reverse → (Base | Date), tagged
//! queries skipping straight to Blacklist(Tagged).
//!
//! `list`/`series` never resolve `abs` internally, at any layer —
//! callers map every row through `abs` exactly once after reading it
//! out, so a chain of decorators resolves its whole transform (reverse
//! un-reversal, prefix re-prepending) in one pass no matter which layer
//! ends up outermost.

pub mod glob;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;

use crate::config::Config;
use crate::error::GatewayError;
use crate::transport;
use glob::{build_where, quote};

/// The finder capability surface: build once, `execute` once, then read
/// results out through `list`/`series`/`abs` any number of times.
///
/// `list`/`series` return rows in whatever internal representation the
/// finder actually queried by (e.g. dot-segment-reversed, for a
/// `ReverseFinder` hit) — no implementation resolves its own `abs`
/// transform into these, including decorators wrapping an inner finder.
/// Callers map every returned row through `abs` exactly once to get the
/// externally-visible path; `abs` itself recurses into the inner
/// finder's `abs` first, so one call at the top resolves the whole
/// chain.
pub trait Finder: Send + Sync {
    /// Runs the index query for `query` against `[from, until]`.
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>>;

    /// All matched paths, leaf and branch alike, in internal form.
    fn list(&self) -> Vec<Vec<u8>>;

    /// Matched paths whose last byte is not `.` (series only, no
    /// intermediate tree branches), in internal form.
    fn series(&self) -> Vec<Vec<u8>>;

    /// Maps one internal-form path to its externally-visible form
    /// (identity for most variants; un-reverses or re-prepends a
    /// prefix where a decorator changed the representation).
    fn abs(&self, v: &[u8]) -> Vec<u8>;
}

fn split_rows(body: &[u8], only_series: bool) -> Vec<Vec<u8>> {
    body.split(|&b| b == b'\n')
        .filter(|row| !row.is_empty())
        .filter(|row| !(only_series && row[row.len() - 1] == b'.'))
        .map(|row| row.to_vec())
        .collect()
}

/// Queries the plain (non-date-partitioned) tree table.
pub struct BaseFinder {
    url: String,
    table: String,
    timeout: Duration,
    expand_limit: u64,
    body: Vec<u8>,
}

impl BaseFinder {
    pub fn new(url: String, table: String, timeout: Duration, expand_limit: u64) -> Self {
        Self {
            url,
            table,
            timeout,
            expand_limit,
            body: Vec::new(),
        }
    }

    fn sql(&self, query: &str) -> Result<String, GatewayError> {
        let (mut w, expand) = build_where(query)?;
        w.and("Deleted = 0");
        let limit = if expand {
            format!(" LIMIT {}", self.expand_limit)
        } else {
            String::new()
        };
        Ok(format!(
            "SELECT Path FROM {} WHERE {w} GROUP BY Path{limit}",
            self.table
        ))
    }
}

impl Finder for BaseFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        _from: i64,
        _until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        async move {
            let sql = self.sql(query)?;
            let body = transport::query(client, &self.url, &sql, self.timeout).await?;
            self.body = body.to_vec();
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, false)
    }

    fn series(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, true)
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        v.to_vec()
    }
}

/// Queries a date-partitioned tree table, adding a `Date BETWEEN …`
/// predicate derived from `from`/`until` in server-local time.
pub struct DateFinder {
    url: String,
    table: String,
    timeout: Duration,
    expand_limit: u64,
    body: Vec<u8>,
}

impl DateFinder {
    pub fn new(url: String, table: String, timeout: Duration, expand_limit: u64) -> Self {
        Self {
            url,
            table,
            timeout,
            expand_limit,
            body: Vec::new(),
        }
    }

    fn sql(&self, query: &str, from: i64, until: i64) -> Result<String, GatewayError> {
        let (mut w, expand) = build_where(query)?;
        w.and("Deleted = 0");
        w.and(format!(
            "Date BETWEEN {} AND {}",
            quote(&date_string(from)),
            quote(&date_string(until))
        ));
        let limit = if expand {
            format!(" LIMIT {}", self.expand_limit)
        } else {
            String::new()
        };
        Ok(format!(
            "SELECT Path FROM {} WHERE {w} GROUP BY Path{limit}",
            self.table
        ))
    }
}

fn date_string(unix_seconds: i64) -> String {
    Utc.timestamp_opt(unix_seconds, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

impl Finder for DateFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        async move {
            let sql = self.sql(query, from, until)?;
            let body = transport::query(client, &self.url, &sql, self.timeout).await?;
            self.body = body.to_vec();
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, false)
    }

    fn series(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, true)
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        v.to_vec()
    }
}

/// Complement of [`BaseFinder`]: paths whose most recent version is
/// marked deleted (`HAVING argMax(Deleted, Version) == 1`).
pub struct DeletedFinder {
    url: String,
    table: String,
    timeout: Duration,
    body: Vec<u8>,
}

impl DeletedFinder {
    pub fn new(url: String, table: String, timeout: Duration) -> Self {
        Self {
            url,
            table,
            timeout,
            body: Vec::new(),
        }
    }
}

impl Finder for DeletedFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        _from: i64,
        _until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        async move {
            let (w, _expand) = build_where(query)?;
            let sql = format!(
                "SELECT Path FROM {} WHERE {w} GROUP BY Path HAVING argMax(Deleted, Version) == 1",
                self.table
            );
            let body = transport::query(client, &self.url, &sql, self.timeout).await?;
            self.body = body.to_vec();
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, false)
    }

    fn series(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, true)
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        v.to_vec()
    }
}

/// `seriesByTag(...)` queries against the tag-index table.
///
/// The tag-query grammar itself (key comparisons, `=~` regex operators)
/// is out of scope for this distillation; arguments inside the
/// parentheses are treated as already-valid tag-equality expressions of
/// the form `key=value` and translated into `has(Tags, 'key=value')`
/// membership tests against a `Tags Array(String)` column, one AND-ed
/// condition per argument (an Open Question, decided in DESIGN.md).
pub struct TaggedFinder {
    url: String,
    table: String,
    timeout: Duration,
    body: Vec<u8>,
}

impl TaggedFinder {
    pub fn new(url: String, table: String, timeout: Duration) -> Self {
        Self {
            url,
            table,
            timeout,
            body: Vec::new(),
        }
    }

    fn sql(&self, query: &str) -> Result<String, GatewayError> {
        let inner = query
            .trim()
            .strip_prefix("seriesByTag(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| GatewayError::BadRequest(format!("malformed seriesByTag query: {query}")))?;

        let conditions: Vec<String> = inner
            .split(',')
            .map(|arg| {
                let arg = arg.trim().trim_matches(|c| c == '\'' || c == '"');
                format!("has(Tags, {})", quote(arg))
            })
            .collect();

        if conditions.is_empty() {
            return Err(GatewayError::BadRequest("seriesByTag() needs at least one tag".to_string()));
        }

        Ok(format!(
            "SELECT Path FROM {} WHERE {} GROUP BY Path",
            self.table,
            conditions.join(" AND ")
        ))
    }
}

impl Finder for TaggedFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        _from: i64,
        _until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        async move {
            let sql = self.sql(query)?;
            let body = transport::query(client, &self.url, &sql, self.timeout).await?;
            self.body = body.to_vec();
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, false)
    }

    fn series(&self) -> Vec<Vec<u8>> {
        split_rows(&self.body, true)
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        v.to_vec()
    }
}

/// `true` if `query` starts with `seriesByTag(`.
pub fn is_tagged_query(query: &str) -> bool {
    query.trim_start().starts_with("seriesByTag")
}

/// Prefers a reverse-indexed tree table when the glob has no literal
/// prefix but does have a literal suffix (e.g. `*.cpu.load`) — a scan
/// keyed on the reversed path is far more selective there than a
/// forward `LIKE`/`match` scan. Falls back to the wrapped finder
/// otherwise.
pub struct ReverseFinder {
    inner: Box<dyn Finder>,
    url: String,
    table: String,
    timeout: Duration,
    expand_limit: u64,
    body: Option<Vec<u8>>,
}

impl ReverseFinder {
    pub fn new(
        inner: Box<dyn Finder>,
        url: String,
        table: String,
        timeout: Duration,
        expand_limit: u64,
    ) -> Self {
        Self {
            inner,
            url,
            table,
            timeout,
            expand_limit,
            body: None,
        }
    }

    /// A literal suffix with no literal prefix: the first dot-segment
    /// carries a wildcard, the last one doesn't.
    fn is_advantageous(query: &str) -> bool {
        let segments: Vec<&str> = query.split('.').collect();
        if segments.len() < 2 {
            return false;
        }
        let first_has_wildcard = glob::has_wildcard(segments[0]) || glob::has_expand(segments[0]);
        let last_has_wildcard =
            glob::has_wildcard(segments[segments.len() - 1]) || glob::has_expand(segments[segments.len() - 1]);
        first_has_wildcard && !last_has_wildcard
    }

    fn reversed_query(query: &str) -> String {
        query.split('.').rev().collect::<Vec<_>>().join(".")
    }

    fn sql(&self, reversed_query: &str) -> Result<String, GatewayError> {
        let (mut w, expand) = build_where(reversed_query)?;
        w.and("Deleted = 0");
        let limit = if expand {
            format!(" LIMIT {}", self.expand_limit)
        } else {
            String::new()
        };
        Ok(format!(
            "SELECT Path FROM {} WHERE {w} GROUP BY Path{limit}",
            self.table
        ))
    }
}

impl Finder for ReverseFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        async move {
            if Self::is_advantageous(query) {
                let reversed = Self::reversed_query(query);
                let sql = self.sql(&reversed)?;
                let body = transport::query(client, &self.url, &sql, self.timeout).await?;
                self.body = Some(body.to_vec());
                Ok(())
            } else {
                self.inner.execute(client, query, from, until).await
            }
        }
        .boxed()
    }

    // Rows straight off the reverse tree are still dot-segment-reversed
    // (e.g. `load.cpu.a`, not `a.cpu.load`); like `BaseFinder`, this
    // returns them as-is and leaves the un-reversal to `abs`, so a
    // decorator wrapping this one doesn't re-resolve an already-resolved
    // path a second time.
    fn list(&self) -> Vec<Vec<u8>> {
        match &self.body {
            Some(body) => split_rows(body, false),
            None => self.inner.list(),
        }
    }

    fn series(&self) -> Vec<Vec<u8>> {
        match &self.body {
            Some(body) => split_rows(body, true),
            None => self.inner.series(),
        }
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        if self.body.is_some() {
            // paths came back reversed by dot-segment; restore order
            let s = String::from_utf8_lossy(v);
            Self::reversed_query(&s).into_bytes()
        } else {
            self.inner.abs(v)
        }
    }
}

/// Decorator wiring point for tag-name-table augmentation. The
/// finder contract (`List`/`Series` return bare paths, nothing richer)
/// leaves no observable room for extra tag metadata, so this decorator
/// is a structurally faithful passthrough — recorded as an Open
/// Question resolution in DESIGN.md rather than left unimplemented.
pub struct TagFinder {
    inner: Box<dyn Finder>,
    #[allow(dead_code)]
    url: String,
    #[allow(dead_code)]
    table: String,
    #[allow(dead_code)]
    timeout: Duration,
}

impl TagFinder {
    pub fn new(inner: Box<dyn Finder>, url: String, table: String, timeout: Duration) -> Self {
        Self {
            inner,
            url,
            table,
            timeout,
        }
    }
}

impl Finder for TagFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        self.inner.execute(client, query, from, until)
    }

    fn list(&self) -> Vec<Vec<u8>> {
        self.inner.list()
    }

    fn series(&self) -> Vec<Vec<u8>> {
        self.inner.series()
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        self.inner.abs(v)
    }
}

/// Strips `prefix` from the incoming query before delegating; `abs`
/// re-prepends it on a single path. Like every other decorator here,
/// `list`/`series` return the raw rows the inner finder produced —
/// untouched by `abs` — so the caller resolves the whole chain (any
/// nested `Reverse`/`Prefix` transform included) with exactly one
/// `abs()` call per row, instead of this layer resolving its own slice
/// of the chain early and risking a second, redundant resolution by
/// whatever wraps it.
pub struct PrefixFinder {
    inner: Box<dyn Finder>,
    prefix: String,
}

impl PrefixFinder {
    pub fn new(inner: Box<dyn Finder>, prefix: String) -> Self {
        Self { inner, prefix }
    }

    fn strip<'q>(&self, query: &'q str) -> &'q str {
        if let Some(rest) = query.strip_prefix(&format!("{}.", self.prefix)) {
            rest
        } else if query == self.prefix {
            ""
        } else {
            query
        }
    }
}

impl Finder for PrefixFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        let stripped = self.strip(query).to_string();
        async move { self.inner.execute(client, &stripped, from, until).await }.boxed()
    }

    fn list(&self) -> Vec<Vec<u8>> {
        self.inner.list()
    }

    fn series(&self) -> Vec<Vec<u8>> {
        self.inner.series()
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        let inner = self.inner.abs(v);
        let mut out = Vec::with_capacity(self.prefix.len() + 1 + inner.len());
        out.extend_from_slice(self.prefix.as_bytes());
        out.push(b'.');
        out.extend_from_slice(&inner);
        out
    }
}

/// Drops any path matching one of the configured blacklist regexes.
pub struct BlacklistFinder {
    inner: Box<dyn Finder>,
    patterns: Vec<Regex>,
}

impl BlacklistFinder {
    pub fn new(inner: Box<dyn Finder>, patterns: Vec<Regex>) -> Self {
        Self { inner, patterns }
    }

    fn keep(&self, path: &[u8]) -> bool {
        let s = String::from_utf8_lossy(path);
        !self.patterns.iter().any(|re| re.is_match(&s))
    }
}

impl Finder for BlacklistFinder {
    fn execute<'a>(
        &'a mut self,
        client: &'a reqwest::Client,
        query: &'a str,
        from: i64,
        until: i64,
    ) -> BoxFuture<'a, Result<(), GatewayError>> {
        self.inner.execute(client, query, from, until)
    }

    fn list(&self) -> Vec<Vec<u8>> {
        self.inner.list().into_iter().filter(|p| self.keep(p)).collect()
    }

    fn series(&self) -> Vec<Vec<u8>> {
        self.inner.series().into_iter().filter(|p| self.keep(p)).collect()
    }

    fn abs(&self, v: &[u8]) -> Vec<u8> {
        self.inner.abs(v)
    }
}

fn compile_blacklist(patterns: &[String]) -> Result<Vec<Regex>, GatewayError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| GatewayError::BadRequest(format!("bad blacklist regex {p:?}: {e}"))))
        .collect()
}

/// Assembles the finder chain for `query`, reproducing
/// `original_source/finder/finder.go`'s `Find()` dispatcher exactly:
/// tagged queries only ever get wrapped in `Blacklist`; everything else
/// gets the full Blacklist → Prefix → Tag → Reverse → (Base | Date)
/// chain, each layer present only when its config table is non-empty.
///
/// `apply_prefix` controls whether the `Prefix` decorator is included.
/// `find()` wants it (the prefix is stripped/re-prepended solely
/// through the decorator). `render()` strips and re-prepends the
/// prefix itself, the way `original_source/backend/render.go` does
/// (`RemoveExtraPrefix`, never routed through `WrapPrefix`), so it
/// passes `false` — the data-table SQL needs the raw, unprefixed paths
/// the finder already queried by, and applying both would prepend the
/// prefix twice.
pub fn build_finder(
    config: &Config,
    query: &str,
    from: i64,
    until: i64,
    apply_prefix: bool,
) -> Result<Box<dyn Finder>, GatewayError> {
    let ch = &config.clickhouse;

    if !ch.tagged_table.is_empty() && is_tagged_query(query) {
        let mut f: Box<dyn Finder> = Box::new(TaggedFinder::new(
            ch.url.clone(),
            ch.tagged_table.clone(),
            ch.tree_timeout(),
        ));
        if !config.common.blacklist.is_empty() {
            f = Box::new(BlacklistFinder::new(f, compile_blacklist(&config.common.blacklist)?));
        }
        return Ok(f);
    }

    let mut f: Box<dyn Finder> = if from > 0 && until > 0 && !ch.date_tree_table.is_empty() {
        Box::new(DateFinder::new(
            ch.url.clone(),
            ch.date_tree_table.clone(),
            ch.tree_timeout(),
            ch.metric_limit_with_expand,
        ))
    } else {
        Box::new(BaseFinder::new(
            ch.url.clone(),
            ch.tree_table.clone(),
            ch.tree_timeout(),
            ch.metric_limit_with_expand,
        ))
    };

    if !ch.reverse_tree_table.is_empty() {
        f = Box::new(ReverseFinder::new(
            f,
            ch.url.clone(),
            ch.reverse_tree_table.clone(),
            ch.tree_timeout(),
            ch.metric_limit_with_expand,
        ));
    }

    if !ch.tag_table.is_empty() {
        f = Box::new(TagFinder::new(f, ch.url.clone(), ch.tag_table.clone(), ch.tree_timeout()));
    }

    if apply_prefix && !ch.extra_prefix.is_empty() {
        f = Box::new(PrefixFinder::new(f, ch.extra_prefix.clone()));
    }

    if !config.common.blacklist.is_empty() {
        f = Box::new(BlacklistFinder::new(f, compile_blacklist(&config.common.blacklist)?));
    }

    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_rows_drops_empty_lines() {
        let body = b"a.b.c\n\na.b.d.\n".to_vec();
        let all = split_rows(&body, false);
        assert_eq!(all, vec![b"a.b.c".to_vec(), b"a.b.d.".to_vec()]);
        let series_only = split_rows(&body, true);
        assert_eq!(series_only, vec![b"a.b.c".to_vec()]);
    }

    #[test]
    fn reverse_finder_list_series_stay_raw() {
        let base = Box::new(BaseFinder::new(
            "http://x".to_string(),
            "tree".to_string(),
            Duration::from_secs(1),
            1000,
        ));
        let mut reverse = ReverseFinder::new(
            base,
            "http://x".to_string(),
            "reverse_tree".to_string(),
            Duration::from_secs(1),
            1000,
        );
        reverse.body = Some(b"c.b.a\n".to_vec());

        // list/series return the reversed row untouched; abs is the only
        // place the un-reversal happens.
        assert_eq!(reverse.list(), vec![b"c.b.a".to_vec()]);
        assert_eq!(reverse.abs(b"c.b.a"), b"a.b.c".to_vec());
    }

    #[test]
    fn reverse_wrapped_by_prefix_resolves_abs_exactly_once() {
        let base = Box::new(BaseFinder::new(
            "http://x".to_string(),
            "tree".to_string(),
            Duration::from_secs(1),
            1000,
        ));
        let mut reverse = ReverseFinder::new(
            base,
            "http://x".to_string(),
            "reverse_tree".to_string(),
            Duration::from_secs(1),
            1000,
        );
        reverse.body = Some(b"c.b.a\n".to_vec());
        let pf = PrefixFinder::new(Box::new(reverse), "dc1".to_string());

        // PrefixFinder must not pre-resolve: series() still comes back raw.
        let raw = pf.series();
        assert_eq!(raw, vec![b"c.b.a".to_vec()]);

        // The caller resolves the whole chain with one abs() call: one
        // un-reversal, then one prefix prepend — never two of either.
        let resolved: Vec<Vec<u8>> = raw.iter().map(|p| pf.abs(p)).collect();
        assert_eq!(resolved, vec![b"dc1.a.b.c".to_vec()]);
    }

    #[test]
    fn reverse_finder_advantageous_detection() {
        assert!(ReverseFinder::is_advantageous("*.cpu.load"));
        assert!(!ReverseFinder::is_advantageous("a.b.*"));
        assert!(!ReverseFinder::is_advantageous("*.cpu.*"));
    }

    #[test]
    fn reverse_finder_round_trips_segment_order() {
        let q = "a.b.c";
        let reversed = ReverseFinder::reversed_query(q);
        assert_eq!(reversed, "c.b.a");
        assert_eq!(ReverseFinder::reversed_query(&reversed), q);
    }

    #[test]
    fn prefix_finder_strips_and_reprepends() {
        let base = Box::new(BaseFinder::new(
            "http://x".to_string(),
            "tree".to_string(),
            Duration::from_secs(1),
            1000,
        ));
        let pf = PrefixFinder::new(base, "dc1".to_string());
        assert_eq!(pf.strip("dc1.a.b"), "a.b");
        assert_eq!(pf.strip("dc1"), "");
        assert_eq!(pf.strip("other.a"), "other.a");
        assert_eq!(pf.abs(b"a.b"), b"dc1.a.b".to_vec());
    }

    #[test]
    fn blacklist_finder_filters_matching_paths() {
        struct Stub(Vec<Vec<u8>>);
        impl Finder for Stub {
            fn execute<'a>(
                &'a mut self,
                _c: &'a reqwest::Client,
                _q: &'a str,
                _f: i64,
                _u: i64,
            ) -> BoxFuture<'a, Result<(), GatewayError>> {
                async { Ok(()) }.boxed()
            }
            fn list(&self) -> Vec<Vec<u8>> {
                self.0.clone()
            }
            fn series(&self) -> Vec<Vec<u8>> {
                self.0.clone()
            }
            fn abs(&self, v: &[u8]) -> Vec<u8> {
                v.to_vec()
            }
        }

        let stub = Box::new(Stub(vec![b"noisy.metric".to_vec(), b"good.metric".to_vec()]));
        let patterns = compile_blacklist(&["^noisy\\..*".to_string()]).unwrap();
        let bf = BlacklistFinder::new(stub, patterns);
        assert_eq!(bf.list(), vec![b"good.metric".to_vec()]);
    }

    #[test]
    fn tagged_query_detection() {
        assert!(is_tagged_query("seriesByTag('a=b')"));
        assert!(!is_tagged_query("a.b.c"));
    }

    #[test]
    fn tagged_finder_sql_has_one_condition_per_argument() {
        let tf = TaggedFinder::new("http://x".to_string(), "tagged".to_string(), Duration::from_secs(1));
        let sql = tf.sql("seriesByTag('name=cpu', 'host=web1')").unwrap();
        assert!(sql.contains("has(Tags, 'name=cpu')"));
        assert!(sql.contains("has(Tags, 'host=web1')"));
        assert!(sql.contains(" AND "));
    }
}
