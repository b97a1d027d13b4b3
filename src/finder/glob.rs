//! Graphite glob → SQL predicate translation — C1.
//!
//! Grounded on `original_source/finder/base.go`'s `where()` method: the
//! same rule ordering (level pruning, literal shortcut, prefix `LIKE`,
//! single-trailing-star shortcut, regex fallback) is reproduced here as
//! a free function returning a [`Where`] builder instead of a method on
//! an embedded struct, per spec.md §9's capability-interface guidance.

use std::fmt;

use crate::error::GatewayError;

const WILDCARD_CHARS: &[char] = &['[', ']', '{', '}', '*', '?', '~'];

/// A SQL `WHERE` clause assembled as an ordered list of AND-ed
/// conditions, mirroring the original's `Where` helper type.
#[derive(Debug, Default, Clone)]
pub struct Where {
    conditions: Vec<String>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition verbatim (already valid SQL on its own).
    pub fn and(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "1");
        }
        write!(
            f,
            "{}",
            self.conditions
                .iter()
                .map(|c| format!("({c})"))
                .collect::<Vec<_>>()
                .join(" AND ")
        )
    }
}

/// Quotes a string literal for inclusion in SQL: wraps in single quotes
/// and escapes `\` and `'`. Every user-provided literal reaching SQL
/// must pass through this function.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// `true` if `query` contains any glob metacharacter.
pub fn has_wildcard(query: &str) -> bool {
    query.contains(WILDCARD_CHARS)
}

/// `true` if `query` carries the `**` expand marker, which disables
/// level-count pruning and enables a `LIMIT`-bounded search.
pub fn has_expand(query: &str) -> bool {
    query.contains("**")
}

/// Number of dot-separated levels in `query` (`count('.') + 1`).
pub fn level(query: &str) -> usize {
    query.matches('.').count() + 1
}

/// Translates a single glob into its regex equivalent: `*` → `[^.]*`,
/// `?` → `[^.]`, `{a,b}` → `(?:a|b)`, `[...]` passed through verbatim,
/// `~X` emits the raw regex `X` up to the next unescaped `~`, and every
/// other character is regex-escaped.
pub fn glob_to_regex(query: &str) -> Result<String, GatewayError> {
    let chars: Vec<char> = query.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push_str("[^.]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^.]");
                i += 1;
            }
            '{' => {
                let end = find_matching(&chars, i, '{', '}')?;
                let inner: String = chars[i + 1..end].iter().collect();
                let alternatives: Vec<String> =
                    inner.split(',').map(|s| s.to_string()).collect();
                out.push_str("(?:");
                out.push_str(&alternatives.join("|"));
                out.push(')');
                i = end + 1;
            }
            '[' => {
                let end = find_matching(&chars, i, '[', ']')?;
                out.push('[');
                out.extend(&chars[i + 1..end]);
                out.push(']');
                i = end + 1;
            }
            '~' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '~' {
                    i += 1;
                }
                out.extend(&chars[start..i]);
                if i < chars.len() {
                    i += 1; // skip closing '~'
                }
            }
            '.' => {
                // `Q()` doubles backslashes, so a literal `\.` would
                // come out of SQL quoting as `\\.` and stop matching a
                // literal dot; `[.]` survives quoting unharmed.
                out.push_str("[.]");
                i += 1;
            }
            other => {
                out.push_str(&regex::escape(&other.to_string()));
                i += 1;
            }
        }
    }

    Ok(out)
}

fn find_matching(chars: &[char], open_at: usize, open: char, close: char) -> Result<usize, GatewayError> {
    let mut depth = 0usize;
    let mut i = open_at;
    while i < chars.len() {
        if chars[i] == open {
            depth += 1;
        } else if chars[i] == close {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
        i += 1;
    }
    Err(GatewayError::BadRequest(format!(
        "unsupported query: unbalanced '{open}'"
    )))
}

/// Builds the SQL `WHERE` fragment for a glob query (spec.md §4.1).
///
/// Returns the [`Where`] builder plus whether expand-mode is active
/// (the caller attaches a `LIMIT` in that case).
pub fn build_where(query: &str) -> Result<(Where, bool), GatewayError> {
    let mut w = Where::new();
    let expand = has_expand(query);

    if !expand {
        w.and(format!("Level = {}", level(query)));
    }

    if query == "*" {
        return Ok((w, expand));
    }

    if !has_wildcard(query) && !expand {
        w.and(format!(
            "Path = {} OR Path = {}",
            quote(query),
            quote(&format!("{query}."))
        ));
        return Ok((w, expand));
    }

    let wildcard_at = query.find(WILDCARD_CHARS);
    let simple_prefix = match wildcard_at {
        Some(idx) => &query[..idx],
        None => query,
    };

    if !simple_prefix.is_empty() {
        w.and(format!("Path LIKE {}", quote(&format!("{simple_prefix}%"))));
    }

    if simple_prefix.len() == query.len() - 1 && query.ends_with('*') {
        return Ok((w, expand));
    }

    let regex = glob_to_regex(query)?;
    w.and(format!("match(Path, {})", quote(&format!("^{regex}[.]?$"))));

    Ok((w, expand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_path_matches_both_forms() {
        let (w, expand) = build_where("a.b.c").unwrap();
        assert!(!expand);
        let sql = w.to_string();
        assert!(sql.contains("Level = 3"));
        assert!(sql.contains("Path = 'a.b.c' OR Path = 'a.b.c.'"));
    }

    #[test]
    fn level_pruning_present_without_expand() {
        let (w, _) = build_where("a.b.*.cpu").unwrap();
        assert!(w.to_string().contains("Level = 4"));
    }

    #[test]
    fn expand_disables_level_pruning() {
        let (w, expand) = build_where("a.b.**").unwrap();
        assert!(expand);
        assert!(!w.to_string().contains("Level ="));
    }

    #[test]
    fn star_alone_is_just_level() {
        let (w, _) = build_where("*").unwrap();
        assert_eq!(w.to_string(), "(Level = 1)");
    }

    #[test]
    fn single_trailing_star_short_circuits_to_like() {
        let (w, _) = build_where("a.b.*").unwrap();
        let sql = w.to_string();
        assert!(sql.contains("Path LIKE 'a.b.%'"));
        assert!(!sql.contains("match("));
    }

    #[test]
    fn mid_glob_falls_back_to_regex() {
        let (w, _) = build_where("a.b.*.cpu").unwrap();
        let sql = w.to_string();
        assert!(sql.contains("Path LIKE 'a.b.%'"));
        assert!(sql.contains("match(Path, '^a[.]b[.][^.]*[.]cpu[.]?$')"));
    }

    #[test]
    fn unbalanced_brace_is_rejected() {
        assert!(build_where("a.{b,c").is_err());
    }

    #[test]
    fn quoting_escapes_backslash_and_quote() {
        let q = quote(r"a'b\c");
        assert_eq!(q, r"'a\'b\\c'");
        // every quote inside the body is immediately preceded by a backslash
        let body = &q[1..q.len() - 1];
        let mut chars = body.chars().peekable();
        let mut prev = None;
        while let Some(c) = chars.next() {
            if c == '\'' {
                assert_eq!(prev, Some('\\'));
            }
            prev = Some(c);
        }
    }

    #[test]
    fn alternation_and_char_class_translate() {
        let regex = glob_to_regex("{a,b}.[0-9]").unwrap();
        assert_eq!(regex, "(?:a|b)[.][0-9]");
    }

    #[test]
    fn regex_escape_hatch_passes_through_raw() {
        let regex = glob_to_regex("~foo.*~bar").unwrap();
        assert_eq!(regex, "foo.*bar");
    }
}
