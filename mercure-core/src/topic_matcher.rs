//! Topic selector matching: exact IRIs, the `*` wildcard, and a subset of
//! RFC 6570 URI Templates (`{var}` and `{+var}` expressions).
//!
//! Mirrors the three-tier fallback the reference Mercure hub uses: try an
//! exact string match first, then fall back to template matching only for
//! selectors that contain a `{`. A selector that fails to compile as a
//! template is skipped rather than treated as an error (see
//! [`Selector::compile`]).

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

/// The wildcard selector that matches every topic.
pub const MATCH_ALL: &str = "*";

/// A single compiled topic selector.
#[derive(Debug, Clone)]
enum Selector {
    /// Matches every topic.
    Wildcard,
    /// Matches only the exact topic string.
    Exact(String),
    /// Matches topics against a compiled URI Template regex.
    Template(Regex),
}

impl Selector {
    /// Compile a raw selector string. Returns `None` if `raw` looks like a
    /// template (contains `{`) but fails to compile; callers should log a
    /// warning once and otherwise ignore that selector, per the lenient
    /// parse-failure policy.
    fn compile(raw: &str) -> Option<Selector> {
        if raw == MATCH_ALL {
            return Some(Selector::Wildcard);
        }
        if !raw.contains('{') {
            return Some(Selector::Exact(raw.to_string()));
        }
        template_to_regex(raw).map(Selector::Template).ok()
    }

    fn matches(&self, topic: &str) -> bool {
        match self {
            Selector::Wildcard => true,
            Selector::Exact(s) => s == topic,
            Selector::Template(re) => re.is_match(topic),
        }
    }
}

/// Convert a `{var}` / `{+var}` URI Template into an anchored regex.
///
/// `{var}` expands to a segment that may not contain `/`; `{+var}` expands
/// to a segment that may contain `/` (reserved-expansion semantics). Other
/// RFC 6570 operators (`#`, `.`, `;`, `?`, `&`) are not needed by this hub's
/// subscription selectors and are left un-special-cased (treated as part of
/// the variable name), matching the scope of selectors actually seen in
/// practice.
fn template_to_regex(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(template.len() * 2);
    pattern.push('^');
    let mut rest = template;
    loop {
        match rest.find('{') {
            None => {
                pattern.push_str(&regex::escape(rest));
                break;
            }
            Some(start) => {
                pattern.push_str(&regex::escape(&rest[..start]));
                let after = &rest[start + 1..];
                let end = match after.find('}') {
                    Some(e) => e,
                    None => {
                        pattern.push_str(&regex::escape(&rest[start..]));
                        break;
                    }
                };
                let expr = &after[..end];
                if let Some(name) = expr.strip_prefix('+') {
                    pattern.push_str(&format!("(?P<{}>.+)", sanitize_group_name(name)));
                } else {
                    pattern.push_str(&format!("(?P<{}>[^/]+)", sanitize_group_name(expr)));
                }
                rest = &after[end + 1..];
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

/// Regex named-capture-group names are restricted to `[A-Za-z0-9_]`; RFC
/// 6570 variable names allow `.` and `-`, so replace anything else.
fn sanitize_group_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Tests whether any of `selectors` matches `topic`, with a small cache of
/// compiled selectors so templates are only parsed once per selector
/// string for the lifetime of the matcher.
#[derive(Debug, Default)]
pub struct TopicMatcher {
    cache: RwLock<HashMap<String, Option<Selector>>>,
}

impl TopicMatcher {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true iff `topic` is matched by at least one selector in
    /// `selectors`. Selectors that fail to compile as templates are
    /// skipped; this never returns an error.
    pub fn matches<S: AsRef<str>>(&self, selectors: &[S], topic: &str) -> bool {
        selectors
            .iter()
            .any(|selector| self.matches_one(selector.as_ref(), topic))
    }

    fn matches_one(&self, raw: &str, topic: &str) -> bool {
        if let Some(cached) = self.cache.read().unwrap().get(raw) {
            return cached.as_ref().is_some_and(|s| s.matches(topic));
        }
        let compiled = Selector::compile(raw);
        if compiled.is_none() {
            tracing::warn!(selector = raw, "topic selector failed to compile, skipping");
        }
        let matched = compiled.as_ref().is_some_and(|s| s.matches(topic));
        self.cache.write().unwrap().insert(raw.to_string(), compiled);
        matched
    }
}
