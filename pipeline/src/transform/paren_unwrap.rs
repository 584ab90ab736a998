use once_cell::sync::Lazy;
use regex::Regex;

// Tableau probes schemas with `(SELECT ...) LIMIT 0`; some client parsers
// also re-emit a bare parenthesized SELECT. The backend rejects a
// parenthesized top-level SELECT, so both forms are unwrapped textually
// before parsing.
static PAREN_WITH_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\((SELECT\s.+)\)\s+(LIMIT\s+\d+)$").unwrap());
static PAREN_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\((SELECT\s.+)\)$").unwrap());

/// Collapse all whitespace runs (newlines and tabs included) to single
/// spaces so the patterns see one line.
fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn needs_unwrapping(sql: &str) -> bool {
    let normalized = normalize(sql);
    PAREN_WITH_LIMIT.is_match(&normalized) || PAREN_ONLY.is_match(&normalized)
}

/// `(SELECT …) [LIMIT n]` → `SELECT … [LIMIT n]`. Returns `None` when the
/// statement is not a parenthesized wrapper.
pub fn unwrap(sql: &str) -> Option<String> {
    let normalized = normalize(sql);

    if let Some(caps) = PAREN_WITH_LIMIT.captures(&normalized) {
        let inner = caps.get(1).unwrap().as_str().trim();
        let limit = caps.get(2).unwrap().as_str().trim();
        return Some(format!("{inner} {limit}"));
    }

    if let Some(caps) = PAREN_ONLY.captures(&normalized) {
        return Some(caps.get(1).unwrap().as_str().trim().to_string());
    }

    None
}
