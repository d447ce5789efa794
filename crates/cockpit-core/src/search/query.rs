//! Query text helpers
//!
//! User-typed search text reaches SQLite two ways: as an FTS5 `MATCH`
//! expression and as a `LIKE` pattern. Both need sanitizing so that
//! punctuation never turns into query syntax.

/// Characters with meaning in the FTS5 query grammar
const FTS5_SPECIAL: [char; 9] = ['"', '*', '-', '+', ':', '^', '(', ')', '~'];

/// Turn free text into a safe FTS5 expression.
///
/// Each whitespace-separated token is stripped of FTS5 operator characters
/// and emitted as a quoted prefix term (`"tok"*`); the terms are joined with
/// spaces, which FTS5 reads as AND. Text whose double quotes are balanced is
/// treated as a deliberate phrase query and passed through untouched.
///
/// Returns an empty string when nothing searchable remains.
pub fn sanitize_fts5_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let quotes = trimmed.matches('"').count();
    if quotes > 0 && quotes % 2 == 0 {
        return trimmed.to_string();
    }

    trimmed
        .split_whitespace()
        .map(|token| token.replace(FTS5_SPECIAL, ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{}\"*", token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape `LIKE` wildcards so the text matches literally under `ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%text%` with wildcards in `text` escaped.
pub fn like_contains_pattern(text: &str) -> String {
    format!("%{}%", escape_like(text))
}
