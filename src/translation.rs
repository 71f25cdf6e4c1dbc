//! Named placeholder scanning for Data API style SQL (`:name`).
//!
//! The scanner skips quoted strings, comments, and dollar-quoted blocks via a lightweight state
//! machine, and treats `::type` as a cast rather than a placeholder. It may still miss edge cases
//! in exotic SQL; function bodies are better kept server-side.

use std::borrow::Cow;
use std::collections::HashMap;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_cast, is_escape_string_start,
    is_line_comment_start, matches_tag, try_start_dollar_quote,
};
use scanner::{State, scan_identifier};

/// A `:name` placeholder found in SQL text. `start` is the offset of the colon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Find every named placeholder in `sql`, in order of appearance.
///
/// ```rust
/// use rds_data_middleware::translation::named_placeholders;
///
/// let found = named_placeholders("select get_tenant_data(:id::integer) -- :ignored");
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].name, "id");
/// ```
#[must_use]
pub fn named_placeholders(sql: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' if is_escape_string_start(bytes, idx) => state = State::EscapeQuoted,
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    }
                }
                b':' if is_cast(bytes, idx) => {
                    idx += 1;
                }
                b':' => {
                    if let Some((end, name)) = scan_identifier(bytes, idx + 1) {
                        found.push(Placeholder {
                            name,
                            start: idx,
                            end,
                        });
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::EscapeQuoted => match b {
                b'\\' => idx += 1,
                b'\'' if bytes.get(idx + 1) == Some(&b'\'') => idx += 1,
                b'\'' => state = State::Normal,
                _ => {}
            },
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    found
}

/// Distinct placeholder names in order of first appearance.
#[must_use]
pub fn placeholder_names(sql: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for placeholder in named_placeholders(sql) {
        if !names.contains(&placeholder.name) {
            names.push(placeholder.name);
        }
    }
    names
}

/// Rewrite `:name` placeholders to Postgres positional `$N`.
///
/// Repeated names share one position. Returns the rewritten SQL and the names in positional
/// order; a borrowed `Cow` is returned when the SQL has no placeholders.
#[must_use]
pub fn to_positional(sql: &str) -> (Cow<'_, str>, Vec<String>) {
    let placeholders = named_placeholders(sql);
    if placeholders.is_empty() {
        return (Cow::Borrowed(sql), Vec::new());
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;

    for placeholder in placeholders {
        let position = *positions.entry(placeholder.name).or_insert_with(|| {
            order.push(placeholder.name.to_string());
            order.len()
        });
        out.push_str(&sql[copied..placeholder.start]);
        out.push('$');
        out.push_str(&position.to_string());
        copied = placeholder.end;
    }
    out.push_str(&sql[copied..]);

    (Cow::Owned(out), order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_placeholders_and_skips_casts() {
        let names = placeholder_names("select get_tenant_data(:id::integer), :name, :id");
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select ':a', \"col:b\", :c -- :d\n/* :e /* :f */ */ from t where x = :g";
        assert_eq!(placeholder_names(sql), vec!["c", "g"]);
    }

    #[test]
    fn skips_escape_strings_with_backslash_quotes() {
        let sql = r"select E'it\'s :not_a_param', e'\\', :real from t where note = 'e\' and x = :x";
        assert_eq!(placeholder_names(sql), vec!["real", "x"]);
        // a trailing `e` on an identifier does not start an escape string
        assert_eq!(placeholder_names(r"select name'\', :y"), vec!["y"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "do $body$ begin perform :inner; end $body$; select :outer, $$ :x $$";
        assert_eq!(placeholder_names(sql), vec!["outer"]);
    }

    #[test]
    fn ignores_array_slices_and_bare_colons() {
        assert!(placeholder_names("select arr[1:2], 'a' || : from t").is_empty());
    }

    #[test]
    fn rewrites_to_positional() {
        let (sql, order) = to_positional("select * from t where a = :a and b = :b or a2 = :a");
        assert_eq!(sql, "select * from t where a = $1 and b = $2 or a2 = $1");
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn positional_keeps_casts_and_unicode() {
        let (sql, order) = to_positional("select 'héllo', :id::integer");
        assert_eq!(sql, "select 'héllo', $1::integer");
        assert_eq!(order, vec!["id".to_string()]);
    }

    #[test]
    fn no_placeholders_borrows() {
        let (sql, order) = to_positional("select tenant_name from tenant");
        assert!(matches!(sql, Cow::Borrowed(_)));
        assert!(order.is_empty());
    }
}
