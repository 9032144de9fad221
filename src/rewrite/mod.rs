//! Dialect rewriting for queries sent through the driver.
//!
//! These are textual heuristics, not a parser: literals, quoted identifiers
//! and comments are blanked out by a small state machine before keyword
//! matching so `SELECT 'FROM'` is still seen as having no table source.
//! Malformed SQL passes through untouched and fails at the server.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, q_quote_end_len,
    try_start_q_quote,
};
use scanner::{State, q_quote_closer};

use crate::types::DataType;

/// One-row virtual table scalar selects are pointed at.
pub const DUAL_TABLE: &str = "dual";

lazy_static! {
    static ref LEADING_SELECT: Regex =
        Regex::new(r"(?i)^\s*SELECT\b").expect("leading SELECT pattern");
    static ref FROM_KEYWORD: Regex = Regex::new(r"(?i)\bFROM\b").expect("FROM pattern");
    static ref MANIPULATION: Regex = Regex::new(
        r"(?i)^\s*(INSERT|UPDATE|DELETE|REPLACE|MERGE|CREATE|DROP|ALTER|TRUNCATE|RENAME|COMMENT|GRANT|REVOKE|LOCK|COPY|LOAD\s+DATA)\s"
    )
    .expect("manipulation pattern");
}

/// Blank out string literals, quoted identifiers and comments.
///
/// Returns a borrowed `Cow` when there is nothing to blank.
#[must_use]
pub fn mask_literals(sql: &str) -> Cow<'_, str> {
    let (masked, _) = scan(sql);
    match masked {
        Some(buf) => Cow::Owned(String::from_utf8_lossy(&buf).into_owned()),
        None => Cow::Borrowed(sql),
    }
}

fn scan(sql: &str) -> (Option<Vec<u8>>, State) {
    let bytes = sql.as_bytes();
    let mut out: Option<Vec<u8>> = None;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        // bytes from idx on that belong to a literal or comment
        let mut span = 0;
        match state {
            State::Normal => {
                if let Some(delim) = try_start_q_quote(sql, idx) {
                    state = State::QQuoted(q_quote_closer(delim));
                    span = 2 + delim.len_utf8();
                } else if b == b'\'' {
                    state = State::SingleQuoted;
                    span = 1;
                } else if b == b'"' {
                    state = State::DoubleQuoted;
                    span = 1;
                } else if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                    span = 2;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment;
                    span = 2;
                }
            }
            State::SingleQuoted => {
                span = 1;
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        span = 2; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                span = 1;
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        span = 2;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::QQuoted(closer) => match q_quote_end_len(bytes, idx, closer) {
                Some(len) => {
                    span = len;
                    state = State::Normal;
                }
                None => span = 1,
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                } else {
                    span = 1;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    span = 2;
                    state = State::Normal;
                } else {
                    span = 1;
                }
            }
        }

        if span == 0 {
            idx += 1;
            continue;
        }
        let end = (idx + span).min(bytes.len());
        let buf = out.get_or_insert_with(|| bytes.to_vec());
        buf[idx..end].fill(b' ');
        idx = end;
    }

    (out, state)
}

/// Point a table-less `SELECT` at the one-row `dual` table.
///
/// `SELECT 2+2` becomes `SELECT 2+2 FROM dual`; every other query is
/// returned borrowed and unchanged.
#[must_use]
pub fn modify_query(sql: &str) -> Cow<'_, str> {
    let (masked, end_state) = scan(sql);
    let haystack: Cow<'_, str> = match masked {
        Some(buf) => Cow::Owned(String::from_utf8_lossy(&buf).into_owned()),
        None => Cow::Borrowed(sql),
    };
    if !LEADING_SELECT.is_match(&haystack) || FROM_KEYWORD.is_match(&haystack) {
        return Cow::Borrowed(sql);
    }
    // a trailing `--` comment would swallow the appended clause
    let separator = if matches!(end_state, State::LineComment) {
        "\n"
    } else {
        " "
    };
    Cow::Owned(format!("{sql}{separator}FROM {DUAL_TABLE}"))
}

/// Whether `sql` mutates data or schema rather than producing rows.
#[must_use]
pub fn is_manip(sql: &str) -> bool {
    MANIPULATION.is_match(&mask_literals(sql))
}

/// Append `RETURNING <col>, ... INTO :<col>, ...` for every large-object parameter.
///
/// The server then hands back a writable descriptor per large object, which
/// is streamed after execution. Parameter names double as column names.
#[must_use]
pub fn append_lob_returning<'a>(sql: &'a str, params: &[(String, DataType)]) -> Cow<'a, str> {
    let lob_names: Vec<&str> = params
        .iter()
        .filter(|(_, ty)| ty.is_lob())
        .map(|(name, _)| name.as_str())
        .collect();
    if lob_names.is_empty() {
        return Cow::Borrowed(sql);
    }
    let columns = lob_names.join(", ");
    let variables = lob_names
        .iter()
        .map(|name| format!(":{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    Cow::Owned(format!("{sql} RETURNING {columns} INTO {variables}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_select_gets_dual() {
        assert_eq!(modify_query("SELECT 1+1"), "SELECT 1+1 FROM dual");
        assert_eq!(modify_query("  select sysdate"), "  select sysdate FROM dual");
    }

    #[test]
    fn select_with_table_is_unchanged() {
        let sql = "SELECT a FROM t WHERE b = 1";
        assert!(matches!(modify_query(sql), Cow::Borrowed(_)));
        assert_eq!(modify_query("select a\nfrom t"), "select a\nfrom t");
    }

    #[test]
    fn non_select_is_unchanged() {
        let sql = "INSERT INTO t VALUES (1)";
        assert!(matches!(modify_query(sql), Cow::Borrowed(_)));
    }

    #[test]
    fn from_inside_literal_does_not_count() {
        assert_eq!(
            modify_query("SELECT 'FROM here' AS x"),
            "SELECT 'FROM here' AS x FROM dual"
        );
        assert_eq!(
            modify_query("SELECT q'[it's FROM]' /* FROM */"),
            "SELECT q'[it's FROM]' /* FROM */ FROM dual"
        );
    }

    #[test]
    fn multibyte_q_quote_delimiters_close() {
        let sql = "SELECT q'€abc€' AS x FROM t";
        assert!(matches!(modify_query(sql), Cow::Borrowed(_)));
        assert_eq!(
            modify_query("SELECT q'€FROM€' AS x"),
            "SELECT q'€FROM€' AS x FROM dual"
        );
        assert_eq!(mask_literals("a q'ΩxΩ' b"), format!("a {} b", " ".repeat(8)));
    }

    #[test]
    fn trailing_line_comment_keeps_clause_live() {
        assert_eq!(
            modify_query("SELECT 1 -- scalar"),
            "SELECT 1 -- scalar\nFROM dual"
        );
    }

    #[test]
    fn identifiers_containing_from_do_not_count() {
        assert_eq!(
            modify_query("SELECT fromage, date_from"),
            "SELECT fromage, date_from FROM dual"
        );
    }

    #[test]
    fn masking_blanks_literals_and_comments() {
        assert_eq!(mask_literals("a 'b' \"c\" -- d\ne"), "a             \ne");
        assert!(matches!(mask_literals("select 1"), Cow::Borrowed(_)));
    }

    #[test]
    fn manipulation_detection() {
        assert!(is_manip("INSERT INTO t VALUES (1)"));
        assert!(is_manip("  update t set a = 1"));
        assert!(is_manip("ALTER SESSION SET NLS_DATE_FORMAT='YYYY'"));
        assert!(is_manip("CREATE SEQUENCE s_seq START WITH 1"));
        assert!(!is_manip("SELECT * FROM t"));
        assert!(!is_manip("/* INSERT */ SELECT 1 FROM dual"));
        assert!(!is_manip("SELECT ename INTO v_name FROM emp"));
    }

    #[test]
    fn lob_returning_clause() {
        let params = vec![
            ("id".to_string(), DataType::Integer),
            ("doc".to_string(), DataType::Clob),
            ("img".to_string(), DataType::Blob),
        ];
        assert_eq!(
            append_lob_returning(
                "INSERT INTO files (id, doc, img) VALUES (:id, EMPTY_CLOB(), EMPTY_BLOB())",
                &params
            ),
            "INSERT INTO files (id, doc, img) VALUES (:id, EMPTY_CLOB(), EMPTY_BLOB()) RETURNING doc, img INTO :doc, :img"
        );
        let scalars = vec![("id".to_string(), DataType::Integer)];
        assert!(matches!(
            append_lob_returning("UPDATE t SET a = :id", &scalars),
            Cow::Borrowed(_)
        ));
    }
}
