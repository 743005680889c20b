//! Splits a SQL dump into statements.
//!
//! Aware of string literals, quoted identifiers, comments and PostgreSQL
//! dollar quoting. `COPY ... FROM stdin` data blocks are skipped.
//!
//! For MySQL, `DELIMITER` lines change the statement terminator, and
//! conditional comments (`/*!50003 ... */`) that open a statement are
//! unwrapped so wrapped triggers and routines are seen. Conditional
//! comments after other text (table options, partitioning) are dropped.

use crate::core::SourceDialect;

/// One statement and the line it starts on (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub text: String,
    pub line: usize,
}

/// Split `sql` into statements, dropping empty ones.
///
/// MySQL enables `#` comments and backslash escapes; PostgreSQL enables
/// dollar quoting.
pub fn split_statements(sql: &str, dialect: SourceDialect) -> Vec<RawStatement> {
    let mysql = dialect == SourceDialect::Mysql;
    let chars: Vec<char> = sql.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut i = 0usize;
    let mut delimiter: Vec<char> = vec![';'];
    // Statement text so far came only from unwrapped conditional comments
    let mut conditional_only = false;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if current.trim().is_empty() {
            start_line = line;
            if mysql && starts_with_keyword(&chars, i, "DELIMITER") {
                let end = skip_line(&chars, i);
                let rest: String = chars[i + "DELIMITER".len()..end].iter().collect();
                if let Some(token) = rest.split_whitespace().next() {
                    delimiter = token.chars().collect();
                }
                current.clear();
                i = end;
                continue;
            }
        }

        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c, mysql);
                for ch in &chars[i..end] {
                    if *ch == '\n' {
                        line += 1;
                    }
                    current.push(*ch);
                }
                conditional_only = false;
                i = end;
                continue;
            }
            '-' if next == Some('-') => {
                i = skip_line(&chars, i);
                continue;
            }
            '#' if mysql => {
                i = skip_line(&chars, i);
                continue;
            }
            '/' if next == Some('*') => {
                let end = skip_block_comment(&chars, i);
                line += chars[i..end].iter().filter(|c| **c == '\n').count();
                let opens_statement = current.trim().is_empty() || conditional_only;
                if mysql && opens_statement && chars.get(i + 2) == Some(&'!') {
                    current.push_str(&conditional_body(&chars[i..end]));
                    conditional_only = true;
                }
                current.push(' ');
                i = end;
                continue;
            }
            _ if chars[i..].starts_with(&delimiter) => {
                let text = current.trim().to_string();
                current.clear();
                conditional_only = false;
                i += delimiter.len();
                if text.is_empty() {
                    continue;
                }
                let is_copy_stdin = !mysql && is_copy_from_stdin(&text);
                out.push(RawStatement {
                    text,
                    line: start_line,
                });
                if is_copy_stdin {
                    let (end, lines) = skip_copy_data(&chars, i);
                    line += lines;
                    i = end;
                }
                continue;
            }
            '$' if !mysql => {
                if let Some(tag) = dollar_tag(&chars, i) {
                    let end = skip_dollar_quoted(&chars, i, &tag);
                    for ch in &chars[i..end] {
                        if *ch == '\n' {
                            line += 1;
                        }
                        current.push(*ch);
                    }
                    i = end;
                    continue;
                }
                current.push(c);
            }
            '\n' => {
                line += 1;
                current.push(c);
            }
            _ => {
                if !c.is_whitespace() {
                    conditional_only = false;
                }
                current.push(c);
            }
        }
        i += 1;
    }

    let text = current.trim().to_string();
    if !text.is_empty() {
        out.push(RawStatement {
            text,
            line: start_line,
        });
    }
    out
}

fn skip_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && backslash_escapes && quote == '\'' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn skip_line(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

/// Case-insensitive `keyword` at `start`, followed by whitespace.
fn starts_with_keyword(chars: &[char], start: usize, keyword: &str) -> bool {
    let len = keyword.len();
    if start + len >= chars.len() {
        return false;
    }
    chars[start..start + len]
        .iter()
        .zip(keyword.chars())
        .all(|(a, b)| a.eq_ignore_ascii_case(&b))
        && chars[start + len].is_whitespace()
}

/// Text of a `/*!NNNNN ... */` comment without the markers and version.
fn conditional_body(comment: &[char]) -> String {
    let inner = &comment[3..comment.len().saturating_sub(2).max(3)];
    let skip = inner.iter().take_while(|c| c.is_ascii_digit()).count();
    inner[skip..].iter().collect()
}

fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// `$tag$` starting at `start`, if any. Positional parameters (`$1`) are not tags.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            return Some(chars[start..=i].iter().collect());
        }
        if !(c.is_alphanumeric() || c == '_') || (i == start + 1 && c.is_ascii_digit()) {
            return None;
        }
        i += 1;
    }
    None
}

fn skip_dollar_quoted(chars: &[char], start: usize, tag: &str) -> usize {
    let tag: Vec<char> = tag.chars().collect();
    let mut i = start + tag.len();
    while i + tag.len() <= chars.len() {
        if chars[i..i + tag.len()] == tag[..] {
            return i + tag.len();
        }
        i += 1;
    }
    chars.len()
}

fn is_copy_from_stdin(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.starts_with("COPY ") && upper.contains("FROM STDIN")
}

/// Skip data lines up to and including the `\.` terminator.
fn skip_copy_data(chars: &[char], start: usize) -> (usize, usize) {
    let mut i = start;
    let mut lines = 0;
    // rest of the COPY line
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    while i < chars.len() {
        i += 1;
        lines += 1;
        let line_start = i;
        while i < chars.len() && chars[i] != '\n' {
            i += 1;
        }
        let row: String = chars[line_start..i].iter().collect();
        if row.trim_end() == "\\." {
            return (i, lines);
        }
    }
    (i, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PG: SourceDialect = SourceDialect::Postgres;
    const MY: SourceDialect = SourceDialect::Mysql;

    #[test]
    fn test_split_simple() {
        let stmts = split_statements("CREATE TABLE a (id int);\nCREATE TABLE b (id int);", PG);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "CREATE TABLE a (id int)");
        assert_eq!(stmts[1].line, 2);
    }

    #[test]
    fn test_semicolons_in_literals_and_identifiers() {
        let sql = "INSERT INTO t VALUES ('a;b', 'it''s');\nCREATE TABLE `x;y` (\"c;d\" int);";
        let stmts = split_statements(sql, MY);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].text.contains("'a;b'"));
        assert!(stmts[1].text.contains("`x;y`"));
    }

    #[test]
    fn test_comments_are_dropped() {
        let sql = "-- header; comment\n# mysql comment;\n/* block; */ CREATE TABLE a (id int); /*!40101 SET x=1 */;";
        let stmts = split_statements(sql, MY);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "CREATE TABLE a (id int)");
        assert_eq!(stmts[0].line, 3);
        assert_eq!(stmts[1].text, "SET x=1");
    }

    #[test]
    fn test_conditional_comment_after_text_is_dropped() {
        let sql = "CREATE TABLE a (id int) ENGINE=InnoDB /*!50100 PARTITION BY HASH (id) */;";
        let stmts = split_statements(sql, MY);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "CREATE TABLE a (id int) ENGINE=InnoDB");
    }

    #[test]
    fn test_delimiter_and_wrapped_trigger() {
        let sql = "CREATE TABLE a (id int);\n\
                   DELIMITER ;;\n\
                   /*!50003 CREATE*/ /*!50017 DEFINER=`root`@`%`*/ /*!50003 TRIGGER `a_bi` BEFORE INSERT ON `a` FOR EACH ROW BEGIN SET NEW.id = 1; SET @x = 2; END */;;\n\
                   DELIMITER ;\n\
                   CREATE TABLE b (id int);";
        let stmts = split_statements(sql, MY);
        assert_eq!(stmts.len(), 3);
        assert!(stmts[1].text.starts_with("CREATE"));
        assert!(stmts[1].text.contains("TRIGGER `a_bi`"));
        assert!(stmts[1].text.ends_with("END"));
        assert_eq!(stmts[2].text, "CREATE TABLE b (id int)");
    }

    #[test]
    fn test_delimiter_for_plain_procedure() {
        let sql = "DELIMITER $$\nCREATE PROCEDURE p() BEGIN SELECT 1; SELECT 2; END$$\nDELIMITER ;\nCREATE TABLE t (id int);";
        let stmts = split_statements(sql, MY);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].text.ends_with("END"));
        assert_eq!(stmts[1].line, 4);
    }

    #[test]
    fn test_dollar_quoted_function_body() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql;\nSELECT $1;";
        let stmts = split_statements(sql, PG);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].text.ends_with("LANGUAGE sql"));
    }

    #[test]
    fn test_copy_data_is_skipped() {
        let sql = "COPY public.t (id, name) FROM stdin;\n1\tfoo;bar\n2\tbaz\n\\.\nCREATE TABLE z (id int);";
        let stmts = split_statements(sql, PG);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].text.starts_with("COPY"));
        assert_eq!(stmts[1].text, "CREATE TABLE z (id int)");
        assert_eq!(stmts[1].line, 5);
    }

    #[test]
    fn test_postgres_keeps_hash_and_backslash() {
        let sql = "CREATE TABLE t (p text DEFAULT 'C:\\', j jsonb CHECK (j #>> '{a}' <> ''));";
        let stmts = split_statements(sql, PG);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].text.contains("#>>"));
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        let stmts = split_statements("CREATE TABLE a (id int)", MY);
        assert_eq!(stmts.len(), 1);
    }
}
