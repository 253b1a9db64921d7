//! Rebuilds generated INSERT statements into a parameterized template plus
//! literal value tuples ordered by the schema's column order.

use crate::error::{Result, SqlaskError};
use crate::schema::{Schema, TableSchema};
use crate::sql::value::SqlValue;
use once_cell::sync::Lazy;
use regex::Regex;

static INSERT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^\s*insert\s+(?:ignore\s+|or\s+\w+\s+)?into\s+[`"\[]?[\w.]+[`"\]]?\s*(?:\(([^)]*)\))?\s*values\b(.*)$"#,
    )
    .unwrap()
});

/// Parameterized insert ready for a single bulk execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedInsert {
    pub table: String,
    pub columns: Vec<String>,
    pub template: String,
    pub rows: Vec<Vec<SqlValue>>,
}

fn repair_error(msg: impl Into<String>) -> SqlaskError {
    SqlaskError::Repair(msg.into())
}

/// Repair `statement` against the columns of `table`.
pub fn repair_insert(statement: &str, table: &str, schema: &Schema) -> Result<RepairedInsert> {
    let (table_name, table_schema) = schema
        .find_table(table)
        .ok_or_else(|| repair_error(format!("table `{}` not found in schema", table)))?;

    if table_schema.columns.is_empty() {
        return Err(repair_error(format!("table `{}` has no known columns", table_name)));
    }

    let captures = INSERT_REGEX.captures(statement).ok_or_else(|| {
        if statement.to_lowercase().contains("values") {
            repair_error("could not parse insert statement")
        } else {
            repair_error("insert statement has no VALUES clause")
        }
    })?;

    let named: Option<Vec<String>> = captures.get(1).map(|m| parse_column_list(m.as_str()));
    let tuples = parse_tuples(captures.get(2).map(|m| m.as_str()).unwrap_or(""))?;

    let (columns, order) = resolve_columns(table_name, table_schema, named)?;

    let mut rows = Vec::with_capacity(tuples.len());
    for (idx, tuple) in tuples.into_iter().enumerate() {
        if tuple.len() != order.len() {
            return Err(repair_error(format!(
                "row {} has {} values but `{}` expects {} ({})",
                idx + 1,
                tuple.len(),
                table_name,
                order.len(),
                columns.join(", ")
            )));
        }
        rows.push(order.iter().map(|&i| tuple[i].clone()).collect());
    }

    let quoted: Vec<String> = columns.iter().map(|c| format!("`{}`", c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let template = format!(
        "INSERT INTO `{}` ({}) VALUES ({})",
        table_name,
        quoted.join(", "),
        placeholders
    );

    Ok(RepairedInsert {
        table: table_name.to_string(),
        columns,
        template,
        rows,
    })
}

fn parse_column_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|c| c.trim().trim_matches(|ch| matches!(ch, '`' | '"' | '[' | ']')).to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Returns the template columns in schema order and, for each of them, the
/// index of its value inside a source tuple.
fn resolve_columns(
    table_name: &str,
    table: &TableSchema,
    named: Option<Vec<String>>,
) -> Result<(Vec<String>, Vec<usize>)> {
    let Some(named) = named else {
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let order = (0..columns.len()).collect();
        return Ok((columns, order));
    };

    if named.is_empty() {
        return Err(repair_error("insert statement has an empty column list"));
    }

    let mut positions = Vec::with_capacity(named.len());
    for (source_idx, name) in named.iter().enumerate() {
        let schema_idx = table.position(name).ok_or_else(|| {
            repair_error(format!("column `{}` does not exist in `{}`", name, table_name))
        })?;
        if positions.iter().any(|&(s, _)| s == schema_idx) {
            return Err(repair_error(format!(
                "column `{}` is listed twice",
                table.columns[schema_idx].name
            )));
        }
        positions.push((schema_idx, source_idx));
    }

    positions.sort_by_key(|&(schema_idx, _)| schema_idx);
    let columns = positions
        .iter()
        .map(|&(schema_idx, _)| table.columns[schema_idx].name.clone())
        .collect();
    let order = positions.iter().map(|&(_, source_idx)| source_idx).collect();
    Ok((columns, order))
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }
}

fn parse_tuples(text: &str) -> Result<Vec<Vec<SqlValue>>> {
    let mut cursor = Cursor::new(text.trim_end().trim_end_matches(';'));
    let mut tuples = Vec::new();

    loop {
        cursor.skip_ws();
        match cursor.bump() {
            Some('(') => tuples.push(parse_tuple(&mut cursor)?),
            Some(other) => {
                return Err(repair_error(format!(
                    "expected `(` to open a value tuple, found `{}`",
                    other
                )))
            }
            None => break,
        }

        cursor.skip_ws();
        match cursor.peek() {
            Some(',') => {
                cursor.bump();
            }
            None => break,
            Some(_) => {
                let rest: String = cursor.chars[cursor.pos..].iter().collect();
                return Err(repair_error(format!(
                    "unsupported text after VALUES: `{}`",
                    rest.trim()
                )));
            }
        }
    }

    if tuples.is_empty() {
        return Err(repair_error("insert statement has no value tuples"));
    }
    Ok(tuples)
}

fn parse_tuple(cursor: &mut Cursor) -> Result<Vec<SqlValue>> {
    let mut values = Vec::new();

    cursor.skip_ws();
    if cursor.peek() == Some(')') {
        cursor.bump();
        return Ok(values);
    }

    loop {
        cursor.skip_ws();
        values.push(parse_value(cursor)?);
        cursor.skip_ws();
        match cursor.bump() {
            Some(',') => continue,
            Some(')') => return Ok(values),
            Some(other) => {
                return Err(repair_error(format!(
                    "unexpected `{}` inside value tuple",
                    other
                )))
            }
            None => return Err(repair_error("unbalanced parentheses in VALUES")),
        }
    }
}

fn parse_value(cursor: &mut Cursor) -> Result<SqlValue> {
    match cursor.peek() {
        None => Err(repair_error("unbalanced parentheses in VALUES")),
        Some(q @ ('\'' | '"')) => {
            cursor.bump();
            parse_quoted(cursor, q).map(SqlValue::Text)
        }
        Some('?') => Err(repair_error("statement contains `?` placeholders instead of values")),
        Some('%') if cursor.peek_at(1) == Some('s') => {
            Err(repair_error("statement contains `%s` placeholders instead of values"))
        }
        Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => parse_number(cursor),
        Some(c) if c.is_alphabetic() || c == '_' => {
            let mut word = String::new();
            while let Some(c) = cursor.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                word.push(c);
                cursor.bump();
            }
            match word.to_ascii_uppercase().as_str() {
                "NULL" => Ok(SqlValue::Null),
                "TRUE" => Ok(SqlValue::Integer(1)),
                "FALSE" => Ok(SqlValue::Integer(0)),
                _ => Err(repair_error(format!("unsupported expression `{}` in VALUES", word))),
            }
        }
        Some(c) => Err(repair_error(format!("unsupported token `{}` in VALUES", c))),
    }
}

fn parse_quoted(cursor: &mut Cursor, quote: char) -> Result<String> {
    let mut out = String::new();
    loop {
        match cursor.bump() {
            None => return Err(repair_error("unterminated string literal")),
            Some(c) if c == quote => {
                // doubled quote escapes itself
                if cursor.peek() == Some(quote) {
                    cursor.bump();
                    out.push(quote);
                } else {
                    return Ok(out);
                }
            }
            Some('\\') => match cursor.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => return Err(repair_error("unterminated string literal")),
            },
            Some(c) => out.push(c),
        }
    }
}

fn parse_number(cursor: &mut Cursor) -> Result<SqlValue> {
    let mut text = String::new();
    if let Some(sign) = cursor.peek().filter(|c| matches!(c, '-' | '+')) {
        text.push(sign);
        cursor.bump();
    }
    while let Some(c) = cursor
        .peek()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E'))
    {
        text.push(c);
        cursor.bump();
        // exponent sign
        if matches!(c, 'e' | 'E') {
            if let Some(sign) = cursor.peek().filter(|c| matches!(c, '-' | '+')) {
                text.push(sign);
                cursor.bump();
            }
        }
    }

    if let Ok(i) = text.parse::<i64>() {
        return Ok(SqlValue::Integer(i));
    }
    text.parse::<f64>()
        .map(SqlValue::Real)
        .map_err(|_| repair_error(format!("invalid numeric literal `{}`", text)))
}
