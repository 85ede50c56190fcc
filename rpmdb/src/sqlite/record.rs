//! SQLite record format and the bits of table DDL needed to find a column
use std::ops::Range;

/// Decode a big-endian varint, returning the value and its length in bytes
pub fn varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(9).enumerate() {
        if i == 8 {
            return Some(((value << 8) | u64::from(byte), 9));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// One column of a record, borrowing from the payload
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Column<'a> {
    Null,
    Int(i64),
    Real(f64),
    Text(&'a [u8]),
    Blob(&'a [u8]),
}

impl<'a> Column<'a> {
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            Column::Text(text) => std::str::from_utf8(text).ok(),
            _ => None,
        }
    }
}

/// Width of the body of a column with serial type `serial`
fn serial_size(serial: u64) -> Option<usize> {
    let size = match serial {
        0 | 8 | 9 => 0,
        1..=4 => serial as usize,
        5 => 6,
        6 | 7 => 8,
        10 | 11 => return None,
        _ => usize::try_from((serial - 12) / 2).ok()?,
    };
    Some(size)
}

fn decode(serial: u64, data: &[u8]) -> Column<'_> {
    match serial {
        0 => Column::Null,
        8 => Column::Int(0),
        9 => Column::Int(1),
        1..=6 => {
            // Sign-extend the big-endian two's complement value
            let mut be = [if data[0] & 0x80 != 0 { 0xff } else { 0 }; 8];
            be[8 - data.len()..].copy_from_slice(data);
            Column::Int(i64::from_be_bytes(be))
        }
        7 => {
            let mut be = [0; 8];
            be.copy_from_slice(data);
            Column::Real(f64::from_be_bytes(be))
        }
        serial if serial % 2 == 0 => Column::Blob(data),
        _ => Column::Text(data),
    }
}

/// Split a record payload into its columns, `None` if malformed
pub fn parse_record(payload: &[u8]) -> Option<Vec<Column<'_>>> {
    let (header_len, mut pos) = varint(payload)?;
    let header_len = usize::try_from(header_len).ok()?;
    if header_len < pos || header_len > payload.len() {
        return None;
    }

    let mut body = header_len;
    let mut columns = Vec::new();
    while pos < header_len {
        let (serial, len) = varint(&payload[pos..header_len])?;
        pos += len;

        let size = serial_size(serial)?;
        let range: Range<usize> = body..body.checked_add(size)?;
        columns.push(decode(serial, payload.get(range)?));
        body += size;
    }
    Some(columns)
}

/// Column layout of a table, from its `CREATE TABLE` statement
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<String>,
    /// Column declared `INTEGER PRIMARY KEY`, stored as NULL in records
    pub rowid_alias: Option<usize>,
}

const TABLE_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

impl TableSchema {
    pub fn parse(sql: &str) -> Option<TableSchema> {
        let open = sql.find('(')?;
        let close = sql.rfind(')')?;
        let body = sql.get(open + 1..close)?;

        let mut schema = TableSchema::default();
        let mut primary_key = None;
        for def in split_top_level(body) {
            let (first, rest) = first_token(def)?;
            let keyword = first.to_ascii_uppercase();
            if TABLE_CONSTRAINTS.contains(&keyword.as_str()) {
                if keyword == "PRIMARY" {
                    // PRIMARY KEY (col): an alias only when it names one INTEGER column
                    let inner = rest.get(rest.find('(')? + 1..rest.rfind(')')?)?;
                    if !inner.contains(',') {
                        primary_key = Some(unquote(inner.trim()).to_string());
                    }
                }
                continue;
            }

            let upper = rest.to_ascii_uppercase();
            let declared_integer = upper.split_whitespace().next() == Some("INTEGER");
            if declared_integer && upper.contains("PRIMARY KEY") {
                schema.rowid_alias = Some(schema.columns.len());
            }
            schema.columns.push(unquote(first).to_string());
        }

        if let Some(name) = primary_key {
            if schema.rowid_alias.is_none() {
                schema.rowid_alias = schema.column(&name);
            }
        }
        (!schema.columns.is_empty()).then_some(schema)
    }

    /// Index of column `name`, compared case-insensitively
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }
}

/// Split at commas outside parentheses and quotes
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '[') => quote = Some(']'),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// First identifier of a definition and the text after it
fn first_token(def: &str) -> Option<(&str, &str)> {
    let def = def.trim_start();
    let close = match def.chars().next()? {
        '"' => Some('"'),
        '`' => Some('`'),
        '\'' => Some('\''),
        '[' => Some(']'),
        _ => None,
    };
    let end = match close {
        Some(close) => def[1..].find(close)? + 2,
        None => def.find(|c: char| c.is_whitespace() || c == '(').unwrap_or(def.len()),
    };
    Some((&def[..end], &def[end..]))
}

fn unquote(name: &str) -> &str {
    let mut chars = name.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) | (Some('`'), Some('`')) | (Some('\''), Some('\'')) | (Some('['), Some(']')) => {
            &name[1..name.len() - 1]
        }
        _ => name,
    }
}
