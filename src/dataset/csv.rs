//! CSV Codec
//!
//! Reads a comma-separated dataset (header line first) into a typed `Table`
//! and writes tables back out. Block payloads use the same format with a
//! leading `index` column, and each other header field carries the column's
//! kind as `name:number` or `name:text`.

use super::types::{Column, ColumnKind, INDEX_COLUMN, IndexedRow, Table, Value};
use crate::error::{EdfsError, EdfsResult};

pub fn parse_table(text: &str) -> EdfsResult<Table> {
    let Some((header, cells)) = split_grid(text)? else {
        return Ok(Table::default());
    };

    let columns: Vec<Column> = header
        .into_iter()
        .enumerate()
        .map(|(i, name)| Column {
            name: name.trim().to_string(),
            kind: infer_kind(&cells, i),
        })
        .collect();
    let rows = cells
        .into_iter()
        .map(|record| typed_record(record, &columns))
        .collect();

    Ok(Table { columns, rows })
}

/// Header record plus data records, all of the header's width.
fn split_grid(text: &str) -> EdfsResult<Option<(Vec<String>, Vec<Vec<String>>)>> {
    let mut records = split_records(text)?.into_iter();

    let Some(header) = records.next() else {
        return Ok(None);
    };
    let width = header.len();

    let mut cells: Vec<Vec<String>> = Vec::new();
    for (line, record) in records.enumerate() {
        if record.len() != width {
            return Err(EdfsError::Dataset(format!(
                "record {} has {} fields, expected {}",
                line + 2,
                record.len(),
                width
            )));
        }
        cells.push(record);
    }

    Ok(Some((header, cells)))
}

/// Numeric iff every non-empty cell parses as a number.
fn infer_kind(cells: &[Vec<String>], column: usize) -> ColumnKind {
    let numeric = cells
        .iter()
        .map(|row| row[column].trim())
        .filter(|cell| !cell.is_empty())
        .all(|cell| cell.parse::<f64>().is_ok());
    if numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

fn typed_record(record: impl IntoIterator<Item = String>, columns: &[Column]) -> Vec<Value> {
    record
        .into_iter()
        .zip(columns)
        .map(|(cell, column)| typed_cell(cell, column.kind))
        .collect()
}

fn typed_cell(cell: String, kind: ColumnKind) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Numeric => trimmed
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Text => Value::Text(cell),
    }
}

/// Parses a block payload, splitting off the stable index column.
///
/// Column kinds come from the `name:kind` header written at ingest, so a
/// block whose text cells happen to look numeric still reads back as text.
pub fn parse_indexed(text: &str) -> EdfsResult<(Vec<Column>, Vec<IndexedRow>)> {
    let missing_index =
        || EdfsError::Dataset(format!("block payload has no '{}' column", INDEX_COLUMN));

    let (header, cells) = split_grid(text)?.ok_or_else(missing_index)?;
    let mut fields = header.into_iter();
    if fields.next().is_none_or(|first| first.trim() != INDEX_COLUMN) {
        return Err(missing_index());
    }
    let columns = fields
        .map(|field| typed_header(&field))
        .collect::<EdfsResult<Vec<Column>>>()?;

    let mut rows = Vec::with_capacity(cells.len());
    for record in cells {
        let mut record = record.into_iter();
        let raw_index = record.next().unwrap_or_default();
        let index = raw_index.trim().parse::<u64>().map_err(|_| {
            EdfsError::Dataset(format!("invalid row index '{}'", raw_index))
        })?;
        rows.push(IndexedRow {
            index,
            values: typed_record(record, &columns),
        });
    }

    Ok((columns, rows))
}

fn typed_header(field: &str) -> EdfsResult<Column> {
    let (name, tag) = field
        .rsplit_once(':')
        .ok_or_else(|| EdfsError::Dataset(format!("column '{}' has no kind", field)))?;
    let kind = ColumnKind::from_tag(tag.trim()).ok_or_else(|| {
        EdfsError::Dataset(format!("column '{}' has unknown kind '{}'", name, tag))
    })?;
    Ok(Column {
        name: name.trim().to_string(),
        kind,
    })
}

pub fn encode_table(table: &Table) -> String {
    let mut out = String::new();
    write_record(&mut out, table.columns.iter().map(|c| c.name.clone()));
    for row in &table.rows {
        write_record(&mut out, row.iter().map(|v| v.to_string()));
    }
    out
}

pub fn encode_indexed(columns: &[Column], rows: &[IndexedRow]) -> String {
    let mut out = String::new();
    write_record(
        &mut out,
        std::iter::once(INDEX_COLUMN.to_string())
            .chain(columns.iter().map(|c| format!("{}:{}", c.name, c.kind.tag()))),
    );
    for row in rows {
        write_record(
            &mut out,
            std::iter::once(row.index.to_string()).chain(row.values.iter().map(|v| v.to_string())),
        );
    }
    out
}

fn write_record(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&field);
        }
    }
    out.push('\n');
}

/// Splits text into records, honouring double-quoted fields. Blank lines are skipped.
fn split_records(text: &str) -> EdfsResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(EdfsError::Dataset("unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}
