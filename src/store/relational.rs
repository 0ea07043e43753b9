//! Relational mode: typed schema, rows stored as CSV chunks.

use std::path::Path;

use crate::error::EngineError;
use crate::record::{Row, Schema};
use crate::value::{self, Scalar, ScalarType};

const SCHEMA_FILE: &str = "schema.txt";

pub fn table_exists(relational_root: &Path, name: &str) -> bool {
    relational_root.join(name).is_dir()
}

/// Creates a table directory and writes the schema header line (field names
/// only — types are inferred on first insertion).
pub fn create_table(relational_root: &Path, name: &str, fields: &[String]) -> Result<(), EngineError> {
    let table_dir = relational_root.join(name);
    if table_dir.exists() {
        return Err(EngineError::AlreadyExists(format!("table '{name}' already exists")));
    }
    std::fs::create_dir_all(&table_dir).map_err(|e| crate::error::io_err(&table_dir, e))?;
    write_schema_header(&table_dir, fields)
}

pub fn drop_table(relational_root: &Path, name: &str) -> Result<(), EngineError> {
    super::remove_table_dir(&relational_root.join(name))
}

pub fn chunks(relational_root: &Path, name: &str) -> Result<Vec<std::path::PathBuf>, EngineError> {
    super::list_chunks(&relational_root.join(name))
}

pub fn read_schema(relational_root: &Path, name: &str) -> Result<Schema, EngineError> {
    let table_dir = relational_root.join(name);
    if !table_dir.is_dir() {
        return Err(EngineError::NotFound(format!("table '{name}' does not exist")));
    }
    let path = table_dir.join(SCHEMA_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| crate::error::io_err(&path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(content.as_bytes());
    let mut records = reader.records();
    let fields_record = records
        .next()
        .ok_or_else(|| EngineError::SchemaMismatch(format!("{} has no field line", path.display())))?
        .map_err(EngineError::from)?;
    let fields: Vec<String> = fields_record.iter().map(str::to_string).collect();

    let types = match records.next() {
        None => None,
        Some(rec) => {
            let rec = rec.map_err(EngineError::from)?;
            let parsed: Option<Vec<ScalarType>> = rec.iter().map(ScalarType::parse_tag).collect();
            Some(parsed.ok_or_else(|| {
                EngineError::SchemaMismatch(format!("unrecognized type tag in {}", path.display()))
            })?)
        }
    };
    Ok(Schema { fields, types })
}

fn write_schema_header(table_dir: &Path, fields: &[String]) -> Result<(), EngineError> {
    let path = table_dir.join(SCHEMA_FILE);
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(EngineError::from)?;
    wtr.write_record(fields).map_err(EngineError::from)?;
    wtr.flush().map_err(|e| crate::error::io_err(&path, e))
}

/// Rewrites `schema.txt` in full via a sibling-then-rename, so a crash
/// during type inference leaves either the header-only file or the
/// complete two-line file, never a truncated one. This is the one place
/// the source's truncate-then-write is replaced with atomic rename, since
/// (unlike update/delete chunk rewrites) there is no existing documented
/// partial-failure behavior here to preserve.
fn write_schema_types(table_dir: &Path, fields: &[String], types: &[ScalarType]) -> Result<(), EngineError> {
    let final_path = table_dir.join(SCHEMA_FILE);
    let tmp_path = table_dir.join(format!("{SCHEMA_FILE}.tmp"));
    {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp_path)
            .map_err(EngineError::from)?;
        wtr.write_record(fields).map_err(EngineError::from)?;
        wtr.write_record(types.iter().map(|t| t.tag())).map_err(EngineError::from)?;
        wtr.flush().map_err(|e| crate::error::io_err(&tmp_path, e))?;
    }
    std::fs::rename(&tmp_path, &final_path).map_err(|e| crate::error::io_err(&final_path, e))
}

fn chunk_len(path: &Path) -> Result<usize, EngineError> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::io_err(path, e))?;
    Ok(content.lines().filter(|l| !l.is_empty()).count())
}

/// Appends one row, inferring and persisting column types on the first
/// insertion into a table whose schema has only the header line.
pub fn append(relational_root: &Path, name: &str, row: Row, chunk_size: usize) -> Result<(), EngineError> {
    let table_dir = relational_root.join(name);
    if !table_dir.is_dir() {
        return Err(EngineError::NotFound(format!("table '{name}' does not exist")));
    }
    let mut schema = read_schema(relational_root, name)?;

    if schema.types.is_none() {
        if row.iter().any(|v| matches!(v, Scalar::Text(s) if s.is_empty())) {
            return Err(EngineError::SchemaMismatch(format!(
                "cannot infer types for '{name}': inserted row has an empty field"
            )));
        }
        let inferred: Vec<ScalarType> = row.iter().map(Scalar::type_of).collect();
        write_schema_types(&table_dir, &schema.fields, &inferred)?;
        schema.types = Some(inferred);
    }

    if row.len() != schema.fields.len() {
        return Err(EngineError::SchemaMismatch(format!(
            "row arity {} does not match schema arity {} for '{name}'",
            row.len(),
            schema.fields.len()
        )));
    }

    let (path, _is_new) = super::append_target(&table_dir, chunk_size, chunk_len, true)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| crate::error::io_err(&path, e))?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    wtr.write_record(row.iter().map(Scalar::to_text)).map_err(EngineError::from)?;
    wtr.flush().map_err(|e| crate::error::io_err(&path, e))
}

pub fn read_chunk(path: &Path, types: &[ScalarType]) -> Result<Vec<Row>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(EngineError::from)?;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(EngineError::from)?;
        let row: Row = record
            .iter()
            .zip(types.iter())
            .map(|(cell, ty)| value::coerce(Scalar::Text(cell.to_string()), *ty))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Truncate-then-write: a crash mid-rewrite may leave the chunk partially
/// written. Unlike the schema sidecar, update/delete never get the
/// rename-based atomicity — see DESIGN.md for why.
pub fn rewrite_chunk(path: &Path, rows: &[Row]) -> Result<(), EngineError> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .map_err(|e| crate::error::io_err(path, e))?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    for row in rows {
        wtr.write_record(row.iter().map(Scalar::to_text)).map_err(EngineError::from)?;
    }
    wtr.flush().map_err(|e| crate::error::io_err(path, e))
}

/// Loads a CSV file from the ingest directory into a new relational table,
/// deriving the table name from the filename stem. The header line becomes
/// the schema; every subsequent row is inserted through [`append`] (which
/// performs the type-inference-on-first-row behavior).
pub fn load_csv(
    ingest_dir: &Path,
    relational_root: &Path,
    file_name: &str,
    chunk_size: usize,
) -> Result<String, EngineError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| EngineError::MalformedQuery(format!("invalid csv file name '{file_name}'")))?
        .to_string();
    if table_exists(relational_root, &stem) {
        return Err(EngineError::AlreadyExists(format!("table '{stem}' already exists")));
    }

    let path = ingest_dir.join(file_name);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(EngineError::from)?;
    let mut records = reader.records();
    let header = records
        .next()
        .ok_or_else(|| EngineError::MalformedQuery(format!("{file_name} is empty")))?
        .map_err(EngineError::from)?;
    let fields: Vec<String> = header.iter().map(str::to_string).collect();

    create_table(relational_root, &stem, &fields)?;
    for record in records {
        let record = record.map_err(EngineError::from)?;
        let row: Row = record.iter().map(value::parse_literal).collect();
        append(relational_root, &stem, row, chunk_size)?;
    }
    Ok(stem)
}
