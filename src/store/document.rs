//! Document mode: schemaless bag of records, stored as newline-delimited
//! JSON chunks with no extension.

use std::path::Path;

use crate::error::EngineError;
use crate::record::Document;
use crate::value::{self, Scalar};

pub fn table_exists(document_root: &Path, name: &str) -> bool {
    document_root.join(name).is_dir()
}

/// Creates a table directory. `fields` is accepted for interface symmetry
/// with the relational mode but otherwise ignored — document mode has no
/// schema to enforce, so a warning is the only trace of the intent.
pub fn create_table(document_root: &Path, name: &str, fields: &[String]) -> Result<(), EngineError> {
    let table_dir = document_root.join(name);
    if table_dir.exists() {
        return Err(EngineError::AlreadyExists(format!("table '{name}' already exists")));
    }
    if !fields.is_empty() {
        tracing::warn!(table = name, "document tables do not enforce a schema; fields are not stored");
    }
    std::fs::create_dir_all(&table_dir).map_err(|e| crate::error::io_err(&table_dir, e))
}

pub fn drop_table(document_root: &Path, name: &str) -> Result<(), EngineError> {
    super::remove_table_dir(&document_root.join(name))
}

pub fn chunks(document_root: &Path, name: &str) -> Result<Vec<std::path::PathBuf>, EngineError> {
    super::list_chunks(&document_root.join(name))
}

fn chunk_len(path: &Path) -> Result<usize, EngineError> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::io_err(path, e))?;
    Ok(content.lines().filter(|l| !l.is_empty()).count())
}

pub fn append(document_root: &Path, name: &str, doc: Document, chunk_size: usize) -> Result<(), EngineError> {
    let table_dir = document_root.join(name);
    if !table_dir.is_dir() {
        return Err(EngineError::NotFound(format!("table '{name}' does not exist")));
    }
    let (path, _is_new) = super::append_target(&table_dir, chunk_size, chunk_len, false)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| crate::error::io_err(&path, e))?;
    use std::io::Write;
    let line = serde_json::to_string(&doc_to_json(&doc)).map_err(EngineError::from)?;
    writeln!(file, "{line}").map_err(|e| crate::error::io_err(&path, e))
}

pub fn read_chunk(path: &Path) -> Result<Vec<Document>, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::io_err(path, e))?;
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).map_err(EngineError::from)?;
            json_to_doc(value)
        })
        .collect()
}

/// Truncate-then-write, same documented limitation as the relational chunk
/// rewrite — update/delete atomicity is not improved, see DESIGN.md.
pub fn rewrite_chunk(path: &Path, docs: &[Document]) -> Result<(), EngineError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .map_err(|e| crate::error::io_err(path, e))?;
    for doc in docs {
        let line = serde_json::to_string(&doc_to_json(doc)).map_err(EngineError::from)?;
        writeln!(file, "{line}").map_err(|e| crate::error::io_err(path, e))?;
    }
    Ok(())
}

/// Loads a CSV file into a new document table, converting each row to a
/// document keyed by the CSV header.
pub fn load_csv(
    ingest_dir: &Path,
    document_root: &Path,
    file_name: &str,
    chunk_size: usize,
) -> Result<String, EngineError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| EngineError::MalformedQuery(format!("invalid csv file name '{file_name}'")))?
        .to_string();
    if table_exists(document_root, &stem) {
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

    create_table(document_root, &stem, &[])?;
    for record in records {
        let record = record.map_err(EngineError::from)?;
        let doc: Document = fields
            .iter()
            .cloned()
            .zip(record.iter().map(value::parse_literal))
            .collect();
        append(document_root, &stem, doc, chunk_size)?;
    }
    Ok(stem)
}

pub(crate) fn scalar_to_json(value: &Scalar) -> serde_json::Value {
    match value {
        Scalar::Int(v) => serde_json::json!(v),
        Scalar::Float(v) => serde_json::json!(v),
        Scalar::Text(s) => serde_json::json!(s),
    }
}

/// Exposed to `crate::operators::document` so the sort key extractor can
/// read a single field out of a raw NDJSON line without parsing the whole
/// document into a `Document` map just to throw most of it away.
pub(crate) fn json_to_scalar(value: &serde_json::Value) -> Scalar {
    match value {
        serde_json::Value::String(s) => Scalar::Text(s.clone()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Int(i),
            None => Scalar::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::Bool(b) => Scalar::Text(b.to_string()),
        serde_json::Value::Null => Scalar::Text(String::new()),
        other => Scalar::Text(other.to_string()),
    }
}

pub(crate) fn doc_to_json(doc: &Document) -> serde_json::Value {
    serde_json::Value::Object(doc.iter().map(|(k, v)| (k.clone(), scalar_to_json(v))).collect())
}

pub(crate) fn json_to_doc(value: serde_json::Value) -> Result<Document, EngineError> {
    match value {
        serde_json::Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), json_to_scalar(v))).collect()),
        _ => Err(EngineError::MalformedQuery("document record is not a JSON object".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(pairs: &[(&str, Scalar)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn append_preserves_types_through_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        create_table(root, "t", &[]).unwrap();
        append(root, "t", doc(&[("k", Scalar::Int(1)), ("name", Scalar::Text("a".into()))]), 2).unwrap();

        let chunks = chunks(root, "t").unwrap();
        let docs = read_chunk(&chunks[0]).unwrap();
        assert_eq!(docs[0]["k"], Scalar::Int(1));
        assert_eq!(docs[0]["name"], Scalar::Text("a".into()));
    }

    #[test]
    fn create_table_ignores_fields_but_does_not_fail() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        create_table(root, "t", &["ignored".to_string()]).unwrap();
        assert!(table_exists(root, "t"));
    }

    #[test]
    fn rolls_to_next_chunk_when_full() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        create_table(root, "t", &[]).unwrap();
        for i in 0..3 {
            append(root, "t", doc(&[("k", Scalar::Int(i))]), 2).unwrap();
        }
        assert_eq!(chunks(root, "t").unwrap().len(), 2);
    }
}
