//! Chunked, append-only per-table storage.
//!
//! Both storage modes share the same directory and chunk-numbering
//! conventions; [`relational`] and [`document`] each implement the mode-
//! specific record encoding (typed CSV rows vs. schemaless NDJSON) on top of
//! the helpers here.

pub mod document;
pub mod relational;

use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Parses the zero-based chunk index embedded between the first underscore
/// and the extension (relational: `chunk_3.csv`; document: `chunk_3`).
pub(crate) fn parse_chunk_index(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
    stem.strip_prefix("chunk_")?.parse::<usize>().ok()
}

pub(crate) fn chunk_file_name(index: usize, relational: bool) -> String {
    if relational {
        format!("chunk_{index}.csv")
    } else {
        format!("chunk_{index}")
    }
}

/// Lists a table's chunk files, sorted by their embedded index. The schema
/// sidecar (`schema.txt`) is skipped; anything else that doesn't parse as a
/// `chunk_<N>` name is ignored rather than erroring, so stray files in a
/// table directory don't break the invariant scan.
pub(crate) fn list_chunks(table_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut entries: Vec<(usize, PathBuf)> = Vec::new();
    let read_dir = match std::fs::read_dir(table_dir) {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(crate::error::io_err(&table_dir.to_path_buf(), e)),
    };
    for entry in read_dir {
        let entry = entry.map_err(|e| crate::error::io_err(&table_dir.to_path_buf(), e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(idx) = parse_chunk_index(&name) {
            entries.push((idx, entry.path()));
        }
    }
    entries.sort_by_key(|(idx, _)| *idx);
    Ok(entries.into_iter().map(|(_, path)| path).collect())
}

/// The path the next `append` should write to: either a fresh `chunk_0`, a
/// not-yet-full highest chunk, or the next index after a full one.
pub(crate) fn append_target(
    table_dir: &Path,
    chunk_size: usize,
    current_len: impl Fn(&Path) -> Result<usize, EngineError>,
    relational: bool,
) -> Result<(PathBuf, bool), EngineError> {
    let chunks = list_chunks(table_dir)?;
    match chunks.last() {
        None => Ok((table_dir.join(chunk_file_name(0, relational)), true)),
        Some(last) => {
            if current_len(last)? < chunk_size {
                Ok((last.clone(), false))
            } else {
                let next_idx = parse_chunk_index(&last.file_name().unwrap().to_string_lossy())
                    .unwrap_or(chunks.len() - 1)
                    + 1;
                Ok((table_dir.join(chunk_file_name(next_idx, relational)), true))
            }
        }
    }
}

/// Removes every file under a table directory then the directory itself
/// (used by `drop_table`).
pub(crate) fn remove_table_dir(table_dir: &Path) -> Result<(), EngineError> {
    if !table_dir.exists() {
        return Err(EngineError::NotFound(format!(
            "table directory {} does not exist",
            table_dir.display()
        )));
    }
    for entry in std::fs::read_dir(table_dir).map_err(|e| crate::error::io_err(&table_dir.to_path_buf(), e))? {
        let entry = entry.map_err(|e| crate::error::io_err(&table_dir.to_path_buf(), e))?;
        std::fs::remove_file(entry.path()).map_err(|e| crate::error::io_err(&entry.path(), e))?;
    }
    std::fs::remove_dir(table_dir).map_err(|e| crate::error::io_err(&table_dir.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relational_and_document_chunk_names() {
        assert_eq!(parse_chunk_index("chunk_0.csv"), Some(0));
        assert_eq!(parse_chunk_index("chunk_12.csv"), Some(12));
        assert_eq!(parse_chunk_index("chunk_3"), Some(3));
        assert_eq!(parse_chunk_index("schema.txt"), None);
    }
}
