//! External merge sort: two-phase sort producing a single sorted run in a
//! scoped temp workspace.
//!
//! The algorithm is generic over the record encoding — it operates on raw
//! lines of text plus a caller-supplied key extractor, so the same merge
//! machinery serves both the CSV-line relational chunks and the NDJSON-line
//! document chunks without needing to parse a full row/document just to
//! reorder it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::value::MixedKey;

/// Clears every entry under `dir` (creating it if missing). Called at the
/// start of every sort (scoped-resource discipline: clear on entry) and
/// again by the caller after a successful sort (clear on exit on success).
/// On failure the caller should *not* clear — leave artifacts for
/// postmortem rather than mask the error.
pub fn clear_temp_dir(dir: &Path) -> Result<(), EngineError> {
    if dir.exists() {
        for entry in std::fs::read_dir(dir).map_err(|e| crate::error::io_err(&dir.to_path_buf(), e))? {
            let entry = entry.map_err(|e| crate::error::io_err(&dir.to_path_buf(), e))?;
            std::fs::remove_file(entry.path()).map_err(|e| crate::error::io_err(&entry.path(), e))?;
        }
    } else {
        std::fs::create_dir_all(dir).map_err(|e| crate::error::io_err(&dir.to_path_buf(), e))?;
    }
    Ok(())
}

/// Produces one sorted run over the given per-chunk line groups, keyed by
/// `key_of`. Lines for which `key_of` returns `None` are discarded before
/// sorting (document mode: missing sort field; relational mode's caller is
/// expected to have already rejected this upstream).
///
/// Returns the path to the final merged run. Fails with `EmptyInput` if
/// every input chunk is empty (or there were no input chunks at all).
pub fn external_sort<F>(
    temp_dir: &Path,
    chunk_fan: usize,
    descending: bool,
    chunks: Vec<Vec<String>>,
    key_of: F,
) -> Result<PathBuf, EngineError>
where
    F: Fn(&str) -> Option<MixedKey>,
{
    clear_temp_dir(temp_dir)?;

    // Phase 1: run generation — one sorted run per input chunk.
    let mut run_paths = Vec::with_capacity(chunks.len());
    for (i, mut lines) in chunks.into_iter().enumerate() {
        lines.retain(|line| key_of(line).is_some());
        if lines.is_empty() {
            continue;
        }
        lines.sort_by(|a, b| {
            let ord = key_of(a).unwrap().cmp(&key_of(b).unwrap());
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        let path = temp_dir.join(format!("chunk_{i}_pass_0"));
        write_lines(&path, &lines)?;
        run_paths.push(path);
    }

    if run_paths.is_empty() {
        return Err(EngineError::EmptyInput(
            "external sort invoked on a table with no records".to_string(),
        ));
    }
    if run_paths.len() == 1 {
        return Ok(run_paths.into_iter().next().unwrap());
    }

    // Phase 2: repeatedly merge FAN runs at a time until one run remains.
    let mut pass = 0usize;
    while run_paths.len() > 1 {
        let mut next_paths = Vec::new();
        for (g, group) in run_paths.chunks(chunk_fan).enumerate() {
            let out_path = temp_dir.join(format!("chunk_{g}_pass_{}", pass + 1));
            merge_group(group, &key_of, descending, &out_path)?;
            next_paths.push(out_path);
        }
        for path in &run_paths {
            let _ = std::fs::remove_file(path);
        }
        run_paths = next_paths;
        pass += 1;
    }

    Ok(run_paths.into_iter().next().unwrap())
}

/// A heap entry tagged with its originating run, so the popped-from-which-
/// run link is preserved without recomputing the key.
struct HeapEntry {
    key: MixedKey,
    run_id: usize,
    line: String,
    descending: bool,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run_id == other.run_id
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; popping the record that should come out
        // of the merge first means it must compare as the greatest. For an
        // ascending merge that's the smallest key, so the natural order is
        // reversed; for descending it isn't. Ties break on run id ascending
        // (a documented tightening of the source's unspecified tie-break).
        let primary = if self.descending {
            self.key.cmp(&other.key)
        } else {
            other.key.cmp(&self.key)
        };
        primary.then_with(|| other.run_id.cmp(&self.run_id))
    }
}

fn merge_group(
    group: &[PathBuf],
    key_of: &impl Fn(&str) -> Option<MixedKey>,
    descending: bool,
    out_path: &Path,
) -> Result<(), EngineError> {
    let mut readers: Vec<BufReader<std::fs::File>> = group
        .iter()
        .map(|p| std::fs::File::open(p).map(BufReader::new).map_err(|e| crate::error::io_err(p, e)))
        .collect::<Result<_, _>>()?;

    let mut heap = BinaryHeap::new();
    for (run_id, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = next_line(reader)? {
            let key = key_of(&line).expect("run-generation already discarded keyless lines");
            heap.push(HeapEntry { key, run_id, line, descending });
        }
    }

    let out_file = std::fs::File::create(out_path).map_err(|e| crate::error::io_err(out_path, e))?;
    let mut out = BufWriter::new(out_file);
    while let Some(entry) = heap.pop() {
        writeln!(out, "{}", entry.line).map_err(|e| crate::error::io_err(out_path, e))?;
        if let Some(next) = next_line(&mut readers[entry.run_id])? {
            let key = key_of(&next).expect("run-generation already discarded keyless lines");
            heap.push(HeapEntry {
                key,
                run_id: entry.run_id,
                line: next,
                descending,
            });
        }
    }
    out.flush().map_err(|e| crate::error::io_err(out_path, e))
}

fn next_line(reader: &mut BufReader<std::fs::File>) -> Result<Option<String>, EngineError> {
    let mut buf = String::new();
    let n = reader
        .read_line(&mut buf)
        .map_err(|e| EngineError::IoFailure(e.to_string()))?;
    if n == 0 {
        return Ok(None);
    }
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), EngineError> {
    let file = std::fs::File::create(path).map_err(|e| crate::error::io_err(path, e))?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{line}").map_err(|e| crate::error::io_err(path, e))?;
    }
    out.flush().map_err(|e| crate::error::io_err(path, e))
}

/// Reads every line of a finished run back out, in order.
pub fn read_run(path: &Path) -> Result<Vec<String>, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::io_err(path, e))?;
    Ok(content.lines().map(str::to_string).collect())
}
