//! Common test fixtures and helpers.
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::{TestEngines, CollectingSink};
//! ```

use duoq::config::EngineConfig;
use duoq::operators::document::DocumentEngine;
use duoq::operators::relational::RelationalEngine;
use duoq::record::Document;
use duoq::sink::RecordSink;
use duoq::value::Scalar;
use duoq::EngineError;
use tempfile::TempDir;

/// A pair of engines sharing one isolated storage root, with automatic
/// cleanup. Mirrors the backing-`TempDir`-kept-alive pattern used for store
/// fixtures elsewhere in this corpus.
pub struct TestEngines {
    pub relational: RelationalEngine,
    pub document: DocumentEngine,
    _dir: TempDir,
}

impl TestEngines {
    pub fn new(chunk_size: usize) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let relational = RelationalEngine::new(EngineConfig::rooted_at(dir.path(), chunk_size));
        let document = DocumentEngine::new(EngineConfig::rooted_at(dir.path(), chunk_size));
        TestEngines { relational, document, _dir: dir }
    }
}

/// A record sink that collects every emitted record for assertions.
#[derive(Default)]
pub struct CollectingSink {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    pub docs: Vec<Document>,
    pub texts: Vec<String>,
    pub scalars: Vec<Scalar>,
    pub keyed: Vec<(Scalar, Scalar)>,
    pub diagnostics: Vec<EngineError>,
}

impl RecordSink for CollectingSink {
    fn relational_header(&mut self, fields: &[String]) {
        self.header = fields.to_vec();
    }
    fn row(&mut self, values: Vec<Scalar>) {
        self.rows.push(values);
    }
    fn document(&mut self, doc: Document) {
        self.docs.push(doc);
    }
    fn text(&mut self, value: String) {
        self.texts.push(value);
    }
    fn scalar(&mut self, value: Scalar) {
        self.scalars.push(value);
    }
    fn keyed_scalar(&mut self, key: Scalar, value: Scalar) {
        self.keyed.push((key, value));
    }
    fn diagnostic(&mut self, error: EngineError) {
        self.diagnostics.push(error);
    }
}

pub fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
