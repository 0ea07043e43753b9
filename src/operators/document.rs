//! Document-mode operator implementations. No schema to validate
//! against; every field reference is resolved per-record, and a record
//! missing the field in question is handled per the rule named at each
//! operation (predicate: false; sort/group: dropped; aggregate: `0`
//! contribution for count/sum/avg, no contribution for max/min).

use crate::aggregate::{AggFn, Accumulator};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::predicate;
use crate::record::Document;
use crate::sink::RecordSink;
use crate::store::document as store;
use crate::value::{self, MixedKey, Scalar};

use super::{parse_assignments, Direction, QueryEngine};

pub struct DocumentEngine {
    pub config: EngineConfig,
}

impl DocumentEngine {
    pub fn new(config: EngineConfig) -> Self {
        DocumentEngine { config }
    }

    fn root(&self) -> std::path::PathBuf {
        self.config.document_root()
    }

    fn require_table(&self, name: &str, sink: &mut dyn RecordSink) -> bool {
        if store::table_exists(&self.root(), name) {
            true
        } else {
            sink.diagnostic(EngineError::NotFound(format!("table '{name}' does not exist")));
            false
        }
    }

    fn key_of_line(line: &str, field: &str) -> Option<MixedKey> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let field_value = value.get(field)?;
        if matches!(field_value, serde_json::Value::Bool(_) | serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_)) {
            return None;
        }
        Some(value::mix(crate::store::document::json_to_scalar(field_value)))
    }

    /// Produces a single sorted run over `name`'s raw NDJSON chunk lines,
    /// keyed by `field`. Lines whose document lacks `field` are dropped in
    /// run generation (relational mode rejects this earlier, at insert time).
    fn sorted_run(&self, name: &str, field: &str, direction: Direction) -> Result<std::path::PathBuf, EngineError> {
        let mut chunk_lines = Vec::new();
        for path in store::chunks(&self.root(), name)? {
            let content = std::fs::read_to_string(&path).map_err(|e| crate::error::io_err(&path, e))?;
            let lines: Vec<String> = content.lines().filter(|l| !l.is_empty()).map(str::to_string).collect();
            chunk_lines.push(lines);
        }
        let field = field.to_string();
        let key_of = move |line: &str| Self::key_of_line(line, &field);
        crate::sort::external_sort(&self.config.temp_dir, self.config.chunk_size, direction.is_descending(), chunk_lines, key_of)
    }

    fn line_to_doc(line: &str) -> Result<Document, EngineError> {
        let value: serde_json::Value = serde_json::from_str(line).map_err(EngineError::from)?;
        crate::store::document::json_to_doc(value)
    }

    fn project(doc: &Document, fields: &[String]) -> Document {
        if fields.len() == 1 && fields[0] == "*" {
            return doc.clone();
        }
        fields
            .iter()
            .filter_map(|f| doc.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }
}

impl QueryEngine for DocumentEngine {
    fn show_tables(&self, sink: &mut dyn RecordSink) {
        match super::list_table_names(&self.root()) {
            Ok(names) => names.into_iter().for_each(|n| sink.text(n)),
            Err(e) => sink.diagnostic(e),
        }
    }

    fn create_table(&self, name: &str, fields: &[String], sink: &mut dyn RecordSink) {
        if let Err(e) = store::create_table(&self.root(), name, fields) {
            sink.diagnostic(e);
        }
    }

    fn drop_table(&self, name: &str, sink: &mut dyn RecordSink) {
        if let Err(e) = store::drop_table(&self.root(), name) {
            sink.diagnostic(e);
        }
    }

    fn load_csv(&self, file_name: &str, sink: &mut dyn RecordSink) {
        if let Err(e) = store::load_csv(&self.config.ingest_dir, &self.root(), file_name, self.config.chunk_size) {
            sink.diagnostic(e);
        }
    }

    fn insert(&self, name: &str, assignments: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let assignments = match parse_assignments(assignments) {
            Ok(a) => a,
            Err(e) => return sink.diagnostic(e),
        };
        let doc: Document = assignments.into_iter().map(|(f, v)| (f, value::parse_literal(&v))).collect();
        if let Err(e) = store::append(&self.root(), name, doc, self.config.chunk_size) {
            sink.diagnostic(e);
        }
    }

    fn delete(&self, name: &str, cond: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let docs = match store::read_chunk(&path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            let kept: Vec<Document> = docs.into_iter().filter(|doc| !predicate::eval_document(&condition, doc)).collect();
            if let Err(e) = store::rewrite_chunk(&path, &kept) {
                return sink.diagnostic(e);
            }
        }
    }

    fn update(&self, name: &str, cond: &str, assignments: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let assignments = match parse_assignments(assignments) {
            Ok(a) => a,
            Err(e) => return sink.diagnostic(e),
        };
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let mut docs = match store::read_chunk(&path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            for doc in docs.iter_mut() {
                if predicate::eval_document(&condition, doc) {
                    for (field, literal) in &assignments {
                        doc.insert(field.clone(), value::parse_literal(literal));
                    }
                }
            }
            if let Err(e) = store::rewrite_chunk(&path, &docs) {
                return sink.diagnostic(e);
            }
        }
    }

    fn projection(&self, name: &str, fields: &[String], sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let docs = match store::read_chunk(&path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            for doc in docs {
                sink.document(Self::project(&doc, fields));
            }
        }
    }

    fn filter(&self, name: &str, fields: &[String], cond: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let docs = match store::read_chunk(&path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            for doc in docs {
                if predicate::eval_document(&condition, &doc) {
                    sink.document(Self::project(&doc, fields));
                }
            }
        }
    }

    fn order(&self, name: &str, field: &str, direction: Direction, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let run = match self.sorted_run(name, field, direction) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };
        for line in lines {
            match Self::line_to_doc(&line) {
                Ok(doc) => sink.document(doc),
                Err(e) => return sink.diagnostic(e),
            }
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn join(&self, left: &str, right: &str, cond: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(left, sink) || !self.require_table(right, sink) {
            return;
        }
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let rf_field = condition.literal.clone();

        let right_chunks = match store::chunks(&self.root(), right) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let left_chunks = match store::chunks(&self.root(), left) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };

        for right_path in &right_chunks {
            let right_docs = match store::read_chunk(right_path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            for left_path in &left_chunks {
                let left_docs = match store::read_chunk(left_path) {
                    Ok(d) => d,
                    Err(e) => return sink.diagnostic(e),
                };
                for left_doc in &left_docs {
                    for right_doc in &right_docs {
                        let Some(rvalue) = right_doc.get(&rf_field) else { continue };
                        let substituted = predicate::substitute_literal(&condition, &rvalue.to_text());
                        if predicate::eval_document(&substituted, left_doc) {
                            let mut combined = Document::new();
                            for (k, v) in left_doc {
                                combined.insert(format!("{left}.{k}"), v.clone());
                            }
                            for (k, v) in right_doc {
                                combined.insert(format!("{right}.{k}"), v.clone());
                            }
                            sink.document(combined);
                        }
                    }
                }
            }
        }
    }

    fn group(&self, name: &str, field: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let run = match self.sorted_run(name, field, Direction::Asc) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };
        let mut previous: Option<MixedKey> = None;
        for line in lines {
            let Some(key) = Self::key_of_line(&line, field) else { continue };
            if previous.as_ref() != Some(&key) {
                sink.text(value::key_value(key.clone()).to_text());
                previous = Some(key);
            }
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn aggregate_grouped(&self, name: &str, agg_fn: AggFn, agg_field: &str, group_field: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let run = match self.sorted_run(name, group_field, Direction::Asc) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };

        let mut current_key: Option<MixedKey> = None;
        let mut acc = Accumulator::new(agg_fn);
        for line in lines {
            let Some(key) = Self::key_of_line(&line, group_field) else { continue };
            if current_key.as_ref().is_some_and(|k| k != &key) {
                let finished = std::mem::replace(&mut acc, Accumulator::new(agg_fn));
                sink.keyed_scalar(value::key_value(current_key.take().unwrap()), finished.finalize());
            }
            current_key = Some(key);
            let doc = match Self::line_to_doc(&line) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            acc.update(doc.get(agg_field).cloned());
        }
        if let Some(key) = current_key {
            sink.keyed_scalar(value::key_value(key), acc.finalize());
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn aggregate_total(&self, name: &str, agg_fn: AggFn, agg_field: &str, sink: &mut dyn RecordSink) {
        if !self.require_table(name, sink) {
            return;
        }
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let mut acc = Accumulator::new(agg_fn);
        for path in chunks {
            let docs = match store::read_chunk(&path) {
                Ok(d) => d,
                Err(e) => return sink.diagnostic(e),
            };
            for doc in docs {
                acc.update(doc.get(agg_field).cloned());
            }
        }
        sink.scalar(acc.finalize());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CollectingSink {
        docs: Vec<Document>,
        texts: Vec<String>,
        keyed: Vec<(Scalar, Scalar)>,
        diagnostics: Vec<String>,
    }

    impl RecordSink for CollectingSink {
        fn relational_header(&mut self, _fields: &[String]) {}
        fn row(&mut self, _values: Vec<Scalar>) {}
        fn document(&mut self, doc: Document) {
            self.docs.push(doc);
        }
        fn text(&mut self, value: String) {
            self.texts.push(value);
        }
        fn scalar(&mut self, _value: Scalar) {}
        fn keyed_scalar(&mut self, key: Scalar, value: Scalar) {
            self.keyed.push((key, value));
        }
        fn diagnostic(&mut self, error: EngineError) {
            self.diagnostics.push(error.to_string());
        }
    }

    fn engine(dir: &TempDir, chunk_size: usize) -> DocumentEngine {
        DocumentEngine::new(EngineConfig::rooted_at(dir.path(), chunk_size))
    }

    #[test]
    fn mixed_key_sort_matches_scenario_s4() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir, 10);
        let mut sink = CollectingSink::default();
        e.create_table("t", &[], &mut sink);
        e.insert("t", "k=a", &mut sink);
        e.insert("t", "k=1", &mut sink);
        e.insert("t", "k=b", &mut sink);
        e.insert("t", "k=0.5", &mut sink);
        e.order("t", "k", Direction::Asc, &mut sink);
        let values: Vec<Scalar> = sink.docs.iter().map(|d| d["k"].clone()).collect();
        assert_eq!(
            values,
            vec![
                Scalar::Text("a".into()),
                Scalar::Text("b".into()),
                Scalar::Float(0.5),
                Scalar::Int(1),
            ]
        );
    }

    #[test]
    fn group_emits_sorted_distinct_values() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir, 10);
        let mut sink = CollectingSink::default();
        e.create_table("t", &[], &mut sink);
        for v in ["x", "y", "x", "z", "y"] {
            e.insert("t", &format!("g={v}"), &mut sink);
        }
        e.group("t", "g", &mut sink);
        assert_eq!(sink.texts, vec!["x", "y", "z"]);
    }

    #[test]
    fn missing_agg_field_contributes_zero() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir, 10);
        let mut sink = CollectingSink::default();
        e.create_table("t", &[], &mut sink);
        e.insert("t", "g=x,v=4", &mut sink);
        e.insert("t", "g=x", &mut sink);
        e.aggregate_grouped("t", AggFn::Sum, "v", "g", &mut sink);
        assert_eq!(sink.keyed, vec![(Scalar::Text("x".into()), Scalar::Int(4))]);
    }
}
