//! Relational-mode operator implementations.

use crate::aggregate::{AggFn, Accumulator};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::predicate;
use crate::record::{Row, Schema};
use crate::sink::RecordSink;
use crate::store::relational as store;
use crate::value::{self, MixedKey, Scalar, ScalarType};

use super::{parse_assignments, Direction, QueryEngine};

pub struct RelationalEngine {
    pub config: EngineConfig,
}

impl RelationalEngine {
    pub fn new(config: EngineConfig) -> Self {
        RelationalEngine { config }
    }

    fn root(&self) -> std::path::PathBuf {
        self.config.relational_root()
    }

    fn schema_or_diagnostic(&self, name: &str, sink: &mut dyn RecordSink) -> Option<Schema> {
        match store::read_schema(&self.root(), name) {
            Ok(schema) => Some(schema),
            Err(e) => {
                sink.diagnostic(e);
                None
            }
        }
    }

    /// Resolves `fields == ["*"]` against the schema, or validates every
    /// listed field exists (relational additionally validates that every
    /// listed field exists).
    fn resolve_fields(&self, schema: &Schema, fields: &[String], sink: &mut dyn RecordSink) -> Option<Vec<usize>> {
        if fields.len() == 1 && fields[0] == "*" {
            return Some((0..schema.fields.len()).collect());
        }
        let mut indices = Vec::with_capacity(fields.len());
        for f in fields {
            match schema.field_index(f) {
                Some(idx) => indices.push(idx),
                None => {
                    sink.diagnostic(EngineError::NotFound(format!("field '{f}' does not exist")));
                    return None;
                }
            }
        }
        Some(indices)
    }

    fn row_to_line(row: &Row) -> Result<String, EngineError> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
        wtr.write_record(row.iter().map(Scalar::to_text)).map_err(EngineError::from)?;
        let bytes = wtr.into_inner().map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }

    fn line_to_row(line: &str, types: &[ScalarType]) -> Result<Row, EngineError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(line.as_bytes());
        let record = reader
            .records()
            .next()
            .ok_or_else(|| EngineError::IoFailure("sorted run line is empty".to_string()))?
            .map_err(EngineError::from)?;
        Ok(record
            .iter()
            .zip(types.iter())
            .map(|(cell, ty)| value::coerce(Scalar::Text(cell.to_string()), *ty))
            .collect())
    }

    /// Produces a single sorted run over `name`'s chunks, keyed by `field`.
    fn sorted_run(
        &self,
        name: &str,
        schema: &Schema,
        field: &str,
        direction: Direction,
    ) -> Result<(std::path::PathBuf, Vec<ScalarType>), EngineError> {
        let idx = schema
            .field_index(field)
            .ok_or_else(|| EngineError::NotFound(format!("field '{field}' does not exist")))?;
        let types = schema
            .types
            .clone()
            .ok_or_else(|| EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")))?;

        let mut chunk_lines = Vec::new();
        for path in store::chunks(&self.root(), name)? {
            let rows = store::read_chunk(&path, &types)?;
            let lines: Result<Vec<String>, EngineError> = rows.iter().map(Self::row_to_line).collect();
            chunk_lines.push(lines?);
        }

        let types_for_key = types.clone();
        let key_of = move |line: &str| -> Option<MixedKey> {
            let row = Self::line_to_row(line, &types_for_key).ok()?;
            Some(value::mix(row[idx].clone()))
        };
        let run = crate::sort::external_sort(&self.config.temp_dir, self.config.chunk_size, direction.is_descending(), chunk_lines, key_of)?;
        Ok((run, types))
    }
}

impl QueryEngine for RelationalEngine {
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
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let assignments = match parse_assignments(assignments) {
            Ok(a) => a,
            Err(e) => return sink.diagnostic(e),
        };
        for (field, _) in &assignments {
            if schema.field_index(field).is_none() {
                return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no field '{field}'")));
            }
        }
        let mut row = Vec::with_capacity(schema.fields.len());
        for (i, field) in schema.fields.iter().enumerate() {
            let raw = assignments.iter().find(|(f, _)| f == field).map(|(_, v)| v.as_str());
            let scalar = raw.map(value::parse_literal).unwrap_or(Scalar::Text(String::new()));
            let scalar = match &schema.types {
                Some(types) => value::coerce(scalar, types[i]),
                None => scalar,
            };
            row.push(scalar);
        }
        if let Err(e) = store::append(&self.root(), name, row, self.config.chunk_size) {
            sink.diagnostic(e);
        }
    }

    fn delete(&self, name: &str, cond: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(types) = schema.types.clone() else {
            return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")));
        };
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let rows = match store::read_chunk(&path, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            let kept: Vec<Row> = rows
                .into_iter()
                .filter(|row| !predicate::eval_relational(&condition, &schema.fields, &types, row))
                .collect();
            if let Err(e) = store::rewrite_chunk(&path, &kept) {
                return sink.diagnostic(e);
            }
        }
    }

    fn update(&self, name: &str, cond: &str, assignments: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(types) = schema.types.clone() else {
            return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")));
        };
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let assignments = match parse_assignments(assignments) {
            Ok(a) => a,
            Err(e) => return sink.diagnostic(e),
        };
        let mut targets = Vec::with_capacity(assignments.len());
        for (field, literal) in &assignments {
            match schema.field_index(field) {
                Some(idx) => targets.push((idx, literal.clone())),
                None => return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no field '{field}'"))),
            }
        }

        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let mut rows = match store::read_chunk(&path, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            for row in rows.iter_mut() {
                if predicate::eval_relational(&condition, &schema.fields, &types, row) {
                    for (idx, literal) in &targets {
                        row[*idx] = value::coerce(value::parse_literal(literal), types[*idx]);
                    }
                }
            }
            if let Err(e) = store::rewrite_chunk(&path, &rows) {
                return sink.diagnostic(e);
            }
        }
    }

    fn projection(&self, name: &str, fields: &[String], sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(types) = schema.types.clone() else {
            return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")));
        };
        let Some(indices) = self.resolve_fields(&schema, fields, sink) else { return };

        let header: Vec<String> = indices.iter().map(|&i| schema.fields[i].clone()).collect();
        sink.relational_header(&header);

        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let rows = match store::read_chunk(&path, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            for row in rows {
                sink.row(indices.iter().map(|&i| row[i].clone()).collect());
            }
        }
    }

    fn filter(&self, name: &str, fields: &[String], cond: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(types) = schema.types.clone() else {
            return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")));
        };
        let Some(indices) = self.resolve_fields(&schema, fields, sink) else { return };
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };

        let header: Vec<String> = indices.iter().map(|&i| schema.fields[i].clone()).collect();
        sink.relational_header(&header);

        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        for path in chunks {
            let rows = match store::read_chunk(&path, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            for row in rows {
                if predicate::eval_relational(&condition, &schema.fields, &types, &row) {
                    sink.row(indices.iter().map(|&i| row[i].clone()).collect());
                }
            }
        }
    }

    fn order(&self, name: &str, field: &str, direction: Direction, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let (run, types) = match self.sorted_run(name, &schema, field, direction) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };
        sink.relational_header(&schema.fields);
        for line in lines {
            match Self::line_to_row(&line, &types) {
                Ok(row) => sink.row(row),
                Err(e) => return sink.diagnostic(e),
            }
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn join(&self, left: &str, right: &str, cond: &str, sink: &mut dyn RecordSink) {
        let Some(schema_l) = self.schema_or_diagnostic(left, sink) else { return };
        let Some(schema_r) = self.schema_or_diagnostic(right, sink) else { return };
        let (Some(types_l), Some(types_r)) = (schema_l.types.clone(), schema_r.types.clone()) else {
            return sink.diagnostic(EngineError::SchemaMismatch("join requires both tables to have inferred types".to_string()));
        };
        let condition = match predicate::parse_condition(cond) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let rf_field = condition.literal.clone();
        let (Some(lf_idx), Some(rf_idx)) = (schema_l.field_index(&condition.field), schema_r.field_index(&rf_field)) else {
            return sink.diagnostic(EngineError::NotFound("join field does not exist in one of the tables".to_string()));
        };
        if types_l[lf_idx] != types_r[rf_idx] {
            return sink.diagnostic(EngineError::SchemaMismatch(format!(
                "join fields '{}' and '{}' have different declared types",
                condition.field, rf_field
            )));
        }

        let header: Vec<String> = schema_l
            .fields
            .iter()
            .map(|f| format!("{left}.{f}"))
            .chain(schema_r.fields.iter().map(|f| format!("{right}.{f}")))
            .collect();
        sink.relational_header(&header);

        let right_chunks = match store::chunks(&self.root(), right) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let left_chunks = match store::chunks(&self.root(), left) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };

        for right_path in &right_chunks {
            let right_rows = match store::read_chunk(right_path, &types_r) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            for left_path in &left_chunks {
                let left_rows = match store::read_chunk(left_path, &types_l) {
                    Ok(r) => r,
                    Err(e) => return sink.diagnostic(e),
                };
                for left_row in &left_rows {
                    for right_row in &right_rows {
                        let literal = right_row[rf_idx].to_text();
                        let substituted = predicate::substitute_literal(&condition, &literal);
                        if predicate::eval_relational(&substituted, &schema_l.fields, &types_l, left_row) {
                            let combined: Vec<Scalar> = left_row.iter().cloned().chain(right_row.iter().cloned()).collect();
                            sink.row(combined);
                        }
                    }
                }
            }
        }
    }

    fn group(&self, name: &str, field: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let (run, types) = match self.sorted_run(name, &schema, field, Direction::Asc) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let idx = schema.field_index(field).expect("validated by sorted_run");
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };
        let mut previous: Option<Scalar> = None;
        for line in lines {
            let row = match Self::line_to_row(&line, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            let key = row[idx].clone();
            if previous.as_ref() != Some(&key) {
                sink.text(key.to_text());
                previous = Some(key);
            }
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn aggregate_grouped(&self, name: &str, agg_fn: AggFn, agg_field: &str, group_field: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(agg_idx) = schema.field_index(agg_field) else {
            return sink.diagnostic(EngineError::NotFound(format!("field '{agg_field}' does not exist")));
        };
        let (run, types) = match self.sorted_run(name, &schema, group_field, Direction::Asc) {
            Ok(r) => r,
            Err(e) => return sink.diagnostic(e),
        };
        let group_idx = schema.field_index(group_field).expect("validated by sorted_run");
        let lines = match crate::sort::read_run(&run) {
            Ok(l) => l,
            Err(e) => return sink.diagnostic(e),
        };

        let mut current_key: Option<Scalar> = None;
        let mut acc = Accumulator::new(agg_fn);
        for line in lines {
            let row = match Self::line_to_row(&line, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            let key = row[group_idx].clone();
            if current_key.as_ref().is_some_and(|k| k != &key) {
                let finished = std::mem::replace(&mut acc, Accumulator::new(agg_fn));
                sink.keyed_scalar(current_key.take().unwrap(), finished.finalize());
            }
            current_key = Some(key);
            acc.update(Some(row[agg_idx].clone()));
        }
        if let Some(key) = current_key {
            sink.keyed_scalar(key, acc.finalize());
        }
        let _ = crate::sort::clear_temp_dir(&self.config.temp_dir);
    }

    fn aggregate_total(&self, name: &str, agg_fn: AggFn, agg_field: &str, sink: &mut dyn RecordSink) {
        let Some(schema) = self.schema_or_diagnostic(name, sink) else { return };
        let Some(agg_idx) = schema.field_index(agg_field) else {
            return sink.diagnostic(EngineError::NotFound(format!("field '{agg_field}' does not exist")));
        };
        let Some(types) = schema.types.clone() else {
            return sink.diagnostic(EngineError::SchemaMismatch(format!("'{name}' has no inferred types yet")));
        };
        let chunks = match store::chunks(&self.root(), name) {
            Ok(c) => c,
            Err(e) => return sink.diagnostic(e),
        };
        let mut acc = Accumulator::new(agg_fn);
        for path in chunks {
            let rows = match store::read_chunk(&path, &types) {
                Ok(r) => r,
                Err(e) => return sink.diagnostic(e),
            };
            for row in rows {
                acc.update(Some(row[agg_idx].clone()));
            }
        }
        sink.scalar(acc.finalize());
    }
}
