//! The record-sink abstraction every operator emits through.
//!
//! Operators never return `Result` — a failure is reported via
//! [`RecordSink::diagnostic`] and the operator returns normally (7 ERROR
//! HANDLING DESIGN). The sink is also where the relational mode's tabular
//! header line and the document mode's per-record JSON emission are routed;
//! turning those bytes into an actual printed table or HTTP response body
//! is the job of the excluded pretty-printer / transport, not this crate.

use crate::error::EngineError;
use crate::record::Document;
use crate::value::Scalar;

pub trait RecordSink {
    /// Called once by relational `projection`/`filter` before any rows, with
    /// the field names the rows below will carry.
    fn relational_header(&mut self, fields: &[String]);

    /// One relational row, already limited to the requested fields.
    fn row(&mut self, values: Vec<Scalar>);

    /// One document-mode record, already limited to the requested fields.
    fn document(&mut self, doc: Document);

    /// A table name, emitted by `show_tables` and `group`'s distinct values.
    fn text(&mut self, value: String);

    /// A single finalized aggregate value (ungrouped `aggregate_total`).
    fn scalar(&mut self, value: Scalar);

    /// One group's key plus its finalized aggregate (grouped aggregation).
    fn keyed_scalar(&mut self, key: Scalar, value: Scalar);

    /// A recoverable failure. The operator returns normally after this call.
    fn diagnostic(&mut self, error: EngineError);
}
