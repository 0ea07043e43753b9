//! # duoq — out-of-core dual-model query engine
//!
//! A small query engine that persists tabular data on the local filesystem
//! and answers relational-style queries against datasets too large to fit
//! in memory, in two storage modes side by side:
//!
//! - **Relational mode** — typed schema, rows stored as CSV chunks.
//! - **Document mode** — schemaless bag of records, newline-delimited JSON
//!   chunks.
//!
//! The crate exposes the out-of-core execution core as a library: chunked
//! storage, external merge-sort, a predicate engine, streaming nested-loop
//! join, and single-pass streaming aggregation over a sorted stream. There
//! is no `[[bin]]` target — a query-string parser, an interactive REPL, an
//! HTTP transport, and a tabular pretty-printer are all explicit external
//! collaborators that would sit on top of [`operators::QueryEngine`].
//!
//! ```no_run
//! use duoq::config::EngineConfig;
//! use duoq::operators::{QueryEngine, relational::RelationalEngine};
//!
//! struct PrintingSink;
//! impl duoq::sink::RecordSink for PrintingSink {
//!     fn relational_header(&mut self, fields: &[String]) { println!("{fields:?}"); }
//!     fn row(&mut self, values: Vec<duoq::value::Scalar>) { println!("{values:?}"); }
//!     fn document(&mut self, doc: duoq::record::Document) { println!("{doc:?}"); }
//!     fn text(&mut self, value: String) { println!("{value}"); }
//!     fn scalar(&mut self, value: duoq::value::Scalar) { println!("{value:?}"); }
//!     fn keyed_scalar(&mut self, key: duoq::value::Scalar, value: duoq::value::Scalar) { println!("{key:?} -> {value:?}"); }
//!     fn diagnostic(&mut self, error: duoq::error::EngineError) { eprintln!("{error}"); }
//! }
//!
//! let config = EngineConfig::load(std::path::Path::new("."));
//! let engine = RelationalEngine::new(config);
//! let mut sink = PrintingSink;
//! engine.show_tables(&mut sink);
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod operators;
pub mod predicate;
pub mod record;
pub mod sink;
pub mod sort;
pub mod store;
pub mod value;

pub use config::EngineConfig;
pub use error::EngineError;
pub use operators::QueryEngine;
pub use sink::RecordSink;
