//! Record and schema types shared by both storage modes.

use std::collections::BTreeMap;

use crate::value::{Scalar, ScalarType};

/// A positional relational row; interpreting it requires the table's schema.
pub type Row = Vec<Scalar>;

/// An unordered document: field name to scalar. `BTreeMap` gives a
/// deterministic iteration order for NDJSON serialization; nothing in the
/// data model relies on that order.
pub type Document = BTreeMap<String, Scalar>;

/// Ordered field names plus, once known, a parallel list of declared types.
/// `types` is `None` until the first insertion into a freshly created table
/// forces type inference.
#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<String>,
    pub types: Option<Vec<ScalarType>>,
}

impl Schema {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn field_type(&self, name: &str) -> Option<ScalarType> {
        let idx = self.field_index(name)?;
        self.types.as_ref().map(|t| t[idx])
    }
}
