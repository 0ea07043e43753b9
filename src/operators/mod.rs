//! Operator layer: the capability surface shared by both storage modes.
//! Every method reports failure through the [`RecordSink`] and returns
//! normally — see `src/error.rs` for the infallible-at-the-boundary
//! discipline.

pub mod document;
pub mod relational;

use crate::aggregate::AggFn;
use crate::error::EngineError;
use crate::sink::RecordSink;

/// Sort / group-by direction, parsed from the `asc`/`desc` grammar token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn from_token(token: &str) -> Result<Self, EngineError> {
        match token {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(EngineError::MalformedQuery(format!("unknown sort direction '{other}'"))),
        }
    }

    pub fn is_descending(self) -> bool {
        self == Direction::Desc
    }
}

/// A capability-interface split: one interface, two concrete variants
/// ([`relational::RelationalEngine`] / [`document::DocumentEngine`]). The
/// command grammar that would dispatch over this capability is an explicit
/// external collaborator and lives outside this crate.
pub trait QueryEngine {
    fn show_tables(&self, sink: &mut dyn RecordSink);
    fn create_table(&self, name: &str, fields: &[String], sink: &mut dyn RecordSink);
    fn drop_table(&self, name: &str, sink: &mut dyn RecordSink);
    fn load_csv(&self, file_name: &str, sink: &mut dyn RecordSink);
    fn insert(&self, name: &str, assignments: &str, sink: &mut dyn RecordSink);
    fn delete(&self, name: &str, cond: &str, sink: &mut dyn RecordSink);
    fn update(&self, name: &str, cond: &str, assignments: &str, sink: &mut dyn RecordSink);
    fn projection(&self, name: &str, fields: &[String], sink: &mut dyn RecordSink);
    fn filter(&self, name: &str, fields: &[String], cond: &str, sink: &mut dyn RecordSink);
    fn order(&self, name: &str, field: &str, direction: Direction, sink: &mut dyn RecordSink);
    fn join(&self, left: &str, right: &str, cond: &str, sink: &mut dyn RecordSink);
    fn group(&self, name: &str, field: &str, sink: &mut dyn RecordSink);
    fn aggregate_grouped(&self, name: &str, agg_fn: AggFn, agg_field: &str, group_field: &str, sink: &mut dyn RecordSink);
    fn aggregate_total(&self, name: &str, agg_fn: AggFn, agg_field: &str, sink: &mut dyn RecordSink);
}

/// Parses `f1=v1,f2=v2,...` into ordered (field, literal-text) pairs
/// (used by `insert`/`update`).
pub(crate) fn parse_assignments(text: &str) -> Result<Vec<(String, String)>, EngineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::MalformedQuery("assignment list is empty".to_string()));
    }
    text.split(',')
        .map(|pair| {
            let (field, value) = pair
                .split_once('=')
                .ok_or_else(|| EngineError::MalformedQuery(format!("assignment does not parse: '{pair}'")))?;
            let field = field.trim();
            if field.is_empty() {
                return Err(EngineError::MalformedQuery(format!("assignment does not parse: '{pair}'")));
            }
            Ok((field.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Lists the subdirectories of a mode root, one per table (used by `show_tables`).
pub(crate) fn list_table_names(mode_root: &std::path::Path) -> Result<Vec<String>, EngineError> {
    let read_dir = match std::fs::read_dir(mode_root) {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(crate::error::io_err(&mode_root.to_path_buf(), e)),
    };
    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| crate::error::io_err(&mode_root.to_path_buf(), e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_assignments() {
        let parsed = parse_assignments("id=1,name=a").unwrap();
        assert_eq!(parsed, vec![("id".to_string(), "1".to_string()), ("name".to_string(), "a".to_string())]);
    }

    #[test]
    fn rejects_malformed_assignment() {
        assert!(parse_assignments("id").is_err());
        assert!(parse_assignments("").is_err());
    }

    #[test]
    fn direction_parses_asc_desc_only() {
        assert_eq!(Direction::from_token("asc").unwrap(), Direction::Asc);
        assert_eq!(Direction::from_token("desc").unwrap(), Direction::Desc);
        assert!(Direction::from_token("sideways").is_err());
    }
}
