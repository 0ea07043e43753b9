//! Parsing and evaluation of a single `field OP literal` condition.
//!
//! Non-goal, carried over unchanged: multi-predicate conditions. Exactly
//! one comparison is supported.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::EngineError;
use crate::record::Document;
use crate::value::{self, Scalar, ScalarType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Op {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Op::Eq),
            "!=" => Some(Op::Ne),
            ">" => Some(Op::Gt),
            "<" => Some(Op::Lt),
            ">=" => Some(Op::Ge),
            "<=" => Some(Op::Le),
            _ => None,
        }
    }

    fn apply(self, ord: std::cmp::Ordering, eq: bool) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Eq => eq,
            Op::Ne => !eq,
            Op::Gt => ord == Greater,
            Op::Lt => ord == Less,
            Op::Ge => ord != Less,
            Op::Le => ord != Greater,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub literal: String,
}

// Alternation order matters: `!=` and `>=`/`<=` must be tried before the
// bare `=`/`>`/`<` they contain, or the shorter token would win the match.
static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s*(!=|>=|<=|=|>|<)\s*(.*)$").expect("hardcoded condition regex")
});

/// Splits `lhs OP rhs` into field, operator and literal text. The field
/// side is matched non-greedily so the first operator token in the string
/// wins, mirroring the single-condition grammar (no operator precedence to
/// worry about because only one comparison is ever present).
pub fn parse_condition(text: &str) -> Result<Condition, EngineError> {
    let text = text.trim();
    let caps = CONDITION_RE
        .captures(text)
        .ok_or_else(|| EngineError::MalformedQuery(format!("condition does not parse: '{text}'")))?;
    let op = Op::from_token(&caps[2])
        .ok_or_else(|| EngineError::MalformedQuery(format!("unknown operator '{}'", &caps[2])))?;
    let field = caps[1].trim().to_string();
    if field.is_empty() {
        return Err(EngineError::MalformedQuery(format!(
            "condition does not parse: '{text}'"
        )));
    }
    Ok(Condition {
        field,
        op,
        literal: caps[3].trim().to_string(),
    })
}

/// Substitutes the right-hand literal text into a condition parsed from a
/// join's field-to-field comparison, turning `lf OP rf` into `lf OP
/// <literal>` for evaluation against a single left record. Used by
/// `join` after reading the right-hand value.
pub fn substitute_literal(cond: &Condition, literal: &str) -> Condition {
    Condition {
        field: cond.field.clone(),
        op: cond.op,
        literal: literal.to_string(),
    }
}

/// Relational evaluation: coerce the literal to the field's
/// declared type, then compare naturally. Returns `false` if the field does
/// not exist in `fields`.
pub fn eval_relational(
    cond: &Condition,
    fields: &[String],
    types: &[ScalarType],
    row: &[Scalar],
) -> bool {
    let Some(idx) = fields.iter().position(|f| f == &cond.field) else {
        return false;
    };
    let lhs = &row[idx];
    let rhs = value::coerce(value::parse_literal(&cond.literal), types[idx]);
    compare_same_type(cond.op, lhs, &rhs)
}

fn compare_same_type(op: Op, lhs: &Scalar, rhs: &Scalar) -> bool {
    match (lhs, rhs) {
        (Scalar::Int(a), Scalar::Int(b)) => op.apply(a.cmp(b), a == b),
        (Scalar::Float(a), Scalar::Float(b)) => op.apply(a.total_cmp(b), a == b),
        (Scalar::Text(a), Scalar::Text(b)) => op.apply(a.cmp(b), a == b),
        // Coercion targets the declared column type, so mixed variants here
        // would mean the schema and the stored row disagree; treat as no match.
        _ => false,
    }
}

/// Document evaluation: missing field is false; matching types
/// compare naturally; exactly one side Text is false; Int vs Float promotes
/// both to Float.
pub fn eval_document(cond: &Condition, doc: &Document) -> bool {
    let Some(lhs) = doc.get(&cond.field) else {
        return false;
    };
    let rhs = value::parse_literal(&cond.literal);
    compare_mixed(cond.op, lhs, &rhs)
}

fn compare_mixed(op: Op, lhs: &Scalar, rhs: &Scalar) -> bool {
    match (lhs, rhs) {
        (Scalar::Text(a), Scalar::Text(b)) => op.apply(a.cmp(b), a == b),
        (Scalar::Int(a), Scalar::Int(b)) => op.apply(a.cmp(b), a == b),
        (Scalar::Float(a), Scalar::Float(b)) => op.apply(a.total_cmp(b), a == b),
        (Scalar::Text(_), _) | (_, Scalar::Text(_)) => false,
        (Scalar::Int(a), Scalar::Float(b)) => {
            let a = *a as f64;
            op.apply(a.total_cmp(b), a == *b)
        }
        (Scalar::Float(a), Scalar::Int(b)) => {
            let b = *b as f64;
            op.apply(a.total_cmp(&b), *a == b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_operator() {
        for (text, op) in [
            ("id=1", Op::Eq),
            ("id!=1", Op::Ne),
            ("id>1", Op::Gt),
            ("id<1", Op::Lt),
            ("id>=1", Op::Ge),
            ("id<=1", Op::Le),
        ] {
            let cond = parse_condition(text).unwrap();
            assert_eq!(cond.field, "id");
            assert_eq!(cond.op, op);
            assert_eq!(cond.literal, "1");
        }
    }

    #[test]
    fn rejects_unparseable_condition() {
        assert!(parse_condition("").is_err());
    }

    #[test]
    fn document_eval_rejects_mixed_text_numeric() {
        let mut doc = Document::new();
        doc.insert("k".to_string(), Scalar::Text("5".to_string()));
        let cond = parse_condition("k=5").unwrap();
        assert!(!eval_document(&cond, &doc));
    }

    #[test]
    fn document_eval_promotes_int_float() {
        let mut doc = Document::new();
        doc.insert("v".to_string(), Scalar::Int(2));
        let cond = parse_condition("v<2.5").unwrap();
        assert!(eval_document(&cond, &doc));
    }
}
