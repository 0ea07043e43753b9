//! Scalar values and the mixed-type total order used by document mode.
//!
//! Every function here is total: there is no error path, per the design
//! note that duck-typed document values should live behind a tagged union
//! with a direct `Ord` impl rather than ad-hoc `(tag, value)` pairs.

use std::cmp::Ordering;

/// A typed scalar value. Relational rows hold these positionally; document
/// records hold them in a field-name map.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn type_of(&self) -> ScalarType {
        match self {
            Scalar::Int(_) => ScalarType::Int,
            Scalar::Float(_) => ScalarType::Float,
            Scalar::Text(_) => ScalarType::Text,
        }
    }

    /// Renders the value the way a CSV cell or a printed literal would.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => format_float(*v),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// A column's declared type, one of the three the schema sidecar persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    Text,
}

impl ScalarType {
    /// The bit-exact tag string written to `schema.txt`'s type line. This is
    /// a compatibility surface with data written by other implementations
    /// of this layout, so the strings are not reworded.
    pub fn tag(self) -> &'static str {
        match self {
            ScalarType::Int => "<class 'int'>",
            ScalarType::Float => "<class 'float'>",
            ScalarType::Text => "<class 'str'>",
        }
    }

    pub fn parse_tag(s: &str) -> Option<Self> {
        match s {
            "<class 'int'>" => Some(ScalarType::Int),
            "<class 'float'>" => Some(ScalarType::Float),
            "<class 'str'>" => Some(ScalarType::Text),
            _ => None,
        }
    }
}

/// Parses a literal token: all-digits is an Int, digits with exactly one
/// interior dot is a Float, everything else (including the empty string)
/// is Text. Coercing an empty field to zero is [`coerce`]'s job, not this
/// function's — an empty string is vacuously all-digits in Rust (unlike
/// Python's `str.isdigit`), so it is special-cased to Text here.
pub fn parse_literal(token: &str) -> Scalar {
    if token.is_empty() {
        return Scalar::Text(String::new());
    }
    if is_int_literal(token) {
        if let Ok(v) = token.parse::<i64>() {
            return Scalar::Int(v);
        }
    }
    if is_float_literal(token) {
        if let Ok(v) = token.parse::<f64>() {
            return Scalar::Float(v);
        }
    }
    Scalar::Text(token.to_string())
}

fn is_int_literal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_float_literal(s: &str) -> bool {
    let Some(dot_pos) = s.find('.') else {
        return false;
    };
    if s.matches('.').count() != 1 || dot_pos == 0 || dot_pos == s.len() - 1 {
        return false;
    }
    s.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Coerces a value to a target type. Empty text becomes `0` / `0.0`;
/// already-typed numerics convert with ordinary `as` truncation; a non-empty
/// Text value being forced into a numeric slot falls back to `0` rather
/// than erroring, matching this function's total contract — callers that
/// need to reject genuinely mistyped literals (e.g. the schema-enforcing
/// relational insert path) validate the parsed type before calling this.
pub fn coerce(value: Scalar, target: ScalarType) -> Scalar {
    match target {
        ScalarType::Text => Scalar::Text(value.to_text()),
        ScalarType::Int => match value {
            Scalar::Int(v) => Scalar::Int(v),
            Scalar::Float(v) => Scalar::Int(v as i64),
            Scalar::Text(s) if s.is_empty() => Scalar::Int(0),
            Scalar::Text(s) => Scalar::Int(s.parse::<f64>().unwrap_or(0.0) as i64),
        },
        ScalarType::Float => match value {
            Scalar::Float(v) => Scalar::Float(v),
            Scalar::Int(v) => Scalar::Float(v as f64),
            Scalar::Text(s) if s.is_empty() => Scalar::Float(0.0),
            Scalar::Text(s) => Scalar::Float(s.parse::<f64>().unwrap_or(0.0)),
        },
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// `(category, scalar)` with `category = 0` for Text, `1` for numeric.
/// `Ord` realizes the mixed-key total order directly: Text sorts before
/// every numeric; within a category values compare naturally.
#[derive(Debug, Clone, PartialEq)]
pub enum MixedKey {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Eq for MixedKey {}

impl PartialOrd for MixedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MixedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use MixedKey::*;
        match (self, other) {
            (Text(a), Text(b)) => a.cmp(b),
            (Text(_), _) => Ordering::Less,
            (_, Text(_)) => Ordering::Greater,
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
        }
    }
}

/// Lifts a scalar into key space.
pub fn mix(value: Scalar) -> MixedKey {
    match value {
        Scalar::Text(s) => MixedKey::Text(s),
        Scalar::Int(v) => MixedKey::Int(v),
        Scalar::Float(v) => MixedKey::Float(v),
    }
}

/// Unwraps a key back to its scalar, e.g. to finalize an accumulator.
pub fn key_value(key: MixedKey) -> Scalar {
    match key {
        MixedKey::Text(s) => Scalar::Text(s),
        MixedKey::Int(v) => Scalar::Int(v),
        MixedKey::Float(v) => Scalar::Float(v),
    }
}

/// SUM/AVG accumulate in key space: same-category addition preserves the
/// category and adds the scalars (Text "addition" is concatenation, mirroring
/// the source's untyped `+=`); cross-category addition drops the Text
/// summand and the result is numeric.
pub fn add_keys(a: MixedKey, b: MixedKey) -> MixedKey {
    use MixedKey::*;
    match (a, b) {
        (Text(x), Text(y)) => Text(x + &y),
        (Text(_), numeric) => numeric,
        (numeric, Text(_)) => numeric,
        (Int(x), Int(y)) => Int(x + y),
        (Float(x), Float(y)) => Float(x + y),
        (Int(x), Float(y)) => Float(x as f64 + y),
        (Float(x), Int(y)) => Float(x + y as f64),
    }
}
