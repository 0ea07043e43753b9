//! Aggregate accumulators shared by `aggregate_grouped` and `aggregate_total`
//! accumulator table.

use crate::error::EngineError;
use crate::value::{self, MixedKey, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggFn {
    pub fn from_token(token: &str) -> Result<Self, EngineError> {
        match token {
            "count" => Ok(AggFn::Count),
            "sum" => Ok(AggFn::Sum),
            "avg" => Ok(AggFn::Avg),
            "max" => Ok(AggFn::Max),
            "min" => Ok(AggFn::Min),
            other => Err(EngineError::MalformedQuery(format!("unknown aggregate function '{other}'"))),
        }
    }
}

/// Per-group (or whole-table) running state for one aggregate function.
/// `Max`/`Min` start empty because the accumulator must seed from the first
/// contributing value rather than an arbitrary sentinel (the accumulator
/// seeds from the first contributing value, not a sentinel).
#[derive(Debug, Clone)]
pub enum Accumulator {
    Count(i64),
    Sum(MixedKey),
    Avg(MixedKey, i64),
    Max(Option<MixedKey>),
    Min(Option<MixedKey>),
}

impl Accumulator {
    pub fn new(agg_fn: AggFn) -> Self {
        match agg_fn {
            AggFn::Count => Accumulator::Count(0),
            AggFn::Sum => Accumulator::Sum(value::mix(Scalar::Int(0))),
            AggFn::Avg => Accumulator::Avg(value::mix(Scalar::Int(0)), 0),
            AggFn::Max => Accumulator::Max(None),
            AggFn::Min => Accumulator::Min(None),
        }
    }

    /// Folds one contribution into the accumulator. `value` is `None` when
    /// the record is missing `agg_field` — document mode only (relational
    /// rejects a missing field upstream). COUNT always increments;
    /// SUM/AVG treat a missing value as `0`; MAX/MIN simply skip records
    /// with no value to contribute, since there is no documented zero for
    /// an ordering comparison.
    pub fn update(&mut self, value: Option<Scalar>) {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(acc) => {
                let v = value::mix(value.unwrap_or(Scalar::Int(0)));
                *acc = value::add_keys(acc.clone(), v);
            }
            Accumulator::Avg(acc, n) => {
                let v = value::mix(value.unwrap_or(Scalar::Int(0)));
                *acc = value::add_keys(acc.clone(), v);
                *n += 1;
            }
            Accumulator::Max(slot) => {
                if let Some(v) = value {
                    let k = value::mix(v);
                    *slot = Some(match slot.take() {
                        None => k,
                        Some(cur) => cur.max(k),
                    });
                }
            }
            Accumulator::Min(slot) => {
                if let Some(v) = value {
                    let k = value::mix(v);
                    *slot = Some(match slot.take() {
                        None => k,
                        Some(cur) => cur.min(k),
                    });
                }
            }
        }
    }

    /// Produces the final scalar. A group whose accumulator never received a
    /// value (MAX/MIN never seeded, or AVG's count is zero) finalizes to
    /// numeric `0` — a group whose final accumulator never received a
    /// value emits `0`.
    pub fn finalize(self) -> Scalar {
        match self {
            Accumulator::Count(n) => Scalar::Int(n),
            Accumulator::Sum(acc) => value::key_value(acc),
            Accumulator::Avg(acc, n) => {
                if n == 0 {
                    Scalar::Int(0)
                } else {
                    let total = scalar_to_f64(value::key_value(acc));
                    Scalar::Float(round_half_even(total / n as f64, 2))
                }
            }
            Accumulator::Max(slot) => slot.map(value::key_value).unwrap_or(Scalar::Int(0)),
            Accumulator::Min(slot) => slot.map(value::key_value).unwrap_or(Scalar::Int(0)),
        }
    }
}

fn scalar_to_f64(value: Scalar) -> f64 {
    match value {
        Scalar::Int(v) => v as f64,
        Scalar::Float(v) => v,
        // SUM over a mixed-type group that somehow ended up all-Text drops
        // to this path only if add_keys's Text branch were reached, which
        // cannot happen once any numeric contributes — Text sums only stay
        // Text when every contribution was Text, an input AVG never sees
        // since contributions are always `mix(Scalar)` of a numeric or the
        // synthetic zero.
        Scalar::Text(_) => 0.0,
    }
}

/// Half-to-even ("banker's") rounding at `decimals` places, matching IEEE
/// 754's default rounding mode that the rest of this engine's float math
/// already inherits (halves-to-even chosen over halves-away-from-zero,
/// see DESIGN.md).
fn round_half_even(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_preserves_int_within_category() {
        let mut acc = Accumulator::new(AggFn::Sum);
        acc.update(Some(Scalar::Int(2)));
        acc.update(Some(Scalar::Int(3)));
        assert_eq!(acc.finalize(), Scalar::Int(5));
    }

    #[test]
    fn avg_rounds_half_to_even() {
        let mut acc = Accumulator::new(AggFn::Avg);
        acc.update(Some(Scalar::Int(1)));
        acc.update(Some(Scalar::Int(3)));
        assert_eq!(acc.finalize(), Scalar::Float(2.0));
    }

    #[test]
    fn empty_max_emits_numeric_zero() {
        let acc = Accumulator::new(AggFn::Max);
        assert_eq!(acc.finalize(), Scalar::Int(0));
    }

    #[test]
    fn count_increments_regardless_of_missing_value() {
        let mut acc = Accumulator::new(AggFn::Count);
        acc.update(None);
        acc.update(Some(Scalar::Int(1)));
        assert_eq!(acc.finalize(), Scalar::Int(2));
    }

    #[test]
    fn max_min_track_the_running_extremes() {
        let mut max = Accumulator::new(AggFn::Max);
        let mut min = Accumulator::new(AggFn::Min);
        for v in [3, 1, 4, 1, 5, 9, 2, 6] {
            max.update(Some(Scalar::Int(v)));
            min.update(Some(Scalar::Int(v)));
        }
        assert_eq!(max.finalize(), Scalar::Int(9));
        assert_eq!(min.finalize(), Scalar::Int(1));
    }
}
