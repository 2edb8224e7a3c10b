//! Type resolution over a directed widening graph.
//!
//! An edge `X → Y` means every value of `X` is exactly representable as
//! `Y`. Integer kinds widen along their width chain into [`ScalarKind::BigInt`]
//! and [`ScalarKind::Decimal`]; floats widen through [`ScalarKind::F64`]
//! into `Decimal`; dates widen into date-times; and every kind renders
//! into [`ScalarKind::Str`], the universal sink that guarantees any two
//! kinds have a common representable type.
//!
//! [`merge_kinds`] finds the *lowest* kind reachable from both inputs, so
//! an `i64`/`f64` pair lands on `Decimal`, not on the string fallback.
//! [`widen`] composes forward conversions along the edge path and is total
//! for finite values; [`narrow`] is the partial inverse: exact for values
//! that originated in the target kind, best-effort (e.g. parsing a numeric
//! string) otherwise, and a typed error on anything lossy or malformed.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::{ScalarKind, Value};
//! use compound_schema_engine::resolve::{merge_kinds, narrow, widen};
//!
//! let common = merge_kinds(ScalarKind::I32, ScalarKind::F64).unwrap();
//! assert_eq!(common, ScalarKind::Decimal);
//!
//! let wide = widen(&Value::I32(42), common).unwrap();
//! assert_eq!(wide.render(), "42");
//! assert_eq!(narrow(&wide, ScalarKind::I32).unwrap(), Value::I32(42));
//! ```

use compound_schema_core::{BigDecimal, ScalarKind, Value};
use thiserror::Error;

/// Errors raised by kind merging and value conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Two kinds with no common widening target. Unreachable while the
    /// string sink exists; a hard failure rather than a silent default.
    #[error("no common representable kind for {0} and {1}")]
    NoCommonKind(ScalarKind, ScalarKind),
    /// No directed widening path between the two kinds.
    #[error("cannot widen {from} to {to}")]
    NotWidenable { from: ScalarKind, to: ScalarKind },
    /// An enumeration constant asked to widen anywhere but the string sink.
    #[error("enumeration constant {literal:?} only widens to str, not {target}")]
    EnumConstant { literal: String, target: ScalarKind },
    /// A value that cannot be represented exactly in the target kind.
    #[error("value {value:?} is not exactly representable as {target}")]
    Unrepresentable { value: String, target: ScalarKind },
    /// A string that does not parse as the target kind.
    #[error("cannot parse {literal:?} as {target}")]
    Malformed { literal: String, target: ScalarKind },
    /// NaN or an infinity, which have no decimal rendering.
    #[error("non-finite float {0} has no decimal form")]
    NonFinite(f64),
    /// A date-time with a time component cannot narrow to a plain date.
    #[error("datetime {0} is not at midnight; cannot narrow to date")]
    NonMidnight(String),
}

/// Direct exact-widening edges, excluding the universal string sink.
fn direct_widenings(kind: ScalarKind) -> &'static [ScalarKind] {
    use ScalarKind::*;
    match kind {
        I8 => &[I16],
        I16 => &[I32],
        I32 => &[I64],
        I64 => &[BigInt],
        BigInt => &[Decimal],
        F32 => &[F64],
        F64 => &[Decimal],
        Date => &[DateTime],
        Bool | Char | Decimal | DateTime | Str => &[],
    }
}

fn successors(kind: ScalarKind) -> Vec<ScalarKind> {
    let mut next = direct_widenings(kind).to_vec();
    if kind != ScalarKind::Str {
        next.push(ScalarKind::Str);
    }
    next
}

/// Every kind reachable from `kind` by widening, including itself.
pub fn reachable(kind: ScalarKind) -> Vec<ScalarKind> {
    let mut seen = vec![kind];
    let mut queue = vec![kind];
    while let Some(current) = queue.pop() {
        for next in successors(current) {
            if !seen.contains(&next) {
                seen.push(next);
                queue.push(next);
            }
        }
    }
    seen
}

/// The widening path `from ..= to`, or `None` when `to` is unreachable.
fn widening_path(from: ScalarKind, to: ScalarKind) -> Option<Vec<ScalarKind>> {
    if from == to {
        return Some(vec![from]);
    }
    // Breadth-first over a graph this small; parents rebuild the path.
    let mut parents: Vec<(ScalarKind, ScalarKind)> = Vec::new();
    let mut queue = std::collections::VecDeque::from([from]);
    let mut seen = vec![from];
    while let Some(current) = queue.pop_front() {
        for next in successors(current) {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            parents.push((next, current));
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while cursor != from {
                    let Some(&(_, parent)) = parents.iter().find(|(k, _)| *k == cursor) else {
                        return None;
                    };
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}

/// The lowest kind reachable from both `a` and `b`.
///
/// "Lowest" means minimal under the widening order: no other common
/// target widens into it. The string sink makes the common set non-empty
/// for every pair, so a [`ResolveError::NoCommonKind`] marks a defect in
/// the graph itself.
pub fn merge_kinds(a: ScalarKind, b: ScalarKind) -> Result<ScalarKind, ResolveError> {
    if a == b {
        return Ok(a);
    }
    let from_a = reachable(a);
    let from_b = reachable(b);
    let common: Vec<ScalarKind> = ScalarKind::ALL
        .iter()
        .copied()
        .filter(|k| from_a.contains(k) && from_b.contains(k))
        .collect();
    common
        .iter()
        .copied()
        .find(|&candidate| {
            !common
                .iter()
                .any(|&other| other != candidate && reachable(other).contains(&candidate))
        })
        .ok_or(ResolveError::NoCommonKind(a, b))
}

/// Folds [`merge_kinds`] over a slice; the string sink for an empty one.
pub fn merge_all(kinds: &[ScalarKind]) -> Result<ScalarKind, ResolveError> {
    let Some((&first, rest)) = kinds.split_first() else {
        return Ok(ScalarKind::Str);
    };
    rest.iter()
        .try_fold(first, |acc, &next| merge_kinds(acc, next))
}

/// Widens a value to `target`, composing conversions along the edge path.
///
/// Total for finite values of kinds with a path to `target`; enumeration
/// constants widen only to the string sink.
pub fn widen(value: &Value, target: ScalarKind) -> Result<Value, ResolveError> {
    if let Value::Enum(literal) = value {
        return if target == ScalarKind::Str {
            Ok(Value::Str(literal.clone()))
        } else {
            Err(ResolveError::EnumConstant {
                literal: literal.clone(),
                target,
            })
        };
    }
    let from = match value.kind() {
        Some(kind) => kind,
        None => return Err(ResolveError::NotWidenable { from: ScalarKind::Str, to: target }),
    };
    if from == target {
        return Ok(value.clone());
    }
    let path = widening_path(from, target).ok_or(ResolveError::NotWidenable { from, to: target })?;
    let mut current = value.clone();
    for &step in &path[1..] {
        current = widen_step(&current, step)?;
    }
    Ok(current)
}

fn widen_step(value: &Value, to: ScalarKind) -> Result<Value, ResolveError> {
    use ScalarKind as K;
    Ok(match (value, to) {
        (Value::I8(v), K::I16) => Value::I16(i16::from(*v)),
        (Value::I16(v), K::I32) => Value::I32(i32::from(*v)),
        (Value::I32(v), K::I64) => Value::I64(i64::from(*v)),
        (Value::I64(v), K::BigInt) => Value::BigInt(i128::from(*v)),
        (Value::BigInt(v), K::Decimal) => Value::Decimal(BigDecimal::from_i128(*v)),
        (Value::F32(v), K::F64) => Value::F64(f64::from(*v)),
        (Value::F64(v), K::Decimal) => Value::Decimal(
            BigDecimal::from_f64(*v).ok_or(ResolveError::NonFinite(*v))?,
        ),
        (Value::Date(d), K::DateTime) => Value::DateTime(d.and_time(chrono::NaiveTime::MIN)),
        (_, K::Str) => Value::Str(value.render()),
        (other, to) => {
            let from = other.kind().unwrap_or(K::Str);
            return Err(ResolveError::NotWidenable { from, to });
        }
    })
}

/// Narrows a value back toward `target`, inverting the widening path.
///
/// Exact for any value that originated in `target` (the round-trip law);
/// otherwise best-effort, with malformed or lossy inputs reported as
/// typed errors rather than silently defaulted.
pub fn narrow(value: &Value, target: ScalarKind) -> Result<Value, ResolveError> {
    if let Value::Enum(literal) = value {
        return if target == ScalarKind::Str {
            Ok(Value::Str(literal.clone()))
        } else {
            Err(ResolveError::EnumConstant {
                literal: literal.clone(),
                target,
            })
        };
    }
    let from = match value.kind() {
        Some(kind) => kind,
        None => return Err(ResolveError::NotWidenable { from: ScalarKind::Str, to: target }),
    };
    if from == target {
        return Ok(value.clone());
    }
    // The narrowing path is the widening path read backwards.
    let path = widening_path(target, from).ok_or(ResolveError::NotWidenable {
        from: target,
        to: from,
    })?;
    let mut current = value.clone();
    for pair in path.windows(2).rev() {
        current = narrow_step(&current, pair[0])?;
    }
    Ok(current)
}

fn narrow_step(value: &Value, to: ScalarKind) -> Result<Value, ResolveError> {
    use ScalarKind as K;
    let unrepresentable = |target: ScalarKind| ResolveError::Unrepresentable {
        value: value.render(),
        target,
    };
    Ok(match (value, to) {
        (Value::I16(v), K::I8) => {
            Value::I8(i8::try_from(*v).map_err(|_| unrepresentable(to))?)
        }
        (Value::I32(v), K::I16) => {
            Value::I16(i16::try_from(*v).map_err(|_| unrepresentable(to))?)
        }
        (Value::I64(v), K::I32) => {
            Value::I32(i32::try_from(*v).map_err(|_| unrepresentable(to))?)
        }
        (Value::BigInt(v), K::I64) => {
            Value::I64(i64::try_from(*v).map_err(|_| unrepresentable(to))?)
        }
        (Value::Decimal(d), K::BigInt) => {
            Value::BigInt(d.to_i128().ok_or_else(|| unrepresentable(to))?)
        }
        (Value::Decimal(d), K::F64) => {
            let v = d.to_f64();
            if v.is_finite() {
                Value::F64(v)
            } else {
                return Err(unrepresentable(to));
            }
        }
        (Value::F64(v), K::F32) => {
            let narrowed = *v as f32;
            if f64::from(narrowed) == *v {
                Value::F32(narrowed)
            } else {
                return Err(unrepresentable(to));
            }
        }
        (Value::DateTime(dt), K::Date) => {
            if dt.time() == chrono::NaiveTime::MIN {
                Value::Date(dt.date())
            } else {
                return Err(ResolveError::NonMidnight(dt.to_string()));
            }
        }
        (Value::Str(s), _) => parse_str(s, to)?,
        (other, to) => {
            let from = other.kind().unwrap_or(K::Str);
            return Err(ResolveError::NotWidenable { from: to, to: from });
        }
    })
}

fn parse_str(s: &str, target: ScalarKind) -> Result<Value, ResolveError> {
    let malformed = || ResolveError::Malformed {
        literal: s.to_string(),
        target,
    };
    Ok(match target {
        ScalarKind::Bool => Value::Bool(s.parse().map_err(|_| malformed())?),
        ScalarKind::Char => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(malformed()),
            }
        }
        ScalarKind::I8 => Value::I8(s.parse().map_err(|_| malformed())?),
        ScalarKind::I16 => Value::I16(s.parse().map_err(|_| malformed())?),
        ScalarKind::I32 => Value::I32(s.parse().map_err(|_| malformed())?),
        ScalarKind::I64 => Value::I64(s.parse().map_err(|_| malformed())?),
        ScalarKind::BigInt => Value::BigInt(s.parse().map_err(|_| malformed())?),
        ScalarKind::F32 => Value::F32(s.parse().map_err(|_| malformed())?),
        ScalarKind::F64 => Value::F64(s.parse().map_err(|_| malformed())?),
        ScalarKind::Decimal => Value::Decimal(s.parse().map_err(|_| malformed())?),
        ScalarKind::Date => Value::Date(
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| malformed())?,
        ),
        ScalarKind::DateTime => {
            let parsed = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"));
            Value::DateTime(parsed.map_err(|_| malformed())?)
        }
        ScalarKind::Str => Value::Str(s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_kinds_prefers_decimal_over_the_string_sink() {
        assert_eq!(
            merge_kinds(ScalarKind::I64, ScalarKind::F64).unwrap(),
            ScalarKind::Decimal
        );
        assert_eq!(
            merge_kinds(ScalarKind::I32, ScalarKind::F32).unwrap(),
            ScalarKind::Decimal
        );
    }

    #[test]
    fn test_merge_kinds_stays_low_on_one_chain() {
        assert_eq!(
            merge_kinds(ScalarKind::I8, ScalarKind::I64).unwrap(),
            ScalarKind::I64
        );
        assert_eq!(
            merge_kinds(ScalarKind::Date, ScalarKind::DateTime).unwrap(),
            ScalarKind::DateTime
        );
    }

    #[test]
    fn test_merge_kinds_falls_back_to_string_for_unrelated_kinds() {
        assert_eq!(
            merge_kinds(ScalarKind::Bool, ScalarKind::I32).unwrap(),
            ScalarKind::Str
        );
        assert_eq!(
            merge_kinds(ScalarKind::Char, ScalarKind::Date).unwrap(),
            ScalarKind::Str
        );
    }

    #[test]
    fn test_merge_kinds_is_commutative() {
        for a in ScalarKind::ALL {
            for b in ScalarKind::ALL {
                assert_eq!(merge_kinds(a, b).unwrap(), merge_kinds(b, a).unwrap());
            }
        }
    }

    #[test]
    fn test_round_trip_through_the_common_kind() {
        let cases: Vec<(Value, ScalarKind, ScalarKind)> = vec![
            // int 42 through Decimal and back
            (Value::I32(42), ScalarKind::I32, ScalarKind::F64),
            (Value::F64(2.5), ScalarKind::F64, ScalarKind::I64),
            (Value::I8(-7), ScalarKind::I8, ScalarKind::I64),
            (Value::Bool(true), ScalarKind::Bool, ScalarKind::I32),
            (
                Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                ScalarKind::Date,
                ScalarKind::DateTime,
            ),
        ];
        for (value, own, other) in cases {
            let common = merge_kinds(own, other).unwrap();
            let widened = widen(&value, common).unwrap();
            let back = narrow(&widened, own).unwrap();
            assert_eq!(back, value, "round trip {value:?} via {common}");
        }
    }

    #[test]
    fn test_widen_renders_into_the_string_sink() {
        assert_eq!(
            widen(&Value::I32(42), ScalarKind::Str).unwrap(),
            Value::Str("42".to_string())
        );
        assert_eq!(
            widen(&Value::Enum("RED".to_string()), ScalarKind::Str).unwrap(),
            Value::Str("RED".to_string())
        );
        assert!(matches!(
            widen(&Value::Enum("RED".to_string()), ScalarKind::I32),
            Err(ResolveError::EnumConstant { .. })
        ));
    }

    #[test]
    fn test_narrow_rejects_lossy_conversions() {
        let fractional = Value::Decimal("42.5".parse().unwrap());
        assert!(matches!(
            narrow(&fractional, ScalarKind::I64),
            Err(ResolveError::Unrepresentable { .. })
        ));

        let afternoon = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        assert!(matches!(
            narrow(&Value::DateTime(afternoon), ScalarKind::Date),
            Err(ResolveError::NonMidnight(_))
        ));

        assert!(matches!(
            narrow(&Value::I64(i64::from(i32::MAX) + 1), ScalarKind::I32),
            Err(ResolveError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn test_narrow_parses_strings_best_effort() {
        assert_eq!(
            narrow(&Value::Str("42".to_string()), ScalarKind::I32).unwrap(),
            Value::I32(42)
        );
        assert_eq!(
            narrow(&Value::Str("2024-03-01".to_string()), ScalarKind::Date).unwrap(),
            Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(matches!(
            narrow(&Value::Str("not a number".to_string()), ScalarKind::I32),
            Err(ResolveError::Malformed { .. })
        ));
    }

    #[test]
    fn test_widen_total_along_the_integer_chain() {
        let widened = widen(&Value::I8(5), ScalarKind::Decimal).unwrap();
        assert_eq!(widened, Value::Decimal("5".parse().unwrap()));
        let back = narrow(&widened, ScalarKind::I8).unwrap();
        assert_eq!(back, Value::I8(5));
    }
}
