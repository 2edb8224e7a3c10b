//! Scalar kinds, runtime values, and enumerated types.
//!
//! A leaf property carries a value of one of the [`ScalarKind`]s or a
//! constant of an [`EnumType`]. The merge engine widens kinds along a
//! directed graph (every kind renders to [`ScalarKind::Str`]), so the
//! value model here only needs conversion and rendering, never arithmetic.
//! Arbitrary-precision decimals are represented by [`BigDecimal`], a
//! canonical-string newtype that normalizes away leading/trailing zero
//! noise and exponent forms.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kinds of terminal (leaf) values known to the widening graph.
///
/// Declaration order is the deterministic tie-break order used when two
/// kinds have more than one common widening target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    BigInt,
    F32,
    F64,
    Decimal,
    Date,
    DateTime,
    Str,
}

impl ScalarKind {
    /// Every kind, in declaration order.
    pub const ALL: [ScalarKind; 13] = [
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::I8,
        ScalarKind::I16,
        ScalarKind::I32,
        ScalarKind::I64,
        ScalarKind::BigInt,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::Decimal,
        ScalarKind::Date,
        ScalarKind::DateTime,
        ScalarKind::Str,
    ];
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::BigInt => "bigint",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Str => "str",
        };
        write!(f, "{label}")
    }
}

/// Error returned when a string is not a decimal literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal literal: {0:?}")]
pub struct ParseBigDecimalError(pub String);

/// Arbitrary-precision decimal held in canonical string form.
///
/// Canonical means: optional leading `-`, an integer part without leading
/// zeros, an optional fractional part without trailing zeros, and no
/// exponent. Zero is always `"0"`. Two equal values therefore have equal
/// canonical strings, so derived equality and hashing are value equality.
///
/// # Examples
///
/// ```
/// use compound_schema_core::BigDecimal;
///
/// let d: BigDecimal = "00042.500".parse().unwrap();
/// assert_eq!(d.to_string(), "42.5");
///
/// let z: BigDecimal = "-0.000".parse().unwrap();
/// assert_eq!(z.to_string(), "0");
///
/// assert!("4x2".parse::<BigDecimal>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal(String);

impl BigDecimal {
    /// Builds a decimal from a 128-bit integer.
    pub fn from_i128(value: i128) -> Self {
        BigDecimal(value.to_string())
    }

    /// Builds a decimal from a finite float; `None` for NaN or infinities.
    ///
    /// Uses the shortest round-trip rendering of the float, so converting
    /// back via [`BigDecimal::to_f64`] reproduces the input exactly.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        format!("{value}").parse().ok()
    }

    /// The integer value, if this decimal has no fractional part and fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.0.contains('.') {
            return None;
        }
        self.0.parse().ok()
    }

    /// The nearest float; infinite when the value exceeds the f64 range.
    pub fn to_f64(&self) -> f64 {
        // A canonical decimal string always parses as a float.
        self.0.parse().unwrap_or(f64::NAN)
    }

    /// Whether the value has no fractional part.
    pub fn is_integral(&self) -> bool {
        !self.0.contains('.')
    }

    /// Canonicalizes a raw digit string: `digits` are all significant
    /// digits with an implied decimal point `scale` places from the right.
    fn canonicalize(negative: bool, digits: &str, scale: i64) -> Self {
        let mut digits: Vec<u8> = digits.bytes().collect();
        let mut scale = scale;

        // A negative scale means trailing integer zeros.
        while scale < 0 {
            digits.push(b'0');
            scale += 1;
        }
        // Drop trailing fractional zeros.
        while scale > 0 && digits.last() == Some(&b'0') {
            digits.pop();
            scale -= 1;
        }
        // Pad so the integer part has at least one digit.
        while (digits.len() as i64) < scale {
            digits.insert(0, b'0');
        }

        let split = digits.len() - scale as usize;
        let int_part = String::from_utf8_lossy(&digits[..split])
            .trim_start_matches('0')
            .to_string();
        let int_part = if int_part.is_empty() {
            "0".to_string()
        } else {
            int_part
        };
        let frac_part = String::from_utf8_lossy(&digits[split..]).to_string();

        if int_part == "0" && frac_part.is_empty() {
            return BigDecimal("0".to_string());
        }

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&int_part);
        if !frac_part.is_empty() {
            out.push('.');
            out.push_str(&frac_part);
        }
        BigDecimal(out)
    }
}

impl std::str::FromStr for BigDecimal {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBigDecimalError(s.to_string());

        let (mantissa, exponent) = match s.split_once(['e', 'E']) {
            Some((m, e)) => (m, e.parse::<i64>().map_err(|_| err())?),
            None => (s, 0),
        };

        let (negative, unsigned) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let digits = format!("{int_part}{frac_part}");
        let scale = frac_part.len() as i64 - exponent;
        Ok(BigDecimal::canonicalize(negative, &digits, scale))
    }
}

impl std::fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A runtime leaf value.
///
/// Values are self-describing: conversions inspect the actual variant, not
/// a declared kind, so a value read out of a record can always be widened
/// toward a merged kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    BigInt(i128),
    F32(f32),
    F64(f64),
    Decimal(BigDecimal),
    Date(chrono::NaiveDate),
    DateTime(chrono::NaiveDateTime),
    Str(String),
    /// A constant of an enumerated type, by literal name.
    Enum(String),
}

impl Value {
    /// The scalar kind of this value; `None` for enumeration constants.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Char(_) => Some(ScalarKind::Char),
            Value::I8(_) => Some(ScalarKind::I8),
            Value::I16(_) => Some(ScalarKind::I16),
            Value::I32(_) => Some(ScalarKind::I32),
            Value::I64(_) => Some(ScalarKind::I64),
            Value::BigInt(_) => Some(ScalarKind::BigInt),
            Value::F32(_) => Some(ScalarKind::F32),
            Value::F64(_) => Some(ScalarKind::F64),
            Value::Decimal(_) => Some(ScalarKind::Decimal),
            Value::Date(_) => Some(ScalarKind::Date),
            Value::DateTime(_) => Some(ScalarKind::DateTime),
            Value::Str(_) => Some(ScalarKind::Str),
            Value::Enum(_) => None,
        }
    }

    /// Renders the value as a string, the universal widening target.
    ///
    /// Date-times render as ISO-8601 with a `T` separator and the seconds
    /// fraction only when non-zero, so rendering round-trips through the
    /// resolver's string parsing.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::I8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Date(v) => v.format("%Y-%m-%d").to_string(),
            Value::DateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Str(v) => v.clone(),
            Value::Enum(v) => v.clone(),
        }
    }
}

/// An enumerated leaf type: a named, ordered set of constants.
///
/// # Examples
///
/// ```
/// use compound_schema_core::EnumType;
///
/// let color = EnumType::new("Color", ["RED", "GREEN", "BLUE"]);
/// assert!(color.has_constant("RED"));
/// assert!(!color.has_constant("PINK"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    /// Type name, unique within one input family.
    pub name: String,
    /// Constants in declaration order.
    pub constants: Vec<String>,
}

impl EnumType {
    /// Creates an enumerated type from a name and ordered constants.
    pub fn new(
        name: impl Into<String>,
        constants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        EnumType {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `literal` names a constant of this type.
    pub fn has_constant(&self, literal: &str) -> bool {
        self.constants.iter().any(|c| c == literal)
    }
}

/// Normalizes a constant name to its canonical display form.
///
/// Words are detected at case boundaries and at non-alphanumeric
/// separators, then joined with underscores in upper case, so `fooBar`,
/// `foo-bar`, and `FOO_BAR` all normalize to `FOO_BAR`.
///
/// # Examples
///
/// ```
/// use compound_schema_core::normalize_constant_name;
///
/// assert_eq!(normalize_constant_name("fooBar"), "FOO_BAR");
/// assert_eq!(normalize_constant_name("foo-bar"), "FOO_BAR");
/// assert_eq!(normalize_constant_name("FOO_BAR"), "FOO_BAR");
/// ```
pub fn normalize_constant_name(raw: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in raw.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_uppercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("_")
}

/// Errors raised by the enumeration surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumError {
    /// A constant name that does not belong to the named enumeration.
    #[error("enumeration {enumeration:?} has no constant {constant:?}")]
    UnknownConstant {
        enumeration: String,
        constant: String,
    },
    /// A raw name that identifies no unified constant.
    #[error("name {raw:?} does not identify a constant of {enumeration:?}")]
    UnknownName { enumeration: String, raw: String },
    /// Two constants of one source enumeration normalize identically.
    #[error("constants {first:?} and {second:?} of {enumeration:?} both normalize to {display:?}")]
    AmbiguousConstant {
        enumeration: String,
        first: String,
        second: String,
        display: String,
    },
}

/// One constant of a unified enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedConstant {
    /// Canonical display name (see [`normalize_constant_name`]).
    pub display: String,
    /// Source enumeration name to the original literal there.
    pub literals: IndexMap<String, String>,
}

/// The union of several enumerated types under canonical naming.
///
/// Built by the merge engine's enumeration unifier; each unified constant
/// remembers the original literal per source enumeration, so values can be
/// mapped in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedEnum {
    /// Display name of the unified type.
    pub name: String,
    /// Names of the source enumerations, in contribution order.
    pub sources: Vec<String>,
    /// Unified constants, ordered by first contribution.
    pub constants: Vec<UnifiedConstant>,
}

impl UnifiedEnum {
    /// Looks up a unified constant by display name.
    pub fn constant(&self, display: &str) -> Option<&UnifiedConstant> {
        self.constants.iter().find(|c| c.display == display)
    }

    /// Maps an original constant of `source` to its unified constant.
    ///
    /// Total for genuine constants of a contributing enumeration; an
    /// unknown literal is an [`EnumError::UnknownConstant`].
    pub fn wrap(&self, source: &str, literal: &str) -> Result<&UnifiedConstant, EnumError> {
        self.constants
            .iter()
            .find(|c| c.literals.get(source).is_some_and(|l| l == literal))
            .ok_or_else(|| EnumError::UnknownConstant {
                enumeration: source.to_string(),
                constant: literal.to_string(),
            })
    }

    /// Maps a unified constant back into one source enumeration.
    ///
    /// `Ok(None)` means the constant has no counterpart there, which is a
    /// real outcome of a partial union, not an error. Asking about a
    /// display name that is not part of the unified type at all is an
    /// [`EnumError::UnknownConstant`].
    pub fn unwrap(&self, display: &str, source: &str) -> Result<Option<&str>, EnumError> {
        let constant = self
            .constant(display)
            .ok_or_else(|| EnumError::UnknownConstant {
                enumeration: self.name.clone(),
                constant: display.to_string(),
            })?;
        Ok(constant.literals.get(source).map(String::as_str))
    }

    /// Resolves a raw (possibly un-normalized) name to a unified constant.
    pub fn value_of_name(&self, raw: &str) -> Result<&UnifiedConstant, EnumError> {
        let normalized = normalize_constant_name(raw);
        self.constants
            .iter()
            .find(|c| c.display == normalized || c.literals.values().any(|l| l == raw))
            .ok_or_else(|| EnumError::UnknownName {
                enumeration: self.name.clone(),
                raw: raw.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_normalizes_zero_noise() {
        for (input, expected) in [
            ("42", "42"),
            ("042.50", "42.5"),
            ("-0", "0"),
            ("-0.000", "0"),
            (".5", "0.5"),
            ("+7", "7"),
            ("1e3", "1000"),
            ("1.25e-2", "0.0125"),
            ("-4.2E1", "-42"),
        ] {
            let parsed: BigDecimal = input.parse().unwrap();
            assert_eq!(parsed.to_string(), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_decimal_rejects_malformed_literals() {
        for input in ["", "-", ".", "4x2", "1.2.3", "1e", "--5"] {
            assert!(input.parse::<BigDecimal>().is_err(), "input {input:?}");
        }
    }

    #[test]
    fn test_decimal_round_trips_floats() {
        for v in [0.0, 42.5, -0.125, 1e300, 3.141592653589793] {
            let d = BigDecimal::from_f64(v).unwrap();
            assert_eq!(d.to_f64(), v, "value {v}");
        }
        assert!(BigDecimal::from_f64(f64::NAN).is_none());
        assert!(BigDecimal::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_decimal_integer_extraction() {
        let d: BigDecimal = "42".parse().unwrap();
        assert_eq!(d.to_i128(), Some(42));
        let d: BigDecimal = "42.5".parse().unwrap();
        assert_eq!(d.to_i128(), None);
    }

    #[test]
    fn test_normalize_constant_name_cases() {
        assert_eq!(normalize_constant_name("fooBar"), "FOO_BAR");
        assert_eq!(normalize_constant_name("foo bar"), "FOO_BAR");
        assert_eq!(normalize_constant_name("Foo2Go"), "FOO2_GO");
        assert_eq!(normalize_constant_name("already_GOOD"), "ALREADY_GOOD");
    }

    #[test]
    fn test_value_render_is_stable() {
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::I32(-7).render(), "-7");
        assert_eq!(Value::Decimal("42.50".parse().unwrap()).render(), "42.5");
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Value::Date(date).render(), "2024-01-15");
        assert_eq!(
            Value::DateTime(date.and_hms_opt(10, 30, 0).unwrap()).render(),
            "2024-01-15T10:30:00"
        );
    }

    fn sample_unified() -> UnifiedEnum {
        UnifiedEnum {
            name: "Color".to_string(),
            sources: vec!["ColorA".to_string(), "ColorB".to_string()],
            constants: vec![
                UnifiedConstant {
                    display: "DARK_RED".to_string(),
                    literals: IndexMap::from([
                        ("ColorA".to_string(), "darkRed".to_string()),
                        ("ColorB".to_string(), "DARK_RED".to_string()),
                    ]),
                },
                UnifiedConstant {
                    display: "BLUE".to_string(),
                    literals: IndexMap::from([("ColorB".to_string(), "BLUE".to_string())]),
                },
            ],
        }
    }

    #[test]
    fn test_unified_enum_wrap_and_unwrap() {
        let unified = sample_unified();

        let wrapped = unified.wrap("ColorA", "darkRed").unwrap();
        assert_eq!(wrapped.display, "DARK_RED");

        assert_eq!(
            unified.unwrap("DARK_RED", "ColorA").unwrap(),
            Some("darkRed")
        );
        // BLUE exists in the union but has no ColorA counterpart.
        assert_eq!(unified.unwrap("BLUE", "ColorA").unwrap(), None);
        // A display name outside the union is an error, not an absence.
        assert!(matches!(
            unified.unwrap("PINK", "ColorA"),
            Err(EnumError::UnknownConstant { .. })
        ));
    }

    #[test]
    fn test_unified_enum_value_of_name() {
        let unified = sample_unified();
        assert_eq!(unified.value_of_name("darkRed").unwrap().display, "DARK_RED");
        assert_eq!(unified.value_of_name("dark_red").unwrap().display, "DARK_RED");
        assert!(unified.value_of_name("magenta").is_err());
    }
}
