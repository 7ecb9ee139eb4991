//! Value restrictions
//!
//! A restriction is attached to a parameter and checked against every
//! coerced value before the parameter accepts it. Restrictions are built
//! either directly or from catalog tokens such as `MinInclusive`, which are
//! resolved by appending `RESTRICTION_SUFFIX` to get the restriction name.

use regex::Regex;
use std::fmt;

use crate::error::{SpsError, SpsResult};
use crate::types::Value;

/// Appended to a catalog token to name the restriction it constructs
pub const RESTRICTION_SUFFIX: &str = "R";

/// Constructor argument for a restriction token
#[derive(Debug, Clone, PartialEq)]
pub enum RestrictionArg {
    Scalar(Value),
    List(Vec<Value>),
}

/// A compiled pattern that must match at the start of a string value
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> SpsResult<Self> {
        let regex = Regex::new(&format!("^(?:{})", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match anchored at the start only; trailing text is allowed
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[derive(Debug, Clone)]
pub enum Restriction {
    /// Value must equal one of the listed values
    Enumeration(Vec<Value>),
    /// Advisory digit count after the decimal point; never enforced
    FractionDigits(u32),
    /// String length must equal the bound
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    MinInclusive(Value),
    MinExclusive(Value),
    MaxInclusive(Value),
    MaxExclusive(Value),
    Pattern(Pattern),
    /// Bounds on total seconds of an interval or epoch seconds of an instant
    MinSecondsInclusive(f64),
    MinSecondsExclusive(f64),
    MaxSecondsInclusive(f64),
    MaxSecondsExclusive(f64),
    /// Bounds on the sub-second part of a time value, in nanoseconds
    MinNanos(i64),
    MaxNanos(i64),
    /// Advisory total digit count; never enforced
    TotalDigits(u32),
}

impl Restriction {
    pub fn pattern(source: &str) -> SpsResult<Self> {
        Pattern::new(source).map(Restriction::Pattern)
    }

    /// Build a restriction from a catalog token and its argument.
    ///
    /// Returns `Ok(None)` when no restriction is named `{kind}R`; the
    /// caller drops such tokens without failing.
    pub fn from_token(kind: &str, arg: &RestrictionArg) -> SpsResult<Option<Self>> {
        let name = format!("{}{}", kind, RESTRICTION_SUFFIX);
        let restriction = match name.as_str() {
            "EnumerationR" => Restriction::Enumeration(match arg {
                RestrictionArg::List(values) => values.clone(),
                RestrictionArg::Scalar(value) => vec![value.clone()],
            }),
            "FractionDigitsR" => Restriction::FractionDigits(count_arg(&name, arg)?),
            "LengthR" => Restriction::Length(count_arg(&name, arg)?),
            "MinLengthR" => Restriction::MinLength(count_arg(&name, arg)?),
            "MaxLengthR" => Restriction::MaxLength(count_arg(&name, arg)?),
            "MinInclusiveR" => Restriction::MinInclusive(scalar_arg(&name, arg)?),
            "MinExclusiveR" => Restriction::MinExclusive(scalar_arg(&name, arg)?),
            "MaxInclusiveR" => Restriction::MaxInclusive(scalar_arg(&name, arg)?),
            "MaxExclusiveR" => Restriction::MaxExclusive(scalar_arg(&name, arg)?),
            "PatternR" => match scalar_arg(&name, arg)? {
                Value::String(source) => Restriction::pattern(&source)?,
                other => return Err(bad_arg(&name, &other.to_string())),
            },
            "MinSecondsInclusiveR" => Restriction::MinSecondsInclusive(seconds_arg(&name, arg)?),
            "MinSecondsExclusiveR" => Restriction::MinSecondsExclusive(seconds_arg(&name, arg)?),
            "MaxSecondsInclusiveR" => Restriction::MaxSecondsInclusive(seconds_arg(&name, arg)?),
            "MaxSecondsExclusiveR" => Restriction::MaxSecondsExclusive(seconds_arg(&name, arg)?),
            "MinNanosR" => Restriction::MinNanos(nanos_arg(&name, arg)?),
            "MaxNanosR" => Restriction::MaxNanos(nanos_arg(&name, arg)?),
            "TotalDigitsR" => Restriction::TotalDigits(count_arg(&name, arg)?),
            _ => return Ok(None),
        };
        Ok(Some(restriction))
    }

    /// Check a value that has already been coerced to the parameter's kind
    pub fn validate(&self, value: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            Restriction::Enumeration(names) => names.iter().any(|name| name.matches(value)),
            Restriction::FractionDigits(_) | Restriction::TotalDigits(_) => true,
            Restriction::Length(length) => string_length(value) == Some(*length),
            Restriction::MinLength(length) => string_length(value).is_some_and(|n| n >= *length),
            Restriction::MaxLength(length) => string_length(value).is_some_and(|n| n <= *length),
            Restriction::MinInclusive(bound) => matches!(value.compare(bound), Some(Greater | Equal)),
            Restriction::MinExclusive(bound) => value.compare(bound) == Some(Greater),
            Restriction::MaxInclusive(bound) => matches!(value.compare(bound), Some(Less | Equal)),
            Restriction::MaxExclusive(bound) => value.compare(bound) == Some(Less),
            Restriction::Pattern(pattern) => value.as_str().is_some_and(|s| pattern.matches(s)),
            Restriction::MinSecondsInclusive(bound) => seconds_of(value).is_some_and(|s| s >= *bound),
            Restriction::MinSecondsExclusive(bound) => seconds_of(value).is_some_and(|s| s > *bound),
            Restriction::MaxSecondsInclusive(bound) => seconds_of(value).is_some_and(|s| s <= *bound),
            Restriction::MaxSecondsExclusive(bound) => seconds_of(value).is_some_and(|s| s < *bound),
            Restriction::MinNanos(bound) => nanos_of(value).is_some_and(|n| n >= *bound),
            Restriction::MaxNanos(bound) => nanos_of(value).is_some_and(|n| n <= *bound),
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Enumeration(names) => {
                let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
                write!(f, "EnumerationR([{}])", names.join(", "))
            }
            Restriction::FractionDigits(n) => write!(f, "FractionDigitsR({})", n),
            Restriction::Length(n) => write!(f, "LengthR({})", n),
            Restriction::MinLength(n) => write!(f, "MinLengthR({})", n),
            Restriction::MaxLength(n) => write!(f, "MaxLengthR({})", n),
            Restriction::MinInclusive(v) => write!(f, "MinInclusiveR({})", v),
            Restriction::MinExclusive(v) => write!(f, "MinExclusiveR({})", v),
            Restriction::MaxInclusive(v) => write!(f, "MaxInclusiveR({})", v),
            Restriction::MaxExclusive(v) => write!(f, "MaxExclusiveR({})", v),
            Restriction::Pattern(p) => write!(f, "PatternR({})", p.source()),
            Restriction::MinSecondsInclusive(s) => write!(f, "MinSecondsInclusiveR({})", s),
            Restriction::MinSecondsExclusive(s) => write!(f, "MinSecondsExclusiveR({})", s),
            Restriction::MaxSecondsInclusive(s) => write!(f, "MaxSecondsInclusiveR({})", s),
            Restriction::MaxSecondsExclusive(s) => write!(f, "MaxSecondsExclusiveR({})", s),
            Restriction::MinNanos(n) => write!(f, "MinNanosR({})", n),
            Restriction::MaxNanos(n) => write!(f, "MaxNanosR({})", n),
            Restriction::TotalDigits(n) => write!(f, "TotalDigitsR({})", n),
        }
    }
}

fn string_length(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

fn seconds_of(value: &Value) -> Option<f64> {
    match value {
        Value::Interval(interval) => Some(interval.as_seconds()),
        Value::Time(time) => Some(time.epoch_seconds() as f64),
        _ => None,
    }
}

fn nanos_of(value: &Value) -> Option<i64> {
    match value {
        Value::Interval(interval) => Some(interval.nanos()),
        Value::Time(time) => Some(time.nanos()),
        _ => None,
    }
}

fn bad_arg(name: &str, arg: &str) -> SpsError {
    SpsError::catalog(format!("invalid argument '{}' for {}", arg, name))
}

fn scalar_arg(name: &str, arg: &RestrictionArg) -> SpsResult<Value> {
    match arg {
        RestrictionArg::Scalar(value) => Ok(value.clone()),
        RestrictionArg::List(values) => Err(bad_arg(name, &format!("{:?}", values))),
    }
}

fn count_arg<T: TryFrom<i64>>(name: &str, arg: &RestrictionArg) -> SpsResult<T> {
    let value = scalar_arg(name, arg)?;
    value
        .as_integer()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| bad_arg(name, &value.to_string()))
}

fn seconds_arg(name: &str, arg: &RestrictionArg) -> SpsResult<f64> {
    let value = scalar_arg(name, arg)?;
    value.as_f64().ok_or_else(|| bad_arg(name, &value.to_string()))
}

fn nanos_arg(name: &str, arg: &RestrictionArg) -> SpsResult<i64> {
    let value = scalar_arg(name, arg)?;
    value.as_integer().ok_or_else(|| bad_arg(name, &value.to_string()))
}
