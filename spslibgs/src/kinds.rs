//! Parameter data kinds
//!
//! The set of allowed data kind names is fixed. Each kind owns exactly one
//! coercion from an arbitrary `Value` into the kind's canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SpsError;
use crate::time::{SpecificTime, TimeInterval};
use crate::types::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataKind {
    Boolean,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    String,
    PosixTime,
    HexBitField,
    UTime,
    Interval,
}

impl DataKind {
    pub const ALL: [DataKind; 16] = [
        DataKind::Boolean,
        DataKind::Byte,
        DataKind::UByte,
        DataKind::Short,
        DataKind::UShort,
        DataKind::Int,
        DataKind::UInt,
        DataKind::Long,
        DataKind::ULong,
        DataKind::Float,
        DataKind::Double,
        DataKind::String,
        DataKind::PosixTime,
        DataKind::HexBitField,
        DataKind::UTime,
        DataKind::Interval,
    ];

    /// Catalog name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Boolean => "boolean",
            DataKind::Byte => "byte",
            DataKind::UByte => "ubyte",
            DataKind::Short => "short",
            DataKind::UShort => "ushort",
            DataKind::Int => "int",
            DataKind::UInt => "uint",
            DataKind::Long => "long",
            DataKind::ULong => "ulong",
            DataKind::Float => "float",
            DataKind::Double => "double",
            DataKind::String => "string",
            DataKind::PosixTime => "posixTime",
            DataKind::HexBitField => "hexBitField",
            DataKind::UTime => "uTime",
            DataKind::Interval => "interval",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Convert `value` to this kind. The error string says why it could not.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match self {
            DataKind::Boolean => to_boolean(value).map(Value::Boolean),
            DataKind::Byte | DataKind::Short | DataKind::Int | DataKind::Long => {
                to_integer(value).map(Value::Integer)
            }
            DataKind::UByte | DataKind::UShort | DataKind::UInt | DataKind::ULong => {
                to_unsigned(value).map(Value::Integer)
            }
            DataKind::HexBitField => to_bit_field(value).map(Value::Integer),
            DataKind::Float | DataKind::Double => to_float(value).map(Value::Float),
            DataKind::String => Ok(Value::String(value.to_string())),
            DataKind::PosixTime | DataKind::UTime => to_time(value).map(Value::Time),
            DataKind::Interval => to_interval(value).map(Value::Interval),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataKind {
    type Err = SpsError;

    fn from_str(name: &str) -> Result<Self, SpsError> {
        Self::from_name(name).ok_or_else(|| {
            SpsError::UndefinedType(format!("Could not create parameter of data type <{}>", name))
        })
    }
}

fn cannot_convert(value: &Value, target: &str) -> String {
    format!("cannot convert {} '{}' to {}", value.type_name(), value, target)
}

fn to_boolean(value: Value) -> Result<bool, String> {
    match &value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(i) => Ok(*i != 0),
        Value::Float(f) => Ok(*f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(cannot_convert(&value, "boolean")),
        },
        _ => Err(cannot_convert(&value, "boolean")),
    }
}

fn to_integer(value: Value) -> Result<i64, String> {
    match &value {
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::Integer(i) => Ok(*i),
        Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Value::String(s) => s.trim().parse().map_err(|_| cannot_convert(&value, "integer")),
        _ => Err(cannot_convert(&value, "integer")),
    }
}

/// Unsigned kinds go through the signed form and drop the sign
fn to_unsigned(value: Value) -> Result<i64, String> {
    let signed = to_integer(value)?;
    signed
        .checked_abs()
        .ok_or_else(|| format!("{} has no unsigned magnitude", signed))
}

fn to_bit_field(value: Value) -> Result<i64, String> {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            return i64::from_str_radix(hex, 16).map_err(|_| cannot_convert(&value, "hexBitField"));
        }
    }
    to_integer(value)
}

fn to_float(value: Value) -> Result<f64, String> {
    match &value {
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::String(s) => s.trim().parse().map_err(|_| cannot_convert(&value, "float")),
        _ => Err(cannot_convert(&value, "float")),
    }
}

fn to_time(value: Value) -> Result<SpecificTime, String> {
    match value {
        Value::Time(t) => Ok(t),
        Value::String(s) => s.parse().map_err(|e: SpsError| e.to_string()),
        other => Err(cannot_convert(&other, "time")),
    }
}

fn to_interval(value: Value) -> Result<TimeInterval, String> {
    match value {
        Value::Interval(i) => Ok(i),
        Value::String(s) => s.parse().map_err(|e: SpsError| e.to_string()),
        other => Err(cannot_convert(&other, "interval")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in DataKind::ALL {
            assert_eq!(DataKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(DataKind::ALL.len(), 16);
    }

    #[test]
    fn test_unknown_kind_is_undefined_type() {
        let err = "quaternion".parse::<DataKind>().unwrap_err();
        assert!(matches!(err, SpsError::UndefinedType(_)));
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(DataKind::Int.coerce(Value::from(" 42 ")), Ok(Value::Integer(42)));
        assert_eq!(DataKind::Long.coerce(Value::Float(3.9)), Ok(Value::Integer(3)));
        assert!(DataKind::Short.coerce(Value::from("3.5")).is_err());
        assert!(DataKind::Int.coerce(Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_unsigned_takes_magnitude() {
        assert_eq!(DataKind::UInt.coerce(Value::from(-12)), Ok(Value::Integer(12)));
        assert_eq!(DataKind::UByte.coerce(Value::from("-3")), Ok(Value::Integer(3)));
        assert!(DataKind::ULong.coerce(Value::Integer(i64::MIN)).is_err());
    }

    #[test]
    fn test_bit_field_accepts_hex() {
        assert_eq!(DataKind::HexBitField.coerce(Value::from("0xC744")), Ok(Value::Integer(0xC744)));
        assert_eq!(DataKind::HexBitField.coerce(Value::from(51012)), Ok(Value::Integer(51012)));
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(DataKind::Boolean.coerce(Value::from("False")), Ok(Value::Boolean(false)));
        assert_eq!(DataKind::Boolean.coerce(Value::from(2)), Ok(Value::Boolean(true)));
        assert!(DataKind::Boolean.coerce(Value::from("maybe")).is_err());
    }

    #[test]
    fn test_string_and_float_coercion() {
        assert_eq!(DataKind::String.coerce(Value::from(7)), Ok(Value::from("7")));
        assert_eq!(DataKind::Double.coerce(Value::from("2.5")), Ok(Value::Float(2.5)));
        assert_eq!(DataKind::Float.coerce(Value::from(2)), Ok(Value::Float(2.0)));
    }

    #[test]
    fn test_time_kinds_use_time_grammar() {
        let expected = Value::Time(SpecificTime::new(2024, 4, 25, 12, 10, 0, 0).unwrap());
        assert_eq!(DataKind::PosixTime.coerce(Value::from("2024-04-25T12:10")), Ok(expected.clone()));
        assert_eq!(DataKind::UTime.coerce(expected.clone()), Ok(expected));
        assert!(DataKind::UTime.coerce(Value::from(5)).is_err());

        assert_eq!(
            DataKind::Interval.coerce(Value::from(":30.0")),
            Ok(Value::Interval(TimeInterval::from_seconds(30)))
        );
    }
}
