//! Built-in simple types
//!
//! Every built-in XSD name the registry knows maps onto one [`Primitive`],
//! which owns the lexical form of its values.

use crate::error::{Error, Result};
use crate::model::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Native representation of a simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// xs:string and its string-valued derivations
    String,
    /// xs:integer
    Integer,
    /// xs:long
    Long,
    /// xs:int
    Int,
    /// xs:short
    Short,
    /// xs:decimal
    Decimal,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:boolean
    Boolean,
    /// xs:date
    Date,
    /// xs:dateTime
    DateTime,
    /// xs:time
    Time,
    /// xs:base64Binary
    Base64Binary,
    /// xs:anyURI
    AnyUri,
}

/// Built-in XSD type names registered up front, with their primitive.
/// The first entry for a primitive is its canonical name.
pub const BUILTIN_TYPES: &[(&str, Primitive)] = &[
    ("string", Primitive::String),
    ("integer", Primitive::Integer),
    ("long", Primitive::Long),
    ("int", Primitive::Int),
    ("short", Primitive::Short),
    ("decimal", Primitive::Decimal),
    ("float", Primitive::Float),
    ("double", Primitive::Double),
    ("boolean", Primitive::Boolean),
    ("date", Primitive::Date),
    ("dateTime", Primitive::DateTime),
    ("time", Primitive::Time),
    ("base64Binary", Primitive::Base64Binary),
    ("anyURI", Primitive::AnyUri),
    ("normalizedString", Primitive::String),
    ("token", Primitive::String),
    ("language", Primitive::String),
    ("Name", Primitive::String),
    ("NCName", Primitive::String),
    ("NMTOKEN", Primitive::String),
    ("ID", Primitive::String),
    ("IDREF", Primitive::String),
    ("QName", Primitive::String),
    ("duration", Primitive::String),
    ("gYear", Primitive::String),
    ("gYearMonth", Primitive::String),
    ("hexBinary", Primitive::String),
    ("anySimpleType", Primitive::String),
    ("anyType", Primitive::String),
    ("nonNegativeInteger", Primitive::Integer),
    ("positiveInteger", Primitive::Integer),
    ("nonPositiveInteger", Primitive::Integer),
    ("negativeInteger", Primitive::Integer),
    ("unsignedLong", Primitive::Integer),
    ("unsignedInt", Primitive::Long),
    ("unsignedShort", Primitive::Int),
    ("byte", Primitive::Short),
    ("unsignedByte", Primitive::Short),
];

/// Primitive of a built-in XSD type name
pub fn builtin_primitive(name: &str) -> Option<Primitive> {
    BUILTIN_TYPES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, primitive)| *primitive)
}

impl Primitive {
    /// Canonical XSD name
    pub fn xsd_name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Long => "long",
            Primitive::Int => "int",
            Primitive::Short => "short",
            Primitive::Decimal => "decimal",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Boolean => "boolean",
            Primitive::Date => "date",
            Primitive::DateTime => "dateTime",
            Primitive::Time => "time",
            Primitive::Base64Binary => "base64Binary",
            Primitive::AnyUri => "anyURI",
        }
    }

    /// Whether values are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Primitive::Integer
                | Primitive::Long
                | Primitive::Int
                | Primitive::Short
                | Primitive::Decimal
                | Primitive::Float
                | Primitive::Double
        )
    }

    /// Whether an element with no text decodes to the empty string
    pub fn is_textual(&self) -> bool {
        matches!(self, Primitive::String | Primitive::AnyUri)
    }

    fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Primitive::Int => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            Primitive::Short => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            _ => None,
        }
    }

    fn check_integer(&self, i: i64) -> Result<i64> {
        match self.integer_range() {
            Some((min, max)) if i < min || i > max => Err(Error::Value(format!(
                "{} is out of range for xs:{}",
                i,
                self.xsd_name()
            ))),
            _ => Ok(i),
        }
    }

    /// Parse a lexical value
    pub fn parse(&self, text: &str) -> Result<Value> {
        let invalid = || Error::Value(format!("invalid xs:{} value '{}'", self.xsd_name(), text));
        let trimmed = text.trim();
        match self {
            Primitive::String | Primitive::AnyUri => Ok(Value::String(text.to_string())),
            Primitive::Integer | Primitive::Long | Primitive::Int | Primitive::Short => {
                match trimmed.parse::<i64>() {
                    Ok(i) => Ok(Value::Integer(self.check_integer(i)?)),
                    // xs:integer is unbounded; wider values are held as decimals
                    Err(_) if *self == Primitive::Integer => match Decimal::from_str(trimmed) {
                        Ok(d) if d.scale() == 0 => Ok(Value::Decimal(d)),
                        Ok(_) => Err(invalid()),
                        Err(_) if trimmed.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'+') => {
                            Err(Error::Value(format!(
                                "xs:integer value '{}' exceeds the supported range",
                                trimmed
                            )))
                        }
                        Err(_) => Err(invalid()),
                    },
                    Err(_) => Err(invalid()),
                }
            }
            Primitive::Decimal => Decimal::from_str(trimmed)
                .map(Value::Decimal)
                .map_err(|_| invalid()),
            Primitive::Float | Primitive::Double => match trimmed {
                "INF" => Ok(Value::Float(f64::INFINITY)),
                "-INF" => Ok(Value::Float(f64::NEG_INFINITY)),
                "NaN" => Ok(Value::Float(f64::NAN)),
                _ => trimmed.parse().map(Value::Float).map_err(|_| invalid()),
            },
            Primitive::Boolean => match trimmed {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid()),
            },
            Primitive::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| invalid()),
            Primitive::DateTime => NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.naive_utc()))
                .map(Value::DateTime)
                .map_err(|_| invalid()),
            Primitive::Time => NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
                .map(Value::Time)
                .map_err(|_| invalid()),
            Primitive::Base64Binary => STANDARD
                .decode(trimmed)
                .map(Value::Binary)
                .map_err(|_| invalid()),
        }
    }

    /// Lexical form of a native value
    pub fn format(&self, value: &Value) -> Result<String> {
        let mismatch = || {
            Error::Type(format!(
                "cannot write a {} value as xs:{}",
                value.kind_name(),
                self.xsd_name()
            ))
        };
        match (self, value) {
            (Primitive::String | Primitive::AnyUri, Value::String(s)) => Ok(s.clone()),
            (
                Primitive::Integer | Primitive::Long | Primitive::Int | Primitive::Short,
                Value::Integer(i),
            ) => Ok(self.check_integer(*i)?.to_string()),
            (Primitive::Integer, Value::Decimal(d)) if d.fract().is_zero() => Ok(d.trunc().to_string()),
            (Primitive::Decimal, Value::Decimal(d)) => Ok(d.to_string()),
            (Primitive::Decimal, Value::Integer(i)) => Ok(i.to_string()),
            (Primitive::Float | Primitive::Double, Value::Float(f)) => Ok(format_float(*f)),
            (Primitive::Float | Primitive::Double, Value::Integer(i)) => Ok(i.to_string()),
            (Primitive::Boolean, Value::Boolean(b)) => Ok(b.to_string()),
            (Primitive::Date, Value::Date(d)) => Ok(d.format(DATE_FORMAT).to_string()),
            (Primitive::DateTime, Value::DateTime(dt)) => {
                Ok(dt.format(DATETIME_FORMAT).to_string())
            }
            (Primitive::Time, Value::Time(t)) => Ok(t.format(TIME_FORMAT).to_string()),
            (Primitive::Base64Binary, Value::Binary(bytes)) => Ok(STANDARD.encode(bytes)),
            _ => Err(mismatch()),
        }
    }

    /// Numeric value used by range facets
    pub fn numeric(value: &Value) -> Option<Decimal> {
        match value {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Float(f) => Decimal::from_f64(*f),
            _ => None,
        }
    }

    /// Length used by length facets
    pub fn length(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Binary(bytes) => Some(bytes.len()),
            _ => None,
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_primitive("token"), Some(Primitive::String));
        assert_eq!(builtin_primitive("unsignedShort"), Some(Primitive::Int));
        assert_eq!(builtin_primitive("Person"), None);
        assert_eq!(Primitive::DateTime.xsd_name(), "dateTime");
    }

    #[test]
    fn test_integers() {
        assert_eq!(Primitive::Integer.parse(" 42 ").unwrap(), Value::Integer(42));
        assert!(Primitive::Int.parse("3000000000").is_err());
        assert!(Primitive::Short.format(&Value::Integer(70000)).is_err());
        assert!(Primitive::Integer.parse("4.2").is_err());

        let big = Primitive::Integer.parse("18446744073709551615").unwrap();
        assert_eq!(big, Value::Decimal(Decimal::from(u64::MAX)));
        assert_eq!(Primitive::Integer.format(&big).unwrap(), "18446744073709551615");
        assert!(Primitive::Integer.parse("4.0").is_err());
        assert!(Primitive::Long.parse("18446744073709551615").is_err());
        assert!(matches!(
            Primitive::Integer.parse("1000000000000000000000000000000"),
            Err(Error::Value(message)) if message.contains("supported range")
        ));
    }

    #[test]
    fn test_floats_and_specials() {
        assert_eq!(Primitive::Double.format(&Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(Primitive::Float.format(&Value::Float(f64::INFINITY)).unwrap(), "INF");
        assert_eq!(
            Primitive::Double.parse("-INF").unwrap(),
            Value::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_booleans() {
        assert_eq!(Primitive::Boolean.parse("1").unwrap(), Value::Boolean(true));
        assert_eq!(Primitive::Boolean.format(&Value::Boolean(false)).unwrap(), "false");
        assert!(Primitive::Boolean.parse("yes").is_err());
    }

    #[test]
    fn test_dates() {
        let value = Primitive::DateTime.parse("2024-03-01T10:20:30").unwrap();
        assert_eq!(
            Primitive::DateTime.format(&value).unwrap(),
            "2024-03-01T10:20:30"
        );
        let zoned = Primitive::DateTime.parse("2024-03-01T10:20:30Z").unwrap();
        assert_eq!(zoned, value);
        let date = Primitive::Date.parse("2024-02-29").unwrap();
        assert_eq!(Primitive::Date.format(&date).unwrap(), "2024-02-29");
        assert!(Primitive::Date.parse("2023-02-29").is_err());
    }

    #[test]
    fn test_binary() {
        let value = Value::Binary(b"hello".to_vec());
        let text = Primitive::Base64Binary.format(&value).unwrap();
        assert_eq!(text, "aGVsbG8=");
        assert_eq!(Primitive::Base64Binary.parse(&text).unwrap(), value);
    }

    #[test]
    fn test_type_mismatch() {
        assert!(matches!(
            Primitive::Integer.format(&Value::String("x".into())),
            Err(Error::Type(_))
        ));
    }

    #[test]
    fn test_strings_keep_whitespace() {
        assert_eq!(
            Primitive::String.parse(" a ").unwrap(),
            Value::String(" a ".to_string())
        );
    }
}
