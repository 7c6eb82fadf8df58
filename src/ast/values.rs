use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PrimitiveKind;

/// A spatial value as exposed by the host: coordinate system plus any of the
/// well-known representations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialValue {
    #[serde(default)]
    pub srid: Option<i32>,
    #[serde(default)]
    pub wkt: Option<String>,
    #[serde(default)]
    pub wkb: Option<Vec<u8>>,
    #[serde(default)]
    pub gml: Option<String>,
}

impl SpatialValue {
    pub fn from_text(wkt: impl Into<String>, srid: i32) -> Self {
        Self {
            srid: Some(srid),
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }
}

/// A constant carried by the command tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Time(NaiveTime),
    Guid(Uuid),
    Geography(SpatialValue),
    Geometry(SpatialValue),
}

impl Value {
    /// The primitive kind this value naturally has.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Boolean(_) => PrimitiveKind::Boolean,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::Int16(_) => PrimitiveKind::Int16,
            Value::Int32(_) => PrimitiveKind::Int32,
            Value::Int64(_) => PrimitiveKind::Int64,
            Value::Single(_) => PrimitiveKind::Single,
            Value::Double(_) => PrimitiveKind::Double,
            Value::Decimal(_) => PrimitiveKind::Decimal,
            Value::String(_) => PrimitiveKind::String,
            Value::Binary(_) => PrimitiveKind::Binary,
            Value::DateTime(_) => PrimitiveKind::DateTime,
            Value::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            Value::Time(_) => PrimitiveKind::Time,
            Value::Guid(_) => PrimitiveKind::Guid,
            Value::Geography(_) => PrimitiveKind::Geography,
            Value::Geometry(_) => PrimitiveKind::Geometry,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Single(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            }
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt),
            Value::Time(t) => write!(f, "{}", t),
            Value::Guid(u) => write!(f, "{}", u),
            Value::Geography(s) | Value::Geometry(s) => {
                write!(f, "{}", s.wkt.as_deref().unwrap_or("<spatial>"))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Byte(n)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int16(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Single(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Guid(u)
    }
}
