//! The internal `LogicalType` mirror and its mapping to `arrow_schema::DataType`.
//!
//! `spec.md` §3/§4.4.2: a closed tagged set of types this driver supports,
//! carrying temporal parameters (unit, timezone) explicitly rather than
//! defaulting them.

use arrow_schema::{DataType, TimeUnit as ArrowTimeUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl From<TimeUnit> for ArrowTimeUnit {
    fn from(unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Second => ArrowTimeUnit::Second,
            TimeUnit::Millisecond => ArrowTimeUnit::Millisecond,
            TimeUnit::Microsecond => ArrowTimeUnit::Microsecond,
            TimeUnit::Nanosecond => ArrowTimeUnit::Nanosecond,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalType {
    Int { bits: u8, signed: bool },
    Float { bits: u8 },
    Bool,
    Utf8,
    Binary,
    Date32,
    Time64 { unit: TimeUnit },
    Timestamp { unit: TimeUnit, tz: Option<String> },
}

impl LogicalType {
    /// Non-validity buffer count per `spec.md` §4.4.2's table.
    pub fn buffer_count(&self) -> usize {
        match self {
            Self::Utf8 | Self::Binary => 2,
            _ => 1,
        }
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            Self::Int { bits: 8, signed: true } => DataType::Int8,
            Self::Int { bits: 16, signed: true } => DataType::Int16,
            Self::Int { bits: 32, signed: true } => DataType::Int32,
            Self::Int { bits: 64, signed: true } => DataType::Int64,
            Self::Int { bits: 8, signed: false } => DataType::UInt8,
            Self::Int { bits: 16, signed: false } => DataType::UInt16,
            Self::Int { bits: 32, signed: false } => DataType::UInt32,
            Self::Int { bits: 64, signed: false } => DataType::UInt64,
            #[expect(
                clippy::unreachable,
                reason = "schema.rs only constructs Int with bits in {8,16,32,64}"
            )]
            Self::Int { bits, signed } => unreachable!("unsupported int width {bits}/{signed}"),
            Self::Float { bits: 32 } => DataType::Float32,
            Self::Float { bits: 64 } => DataType::Float64,
            #[expect(
                clippy::unreachable,
                reason = "schema.rs only constructs Float with bits in {32,64}"
            )]
            Self::Float { bits } => unreachable!("unsupported float width {bits}"),
            Self::Bool => DataType::Boolean,
            Self::Utf8 => DataType::Utf8,
            Self::Binary => DataType::Binary,
            Self::Date32 => DataType::Date32,
            Self::Time64 { unit } => DataType::Time64((*unit).into()),
            Self::Timestamp { unit, tz } => {
                DataType::Timestamp((*unit).into(), tz.clone().map(Into::into))
            }
        }
    }
}
