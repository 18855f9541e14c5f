//! FlatBuffer `Schema` message parsing (`spec.md` §4.4.2).
//!
//! Reads the `Message.header` as a `Schema` and maps each FlatBuffer field
//! type to the internal [`LogicalType`] mirror, propagating temporal unit
//! and timezone parameters explicitly rather than defaulting them.

use std::sync::Arc;

use arrow_ipc::{Schema as FbSchema, Type as FbType};
use arrow_schema::{Field, Schema, SchemaRef};

use super::types::{LogicalType, TimeUnit};
use crate::error::{Error, Result};

/// One field of the schema mirror: name, logical type, nullability.
#[derive(Debug, Clone)]
pub struct FieldMirror {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

/// The schema mirror built once per query (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct SchemaMirror {
    pub fields: Vec<FieldMirror>,
    pub arrow_schema: SchemaRef,
}

impl SchemaMirror {
    pub fn from_flatbuffer(fb_schema: &FbSchema<'_>) -> Result<Self> {
        let fb_fields = fb_schema
            .fields()
            .ok_or_else(|| Error::Protocol("Schema message has no fields".to_string()))?;

        let mut fields = Vec::with_capacity(fb_fields.len());
        for fb_field in fb_fields {
            let name = fb_field
                .name()
                .ok_or_else(|| Error::Protocol("field missing name".to_string()))?
                .to_string();
            let nullable = fb_field.nullable();
            let logical_type = logical_type_of(&fb_field)?;
            fields.push(FieldMirror {
                name,
                logical_type,
                nullable,
            });
        }

        let arrow_fields: Vec<Field> = fields
            .iter()
            .map(|f| Field::new(&f.name, f.logical_type.to_arrow(), f.nullable))
            .collect();
        let arrow_schema = Arc::new(Schema::new(arrow_fields));

        Ok(Self {
            fields,
            arrow_schema,
        })
    }
}

fn logical_type_of(fb_field: &arrow_ipc::Field<'_>) -> Result<LogicalType> {
    match fb_field.type_type() {
        FbType::Int => {
            let int = fb_field
                .type_as_int()
                .ok_or_else(|| Error::Protocol("malformed Int type".to_string()))?;
            let bits = u8::try_from(int.bitWidth())
                .map_err(|_err| Error::Unsupported(format!("int bit width {}", int.bitWidth())))?;
            if !matches!(bits, 8 | 16 | 32 | 64) {
                return Err(Error::Unsupported(format!("int bit width {bits}")));
            }
            Ok(LogicalType::Int {
                bits,
                signed: int.is_signed(),
            })
        }
        FbType::FloatingPoint => {
            let fp = fb_field
                .type_as_floating_point()
                .ok_or_else(|| Error::Protocol("malformed FloatingPoint type".to_string()))?;
            let bits = match fp.precision() {
                arrow_ipc::Precision::SINGLE => 32,
                arrow_ipc::Precision::DOUBLE => 64,
                _ => {
                    return Err(Error::Unsupported(
                        "half-precision floating point".to_string(),
                    ));
                }
            };
            Ok(LogicalType::Float { bits })
        }
        FbType::Bool => Ok(LogicalType::Bool),
        FbType::Utf8 => Ok(LogicalType::Utf8),
        FbType::Binary => Ok(LogicalType::Binary),
        FbType::Date => {
            let date = fb_field
                .type_as_date()
                .ok_or_else(|| Error::Protocol("malformed Date type".to_string()))?;
            if date.unit() != arrow_ipc::DateUnit::DAY {
                return Err(Error::Unsupported("Date unit other than DAY".to_string()));
            }
            Ok(LogicalType::Date32)
        }
        FbType::Time => {
            let time = fb_field
                .type_as_time()
                .ok_or_else(|| Error::Protocol("malformed Time type".to_string()))?;
            if time.bitWidth() != 64 {
                return Err(Error::Unsupported(format!(
                    "Time bit width {}",
                    time.bitWidth()
                )));
            }
            Ok(LogicalType::Time64 {
                unit: time_unit_of(time.unit())?,
            })
        }
        FbType::Timestamp => {
            let ts = fb_field
                .type_as_timestamp()
                .ok_or_else(|| Error::Protocol("malformed Timestamp type".to_string()))?;
            Ok(LogicalType::Timestamp {
                unit: time_unit_of(ts.unit())?,
                tz: ts.timezone().map(ToString::to_string),
            })
        }
        other => Err(Error::Unsupported(format!(
            "FlatBuffer type variant {:?}",
            other.0
        ))),
    }
}

fn time_unit_of(unit: arrow_ipc::TimeUnit) -> Result<TimeUnit> {
    match unit {
        arrow_ipc::TimeUnit::SECOND => Ok(TimeUnit::Second),
        arrow_ipc::TimeUnit::MILLISECOND => Ok(TimeUnit::Millisecond),
        arrow_ipc::TimeUnit::MICROSECOND => Ok(TimeUnit::Microsecond),
        arrow_ipc::TimeUnit::NANOSECOND => Ok(TimeUnit::Nanosecond),
        other => Err(Error::Unsupported(format!("time unit {:?}", other.0))),
    }
}
