//! SQL Server literal text for constants.

use chrono::{NaiveDateTime, Timelike};

use crate::ast::{SpatialValue, TypeUsage, Value};
use crate::error::{CqtError, CqtResult};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

const DEFAULT_DECIMAL_PRECISION: usize = 18;

fn cast_if(cast: bool, value: &str, type_name: &str) -> String {
    if cast {
        format!("cast({} as {})", value, type_name)
    } else {
        value.to_string()
    }
}

/// `yyyy-MM-dd HH:mm:ss.fffffff`
fn seven_digit_fraction(dt: &NaiveDateTime) -> String {
    format!(
        "{}.{:07}",
        dt.format("%Y-%m-%d %H:%M:%S"),
        dt.nanosecond() % 1_000_000_000 / 100
    )
}

fn check_double(value: f64, kind: &'static str) -> CqtResult<()> {
    let reason = if value.is_nan() {
        "NaN"
    } else if value == f64::INFINITY {
        "positive infinity"
    } else if value == f64::NEG_INFINITY {
        "negative infinity"
    } else {
        return Ok(());
    };
    Err(CqtError::InvalidLiteral { kind, reason })
}

/// Literal text for `value`.
///
/// `cast_optional` drops the cast on integer and boolean literals when the
/// other side of a comparison already has the same type. `force_non_unicode`
/// selects `'..'` over `N'..'` for strings whose type leaves it open.
pub fn constant_sql(
    generator: &dyn SqlGenerator,
    dialect: Dialect,
    value: &Value,
    ty: &TypeUsage,
    cast_optional: bool,
    force_non_unicode: bool,
) -> CqtResult<String> {
    let sql = match value {
        Value::Int32(n) => n.to_string(),
        Value::Binary(bytes) => generator.binary_literal(bytes),
        Value::Boolean(b) => cast_if(!cast_optional, if *b { "1" } else { "0" }, "bit"),
        Value::Byte(n) => cast_if(!cast_optional, &n.to_string(), "tinyint"),
        Value::Int16(n) => cast_if(!cast_optional, &n.to_string(), "smallint"),
        Value::Int64(n) => cast_if(!cast_optional, &n.to_string(), "bigint"),
        Value::DateTime(dt) => {
            let (type_name, text) = if dialect.is_pre_2008() {
                ("datetime", dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            } else {
                ("datetime2", seven_digit_fraction(dt))
            };
            format!(
                "convert({}, {}, 121)",
                type_name,
                generator.string_literal(&text, false)
            )
        }
        Value::Time(t) => {
            require_2008(dialect, "Time")?;
            let text = t.format("%H:%M:%S%.f").to_string();
            format!("convert(time, {}, 121)", generator.string_literal(&text, false))
        }
        Value::DateTimeOffset(dto) => {
            require_2008(dialect, "DateTimeOffset")?;
            let text = format!(
                "{} {}",
                seven_digit_fraction(&dto.naive_local()),
                dto.format("%:z")
            );
            format!(
                "convert(datetimeoffset, {}, 121)",
                generator.string_literal(&text, false)
            )
        }
        Value::Decimal(d) => {
            let text = d.to_string();
            let needs_cast = !text.contains('.') && text.trim_start_matches('-').len() < 20;
            let precision = text.len().max(DEFAULT_DECIMAL_PRECISION);
            cast_if(needs_cast, &text, &format!("decimal({})", precision))
        }
        Value::Double(v) => {
            check_double(*v, "Double")?;
            cast_if(true, &v.to_string(), "float(53)")
        }
        Value::Single(v) => {
            check_double(f64::from(*v), "Single")?;
            cast_if(true, &v.to_string(), "real")
        }
        Value::Guid(g) => cast_if(true, &generator.string_literal(&g.to_string(), false), "uniqueidentifier"),
        Value::String(s) => {
            let unicode = ty.facets.unicode.unwrap_or(!force_non_unicode);
            generator.string_literal(s, unicode)
        }
        Value::Geography(spatial) => {
            require_2008(dialect, "Geography")?;
            spatial_sql(generator, "geography", spatial)?
        }
        Value::Geometry(spatial) => {
            require_2008(dialect, "Geometry")?;
            spatial_sql(generator, "geometry", spatial)?
        }
    };
    Ok(sql)
}

fn require_2008(dialect: Dialect, kind: &str) -> CqtResult<()> {
    if dialect.is_pre_2008() {
        return Err(CqtError::unsupported(format!("{} literal on {}", kind, dialect)));
    }
    Ok(())
}

/// Spatial constructor call, trying text, then binary, then GML.
fn spatial_sql(generator: &dyn SqlGenerator, type_name: &str, value: &SpatialValue) -> CqtResult<String> {
    let Some(srid) = value.srid else {
        return Err(CqtError::unsupported(format!(
            "{} constant without a coordinate system id",
            type_name
        )));
    };
    if let Some(wkt) = &value.wkt {
        return Ok(format!(
            "{}::STGeomFromText({}, {})",
            type_name,
            generator.string_literal(wkt, true),
            srid
        ));
    }
    if let Some(wkb) = &value.wkb {
        return Ok(format!(
            "{}::STGeomFromWKB({}, {})",
            type_name,
            generator.binary_literal(wkb),
            srid
        ));
    }
    if let Some(gml) = &value.gml {
        return Ok(format!(
            "{}::GeomFromGml({}, {})",
            type_name,
            generator.string_literal(gml, true),
            srid
        ));
    }
    Err(CqtError::unsupported(format!(
        "{} constant with no text, binary or GML representation",
        type_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn lit(dialect: Dialect, value: Value) -> CqtResult<String> {
        let ty = TypeUsage::primitive(value.kind());
        constant_sql(dialect.generator().as_ref(), dialect, &value, &ty, false, false)
    }

    fn ok(value: Value) -> String {
        lit(Dialect::Sql2012, value).unwrap()
    }

    #[test]
    fn test_integer_and_boolean_casts() {
        assert_eq!(ok(Value::Int32(42)), "42");
        assert_eq!(ok(Value::Int64(7)), "cast(7 as bigint)");
        assert_eq!(ok(Value::Boolean(true)), "cast(1 as bit)");

        let generator = Dialect::Sql2012.generator();
        let optional = constant_sql(
            generator.as_ref(),
            Dialect::Sql2012,
            &Value::Int16(3),
            &TypeUsage::primitive(crate::ast::PrimitiveKind::Int16),
            true,
            false,
        )
        .unwrap();
        assert_eq!(optional, "3");
    }

    #[test]
    fn test_decimal_cast_only_for_integral_text() {
        assert_eq!(ok(Value::Decimal(Decimal::from(5))), "cast(5 as decimal(18))");
        assert_eq!(ok(Value::Decimal(Decimal::from_str("1.50").unwrap())), "1.50");
    }

    #[test]
    fn test_datetime_by_dialect() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 250)
            .unwrap();
        assert_eq!(
            ok(Value::DateTime(dt)),
            "convert(datetime2, '2024-03-01 13:05:09.2500000', 121)"
        );
        assert_eq!(
            lit(Dialect::Sql2005, Value::DateTime(dt)).unwrap(),
            "convert(datetime, '2024-03-01 13:05:09.250', 121)"
        );
    }

    #[test]
    fn test_time_requires_2008() {
        let t = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        assert_eq!(ok(Value::Time(t)), "convert(time, '08:30:00', 121)");
        assert!(lit(Dialect::Sql2005, Value::Time(t)).is_err());
    }

    #[test]
    fn test_rejects_nan_and_infinity() {
        let err = lit(Dialect::Sql2012, Value::Double(f64::NAN)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid Double literal: NaN");
        let err = lit(Dialect::Sql2012, Value::Single(f32::NEG_INFINITY)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid Single literal: negative infinity");
        assert_eq!(ok(Value::Double(1.5)), "cast(1.5 as float(53))");
    }

    #[test]
    fn test_strings_and_binary() {
        assert_eq!(ok(Value::String("O'Brien".into())), "N'O''Brien'");
        assert_eq!(ok(Value::Binary(vec![0xAB, 0x01])), "0xAB01");
    }

    #[test]
    fn test_spatial_constants() {
        let point = SpatialValue::from_text("POINT(1 2)", 4326);
        assert_eq!(
            ok(Value::Geography(point)),
            "geography::STGeomFromText(N'POINT(1 2)', 4326)"
        );
        let missing = SpatialValue {
            wkt: Some("POINT(1 2)".into()),
            ..SpatialValue::default()
        };
        assert!(matches!(
            lit(Dialect::Sql2012, Value::Geometry(missing)),
            Err(CqtError::Unsupported(_))
        ));
    }
}
