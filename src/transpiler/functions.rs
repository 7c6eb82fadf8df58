//! Function and aggregate call text.

use crate::ast::Function;
use crate::error::{CqtError, CqtResult};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::fragment::SqlBuilder;
use crate::transpiler::traits::SqlGenerator;

fn call(name: &str, args: Vec<SqlBuilder>) -> SqlBuilder {
    let mut b = SqlBuilder::text(name);
    b.push_str("(");
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            b.push_str(", ");
        }
        b.push_builder(arg);
    }
    b.push_str(")");
    b
}

fn arity(name: &str, args: &[SqlBuilder], expected: &[usize]) -> CqtResult<()> {
    if expected.contains(&args.len()) {
        Ok(())
    } else {
        Err(CqtError::unsupported(format!(
            "Edm.{} with {} argument(s)",
            name,
            args.len()
        )))
    }
}

fn date_part(part: &str, mut args: Vec<SqlBuilder>) -> SqlBuilder {
    let mut b = SqlBuilder::text(format!("DATEPART({}, ", part));
    if let Some(arg) = args.pop() {
        b.push_builder(arg);
    }
    b.push_str(")");
    b
}

/// Translate a canonical (`Edm`) function call over already translated arguments.
pub fn canonical_sql(dialect: Dialect, name: &str, mut args: Vec<SqlBuilder>) -> CqtResult<SqlBuilder> {
    let sql = match name {
        "Length" => {
            arity(name, &args, &[1])?;
            call("LEN", args)
        }
        "ToUpper" => {
            arity(name, &args, &[1])?;
            call("UPPER", args)
        }
        "ToLower" => {
            arity(name, &args, &[1])?;
            call("LOWER", args)
        }
        "LTrim" => {
            arity(name, &args, &[1])?;
            call("LTRIM", args)
        }
        "RTrim" => {
            arity(name, &args, &[1])?;
            call("RTRIM", args)
        }
        "Trim" => {
            arity(name, &args, &[1])?;
            call("LTRIM", vec![call("RTRIM", args)])
        }
        "Reverse" => {
            arity(name, &args, &[1])?;
            call("REVERSE", args)
        }
        "Left" => {
            arity(name, &args, &[2])?;
            call("LEFT", args)
        }
        "Right" => {
            arity(name, &args, &[2])?;
            call("RIGHT", args)
        }
        "Substring" => {
            arity(name, &args, &[3])?;
            call("SUBSTRING", args)
        }
        "Replace" => {
            arity(name, &args, &[3])?;
            call("REPLACE", args)
        }
        "IndexOf" => {
            arity(name, &args, &[2])?;
            call("CHARINDEX", args)
        }
        "Concat" => {
            arity(name, &args, &[2])?;
            let right = args.pop().unwrap_or_default();
            let left = args.pop().unwrap_or_default();
            let mut b = SqlBuilder::text("(");
            b.push_builder(left);
            b.push_str(" + ");
            b.push_builder(right);
            b.push_str(")");
            b
        }
        "Abs" => {
            arity(name, &args, &[1])?;
            call("ABS", args)
        }
        "Ceiling" => {
            arity(name, &args, &[1])?;
            call("CEILING", args)
        }
        "Floor" => {
            arity(name, &args, &[1])?;
            call("FLOOR", args)
        }
        "Power" => {
            arity(name, &args, &[2])?;
            call("POWER", args)
        }
        "Round" => {
            arity(name, &args, &[1, 2])?;
            if args.len() == 1 {
                args.push(SqlBuilder::text("0"));
            }
            call("ROUND", args)
        }
        "Truncate" => {
            arity(name, &args, &[2])?;
            args.push(SqlBuilder::text("1"));
            call("ROUND", args)
        }
        "Year" | "Month" | "Day" | "Hour" | "Minute" | "Second" | "Millisecond" => {
            arity(name, &args, &[1])?;
            date_part(&name.to_lowercase(), args)
        }
        "DayOfYear" => {
            arity(name, &args, &[1])?;
            date_part("dayofyear", args)
        }
        "CurrentDateTime" => {
            arity(name, &args, &[0])?;
            SqlBuilder::text(if dialect.is_pre_2008() { "GetDate()" } else { "SysDateTime()" })
        }
        "CurrentUtcDateTime" => {
            arity(name, &args, &[0])?;
            SqlBuilder::text(if dialect.is_pre_2008() { "GetUtcDate()" } else { "SysUtcDateTime()" })
        }
        "CurrentDateTimeOffset" => {
            arity(name, &args, &[0])?;
            if dialect.is_pre_2008() {
                return Err(CqtError::unsupported(format!("Edm.{} on {}", name, dialect)));
            }
            SqlBuilder::text("SysDateTimeOffset()")
        }
        "NewGuid" => {
            arity(name, &args, &[0])?;
            SqlBuilder::text("NEWID()")
        }
        "GeographyFromText" | "GeographyFromBinary" | "GeographyFromGml" | "GeometryFromText"
        | "GeometryFromBinary" | "GeometryFromGml" => {
            arity(name, &args, &[2])?;
            if dialect.is_pre_2008() {
                return Err(CqtError::unsupported(format!("Edm.{} on {}", name, dialect)));
            }
            let type_name = if name.starts_with("Geography") { "geography" } else { "geometry" };
            let method = if name.ends_with("Text") {
                "STGeomFromText"
            } else if name.ends_with("Binary") {
                "STGeomFromWKB"
            } else {
                "GeomFromGml"
            };
            call(&format!("{}::{}", type_name, method), args)
        }
        _ => return Err(CqtError::unsupported(format!("canonical function Edm.{}", name))),
    };
    Ok(sql)
}

/// `NAME(args)`, or bare `NAME` for niladic built-ins.
pub fn store_sql(function: &Function, args: Vec<SqlBuilder>) -> SqlBuilder {
    let name = function.store_name.as_deref().unwrap_or(&function.name);
    if function.niladic && args.is_empty() {
        SqlBuilder::text(name)
    } else {
        call(name, args)
    }
}

/// `[schema].[name](args)` for user-defined functions.
pub fn user_sql(generator: &dyn SqlGenerator, function: &Function, args: Vec<SqlBuilder>) -> SqlBuilder {
    let name = format!(
        "{}.{}",
        generator.quote_identifier(function.schema.as_deref().unwrap_or(&function.namespace)),
        generator.quote_identifier(function.store_name.as_deref().unwrap_or(&function.name)),
    );
    call(&name, args)
}

/// Aggregate function name as written in the SELECT list.
pub fn aggregate_name(function: &Function) -> String {
    if !function.is_canonical() {
        return function
            .store_name
            .clone()
            .unwrap_or_else(|| function.name.clone());
    }
    match function.name.as_str() {
        "Count" => "COUNT".to_string(),
        "BigCount" => "COUNT_BIG".to_string(),
        "Sum" => "SUM".to_string(),
        "Max" => "MAX".to_string(),
        "Min" => "MIN".to_string(),
        "Avg" => "AVG".to_string(),
        "StDev" => "STDEV".to_string(),
        "StDevP" => "STDEVP".to_string(),
        "Var" => "VAR".to_string(),
        "VarP" => "VARP".to_string(),
        other => other.to_uppercase(),
    }
}
