use std::collections::HashSet;

use crate::ast::{Expr, ExprBinding, ExprKind, SetClause};
use crate::error::CqtResult;
use crate::metadata::is_identity_type;
use crate::transpiler::dialect::Dialect;

use super::returning::{Recovery, returning_sql};
use super::{DmlStatement, DmlTranslator, target_set};

fn set_member(clause: &SetClause) -> Option<&str> {
    match &clause.property.kind {
        ExprKind::Property { name, .. } => Some(name),
        _ => None,
    }
}

/// Whether key values must be captured with `OUTPUT ... INTO` because
/// `scope_identity()` cannot recover them: more than one key without a
/// value, or one that is not an integer type.
pub(crate) fn use_generated_values_variable(
    t: &DmlTranslator,
    dialect: Dialect,
    target: &ExprBinding,
    set_clauses: &[SetClause],
    returning: Option<&Expr>,
) -> CqtResult<bool> {
    if !dialect.supports_output_clause() || returning.is_none() {
        return Ok(false);
    }
    let set = target_set(&target.expr)?;
    let with_values: HashSet<&str> = set_clauses.iter().filter_map(set_member).collect();

    let mut first_key_found = false;
    for key in set.element.key_members() {
        if with_values.contains(key.name.as_str()) {
            continue;
        }
        if first_key_found {
            return Ok(true);
        }
        first_key_found = true;
        if !is_identity_type(&t.store_type(&key.ty)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Type of a generated-keys table column. Row versions are stored as `binary(8)`.
fn variable_type(t: &DmlTranslator, ty: &crate::ast::TypeUsage) -> CqtResult<String> {
    let column_type = t.store_type_text(ty)?;
    Ok(match column_type.as_str() {
        "rowversion" | "timestamp" => "binary(8)".to_string(),
        _ => column_type,
    })
}

pub(crate) fn generate_insert(
    t: &mut DmlTranslator,
    target: &ExprBinding,
    set_clauses: &[SetClause],
    returning: Option<&Expr>,
    keys_variable: &str,
) -> CqtResult<DmlStatement> {
    t.begin_statement("insert", returning.is_some());
    let use_variable = use_generated_values_variable(t, t.dialect, target, set_clauses, returning)?;
    let set = target_set(&target.expr)?;

    let mut prologue = String::new();
    if use_variable {
        let mut columns = Vec::new();
        for key in set.element.key_members() {
            let mut column = format!("{} {}", t.member_sql(&key.name), variable_type(t, &key.ty)?);
            if let Some(collation) = key.ty.facets.collation.as_deref().filter(|c| !c.is_empty()) {
                column.push_str(" collate ");
                column.push_str(collation);
            }
            columns.push(column);
        }
        prologue = format!("declare {} table({})\n", keys_variable, columns.join(", "));
    }

    let mut body = String::from("insert ");
    body.push_str(&t.translate(&target.expr)?);
    if set_clauses.is_empty() {
        body.push('\n');
    } else {
        let mut columns = Vec::with_capacity(set_clauses.len());
        for clause in set_clauses {
            columns.push(t.translate(&clause.property)?);
        }
        body.push_str(&format!("({})\n", columns.join(", ")));
    }

    if use_variable {
        let inserted: Vec<String> = set
            .element
            .key_members()
            .map(|key| format!("inserted.{}", t.member_sql(&key.name)))
            .collect();
        body.push_str(&format!("output {} into {}\n", inserted.join(", "), keys_variable));
    }

    if set_clauses.is_empty() {
        body.push_str("default values");
    } else {
        let mut values = Vec::with_capacity(set_clauses.len());
        for clause in set_clauses {
            values.push(t.translate(&clause.value)?);
            t.register_member_value(&clause.property, &clause.value);
        }
        body.push_str(&format!("values ({})", values.join(", ")));
    }

    let returning = match returning {
        Some(row) => {
            let recovery = if use_variable {
                Recovery::KeysVariable(keys_variable)
            } else {
                Recovery::KeyValues
            };
            Some(returning_sql(t, set, row, recovery)?)
        }
        None => None,
    };

    Ok(DmlStatement {
        prologue,
        body,
        returning,
    })
}
