use crate::ast::{Expr, ExprBinding, SetClause};
use crate::error::CqtResult;

use super::returning::{Recovery, returning_sql};
use super::{DmlStatement, DmlTranslator, target_set};

/// Assigned when an update has no set clauses, so the statement still runs
/// its predicate and reports a row count.
const DUMMY_SET_VARIABLE: &str = "@p";

pub(crate) fn generate_update(
    t: &mut DmlTranslator,
    target: &ExprBinding,
    set_clauses: &[SetClause],
    predicate: &Expr,
    returning: Option<&Expr>,
    guard: bool,
) -> CqtResult<DmlStatement> {
    t.begin_statement("update", returning.is_some());
    let set = target_set(&target.expr)?;

    let mut prologue = String::new();
    if set_clauses.is_empty() {
        prologue = format!("declare {} int\n", DUMMY_SET_VARIABLE);
    }

    let mut body = format!("update {}\nset ", t.translate(&target.expr)?);
    if set_clauses.is_empty() {
        body.push_str(&format!("{} = 0", DUMMY_SET_VARIABLE));
    } else {
        let mut assignments = Vec::with_capacity(set_clauses.len());
        for clause in set_clauses {
            let property = t.translate(&clause.property)?;
            let value = t.translate(&clause.value)?;
            assignments.push(format!("{} = {}", property, value));
        }
        body.push_str(&assignments.join(", "));
    }
    body.push_str(&format!("\nwhere {}", t.translate(predicate)?));
    if guard {
        body.push_str(" and @@ROWCOUNT > 0");
    }

    let returning = match returning {
        Some(row) => Some(returning_sql(t, set, row, Recovery::KeyValues)?),
        None => None,
    };
    Ok(DmlStatement {
        prologue,
        body,
        returning,
    })
}

pub(crate) fn generate_delete(
    t: &mut DmlTranslator,
    target: &ExprBinding,
    predicate: &Expr,
    guard: bool,
) -> CqtResult<DmlStatement> {
    t.begin_statement("delete", false);
    let mut body = format!(
        "delete {}\nwhere {}",
        t.translate(&target.expr)?,
        t.translate(predicate)?
    );
    if guard {
        body.push_str(" and @@ROWCOUNT > 0");
    }
    Ok(DmlStatement {
        prologue: String::new(),
        body,
        returning: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EntitySet, EntityType, Member, TypeUsage};
    use crate::transpiler::dialect::Dialect;

    fn accounts() -> ExprBinding {
        Expr::scan(EntitySet::new(
            "Accounts",
            EntityType {
                name: "Account".into(),
                members: vec![
                    Member::new("Id", TypeUsage::int32()),
                    Member::new("Balance", TypeUsage::decimal(18, 2)),
                    Member::new("Version", TypeUsage::primitive(crate::ast::PrimitiveKind::Binary).with_store_type("rowversion")).computed(),
                ],
                keys: vec!["Id".into()],
            },
        ))
        .bind("a")
    }

    #[test]
    fn test_update_with_returning_uses_key_parameters() {
        let target = accounts();
        let row = target.var_ref();
        let clauses = vec![SetClause::new(
            row.clone().prop("Balance"),
            Expr::typed_constant(rust_decimal::Decimal::new(1050, 2), TypeUsage::decimal(18, 2)),
        )];
        let predicate = row.clone().prop("Id").eq(Expr::constant(7));
        let returning = Expr::row(vec![("Version", row.prop("Version"))]);

        let mut t = DmlTranslator::new(Dialect::Sql2012);
        let stmt = generate_update(&mut t, &target, &clauses, &predicate, Some(&returning), false).unwrap();
        assert_eq!(stmt.body, "update [dbo].[Accounts]\nset [Balance] = @0\nwhere ([Id] = @1)");
        assert_eq!(
            stmt.returning.as_deref(),
            Some("select [Version]\nfrom [dbo].[Accounts]\nwhere @@ROWCOUNT > 0 and [Id] = @1")
        );
    }

    #[test]
    fn test_update_without_set_clauses() {
        let target = accounts();
        let predicate = target.var_ref().prop("Id").eq(Expr::constant(1));
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        let stmt = generate_update(&mut t, &target, &[], &predicate, None, true).unwrap();
        assert_eq!(stmt.prologue, "declare @p int\n");
        assert_eq!(
            stmt.body,
            "update [dbo].[Accounts]\nset @p = 0\nwhere ([Id] = @0) and @@ROWCOUNT > 0"
        );
    }

    #[test]
    fn test_delete() {
        let target = accounts();
        let predicate = target.var_ref().prop("Id").eq(Expr::constant(3));
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        let stmt = generate_delete(&mut t, &target, &predicate, false).unwrap();
        assert_eq!(stmt.body, "delete [dbo].[Accounts]\nwhere ([Id] = @0)");
    }
}
