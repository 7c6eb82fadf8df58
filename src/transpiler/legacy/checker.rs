use crate::ast::{Expr, ExprKind, SetOpKind};
use crate::error::{CqtError, CqtResult};

fn require_constant(count: &Expr, operator: &str) -> CqtResult<()> {
    match count.kind {
        ExprKind::Constant(_) => Ok(()),
        _ => Err(CqtError::LegacyDialect(format!(
            "{} requires a constant row count, found {}",
            operator,
            count.kind_name()
        ))),
    }
}

/// Whether `e` uses EXCEPT, INTERSECT or SKIP anywhere.
///
/// Walks the whole tree even after a match so that constructs the legacy
/// dialect cannot express at all are always reported.
pub fn needs_rewrite(e: &Expr) -> CqtResult<bool> {
    let mut needed = match &e.kind {
        ExprKind::Apply { .. } => {
            return Err(CqtError::LegacyDialect("APPLY".to_string()));
        }
        ExprKind::Limit { limit, .. } => {
            require_constant(limit, "TOP")?;
            false
        }
        ExprKind::Skip { count, .. } => {
            require_constant(count, "SKIP")?;
            true
        }
        ExprKind::SetOp { op, .. } => matches!(op, SetOpKind::Except | SetOpKind::Intersect),
        _ => false,
    };
    for child in e.children() {
        needed |= needs_rewrite(child)?;
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EntitySet, EntityType, Member, SortClause, TypeUsage};

    fn orders() -> Expr {
        Expr::scan(EntitySet::new(
            "Orders",
            EntityType {
                name: "Order".into(),
                members: vec![Member::new("Id", TypeUsage::int32())],
                keys: vec!["Id".into()],
            },
        ))
    }

    #[test]
    fn test_plain_query_needs_nothing() {
        let b = orders().bind("o");
        let q = b.clone().filter(b.var_ref().prop("Id").eq(Expr::constant(1)));
        assert!(!needs_rewrite(&q).unwrap());
        assert!(!needs_rewrite(&orders().limit(Expr::constant(5))).unwrap());
    }

    #[test]
    fn test_set_ops_and_skip_need_rewrite() {
        assert!(needs_rewrite(&orders().except(orders())).unwrap());
        assert!(needs_rewrite(&orders().intersect(orders())).unwrap());
        assert!(!needs_rewrite(&orders().union_all(orders())).unwrap());

        let b = orders().bind("o");
        let keys = vec![SortClause::asc(b.var_ref().prop("Id"))];
        let nested = b.skip(keys, Expr::constant(10)).distinct();
        assert!(needs_rewrite(&nested).unwrap());
    }

    #[test]
    fn test_parameter_counts_are_rejected() {
        let limited = orders().limit(Expr::param("n", TypeUsage::int32()));
        assert!(matches!(needs_rewrite(&limited), Err(CqtError::LegacyDialect(_))));

        let b = orders().bind("o");
        let keys = vec![SortClause::asc(b.var_ref().prop("Id"))];
        let skipped = b.skip(keys, Expr::param("n", TypeUsage::int32()));
        assert!(matches!(needs_rewrite(&skipped), Err(CqtError::LegacyDialect(_))));
    }

    #[test]
    fn test_apply_rejected_even_below_a_rewrite() {
        let applied = Expr::apply(
            crate::ast::ApplyKind::Cross,
            orders().bind("a"),
            orders().bind("b"),
        );
        let q = orders().except(orders()).union_all(applied.bind("x").project(Expr::constant(1)));
        let err = needs_rewrite(&q).unwrap_err();
        assert_eq!(err.to_string(), "Not supported on the legacy dialect: APPLY");
    }
}
