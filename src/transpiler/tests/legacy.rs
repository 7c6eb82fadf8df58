//! SQL Server 2000 rewrites and rejections.

use super::{int, orders, products};
use crate::ast::{ApplyKind, Expr, SortClause, TypeUsage};
use crate::error::CqtError;
use crate::transpiler::{Dialect, ToSql};

fn cheap() -> Expr {
    let p = Expr::scan(products()).bind("p");
    p.clone().filter(p.var_ref().prop("Id").lt(int(100)))
}

#[test]
fn test_except_native_on_2012() {
    let query = Expr::scan(products()).except(cheap());
    let sql = query.to_sql_with_dialect(Dialect::Sql2012).unwrap();
    assert!(sql.contains(" EXCEPT SELECT "), "{}", sql);
}

#[test]
fn test_except_rewritten_on_2000() {
    let query = Expr::scan(products()).except(cheap());
    let sql = query.to_sql_with_dialect(Dialect::Sql2000).unwrap();
    assert!(!sql.contains("EXCEPT"), "{}", sql);
    assert!(sql.starts_with("SELECT DISTINCT "), "{}", sql);
    assert!(sql.contains("NOT (EXISTS ("), "{}", sql);
    assert!(sql.contains("IS NULL"), "{}", sql);
}

#[test]
fn test_intersect_rewritten_on_2000() {
    let query = Expr::scan(products()).intersect(cheap());
    let sql = query.to_sql_with_dialect(Dialect::Sql2000).unwrap();
    assert!(!sql.contains("INTERSECT"), "{}", sql);
    assert!(sql.starts_with("SELECT DISTINCT "), "{}", sql);
    assert!(sql.contains("EXISTS ("), "{}", sql);
    assert!(!sql.contains("NOT (EXISTS"), "{}", sql);
}

#[test]
fn test_skip_rewritten_on_2000() {
    let p = Expr::scan(products()).bind("p");
    let key = p.var_ref().prop("Id");
    let query = p.skip(vec![SortClause::asc(key)], int(10));
    let sql = query.to_sql_with_dialect(Dialect::Sql2000).unwrap();
    assert!(sql.contains("TOP 10 "), "{}", sql);
    assert!(sql.contains("NOT (EXISTS ("), "{}", sql);
    assert!(!sql.contains("OFFSET"), "{}", sql);
    assert!(!sql.contains("row_number"), "{}", sql);
}

#[test]
fn test_skip_over_computed_key_on_2000() {
    let p = Expr::scan(products()).bind("p");
    let key = p.var_ref().prop("Id").plus(int(1));
    let query = p.skip(vec![SortClause::asc(key)], int(3));

    let sql = query.to_sql_with_dialect(Dialect::Sql2000).unwrap();
    assert!(sql.contains("TOP 3 "), "{}", sql);
    assert!(sql.contains("NOT (EXISTS ("), "{}", sql);
    // whole rows are compared when the key is not a column
    assert!(sql.contains("[Name] IS NULL"), "{}", sql);
    assert!(sql.contains("[Price] IS NULL"), "{}", sql);
    assert!(!sql.contains("row_number"), "{}", sql);
}

#[test]
fn test_apply_rejected_on_2000() {
    let p = Expr::scan(products()).bind("p");
    let o = Expr::scan(orders()).bind("o");
    let matching = o
        .clone()
        .filter(o.var_ref().prop("ProductId").eq(p.var_ref().prop("Id")))
        .bind("m");
    let query = Expr::apply(ApplyKind::Cross, p, matching);

    let err = query.to_sql_with_dialect(Dialect::Sql2000).unwrap_err();
    assert!(matches!(err, CqtError::LegacyDialect(_)));
    assert_eq!(err.to_string(), "Not supported on the legacy dialect: APPLY");
}

#[test]
fn test_parameter_row_count_rejected_on_2000() {
    let query = Expr::scan(products()).limit(Expr::param("n", TypeUsage::int64()));
    assert!(query.to_sql_with_dialect(Dialect::Sql2005).is_ok());
    assert!(matches!(
        query.to_sql_with_dialect(Dialect::Sql2000),
        Err(CqtError::LegacyDialect(_))
    ));
}
