//! Server version specific output: TOP, paging and date/time text.

use chrono::NaiveDate;

use super::{int, products};
use crate::ast::{Expr, Function, PrimitiveKind, SortClause, TypeUsage};
use crate::transpiler::{Dialect, ToSql};

const COLUMNS: &str = "p.[Id] AS [Id], p.[Name] AS [Name], p.[Price] AS [Price]";

fn sorted_by(key: &str) -> Expr {
    let p = Expr::scan(products()).bind("p");
    let key = p.var_ref().prop(key);
    p.sort(vec![SortClause::asc(key)])
}

fn paged(skip: i32, take: i32) -> Expr {
    let p = Expr::scan(products()).bind("p");
    let key = p.var_ref().prop("Id");
    p.skip(vec![SortClause::asc(key)], int(skip)).limit(int(take))
}

#[test]
fn test_top_is_parenthesized_after_2000() {
    let query = sorted_by("Name").limit(int(5));
    assert_eq!(
        query.to_sql_with_dialect(Dialect::Sql2012).unwrap(),
        format!("SELECT TOP (5) {} FROM [dbo].[Products] AS p ORDER BY p.[Name] ASC", COLUMNS)
    );
    assert_eq!(
        query.to_sql_with_dialect(Dialect::Sql2000).unwrap(),
        format!("SELECT TOP 5 {} FROM [dbo].[Products] AS p ORDER BY p.[Name] ASC", COLUMNS)
    );
}

#[test]
fn test_top_with_ties() {
    let query = sorted_by("Price").limit_with_ties(int(3));
    let sql = query.to_sql().unwrap();
    assert!(sql.starts_with("SELECT TOP (3) WITH TIES p.[Id]"), "{}", sql);
}

#[test]
fn test_offset_fetch_on_2012() {
    assert_eq!(
        paged(10, 5).to_sql_with_dialect(Dialect::Sql2012).unwrap(),
        format!(
            "SELECT {} FROM [dbo].[Products] AS p ORDER BY p.[Id] ASC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY",
            COLUMNS
        )
    );
}

#[test]
fn test_skip_without_limit_on_2012() {
    let p = Expr::scan(products()).bind("p");
    let key = p.var_ref().prop("Id");
    let query = p.skip(vec![SortClause::asc(key)], int(20));
    let sql = query.to_sql().unwrap();
    assert!(sql.ends_with("ORDER BY p.[Id] ASC OFFSET 20 ROWS"), "{}", sql);
}

#[test]
fn test_row_number_paging_before_2012() {
    for dialect in [Dialect::Sql2005, Dialect::Sql2008] {
        let sql = paged(10, 5).to_sql_with_dialect(dialect).unwrap();
        assert!(sql.starts_with("SELECT TOP (5) "), "{}", sql);
        assert!(
            sql.contains("row_number() OVER (ORDER BY p.[Id] ASC) AS [row_number]"),
            "{}",
            sql
        );
        assert!(sql.contains("WHERE p.[row_number] > 10"), "{}", sql);
        assert!(!sql.contains("OFFSET"), "{}", sql);
    }
}

#[test]
fn test_row_number_paging_over_projection() {
    let p = Expr::scan(products()).bind("p");
    let projected = p
        .clone()
        .project(Expr::row(vec![
            ("row_number", p.var_ref().prop("Id")),
            ("Name", p.var_ref().prop("Name")),
        ]))
        .bind("q");
    let key = projected.var_ref().prop("row_number");
    let query = projected.skip(vec![SortClause::asc(key)], int(10));

    let sql = query.to_sql_with_dialect(Dialect::Sql2008).unwrap();
    // the projected column keeps its name, the paging column is renamed
    assert!(sql.contains(".[row_number] AS [row_number]"), "{}", sql);
    assert!(sql.contains(".[Name] AS [Name]"), "{}", sql);
    assert!(sql.contains(") AS [row_number1]"), "{}", sql);
    assert!(sql.contains(".[row_number1] > 10"), "{}", sql);
    assert!(!sql.contains("OFFSET"), "{}", sql);
}

#[test]
fn test_datetime_literal_precision() {
    let value = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    let e = Expr::constant(value);
    assert_eq!(
        e.to_sql_with_dialect(Dialect::Sql2008).unwrap(),
        "SELECT convert(datetime2, '2024-01-02 03:04:05.0000000', 121)"
    );
    assert_eq!(
        e.to_sql_with_dialect(Dialect::Sql2005).unwrap(),
        "SELECT convert(datetime, '2024-01-02 03:04:05.000', 121)"
    );
}

#[test]
fn test_current_datetime_function() {
    let now = Expr::call(
        Function::canonical("CurrentDateTime"),
        vec![],
        TypeUsage::primitive(PrimitiveKind::DateTime),
    );
    assert_eq!(now.to_sql_with_dialect(Dialect::Sql2005).unwrap(), "SELECT GetDate()");
    assert_eq!(now.to_sql_with_dialect(Dialect::Sql2012).unwrap(), "SELECT SysDateTime()");
}
