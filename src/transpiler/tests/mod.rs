//! Transpiler test modules.
//!
//! Tests are organized by category:
//! - `core`: filter, project, join, group by and scalar translation
//! - `dialects`: paging and TOP differences between server versions
//! - `legacy`: EXCEPT, INTERSECT and SKIP rewrites for SQL Server 2000
//! - `dml`: insert, update, delete and batches

mod dialects;
mod dml;
mod legacy;

use crate::ast::{EntitySet, EntityType, Expr, Member, TypeUsage};

pub(super) fn products() -> EntitySet {
    EntitySet::new(
        "Products",
        EntityType {
            name: "Product".into(),
            members: vec![
                Member::new("Id", TypeUsage::int32()),
                Member::new("Name", TypeUsage::string()),
                Member::new("Price", TypeUsage::decimal(18, 2)),
            ],
            keys: vec!["Id".into()],
        },
    )
}

pub(super) fn orders() -> EntitySet {
    EntitySet::new(
        "Orders",
        EntityType {
            name: "Order".into(),
            members: vec![
                Member::new("Id", TypeUsage::int32()).identity(),
                Member::new("ProductId", TypeUsage::int32()),
                Member::new("CustomerId", TypeUsage::int32()),
                Member::new("Qty", TypeUsage::int32()),
            ],
            keys: vec!["Id".into()],
        },
    )
}

pub(super) fn customers() -> EntitySet {
    EntitySet::new(
        "Customers",
        EntityType {
            name: "Customer".into(),
            members: vec![
                Member::new("Id", TypeUsage::int32()),
                Member::new("Code", TypeUsage::ansi_string(10)),
            ],
            keys: vec!["Id".into()],
        },
    )
}

pub(super) fn int(n: i32) -> Expr {
    Expr::constant(n)
}
