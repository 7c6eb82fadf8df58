//! Whether an operator may extend the statement its input produced.

use super::fragment::SelectStatement;

/// Relational operators that consult the fusion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionOp {
    Distinct,
    Filter,
    GroupBy,
    Limit,
    Element,
    Project,
    Skip,
    Sort,
}

/// The parts of a statement the policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatementShape {
    pub has_select: bool,
    pub has_where: bool,
    pub has_group_by: bool,
    pub has_order_by: bool,
    pub has_top: bool,
    pub has_skip: bool,
    pub distinct: bool,
}

impl StatementShape {
    pub fn of(stmt: &SelectStatement) -> Self {
        Self {
            has_select: !stmt.select.is_empty(),
            has_where: !stmt.where_clause.is_empty(),
            has_group_by: !stmt.group_by.is_empty(),
            has_order_by: !stmt.order_by.is_empty(),
            has_top: stmt.select.top.is_some(),
            has_skip: stmt.select.skip.is_some(),
            distinct: stmt.select.distinct,
        }
    }
}

pub fn is_compatible_shape(s: StatementShape, op: FusionOp) -> bool {
    match op {
        FusionOp::Distinct => !s.has_top && !s.has_skip && !s.has_order_by,
        FusionOp::Filter => {
            !s.has_select && !s.has_where && !s.has_group_by && !s.has_top && !s.has_skip
        }
        FusionOp::GroupBy => {
            !s.has_select
                && !s.has_group_by
                && !s.has_order_by
                && !s.has_top
                && !s.has_skip
                && !s.distinct
        }
        FusionOp::Limit | FusionOp::Element => !s.has_top,
        FusionOp::Project => !s.has_select && !s.has_group_by && !s.distinct,
        FusionOp::Skip => {
            !s.has_select && !s.has_skip && !s.has_group_by && !s.has_order_by && !s.distinct
        }
        FusionOp::Sort => !s.has_select && !s.has_group_by && !s.has_order_by && !s.distinct,
    }
}

pub fn is_compatible(stmt: &SelectStatement, op: FusionOp) -> bool {
    is_compatible_shape(StatementShape::of(stmt), op)
}
