//! Compaction of `k = a OR k = b OR k IS NULL` into `k IN (a,b) OR k IS NULL`.

use crate::ast::{ComparisonOp, Expr, ExprKind};

/// Values found for one key, in discovery order. An `IsNull` node stands
/// for the `key IS NULL` branch.
#[derive(Debug)]
pub struct InGroup<'e> {
    pub key: &'e Expr,
    pub values: Vec<&'e Expr>,
}

impl<'e> InGroup<'e> {
    pub fn real_values(&self) -> impl Iterator<Item = &'e Expr> + '_ {
        self.values
            .iter()
            .copied()
            .filter(|v| !matches!(v.kind, ExprKind::IsNull(_)))
    }

    pub fn is_null_branch(&self) -> Option<&'e Expr> {
        self.values
            .iter()
            .copied()
            .find(|v| matches!(v.kind, ExprKind::IsNull(_)))
    }
}

fn is_key(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Property { .. } | ExprKind::VariableRef(_) | ExprKind::ParameterRef(_)
    )
}

/// Structural key equality. Only property chains, parameters, variables and
/// casts of those compare equal; everything else is distinct.
pub fn same_key(x: &Expr, y: &Expr) -> bool {
    match (&x.kind, &y.kind) {
        (
            ExprKind::Property { instance: a, name: n },
            ExprKind::Property { instance: b, name: m },
        ) => n == m && x.ty == y.ty && same_key(a, b),
        (ExprKind::ParameterRef(a), ExprKind::ParameterRef(b)) => a == b,
        (ExprKind::VariableRef(a), ExprKind::VariableRef(b)) => a == b,
        (ExprKind::Cast(a), ExprKind::Cast(b)) => x.ty == y.ty && same_key(a, b),
        _ => false,
    }
}

fn add<'e>(groups: &mut Vec<InGroup<'e>>, key: &'e Expr, value: &'e Expr) {
    match groups.iter_mut().find(|g| same_key(g.key, key)) {
        Some(group) => group.values.push(value),
        None => groups.push(InGroup {
            key,
            values: vec![value],
        }),
    }
}

fn collect<'e>(e: &'e Expr, groups: &mut Vec<InGroup<'e>>) -> bool {
    match &e.kind {
        ExprKind::Comparison {
            op: ComparisonOp::Equals,
            left,
            right,
        } => {
            if is_key(left) {
                add(groups, left, right);
                true
            } else if is_key(right) {
                add(groups, right, left);
                true
            } else {
                false
            }
        }
        ExprKind::IsNull(arg) if is_key(arg) => {
            add(groups, arg, e);
            true
        }
        ExprKind::Or(left, right) => collect(left, groups) && collect(right, groups),
        _ => false,
    }
}

/// Group the branches of a disjunction by key, or `None` if any branch is
/// not an equality or null test against a key.
pub fn build_in_map(e: &Expr) -> Option<Vec<InGroup<'_>>> {
    let mut groups = Vec::new();
    if collect(e, &mut groups) {
        Some(groups)
    } else {
        None
    }
}
