use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::ast::{EdmType, Expr, ExprBinding, ExprKind, SetOpKind, SortClause, TypeUsage};
use crate::error::{CqtError, CqtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Except,
    Intersect,
    Skip,
}

/// Sort keys a SKIP rewrite compares on, and the variable they range over.
struct SortKeys<'a> {
    keys: Vec<&'a Expr>,
    var: &'a str,
}

/// Rewrite every EXCEPT, INTERSECT and SKIP in `e`.
///
/// * `A EXCEPT B` becomes `Filter(A, NOT ANY(B, eq))` with DISTINCT.
/// * `A INTERSECT B` becomes `Filter(A, ANY(B, eq))` with DISTINCT.
/// * `Skip(A, keys, n)` becomes the rows of `A` not in `TOP (n) A ORDER BY keys`,
///   sorted by `keys`, compared on the key columns only.
///
/// `eq` is a null-aware equality over every primitive leaf of the row.
pub fn rewrite(e: &Expr) -> CqtResult<Expr> {
    let mut out = e.clone();
    let mut rewriter = Rewriter {
        taken: e.bound_variables().into_iter().map(String::from).collect(),
        next: 0,
    };
    rewriter.rewrite(&mut out)?;
    Ok(out)
}

struct Rewriter {
    taken: HashSet<String>,
    next: usize,
}

impl Rewriter {
    fn fresh(&mut self) -> String {
        loop {
            let name = format!("Var_{}", self.next);
            self.next += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    fn rewrite(&mut self, e: &mut Expr) -> CqtResult<()> {
        for child in e.children_mut() {
            self.rewrite(child)?;
        }
        let replacement = match &e.kind {
            ExprKind::SetOp {
                op: SetOpKind::Except,
                left,
                right,
            } => Some(self.filter_by_quantifier((**left).clone(), (**right).clone(), Mode::Except, None)?),
            ExprKind::SetOp {
                op: SetOpKind::Intersect,
                left,
                right,
            } => Some(self.filter_by_quantifier((**left).clone(), (**right).clone(), Mode::Intersect, None)?),
            ExprKind::Skip { input, keys, count } => Some(self.skip(input, keys, count)?),
            _ => None,
        };
        if let Some(replacement) = replacement {
            trace!(kind = e.kind_name(), "rewrote for the legacy dialect");
            *e = replacement;
        }
        Ok(())
    }

    fn skip(&mut self, input: &ExprBinding, keys: &[SortClause], count: &Expr) -> CqtResult<Expr> {
        let first_rows = input.clone().sort(keys.to_vec()).limit(count.clone());
        let all_rows = (*input.expr).clone();
        // a computed key has no column to compare on, so every column is compared
        let sort_keys = keys
            .iter()
            .all(|k| is_property_chain(&k.expr, &input.var))
            .then(|| SortKeys {
                keys: keys.iter().map(|k| &k.expr).collect(),
                var: &input.var,
            });
        if sort_keys.is_none() {
            trace!(var = %input.var, "skip over a computed sort key compares whole rows");
        }
        let remaining = self.filter_by_quantifier(all_rows, first_rows, Mode::Skip, sort_keys)?;
        Ok(remaining.bind(input.var.clone()).sort(keys.to_vec()))
    }

    fn filter_by_quantifier(
        &mut self,
        left: Expr,
        right: Expr,
        mode: Mode,
        sort_keys: Option<SortKeys<'_>>,
    ) -> CqtResult<Expr> {
        let left = left.bind(self.fresh());
        let mut right = right.bind(self.fresh());

        let mut left_props = Vec::new();
        let mut right_props = Vec::new();
        flatten_properties(left.var_ref(), &mut left_props)?;
        flatten_properties(right.var_ref(), &mut right_props)?;

        if let Some(sort_keys) = sort_keys {
            if remove_non_sort_properties(&mut left_props, &mut right_props, sort_keys, &left.var) {
                right = self.cap_with_project(right, &mut right_props)?;
            }
        }

        if left_props.len() != right_props.len() || left_props.is_empty() {
            return Err(CqtError::internal(format!(
                "set operation inputs have {} and {} comparable columns",
                left_props.len(),
                right_props.len()
            )));
        }

        let mut predicate: Option<Expr> = None;
        for (l, r) in left_props.into_iter().zip(right_props) {
            let both_null = l.clone().is_null().and(r.clone().is_null());
            let same = l.eq(r).or(both_null);
            predicate = Some(match predicate {
                Some(p) => p.and(same),
                None => same,
            });
        }
        let predicate = predicate.ok_or_else(|| CqtError::internal("empty comparison predicate"))?;

        let quantifier = right.any(predicate);
        let filter_predicate = match mode {
            Mode::Except | Mode::Skip => quantifier.not(),
            Mode::Intersect => quantifier,
        };
        let filtered = left.filter(filter_predicate);
        Ok(match mode {
            Mode::Except | Mode::Intersect => filtered.distinct(),
            Mode::Skip => filtered,
        })
    }

    /// Project the right input down to the compared columns, so columns that
    /// cannot be compared (large objects) stay out of the predicate.
    fn cap_with_project(&mut self, input: ExprBinding, props: &mut Vec<Expr>) -> CqtResult<ExprBinding> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut columns: Vec<(String, Expr)> = Vec::with_capacity(props.len());
        for prop in props.iter() {
            let ExprKind::Property { name, .. } = &prop.kind else {
                return Err(CqtError::internal("flattened column is not a property"));
            };
            let mut name = name.clone();
            if let Some(&last) = seen.get(&name) {
                let mut i = last;
                let renamed = loop {
                    i += 1;
                    let candidate = format!("{}{}", name, i);
                    if !seen.contains_key(&candidate) {
                        break candidate;
                    }
                };
                seen.insert(name, i);
                name = renamed;
            }
            seen.insert(name.clone(), 0);
            columns.push((name, prop.clone()));
        }

        let row = Expr::row(columns.iter().map(|(n, e)| (n.as_str(), e.clone())).collect());
        let capped = input.project(row).bind(self.fresh());
        let var = capped.var_ref();
        *props = columns
            .into_iter()
            .map(|(name, e)| property(var.clone(), &name, e.ty))
            .collect();
        Ok(capped)
    }
}

fn property(instance: Expr, name: &str, ty: TypeUsage) -> Expr {
    Expr::new(
        ExprKind::Property {
            instance: Box::new(instance),
            name: name.to_string(),
        },
        ty,
    )
}

/// Every primitive leaf reachable from `input` through row and entity members.
fn flatten_properties(input: Expr, out: &mut Vec<Expr>) -> CqtResult<()> {
    let members = input.ty.properties().to_vec();
    if members.is_empty() {
        return Err(CqtError::unsupported(format!(
            "set operation over values of type {}",
            input.ty.type_name()
        )));
    }
    for member in members {
        let prop = property(input.clone(), &member.name, member.ty.clone());
        match &member.ty.edm {
            EdmType::Primitive(_) => out.push(prop),
            EdmType::Row(_) | EdmType::Entity(_) => flatten_properties(prop, out)?,
            _ => {
                return Err(CqtError::unsupported(format!(
                    "set operation over member '{}' of type {}",
                    member.name,
                    member.ty.type_name()
                )));
            }
        }
    }
    Ok(())
}

/// Drop column pairs whose left column is not a sort key. Each sort key
/// matches at most one column.
fn remove_non_sort_properties(
    left: &mut Vec<Expr>,
    right: &mut Vec<Expr>,
    sort_keys: SortKeys<'_>,
    left_var: &str,
) -> bool {
    let mut keys = sort_keys.keys;
    let mut removed = false;
    for i in (0..left.len()).rev() {
        let matched = keys
            .iter()
            .position(|k| are_matching(&left[i], k, left_var, sort_keys.var));
        match matched {
            Some(pos) => {
                keys.remove(pos);
            }
            None => {
                left.remove(i);
                right.remove(i);
                removed = true;
            }
        }
    }
    removed
}

/// A primitive-typed property path rooted at `var`.
fn is_property_chain(e: &Expr, var: &str) -> bool {
    fn rooted(e: &Expr, var: &str) -> bool {
        match &e.kind {
            ExprKind::Property { instance, .. } => rooted(instance, var),
            ExprKind::VariableRef(v) => v == var,
            _ => false,
        }
    }
    matches!(e.ty.edm, EdmType::Primitive(_))
        && matches!(&e.kind, ExprKind::Property { instance, .. } if rooted(instance, var))
}

/// Same property path, each rooted at its own variable.
fn are_matching(a: &Expr, b: &Expr, a_var: &str, b_var: &str) -> bool {
    match (&a.kind, &b.kind) {
        (
            ExprKind::Property { instance: ai, name: an },
            ExprKind::Property { instance: bi, name: bn },
        ) => an == bn && are_matching(ai, bi, a_var, b_var),
        (ExprKind::VariableRef(av), ExprKind::VariableRef(bv)) => av == a_var && bv == b_var,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EntitySet, EntityType, Member, QuantifierKind};
    use crate::transpiler::legacy::needs_rewrite;

    fn products() -> Expr {
        Expr::scan(EntitySet::new(
            "Products",
            EntityType {
                name: "Product".into(),
                members: vec![
                    Member::new("Id", TypeUsage::int32()),
                    Member::new("Name", TypeUsage::string()),
                    Member::new("Photo", TypeUsage::primitive(crate::ast::PrimitiveKind::Binary)),
                ],
                keys: vec!["Id".into()],
            },
        ))
    }

    #[test]
    fn test_except_becomes_distinct_not_any() {
        let rewritten = rewrite(&products().except(products())).unwrap();
        let ExprKind::Distinct(inner) = &rewritten.kind else {
            panic!("expected Distinct, got {}", rewritten.kind_name());
        };
        let ExprKind::Filter { input, predicate } = &inner.kind else {
            panic!("expected Filter");
        };
        assert_eq!(input.var, "Var_0");
        let ExprKind::Not(q) = &predicate.kind else {
            panic!("expected Not");
        };
        let ExprKind::Quantifier { kind, input, predicate } = &q.kind else {
            panic!("expected Quantifier");
        };
        assert_eq!(*kind, QuantifierKind::Any);
        assert_eq!(input.var, "Var_1");
        // three columns, each `l = r OR (l IS NULL AND r IS NULL)`, joined by AND
        let mut ors = 0;
        let mut stack = vec![predicate.as_ref()];
        while let Some(e) = stack.pop() {
            match &e.kind {
                ExprKind::And(l, r) => {
                    stack.push(l);
                    stack.push(r);
                }
                ExprKind::Or(..) => ors += 1,
                other => panic!("unexpected {}", other.name()),
            }
        }
        assert_eq!(ors, 3);
        assert!(!needs_rewrite(&rewritten).unwrap());
    }

    #[test]
    fn test_intersect_keeps_positive_quantifier() {
        let rewritten = rewrite(&products().intersect(products())).unwrap();
        let ExprKind::Distinct(inner) = &rewritten.kind else {
            panic!("expected Distinct");
        };
        let ExprKind::Filter { predicate, .. } = &inner.kind else {
            panic!("expected Filter");
        };
        assert!(matches!(predicate.kind, ExprKind::Quantifier { .. }));
    }

    #[test]
    fn test_skip_compares_sort_keys_only() {
        let b = products().bind("p");
        let keys = vec![SortClause::asc(b.var_ref().prop("Id"))];
        let rewritten = rewrite(&b.skip(keys, Expr::constant(10))).unwrap();

        let ExprKind::Sort { input, keys } = &rewritten.kind else {
            panic!("expected Sort, got {}", rewritten.kind_name());
        };
        assert_eq!(input.var, "p");
        assert_eq!(keys.len(), 1);

        let ExprKind::Filter { predicate, .. } = &input.expr.kind else {
            panic!("expected Filter");
        };
        let ExprKind::Not(q) = &predicate.kind else {
            panic!("expected Not");
        };
        let ExprKind::Quantifier { input, predicate, .. } = &q.kind else {
            panic!("expected Quantifier");
        };
        // the TOP input is capped with a projection of the key column
        let ExprKind::Project { input: capped, .. } = &input.expr.kind else {
            panic!("expected Project");
        };
        assert!(matches!(capped.expr.kind, ExprKind::Limit { .. }));
        assert_eq!(input.var_type().properties().len(), 1);
        assert!(matches!(predicate.kind, ExprKind::Or(..)));
        assert!(!needs_rewrite(&rewritten).unwrap());
    }

    #[test]
    fn test_skip_over_computed_key_compares_every_column() {
        let b = products().bind("p");
        let keys = vec![SortClause::asc(b.var_ref().prop("Id").plus(Expr::constant(1)))];
        let rewritten = rewrite(&b.skip(keys, Expr::constant(3))).unwrap();

        let ExprKind::Sort { input, .. } = &rewritten.kind else {
            panic!("expected Sort, got {}", rewritten.kind_name());
        };
        let ExprKind::Filter { predicate, .. } = &input.expr.kind else {
            panic!("expected Filter");
        };
        let ExprKind::Not(q) = &predicate.kind else {
            panic!("expected Not");
        };
        let ExprKind::Quantifier { input, .. } = &q.kind else {
            panic!("expected Quantifier");
        };
        // no projection cap: the TOP input is compared on all three columns
        assert!(matches!(input.expr.kind, ExprKind::Limit { .. }));
        assert_eq!(input.var_type().properties().len(), 3);
    }

    #[test]
    fn test_property_chain_detection() {
        let p = Expr::var("p", products().ty.element_type().clone());
        assert!(is_property_chain(&p.clone().prop("Id"), "p"));
        assert!(!is_property_chain(&p.clone().prop("Id"), "q"));
        assert!(!is_property_chain(&p, "p"));
        assert!(!is_property_chain(&p.prop("Id").plus(Expr::constant(1)), "p"));
    }

    #[test]
    fn test_fresh_names_avoid_existing_variables() {
        let b = products().bind("Var_0");
        let left = b.clone().filter(b.var_ref().prop("Id").gt(Expr::constant(3)));
        let rewritten = rewrite(&left.except(products())).unwrap();
        let ExprKind::Distinct(inner) = &rewritten.kind else {
            panic!("expected Distinct");
        };
        let ExprKind::Filter { input, .. } = &inner.kind else {
            panic!("expected Filter");
        };
        assert_eq!(input.var, "Var_1");
    }

    #[test]
    fn test_are_matching_requires_both_roots() {
        let a = Expr::var("a", products().ty.element_type().clone()).prop("Id");
        let b = Expr::var("b", products().ty.element_type().clone()).prop("Id");
        assert!(are_matching(&a, &b, "a", "b"));
        assert!(!are_matching(&a, &b, "a", "c"));
        let name = Expr::var("b", products().ty.element_type().clone()).prop("Name");
        assert!(!are_matching(&a, &name, "a", "b"));
    }
}
