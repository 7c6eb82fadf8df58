//! Scalar expressions.

use crate::ast::{ArithmeticOp, ComparisonOp, Expr, ExprKind, Function, PrimitiveKind, TypeUsage, Value};
use crate::error::{CqtError, CqtResult};
use crate::transpiler::fragment::SqlBuilder;
use crate::transpiler::functions::{canonical_sql, store_sql, user_sql};
use crate::transpiler::in_compaction::{InGroup, build_in_map};
use crate::transpiler::literal::constant_sql;
use crate::transpiler::unicode;

use super::{Fragment, ScalarCtx, Translator};

fn is_string(e: &Expr) -> bool {
    e.ty.is_primitive_kind(PrimitiveKind::String)
}

/// Operands that never need parentheses.
fn is_atomic(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Constant(_) | ExprKind::ParameterRef(_) | ExprKind::Property { .. } | ExprKind::Cast(_)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    And,
    Or,
    Plus,
    Multiply,
    Other,
}

fn assoc_of(e: &Expr) -> Assoc {
    match &e.kind {
        ExprKind::And(..) => Assoc::And,
        ExprKind::Or(..) => Assoc::Or,
        ExprKind::Arithmetic {
            op: ArithmeticOp::Plus,
            args,
        } if args.len() == 2 => Assoc::Plus,
        ExprKind::Arithmetic {
            op: ArithmeticOp::Multiply,
            args,
        } if args.len() == 2 => Assoc::Multiply,
        _ => Assoc::Other,
    }
}

/// Leaves of a chain of the same associative operator as `e`.
fn flatten<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
    let assoc = assoc_of(e);
    flatten_same(e, assoc, out);
}

fn flatten_same<'e>(e: &'e Expr, assoc: Assoc, out: &mut Vec<&'e Expr>) {
    if assoc == Assoc::Other || assoc_of(e) != assoc {
        out.push(e);
        return;
    }
    match &e.kind {
        ExprKind::And(l, r) | ExprKind::Or(l, r) => {
            flatten_same(l, assoc, out);
            flatten_same(r, assoc, out);
        }
        ExprKind::Arithmetic { args, .. } => {
            for arg in args {
                flatten_same(arg, assoc, out);
            }
        }
        _ => out.push(e),
    }
}

impl Translator {
    pub(crate) fn constant(
        &mut self,
        e: &Expr,
        value: &Value,
        cast_optional: bool,
        ctx: ScalarCtx,
    ) -> CqtResult<SqlBuilder> {
        let sql = constant_sql(
            self.generator.as_ref(),
            self.dialect,
            value,
            &e.ty,
            cast_optional,
            ctx.force_non_unicode,
        )?;
        Ok(SqlBuilder::text(sql))
    }

    pub(crate) fn null(&mut self, e: &Expr) -> CqtResult<Fragment> {
        let ty = match e.ty.primitive_kind() {
            Some(PrimitiveKind::String) => "varchar(1)".to_string(),
            Some(PrimitiveKind::Binary) => "varbinary(1)".to_string(),
            Some(_) => self.sql_primitive_type(&e.ty)?,
            None => return Err(CqtError::unsupported(format!("null of type {}", e.ty.type_name()))),
        };
        Ok(Fragment::Sql(SqlBuilder::text(format!("CAST(NULL AS {})", ty))))
    }

    pub(crate) fn parameter(&mut self, name: &str, ctx: ScalarCtx) -> Fragment {
        if !ctx.ignore_param {
            self.unicode.record(name, ctx.force_non_unicode);
        }
        Fragment::Sql(SqlBuilder::text(self.generator.placeholder(name)))
    }

    pub(crate) fn variable(&mut self, name: &str) -> CqtResult<Fragment> {
        if self.set_var_ref_single(true) {
            return Err(CqtError::unsupported(format!(
                "variable reference '{}' outside of a property access",
                name
            )));
        }
        let symbol = self
            .symbol_table
            .lookup(name)
            .ok_or_else(|| CqtError::internal(format!("unresolved variable '{}'", name)))?;
        self.usage.mark_used(symbol);
        let current = self.current_statement()?;
        if !self.stmt(current).from_extents.contains(&symbol) {
            self.stmt_mut(current).add_outer_extent(symbol);
        }
        Ok(Fragment::Symbol(symbol))
    }

    /// Resolves record-valued members of joins through join symbols until a
    /// real alias and column are reached.
    pub(crate) fn property(&mut self, instance: &Expr, name: &str, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let fragment = self.visit(instance, ctx)?;
        if matches!(instance.kind, ExprKind::VariableRef(_)) {
            self.set_var_ref_single(false);
        }

        match fragment {
            Fragment::Symbol(symbol) => {
                let sym = self.symbols.get(symbol);
                if let Some(join) = sym.as_join() {
                    let extent = join
                        .name_to_extent
                        .get(name)
                        .ok_or_else(|| CqtError::internal(format!("join has no member '{}'", name)))?;
                    return Ok(if join.is_nested_join {
                        Fragment::Pair {
                            source: symbol,
                            column: extent,
                        }
                    } else {
                        Fragment::Symbol(extent)
                    });
                }

                let mut b = SqlBuilder::new();
                b.push_symbol(symbol);
                b.push_str(".");
                match sym.output_columns.get(name) {
                    Some(column) => {
                        let renamed = sym.output_columns_renamed;
                        self.usage.mark_used(column);
                        if renamed {
                            b.push_symbol(column);
                        } else {
                            b.push_str(self.generator.quote_identifier(name));
                        }
                    }
                    None => b.push_str(self.generator.quote_identifier(name)),
                }
                Ok(Fragment::Sql(b))
            }
            Fragment::Pair { source, column } => {
                let col = self.symbols.get(column);
                if let Some(join) = col.as_join() {
                    let extent = join
                        .name_to_extent
                        .get(name)
                        .ok_or_else(|| CqtError::internal(format!("join has no member '{}'", name)))?;
                    return Ok(Fragment::Pair { source, column: extent });
                }
                let mut b = SqlBuilder::new();
                b.push_symbol(source);
                b.push_str(".");
                match col.columns.get(name) {
                    Some(column_symbol) => {
                        self.usage.mark_used(column_symbol);
                        b.push_symbol(column_symbol);
                    }
                    None => b.push_str(self.generator.quote_identifier(name)),
                }
                Ok(Fragment::Sql(b))
            }
            other => {
                let mut b = self.into_builder(other)?;
                b.push_str(".");
                b.push_str(self.generator.quote_identifier(name));
                Ok(Fragment::Sql(b))
            }
        }
    }

    /// Visit, parenthesizing anything but constants, parameters, properties and casts.
    fn operand(&mut self, e: &Expr, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let sql = self.visit_sql(e, ctx)?;
        if is_atomic(e) {
            return Ok(sql);
        }
        let mut b = SqlBuilder::text("(");
        b.push_builder(sql);
        b.push_str(")");
        Ok(b)
    }

    fn join_operands(&mut self, operands: &[&Expr], op: &str, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let mut b = SqlBuilder::new();
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                b.push_str(op);
            }
            b.push_builder(self.operand(operand, ctx)?);
        }
        Ok(b)
    }

    /// `a OP b OP c` for AND, OR, + and * chains.
    pub(crate) fn associative(&mut self, e: &Expr, op: &str, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let mut operands = Vec::new();
        flatten(e, &mut operands);
        Ok(Fragment::Sql(self.join_operands(&operands, op, ctx)?))
    }

    pub(crate) fn arithmetic(&mut self, op: ArithmeticOp, args: &[Expr], ctx: ScalarCtx) -> CqtResult<Fragment> {
        let symbol = match op {
            ArithmeticOp::UnaryMinus => {
                let arg = args
                    .first()
                    .ok_or_else(|| CqtError::internal("unary minus without an argument"))?;
                let mut b = SqlBuilder::text("-(");
                b.push_builder(self.visit_sql(arg, ctx)?);
                b.push_str(")");
                return Ok(Fragment::Sql(b));
            }
            ArithmeticOp::Plus => " + ",
            ArithmeticOp::Minus => " - ",
            ArithmeticOp::Multiply => " * ",
            ArithmeticOp::Divide => " / ",
            ArithmeticOp::Modulo => " % ",
        };
        if args.len() != 2 {
            return Err(CqtError::internal("binary arithmetic needs two arguments"));
        }
        let assoc = match op {
            ArithmeticOp::Plus => Assoc::Plus,
            ArithmeticOp::Multiply => Assoc::Multiply,
            _ => Assoc::Other,
        };
        let mut operands = Vec::new();
        for arg in args {
            flatten_same(arg, assoc, &mut operands);
        }
        Ok(Fragment::Sql(self.join_operands(&operands, symbol, ctx)?))
    }

    pub(crate) fn comparison(
        &mut self,
        op: ComparisonOp,
        left: &Expr,
        right: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let ctx = if is_string(left) {
            ScalarCtx {
                force_non_unicode: unicode::comparison_forces(left, right),
                ..ctx
            }
        } else {
            ctx
        };
        Ok(Fragment::Sql(self.compare(op.sql(), left, right, ctx)?))
    }

    fn compare(&mut self, op: &str, left: &Expr, right: &Expr, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let cast_optional = left.ty.same_edm_type(&right.ty);
        let mut b = self.comparand(left, cast_optional, ctx)?;
        b.push_str(op);
        b.push_builder(self.comparand(right, cast_optional, ctx)?);
        Ok(b)
    }

    fn comparand(&mut self, e: &Expr, cast_optional: bool, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        match &e.kind {
            ExprKind::Constant(value) => self.constant(e, value, cast_optional, ctx),
            _ => self.operand(e, ctx),
        }
    }

    pub(crate) fn not(&mut self, arg: &Expr, ctx: ScalarCtx) -> CqtResult<Fragment> {
        match &arg.kind {
            ExprKind::Not(inner) => self.visit(inner, ctx),
            ExprKind::IsEmpty(inner) => self.is_empty(inner, true, ctx),
            ExprKind::IsNull(inner) => self.is_null(inner, true, ctx),
            ExprKind::Comparison {
                op: ComparisonOp::Equals,
                left,
                right,
            } => {
                let ctx = if is_string(left) {
                    ScalarCtx {
                        force_non_unicode: unicode::comparison_forces(left, right),
                        ..ctx
                    }
                } else {
                    ctx
                };
                Ok(Fragment::Sql(self.compare(" <> ", left, right, ctx)?))
            }
            _ => {
                let mut b = SqlBuilder::text("NOT (");
                b.push_builder(self.visit_sql(arg, ctx)?);
                b.push_str(")");
                Ok(Fragment::Sql(b))
            }
        }
    }

    pub(crate) fn is_null(&mut self, arg: &Expr, negate: bool, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let inner = if matches!(arg.kind, ExprKind::ParameterRef(_)) {
            ScalarCtx {
                ignore_param: true,
                ..ctx
            }
        } else {
            ctx
        };
        let mut b = self.visit_sql(arg, inner)?;
        b.push_str(if negate { " IS NOT NULL" } else { " IS NULL" });
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn like(
        &mut self,
        input: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let ctx = ScalarCtx {
            force_non_unicode: unicode::like_forces(input, pattern, escape),
            ..ctx
        };
        let mut b = self.visit_sql(input, ctx)?;
        b.push_str(" LIKE ");
        b.push_builder(self.visit_sql(pattern, ctx)?);
        if let Some(escape) = escape.filter(|e| !e.is_null_literal()) {
            b.push_str(" ESCAPE ");
            b.push_builder(self.visit_sql(escape, ctx)?);
        }
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn in_list(&mut self, item: &Expr, list: &[Expr], ctx: ScalarCtx) -> CqtResult<Fragment> {
        if list.is_empty() {
            return Ok(Fragment::Sql(SqlBuilder::text("1 = 0")));
        }
        let ctx = if is_string(item) {
            ScalarCtx {
                force_non_unicode: unicode::in_forces(item),
                ..ctx
            }
        } else {
            ctx
        };
        let mut b = self.visit_sql(item, ctx)?;
        b.push_str(" IN (");
        for (i, value) in list.iter().enumerate() {
            if i > 0 {
                b.push_str(", ");
            }
            b.push_builder(self.visit_sql(value, ctx)?);
        }
        b.push_str(")");
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn or(&mut self, e: &Expr, ctx: ScalarCtx) -> CqtResult<Fragment> {
        match build_in_map(e) {
            Some(groups) => Ok(Fragment::Sql(self.compacted_in(&groups, ctx)?)),
            None => self.associative(e, " OR ", ctx),
        }
    }

    fn compacted_in(&mut self, groups: &[InGroup<'_>], ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let mut b = SqlBuilder::new();
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                b.push_str(" OR ");
            }
            let key = group.key;
            let values: Vec<&Expr> = group.real_values().collect();

            let mut force_values = false;
            let mut force_key = false;
            if is_string(key) {
                force_values = unicode::is_non_unicode_source(key);
                force_key = !force_values
                    && unicode::is_unspecified_target(key)
                    && values.iter().all(|v| unicode::is_non_unicode_source(v));
            }

            if !values.is_empty() {
                b.push_builder(self.operand(key, ctx.forcing(force_key))?);
                if values.len() == 1 {
                    b.push_str(" = ");
                } else {
                    b.push_str(" IN (");
                }
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        b.push_str(",");
                    }
                    let same_type = key.ty.same_edm_type(&value.ty);
                    let value_ctx = ctx.forcing(force_values && unicode::is_unspecified_target(value));
                    b.push_builder(self.comparand(value, same_type, value_ctx)?);
                }
                if values.len() > 1 {
                    b.push_str(")");
                }
            }

            if let Some(ExprKind::IsNull(arg)) = group.is_null_branch().map(|n| &n.kind) {
                if !values.is_empty() {
                    b.push_str(" OR ");
                }
                let null_test = self.is_null(arg, false, ctx)?;
                b.push_builder(self.into_builder(null_test)?);
            }
        }
        Ok(b)
    }

    pub(crate) fn case(
        &mut self,
        whens: &[Expr],
        thens: &[Expr],
        otherwise: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        if whens.len() != thens.len() {
            return Err(CqtError::internal("CASE with unequal WHEN and THEN counts"));
        }
        let mut b = SqlBuilder::text("CASE");
        for (when, then) in whens.iter().zip(thens) {
            b.push_str(" WHEN (");
            b.push_builder(self.visit_sql(when, ctx)?);
            b.push_str(") THEN ");
            b.push_builder(self.visit_sql(then, ctx)?);
        }
        if !otherwise.is_null_literal() {
            b.push_str(" ELSE ");
            b.push_builder(self.visit_sql(otherwise, ctx)?);
        }
        b.push_str(" END");
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn cast(&mut self, arg: &Expr, ty: &TypeUsage, ctx: ScalarCtx) -> CqtResult<Fragment> {
        if ty.is_spatial() {
            return self.visit(arg, ctx);
        }
        let mut b = SqlBuilder::text("CAST(");
        b.push_builder(self.visit_sql(arg, ctx)?);
        b.push_str(format!(" AS {})", self.sql_primitive_type(ty)?));
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn function(
        &mut self,
        function: &Function,
        args: &[Expr],
        _ty: &TypeUsage,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let mut translated = Vec::with_capacity(args.len());
        for arg in args {
            translated.push(self.visit_sql(arg, ctx)?);
        }
        let sql = if function.is_canonical() {
            canonical_sql(self.dialect, &function.name, translated)?
        } else if function.built_in {
            store_sql(function, translated)
        } else {
            user_sql(self.generator.as_ref(), function, translated)
        };
        Ok(Fragment::Sql(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i32) -> Expr {
        Expr::new(ExprKind::Constant(Value::Int32(n)), TypeUsage::int32())
    }

    fn plus(a: Expr, b: Expr) -> Expr {
        Expr::new(
            ExprKind::Arithmetic {
                op: ArithmeticOp::Plus,
                args: vec![a, b],
            },
            TypeUsage::int32(),
        )
    }

    fn and(a: Expr, b: Expr) -> Expr {
        Expr::new(ExprKind::And(Box::new(a), Box::new(b)), TypeUsage::boolean())
    }

    #[test]
    fn test_flatten_same_operator_only() {
        let e = plus(plus(int(1), int(2)), int(3));
        let mut out = Vec::new();
        flatten(&e, &mut out);
        assert_eq!(out.len(), 3);

        let mixed = and(plus(int(1), int(2)), and(int(3), int(4)));
        let mut out = Vec::new();
        flatten(&mixed, &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_atomic_operands() {
        assert!(is_atomic(&int(1)));
        assert!(!is_atomic(&plus(int(1), int(2))));
    }
}
