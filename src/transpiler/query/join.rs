//! Join and apply translation with left-spine flattening.
//!
//! A join visits its inputs under a join context. Scans and a left-most
//! nested join add themselves straight into the parent's FROM clause, so
//! `(a JOIN b) JOIN c` becomes one FROM with three extents. Any other input
//! becomes a derived table.

use tracing::trace;

use crate::ast::{Expr, ExprBinding};
use crate::error::CqtResult;
use crate::transpiler::fragment::{SelectStatement, SqlBuilder, StmtId};
use crate::transpiler::symbol::{Symbol, SymbolId};

use super::{Fragment, ScalarCtx, Translator};

impl Translator {
    pub(crate) fn join(
        &mut self,
        inputs: &[&ExprBinding],
        keyword: &str,
        condition: Option<&Expr>,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let owns_statement = !self.is_parent_a_join();
        let stmt = if owns_statement {
            let id = self.alloc_statement(SelectStatement {
                all_join_extents: Some(Vec::new()),
                ..SelectStatement::default()
            });
            self.push_statement(id);
            id
        } else {
            self.current_statement()?
        };

        self.symbol_table.enter_scope();
        for (i, input) in inputs.iter().enumerate() {
            if i > 0 {
                let from = &mut self.stmt_mut(stmt).from;
                from.push_str(" ");
                from.push_str(keyword);
                from.push_str(" ");
            }
            let leftmost = i == 0;
            let needs_join_context =
                input.expr.is_scan() || (leftmost && (input.expr.is_join() || input.expr.is_apply()));

            self.push_join_context(needs_join_context);
            let start = self.stmt(stmt).from_extents.len();
            let fragment = self.visit(&input.expr, ctx);
            self.pop_join_context()?;
            self.join_input_result(fragment?, stmt, input, start)?;
        }

        if let Some(condition) = condition {
            self.stmt_mut(stmt).from.push_str(" ON ");
            self.push_join_context(false);
            let on = self.visit_sql(condition, ctx);
            self.pop_join_context()?;
            self.stmt_mut(stmt).from.push_builder(on?);
        }

        self.exit_scope()?;
        if owns_statement {
            self.pop_statement()?;
        }
        Ok(Fragment::Statement(stmt))
    }

    fn join_input_result(
        &mut self,
        fragment: Fragment,
        result: StmtId,
        input: &ExprBinding,
        start: usize,
    ) -> CqtResult<()> {
        let var = input.var.as_str();
        let ty = input.var_type().clone();

        if let Fragment::Statement(child) = fragment {
            if child == result {
                // extents were merged into this statement; stand them in with one join symbol
                let merged: Vec<SymbolId> = self.stmt_mut(result).from_extents.drain(start..).collect();
                trace!(var, extents = merged.len(), "flattened join input");
                let join = self.alloc_join_symbol(var, Some(ty), merged);
                self.stmt_mut(result).from_extents.push(join);
                self.symbol_table.add(var, join);
                return Ok(());
            }
        }

        let mut from_symbol = None;
        match fragment {
            Fragment::Statement(child) => {
                if self.stmt(child).select.is_empty() {
                    let columns = self.add_default_columns(child)?;
                    if input.expr.is_join() || input.expr.is_apply() {
                        let extents = self.stmt(child).from_extents.clone();
                        let join = self.alloc_join_symbol(var, Some(ty.clone()), extents);
                        if let Some(j) = self.symbols.get_mut(join).as_join_mut() {
                            j.is_nested_join = true;
                            j.column_list = columns;
                        }
                        from_symbol = Some(join);
                    } else {
                        let first = self.stmt(child).from_extents.first().copied();
                        if let Some(first) = first {
                            from_symbol = self.nested_join_symbol(first, var, &ty, columns);
                        }
                    }
                }
                if from_symbol.is_none() {
                    let child_stmt = self.stmt(child);
                    let symbol = Symbol::with_output(
                        var,
                        Some(ty.clone()),
                        child_stmt.output_columns.clone().unwrap_or_default(),
                        child_stmt.output_columns_renamed,
                    );
                    from_symbol = Some(self.alloc_symbol(symbol));
                }
                let from = &mut self.stmt_mut(result).from;
                from.push_str("(");
                from.push_statement(child);
                from.push_str(")");
            }
            other if input.expr.is_scan() => {
                let sql = self.into_builder(other)?;
                self.stmt_mut(result).from.push_builder(sql);
            }
            other => {
                let sql = self.into_builder(other)?;
                let mut wrapped = SqlBuilder::new();
                if matches!(input.expr.kind, crate::ast::ExprKind::Function { .. }) {
                    wrapped.push_builder(sql);
                } else {
                    wrapped.push_str("(");
                    wrapped.push_builder(sql);
                    wrapped.push_str(")");
                }
                self.stmt_mut(result).from.push_builder(wrapped);
            }
        }

        let from_symbol = match from_symbol {
            Some(symbol) => symbol,
            None => self.alloc_symbol(Symbol::new(var, Some(ty))),
        };
        self.add_from_symbol(result, var, from_symbol, true);
        self.stmt_mut(result)
            .all_join_extents
            .get_or_insert_with(Vec::new)
            .push(from_symbol);
        Ok(())
    }
}
