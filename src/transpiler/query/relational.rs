//! Relational operators: each either extends its input statement or wraps it
//! as a derived table, as decided by the fusion policy.

use tracing::trace;

use crate::ast::{
    Aggregate, EntitySet, Expr, ExprBinding, ExprKind, GroupBinding, QuantifierKind, SetOpKind,
    SortClause, TypeUsage,
};
use crate::error::{CqtError, CqtResult};
use crate::transpiler::fragment::{SelectStatement, SqlBuilder, StmtId, TopClause};
use crate::transpiler::functions::aggregate_name;
use crate::transpiler::fusion::{FusionOp, is_compatible};
use crate::transpiler::symbol::{ColumnMap, Symbol, SymbolId};

use super::{Fragment, ScalarCtx, Translator};

impl Translator {
    pub(crate) fn scan(&mut self, set: &EntitySet) -> Fragment {
        let text = self.target_sql(set);
        if self.is_parent_a_join() {
            Fragment::Sql(SqlBuilder::text(text))
        } else {
            let stmt = SelectStatement {
                from: SqlBuilder::text(text),
                ..SelectStatement::default()
            };
            Fragment::Statement(self.alloc_statement(stmt))
        }
    }

    /// `[schema].[table]`, or the defining query in parentheses.
    pub(crate) fn target_sql(&self, set: &EntitySet) -> String {
        if let Some(query) = &set.defining_query {
            return format!("({})", query);
        }
        let schema = set
            .schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&set.container);
        let table = set
            .table
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&set.name);
        format!(
            "{}.{}",
            self.generator.quote_identifier(schema),
            self.generator.quote_identifier(table)
        )
    }

    /// Visit a relational input and make sure the result is a statement with
    /// a single FROM symbol standing for `var`.
    pub(crate) fn visit_input(
        &mut self,
        input: &Expr,
        var: &str,
        ty: &TypeUsage,
        ctx: ScalarCtx,
    ) -> CqtResult<(StmtId, SymbolId)> {
        let fragment = self.visit(input, ctx)?;
        let stmt = match fragment {
            Fragment::Statement(id) => id,
            other => {
                let sql = self.into_builder(other)?;
                let mut from = SqlBuilder::new();
                if matches!(input.kind, ExprKind::Function { .. }) {
                    from.push_builder(sql);
                } else {
                    from.push_str("(");
                    from.push_builder(sql);
                    from.push_str(")");
                }
                self.alloc_statement(SelectStatement {
                    from,
                    ..SelectStatement::default()
                })
            }
        };

        let extents = self.stmt(stmt).from_extents.clone();
        let from_symbol = match extents.len() {
            0 => self.alloc_symbol(Symbol::new(var, Some(ty.clone()))),
            1 => extents[0],
            _ => {
                let join = self.alloc_join_symbol(var, Some(ty.clone()), extents);
                let flattened = self.stmt(stmt).all_join_extents.clone().unwrap_or_default();
                if let Some(j) = self.symbols.get_mut(join).as_join_mut() {
                    j.flattened_extent_list = flattened;
                }
                self.stmt_mut(stmt).from_extents = vec![join];
                join
            }
        };
        Ok((stmt, from_symbol))
    }

    /// Visit a binding's input, wrapping it when `op` cannot extend it.
    fn visit_binding_input(
        &mut self,
        binding: &ExprBinding,
        op: FusionOp,
        ctx: ScalarCtx,
    ) -> CqtResult<(StmtId, SymbolId)> {
        let ty = binding.var_type().clone();
        let (stmt, from_symbol) = self.visit_input(&binding.expr, &binding.var, &ty, ctx)?;
        if is_compatible(self.stmt(stmt), op) {
            Ok((stmt, from_symbol))
        } else {
            self.create_new_select_statement(stmt, &binding.var, &ty, true)
        }
    }

    /// Wrap `old` as a derived table of a fresh statement.
    pub(crate) fn create_new_select_statement(
        &mut self,
        old: StmtId,
        var: &str,
        ty: &TypeUsage,
        finalize: bool,
    ) -> CqtResult<(StmtId, SymbolId)> {
        trace!(var, finalize, "wrapping statement as derived table");
        let mut from_symbol = None;
        if finalize && self.stmt(old).select.is_empty() {
            let columns = self.add_default_columns(old)?;
            let first = self.stmt(old).from_extents.first().copied();
            if let Some(first) = first {
                from_symbol = self.nested_join_symbol(first, var, ty, columns);
            }
        }
        let from_symbol = match from_symbol {
            Some(symbol) => symbol,
            None => {
                let old_stmt = self.stmt(old);
                let symbol = Symbol::with_output(
                    var,
                    Some(ty.clone()),
                    old_stmt.output_columns.clone().unwrap_or_default(),
                    old_stmt.output_columns_renamed,
                );
                self.alloc_symbol(symbol)
            }
        };

        let mut from = SqlBuilder::text("(");
        from.push_statement(old);
        from.push_str(")");
        let stmt = self.alloc_statement(SelectStatement {
            from,
            ..SelectStatement::default()
        });
        Ok((stmt, from_symbol))
    }

    /// If `extent` is a join, a nested copy of it that exposes `columns`.
    pub(crate) fn nested_join_symbol(
        &mut self,
        extent: SymbolId,
        var: &str,
        ty: &TypeUsage,
        columns: Vec<SymbolId>,
    ) -> Option<SymbolId> {
        let old = self.symbols.get(extent).as_join()?.clone();
        let join = self.alloc_join_symbol(var, Some(ty.clone()), old.extent_list);
        if let Some(j) = self.symbols.get_mut(join).as_join_mut() {
            j.is_nested_join = true;
            j.column_list = columns;
            j.flattened_extent_list = old.flattened_extent_list;
        }
        Some(join)
    }

    /// Append ` AS symbol` to FROM unless the symbol is already there.
    pub(crate) fn add_from_symbol(
        &mut self,
        stmt: StmtId,
        var: &str,
        symbol: SymbolId,
        add_to_table: bool,
    ) {
        let statement = self.stmt(stmt);
        if statement.from_extents.first() != Some(&symbol) {
            let name = self.symbols.get(symbol).name.clone();
            let statement = self.stmt_mut(stmt);
            statement.from_extents.push(symbol);
            statement.from.push_str(" AS ");
            statement.from.push_symbol(symbol);
            self.names.register_extent(&name);
        }
        if add_to_table {
            self.symbol_table.add(var, symbol);
        }
    }

    /// Translate a collection-valued expression into a statement.
    pub(crate) fn ensure_statement(
        &mut self,
        e: &Expr,
        add_default: bool,
        mark_all: bool,
        ctx: ScalarCtx,
    ) -> CqtResult<StmtId> {
        let stmt = match &e.kind {
            ExprKind::Project { .. }
            | ExprKind::Filter { .. }
            | ExprKind::GroupBy { .. }
            | ExprKind::Sort { .. } => match self.visit(e, ctx)? {
                Fragment::Statement(id) => id,
                _ => return Err(CqtError::internal("relational operator did not yield a statement")),
            },
            _ => {
                let var = "c";
                let ty = e.ty.element_type().clone();
                self.symbol_table.enter_scope();
                let (stmt, from_symbol) = self.visit_input(e, var, &ty, ctx)?;
                self.add_from_symbol(stmt, var, from_symbol, true);
                self.exit_scope()?;
                stmt
            }
        };

        if add_default && self.stmt(stmt).select.is_empty() {
            let columns = self.add_default_columns(stmt)?;
            if mark_all {
                for column in columns {
                    self.usage.mark_used(column);
                }
            }
        }
        Ok(stmt)
    }

    pub(crate) fn filter(
        &mut self,
        input: &ExprBinding,
        predicate: &Expr,
        negate: bool,
        ctx: ScalarCtx,
    ) -> CqtResult<StmtId> {
        let (stmt, from_symbol) = self.visit_binding_input(input, FusionOp::Filter, ctx)?;
        self.push_statement(stmt);
        self.symbol_table.enter_scope();
        self.add_from_symbol(stmt, &input.var, from_symbol, true);

        let predicate = self.visit_sql(predicate, ctx)?;
        let clause = &mut self.stmt_mut(stmt).where_clause;
        if negate {
            clause.push_str("NOT (");
            clause.push_builder(predicate);
            clause.push_str(")");
        } else {
            clause.push_builder(predicate);
        }

        self.exit_scope()?;
        self.pop_statement()?;
        Ok(stmt)
    }

    pub(crate) fn project(
        &mut self,
        input: &ExprBinding,
        projection: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let ty = input.var_type().clone();
        let (mut stmt, mut from_symbol) = self.visit_input(&input.expr, &input.var, &ty, ctx)?;

        // the legacy dialect cannot ORDER BY a column alias that shadows a base column
        let mut aliases_need_renaming = false;
        if !is_compatible(self.stmt(stmt), FusionOp::Project) {
            (stmt, from_symbol) = self.create_new_select_statement(stmt, &input.var, &ty, true)?;
        } else if self.dialect.is_legacy() && !self.stmt(stmt).order_by.is_empty() {
            aliases_need_renaming = true;
        }

        self.push_statement(stmt);
        self.symbol_table.enter_scope();
        self.add_from_symbol(stmt, &input.var, from_symbol, true);

        match &projection.kind {
            ExprKind::NewInstance(args) if !projection.ty.is_collection() => {
                let (select, columns) =
                    self.row_projection(projection, args, aliases_need_renaming, ctx)?;
                let statement = self.stmt_mut(stmt);
                statement.select.regular.push_builder(select);
                if aliases_need_renaming {
                    statement.output_columns_renamed = true;
                }
                statement.output_columns = Some(columns);
            }
            _ => {
                let select = self.visit_sql(projection, ctx)?;
                self.stmt_mut(stmt).select.regular.push_builder(select);
            }
        }

        self.exit_scope()?;
        self.pop_statement()?;
        Ok(Fragment::Statement(stmt))
    }

    /// `a AS [A], b AS [B]` for a row constructor.
    fn row_projection(
        &mut self,
        row: &Expr,
        args: &[Expr],
        rename: bool,
        ctx: ScalarCtx,
    ) -> CqtResult<(SqlBuilder, ColumnMap)> {
        let members = row.ty.properties();
        if members.len() != args.len() {
            return Err(CqtError::internal("row constructor arity does not match its type"));
        }
        let mut select = SqlBuilder::new();
        let mut columns = ColumnMap::default();
        for (i, (member, arg)) in members.iter().zip(args).enumerate() {
            if arg.ty.is_row() {
                return Err(CqtError::unsupported(format!(
                    "nested row in projection member '{}'",
                    member.name
                )));
            }
            if i > 0 {
                select.push_str(", ");
            }
            select.push_builder(self.visit_sql(arg, ctx)?);
            select.push_str(" AS ");
            if rename {
                let mut symbol = Symbol::column(&member.name);
                symbol.new_name = format!("Internal_{}", member.name);
                symbol.needs_renaming = true;
                let id = self.alloc_symbol(symbol);
                select.push_symbol(id);
                columns.insert(&member.name, id);
            } else {
                select.push_str(self.generator.quote_identifier(&member.name));
                let id = self.alloc_symbol(Symbol::column(&member.name));
                columns.insert(&member.name, id);
            }
        }
        Ok((select, columns))
    }

    pub(crate) fn sort(
        &mut self,
        input: &ExprBinding,
        keys: &[SortClause],
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let (stmt, from_symbol) = self.visit_binding_input(input, FusionOp::Sort, ctx)?;
        self.push_statement(stmt);
        self.symbol_table.enter_scope();
        self.add_from_symbol(stmt, &input.var, from_symbol, true);

        let order_by = self.sort_keys(keys, ctx)?;
        self.stmt_mut(stmt).order_by.push_builder(order_by);

        self.exit_scope()?;
        self.pop_statement()?;
        Ok(Fragment::Statement(stmt))
    }

    /// `k1 [COLLATE c] ASC, k2 DESC`
    fn sort_keys(&mut self, keys: &[SortClause], ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let mut b = SqlBuilder::new();
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                b.push_str(", ");
            }
            b.push_builder(self.visit_sql(&key.expr, ctx)?);
            if let Some(collation) = key.collation.as_deref().filter(|c| !c.is_empty()) {
                b.push_str(" COLLATE ");
                b.push_str(collation);
            }
            b.push_str(if key.ascending { " ASC" } else { " DESC" });
        }
        Ok(b)
    }

    /// Row counts for TOP and OFFSET: constants are emitted without a cast.
    fn count_sql(&mut self, count: &Expr, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        match &count.kind {
            ExprKind::Constant(value) => Ok(SqlBuilder::text(value.to_string())),
            _ => self.visit_sql(count, ctx),
        }
    }

    pub(crate) fn skip(
        &mut self,
        input: &ExprBinding,
        keys: &[SortClause],
        count: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let (stmt, from_symbol) = self.visit_binding_input(input, FusionOp::Skip, ctx)?;
        self.push_statement(stmt);
        self.symbol_table.enter_scope();
        self.add_from_symbol(stmt, &input.var, from_symbol, true);

        if self.dialect.supports_offset_fetch() {
            let skip = self.count_sql(count, ctx)?;
            let order_by = self.sort_keys(keys, ctx)?;
            let statement = self.stmt_mut(stmt);
            statement.select.skip = Some(skip);
            statement.order_by.push_builder(order_by);
            self.exit_scope()?;
            self.pop_statement()?;
            return Ok(Fragment::Statement(stmt));
        }

        let columns = self.add_default_columns(stmt)?;
        let mut row_number = Symbol::column("row_number");
        row_number.needs_renaming = columns
            .iter()
            .any(|c| self.symbols.get(*c).name.eq_ignore_ascii_case("row_number"));
        let row_number = self.alloc_symbol(row_number);

        let mut select = SqlBuilder::text("row_number() OVER (ORDER BY ");
        select.push_builder(self.sort_keys(keys, ctx)?);
        select.push_str(") AS ");
        select.push_symbol(row_number);
        self.stmt_mut(stmt).select.regular.push_builder(select);

        self.exit_scope()?;
        self.pop_statement()?;

        let mut from = SqlBuilder::text("(");
        from.push_statement(stmt);
        from.push_str(")");
        let result = self.alloc_statement(SelectStatement {
            from,
            ..SelectStatement::default()
        });

        let ty = input.var_type().clone();
        let extents = self.stmt(stmt).from_extents.clone();
        let nested = match extents.as_slice() {
            [only] => self.nested_join_symbol(*only, &input.var, &ty, columns),
            _ => None,
        };
        let result_symbol = match nested {
            Some(symbol) => symbol,
            None => {
                let inner = self.stmt(stmt);
                let outputs = inner.output_columns.clone().unwrap_or_default();
                let renamed = inner.output_columns_renamed;
                self.alloc_symbol(Symbol::with_output(&input.var, Some(ty), outputs, renamed))
            }
        };

        self.push_statement(result);
        self.symbol_table.enter_scope();
        self.add_from_symbol(result, &input.var, result_symbol, true);

        let mut predicate = SqlBuilder::new();
        predicate.push_symbol(result_symbol);
        predicate.push_str(".");
        predicate.push_symbol(row_number);
        predicate.push_str(" > ");
        predicate.push_builder(self.count_sql(count, ctx)?);
        let order_by = self.sort_keys(keys, ctx)?;
        let statement = self.stmt_mut(result);
        statement.where_clause.push_builder(predicate);
        statement.order_by.push_builder(order_by);

        self.exit_scope()?;
        self.pop_statement()?;
        Ok(Fragment::Statement(result))
    }

    pub(crate) fn limit(
        &mut self,
        input: &Expr,
        limit: &Expr,
        with_ties: bool,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let mut stmt = self.ensure_statement(input, false, false, ctx)?;
        if !is_compatible(self.stmt(stmt), FusionOp::Limit) {
            stmt = self.wrap_unaliased(stmt, "top", input.ty.element_type())?;
        }
        let count = self.count_sql(limit, ctx)?;
        self.stmt_mut(stmt).select.top = Some(TopClause { count, with_ties });
        Ok(Fragment::Statement(stmt))
    }

    /// Wrap `stmt` under a symbol that is never visible to expressions.
    fn wrap_unaliased(&mut self, stmt: StmtId, name: &str, ty: &TypeUsage) -> CqtResult<StmtId> {
        let (wrapped, from_symbol) = self.create_new_select_statement(stmt, name, ty, true)?;
        self.add_from_symbol(wrapped, name, from_symbol, false);
        Ok(wrapped)
    }

    pub(crate) fn distinct(&mut self, input: &Expr, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let mut stmt = self.ensure_statement(input, true, false, ctx)?;
        if !is_compatible(self.stmt(stmt), FusionOp::Distinct) {
            stmt = self.wrap_unaliased(stmt, "distinct", input.ty.element_type())?;
        }
        self.stmt_mut(stmt).select.distinct = true;
        Ok(Fragment::Statement(stmt))
    }

    pub(crate) fn element(&mut self, input: &Expr, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let stmt = self.ensure_statement(input, true, false, ctx)?;
        let mut b = SqlBuilder::text("(");
        b.push_statement(stmt);
        b.push_str(")");
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn quantifier(
        &mut self,
        kind: QuantifierKind,
        input: &ExprBinding,
        predicate: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let negate = kind == QuantifierKind::All;
        let mut b = SqlBuilder::text(if negate { "NOT EXISTS (" } else { "EXISTS (" });
        let stmt = self.filter(input, predicate, negate, ctx)?;
        if self.stmt(stmt).select.is_empty() {
            self.add_default_columns(stmt)?;
        }
        b.push_statement(stmt);
        b.push_str(")");
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn is_empty(&mut self, input: &Expr, negate: bool, ctx: ScalarCtx) -> CqtResult<Fragment> {
        let stmt = self.ensure_statement(input, true, false, ctx)?;
        let mut b = SqlBuilder::text(if negate { "EXISTS (" } else { "NOT EXISTS (" });
        b.push_statement(stmt);
        b.push_str(")");
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn collection_constructor(
        &mut self,
        e: &Expr,
        args: &[Expr],
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        if let [single] = args {
            if let ExprKind::Element(inner) = &single.kind {
                let mut stmt = self.ensure_statement(inner, true, false, ctx)?;
                if !is_compatible(self.stmt(stmt), FusionOp::Element) {
                    stmt = self.wrap_unaliased(stmt, "element", inner.ty.element_type())?;
                }
                self.stmt_mut(stmt).select.top = Some(TopClause {
                    count: SqlBuilder::text("1"),
                    with_ties: false,
                });
                return Ok(Fragment::Statement(stmt));
            }
        }

        let element = e.ty.element_type();
        let scalar = element.is_primitive();
        let mut b = SqlBuilder::new();
        if args.is_empty() {
            if !scalar {
                return Err(CqtError::unsupported("empty collection of non-scalar elements"));
            }
            let ty = self.sql_primitive_type(element)?;
            b.push_str(format!(
                "SELECT CAST(NULL AS {}) AS X FROM (SELECT 1) AS Y WHERE 1 = 0",
                ty
            ));
        }
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                b.push_str(" UNION ALL ");
            }
            b.push_str("SELECT ");
            b.push_builder(self.visit_sql(arg, ctx)?);
            if scalar {
                b.push_str(" AS X");
            }
        }
        Ok(Fragment::Sql(b))
    }

    pub(crate) fn set_op(
        &mut self,
        op: SetOpKind,
        left: &Expr,
        right: &Expr,
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let left_stmt = self.ensure_statement(left, true, true, ctx)?;
        let right_stmt = self.ensure_statement(right, true, true, ctx)?;

        let mut set = SqlBuilder::new();
        set.push_statement(left_stmt);
        set.push_str(" ");
        set.push_str(op.sql());
        set.push_str(" ");
        set.push_statement(right_stmt);

        if !self.stmt(left_stmt).output_columns_renamed {
            return Ok(Fragment::Sql(set));
        }

        let mut from = SqlBuilder::text("(");
        from.push_builder(set);
        from.push_str(")");
        let stmt = self.alloc_statement(SelectStatement {
            from,
            ..SelectStatement::default()
        });
        let outputs = self.stmt(left_stmt).output_columns.clone().unwrap_or_default();
        let symbol = self.alloc_symbol(Symbol::with_output(
            "X",
            Some(left.ty.element_type().clone()),
            outputs,
            true,
        ));
        self.add_from_symbol(stmt, "X", symbol, false);
        Ok(Fragment::Statement(stmt))
    }

    pub(crate) fn group_by(
        &mut self,
        e: &Expr,
        input: &GroupBinding,
        keys: &[Expr],
        aggregates: &[Aggregate],
        ctx: ScalarCtx,
    ) -> CqtResult<Fragment> {
        let ty = input.var_type().clone();
        let (mut inner, mut from_symbol) = self.visit_input(&input.expr, &input.var, &ty, ctx)?;
        if !is_compatible(self.stmt(inner), FusionOp::GroupBy) {
            (inner, from_symbol) = self.create_new_select_statement(inner, &input.var, &ty, true)?;
        }

        self.push_statement(inner);
        self.symbol_table.enter_scope();
        self.add_from_symbol(inner, &input.var, from_symbol, true);
        self.symbol_table.add(&input.group_var, from_symbol);

        let needs_inner = aggregates
            .iter()
            .any(|a| a.args.iter().any(|arg| !is_chain_over(arg, &input.group_var, true)))
            || keys.iter().any(|k| !is_chain_over(k, &input.var, false));

        let result = if needs_inner {
            let (result, symbol) = self.create_new_select_statement(inner, &input.var, &ty, false)?;
            self.add_from_symbol(result, &input.var, symbol, false);
            from_symbol = symbol;
            result
        } else {
            inner
        };

        let members = e.ty.element_type().properties();
        if members.len() != keys.len() + aggregates.len() {
            return Err(CqtError::internal("group by result type does not match keys and aggregates"));
        }
        let aliases: Vec<String> = members
            .iter()
            .map(|m| self.generator.quote_identifier(&m.name))
            .collect();
        let mut aliases = aliases.into_iter();

        let mut select = SqlBuilder::new();
        let mut inner_select = SqlBuilder::new();
        let mut group_by = SqlBuilder::new();
        let mut separator = "";

        for key in keys {
            let alias = aliases.next().unwrap_or_default();
            group_by.push_str(separator);
            let key_sql = self.visit_sql(key, ctx)?;
            if !needs_inner {
                select.push_str(separator);
                select.push_builder(key_sql.clone());
                select.push_str(format!(" AS {}", alias));
                group_by.push_builder(key_sql);
            } else {
                inner_select.push_str(separator);
                inner_select.push_builder(key_sql);
                inner_select.push_str(format!(" AS {}", alias));

                select.push_str(separator);
                select.push_symbol(from_symbol);
                select.push_str(format!(".{} AS {}", alias, alias));
                group_by.push_str(alias);
            }
            separator = ", ";
        }

        for aggregate in aggregates {
            let alias = aliases.next().unwrap_or_default();
            let arg = aggregate
                .args
                .first()
                .ok_or_else(|| CqtError::internal("aggregate without an argument"))?;
            let arg_sql = self.visit_sql(arg, ctx)?;
            let arg_sql = if needs_inner {
                inner_select.push_str(separator);
                inner_select.push_builder(arg_sql);
                inner_select.push_str(format!(" AS {}", alias));

                let mut wrapped = SqlBuilder::new();
                wrapped.push_symbol(from_symbol);
                wrapped.push_str(format!(".{}", alias));
                wrapped
            } else {
                arg_sql
            };

            select.push_str(separator);
            select.push_str(aggregate_name(&aggregate.function));
            select.push_str("(");
            if aggregate.distinct {
                select.push_str("DISTINCT ");
            }
            select.push_builder(arg_sql);
            select.push_str(format!(") AS {}", alias));
            separator = ", ";
        }

        if needs_inner {
            self.stmt_mut(inner).select.regular.push_builder(inner_select);
        }
        let statement = self.stmt_mut(result);
        statement.select.regular.push_builder(select);
        statement.group_by.push_builder(group_by);

        self.exit_scope()?;
        self.pop_statement()?;
        Ok(Fragment::Statement(result))
    }
}

/// Whether `e` is a (cast of a) property chain ending at `var`, or a
/// constant when `allow_constant` is set. Anything else needs an inner query
/// before SQL Server will group or aggregate over it.
fn is_chain_over(e: &Expr, var: &str, allow_constant: bool) -> bool {
    if allow_constant && matches!(e.kind, ExprKind::Constant(_)) {
        return true;
    }
    let mut current = e;
    loop {
        match &current.kind {
            ExprKind::Cast(arg) => current = arg,
            ExprKind::Property { instance, .. } => current = instance,
            ExprKind::VariableRef(name) => return name == var,
            _ => return false,
        }
    }
}
