//! Query command tree translation.
//!
//! One [`Translator`] serves one compile. Relational operators extend or
//! wrap [`SelectStatement`]s held in an arena; scalar operators produce
//! [`SqlBuilder`] text. Names are only fixed when the final SQL is written.

mod columns;
mod join;
mod relational;
mod scalar;

use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{Expr, ExprKind, JoinKind, ApplyKind};
use crate::error::{CqtError, CqtResult};
use crate::metadata::{SqlServerManifest, StoreTypeMapper, store_type_sql};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::fragment::{SelectStatement, SqlBuilder, StmtId};
use crate::transpiler::legacy;
use crate::transpiler::symbol::{Symbol, SymbolArena, SymbolId, SymbolTable, SymbolUsageManager};
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::unicode::NonUnicodeTracker;
use crate::transpiler::writer::{NameRegistry, SqlWriter};

/// Result of visiting one node.
#[derive(Debug, Clone)]
pub enum Fragment {
    Sql(SqlBuilder),
    Statement(StmtId),
    /// A variable reference resolved to its extent.
    Symbol(SymbolId),
    /// A record-valued member of a nested join: the join alias plus the
    /// extent that member stands for.
    Pair { source: SymbolId, column: SymbolId },
}

/// Per-visit flags for string comparisons against non-unicode columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarCtx {
    /// String constants and parameters under this node should be non-unicode.
    pub force_non_unicode: bool,
    /// Parameter references here do not count as usages for rebinding.
    pub ignore_param: bool,
}

impl ScalarCtx {
    pub fn forcing(self, force: bool) -> Self {
        Self {
            force_non_unicode: self.force_non_unicode || force,
            ..self
        }
    }
}

/// Output of [`Translator::generate_sql`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuery {
    pub sql: String,
    pub non_unicode_parameters: BTreeSet<String>,
}

pub struct Translator {
    pub(crate) dialect: Dialect,
    pub(crate) generator: Box<dyn SqlGenerator>,
    pub(crate) manifest: SqlServerManifest,
    pub(crate) symbols: SymbolArena,
    pub(crate) statements: Vec<SelectStatement>,
    pub(crate) usage: SymbolUsageManager,
    pub(crate) names: NameRegistry,
    pub(crate) symbol_table: SymbolTable,
    stmt_stack: Vec<StmtId>,
    join_stack: Vec<bool>,
    /// Set by a variable reference, cleared by the property that consumes it.
    var_ref_single: bool,
    pub(crate) unicode: NonUnicodeTracker,
}

impl Translator {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            generator: dialect.generator(),
            manifest: SqlServerManifest::new(dialect),
            symbols: SymbolArena::default(),
            statements: Vec::new(),
            usage: SymbolUsageManager::default(),
            names: NameRegistry::default(),
            symbol_table: SymbolTable::default(),
            stmt_stack: Vec::new(),
            join_stack: Vec::new(),
            var_ref_single: false,
            unicode: NonUnicodeTracker::default(),
        }
    }

    /// Translate a query expression into SQL text.
    pub fn generate_sql(mut self, query: &Expr) -> CqtResult<GeneratedQuery> {
        let rewritten;
        let mut query = query;
        if self.dialect.is_legacy() && legacy::needs_rewrite(query)? {
            debug!("rewriting query for the legacy dialect");
            rewritten = legacy::rewrite(query)?;
            query = &rewritten;
        }

        let root = if query.ty.is_collection() {
            let stmt = self.ensure_statement(query, true, false, ScalarCtx::default())?;
            self.stmt_mut(stmt).is_topmost = true;
            let mut b = SqlBuilder::new();
            b.push_statement(stmt);
            b
        } else {
            let mut b = SqlBuilder::text("SELECT ");
            let value = self.visit(query, ScalarCtx::default())?;
            let value = self.into_builder(value)?;
            // a predicate is not a value in T-SQL
            if is_predicate(query) {
                b.push_str("CASE WHEN (");
                b.push_builder(value);
                b.push_str(") THEN cast(1 as bit) ELSE cast(0 as bit) END");
            } else {
                b.push_builder(value);
            }
            b
        };

        if self.var_ref_single {
            return Err(CqtError::unsupported(
                "variable reference outside of a property access",
            ));
        }
        if !self.stmt_stack.is_empty() || !self.join_stack.is_empty() || self.symbol_table.depth() != 0 {
            return Err(CqtError::internal("translation stacks not balanced"));
        }

        let non_unicode_parameters = self.unicode.finish();
        let sql = self.write(&root);
        debug!(statements = self.statements.len(), symbols = self.symbols.len(), "generated query");
        Ok(GeneratedQuery {
            sql,
            non_unicode_parameters,
        })
    }

    pub(crate) fn write(&mut self, root: &SqlBuilder) -> String {
        let mut writer = SqlWriter::new(
            &mut self.symbols,
            &mut self.statements,
            &mut self.usage,
            &mut self.names,
            self.generator.as_ref(),
        );
        writer.write_builder(root);
        writer.finish()
    }

    pub(crate) fn visit(&mut self, e: &Expr, ctx: ScalarCtx) -> CqtResult<Fragment> {
        match &e.kind {
            ExprKind::Constant(value) => Ok(Fragment::Sql(self.constant(e, value, false, ctx)?)),
            ExprKind::Null => self.null(e),
            ExprKind::ParameterRef(name) => Ok(self.parameter(name, ctx)),
            ExprKind::VariableRef(name) => self.variable(name),
            ExprKind::Property { instance, name } => self.property(instance, name, ctx),
            ExprKind::Arithmetic { op, args } => self.arithmetic(*op, args, ctx),
            ExprKind::Comparison { op, left, right } => self.comparison(*op, left, right, ctx),
            ExprKind::And(..) => self.associative(e, " AND ", ctx),
            ExprKind::Or(..) => self.or(e, ctx),
            ExprKind::Not(arg) => self.not(arg, ctx),
            ExprKind::IsNull(arg) => self.is_null(arg, false, ctx),
            ExprKind::IsEmpty(arg) => self.is_empty(arg, false, ctx),
            ExprKind::Like {
                input,
                pattern,
                escape,
            } => self.like(input, pattern, escape.as_deref(), ctx),
            ExprKind::In { item, list } => self.in_list(item, list, ctx),
            ExprKind::Case {
                whens,
                thens,
                otherwise,
            } => self.case(whens, thens, otherwise, ctx),
            ExprKind::Cast(arg) => self.cast(arg, &e.ty, ctx),
            ExprKind::Function { function, args } => self.function(function, args, &e.ty, ctx),
            ExprKind::NewInstance(args) => {
                if e.ty.is_collection() {
                    self.collection_constructor(e, args, ctx)
                } else {
                    Err(CqtError::unsupported("NewInstance outside of a projection"))
                }
            }
            ExprKind::Element(arg) => self.element(arg, ctx),
            ExprKind::Quantifier {
                kind,
                input,
                predicate,
            } => self.quantifier(*kind, input, predicate, ctx),
            ExprKind::Scan(set) => Ok(self.scan(set)),
            ExprKind::Filter { input, predicate } => {
                let stmt = self.filter(input, predicate, false, ctx)?;
                Ok(Fragment::Statement(stmt))
            }
            ExprKind::Project { input, projection } => self.project(input, projection, ctx),
            ExprKind::Join {
                kind,
                left,
                right,
                condition,
            } => {
                let keyword = match kind {
                    JoinKind::Inner => "INNER JOIN",
                    JoinKind::LeftOuter => "LEFT OUTER JOIN",
                    JoinKind::FullOuter => "FULL OUTER JOIN",
                };
                self.join(&[left, right], keyword, Some(condition.as_ref()), ctx)
            }
            ExprKind::CrossJoin(inputs) => {
                let inputs: Vec<_> = inputs.iter().collect();
                self.join(&inputs, "CROSS JOIN", None, ctx)
            }
            ExprKind::Apply { kind, input, apply } => {
                let keyword = match kind {
                    ApplyKind::Cross => "CROSS APPLY",
                    ApplyKind::Outer => "OUTER APPLY",
                };
                self.join(&[input, apply], keyword, None, ctx)
            }
            ExprKind::GroupBy {
                input,
                keys,
                aggregates,
            } => self.group_by(e, input, keys, aggregates, ctx),
            ExprKind::Sort { input, keys } => self.sort(input, keys, ctx),
            ExprKind::Skip { input, keys, count } => self.skip(input, keys, count, ctx),
            ExprKind::Limit {
                input,
                limit,
                with_ties,
            } => self.limit(input, limit, *with_ties, ctx),
            ExprKind::SetOp { op, left, right } => self.set_op(*op, left, right, ctx),
            ExprKind::Distinct(arg) => self.distinct(arg, ctx),
            ExprKind::Lambda { .. }
            | ExprKind::Ref(_)
            | ExprKind::Deref(_)
            | ExprKind::OfType(_)
            | ExprKind::Treat(_)
            | ExprKind::IsOf(_)
            | ExprKind::Navigate(_) => Err(CqtError::unsupported(e.kind_name())),
        }
    }

    /// Visit and convert to text.
    pub(crate) fn visit_sql(&mut self, e: &Expr, ctx: ScalarCtx) -> CqtResult<SqlBuilder> {
        let fragment = self.visit(e, ctx)?;
        self.into_builder(fragment)
    }

    pub(crate) fn into_builder(&self, fragment: Fragment) -> CqtResult<SqlBuilder> {
        let mut b = SqlBuilder::new();
        match fragment {
            Fragment::Sql(sql) => return Ok(sql),
            Fragment::Statement(id) => b.push_statement(id),
            Fragment::Symbol(id) => b.push_symbol(id),
            Fragment::Pair { .. } => {
                return Err(CqtError::internal(
                    "record-valued join member used as a value",
                ));
            }
        }
        Ok(b)
    }

    pub(crate) fn alloc_statement(&mut self, stmt: SelectStatement) -> StmtId {
        self.statements.push(stmt);
        StmtId(self.statements.len() - 1)
    }

    pub(crate) fn stmt(&self, id: StmtId) -> &SelectStatement {
        &self.statements[id.0]
    }

    pub(crate) fn stmt_mut(&mut self, id: StmtId) -> &mut SelectStatement {
        &mut self.statements[id.0]
    }

    pub(crate) fn push_statement(&mut self, id: StmtId) {
        self.stmt_stack.push(id);
    }

    pub(crate) fn pop_statement(&mut self) -> CqtResult<StmtId> {
        self.stmt_stack
            .pop()
            .ok_or_else(|| CqtError::internal("statement stack underflow"))
    }

    pub(crate) fn current_statement(&self) -> CqtResult<StmtId> {
        self.stmt_stack
            .last()
            .copied()
            .ok_or_else(|| CqtError::internal("no current statement"))
    }

    pub(crate) fn is_parent_a_join(&self) -> bool {
        self.join_stack.last().copied().unwrap_or(false)
    }

    pub(crate) fn push_join_context(&mut self, is_join: bool) {
        self.join_stack.push(is_join);
    }

    pub(crate) fn pop_join_context(&mut self) -> CqtResult<()> {
        self.join_stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| CqtError::internal("join context stack underflow"))
    }

    pub(crate) fn exit_scope(&mut self) -> CqtResult<()> {
        if self.symbol_table.exit_scope() {
            Ok(())
        } else {
            Err(CqtError::internal("symbol scope underflow"))
        }
    }

    pub(crate) fn alloc_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.alloc(symbol)
    }

    /// Join symbol over `extents`, indexed by their names.
    pub(crate) fn alloc_join_symbol(
        &mut self,
        name: &str,
        ty: Option<crate::ast::TypeUsage>,
        extents: Vec<SymbolId>,
    ) -> SymbolId {
        let names: Vec<String> = extents
            .iter()
            .map(|id| self.symbols.get(*id).name.clone())
            .collect();
        self.symbols.alloc(Symbol::join(name, ty, extents, &names))
    }

    /// `t` as used in `CAST(x AS t)` and NULL casts.
    pub(crate) fn sql_primitive_type(&self, ty: &crate::ast::TypeUsage) -> CqtResult<String> {
        let store = self.manifest.store_type(ty)?;
        Ok(store_type_sql(self.dialect, &store))
    }

    pub(crate) fn set_var_ref_single(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.var_ref_single, value)
    }
}

/// Boolean expressions that SQL Server only accepts as search conditions.
fn is_predicate(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Comparison { .. }
            | ExprKind::And(..)
            | ExprKind::Or(..)
            | ExprKind::Not(_)
            | ExprKind::IsNull(_)
            | ExprKind::IsEmpty(_)
            | ExprKind::Like { .. }
            | ExprKind::In { .. }
            | ExprKind::Quantifier { .. }
    )
}
