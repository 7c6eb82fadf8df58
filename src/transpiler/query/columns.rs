//! `SELECT *` expansion into optional columns.

use crate::error::CqtResult;
use crate::transpiler::fragment::{OptionalColumn, SqlBuilder, StmtId};
use crate::transpiler::symbol::{ColumnMap, Symbol, SymbolId};

use super::Translator;

impl Translator {
    /// Expand the statement's `*` into one optional column per visible
    /// property of its FROM extents. Returns the column symbols in order.
    pub(crate) fn add_default_columns(&mut self, stmt: StmtId) -> CqtResult<Vec<SymbolId>> {
        let mut columns = Vec::new();
        let mut seen = ColumnMap::default();
        let extents = self.stmt(stmt).from_extents.clone();
        for extent in extents {
            self.add_columns(stmt, extent, &mut columns, &mut seen)?;
        }
        Ok(columns)
    }

    fn add_columns(
        &mut self,
        stmt: StmtId,
        symbol: SymbolId,
        columns: &mut Vec<SymbolId>,
        seen: &mut ColumnMap,
    ) -> CqtResult<()> {
        if let Some(join) = self.symbols.get(symbol).as_join() {
            if !join.is_nested_join {
                let extents = join.extent_list.clone();
                for extent in extents {
                    // scalar extents have no columns
                    let scalar = self
                        .symbols
                        .get(extent)
                        .ty
                        .as_ref()
                        .is_none_or(|ty| ty.is_primitive());
                    if !scalar {
                        self.add_columns(stmt, extent, columns, seen)?;
                    }
                }
            } else {
                for column in join.column_list.clone() {
                    self.optional_column(None, column);
                    let mut sql = SqlBuilder::new();
                    sql.push_symbol(symbol);
                    sql.push_str(".");
                    sql.push_symbol(column);
                    self.stmt_mut(stmt).select.optional_columns.push(OptionalColumn { sql, symbol: column });

                    let name = self.symbols.get(column).name.clone();
                    self.flag_collision(seen, &name, column);
                    columns.push(column);
                }
            }
            return Ok(());
        }

        if self.symbols.get(symbol).output_columns_renamed {
            self.stmt_mut(stmt).output_columns_renamed = true;
        }
        if self.stmt(stmt).output_columns.is_none() {
            self.stmt_mut(stmt).output_columns = Some(ColumnMap::default());
        }

        let names: Vec<String> = match &self.symbols.get(symbol).ty {
            Some(ty) if !ty.is_primitive() => ty.properties().iter().map(|m| m.name.clone()).collect(),
            _ => vec!["X".to_string()],
        };
        for name in names {
            self.add_column(stmt, symbol, columns, seen, &name);
        }
        Ok(())
    }

    fn add_column(
        &mut self,
        stmt: StmtId,
        symbol: SymbolId,
        columns: &mut Vec<SymbolId>,
        seen: &mut ColumnMap,
        name: &str,
    ) {
        self.names.register_column(name);

        let source = self.symbols.get(symbol);
        let input = source.output_columns.get(name);
        let renamed = source.output_columns_renamed;
        let column = match source.columns.get(name) {
            Some(existing) => existing,
            None => {
                let column = match input {
                    Some(input) if renamed => input,
                    _ => self.alloc_symbol(Symbol::column(name)),
                };
                self.symbols.get_mut(symbol).columns.insert(name, column);
                column
            }
        };

        self.optional_column(input, column);
        let mut sql = SqlBuilder::new();
        sql.push_symbol(symbol);
        sql.push_str(".");
        match input {
            Some(input) if renamed => sql.push_symbol(input),
            _ => sql.push_str(self.generator.quote_identifier(name)),
        }
        sql.push_str(" AS ");
        sql.push_symbol(column);

        let statement = self.stmt_mut(stmt);
        statement.select.optional_columns.push(OptionalColumn { sql, symbol: column });
        let outputs = statement.output_columns.get_or_insert_with(ColumnMap::default);
        if !outputs.contains(name) {
            outputs.insert(name, column);
        }

        self.flag_collision(seen, name, column);
        columns.push(column);
    }

    /// Register `column` with the usage manager, linked to `input` if given.
    pub(crate) fn optional_column(&mut self, input: Option<SymbolId>, column: SymbolId) {
        if !self.usage.contains(column) {
            self.usage.add(input, column);
        }
    }

    fn flag_collision(&mut self, seen: &mut ColumnMap, name: &str, column: SymbolId) {
        match seen.get(name) {
            Some(previous) => {
                self.symbols.get_mut(previous).needs_renaming = true;
                self.symbols.get_mut(column).needs_renaming = true;
            }
            None => seen.insert(name, column),
        }
    }
}
