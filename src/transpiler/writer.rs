//! Final stringification: resolves symbol names and prunes optional columns.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::fragment::{SelectStatement, SqlBuilder, SqlPart, StmtId};
use super::symbol::{SymbolArena, SymbolId, SymbolUsageManager};
use super::traits::SqlGenerator;

/// Every alias and column name handed out during one compile, with the last
/// numeric suffix used for each base name. Keys are case-insensitive.
#[derive(Debug, Default)]
pub struct NameRegistry {
    extent_names: HashMap<String, usize>,
    column_names: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn register_extent(&mut self, name: &str) {
        self.extent_names.insert(name.to_lowercase(), 0);
    }

    pub fn register_column(&mut self, name: &str) {
        self.column_names.insert(name.to_lowercase(), 0);
    }

    /// Smallest suffixed name above the stored counter that is not taken.
    fn next_name(names: &mut HashMap<String, usize>, base: &str) -> String {
        let key = base.to_lowercase();
        let mut i = names.get(&key).copied().unwrap_or(0);
        let candidate = loop {
            i += 1;
            let candidate = format!("{}{}", base, i);
            if !names.contains_key(&candidate.to_lowercase()) {
                break candidate;
            }
        };
        names.insert(key, i);
        names.insert(candidate.to_lowercase(), 0);
        candidate
    }

    pub fn next_extent_name(&mut self, base: &str) -> String {
        Self::next_name(&mut self.extent_names, base)
    }

    pub fn next_column_name(&mut self, base: &str) -> String {
        Self::next_name(&mut self.column_names, base)
    }
}

pub struct SqlWriter<'a> {
    pub symbols: &'a mut SymbolArena,
    pub statements: &'a mut Vec<SelectStatement>,
    pub usage: &'a mut SymbolUsageManager,
    pub names: &'a mut NameRegistry,
    pub generator: &'a dyn SqlGenerator,
    out: String,
}

impl<'a> SqlWriter<'a> {
    pub fn new(
        symbols: &'a mut SymbolArena,
        statements: &'a mut Vec<SelectStatement>,
        usage: &'a mut SymbolUsageManager,
        names: &'a mut NameRegistry,
        generator: &'a dyn SqlGenerator,
    ) -> Self {
        Self {
            symbols,
            statements,
            usage,
            names,
            generator,
            out: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn write_builder(&mut self, builder: &SqlBuilder) {
        for part in builder.parts() {
            match part {
                SqlPart::Text(text) => self.out.push_str(text),
                SqlPart::Symbol(id) => self.write_symbol(*id),
                SqlPart::Statement(id) => self.write_statement(*id),
                SqlPart::Builder(b) => self.write_builder(b),
            }
        }
    }

    /// Render a builder into its own string.
    fn render(&mut self, builder: &SqlBuilder) -> String {
        let saved = std::mem::take(&mut self.out);
        self.write_builder(builder);
        std::mem::replace(&mut self.out, saved)
    }

    pub fn write_symbol(&mut self, id: SymbolId) {
        let symbol = self.symbols.get_mut(id);
        if symbol.needs_renaming {
            let renamed = self.names.next_column_name(&symbol.new_name);
            trace!(from = %symbol.new_name, to = %renamed, "rename column");
            symbol.new_name = renamed;
            symbol.needs_renaming = false;
        }
        let text = if symbol.is_column {
            self.generator.quote_identifier(&symbol.new_name)
        } else {
            self.generator.quote_alias(&symbol.new_name)
        };
        self.out.push_str(&text);
    }

    pub fn write_statement(&mut self, id: StmtId) {
        let stmt = std::mem::take(&mut self.statements[id.0]);
        self.rename_extents(&stmt);

        self.write_select_clause(&stmt);
        self.out.push_str(" FROM ");
        self.write_builder(&stmt.from);
        if !stmt.where_clause.is_empty() {
            self.out.push_str(" WHERE ");
            self.write_builder(&stmt.where_clause);
        }
        if !stmt.group_by.is_empty() {
            self.out.push_str(" GROUP BY ");
            self.write_builder(&stmt.group_by);
        }
        let keeps_order = stmt.is_topmost || stmt.select.top.is_some() || stmt.select.skip.is_some();
        if !stmt.order_by.is_empty() && keeps_order {
            self.out.push_str(" ORDER BY ");
            self.write_builder(&stmt.order_by);
        }
        if let Some(skip) = &stmt.select.skip {
            let skip = self.render(skip);
            let fetch = stmt.select.top.as_ref().map(|top| self.render(&top.count));
            let text = self.generator.offset_fetch(&skip, fetch.as_deref());
            self.out.push_str(&text);
        }

        self.statements[id.0] = stmt;
    }

    /// Give every extent of the statement a name that collides neither with
    /// an outer extent it references nor with an earlier extent of its FROM.
    fn rename_extents(&mut self, stmt: &SelectStatement) {
        let mut taken: HashSet<String> = HashSet::new();
        for outer in &stmt.outer_extents {
            let symbol = self.symbols.get(*outer);
            match symbol.as_join() {
                Some(join) => {
                    for flat in &join.flattened_extent_list {
                        taken.insert(self.symbols.get(*flat).new_name.to_lowercase());
                    }
                }
                None => {
                    taken.insert(symbol.new_name.to_lowercase());
                }
            }
        }

        let aliases = stmt
            .all_join_extents
            .as_ref()
            .unwrap_or(&stmt.from_extents);
        for alias in aliases {
            let name = self.symbols.get(*alias).name.clone();
            if taken.contains(&name.to_lowercase()) {
                let renamed = self.names.next_extent_name(&name);
                trace!(from = %name, to = %renamed, "rename extent");
                self.symbols.get_mut(*alias).new_name = renamed;
            }
            taken.insert(self.symbols.get(*alias).new_name.to_lowercase());
        }
    }

    fn write_select_clause(&mut self, stmt: &SelectStatement) {
        let select = &stmt.select;
        self.out.push_str("SELECT ");
        if select.distinct {
            self.out.push_str("DISTINCT ");
        }
        if let (Some(top), None) = (&select.top, &select.skip) {
            let count = self.render(&top.count);
            let text = self.generator.top_clause(&count, top.with_ties);
            self.out.push_str(&text);
            self.out.push(' ');
        }

        if stmt.is_topmost || select.distinct {
            for column in &select.optional_columns {
                self.usage.mark_used(column.symbol);
            }
        }

        let mut printed = false;
        for column in &select.optional_columns {
            if self.usage.is_used(column.symbol) {
                if printed {
                    self.out.push_str(", ");
                }
                self.write_builder(&column.sql);
                printed = true;
            }
        }

        if !select.regular.is_empty() {
            if printed {
                self.out.push_str(", ");
            }
            self.write_builder(&select.regular);
        } else if !printed {
            if let Some(first) = select.optional_columns.first() {
                self.usage.mark_used(first.symbol);
                self.write_builder(&first.sql);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_name_skips_taken() {
        let mut names = NameRegistry::default();
        names.register_column("Id");
        names.register_column("Id1");
        assert_eq!(names.next_column_name("Id"), "Id2");
        assert_eq!(names.next_column_name("Id"), "Id3");
        assert_eq!(names.next_column_name("ID"), "ID4");
    }

    #[test]
    fn test_extent_names_are_separate_from_columns() {
        let mut names = NameRegistry::default();
        names.register_column("t1");
        assert_eq!(names.next_extent_name("t"), "t1");
    }
}
