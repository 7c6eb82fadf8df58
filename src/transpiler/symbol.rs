//! Symbols, scopes and optional-column usage tracking.
//!
//! A symbol is the identity of an extent alias or a column name. Names are
//! fixed only when the final SQL is written, so symbols are referenced by
//! [`SymbolId`] and renamed in place.

use std::collections::HashMap;

use crate::ast::TypeUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

/// Name to symbol map with case-insensitive lookup, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap(Vec<(String, SymbolId)>);

impl ColumnMap {
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or overwrite.
    pub fn insert(&mut self, name: &str, id: SymbolId) {
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = id,
            None => self.0.push((name.to_string(), id)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.0.iter().map(|(_, id)| *id)
    }
}

/// Extents flattened into one FROM clause.
#[derive(Debug, Clone, Default)]
pub struct JoinSymbol {
    pub extent_list: Vec<SymbolId>,
    pub flattened_extent_list: Vec<SymbolId>,
    pub column_list: Vec<SymbolId>,
    pub name_to_extent: ColumnMap,
    pub is_nested_join: bool,
}

#[derive(Debug, Clone)]
pub enum SymbolShape {
    Simple,
    Joined(JoinSymbol),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub new_name: String,
    pub needs_renaming: bool,
    /// Columns are always bracketed; extent aliases only when needed.
    pub is_column: bool,
    pub ty: Option<TypeUsage>,
    pub columns: ColumnMap,
    pub output_columns: ColumnMap,
    pub output_columns_renamed: bool,
    pub shape: SymbolShape,
}

impl Symbol {
    pub fn new(name: &str, ty: Option<TypeUsage>) -> Self {
        Self {
            name: name.to_string(),
            new_name: name.to_string(),
            needs_renaming: false,
            is_column: false,
            ty,
            columns: ColumnMap::default(),
            output_columns: ColumnMap::default(),
            output_columns_renamed: false,
            shape: SymbolShape::Simple,
        }
    }

    pub fn column(name: &str) -> Self {
        Self {
            is_column: true,
            ..Self::new(name, None)
        }
    }

    pub fn with_output(
        name: &str,
        ty: Option<TypeUsage>,
        output_columns: ColumnMap,
        renamed: bool,
    ) -> Self {
        Self {
            output_columns,
            output_columns_renamed: renamed,
            ..Self::new(name, ty)
        }
    }

    pub fn join(name: &str, ty: Option<TypeUsage>, extents: Vec<SymbolId>, names: &[String]) -> Self {
        let mut name_to_extent = ColumnMap::default();
        for (extent, extent_name) in extents.iter().zip(names) {
            name_to_extent.insert(extent_name, *extent);
        }
        Self {
            shape: SymbolShape::Joined(JoinSymbol {
                extent_list: extents,
                name_to_extent,
                ..JoinSymbol::default()
            }),
            ..Self::new(name, ty)
        }
    }

    pub fn as_join(&self) -> Option<&JoinSymbol> {
        match &self.shape {
            SymbolShape::Joined(join) => Some(join),
            SymbolShape::Simple => None,
        }
    }

    pub fn as_join_mut(&mut self) -> Option<&mut JoinSymbol> {
        match &mut self.shape {
            SymbolShape::Joined(join) => Some(join),
            SymbolShape::Simple => None,
        }
    }

    pub fn is_join(&self) -> bool {
        self.as_join().is_some()
    }
}

/// Owns every symbol created during one compile.
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Variable name to symbol, innermost scope first.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Vec<(String, SymbolId)>>,
}

impl SymbolTable {
    pub fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn exit_scope(&mut self) -> bool {
        self.scopes.pop().is_some()
    }

    pub fn add(&mut self, name: &str, id: SymbolId) {
        if let Some(scope) = self.scopes.last_mut() {
            match scope.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = id,
                None => scope.push((name.to_string(), id)),
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|(n, _)| n == name).map(|(_, id)| *id))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// Usage flags for optional columns. Symbols added with a common source
/// share one flag, so marking either marks both.
#[derive(Debug, Default)]
pub struct SymbolUsageManager {
    cells: Vec<bool>,
    usage: HashMap<SymbolId, usize>,
}

impl SymbolUsageManager {
    pub fn contains(&self, id: SymbolId) -> bool {
        self.usage.contains_key(&id)
    }

    pub fn add(&mut self, source: Option<SymbolId>, target: SymbolId) {
        let cell = match source.and_then(|s| self.usage.get(&s).copied()) {
            Some(cell) => cell,
            None => {
                self.cells.push(false);
                let cell = self.cells.len() - 1;
                if let Some(source) = source {
                    self.usage.insert(source, cell);
                }
                cell
            }
        };
        self.usage.insert(target, cell);
    }

    pub fn mark_used(&mut self, id: SymbolId) -> bool {
        match self.usage.get(&id) {
            Some(&cell) => {
                self.cells[cell] = true;
                true
            }
            None => false,
        }
    }

    pub fn is_used(&self, id: SymbolId) -> bool {
        self.usage.get(&id).is_some_and(|&cell| self.cells[cell])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_innermost_first() {
        let mut arena = SymbolArena::default();
        let outer = arena.alloc(Symbol::new("t", None));
        let inner = arena.alloc(Symbol::new("t", None));

        let mut table = SymbolTable::default();
        table.enter_scope();
        table.add("t", outer);
        table.enter_scope();
        table.add("t", inner);
        assert_eq!(table.lookup("t"), Some(inner));
        table.exit_scope();
        assert_eq!(table.lookup("t"), Some(outer));
        assert_eq!(table.lookup("u"), None);
    }

    #[test]
    fn test_usage_links_source_and_target() {
        let mut usage = SymbolUsageManager::default();
        let source = SymbolId(0);
        let derived = SymbolId(1);
        let unrelated = SymbolId(2);
        usage.add(Some(source), derived);
        usage.add(None, unrelated);

        assert!(!usage.is_used(source));
        usage.mark_used(derived);
        assert!(usage.is_used(source));
        assert!(!usage.is_used(unrelated));
        assert!(!usage.mark_used(SymbolId(9)));
    }

    #[test]
    fn test_column_map_is_case_insensitive() {
        let mut map = ColumnMap::default();
        map.insert("Name", SymbolId(3));
        assert_eq!(map.get("NAME"), Some(SymbolId(3)));
        map.insert("name", SymbolId(4));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Name"), Some(SymbolId(4)));
    }
}
