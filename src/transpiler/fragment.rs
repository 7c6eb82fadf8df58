//! SQL fragment IR.
//!
//! A fragment is either text built from parts ([`SqlBuilder`]) or a mutable
//! [`SelectStatement`] that operators keep extending until something forces
//! it to be wrapped as a derived table.

use super::symbol::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub usize);

#[derive(Debug, Clone)]
pub enum SqlPart {
    Text(String),
    Symbol(SymbolId),
    Statement(StmtId),
    Builder(SqlBuilder),
}

/// Text assembled from literal strings, symbols (named at write time) and
/// nested statements.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    parts: Vec<SqlPart>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(s: impl Into<String>) -> Self {
        let mut b = Self::new();
        b.push_str(s);
        b
    }

    pub fn push_str(&mut self, s: impl Into<String>) {
        let s = s.into();
        if s.is_empty() {
            return;
        }
        // merge adjacent text
        if let Some(SqlPart::Text(last)) = self.parts.last_mut() {
            last.push_str(&s);
        } else {
            self.parts.push(SqlPart::Text(s));
        }
    }

    pub fn push_symbol(&mut self, id: SymbolId) {
        self.parts.push(SqlPart::Symbol(id));
    }

    pub fn push_statement(&mut self, id: StmtId) {
        self.parts.push(SqlPart::Statement(id));
    }

    pub fn push_builder(&mut self, b: SqlBuilder) {
        if !b.is_empty() {
            self.parts.push(SqlPart::Builder(b));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[SqlPart] {
        &self.parts
    }
}

/// A column added by `*` expansion. Written only if its symbol gets used.
#[derive(Debug, Clone)]
pub struct OptionalColumn {
    pub sql: SqlBuilder,
    pub symbol: SymbolId,
}

#[derive(Debug, Clone)]
pub struct TopClause {
    pub count: SqlBuilder,
    pub with_ties: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SelectClause {
    pub regular: SqlBuilder,
    pub optional_columns: Vec<OptionalColumn>,
    pub distinct: bool,
    pub top: Option<TopClause>,
    pub skip: Option<SqlBuilder>,
}

impl SelectClause {
    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.optional_columns.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    pub select: SelectClause,
    pub from: SqlBuilder,
    pub where_clause: SqlBuilder,
    pub group_by: SqlBuilder,
    pub order_by: SqlBuilder,
    pub is_topmost: bool,
    pub from_extents: Vec<SymbolId>,
    /// Set while a join is being flattened into this statement.
    pub all_join_extents: Option<Vec<SymbolId>>,
    pub outer_extents: Vec<SymbolId>,
    pub output_columns: Option<super::symbol::ColumnMap>,
    pub output_columns_renamed: bool,
}

impl SelectStatement {
    pub fn add_outer_extent(&mut self, id: SymbolId) {
        if !self.outer_extents.contains(&id) {
            self.outer_extents.push(id);
        }
    }
}
