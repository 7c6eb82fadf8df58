use serde::{Deserialize, Serialize};

use super::{Expr, ExprBinding, ExprKind, Function, TypeUsage};

/// A declared query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub ty: TypeUsage,
}

/// `property = value` inside an insert or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    pub property: Expr,
    pub value: Expr,
}

impl SetClause {
    pub fn new(property: Expr, value: Expr) -> Self {
        Self { property, value }
    }
}

/// Argument of a function command tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: TypeUsage,
}

/// Root of everything the compiler accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandTree {
    Query {
        query: Expr,
        #[serde(default)]
        parameters: Vec<QueryParameter>,
    },
    Insert {
        target: ExprBinding,
        set_clauses: Vec<SetClause>,
        #[serde(default)]
        returning: Option<Expr>,
    },
    Update {
        target: ExprBinding,
        set_clauses: Vec<SetClause>,
        predicate: Expr,
        #[serde(default)]
        returning: Option<Expr>,
    },
    Delete {
        target: ExprBinding,
        predicate: Expr,
    },
    Function {
        function: Function,
        #[serde(default)]
        parameters: Vec<FunctionParameter>,
    },
}

impl CommandTree {
    pub fn query(query: Expr) -> Self {
        CommandTree::Query {
            query,
            parameters: Vec::new(),
        }
    }

    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            CommandTree::Insert { .. } | CommandTree::Update { .. } | CommandTree::Delete { .. }
        )
    }

    /// DML target binding, if any.
    pub fn target(&self) -> Option<&ExprBinding> {
        match self {
            CommandTree::Insert { target, .. }
            | CommandTree::Update { target, .. }
            | CommandTree::Delete { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Display name of the DML target table, e.g. `dbo.Orders`.
    pub fn target_name(&self) -> Option<String> {
        let target = self.target()?;
        match &target.expr.kind {
            ExprKind::Scan(set) => Some(format!(
                "{}.{}",
                set.schema.as_deref().unwrap_or(&set.container),
                set.table.as_deref().unwrap_or(&set.name)
            )),
            _ => None,
        }
    }
}
