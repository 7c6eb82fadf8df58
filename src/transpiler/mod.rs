//! Command tree to T-SQL compilation.
//!
//! [`compile`] is the entry point for a single tree; [`compile_batch`]
//! combines same-table modification trees into one command. The [`ToSql`]
//! trait is a shorthand when only the text is needed.

pub mod dialect;
pub mod dml;
pub mod fragment;
pub mod functions;
pub mod fusion;
pub mod in_compaction;
pub mod legacy;
pub mod literal;
pub mod query;
pub mod sql;
pub mod symbol;
pub mod traits;
pub mod unicode;
pub mod writer;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{CommandTree, Expr, Function, TypeUsage, Value};
use crate::error::{CqtError, CqtResult};
use crate::metadata::{SqlServerManifest, StoreTypeMapper, store_type_sql};

pub use dialect::Dialect;
pub use query::{GeneratedQuery, Translator};
pub use traits::{SqlGenerator, escape_identifier, quote_identifier};

/// How the command text is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    Text,
    StoredProcedure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterDirection {
    Input,
    Output,
}

/// A parameter the command expects to be bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub direction: ParameterDirection,
    /// Known value, for constants lifted out of modification statements.
    pub value: Option<Value>,
    /// Store type text, e.g. `nvarchar(max)`.
    pub store_type: Option<String>,
}

/// Output of compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledCommand {
    pub sql: String,
    pub command_type: CommandType,
    pub parameters: Vec<ParameterDescriptor>,
    /// String parameters that should be bound as `varchar` rather than `nvarchar`.
    pub non_unicode_parameters: BTreeSet<String>,
    /// Output parameter receiving the affected row count, if requested.
    pub rows_affected_parameter: Option<String>,
}

/// Compilation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub dialect: Dialect,
    pub rows_affected_parameter: Option<String>,
    /// Table variable for keys captured with `OUTPUT ... INTO`.
    pub generated_keys_variable: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            rows_affected_parameter: None,
            generated_keys_variable: "@generated_keys".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_rows_affected(mut self, name: impl Into<String>) -> Self {
        self.rows_affected_parameter = Some(name.into());
        self
    }
}

/// Compile one command tree.
pub fn compile(tree: &CommandTree, options: &CompileOptions) -> CqtResult<CompiledCommand> {
    debug!(dialect = %options.dialect, "compiling command tree");
    match tree {
        CommandTree::Query { query, parameters } => {
            let generated = Translator::new(options.dialect).generate_sql(query)?;
            let descriptors = declared_parameters(
                options.dialect,
                parameters.iter().map(|p| (p.name.as_str(), &p.ty)),
            )?;
            Ok(CompiledCommand {
                sql: generated.sql,
                command_type: CommandType::Text,
                parameters: descriptors,
                non_unicode_parameters: generated.non_unicode_parameters,
                rows_affected_parameter: None,
            })
        }
        CommandTree::Insert { .. } | CommandTree::Update { .. } | CommandTree::Delete { .. } => {
            dml::generate_batch(std::slice::from_ref(tree), options)
        }
        CommandTree::Function {
            function,
            parameters,
        } => {
            let generator = options.dialect.generator();
            let descriptors = declared_parameters(
                options.dialect,
                parameters.iter().map(|p| (p.name.as_str(), &p.ty)),
            )?;
            let (sql, command_type) = function_command(generator.as_ref(), function);
            Ok(CompiledCommand {
                sql,
                command_type,
                parameters: descriptors,
                non_unicode_parameters: BTreeSet::new(),
                rows_affected_parameter: None,
            })
        }
    }
}

fn declared_parameters<'a>(
    dialect: Dialect,
    parameters: impl Iterator<Item = (&'a str, &'a TypeUsage)>,
) -> CqtResult<Vec<ParameterDescriptor>> {
    let generator = dialect.generator();
    let manifest = SqlServerManifest::new(dialect);
    parameters
        .map(|(name, ty)| {
            let store = manifest.store_type(ty)?;
            Ok(ParameterDescriptor {
                name: generator.placeholder(name),
                direction: ParameterDirection::Input,
                value: None,
                store_type: Some(store_type_sql(dialect, &store)),
            })
        })
        .collect()
}

/// Compile same-table modification trees into one command.
pub fn compile_batch(trees: &[CommandTree], options: &CompileOptions) -> CqtResult<CompiledCommand> {
    if let Some(tree) = trees.iter().find(|t| !t.is_dml()) {
        return Err(CqtError::unsupported(format!(
            "{} tree in a modification batch",
            tree_kind(tree)
        )));
    }
    dml::generate_batch(trees, options)
}

fn tree_kind(tree: &CommandTree) -> &'static str {
    match tree {
        CommandTree::Query { .. } => "query",
        CommandTree::Insert { .. } => "insert",
        CommandTree::Update { .. } => "update",
        CommandTree::Delete { .. } => "delete",
        CommandTree::Function { .. } => "function",
    }
}

/// Command text for a function tree: the function's own text when it has
/// one, otherwise a stored procedure call.
fn function_command(generator: &dyn SqlGenerator, function: &Function) -> (String, CommandType) {
    if let Some(text) = &function.command_text {
        return (text.clone(), CommandType::Text);
    }
    let schema = function.schema.as_deref().unwrap_or(&function.namespace);
    let name = function.store_name.as_deref().unwrap_or(&function.name);
    (
        format!(
            "{}.{}",
            generator.quote_identifier(schema),
            generator.quote_identifier(name)
        ),
        CommandType::StoredProcedure,
    )
}

/// Trait for turning trees into SQL text.
pub trait ToSql {
    /// SQL for the default dialect.
    fn to_sql(&self) -> CqtResult<String> {
        self.to_sql_with_dialect(Dialect::default())
    }

    fn to_sql_with_dialect(&self, dialect: Dialect) -> CqtResult<String>;
}

impl ToSql for CommandTree {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> CqtResult<String> {
        compile(self, &CompileOptions::new(dialect)).map(|c| c.sql)
    }
}

impl ToSql for Expr {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> CqtResult<String> {
        Translator::new(dialect).generate_sql(self).map(|q| q.sql)
    }
}
