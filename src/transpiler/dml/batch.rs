use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::CommandTree;
use crate::error::{CqtError, CqtResult};
use crate::transpiler::{
    CommandType, CompileOptions, CompiledCommand, ParameterDescriptor, ParameterDirection,
};

use super::insert::generate_insert;
use super::update::{generate_delete, generate_update};
use super::{DmlStatement, DmlTranslator};

/// Compile modification trees against one table into a single command.
///
/// Parameters are numbered across the whole batch. Every update or delete
/// after the first only runs if the previous statement touched a row.
pub fn generate_batch(trees: &[CommandTree], options: &CompileOptions) -> CqtResult<CompiledCommand> {
    let first = trees
        .first()
        .ok_or_else(|| CqtError::unsupported("empty modification batch"))?;
    let expected = first
        .target_name()
        .ok_or_else(|| CqtError::unsupported("modification batch of non-modification trees"))?;

    let mut t = DmlTranslator::new(options.dialect);
    let mut chunks = Vec::with_capacity(trees.len());
    let mut inserts = 0;

    for (i, tree) in trees.iter().enumerate() {
        let found = tree
            .target_name()
            .ok_or_else(|| CqtError::unsupported("modification batch of non-modification trees"))?;
        if found != expected {
            return Err(CqtError::MixedBatchTarget {
                expected: expected.clone(),
                found,
            });
        }

        let guard = i > 0;
        let statement = match tree {
            CommandTree::Insert {
                target,
                set_clauses,
                returning,
            } => {
                let variable = if inserts == 0 {
                    options.generated_keys_variable.clone()
                } else {
                    format!("{}{}", options.generated_keys_variable, inserts)
                };
                inserts += 1;
                generate_insert(&mut t, target, set_clauses, returning.as_ref(), &variable)?
            }
            CommandTree::Update {
                target,
                set_clauses,
                predicate,
                returning,
            } => generate_update(&mut t, target, set_clauses, predicate, returning.as_ref(), guard)?,
            CommandTree::Delete { target, predicate } => generate_delete(&mut t, target, predicate, guard)?,
            CommandTree::Query { .. } | CommandTree::Function { .. } => {
                return Err(CqtError::internal("non-modification tree passed the target check"));
            }
        };
        chunks.push(render(statement));
    }

    let mut sql = chunks.join("\n");
    let rows_affected_parameter = options
        .rows_affected_parameter
        .as_deref()
        .map(|name| t.generator.placeholder(name));
    let mut parameters = t.into_parameters();

    if let Some(name) = &rows_affected_parameter {
        sql.push_str(&format!("\nset {} = @@ROWCOUNT", name));
        parameters.push(ParameterDescriptor {
            name: name.clone(),
            direction: ParameterDirection::Output,
            value: None,
            store_type: Some("int".to_string()),
        });
    }

    debug!(
        statements = trees.len(),
        parameters = parameters.len(),
        target = %expected,
        "generated modification batch"
    );

    Ok(CompiledCommand {
        sql,
        command_type: CommandType::Text,
        parameters,
        non_unicode_parameters: BTreeSet::new(),
        rows_affected_parameter,
    })
}

fn render(statement: DmlStatement) -> String {
    let mut sql = statement.prologue;
    sql.push_str(&statement.body);
    if let Some(returning) = statement.returning {
        sql.push('\n');
        sql.push_str(&returning);
    }
    sql
}
