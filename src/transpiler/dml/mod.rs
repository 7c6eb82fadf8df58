//! INSERT, UPDATE and DELETE generation.
//!
//! Modification trees are flat: a scan target, `property = value` set
//! clauses and an equality predicate. Constants are bound as numbered
//! parameters (`@0`, `@1`, ...) rather than inlined, and a batch of trees
//! shares one numbering so the statements can run as a single command.

mod batch;
mod insert;
mod returning;
mod update;

use std::collections::HashMap;

use crate::ast::{ComparisonOp, EntitySet, Expr, ExprKind, TypeUsage};
use crate::error::{CqtError, CqtResult};
use crate::metadata::{SqlServerManifest, StoreTypeMapper, store_type_sql};
use crate::transpiler::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParameterDescriptor, ParameterDirection};

pub use batch::generate_batch;

/// One generated modification, before batching.
#[derive(Debug, Clone)]
pub(crate) struct DmlStatement {
    /// Declarations that must precede the statement.
    pub prologue: String,
    pub body: String,
    /// Trailing SELECT that reads back server-generated values.
    pub returning: Option<String>,
}

/// Translates the scalar parts of modification trees.
pub(crate) struct DmlTranslator {
    pub(crate) dialect: Dialect,
    pub(crate) generator: Box<dyn SqlGenerator>,
    manifest: SqlServerManifest,
    parameters: Vec<ParameterDescriptor>,
    next_index: usize,
    /// Member name to the parameter holding its value, for key recovery.
    member_values: Option<HashMap<String, String>>,
    /// Qualifier for column references, e.g. `t` in `t.[Id]`.
    property_alias: Option<&'static str>,
    operation: &'static str,
}

impl DmlTranslator {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            generator: dialect.generator(),
            manifest: SqlServerManifest::new(dialect),
            parameters: Vec::new(),
            next_index: 0,
            member_values: None,
            property_alias: None,
            operation: "",
        }
    }

    /// Reset per-statement state. Parameter numbering carries over.
    pub(crate) fn begin_statement(&mut self, operation: &'static str, track_member_values: bool) {
        self.operation = operation;
        self.member_values = track_member_values.then(HashMap::new);
        self.property_alias = None;
    }

    pub(crate) fn into_parameters(self) -> Vec<ParameterDescriptor> {
        self.parameters
    }

    pub(crate) fn push_parameter(&mut self, parameter: ParameterDescriptor) {
        self.parameters.push(parameter);
    }

    pub(crate) fn member_value(&self, member: &str) -> Option<&str> {
        self.member_values
            .as_ref()
            .and_then(|values| values.get(member))
            .map(String::as_str)
    }

    pub(crate) fn store_type_text(&self, ty: &TypeUsage) -> CqtResult<String> {
        let store = self.manifest.store_type(ty)?;
        Ok(store_type_sql(self.dialect, &store))
    }

    pub(crate) fn store_type(&self, ty: &TypeUsage) -> CqtResult<crate::metadata::StoreType> {
        self.manifest.store_type(ty)
    }

    pub(crate) fn member_sql(&self, name: &str) -> String {
        self.generator.quote_identifier(name)
    }

    pub(crate) fn target_sql(&self, set: &EntitySet) -> CqtResult<String> {
        if set.defining_query.is_some() {
            return Err(CqtError::DefiningQueryTarget {
                set: set.name.clone(),
                operation: self.operation,
            });
        }
        let schema = set
            .schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&set.container);
        let table = set.table.as_deref().filter(|t| !t.is_empty()).unwrap_or(&set.name);
        Ok(format!(
            "{}.{}",
            self.generator.quote_identifier(schema),
            self.generator.quote_identifier(table)
        ))
    }

    fn create_parameter(&mut self, value: &crate::ast::Value, ty: &TypeUsage) -> CqtResult<String> {
        let name = format!("@{}", self.next_index);
        self.next_index += 1;
        self.parameters.push(ParameterDescriptor {
            name: name.clone(),
            direction: ParameterDirection::Input,
            value: Some(value.clone()),
            store_type: Some(self.store_type_text(ty)?),
        });
        Ok(name)
    }

    fn reference_parameter(&mut self, name: &str, ty: &TypeUsage) -> CqtResult<String> {
        let name = self.generator.placeholder(name);
        if !self.parameters.iter().any(|p| p.name == name) {
            self.parameters.push(ParameterDescriptor {
                name: name.clone(),
                direction: ParameterDirection::Input,
                value: None,
                store_type: Some(self.store_type_text(ty)?),
            });
        }
        Ok(name)
    }

    /// Remember the parameter just bound for `property`.
    pub(crate) fn register_member_value(&mut self, property: &Expr, value: &Expr) {
        let Some(values) = self.member_values.as_mut() else {
            return;
        };
        let ExprKind::Property { name, .. } = &property.kind else {
            return;
        };
        if !matches!(value.kind, ExprKind::Constant(_) | ExprKind::ParameterRef(_)) {
            return;
        }
        if let Some(last) = self.parameters.last() {
            values.insert(name.clone(), last.name.clone());
        }
    }

    pub(crate) fn with_alias<T>(&mut self, alias: &'static str, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.property_alias.replace(alias);
        let result = f(self);
        self.property_alias = previous;
        result
    }

    pub(crate) fn translate(&mut self, e: &Expr) -> CqtResult<String> {
        let sql = match &e.kind {
            ExprKind::And(l, r) => self.binary(l, " and ", r)?,
            ExprKind::Or(l, r) => self.binary(l, " or ", r)?,
            ExprKind::Comparison { op, left, right } => {
                let sql = self.binary(left, op.sql(), right)?;
                if *op == ComparisonOp::Equals {
                    self.register_member_value(left, right);
                }
                sql
            }
            ExprKind::IsNull(arg) => format!("{} is null", self.translate(arg)?),
            ExprKind::Not(arg) => format!("not ({})", self.translate(arg)?),
            ExprKind::Constant(value) => self.create_parameter(value, &e.ty)?,
            ExprKind::ParameterRef(name) => self.reference_parameter(name, &e.ty)?,
            ExprKind::Scan(set) => self.target_sql(set)?,
            ExprKind::Property { name, .. } => match self.property_alias {
                Some(alias) => format!("{}.{}", alias, self.member_sql(name)),
                None => self.member_sql(name),
            },
            ExprKind::Null => "null".to_string(),
            ExprKind::NewInstance(args) => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.translate(arg)?);
                }
                parts.join(", ")
            }
            _ => {
                return Err(CqtError::unsupported(format!(
                    "{} in a modification statement",
                    e.kind_name()
                )));
            }
        };
        Ok(sql)
    }

    fn binary(&mut self, left: &Expr, op: &str, right: &Expr) -> CqtResult<String> {
        let left = self.translate(left)?;
        let right = self.translate(right)?;
        Ok(format!("({}{}{})", left, op, right))
    }
}

/// The scan a modification tree targets.
pub(crate) fn target_set(target: &Expr) -> CqtResult<&EntitySet> {
    match &target.kind {
        ExprKind::Scan(set) => Ok(set),
        _ => Err(CqtError::unsupported(format!(
            "modification target {}",
            target.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EntityType, Member, Value};

    fn widgets() -> EntitySet {
        EntitySet::new(
            "Widgets",
            EntityType {
                name: "Widget".into(),
                members: vec![
                    Member::new("Id", TypeUsage::int32()),
                    Member::new("Name", TypeUsage::string()),
                ],
                keys: vec!["Id".into()],
            },
        )
    }

    #[test]
    fn test_constants_become_numbered_parameters() {
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        t.begin_statement("update", true);
        let row = Expr::var("w", widgets().element_type());
        let predicate = row
            .clone()
            .prop("Id")
            .eq(Expr::constant(5))
            .and(row.prop("Name").is_null());
        assert_eq!(t.translate(&predicate).unwrap(), "(([Id] = @0) and [Name] is null)");
        assert_eq!(t.member_value("Id"), Some("@0"));

        let params = t.into_parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].value, Some(Value::Int32(5)));
        assert_eq!(params[0].store_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_named_parameters_are_declared_once() {
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        t.begin_statement("delete", false);
        let p = Expr::param("id", TypeUsage::int32());
        let row = Expr::var("w", widgets().element_type());
        let e = row.clone().prop("Id").eq(p.clone()).or(row.prop("Id").eq(p));
        assert_eq!(t.translate(&e).unwrap(), "(([Id] = @id) or ([Id] = @id))");
        assert_eq!(t.into_parameters().len(), 1);
    }

    #[test]
    fn test_defining_query_target_is_rejected() {
        let mut set = widgets();
        set.defining_query = Some("SELECT 1 AS Id".into());
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        t.begin_statement("delete", false);
        let err = t.translate(&Expr::scan(set)).unwrap_err();
        assert!(matches!(
            err,
            CqtError::DefiningQueryTarget {
                operation: "delete",
                ..
            }
        ));
    }

    #[test]
    fn test_alias_applies_only_inside_scope() {
        let mut t = DmlTranslator::new(Dialect::Sql2012);
        t.begin_statement("insert", false);
        let id = Expr::var("w", widgets().element_type()).prop("Id");
        let aliased = t.with_alias("t", |t| t.translate(&id)).unwrap();
        assert_eq!(aliased, "t.[Id]");
        assert_eq!(t.translate(&id).unwrap(), "[Id]");
    }
}
