use serde::{Deserialize, Serialize};

use super::{EntitySet, TypeUsage, Value};

/// A typed command tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    UnaryMinus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
}

impl ComparisonOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ComparisonOp::Equals => " = ",
            ComparisonOp::NotEquals => " <> ",
            ComparisonOp::LessThan => " < ",
            ComparisonOp::LessThanOrEquals => " <= ",
            ComparisonOp::GreaterThan => " > ",
            ComparisonOp::GreaterThanOrEquals => " >= ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyKind {
    Cross,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpKind {
    UnionAll,
    Except,
    Intersect,
}

impl SetOpKind {
    pub fn sql(&self) -> &'static str {
        match self {
            SetOpKind::UnionAll => "UNION ALL",
            SetOpKind::Except => "EXCEPT",
            SetOpKind::Intersect => "INTERSECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantifierKind {
    Any,
    All,
}

/// A function reference: canonical (`Edm` namespace), store built-in, or user-defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub built_in: bool,
    #[serde(default)]
    pub niladic: bool,
    #[serde(default)]
    pub command_text: Option<String>,
}

impl Function {
    pub const CANONICAL_NAMESPACE: &'static str = "Edm";

    pub fn canonical(name: impl Into<String>) -> Self {
        Self {
            namespace: Self::CANONICAL_NAMESPACE.to_string(),
            name: name.into(),
            schema: None,
            store_name: None,
            built_in: true,
            niladic: false,
            command_text: None,
        }
    }

    pub fn store(name: impl Into<String>) -> Self {
        Self {
            namespace: "SqlServer".to_string(),
            built_in: true,
            ..Self::canonical(name)
        }
    }

    pub fn user(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            built_in: false,
            ..Self::canonical(name)
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.namespace == Self::CANONICAL_NAMESPACE
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// `var` is bound to each element of `expr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprBinding {
    pub var: String,
    pub expr: Box<Expr>,
}

impl ExprBinding {
    /// Type of the bound variable (element type of the input collection).
    pub fn var_type(&self) -> &TypeUsage {
        self.expr.ty.element_type()
    }
}

/// Input of a GroupBy: `var` ranges over elements, `group_var` over each partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub var: String,
    pub group_var: String,
    pub expr: Box<Expr>,
}

impl GroupBinding {
    pub fn var_type(&self) -> &TypeUsage {
        self.expr.ty.element_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortClause {
    pub expr: Expr,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
    #[serde(default)]
    pub collation: Option<String>,
}

fn default_ascending() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: Function,
    #[serde(default)]
    pub distinct: bool,
    pub args: Vec<Expr>,
    pub ty: TypeUsage,
}

/// One variant per node kind. Object-graph kinds are represented so they can
/// be rejected by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(Value),
    Null,
    ParameterRef(String),
    VariableRef(String),
    Property {
        instance: Box<Expr>,
        name: String,
    },
    Arithmetic {
        op: ArithmeticOp,
        args: Vec<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsEmpty(Box<Expr>),
    Like {
        input: Box<Expr>,
        pattern: Box<Expr>,
        #[serde(default)]
        escape: Option<Box<Expr>>,
    },
    In {
        item: Box<Expr>,
        list: Vec<Expr>,
    },
    Case {
        whens: Vec<Expr>,
        thens: Vec<Expr>,
        otherwise: Box<Expr>,
    },
    Cast(Box<Expr>),
    Function {
        function: Function,
        args: Vec<Expr>,
    },
    NewInstance(Vec<Expr>),
    Element(Box<Expr>),
    Quantifier {
        kind: QuantifierKind,
        input: ExprBinding,
        predicate: Box<Expr>,
    },
    Scan(EntitySet),
    Filter {
        input: ExprBinding,
        predicate: Box<Expr>,
    },
    Project {
        input: ExprBinding,
        projection: Box<Expr>,
    },
    Join {
        kind: JoinKind,
        left: ExprBinding,
        right: ExprBinding,
        condition: Box<Expr>,
    },
    CrossJoin(Vec<ExprBinding>),
    Apply {
        kind: ApplyKind,
        input: ExprBinding,
        apply: ExprBinding,
    },
    GroupBy {
        input: GroupBinding,
        keys: Vec<Expr>,
        aggregates: Vec<Aggregate>,
    },
    Sort {
        input: ExprBinding,
        keys: Vec<SortClause>,
    },
    Skip {
        input: ExprBinding,
        keys: Vec<SortClause>,
        count: Box<Expr>,
    },
    Limit {
        input: Box<Expr>,
        limit: Box<Expr>,
        #[serde(default)]
        with_ties: bool,
    },
    SetOp {
        op: SetOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Distinct(Box<Expr>),
    Lambda {
        body: Box<Expr>,
        args: Vec<Expr>,
    },
    Ref(Box<Expr>),
    Deref(Box<Expr>),
    OfType(Box<Expr>),
    Treat(Box<Expr>),
    IsOf(Box<Expr>),
    Navigate(Box<Expr>),
}

impl ExprKind {
    /// Node kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Null => "Null",
            ExprKind::ParameterRef(_) => "ParameterReference",
            ExprKind::VariableRef(_) => "VariableReference",
            ExprKind::Property { .. } => "Property",
            ExprKind::Arithmetic { .. } => "Arithmetic",
            ExprKind::Comparison { .. } => "Comparison",
            ExprKind::And(..) => "And",
            ExprKind::Or(..) => "Or",
            ExprKind::Not(_) => "Not",
            ExprKind::IsNull(_) => "IsNull",
            ExprKind::IsEmpty(_) => "IsEmpty",
            ExprKind::Like { .. } => "Like",
            ExprKind::In { .. } => "In",
            ExprKind::Case { .. } => "Case",
            ExprKind::Cast(_) => "Cast",
            ExprKind::Function { .. } => "Function",
            ExprKind::NewInstance(_) => "NewInstance",
            ExprKind::Element(_) => "Element",
            ExprKind::Quantifier { .. } => "Quantifier",
            ExprKind::Scan(_) => "Scan",
            ExprKind::Filter { .. } => "Filter",
            ExprKind::Project { .. } => "Project",
            ExprKind::Join { .. } => "Join",
            ExprKind::CrossJoin(_) => "CrossJoin",
            ExprKind::Apply { .. } => "Apply",
            ExprKind::GroupBy { .. } => "GroupBy",
            ExprKind::Sort { .. } => "Sort",
            ExprKind::Skip { .. } => "Skip",
            ExprKind::Limit { .. } => "Limit",
            ExprKind::SetOp { .. } => "SetOp",
            ExprKind::Distinct(_) => "Distinct",
            ExprKind::Lambda { .. } => "Lambda",
            ExprKind::Ref(_) => "Ref",
            ExprKind::Deref(_) => "Deref",
            ExprKind::OfType(_) => "OfType",
            ExprKind::Treat(_) => "Treat",
            ExprKind::IsOf(_) => "IsOf",
            ExprKind::Navigate(_) => "RelationshipNavigation",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeUsage) -> Self {
        Self { kind, ty }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, ExprKind::Join { .. } | ExprKind::CrossJoin(_))
    }

    pub fn is_apply(&self) -> bool {
        matches!(self.kind, ExprKind::Apply { .. })
    }

    pub fn is_scan(&self) -> bool {
        matches!(self.kind, ExprKind::Scan(_))
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Null)
    }

    /// Direct subexpressions, inputs first.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        match &self.kind {
            ExprKind::Constant(_)
            | ExprKind::Null
            | ExprKind::ParameterRef(_)
            | ExprKind::VariableRef(_)
            | ExprKind::Scan(_) => {}
            ExprKind::Property { instance, .. } => out.push(instance),
            ExprKind::Arithmetic { args, .. }
            | ExprKind::Function { args, .. }
            | ExprKind::NewInstance(args) => out.extend(args),
            ExprKind::Comparison { left, right, .. }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right)
            | ExprKind::SetOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExprKind::Not(arg)
            | ExprKind::IsNull(arg)
            | ExprKind::IsEmpty(arg)
            | ExprKind::Cast(arg)
            | ExprKind::Element(arg)
            | ExprKind::Distinct(arg)
            | ExprKind::Ref(arg)
            | ExprKind::Deref(arg)
            | ExprKind::OfType(arg)
            | ExprKind::Treat(arg)
            | ExprKind::IsOf(arg)
            | ExprKind::Navigate(arg) => out.push(arg),
            ExprKind::Like {
                input,
                pattern,
                escape,
            } => {
                out.push(input);
                out.push(pattern);
                if let Some(escape) = escape {
                    out.push(escape);
                }
            }
            ExprKind::In { item, list } => {
                out.push(item);
                out.extend(list);
            }
            ExprKind::Case {
                whens,
                thens,
                otherwise,
            } => {
                out.extend(whens);
                out.extend(thens);
                out.push(otherwise);
            }
            ExprKind::Quantifier {
                input, predicate, ..
            }
            | ExprKind::Filter { input, predicate } => {
                out.push(&input.expr);
                out.push(predicate);
            }
            ExprKind::Project { input, projection } => {
                out.push(&input.expr);
                out.push(projection);
            }
            ExprKind::Join {
                left,
                right,
                condition,
                ..
            } => {
                out.push(&left.expr);
                out.push(&right.expr);
                out.push(condition);
            }
            ExprKind::CrossJoin(inputs) => out.extend(inputs.iter().map(|b| b.expr.as_ref())),
            ExprKind::Apply { input, apply, .. } => {
                out.push(&input.expr);
                out.push(&apply.expr);
            }
            ExprKind::GroupBy {
                input,
                keys,
                aggregates,
            } => {
                out.push(&input.expr);
                out.extend(keys);
                out.extend(aggregates.iter().flat_map(|a| a.args.iter()));
            }
            ExprKind::Sort { input, keys } => {
                out.push(&input.expr);
                out.extend(keys.iter().map(|k| &k.expr));
            }
            ExprKind::Skip { input, keys, count } => {
                out.push(&input.expr);
                out.extend(keys.iter().map(|k| &k.expr));
                out.push(count);
            }
            ExprKind::Limit { input, limit, .. } => {
                out.push(input);
                out.push(limit);
            }
            ExprKind::Lambda { body, args } => {
                out.extend(args);
                out.push(body);
            }
        }
        out
    }

    /// Mutable counterpart of [`Expr::children`], same order.
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        let mut out: Vec<&mut Expr> = Vec::new();
        match &mut self.kind {
            ExprKind::Constant(_)
            | ExprKind::Null
            | ExprKind::ParameterRef(_)
            | ExprKind::VariableRef(_)
            | ExprKind::Scan(_) => {}
            ExprKind::Property { instance, .. } => out.push(instance),
            ExprKind::Arithmetic { args, .. }
            | ExprKind::Function { args, .. }
            | ExprKind::NewInstance(args) => out.extend(args),
            ExprKind::Comparison { left, right, .. }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right)
            | ExprKind::SetOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExprKind::Not(arg)
            | ExprKind::IsNull(arg)
            | ExprKind::IsEmpty(arg)
            | ExprKind::Cast(arg)
            | ExprKind::Element(arg)
            | ExprKind::Distinct(arg)
            | ExprKind::Ref(arg)
            | ExprKind::Deref(arg)
            | ExprKind::OfType(arg)
            | ExprKind::Treat(arg)
            | ExprKind::IsOf(arg)
            | ExprKind::Navigate(arg) => out.push(arg),
            ExprKind::Like {
                input,
                pattern,
                escape,
            } => {
                out.push(input);
                out.push(pattern);
                if let Some(escape) = escape {
                    out.push(escape);
                }
            }
            ExprKind::In { item, list } => {
                out.push(item);
                out.extend(list);
            }
            ExprKind::Case {
                whens,
                thens,
                otherwise,
            } => {
                out.extend(whens);
                out.extend(thens);
                out.push(otherwise);
            }
            ExprKind::Quantifier {
                input, predicate, ..
            }
            | ExprKind::Filter { input, predicate } => {
                out.push(&mut input.expr);
                out.push(predicate);
            }
            ExprKind::Project { input, projection } => {
                out.push(&mut input.expr);
                out.push(projection);
            }
            ExprKind::Join {
                left,
                right,
                condition,
                ..
            } => {
                out.push(&mut left.expr);
                out.push(&mut right.expr);
                out.push(condition);
            }
            ExprKind::CrossJoin(inputs) => out.extend(inputs.iter_mut().map(|b| b.expr.as_mut())),
            ExprKind::Apply { input, apply, .. } => {
                out.push(&mut input.expr);
                out.push(&mut apply.expr);
            }
            ExprKind::GroupBy {
                input,
                keys,
                aggregates,
            } => {
                out.push(&mut input.expr);
                out.extend(keys);
                out.extend(aggregates.iter_mut().flat_map(|a| a.args.iter_mut()));
            }
            ExprKind::Sort { input, keys } => {
                out.push(&mut input.expr);
                out.extend(keys.iter_mut().map(|k| &mut k.expr));
            }
            ExprKind::Skip { input, keys, count } => {
                out.push(&mut input.expr);
                out.extend(keys.iter_mut().map(|k| &mut k.expr));
                out.push(count);
            }
            ExprKind::Limit { input, limit, .. } => {
                out.push(input);
                out.push(limit);
            }
            ExprKind::Lambda { body, args } => {
                out.extend(args);
                out.push(body);
            }
        }
        out
    }

    /// Every variable name bound anywhere in the tree.
    pub fn bound_variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bound(&mut out);
        out
    }

    fn collect_bound<'e>(&'e self, out: &mut Vec<&'e str>) {
        match &self.kind {
            ExprKind::Quantifier { input, .. }
            | ExprKind::Filter { input, .. }
            | ExprKind::Project { input, .. }
            | ExprKind::Sort { input, .. }
            | ExprKind::Skip { input, .. } => out.push(&input.var),
            ExprKind::Join { left, right, .. } => {
                out.push(&left.var);
                out.push(&right.var);
            }
            ExprKind::CrossJoin(inputs) => out.extend(inputs.iter().map(|b| b.var.as_str())),
            ExprKind::Apply { input, apply, .. } => {
                out.push(&input.var);
                out.push(&apply.var);
            }
            ExprKind::GroupBy { input, .. } => {
                out.push(&input.var);
                out.push(&input.group_var);
            }
            _ => {}
        }
        for child in self.children() {
            child.collect_bound(out);
        }
    }
}
