//! Ergonomic constructors for well-typed command trees.
//!
//! ```
//! use cqt::ast::*;
//!
//! let orders = EntitySet::new("Orders", EntityType {
//!     name: "Order".into(),
//!     members: vec![Member::new("Id", TypeUsage::int32())],
//!     keys: vec!["Id".into()],
//! });
//! let b = Expr::scan(orders).bind("o");
//! let query = b.clone().filter(b.var_ref().prop("Id").eq(Expr::constant(7)));
//! assert!(query.ty.is_collection());
//! ```

use super::*;

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = TypeUsage::primitive(value.kind());
        Expr::new(ExprKind::Constant(value), ty)
    }

    /// Constant with explicit facets (e.g. a non-unicode string literal).
    pub fn typed_constant(value: impl Into<Value>, ty: TypeUsage) -> Self {
        Expr::new(ExprKind::Constant(value.into()), ty)
    }

    pub fn null(ty: TypeUsage) -> Self {
        Expr::new(ExprKind::Null, ty)
    }

    pub fn param(name: impl Into<String>, ty: TypeUsage) -> Self {
        Expr::new(ExprKind::ParameterRef(name.into()), ty)
    }

    pub fn var(name: impl Into<String>, ty: TypeUsage) -> Self {
        Expr::new(ExprKind::VariableRef(name.into()), ty)
    }

    pub fn scan(set: EntitySet) -> Self {
        let ty = TypeUsage::collection(set.element_type());
        Expr::new(ExprKind::Scan(set), ty)
    }

    /// Member access, or `None` when the instance type has no such member.
    pub fn try_prop(self, name: &str) -> Option<Self> {
        let ty = self.ty.property(name)?.ty.clone();
        Some(Expr::new(
            ExprKind::Property {
                instance: Box::new(self),
                name: name.to_string(),
            },
            ty,
        ))
    }

    /// Member access.
    ///
    /// # Panics
    ///
    /// Panics if the instance type has no member called `name`. Trees built
    /// from untrusted member names should use [`Expr::try_prop`].
    pub fn prop(self, name: &str) -> Self {
        let ty_name = self.ty.type_name();
        self.try_prop(name)
            .unwrap_or_else(|| panic!("type {} has no member {}", ty_name, name))
    }

    pub fn bind(self, var: impl Into<String>) -> ExprBinding {
        ExprBinding {
            var: var.into(),
            expr: Box::new(self),
        }
    }

    pub fn group_bind(self, var: impl Into<String>, group_var: impl Into<String>) -> GroupBinding {
        GroupBinding {
            var: var.into(),
            group_var: group_var.into(),
            expr: Box::new(self),
        }
    }

    fn comparison(self, op: ComparisonOp, right: Expr) -> Self {
        Expr::new(
            ExprKind::Comparison {
                op,
                left: Box::new(self),
                right: Box::new(right),
            },
            TypeUsage::boolean(),
        )
    }

    pub fn eq(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::Equals, right)
    }

    pub fn ne(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::NotEquals, right)
    }

    pub fn lt(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::LessThan, right)
    }

    pub fn le(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::LessThanOrEquals, right)
    }

    pub fn gt(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::GreaterThan, right)
    }

    pub fn ge(self, right: Expr) -> Self {
        self.comparison(ComparisonOp::GreaterThanOrEquals, right)
    }

    pub fn and(self, right: Expr) -> Self {
        Expr::new(
            ExprKind::And(Box::new(self), Box::new(right)),
            TypeUsage::boolean(),
        )
    }

    pub fn or(self, right: Expr) -> Self {
        Expr::new(
            ExprKind::Or(Box::new(self), Box::new(right)),
            TypeUsage::boolean(),
        )
    }

    pub fn not(self) -> Self {
        Expr::new(ExprKind::Not(Box::new(self)), TypeUsage::boolean())
    }

    pub fn is_null(self) -> Self {
        Expr::new(ExprKind::IsNull(Box::new(self)), TypeUsage::boolean())
    }

    pub fn is_empty(self) -> Self {
        Expr::new(ExprKind::IsEmpty(Box::new(self)), TypeUsage::boolean())
    }

    pub fn like(self, pattern: Expr) -> Self {
        Expr::new(
            ExprKind::Like {
                input: Box::new(self),
                pattern: Box::new(pattern),
                escape: None,
            },
            TypeUsage::boolean(),
        )
    }

    pub fn like_escape(self, pattern: Expr, escape: Expr) -> Self {
        Expr::new(
            ExprKind::Like {
                input: Box::new(self),
                pattern: Box::new(pattern),
                escape: Some(Box::new(escape)),
            },
            TypeUsage::boolean(),
        )
    }

    pub fn in_list(self, list: Vec<Expr>) -> Self {
        Expr::new(
            ExprKind::In {
                item: Box::new(self),
                list,
            },
            TypeUsage::boolean(),
        )
    }

    fn arithmetic(self, op: ArithmeticOp, right: Expr) -> Self {
        let ty = self.ty.clone();
        Expr::new(
            ExprKind::Arithmetic {
                op,
                args: vec![self, right],
            },
            ty,
        )
    }

    pub fn plus(self, right: Expr) -> Self {
        self.arithmetic(ArithmeticOp::Plus, right)
    }

    pub fn minus(self, right: Expr) -> Self {
        self.arithmetic(ArithmeticOp::Minus, right)
    }

    pub fn times(self, right: Expr) -> Self {
        self.arithmetic(ArithmeticOp::Multiply, right)
    }

    pub fn divide(self, right: Expr) -> Self {
        self.arithmetic(ArithmeticOp::Divide, right)
    }

    pub fn modulo(self, right: Expr) -> Self {
        self.arithmetic(ArithmeticOp::Modulo, right)
    }

    pub fn negate(self) -> Self {
        let ty = self.ty.clone();
        Expr::new(
            ExprKind::Arithmetic {
                op: ArithmeticOp::UnaryMinus,
                args: vec![self],
            },
            ty,
        )
    }

    pub fn cast(self, ty: TypeUsage) -> Self {
        Expr::new(ExprKind::Cast(Box::new(self)), ty)
    }

    pub fn case(whens: Vec<Expr>, thens: Vec<Expr>, otherwise: Expr) -> Self {
        let ty = otherwise.ty.clone();
        Expr::new(
            ExprKind::Case {
                whens,
                thens,
                otherwise: Box::new(otherwise),
            },
            ty,
        )
    }

    pub fn call(function: Function, args: Vec<Expr>, ty: TypeUsage) -> Self {
        Expr::new(ExprKind::Function { function, args }, ty)
    }

    /// Row constructor from `(name, value)` pairs.
    pub fn row(fields: Vec<(&str, Expr)>) -> Self {
        let members = fields
            .iter()
            .map(|(name, e)| Member::new(*name, e.ty.clone()))
            .collect();
        let args = fields.into_iter().map(|(_, e)| e).collect();
        Expr::new(ExprKind::NewInstance(args), TypeUsage::row(members))
    }

    /// Collection constructor over elements of type `element`.
    pub fn collection(items: Vec<Expr>, element: TypeUsage) -> Self {
        Expr::new(
            ExprKind::NewInstance(items),
            TypeUsage::collection(element),
        )
    }

    pub fn element(self) -> Self {
        let ty = self.ty.element_type().clone();
        Expr::new(ExprKind::Element(Box::new(self)), ty)
    }

    pub fn distinct(self) -> Self {
        let ty = self.ty.clone();
        Expr::new(ExprKind::Distinct(Box::new(self)), ty)
    }

    pub fn limit(self, count: Expr) -> Self {
        let ty = self.ty.clone();
        Expr::new(
            ExprKind::Limit {
                input: Box::new(self),
                limit: Box::new(count),
                with_ties: false,
            },
            ty,
        )
    }

    pub fn limit_with_ties(self, count: Expr) -> Self {
        let mut e = self.limit(count);
        if let ExprKind::Limit { with_ties, .. } = &mut e.kind {
            *with_ties = true;
        }
        e
    }

    fn set_op(self, op: SetOpKind, right: Expr) -> Self {
        let ty = self.ty.clone();
        Expr::new(
            ExprKind::SetOp {
                op,
                left: Box::new(self),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn union_all(self, right: Expr) -> Self {
        self.set_op(SetOpKind::UnionAll, right)
    }

    pub fn except(self, right: Expr) -> Self {
        self.set_op(SetOpKind::Except, right)
    }

    pub fn intersect(self, right: Expr) -> Self {
        self.set_op(SetOpKind::Intersect, right)
    }

    fn binary_join(kind: JoinKind, left: ExprBinding, right: ExprBinding, condition: Expr) -> Self {
        let ty = join_type(&[&left, &right]);
        Expr::new(
            ExprKind::Join {
                kind,
                left,
                right,
                condition: Box::new(condition),
            },
            ty,
        )
    }

    pub fn inner_join(left: ExprBinding, right: ExprBinding, condition: Expr) -> Self {
        Self::binary_join(JoinKind::Inner, left, right, condition)
    }

    pub fn left_join(left: ExprBinding, right: ExprBinding, condition: Expr) -> Self {
        Self::binary_join(JoinKind::LeftOuter, left, right, condition)
    }

    pub fn full_join(left: ExprBinding, right: ExprBinding, condition: Expr) -> Self {
        Self::binary_join(JoinKind::FullOuter, left, right, condition)
    }

    pub fn cross_join(inputs: Vec<ExprBinding>) -> Self {
        let refs: Vec<&ExprBinding> = inputs.iter().collect();
        let ty = join_type(&refs);
        Expr::new(ExprKind::CrossJoin(inputs), ty)
    }

    pub fn apply(kind: ApplyKind, input: ExprBinding, apply: ExprBinding) -> Self {
        let ty = join_type(&[&input, &apply]);
        Expr::new(ExprKind::Apply { kind, input, apply }, ty)
    }

    /// GroupBy whose result row has the named keys followed by the named aggregates.
    pub fn group_by(
        input: GroupBinding,
        keys: Vec<(&str, Expr)>,
        aggregates: Vec<(&str, Aggregate)>,
    ) -> Self {
        let mut members: Vec<Member> = keys
            .iter()
            .map(|(name, e)| Member::new(*name, e.ty.clone()))
            .collect();
        members.extend(
            aggregates
                .iter()
                .map(|(name, a)| Member::new(*name, a.ty.clone())),
        );
        Expr::new(
            ExprKind::GroupBy {
                input,
                keys: keys.into_iter().map(|(_, e)| e).collect(),
                aggregates: aggregates.into_iter().map(|(_, a)| a).collect(),
            },
            TypeUsage::collection(TypeUsage::row(members)),
        )
    }
}

/// Row type `{var: element, ...}` of a join over `inputs`.
fn join_type(inputs: &[&ExprBinding]) -> TypeUsage {
    let members = inputs
        .iter()
        .map(|b| Member::new(b.var.clone(), b.var_type().clone()))
        .collect();
    TypeUsage::collection(TypeUsage::row(members))
}

impl ExprBinding {
    /// Reference to the bound variable.
    pub fn var_ref(&self) -> Expr {
        Expr::var(self.var.clone(), self.var_type().clone())
    }

    pub fn filter(self, predicate: Expr) -> Expr {
        let ty = self.expr.ty.clone();
        Expr::new(
            ExprKind::Filter {
                input: self,
                predicate: Box::new(predicate),
            },
            ty,
        )
    }

    pub fn project(self, projection: Expr) -> Expr {
        let ty = TypeUsage::collection(projection.ty.clone());
        Expr::new(
            ExprKind::Project {
                input: self,
                projection: Box::new(projection),
            },
            ty,
        )
    }

    pub fn sort(self, keys: Vec<SortClause>) -> Expr {
        let ty = self.expr.ty.clone();
        Expr::new(ExprKind::Sort { input: self, keys }, ty)
    }

    pub fn skip(self, keys: Vec<SortClause>, count: Expr) -> Expr {
        let ty = self.expr.ty.clone();
        Expr::new(
            ExprKind::Skip {
                input: self,
                keys,
                count: Box::new(count),
            },
            ty,
        )
    }

    pub fn any(self, predicate: Expr) -> Expr {
        Expr::new(
            ExprKind::Quantifier {
                kind: QuantifierKind::Any,
                input: self,
                predicate: Box::new(predicate),
            },
            TypeUsage::boolean(),
        )
    }

    pub fn all(self, predicate: Expr) -> Expr {
        Expr::new(
            ExprKind::Quantifier {
                kind: QuantifierKind::All,
                input: self,
                predicate: Box::new(predicate),
            },
            TypeUsage::boolean(),
        )
    }
}

impl GroupBinding {
    pub fn var_ref(&self) -> Expr {
        Expr::var(self.var.clone(), self.var_type().clone())
    }

    pub fn group_var_ref(&self) -> Expr {
        Expr::var(self.group_var.clone(), self.var_type().clone())
    }
}

impl SortClause {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
            collation: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
            collation: None,
        }
    }

    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

impl Aggregate {
    pub fn new(function: Function, args: Vec<Expr>, ty: TypeUsage) -> Self {
        Self {
            function,
            distinct: false,
            args,
            ty,
        }
    }

    pub fn count(arg: Expr) -> Self {
        Self::new(Function::canonical("Count"), vec![arg], TypeUsage::int32())
    }

    pub fn sum(arg: Expr) -> Self {
        let ty = arg.ty.clone();
        Self::new(Function::canonical("Sum"), vec![arg], ty)
    }

    pub fn max(arg: Expr) -> Self {
        let ty = arg.ty.clone();
        Self::new(Function::canonical("Max"), vec![arg], ty)
    }

    pub fn min(arg: Expr) -> Self {
        let ty = arg.ty.clone();
        Self::new(Function::canonical("Min"), vec![arg], ty)
    }

    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}
