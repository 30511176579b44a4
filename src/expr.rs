//! The expression IR.
//!
//! A closed sum type: every consumer (the traversal, the evaluator, the
//! printer) matches exhaustively over [`ExprKind`], so adding a kind is a
//! single compile-time-checked change.  Nodes are immutable and shared as
//! `Rc<Expr>`.
//!
//! The constructors below are thin: they compute the static type and lifting
//! flags a typed frontend would assign, and never validate operand types.

use std::rc::Rc;

use crate::host::{Constructor, Member, Method};
use crate::types::{Signature, Type};
use crate::value::{IntoValue, Value};

/// A lambda parameter.  Identity is the allocation, not the name.
#[derive(Debug)]
pub struct Parameter {
    name: Rc<str>,
    ty: Type,
}

impl Parameter {
    pub fn new<S: AsRef<str>>(name: S, ty: Type) -> Rc<Parameter> {
        Rc::new(Parameter {
            name: Rc::from(name.as_ref()),
            ty,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    AddChecked,
    Subtract,
    SubtractChecked,
    Multiply,
    MultiplyChecked,
    Divide,
    Modulo,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
    ArrayIndex,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::AddChecked => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::SubtractChecked => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::MultiplyChecked => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
            BinaryOp::ArrayIndex => "[]",
        }
    }

    pub fn is_checked(self) -> bool {
        matches!(
            self,
            BinaryOp::AddChecked | BinaryOp::SubtractChecked | BinaryOp::MultiplyChecked
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    /// Ordering or equality: the result is boolean.
    pub fn is_comparison(self) -> bool {
        self.is_ordering() || self.is_equality()
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    NegateChecked,
    UnaryPlus,
    Not,
    Convert,
    ConvertChecked,
    TypeAs,
    ArrayLength,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::NegateChecked => "-",
            UnaryOp::UnaryPlus => "+",
            UnaryOp::Not => "!",
            UnaryOp::Convert => "Convert",
            UnaryOp::ConvertChecked => "ConvertChecked",
            UnaryOp::TypeAs => "as",
            UnaryOp::ArrayLength => "ArrayLength",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Rc<Expr>,
    pub right: Rc<Expr>,
    pub method: Option<Method>,
    pub lifted: bool,
    pub lifted_to_null: bool,
    /// Conversion lambda applied to a present left operand of `Coalesce`.
    pub conversion: Option<Rc<Expr>>,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Rc<Expr>,
    pub method: Option<Method>,
    pub lifted: bool,
    pub lifted_to_null: bool,
}

#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    /// `None` for static methods.
    pub receiver: Option<Rc<Expr>>,
    pub method: Method,
    pub args: Vec<Rc<Expr>>,
}

#[derive(Debug, Clone)]
pub struct MemberExpr {
    /// `None` for static members.
    pub instance: Option<Rc<Expr>>,
    pub member: Member,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    /// `None` default-initializes the node type.
    pub constructor: Option<Constructor>,
    pub args: Vec<Rc<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewArrayKind {
    /// Elements listed explicitly.
    Init,
    /// One length expression per dimension.
    Bounds,
}

#[derive(Debug, Clone)]
pub struct NewArrayExpr {
    pub kind: NewArrayKind,
    pub element: Type,
    pub exprs: Vec<Rc<Expr>>,
}

/// One `add(args...)` call of a collection initializer.
#[derive(Debug, Clone)]
pub struct ElementInit {
    pub add: Method,
    pub args: Vec<Rc<Expr>>,
}

impl ElementInit {
    pub fn new(add: Method, args: Vec<Rc<Expr>>) -> Self {
        ElementInit { add, args }
    }
}

#[derive(Debug, Clone)]
pub struct ListInitExpr {
    pub new: Rc<Expr>,
    pub initializers: Vec<ElementInit>,
}

#[derive(Debug, Clone)]
pub enum MemberBinding {
    /// `member = expr`
    Assignment { member: Member, expr: Rc<Expr> },
    /// `member = { add(..), add(..) }` against the existing collection.
    List {
        member: Member,
        initializers: Vec<ElementInit>,
    },
    /// `member = { a = .., b = .. }` against the existing nested value.
    Member {
        member: Member,
        bindings: Vec<MemberBinding>,
    },
}

impl MemberBinding {
    pub fn assign(member: Member, expr: Rc<Expr>) -> Self {
        MemberBinding::Assignment { member, expr }
    }

    pub fn list(member: Member, initializers: Vec<ElementInit>) -> Self {
        MemberBinding::List {
            member,
            initializers,
        }
    }

    pub fn nested(member: Member, bindings: Vec<MemberBinding>) -> Self {
        MemberBinding::Member { member, bindings }
    }

    pub fn member(&self) -> &Member {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::List { member, .. }
            | MemberBinding::Member { member, .. } => member,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberInitExpr {
    pub new: Rc<Expr>,
    pub bindings: Vec<MemberBinding>,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpr {
    pub test: Rc<Expr>,
    pub if_true: Rc<Expr>,
    pub if_false: Rc<Expr>,
}

#[derive(Debug, Clone)]
pub struct TypeTestExpr {
    pub operand: Rc<Expr>,
    pub target: Type,
}

/// A function literal.
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Rc<Parameter>>,
    pub body: Rc<Expr>,
    pub signature: Rc<Signature>,
}

#[derive(Debug, Clone)]
pub struct InvocationExpr {
    pub callee: Rc<Expr>,
    pub args: Vec<Rc<Expr>>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Value),
    Parameter(Rc<Parameter>),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    MethodCall(MethodCallExpr),
    MemberAccess(MemberExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    ListInit(ListInitExpr),
    MemberInit(MemberInitExpr),
    Conditional(ConditionalExpr),
    TypeTest(TypeTestExpr),
    Lambda(LambdaExpr),
    Invocation(InvocationExpr),
    Quote(Rc<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Rc<Expr> {
        Rc::new(Expr { kind, ty })
    }

    /// Short name of the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Parameter(_) => "Parameter",
            ExprKind::Binary(_) => "Binary",
            ExprKind::Unary(_) => "Unary",
            ExprKind::MethodCall(_) => "MethodCall",
            ExprKind::MemberAccess(_) => "MemberAccess",
            ExprKind::New(_) => "New",
            ExprKind::NewArray(_) => "NewArray",
            ExprKind::ListInit(_) => "ListInit",
            ExprKind::MemberInit(_) => "MemberInit",
            ExprKind::Conditional(_) => "Conditional",
            ExprKind::TypeTest(_) => "TypeTest",
            ExprKind::Lambda(_) => "Lambda",
            ExprKind::Invocation(_) => "Invocation",
            ExprKind::Quote(_) => "Quote",
        }
    }

    pub fn as_lambda(&self) -> Option<&LambdaExpr> {
        match &self.kind {
            ExprKind::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    // ── leaves ──────────────────────────────────────────────────────────────

    pub fn constant<V: IntoValue>(value: V) -> Rc<Expr> {
        let value = value.into_value();
        let ty = value.natural_type();
        Expr::new(ExprKind::Constant(value), ty)
    }

    pub fn typed_constant<V: IntoValue>(value: V, ty: Type) -> Rc<Expr> {
        Expr::new(ExprKind::Constant(value.into_value()), ty)
    }

    pub fn parameter(param: &Rc<Parameter>) -> Rc<Expr> {
        Expr::new(ExprKind::Parameter(Rc::clone(param)), param.ty().clone())
    }

    // ── binary ──────────────────────────────────────────────────────────────

    /// Binary node over primitive operands.  Arithmetic over an optional
    /// operand lifts to null; comparisons lift partially (result `bool`).
    pub fn binary(op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        match op {
            BinaryOp::Coalesce => return Expr::coalesce(left, right, None),
            BinaryOp::ArrayIndex => return Expr::array_index(left, right),
            _ => {}
        }
        let lifted = left.ty.is_nullable() || right.ty.is_nullable();
        let (ty, lifted_to_null) = if op.is_comparison() {
            (Type::BOOL, false)
        } else {
            let operand = left.ty.unlifted().clone();
            if lifted {
                (Type::nullable(operand), true)
            } else {
                (operand, false)
            }
        };
        Expr::binary_node(op, left, right, None, lifted, lifted_to_null, ty)
    }

    /// Comparison whose absent operands propagate to an absent `bool?`.
    pub fn binary_lifted_to_null(op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
        let lifted = left.ty.is_nullable() || right.ty.is_nullable();
        if !op.is_comparison() || !lifted {
            return Expr::binary(op, left, right);
        }
        Expr::binary_node(op, left, right, None, true, true, Type::nullable(Type::BOOL))
    }

    /// Binary node backed by a user-defined operator method.
    pub fn binary_with_method(
        op: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
        method: Method,
        lift_to_null: bool,
    ) -> Rc<Expr> {
        let params = method.params();
        let unwraps = |operand: &Expr, index: usize| {
            operand.ty.is_nullable() && params.get(index).is_some_and(|p| !p.is_nullable())
        };
        let lifted = unwraps(&left, 0) || unwraps(&right, 1);
        let ret = method.ret().clone();
        let (ty, lifted_to_null) = match (lifted, op.is_comparison() && !lift_to_null) {
            (false, _) => (ret, false),
            (true, true) => (ret, false),
            (true, false) => (Type::nullable(ret), true),
        };
        Expr::binary_node(op, left, right, Some(method), lifted, lifted_to_null, ty)
    }

    /// `left ?? right`, optionally passing a present left value through
    /// `conversion` (a one-parameter lambda).
    pub fn coalesce(left: Rc<Expr>, right: Rc<Expr>, conversion: Option<Rc<Expr>>) -> Rc<Expr> {
        let ty = match conversion.as_ref().and_then(|c| c.ty.signature().cloned()) {
            Some(sig) => sig.ret.clone(),
            None if left.ty.is_nullable() && !right.ty.is_nullable() => right.ty.clone(),
            None => left.ty.clone(),
        };
        Expr::new(
            ExprKind::Binary(BinaryExpr {
                op: BinaryOp::Coalesce,
                left,
                right,
                method: None,
                lifted: false,
                lifted_to_null: false,
                conversion,
            }),
            ty,
        )
    }

    pub fn array_index(array: Rc<Expr>, index: Rc<Expr>) -> Rc<Expr> {
        let ty = match &array.ty {
            Type::Array { element, .. } => (**element).clone(),
            _ => Type::Object,
        };
        Expr::binary_node(BinaryOp::ArrayIndex, array, index, None, false, false, ty)
    }

    /// Fully explicit binary node.
    pub fn binary_node(
        op: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
        method: Option<Method>,
        lifted: bool,
        lifted_to_null: bool,
        ty: Type,
    ) -> Rc<Expr> {
        Expr::new(
            ExprKind::Binary(BinaryExpr {
                op,
                left,
                right,
                method,
                lifted,
                lifted_to_null,
                conversion: None,
            }),
            ty,
        )
    }

    // ── unary ───────────────────────────────────────────────────────────────

    /// Unary node with lifting computed from the operand and target types.
    pub fn unary(op: UnaryOp, operand: Rc<Expr>, ty: Type) -> Rc<Expr> {
        let lifted = match op {
            UnaryOp::Convert | UnaryOp::ConvertChecked => {
                operand.ty.is_nullable() && ty.is_nullable()
            }
            UnaryOp::TypeAs | UnaryOp::ArrayLength => false,
            _ => operand.ty.is_nullable(),
        };
        Expr::new(
            ExprKind::Unary(UnaryExpr {
                op,
                operand,
                method: None,
                lifted,
                lifted_to_null: lifted,
            }),
            ty,
        )
    }

    pub fn negate(operand: Rc<Expr>) -> Rc<Expr> {
        let ty = operand.ty.clone();
        Expr::unary(UnaryOp::Negate, operand, ty)
    }

    pub fn negate_checked(operand: Rc<Expr>) -> Rc<Expr> {
        let ty = operand.ty.clone();
        Expr::unary(UnaryOp::NegateChecked, operand, ty)
    }

    pub fn unary_plus(operand: Rc<Expr>) -> Rc<Expr> {
        let ty = operand.ty.clone();
        Expr::unary(UnaryOp::UnaryPlus, operand, ty)
    }

    pub fn not(operand: Rc<Expr>) -> Rc<Expr> {
        let ty = operand.ty.clone();
        Expr::unary(UnaryOp::Not, operand, ty)
    }

    pub fn convert(operand: Rc<Expr>, ty: Type) -> Rc<Expr> {
        Expr::unary(UnaryOp::Convert, operand, ty)
    }

    pub fn convert_checked(operand: Rc<Expr>, ty: Type) -> Rc<Expr> {
        Expr::unary(UnaryOp::ConvertChecked, operand, ty)
    }

    pub fn type_as(operand: Rc<Expr>, ty: Type) -> Rc<Expr> {
        Expr::unary(UnaryOp::TypeAs, operand, ty)
    }

    pub fn array_length(array: Rc<Expr>) -> Rc<Expr> {
        Expr::unary(UnaryOp::ArrayLength, array, Type::I32)
    }

    /// Unary node backed by a user-defined operator or conversion method.
    pub fn unary_with_method(op: UnaryOp, operand: Rc<Expr>, method: Method, ty: Type) -> Rc<Expr> {
        let lifted = operand.ty.is_nullable()
            && ty.is_nullable()
            && method.params().first().is_some_and(|p| !p.is_nullable());
        Expr::new(
            ExprKind::Unary(UnaryExpr {
                op,
                operand,
                method: Some(method),
                lifted,
                lifted_to_null: lifted,
            }),
            ty,
        )
    }

    // ── calls and members ───────────────────────────────────────────────────

    pub fn call(receiver: Rc<Expr>, method: Method, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        let ty = method.ret().clone();
        Expr::new(
            ExprKind::MethodCall(MethodCallExpr {
                receiver: Some(receiver),
                method,
                args,
            }),
            ty,
        )
    }

    pub fn call_static(method: Method, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        let ty = method.ret().clone();
        Expr::new(
            ExprKind::MethodCall(MethodCallExpr {
                receiver: None,
                method,
                args,
            }),
            ty,
        )
    }

    pub fn member(instance: Rc<Expr>, member: Member) -> Rc<Expr> {
        let ty = member.ty().clone();
        Expr::new(
            ExprKind::MemberAccess(MemberExpr {
                instance: Some(instance),
                member,
            }),
            ty,
        )
    }

    pub fn static_member(member: Member) -> Rc<Expr> {
        let ty = member.ty().clone();
        Expr::new(
            ExprKind::MemberAccess(MemberExpr {
                instance: None,
                member,
            }),
            ty,
        )
    }

    pub fn invoke(callee: Rc<Expr>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        let ty = callee
            .ty
            .signature()
            .map_or(Type::Object, |sig| sig.ret.clone());
        Expr::new(ExprKind::Invocation(InvocationExpr { callee, args }), ty)
    }

    // ── construction ────────────────────────────────────────────────────────

    pub fn new_object(ty: Type, constructor: Constructor, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        Expr::new(
            ExprKind::New(NewExpr {
                constructor: Some(constructor),
                args,
            }),
            ty,
        )
    }

    /// Default-initialized value of `ty`.
    pub fn new_default(ty: Type) -> Rc<Expr> {
        Expr::new(
            ExprKind::New(NewExpr {
                constructor: None,
                args: Vec::new(),
            }),
            ty,
        )
    }

    pub fn new_array_init(element: Type, exprs: Vec<Rc<Expr>>) -> Rc<Expr> {
        let ty = Type::array(element.clone());
        Expr::new(
            ExprKind::NewArray(NewArrayExpr {
                kind: NewArrayKind::Init,
                element,
                exprs,
            }),
            ty,
        )
    }

    pub fn new_array_bounds(element: Type, bounds: Vec<Rc<Expr>>) -> Rc<Expr> {
        let ty = Type::array_of_rank(element.clone(), bounds.len());
        Expr::new(
            ExprKind::NewArray(NewArrayExpr {
                kind: NewArrayKind::Bounds,
                element,
                exprs: bounds,
            }),
            ty,
        )
    }

    pub fn list_init(new: Rc<Expr>, initializers: Vec<ElementInit>) -> Rc<Expr> {
        let ty = new.ty.clone();
        Expr::new(ExprKind::ListInit(ListInitExpr { new, initializers }), ty)
    }

    pub fn member_init(new: Rc<Expr>, bindings: Vec<MemberBinding>) -> Rc<Expr> {
        let ty = new.ty.clone();
        Expr::new(ExprKind::MemberInit(MemberInitExpr { new, bindings }), ty)
    }

    // ── control and typing ──────────────────────────────────────────────────

    pub fn condition(test: Rc<Expr>, if_true: Rc<Expr>, if_false: Rc<Expr>) -> Rc<Expr> {
        let ty = if_true.ty.clone();
        Expr::new(
            ExprKind::Conditional(ConditionalExpr {
                test,
                if_true,
                if_false,
            }),
            ty,
        )
    }

    pub fn type_is(operand: Rc<Expr>, target: Type) -> Rc<Expr> {
        Expr::new(ExprKind::TypeTest(TypeTestExpr { operand, target }), Type::BOOL)
    }

    // ── function literals ───────────────────────────────────────────────────

    /// Function literal returning the body's type (an action if it is void).
    pub fn lambda(params: Vec<Rc<Parameter>>, body: Rc<Expr>) -> Rc<Expr> {
        let ret = body.ty.clone();
        Expr::lambda_returning(params, body, ret)
    }

    /// Function literal with an explicit return type; `Type::Void` declares
    /// an action that discards the body's value.
    pub fn lambda_returning(params: Vec<Rc<Parameter>>, body: Rc<Expr>, ret: Type) -> Rc<Expr> {
        let signature = Rc::new(Signature::new(
            params.iter().map(|p| p.ty().clone()).collect(),
            ret,
        ));
        let ty = Type::Function(Rc::clone(&signature));
        Expr::new(
            ExprKind::Lambda(LambdaExpr {
                params,
                body,
                signature,
            }),
            ty,
        )
    }

    pub fn quote(lambda: Rc<Expr>) -> Rc<Expr> {
        let ty = match lambda.ty.signature() {
            Some(sig) => Type::Quoted(Rc::clone(sig)),
            None => Type::Object,
        };
        Expr::new(ExprKind::Quote(lambda), ty)
    }
}
