use std::fmt;

use crate::expr::{
    BinaryOp, ElementInit, Expr, ExprKind, MemberBinding, NewArrayKind, UnaryOp,
};
use crate::value::Value;

/// Renders IR in an infix form, e.g. `(a, b) => (a + b)`.
pub struct ExprPrinter;

impl ExprPrinter {
    pub fn print(expr: &Expr) -> String {
        match &expr.kind {
            // ── leaves ──────────────────────────────────────────────────
            ExprKind::Constant(value) => match value {
                Value::Str(s) => format!("\"{}\"", s),

                Value::Char(c) => format!("'{}'", c),

                other => other.to_string(),
            },

            ExprKind::Parameter(param) => param.name().to_string(),

            // ── operators ───────────────────────────────────────────────
            ExprKind::Binary(b) => match b.op {
                BinaryOp::ArrayIndex => format!("{}[{}]", Self::print(&b.left), Self::print(&b.right)),

                BinaryOp::AddChecked | BinaryOp::SubtractChecked | BinaryOp::MultiplyChecked => {
                    format!(
                        "checked({} {} {})",
                        Self::print(&b.left),
                        b.op.symbol(),
                        Self::print(&b.right)
                    )
                }

                op => format!(
                    "({} {} {})",
                    Self::print(&b.left),
                    op.symbol(),
                    Self::print(&b.right)
                ),
            },

            ExprKind::Unary(u) => match u.op {
                UnaryOp::Convert | UnaryOp::ConvertChecked => {
                    format!("{}({}, {})", u.op.name(), Self::print(&u.operand), expr.ty)
                }

                UnaryOp::TypeAs => format!("({} as {})", Self::print(&u.operand), expr.ty),

                UnaryOp::ArrayLength => format!("{}.len", Self::print(&u.operand)),

                UnaryOp::NegateChecked => format!("checked(-{})", Self::print(&u.operand)),

                op => format!("{}{}", op.name(), Self::print(&u.operand)),
            },

            // ── calls and members ───────────────────────────────────────
            ExprKind::MethodCall(call) => {
                let target = match &call.receiver {
                    Some(receiver) => Self::print(receiver),
                    None => "static".to_string(),
                };
                format!("{}.{}({})", target, call.method.name(), Self::list(&call.args))
            }

            ExprKind::MemberAccess(access) => match &access.instance {
                Some(instance) => format!("{}.{}", Self::print(instance), access.member.name()),

                None => match access.member.declaring() {
                    Some(class) => format!("{}.{}", class.name(), access.member.name()),

                    None => access.member.name().to_string(),
                },
            },

            ExprKind::Invocation(inv) => {
                format!("{}({})", Self::print(&inv.callee), Self::list(&inv.args))
            }

            // ── construction ────────────────────────────────────────────
            ExprKind::New(new) => format!("new {}({})", expr.ty, Self::list(&new.args)),

            ExprKind::NewArray(arr) => match arr.kind {
                NewArrayKind::Init => format!("new {}[] {{{}}}", arr.element, Self::list(&arr.exprs)),

                NewArrayKind::Bounds => format!("new {}[{}]", arr.element, Self::list(&arr.exprs)),
            },

            ExprKind::ListInit(init) => format!(
                "{} {{{}}}",
                Self::print(&init.new),
                Self::initializers(&init.initializers)
            ),

            ExprKind::MemberInit(init) => format!(
                "{} {{{}}}",
                Self::print(&init.new),
                Self::bindings(&init.bindings)
            ),

            // ── control and typing ──────────────────────────────────────
            ExprKind::Conditional(c) => format!(
                "({} ? {} : {})",
                Self::print(&c.test),
                Self::print(&c.if_true),
                Self::print(&c.if_false)
            ),

            ExprKind::TypeTest(test) => format!("({} is {})", Self::print(&test.operand), test.target),

            // ── function literals ───────────────────────────────────────
            ExprKind::Lambda(lambda) => {
                let params: Vec<&str> = lambda.params.iter().map(|p| p.name()).collect();
                let head = match params.len() {
                    1 => params[0].to_string(),
                    _ => format!("({})", params.join(", ")),
                };
                format!("{} => {}", head, Self::print(&lambda.body))
            }

            ExprKind::Quote(inner) => format!("quote({})", Self::print(inner)),
        }
    }

    fn list(exprs: &[std::rc::Rc<Expr>]) -> String {
        exprs.iter().map(|e| Self::print(e)).collect::<Vec<_>>().join(", ")
    }

    fn initializers(inits: &[ElementInit]) -> String {
        inits
            .iter()
            .map(|init| format!("{}({})", init.add.name(), Self::list(&init.args)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn bindings(bindings: &[MemberBinding]) -> String {
        bindings
            .iter()
            .map(|binding| match binding {
                MemberBinding::Assignment { member, expr } => {
                    format!("{} = {}", member.name(), Self::print(expr))
                }
                MemberBinding::List {
                    member,
                    initializers,
                } => format!("{} = {{{}}}", member.name(), Self::initializers(initializers)),
                MemberBinding::Member { member, bindings } => {
                    format!("{} = {{{}}}", member.name(), Self::bindings(bindings))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ExprPrinter::print(self))
    }
}
