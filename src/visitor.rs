//! Generic rewriting traversal over the expression IR.
//!
//! [`ExpressionVisitor::visit`] dispatches on the node kind with one
//! exhaustive match.  Every `visit_*` method has a default that visits the
//! children and rebuilds the node from them, returning the original `Rc`
//! untouched when no child changed.  Implementations override only the
//! kinds they care about:
//!
//! ```ignore
//! struct Renamer;
//! impl ExpressionVisitor for Renamer {
//!     fn visit_constant(&mut self, expr: &Rc<Expr>, value: &Value) -> Result<Rc<Expr>> { .. }
//! }
//! ```

use std::rc::Rc;

use crate::error::Result;
use crate::expr::{
    BinaryExpr, ConditionalExpr, ElementInit, Expr, ExprKind, InvocationExpr, LambdaExpr,
    ListInitExpr, MemberBinding, MemberExpr, MemberInitExpr, MethodCallExpr, NewArrayExpr,
    NewExpr, Parameter, TypeTestExpr, UnaryExpr,
};
use crate::value::Value;

fn same(a: &Rc<Expr>, b: &Rc<Expr>) -> bool {
    Rc::ptr_eq(a, b)
}

fn same_opt(a: &Option<Rc<Expr>>, b: &Option<Rc<Expr>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_list(a: &[Rc<Expr>], b: &[Rc<Expr>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(x, y))
}

fn same_inits(a: &[ElementInit], b: &[ElementInit]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_list(&x.args, &y.args))
}

fn same_bindings(a: &[MemberBinding], b: &[MemberBinding]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (
                MemberBinding::Assignment { expr: x, .. },
                MemberBinding::Assignment { expr: y, .. },
            ) => same(x, y),
            (
                MemberBinding::List {
                    initializers: x, ..
                },
                MemberBinding::List {
                    initializers: y, ..
                },
            ) => same_inits(x, y),
            (MemberBinding::Member { bindings: x, .. }, MemberBinding::Member { bindings: y, .. }) => {
                same_bindings(x, y)
            }
            _ => false,
        })
}

pub trait ExpressionVisitor {
    fn visit(&mut self, expr: &Rc<Expr>) -> Result<Rc<Expr>> {
        match &expr.kind {
            ExprKind::Constant(value) => self.visit_constant(expr, value),
            ExprKind::Parameter(param) => self.visit_parameter(expr, param),
            ExprKind::Binary(node) => self.visit_binary(expr, node),
            ExprKind::Unary(node) => self.visit_unary(expr, node),
            ExprKind::MethodCall(node) => self.visit_method_call(expr, node),
            ExprKind::MemberAccess(node) => self.visit_member_access(expr, node),
            ExprKind::New(node) => self.visit_new(expr, node),
            ExprKind::NewArray(node) => self.visit_new_array(expr, node),
            ExprKind::ListInit(node) => self.visit_list_init(expr, node),
            ExprKind::MemberInit(node) => self.visit_member_init(expr, node),
            ExprKind::Conditional(node) => self.visit_conditional(expr, node),
            ExprKind::TypeTest(node) => self.visit_type_test(expr, node),
            ExprKind::Lambda(node) => self.visit_lambda(expr, node),
            ExprKind::Invocation(node) => self.visit_invocation(expr, node),
            ExprKind::Quote(inner) => self.visit_quote(expr, inner),
        }
    }

    fn visit_list(&mut self, exprs: &[Rc<Expr>]) -> Result<Vec<Rc<Expr>>> {
        exprs.iter().map(|e| self.visit(e)).collect()
    }

    // ── leaves ──────────────────────────────────────────────────────────────

    fn visit_constant(&mut self, expr: &Rc<Expr>, _value: &Value) -> Result<Rc<Expr>> {
        Ok(Rc::clone(expr))
    }

    fn visit_parameter(&mut self, expr: &Rc<Expr>, _param: &Rc<Parameter>) -> Result<Rc<Expr>> {
        Ok(Rc::clone(expr))
    }

    // ── composites ──────────────────────────────────────────────────────────

    fn visit_binary(&mut self, expr: &Rc<Expr>, node: &BinaryExpr) -> Result<Rc<Expr>> {
        let left = self.visit(&node.left)?;
        let right = self.visit(&node.right)?;
        let conversion = node
            .conversion
            .as_ref()
            .map(|c| self.visit(c))
            .transpose()?;

        if same(&left, &node.left) && same(&right, &node.right) && same_opt(&conversion, &node.conversion) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::Binary(BinaryExpr {
                left,
                right,
                conversion,
                ..node.clone()
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_unary(&mut self, expr: &Rc<Expr>, node: &UnaryExpr) -> Result<Rc<Expr>> {
        let operand = self.visit(&node.operand)?;
        if same(&operand, &node.operand) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::Unary(UnaryExpr {
                operand,
                ..node.clone()
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_method_call(&mut self, expr: &Rc<Expr>, node: &MethodCallExpr) -> Result<Rc<Expr>> {
        let receiver = node.receiver.as_ref().map(|r| self.visit(r)).transpose()?;
        let args = self.visit_list(&node.args)?;
        if same_opt(&receiver, &node.receiver) && same_list(&args, &node.args) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::MethodCall(MethodCallExpr {
                receiver,
                method: node.method.clone(),
                args,
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_member_access(&mut self, expr: &Rc<Expr>, node: &MemberExpr) -> Result<Rc<Expr>> {
        let instance = node.instance.as_ref().map(|i| self.visit(i)).transpose()?;
        if same_opt(&instance, &node.instance) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::MemberAccess(MemberExpr {
                instance,
                member: node.member.clone(),
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_new(&mut self, expr: &Rc<Expr>, node: &NewExpr) -> Result<Rc<Expr>> {
        let args = self.visit_list(&node.args)?;
        if same_list(&args, &node.args) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::New(NewExpr {
                constructor: node.constructor.clone(),
                args,
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_new_array(&mut self, expr: &Rc<Expr>, node: &NewArrayExpr) -> Result<Rc<Expr>> {
        let exprs = self.visit_list(&node.exprs)?;
        if same_list(&exprs, &node.exprs) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::NewArray(NewArrayExpr {
                kind: node.kind,
                element: node.element.clone(),
                exprs,
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_element_init(&mut self, init: &ElementInit) -> Result<ElementInit> {
        let args = self.visit_list(&init.args)?;
        Ok(ElementInit::new(init.add.clone(), args))
    }

    fn visit_member_binding(&mut self, binding: &MemberBinding) -> Result<MemberBinding> {
        Ok(match binding {
            MemberBinding::Assignment { member, expr } => {
                MemberBinding::assign(member.clone(), self.visit(expr)?)
            }
            MemberBinding::List {
                member,
                initializers,
            } => {
                let initializers = initializers
                    .iter()
                    .map(|init| self.visit_element_init(init))
                    .collect::<Result<Vec<_>>>()?;
                MemberBinding::list(member.clone(), initializers)
            }
            MemberBinding::Member { member, bindings } => {
                let bindings = bindings
                    .iter()
                    .map(|b| self.visit_member_binding(b))
                    .collect::<Result<Vec<_>>>()?;
                MemberBinding::nested(member.clone(), bindings)
            }
        })
    }

    fn visit_list_init(&mut self, expr: &Rc<Expr>, node: &ListInitExpr) -> Result<Rc<Expr>> {
        let new = self.visit(&node.new)?;
        let initializers = node
            .initializers
            .iter()
            .map(|init| self.visit_element_init(init))
            .collect::<Result<Vec<_>>>()?;

        if same(&new, &node.new) && same_inits(&initializers, &node.initializers) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::ListInit(ListInitExpr { new, initializers }),
            expr.ty.clone(),
        ))
    }

    fn visit_member_init(&mut self, expr: &Rc<Expr>, node: &MemberInitExpr) -> Result<Rc<Expr>> {
        let new = self.visit(&node.new)?;
        let bindings = node
            .bindings
            .iter()
            .map(|b| self.visit_member_binding(b))
            .collect::<Result<Vec<_>>>()?;

        if same(&new, &node.new) && same_bindings(&bindings, &node.bindings) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::MemberInit(MemberInitExpr { new, bindings }),
            expr.ty.clone(),
        ))
    }

    fn visit_conditional(&mut self, expr: &Rc<Expr>, node: &ConditionalExpr) -> Result<Rc<Expr>> {
        let test = self.visit(&node.test)?;
        let if_true = self.visit(&node.if_true)?;
        let if_false = self.visit(&node.if_false)?;

        if same(&test, &node.test) && same(&if_true, &node.if_true) && same(&if_false, &node.if_false) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::Conditional(ConditionalExpr {
                test,
                if_true,
                if_false,
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_type_test(&mut self, expr: &Rc<Expr>, node: &TypeTestExpr) -> Result<Rc<Expr>> {
        let operand = self.visit(&node.operand)?;
        if same(&operand, &node.operand) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::TypeTest(TypeTestExpr {
                operand,
                target: node.target.clone(),
            }),
            expr.ty.clone(),
        ))
    }

    /// Rebuilds the literal with its declared signature unchanged.
    fn visit_lambda(&mut self, expr: &Rc<Expr>, node: &LambdaExpr) -> Result<Rc<Expr>> {
        let body = self.visit(&node.body)?;
        if same(&body, &node.body) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::Lambda(LambdaExpr {
                params: node.params.clone(),
                body,
                signature: Rc::clone(&node.signature),
            }),
            expr.ty.clone(),
        ))
    }

    fn visit_invocation(&mut self, expr: &Rc<Expr>, node: &InvocationExpr) -> Result<Rc<Expr>> {
        let callee = self.visit(&node.callee)?;
        let args = self.visit_list(&node.args)?;
        if same(&callee, &node.callee) && same_list(&args, &node.args) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(
            ExprKind::Invocation(InvocationExpr { callee, args }),
            expr.ty.clone(),
        ))
    }

    fn visit_quote(&mut self, expr: &Rc<Expr>, inner: &Rc<Expr>) -> Result<Rc<Expr>> {
        let visited = self.visit(inner)?;
        if same(&visited, inner) {
            return Ok(Rc::clone(expr));
        }
        Ok(Expr::new(ExprKind::Quote(visited), expr.ty.clone()))
    }
}
