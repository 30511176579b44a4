//! The tree-walking evaluator.
//!
//! [`Interpreter::evaluate`] turns any node into a [`Value`] under a scope
//! chain.  Function literals evaluate to [`Delegate`]s that capture the
//! interpreter and the current frame; calling one pushes a fresh frame,
//! binds the arguments and evaluates the body.
//!
//! Binary operands are memoized thunks: each is evaluated lazily and at most
//! once, so the lifting rules and the operator table decide what runs.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};
use once_cell::unsync::OnceCell;

use crate::convert;
use crate::delegate::{Delegate, GeneralFn};
use crate::environment::{Env, Environment};
use crate::error::{InterpretError, Result};
use crate::expr::{
    BinaryExpr, BinaryOp, ElementInit, Expr, ExprKind, LambdaExpr, MemberBinding, MemberExpr,
    MethodCallExpr, NewArrayExpr, NewArrayKind, NewExpr, Parameter, UnaryExpr, UnaryOp,
};
use crate::host::{Accessor, HostAccessor, Member, Method};
use crate::nullable;
use crate::operators::{OperatorTable, Thunk};
use crate::types::{Primitive, Type};
use crate::value::{Array, ArrayRef, Value};
use crate::visitor::ExpressionVisitor;

// ─────────────────────────────────────────────────────────────────────────────
// Operand thunks
// ─────────────────────────────────────────────────────────────────────────────

/// An operand evaluated on first use and cached afterwards.
struct Memo<'a> {
    interpreter: &'a Interpreter,
    expr: &'a Rc<Expr>,
    env: &'a Env,
    cell: OnceCell<Value>,
}

impl<'a> Memo<'a> {
    fn new(interpreter: &'a Interpreter, expr: &'a Rc<Expr>, env: &'a Env) -> Self {
        Memo {
            interpreter,
            expr,
            env,
            cell: OnceCell::new(),
        }
    }
}

impl Thunk for Memo<'_> {
    fn force(&self) -> Result<Value> {
        self.cell
            .get_or_try_init(|| self.interpreter.evaluate(self.expr, self.env))
            .cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// By-reference write-back
// ─────────────────────────────────────────────────────────────────────────────

/// Storage an argument was read from.
enum Address {
    Element { array: ArrayRef, indices: Vec<i64> },
    Field { member: Member, instance: Option<Value> },
}

/// Replaces parameters bound in the current scope with constants holding
/// their current values.
struct ParameterCapture<'a> {
    env: &'a Env,
}

impl ExpressionVisitor for ParameterCapture<'_> {
    fn visit_parameter(&mut self, expr: &Rc<Expr>, param: &Rc<Parameter>) -> Result<Rc<Expr>> {
        let env = self.env.borrow();
        if !env.contains(param) {
            return Ok(Rc::clone(expr));
        }

        debug!("Capturing parameter '{}' into quoted tree", param.name());

        Ok(Expr::typed_constant(env.get(param)?, param.ty().clone()))
    }
}

fn array_of(value: &Value, what: &str) -> Result<ArrayRef> {
    match value {
        Value::Array(array) => Ok(Rc::clone(array)),
        Value::Null => Err(InterpretError::null_reference(what)),
        other => Err(InterpretError::conversion(other.kind_name(), "array")),
    }
}

/// `false & x = false`, `true | x = true`, otherwise absence wins.
fn three_valued(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let l = if left.is_null() { None } else { Some(left.as_bool()?) };
    let r = if right.is_null() { None } else { Some(right.as_bool()?) };

    Ok(match (op, l, r) {
        (BinaryOp::And, Some(false), _) | (BinaryOp::And, _, Some(false)) => Value::Bool(false),
        (BinaryOp::And, Some(true), Some(true)) => Value::Bool(true),
        (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, _, Some(true)) => Value::Bool(true),
        (BinaryOp::Or, Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    })
}

/// Brings a table result back to the node's primitive kind.
fn coerce_result(result: Value, target: &Type) -> Result<Value> {
    match target.primitive() {
        Some(p) if !result.is_null() && result.primitive() != Some(p) => {
            convert::unchecked(result, target)
        }
        _ => Ok(result),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interpreter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Interpreter {
    accessor: Rc<dyn Accessor>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// Creates an interpreter over the crate's own host object model.
    pub fn new() -> Self {
        Interpreter::with_accessor(HostAccessor)
    }

    /// Creates an interpreter that reads and writes members through `accessor`.
    pub fn with_accessor<A: Accessor + 'static>(accessor: A) -> Self {
        info!("Initializing Interpreter");

        Interpreter {
            accessor: Rc::new(accessor),
        }
    }

    /// Turns a function literal into a callable.
    pub fn interpret(&self, lambda: &Rc<Expr>) -> Result<Delegate> {
        if lambda.as_lambda().is_none() {
            return Err(InterpretError::invalid(format!(
                "only function literals can be interpreted, got {}",
                lambda.kind_name()
            )));
        }

        debug!("Interpreting {}", lambda);

        match self.evaluate(lambda, &Environment::root())? {
            Value::Delegate(delegate) => Ok(delegate),
            other => Err(InterpretError::conversion(other.kind_name(), "delegate")),
        }
    }

    /// Evaluates a single node.
    pub fn evaluate(&self, expr: &Rc<Expr>, env: &Env) -> Result<Value> {
        debug!("Evaluating {} node", expr.kind_name());

        match &expr.kind {
            ExprKind::Constant(value) => Ok(value.clone()),

            ExprKind::Parameter(param) => env.borrow().get(param),

            ExprKind::Binary(node) => self.eval_binary(expr, node, env),

            ExprKind::Unary(node) => self.eval_unary(expr, node, env),

            ExprKind::MethodCall(node) => self.eval_method_call(node, env),

            ExprKind::MemberAccess(node) => self.eval_member_access(node, env),

            ExprKind::New(node) => self.eval_new(expr, node, env),

            ExprKind::NewArray(node) => self.eval_new_array(node, env),

            ExprKind::ListInit(node) => {
                let root = self.evaluate(&node.new, env)?;
                self.apply_element_inits(&root, &node.initializers, env)?;
                Ok(root)
            }

            ExprKind::MemberInit(node) => {
                let root = self.evaluate(&node.new, env)?;
                self.apply_bindings(&root, &node.bindings, env)?;
                Ok(root)
            }

            ExprKind::Conditional(node) => {
                let test = self.evaluate(&node.test, env)?.as_bool()?;

                debug!("Conditional took the {} branch", test);

                if test {
                    self.evaluate(&node.if_true, env)
                } else {
                    self.evaluate(&node.if_false, env)
                }
            }

            ExprKind::TypeTest(node) => {
                let value = self.evaluate(&node.operand, env)?;
                Ok(Value::Bool(node.target.is_instance(&value)))
            }

            ExprKind::Lambda(node) => self.make_delegate(expr, node, env).map(Value::Delegate),

            ExprKind::Invocation(node) => {
                let delegate = match self.evaluate(&node.callee, env)? {
                    Value::Delegate(delegate) => delegate,
                    Value::Null => return Err(InterpretError::null_reference("invoke")),
                    other => {
                        return Err(InterpretError::conversion(other.kind_name(), "delegate"))
                    }
                };
                self.invoke_with_write_back(&node.args, env, |args| delegate.invoke(args))
            }

            ExprKind::Quote(inner) => {
                if inner.as_lambda().is_none() {
                    return Err(InterpretError::invalid(format!(
                        "only function literals can be quoted, got {}",
                        inner.kind_name()
                    )));
                }
                let closed = ParameterCapture { env }.visit(inner)?;

                debug!("Quoted {}", closed);

                Ok(Value::Quoted(closed))
            }
        }
    }

    // ── binary ──────────────────────────────────────────────────────────────

    fn eval_binary(&self, expr: &Rc<Expr>, node: &BinaryExpr, env: &Env) -> Result<Value> {
        let left_ty = node.left.ty.unlifted();
        let right_ty = node.right.ty.unlifted();

        if let (Type::Enum(a), Type::Enum(b)) = (left_ty, right_ty) {
            if Rc::ptr_eq(a, b) && node.op != BinaryOp::Coalesce {
                return self.eval_enum_binary(expr, node, a.underlying(), env);
            }
        }

        let left = Memo::new(self, &node.left, env);
        let right = Memo::new(self, &node.right, env);
        let op = node.op;

        if left_ty.primitive().is_none() && op.is_short_circuit() {
            if let Some(result) = self.short_circuit_user(node, left_ty, &left, &right)? {
                return Ok(result);
            }
        }

        if node.lifted_to_null
            && matches!(op, BinaryOp::And | BinaryOp::Or)
            && node.left.ty.is_bool_like()
            && node.right.ty.is_bool_like()
            && expr.ty == Type::nullable(Type::BOOL)
        {
            return three_valued(op, &left.force()?, &right.force()?);
        }

        if node.lifted_to_null {
            if node.left.ty.is_bool_like() && node.right.ty.is_bool_like() {
                let l = left.force()?;
                if op == BinaryOp::AndAlso && l == Value::Bool(false) {
                    return Ok(Value::Bool(false));
                }
                if op == BinaryOp::OrElse && l == Value::Bool(true) {
                    return Ok(Value::Bool(true));
                }
            }
            if left.force()?.is_null() || right.force()?.is_null() {
                return Ok(Value::Null);
            }
        }

        if node.lifted {
            let (l, r) = (left.force()?, right.force()?);
            let either_absent = l.is_null() || r.is_null();
            if either_absent && op.is_ordering() {
                return Ok(Value::Bool(false));
            }
            if either_absent && op == BinaryOp::Equal {
                return Ok(Value::Bool(l.is_null() && r.is_null()));
            }
            if either_absent && op == BinaryOp::NotEqual {
                return Ok(Value::Bool(!(l.is_null() && r.is_null())));
            }
        }

        if let Some(method) = &node.method {
            return self.call_operator(method, vec![left.force()?, right.force()?]);
        }

        if let Some(entry) = left_ty.type_code().and_then(|c| OperatorTable::global().binary(c, op)) {
            let result = entry(&left, &right)?;
            return coerce_result(result, expr.ty.unlifted());
        }

        match op {
            BinaryOp::Equal | BinaryOp::NotEqual if !left_ty.is_value_type() => {
                let same = left.force()? == right.force()?;
                Ok(Value::Bool(same == (op == BinaryOp::Equal)))
            }
            BinaryOp::Coalesce => {
                let l = left.force()?;
                if l.is_null() {
                    return right.force();
                }
                match &node.conversion {
                    Some(conversion) => match self.evaluate(conversion, env)? {
                        Value::Delegate(delegate) => delegate.invoke(&mut [l]),
                        other => Err(InterpretError::conversion(other.kind_name(), "delegate")),
                    },
                    None => Ok(l),
                }
            }
            BinaryOp::ArrayIndex => {
                let array = array_of(&left.force()?, "array index")?;
                let index = right.force()?.as_index()?;
                let element = array.borrow().get(&[index])?;
                Ok(element)
            }
            _ => Err(InterpretError::unsupported(format!(
                "binary {:?} over {} in {}",
                op, left_ty, expr
            ))),
        }
    }

    /// Same-enum operands: convert both to the optional underlying integer,
    /// apply the operator there and convert the result back.
    fn eval_enum_binary(
        &self,
        expr: &Rc<Expr>,
        node: &BinaryExpr,
        underlying: Primitive,
        env: &Env,
    ) -> Result<Value> {
        let wide = Type::nullable(Type::Primitive(underlying));
        let left = Expr::convert(Rc::clone(&node.left), wide.clone());
        let right = Expr::convert(Rc::clone(&node.right), wide.clone());

        let (ty, lifted_to_null) = if node.op.is_comparison() {
            let ty = if node.lifted_to_null {
                Type::nullable(Type::BOOL)
            } else {
                Type::BOOL
            };
            (ty, node.lifted_to_null)
        } else {
            (wide, true)
        };
        let rewritten = Expr::convert(
            Expr::binary_node(node.op, left, right, node.method.clone(), true, lifted_to_null, ty),
            expr.ty.clone(),
        );

        debug!("Rewrote enum operation as {}", rewritten);

        self.evaluate(&rewritten, env)
    }

    /// `AndAlso` / `OrElse` over a non-primitive left operand.  `None` means
    /// no user rule applied and evaluation continues.
    fn short_circuit_user(
        &self,
        node: &BinaryExpr,
        left_ty: &Type,
        left: &Memo<'_>,
        right: &Memo<'_>,
    ) -> Result<Option<Value>> {
        if node.lifted_to_null && left.force()?.is_null() {
            return Ok(Some(Value::Null));
        }

        let predicate = match left_ty {
            Type::Class(class) if node.op == BinaryOp::AndAlso => class.is_false(),
            Type::Class(class) => class.is_true(),
            _ => None,
        };
        if let Some(predicate) = predicate {
            let l = left.force()?;
            if predicate.call(None, &mut [l.clone()])?.as_bool()? {
                debug!("Short-circuited {:?} by '{}'", node.op, predicate.name());

                return Ok(Some(l));
            }
        }

        if node.lifted_to_null && right.force()?.is_null() {
            return Ok(Some(Value::Null));
        }
        match &node.method {
            Some(method) => self
                .call_operator(method, vec![left.force()?, right.force()?])
                .map(Some),
            None => Ok(None),
        }
    }

    fn call_operator(&self, method: &Method, mut args: Vec<Value>) -> Result<Value> {
        debug!("Invoking user operator '{}'", method.name());

        method.call(None, &mut args)
    }

    // ── unary ───────────────────────────────────────────────────────────────

    fn eval_unary(&self, expr: &Rc<Expr>, node: &UnaryExpr, env: &Env) -> Result<Value> {
        let operand = Memo::new(self, &node.operand, env);

        if node.lifted_to_null && operand.force()?.is_null() {
            return Ok(Value::Null);
        }

        if let Some(method) = &node.method {
            let value = operand.force()?;
            if value.is_null() {
                if let Some(param) = method.params().first() {
                    if param.is_value_type() && !param.is_nullable() {
                        return Err(InterpretError::conversion("null", param));
                    }
                }
            }
            return self.call_operator(method, vec![value]);
        }

        let (source, target) = if node.lifted {
            (node.operand.ty.unlifted(), expr.ty.unlifted())
        } else {
            (&node.operand.ty, &expr.ty)
        };

        match node.op {
            UnaryOp::TypeAs => {
                let value = operand.force()?;
                if expr.ty.is_instance(&value) {
                    Ok(value)
                } else {
                    Ok(Value::Null)
                }
            }
            UnaryOp::Convert => convert::unchecked(operand.force()?, target),
            UnaryOp::ConvertChecked => convert::checked(operand.force()?, target),
            UnaryOp::ArrayLength => {
                let array = array_of(&operand.force()?, "array length")?;
                let len = array.borrow().len();
                i32::try_from(len)
                    .map(Value::I32)
                    .map_err(|_| InterpretError::overflow("ArrayLength", "i32"))
            }
            op => match source.type_code().and_then(|c| OperatorTable::global().unary(c, op)) {
                Some(entry) => coerce_result(entry(&operand)?, target),
                None => Err(InterpretError::unsupported(format!(
                    "unary {:?} over {} in {}",
                    op, source, expr
                ))),
            },
        }
    }

    // ── calls and members ───────────────────────────────────────────────────

    fn eval_method_call(&self, node: &MethodCallExpr, env: &Env) -> Result<Value> {
        let receiver = match &node.receiver {
            Some(receiver_expr) => {
                let receiver = self.evaluate(receiver_expr, env)?;
                if receiver_expr.ty.is_nullable() {
                    return self.on_nullable(
                        node.method.name(),
                        &receiver,
                        receiver_expr.ty.unlifted(),
                        &node.args,
                        env,
                    );
                }
                if receiver.is_null() {
                    return Err(InterpretError::null_reference(node.method.name()));
                }
                Some(receiver)
            }
            None => None,
        };

        self.invoke_with_write_back(&node.args, env, |args| {
            node.method.call(receiver.as_ref(), args)
        })
    }

    fn eval_member_access(&self, node: &MemberExpr, env: &Env) -> Result<Value> {
        let Some(instance_expr) = &node.instance else {
            return self.accessor.get(&node.member, None);
        };

        let instance = self.evaluate(instance_expr, env)?;
        if instance_expr.ty.is_nullable() {
            return self.on_nullable(
                node.member.name(),
                &instance,
                instance_expr.ty.unlifted(),
                &[],
                env,
            );
        }
        if instance.is_null() {
            return Err(InterpretError::null_reference(node.member.name()));
        }
        self.accessor.get(&node.member, Some(&instance))
    }

    /// Members of an optional-typed receiver.
    fn on_nullable(
        &self,
        name: &str,
        receiver: &Value,
        inner: &Type,
        args: &[Rc<Expr>],
        env: &Env,
    ) -> Result<Value> {
        let member = nullable::lookup(name).ok_or_else(|| {
            InterpretError::unsupported(format!("'{}' is not a member of {}?", name, inner))
        })?;
        let args = self.evaluate_all(args, env)?;
        nullable::perform(member, receiver, inner, &args)
    }

    fn evaluate_all(&self, exprs: &[Rc<Expr>], env: &Env) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.evaluate(e, env)).collect()
    }

    /// Evaluates an argument, remembering where it came from when it is an
    /// array element or a field.
    fn evaluate_addressable(&self, arg: &Rc<Expr>, env: &Env) -> Result<(Value, Option<Address>)> {
        match &arg.kind {
            ExprKind::Binary(node) if node.op == BinaryOp::ArrayIndex => {
                let array = array_of(&self.evaluate(&node.left, env)?, "array index")?;
                let indices = vec![self.evaluate(&node.right, env)?.as_index()?];
                let value = array.borrow().get(&indices)?;
                Ok((value, Some(Address::Element { array, indices })))
            }

            ExprKind::MemberAccess(node)
                if node.member.is_field()
                    && !node.instance.as_ref().is_some_and(|i| i.ty.is_nullable()) =>
            {
                let instance = match &node.instance {
                    Some(expr) => match self.evaluate(expr, env)? {
                        Value::Null => return Err(InterpretError::null_reference(node.member.name())),
                        value => Some(value),
                    },
                    None => None,
                };
                let value = self.accessor.get(&node.member, instance.as_ref())?;
                let address = Address::Field {
                    member: node.member.clone(),
                    instance,
                };
                Ok((value, Some(address)))
            }

            ExprKind::MethodCall(node) if node.method.name() == "get" => match &node.receiver {
                Some(receiver) if matches!(receiver.ty, Type::Array { .. }) => {
                    let target = self.evaluate(receiver, env)?;
                    let array = array_of(&target, "get")?;
                    let indices = self
                        .evaluate_all(&node.args, env)?
                        .iter()
                        .map(Value::as_index)
                        .collect::<Result<Vec<_>>>()?;
                    let value = array.borrow().get(&indices)?;
                    Ok((value, Some(Address::Element { array, indices })))
                }
                _ => Ok((self.evaluate(arg, env)?, None)),
            },

            _ => Ok((self.evaluate(arg, env)?, None)),
        }
    }

    /// Calls `call` on a copy of the evaluated arguments, then writes every
    /// replaced argument back to its address.
    fn invoke_with_write_back<F>(&self, args: &[Rc<Expr>], env: &Env, call: F) -> Result<Value>
    where
        F: FnOnce(&mut [Value]) -> Result<Value>,
    {
        let mut originals = Vec::with_capacity(args.len());
        let mut addresses = Vec::with_capacity(args.len());
        for arg in args {
            let (value, address) = self.evaluate_addressable(arg, env)?;
            originals.push(value);
            addresses.push(address);
        }

        let mut copy = originals.clone();
        let result = call(&mut copy)?;

        for ((original, modified), address) in originals.iter().zip(copy).zip(addresses) {
            if original.same(&modified) {
                continue;
            }
            match address {
                Some(Address::Element { array, indices }) => {
                    debug!("Writing back argument into array element {:?}", indices);

                    array.borrow_mut().set(&indices, modified)?;
                }
                Some(Address::Field { member, instance }) => {
                    debug!("Writing back argument into field '{}'", member.name());

                    self.accessor.set(&member, instance.as_ref(), modified)?;
                }
                None => {}
            }
        }

        Ok(result)
    }

    // ── construction ────────────────────────────────────────────────────────

    fn eval_new(&self, expr: &Rc<Expr>, node: &NewExpr, env: &Env) -> Result<Value> {
        match &node.constructor {
            Some(constructor) => {
                let mut args = self.evaluate_all(&node.args, env)?;
                constructor.call(&mut args)
            }
            None => match &expr.ty {
                Type::Class(class) => Ok(Value::object(class)),
                other => Ok(convert::default_value(other)),
            },
        }
    }

    fn eval_new_array(&self, node: &NewArrayExpr, env: &Env) -> Result<Value> {
        let values = self.evaluate_all(&node.exprs, env)?;
        match node.kind {
            NewArrayKind::Init => Ok(Value::array(node.element.clone(), values)),
            NewArrayKind::Bounds => {
                let dims = values
                    .iter()
                    .map(|v| {
                        let len = v.as_index()?;
                        usize::try_from(len).map_err(|_| {
                            InterpretError::invalid(format!("negative array bound {}", len))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let array = Array::new(node.element.clone(), dims)?;
                Ok(Value::Array(Rc::new(RefCell::new(array))))
            }
        }
    }

    fn apply_element_inits(&self, root: &Value, inits: &[ElementInit], env: &Env) -> Result<()> {
        for init in inits {
            let mut args = self.evaluate_all(&init.args, env)?;
            init.add.call(Some(root), &mut args)?;
        }
        Ok(())
    }

    fn apply_bindings(&self, root: &Value, bindings: &[MemberBinding], env: &Env) -> Result<()> {
        for binding in bindings {
            match binding {
                MemberBinding::Assignment { member, expr } => {
                    let value = self.evaluate(expr, env)?;
                    self.accessor.set(member, Some(root), value)?;
                }
                MemberBinding::List {
                    member,
                    initializers,
                } => {
                    let collection = self.accessor.get(member, Some(root))?;
                    self.apply_element_inits(&collection, initializers, env)?;
                }
                MemberBinding::Member { member, bindings } => {
                    let nested = self.accessor.get(member, Some(root))?;
                    self.apply_bindings(&nested, bindings, env)?;
                }
            }
        }
        Ok(())
    }

    // ── function literals ───────────────────────────────────────────────────

    fn make_delegate(&self, expr: &Rc<Expr>, node: &LambdaExpr, env: &Env) -> Result<Delegate> {
        let interpreter = self.clone();
        let lambda = Rc::clone(expr);
        let captured = Rc::clone(env);

        let general: GeneralFn =
            Rc::new(move |args: &mut [Value]| interpreter.call_lambda(&lambda, &captured, args));

        Delegate::synthesize(Rc::clone(&node.signature), general)
    }

    fn call_lambda(&self, lambda: &Rc<Expr>, captured: &Env, args: &mut [Value]) -> Result<Value> {
        let Some(node) = lambda.as_lambda() else {
            return Err(InterpretError::invalid("callable body is not a function literal"));
        };
        if args.len() != node.params.len() {
            return Err(InterpretError::invalid(format!(
                "function literal expects {} argument(s), got {}",
                node.params.len(),
                args.len()
            )));
        }

        let frame = Environment::child(captured);
        {
            let mut scope = frame.borrow_mut();
            for (param, arg) in node.params.iter().zip(args.iter()) {
                scope.define(param, arg.clone());
            }
        }

        debug!("Calling {}", lambda);

        let result = self.evaluate(&node.body, &frame)?;
        if node.signature.is_action() {
            return Ok(Value::Unit);
        }
        Ok(result)
    }
}
