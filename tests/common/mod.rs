#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use expression_interpreter as interp;

use interp::host::{Constructor, Member, Method};
use interp::types::ClassType;
use interp::value::FromValue;
use interp::{Delegate, Expr, InterpretError, Parameter, Type, Value};

/// Opt-in log output: `RUST_LOG=debug cargo test`.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn param(name: &str, ty: Type) -> Rc<Parameter> {
    Parameter::new(name, ty)
}

pub fn var(param: &Rc<Parameter>) -> Rc<Expr> {
    Expr::parameter(param)
}

/// Interprets `body` as a function literal over `params`.
pub fn compile(params: &[&Rc<Parameter>], body: Rc<Expr>) -> Delegate {
    let params = params.iter().map(|p| Rc::clone(p)).collect();
    interp::interpret(&Expr::lambda(params, body)).expect("function literal should interpret")
}

pub fn call(delegate: &Delegate, args: Vec<Value>) -> interp::Result<Value> {
    let mut args = args;
    delegate.invoke(&mut args)
}

// ─────────────────────────────────────────────────────────────────────────────
// Counting sources
// ─────────────────────────────────────────────────────────────────────────────

/// A static, argument-less method returning `value` and counting its calls.
pub fn counting_source(name: &str, value: Value, ty: Type) -> (Method, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let method = Method::new_static(name, Vec::new(), ty, move |_| {
        counter.set(counter.get() + 1);
        Ok(value.clone())
    });
    (method, calls)
}

/// A static method taking one `ty` argument and overwriting it with
/// `replacement`.
pub fn overwriting(ty: Type, replacement: Value) -> Method {
    Method::new_static("overwrite", vec![ty], Type::Void, move |args| {
        args[0] = replacement.clone();
        Ok(Value::Unit)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Host classes
// ─────────────────────────────────────────────────────────────────────────────

/// `Slot { count: i32, label: string }`
pub fn slot_class() -> Rc<ClassType> {
    Rc::new(
        ClassType::new("Slot")
            .with_field("count", Type::I32)
            .with_field("label", Type::String),
    )
}

pub fn count_field() -> Member {
    Member::field("count", Type::I32)
}

pub fn label_field() -> Member {
    Member::field("label", Type::String)
}

/// `Bag { total: i32 }` with an `add(i32)` method summing into `total`.
pub fn bag_class() -> Rc<ClassType> {
    Rc::new(ClassType::new("Bag").with_field("total", Type::I32))
}

pub fn bag_add() -> Method {
    Method::new_instance("add", vec![Type::I32], Type::Void, |receiver, args| {
        let Value::Object(bag) = receiver else {
            return Err(InterpretError::host("add expects a bag"));
        };
        let item = i32::from_value(args[0].clone())?;
        let total = i32::from_value(bag.borrow().get("total").unwrap_or(Value::I32(0)))?;
        bag.borrow_mut().set("total", Value::I32(total + item));
        Ok(Value::Unit)
    })
}

pub fn new_bag(class: &Rc<ClassType>) -> Rc<Expr> {
    let class = Rc::clone(class);
    let ctor_class = Rc::clone(&class);
    Expr::new_object(
        Type::class(class),
        Constructor::new(Vec::new(), move |_| Ok(Value::object(&ctor_class))),
        Vec::new(),
    )
}

/// `Flag { on: bool }` whose truthiness is its `on` field, with a user
/// `&` / `|` operator producing a fresh flag.
pub struct FlagFixture {
    pub class: Rc<ClassType>,
    pub combine_calls: Rc<Cell<usize>>,
}

fn flag_on(value: &Value) -> interp::Result<bool> {
    match value {
        Value::Object(obj) => obj.borrow().get("on").unwrap_or(Value::Bool(false)).as_bool(),
        other => Err(InterpretError::host(format!("not a flag: {}", other))),
    }
}

impl FlagFixture {
    pub fn new() -> Self {
        let is_true = Method::new_static("is_true", vec![Type::Object], Type::BOOL, |args| {
            Ok(Value::Bool(flag_on(&args[0])?))
        });
        let is_false = Method::new_static("is_false", vec![Type::Object], Type::BOOL, |args| {
            Ok(Value::Bool(!flag_on(&args[0])?))
        });
        let class = Rc::new(
            ClassType::new("Flag")
                .with_field("on", Type::BOOL)
                .with_truthiness(is_true, is_false),
        );
        FlagFixture {
            class,
            combine_calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn ty(&self) -> Type {
        Type::class(Rc::clone(&self.class))
    }

    pub fn make(&self, on: bool) -> Value {
        let flag = Value::object(&self.class);
        if let Value::Object(obj) = &flag {
            obj.borrow_mut().set("on", Value::Bool(on));
        }
        flag
    }

    /// User operator: a new flag that is on when `both` (or either) are on.
    pub fn combine(&self, both: bool) -> Method {
        let class = Rc::clone(&self.class);
        let calls = Rc::clone(&self.combine_calls);
        Method::new_static("combine", vec![self.ty(), self.ty()], self.ty(), move |args| {
            calls.set(calls.get() + 1);
            let (a, b) = (flag_on(&args[0])?, flag_on(&args[1])?);
            let flag = Value::object(&class);
            if let Value::Object(obj) = &flag {
                obj.borrow_mut().set("on", Value::Bool(if both { a && b } else { a || b }));
            }
            Ok(flag)
        })
    }
}

pub fn is_on(value: &Value) -> bool {
    flag_on(value).unwrap_or(false)
}
