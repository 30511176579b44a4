//! Members of the optional wrapper.
//!
//! An optional-typed receiver holds either `Value::Null` or the bare inner
//! value, so its members cannot go through the accessor or a host method.
//! The evaluator routes them here by name instead.

use std::rc::Rc;

use log::debug;
use phf::phf_map;

use crate::convert;
use crate::error::{InterpretError, Result};
use crate::expr::Expr;
use crate::host::{Member, Method};
use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperMember {
    HasValue,
    Value,
    Equals,
    HashCode,
    ValueOrDefault,
    ToString,
}

// ─────────────────────────────────────────────────────────────────────────────
// Static member map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static MEMBERS: phf::Map<&'static str, WrapperMember> = phf_map! {
    "has_value"        => WrapperMember::HasValue,
    "value"            => WrapperMember::Value,
    "equals"           => WrapperMember::Equals,
    "hash_code"        => WrapperMember::HashCode,
    "value_or_default" => WrapperMember::ValueOrDefault,
    "to_string"        => WrapperMember::ToString,
};

pub fn lookup(name: &str) -> Option<WrapperMember> {
    MEMBERS.get(name).copied()
}

/// Applies `member` to an optional `receiver` whose inner type is `inner`.
pub fn perform(
    member: WrapperMember,
    receiver: &Value,
    inner: &Type,
    args: &[Value],
) -> Result<Value> {
    debug!("Optional wrapper member {:?} on {}", member, receiver);

    let present = !receiver.is_null();
    match member {
        WrapperMember::HasValue => Ok(Value::Bool(present)),

        WrapperMember::Value if present => Ok(receiver.clone()),
        WrapperMember::Value => Err(InterpretError::null_value("value")),

        WrapperMember::Equals => {
            let other = args
                .first()
                .ok_or_else(|| InterpretError::invalid("equals expects one argument"))?;
            Ok(Value::Bool(match (present, other.is_null()) {
                (false, other_absent) => other_absent,
                (true, true) => false,
                (true, false) => receiver == other,
            }))
        }

        WrapperMember::HashCode => Ok(Value::I32(receiver.hash_code())),

        WrapperMember::ValueOrDefault if present => Ok(receiver.clone()),
        WrapperMember::ValueOrDefault => Ok(match args.first() {
            Some(fallback) => fallback.clone(),
            None => convert::default_value(inner),
        }),

        WrapperMember::ToString if present => Ok(Value::string(receiver.to_string())),
        WrapperMember::ToString => Ok(Value::string("")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IR builders
// ─────────────────────────────────────────────────────────────────────────────

fn wrapper_method(name: &'static str, params: Vec<Type>, ret: Type, inner: Type) -> Method {
    Method::new_instance(name, params, ret, move |receiver, args| match lookup(name) {
        Some(member) => perform(member, receiver, &inner, args),
        None => Err(InterpretError::unsupported(name)),
    })
}

fn inner_of(operand: &Expr) -> Type {
    operand.ty.unlifted().clone()
}

/// `operand.has_value`
pub fn has_value(operand: Rc<Expr>) -> Rc<Expr> {
    Expr::member(operand, Member::property("has_value", Type::BOOL))
}

/// `operand.value`
pub fn value(operand: Rc<Expr>) -> Rc<Expr> {
    let inner = inner_of(&operand);
    Expr::member(operand, Member::property("value", inner))
}

/// `operand.value_or_default()` or `operand.value_or_default(fallback)`.
pub fn value_or_default(operand: Rc<Expr>, fallback: Option<Rc<Expr>>) -> Rc<Expr> {
    let inner = inner_of(&operand);
    let params = fallback.iter().map(|_| inner.clone()).collect();
    let method = wrapper_method("value_or_default", params, inner.clone(), inner);
    Expr::call(operand, method, fallback.into_iter().collect())
}

/// `operand.equals(other)`
pub fn equals(operand: Rc<Expr>, other: Rc<Expr>) -> Rc<Expr> {
    let inner = inner_of(&operand);
    let method = wrapper_method("equals", vec![Type::Object], Type::BOOL, inner);
    Expr::call(operand, method, vec![other])
}

/// `operand.hash_code()`
pub fn hash_code(operand: Rc<Expr>) -> Rc<Expr> {
    let inner = inner_of(&operand);
    let method = wrapper_method("hash_code", Vec::new(), Type::I32, inner);
    Expr::call(operand, method, Vec::new())
}

/// `operand.to_string()`
pub fn to_string(operand: Rc<Expr>) -> Rc<Expr> {
    let inner = inner_of(&operand);
    let method = wrapper_method("to_string", Vec::new(), Type::String, inner);
    Expr::call(operand, method, Vec::new())
}
