//! Value conversions.
//!
//! * [`unchecked`] – best-effort coercion with `as` semantics (wrapping
//!   integer narrowing, saturating float truncation), plus boxing/unboxing
//!   pass-through for `Object` and optional targets.
//! * [`checked`] – exact conversion: out-of-range numeric results raise
//!   `ArithmeticOverflow`; a pair with no routine raises `ConversionFailure`.
//! * [`default_value`] – the zero value of a type.

use std::rc::Rc;

use log::debug;

use crate::error::{InterpretError, Result};
use crate::types::{Primitive, Type};
use crate::value::Value;

/// Numeric view of a primitive or enum value.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

fn numeric(value: &Value) -> Option<Num> {
    Some(match value {
        Value::Bool(b) => Num::Int(i128::from(*b)),
        Value::I8(v) => Num::Int(i128::from(*v)),
        Value::U8(v) => Num::Int(i128::from(*v)),
        Value::I16(v) => Num::Int(i128::from(*v)),
        Value::U16(v) => Num::Int(i128::from(*v)),
        Value::I32(v) => Num::Int(i128::from(*v)),
        Value::U32(v) => Num::Int(i128::from(*v)),
        Value::I64(v) => Num::Int(i128::from(*v)),
        Value::U64(v) => Num::Int(i128::from(*v)),
        Value::Char(c) => Num::Int(i128::from(u32::from(*c))),
        Value::F32(v) => Num::Float(f64::from(*v)),
        Value::F64(v) => Num::Float(*v),
        Value::Enum(ev) => Num::Int(ev.raw),
        _ => return None,
    })
}

/// Builds a primitive from an integer, wrapping or range-checking.
fn from_int(i: i128, target: Primitive, checked: bool) -> Result<Value> {
    macro_rules! narrow {
        ($t:ty, $variant:ident) => {
            if checked {
                <$t>::try_from(i)
                    .map(Value::$variant)
                    .map_err(|_| InterpretError::overflow("ConvertChecked", target.name()))
            } else {
                Ok(Value::$variant(i as $t))
            }
        };
    }

    match target {
        Primitive::Bool => Ok(Value::Bool(i != 0)),
        Primitive::I8 => narrow!(i8, I8),
        Primitive::U8 => narrow!(u8, U8),
        Primitive::I16 => narrow!(i16, I16),
        Primitive::U16 => narrow!(u16, U16),
        Primitive::I32 => narrow!(i32, I32),
        Primitive::U32 => narrow!(u32, U32),
        Primitive::I64 => narrow!(i64, I64),
        Primitive::U64 => narrow!(u64, U64),
        Primitive::Char => {
            let unit = if checked {
                u16::try_from(i).map_err(|_| InterpretError::overflow("ConvertChecked", "char"))?
            } else {
                i as u16
            };
            code_unit(unit)
        }
        Primitive::F32 => Ok(Value::F32(i as f32)),
        Primitive::F64 => Ok(Value::F64(i as f64)),
    }
}

/// Builds a primitive from a float: truncation toward zero for integers.
fn from_float(f: f64, target: Primitive, checked: bool) -> Result<Value> {
    match target {
        Primitive::F32 => Ok(Value::F32(f as f32)),
        Primitive::F64 => Ok(Value::F64(f)),
        Primitive::Bool => Ok(Value::Bool(f != 0.0)),
        _ if checked => {
            let truncated = f.trunc();
            if !(truncated > -1.0e38 && truncated < 1.0e38) {
                return Err(InterpretError::overflow("ConvertChecked", target.name()));
            }
            from_int(truncated as i128, target, true)
        }
        _ => {
            macro_rules! saturate {
                ($t:ty, $variant:ident) => {
                    Ok(Value::$variant(f as $t))
                };
            }
            match target {
                Primitive::I8 => saturate!(i8, I8),
                Primitive::U8 => saturate!(u8, U8),
                Primitive::I16 => saturate!(i16, I16),
                Primitive::U16 => saturate!(u16, U16),
                Primitive::I32 => saturate!(i32, I32),
                Primitive::U32 => saturate!(u32, U32),
                Primitive::I64 => saturate!(i64, I64),
                Primitive::U64 => saturate!(u64, U64),
                Primitive::Char => code_unit(f as u16),
                _ => Err(InterpretError::conversion("float", target.name())),
            }
        }
    }
}

/// A UTF-16 code unit as a `char`.  Lone surrogates have no `char` form.
fn code_unit(unit: u16) -> Result<Value> {
    char::from_u32(u32::from(unit))
        .map(Value::Char)
        .ok_or_else(|| InterpretError::conversion(format!("code unit {:#06x}", unit), "char"))
}

fn parse_primitive(text: &str, target: Primitive) -> Result<Value> {
    let fail = || InterpretError::conversion(format!("string \"{}\"", text), target.name());
    let text = text.trim();

    macro_rules! parse {
        ($t:ty, $variant:ident) => {
            text.parse::<$t>().map(Value::$variant).map_err(|_| fail())
        };
    }

    match target {
        Primitive::Bool => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        Primitive::I8 => parse!(i8, I8),
        Primitive::U8 => parse!(u8, U8),
        Primitive::I16 => parse!(i16, I16),
        Primitive::U16 => parse!(u16, U16),
        Primitive::I32 => parse!(i32, I32),
        Primitive::U32 => parse!(u32, U32),
        Primitive::I64 => parse!(i64, I64),
        Primitive::U64 => parse!(u64, U64),
        Primitive::F32 => parse!(f32, F32),
        Primitive::F64 => parse!(f64, F64),
        Primitive::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail()),
            }
        }
    }
}

/// Reference-shaped targets (classes, arrays, delegates, strings): the value
/// passes through unchanged if it is already an instance.
fn reference(value: Value, target: &Type) -> Result<Value> {
    match value {
        Value::Null if target.accepts_null() => Ok(Value::Null),
        Value::Null => Err(InterpretError::conversion("null", target)),
        v if target.is_instance(&v) => Ok(v),
        v => Err(InterpretError::conversion(v.kind_name(), target)),
    }
}

/// Unchecked conversion of `value` to `target`.
pub fn unchecked(value: Value, target: &Type) -> Result<Value> {
    match target {
        Type::Object => Ok(value),
        Type::Void => Ok(Value::Unit),
        Type::Nullable(inner) => match value {
            Value::Null => Ok(Value::Null),
            v => unchecked(v, inner),
        },
        Type::Primitive(p) => {
            if value.primitive() == Some(*p) {
                return Ok(value);
            }
            match numeric(&value) {
                Some(Num::Int(i)) => from_int(i, *p, false),
                Some(Num::Float(f)) => from_float(f, *p, false),
                None => Err(InterpretError::conversion(value.kind_name(), p.name())),
            }
        }
        Type::Enum(def) => match numeric(&value) {
            Some(Num::Int(i)) => {
                let raw = from_int(i, def.underlying(), false)?;
                Ok(Value::enumeration(def, raw_of(&raw)))
            }
            _ => Err(InterpretError::conversion(value.kind_name(), def.name())),
        },
        _ => reference(value, target),
    }
}

/// Checked conversion of `value` to `target`.
pub fn checked(value: Value, target: &Type) -> Result<Value> {
    debug!("Checked conversion of {} to {}", value.kind_name(), target);

    match target {
        Type::Object => Ok(value),
        Type::Void => Ok(Value::Unit),
        Type::Nullable(inner) => match value {
            Value::Null => Ok(Value::Null),
            v => checked(v, inner),
        },
        Type::Primitive(p) => {
            if value.primitive() == Some(*p) {
                return Ok(value);
            }
            match (&value, numeric(&value)) {
                (Value::Str(s), _) => parse_primitive(s, *p),
                (_, Some(Num::Int(i))) => from_int(i, *p, true),
                (_, Some(Num::Float(f))) => from_float(f, *p, true),
                _ => Err(InterpretError::conversion(value.kind_name(), p.name())),
            }
        }
        Type::Enum(def) => match numeric(&value) {
            Some(Num::Int(i)) => {
                let raw = from_int(i, def.underlying(), true)?;
                Ok(Value::enumeration(def, raw_of(&raw)))
            }
            _ => Err(InterpretError::conversion(value.kind_name(), def.name())),
        },
        Type::String => match value {
            Value::Null | Value::Str(_) => Ok(value),
            v if v.primitive().is_some() => Ok(Value::Str(Rc::from(v.to_string()))),
            v => Err(InterpretError::conversion(v.kind_name(), "string")),
        },
        _ => reference(value, target),
    }
}

fn raw_of(value: &Value) -> i128 {
    match numeric(value) {
        Some(Num::Int(i)) => i,
        _ => 0,
    }
}

/// The zero value of `ty`: numeric zero, `false`, `'\0'`, the zero enum
/// member, a fresh instance of a value-type class, or `Null`.
pub fn default_value(ty: &Type) -> Value {
    match ty {
        Type::Void => Value::Unit,
        Type::Primitive(p) => match p {
            Primitive::Bool => Value::Bool(false),
            Primitive::I8 => Value::I8(0),
            Primitive::U8 => Value::U8(0),
            Primitive::I16 => Value::I16(0),
            Primitive::U16 => Value::U16(0),
            Primitive::I32 => Value::I32(0),
            Primitive::U32 => Value::U32(0),
            Primitive::I64 => Value::I64(0),
            Primitive::U64 => Value::U64(0),
            Primitive::Char => Value::Char('\0'),
            Primitive::F32 => Value::F32(0.0),
            Primitive::F64 => Value::F64(0.0),
        },
        Type::Enum(def) => Value::enumeration(def, 0),
        Type::Class(class) if class.is_value_type() => Value::object(class),
        _ => Value::Null,
    }
}
