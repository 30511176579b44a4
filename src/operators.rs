//! The operator table.
//!
//! Maps `(TypeCode, operator)` to a plain `fn` over operand *thunks*.  The
//! evaluator hands in memoized thunks, so an entry decides whether (and when)
//! each operand is evaluated; `AndAlso` / `OrElse` never force the right
//! thunk when the left one decides the result.
//!
//! The table is built once, on first use, and is immutable afterwards.

use std::collections::HashMap;
use std::rc::Rc;

use log::info;
use once_cell::sync::Lazy;

use crate::convert;
use crate::error::{InterpretError, Result};
use crate::expr::{BinaryOp, UnaryOp};
use crate::types::{Type, TypeCode};
use crate::value::{FromValue, Value};

/// A deferred operand.
pub trait Thunk {
    fn force(&self) -> Result<Value>;
}

/// An already-evaluated operand.
impl Thunk for Value {
    fn force(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

pub type BinaryFn = fn(&dyn Thunk, &dyn Thunk) -> Result<Value>;
pub type UnaryFn = fn(&dyn Thunk) -> Result<Value>;

pub struct OperatorTable {
    binary: HashMap<(TypeCode, BinaryOp), BinaryFn>,
    unary: HashMap<(TypeCode, UnaryOp), UnaryFn>,
}

static TABLE: Lazy<OperatorTable> = Lazy::new(OperatorTable::build);

/// Shift counts are read as `i32` whatever the count operand's kind.
fn shift_count(value: Value) -> Result<u32> {
    match convert::unchecked(value, &Type::I32)? {
        Value::I32(n) => Ok(n as u32),
        other => Err(InterpretError::conversion(other.kind_name(), "shift count")),
    }
}

fn char_unit(value: Value) -> Result<u16> {
    match value {
        Value::Char(c) => u16::try_from(u32::from(c))
            .map_err(|_| InterpretError::conversion("astral char", "UTF-16 code unit")),
        other => Err(InterpretError::conversion(other.kind_name(), "char")),
    }
}

/// String operand of concatenation: absent is the empty string.
fn text(value: Value) -> Rc<str> {
    match value {
        Value::Null => Rc::from(""),
        Value::Str(s) => s,
        other => Rc::from(other.to_string()),
    }
}

fn nullable_text(value: Value) -> Result<Option<Rc<str>>> {
    match value {
        Value::Null => Ok(None),
        Value::Str(s) => Ok(Some(s)),
        other => Err(InterpretError::conversion(other.kind_name(), "string")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry families
// ─────────────────────────────────────────────────────────────────────────────

/// Registers the integer family for one type code.  `$take` reads an
/// operand, `$wrap` builds a result.
macro_rules! integer_ops {
    ($table:expr, $code:ident, $t:ty, $take:expr, $wrap:expr) => {{
        type T = $t;
        const NAME: &str = stringify!($t);

        fn take(value: Value) -> Result<T> {
            let take: fn(Value) -> Result<T> = $take;
            take(value)
        }

        fn wrap(value: T) -> Value {
            let wrap: fn(T) -> Value = $wrap;
            wrap(value)
        }

        fn pair(l: &dyn Thunk, r: &dyn Thunk) -> Result<(T, T)> {
            Ok((take(l.force()?)?, take(r.force()?)?))
        }

        fn divisor(l: &dyn Thunk, r: &dyn Thunk) -> Result<(T, T)> {
            let (a, b) = pair(l, r)?;
            if b == 0 {
                return Err(InterpretError::divide_by_zero(NAME));
            }
            Ok((a, b))
        }

        let code = TypeCode::$code;
        let t = &mut $table;

        t.bin(code, BinaryOp::Add, |l, r| pair(l, r).map(|(a, b)| wrap(a.wrapping_add(b))));
        t.bin(code, BinaryOp::Subtract, |l, r| pair(l, r).map(|(a, b)| wrap(a.wrapping_sub(b))));
        t.bin(code, BinaryOp::Multiply, |l, r| pair(l, r).map(|(a, b)| wrap(a.wrapping_mul(b))));
        t.bin(code, BinaryOp::AddChecked, |l, r| {
            let (a, b) = pair(l, r)?;
            a.checked_add(b).map(wrap).ok_or_else(|| InterpretError::overflow("AddChecked", NAME))
        });
        t.bin(code, BinaryOp::SubtractChecked, |l, r| {
            let (a, b) = pair(l, r)?;
            a.checked_sub(b)
                .map(wrap)
                .ok_or_else(|| InterpretError::overflow("SubtractChecked", NAME))
        });
        t.bin(code, BinaryOp::MultiplyChecked, |l, r| {
            let (a, b) = pair(l, r)?;
            a.checked_mul(b)
                .map(wrap)
                .ok_or_else(|| InterpretError::overflow("MultiplyChecked", NAME))
        });
        t.bin(code, BinaryOp::Divide, |l, r| {
            let (a, b) = divisor(l, r)?;
            a.checked_div(b).map(wrap).ok_or_else(|| InterpretError::overflow("Divide", NAME))
        });
        t.bin(code, BinaryOp::Modulo, |l, r| {
            let (a, b) = divisor(l, r)?;
            a.checked_rem(b).map(wrap).ok_or_else(|| InterpretError::overflow("Modulo", NAME))
        });
        t.bin(code, BinaryOp::And, |l, r| pair(l, r).map(|(a, b)| wrap(a & b)));
        t.bin(code, BinaryOp::Or, |l, r| pair(l, r).map(|(a, b)| wrap(a | b)));
        t.bin(code, BinaryOp::ExclusiveOr, |l, r| pair(l, r).map(|(a, b)| wrap(a ^ b)));
        t.bin(code, BinaryOp::LeftShift, |l, r| {
            let a = take(l.force()?)?;
            Ok(wrap(a.wrapping_shl(shift_count(r.force()?)?)))
        });
        t.bin(code, BinaryOp::RightShift, |l, r| {
            let a = take(l.force()?)?;
            Ok(wrap(a.wrapping_shr(shift_count(r.force()?)?)))
        });
        t.bin(code, BinaryOp::Equal, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a == b)));
        t.bin(code, BinaryOp::NotEqual, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a != b)));
        t.bin(code, BinaryOp::LessThan, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a < b)));
        t.bin(code, BinaryOp::LessThanOrEqual, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a <= b)));
        t.bin(code, BinaryOp::GreaterThan, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a > b)));
        t.bin(code, BinaryOp::GreaterThanOrEqual, |l, r| {
            pair(l, r).map(|(a, b)| Value::Bool(a >= b))
        });

        t.un(code, UnaryOp::Negate, |x| Ok(wrap(take(x.force()?)?.wrapping_neg())));
        t.un(code, UnaryOp::NegateChecked, |x| {
            take(x.force()?)?
                .checked_neg()
                .map(wrap)
                .ok_or_else(|| InterpretError::overflow("NegateChecked", NAME))
        });
        t.un(code, UnaryOp::UnaryPlus, |x| Ok(wrap(take(x.force()?)?)));
        t.un(code, UnaryOp::Not, |x| Ok(wrap(!take(x.force()?)?)));
    }};
}

/// Registers the floating-point family.  Checked variants never overflow.
macro_rules! float_ops {
    ($table:expr, $code:ident, $t:ty, $variant:ident) => {{
        type T = $t;

        fn pair(l: &dyn Thunk, r: &dyn Thunk) -> Result<(T, T)> {
            Ok((T::from_value(l.force()?)?, T::from_value(r.force()?)?))
        }

        let code = TypeCode::$code;
        let t = &mut $table;

        for op in [BinaryOp::Add, BinaryOp::AddChecked] {
            t.bin(code, op, |l, r| pair(l, r).map(|(a, b)| Value::$variant(a + b)));
        }
        for op in [BinaryOp::Subtract, BinaryOp::SubtractChecked] {
            t.bin(code, op, |l, r| pair(l, r).map(|(a, b)| Value::$variant(a - b)));
        }
        for op in [BinaryOp::Multiply, BinaryOp::MultiplyChecked] {
            t.bin(code, op, |l, r| pair(l, r).map(|(a, b)| Value::$variant(a * b)));
        }
        t.bin(code, BinaryOp::Divide, |l, r| pair(l, r).map(|(a, b)| Value::$variant(a / b)));
        t.bin(code, BinaryOp::Modulo, |l, r| pair(l, r).map(|(a, b)| Value::$variant(a % b)));
        t.bin(code, BinaryOp::Equal, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a == b)));
        t.bin(code, BinaryOp::NotEqual, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a != b)));
        t.bin(code, BinaryOp::LessThan, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a < b)));
        t.bin(code, BinaryOp::LessThanOrEqual, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a <= b)));
        t.bin(code, BinaryOp::GreaterThan, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a > b)));
        t.bin(code, BinaryOp::GreaterThanOrEqual, |l, r| {
            pair(l, r).map(|(a, b)| Value::Bool(a >= b))
        });

        for op in [UnaryOp::Negate, UnaryOp::NegateChecked] {
            t.un(code, op, |x| Ok(Value::$variant(-T::from_value(x.force()?)?)));
        }
        t.un(code, UnaryOp::UnaryPlus, |x| Ok(Value::$variant(T::from_value(x.force()?)?)));
    }};
}

impl OperatorTable {
    /// The process-wide table, built on first use.
    pub fn global() -> &'static OperatorTable {
        &TABLE
    }

    pub fn binary(&self, code: TypeCode, op: BinaryOp) -> Option<BinaryFn> {
        self.binary.get(&(code, op)).copied()
    }

    pub fn unary(&self, code: TypeCode, op: UnaryOp) -> Option<UnaryFn> {
        self.unary.get(&(code, op)).copied()
    }

    fn bin(&mut self, code: TypeCode, op: BinaryOp, f: BinaryFn) {
        self.binary.insert((code, op), f);
    }

    fn un(&mut self, code: TypeCode, op: UnaryOp, f: UnaryFn) {
        self.unary.insert((code, op), f);
    }

    fn build() -> OperatorTable {
        let mut table = OperatorTable {
            binary: HashMap::new(),
            unary: HashMap::new(),
        };

        integer_ops!(table, I8, i8, i8::from_value, Value::I8);
        integer_ops!(table, U8, u8, u8::from_value, Value::U8);
        integer_ops!(table, I16, i16, i16::from_value, Value::I16);
        integer_ops!(table, U16, u16, u16::from_value, Value::U16);
        integer_ops!(table, I32, i32, i32::from_value, Value::I32);
        integer_ops!(table, U32, u32, u32::from_value, Value::U32);
        integer_ops!(table, I64, i64, i64::from_value, Value::I64);
        integer_ops!(table, U64, u64, u64::from_value, Value::U64);
        // Code-unit results; the evaluator coerces them back to the node type.
        integer_ops!(table, Char, u16, char_unit, Value::U16);

        float_ops!(table, F32, f32, F32);
        float_ops!(table, F64, f64, F64);

        table.bool_ops();
        table.string_ops();

        info!(
            "Operator table initialised with {} binary and {} unary entries",
            table.binary.len(),
            table.unary.len()
        );

        table
    }

    fn bool_ops(&mut self) {
        fn pair(l: &dyn Thunk, r: &dyn Thunk) -> Result<(bool, bool)> {
            Ok((l.force()?.as_bool()?, r.force()?.as_bool()?))
        }

        let code = TypeCode::Bool;
        self.bin(code, BinaryOp::And, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a & b)));
        self.bin(code, BinaryOp::Or, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a | b)));
        self.bin(code, BinaryOp::ExclusiveOr, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a ^ b)));
        self.bin(code, BinaryOp::Equal, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a == b)));
        self.bin(code, BinaryOp::NotEqual, |l, r| pair(l, r).map(|(a, b)| Value::Bool(a != b)));
        self.bin(code, BinaryOp::AndAlso, |l, r| {
            if !l.force()?.as_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(r.force()?.as_bool()?))
        });
        self.bin(code, BinaryOp::OrElse, |l, r| {
            if l.force()?.as_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(r.force()?.as_bool()?))
        });

        self.un(code, UnaryOp::Not, |x| Ok(Value::Bool(!x.force()?.as_bool()?)));
    }

    fn string_ops(&mut self) {
        let code = TypeCode::String;
        self.bin(code, BinaryOp::Add, |l, r| {
            let (a, b) = (text(l.force()?), text(r.force()?));
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(&a);
            joined.push_str(&b);
            Ok(Value::Str(Rc::from(joined)))
        });
        self.bin(code, BinaryOp::Equal, |l, r| {
            Ok(Value::Bool(nullable_text(l.force()?)? == nullable_text(r.force()?)?))
        });
        self.bin(code, BinaryOp::NotEqual, |l, r| {
            Ok(Value::Bool(nullable_text(l.force()?)? != nullable_text(r.force()?)?))
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn apply(code: TypeCode, op: BinaryOp, l: Value, r: Value) -> Result<Value> {
        let f = OperatorTable::global()
            .binary(code, op)
            .expect("entry should exist");
        f(&l, &r)
    }

    /// Counts how often it is forced.
    struct Probe {
        value: Value,
        forced: Cell<usize>,
    }

    impl Thunk for Probe {
        fn force(&self) -> Result<Value> {
            self.forced.set(self.forced.get() + 1);
            Ok(self.value.clone())
        }
    }

    #[test]
    fn test_int_add_wraps() {
        let sum = apply(TypeCode::I32, BinaryOp::Add, Value::I32(i32::MAX), Value::I32(1));
        assert_eq!(sum.unwrap(), Value::I32(i32::MIN));
    }

    #[test]
    fn test_checked_add_overflows() {
        let err = apply(TypeCode::I32, BinaryOp::AddChecked, Value::I32(i32::MAX), Value::I32(1));
        assert!(matches!(err, Err(InterpretError::ArithmeticOverflow { .. })));

        let ok = apply(TypeCode::I32, BinaryOp::AddChecked, Value::I32(10), Value::I32(20));
        assert_eq!(ok.unwrap(), Value::I32(30));
    }

    #[test]
    fn test_divide_by_zero() {
        let err = apply(TypeCode::I64, BinaryOp::Divide, Value::I64(1), Value::I64(0));
        assert!(matches!(err, Err(InterpretError::DivisionByZero { .. })));

        let err = apply(TypeCode::I32, BinaryOp::Divide, Value::I32(i32::MIN), Value::I32(-1));
        assert!(matches!(err, Err(InterpretError::ArithmeticOverflow { .. })));
    }

    #[test]
    fn test_shift_masks_count() {
        let shifted = apply(TypeCode::I32, BinaryOp::LeftShift, Value::I32(1), Value::I32(33));
        assert_eq!(shifted.unwrap(), Value::I32(2));
    }

    #[test]
    fn test_float_division_by_zero_is_infinite() {
        let quotient = apply(TypeCode::F64, BinaryOp::Divide, Value::F64(1.0), Value::F64(0.0));
        assert_eq!(quotient.unwrap(), Value::F64(f64::INFINITY));
    }

    #[test]
    fn test_char_arithmetic_on_code_units() {
        let sum = apply(TypeCode::Char, BinaryOp::Add, Value::Char('a'), Value::Char('\u{1}'));
        assert_eq!(sum.unwrap(), Value::U16(98));
    }

    #[test]
    fn test_string_concat_treats_null_as_empty() {
        let joined = apply(TypeCode::String, BinaryOp::Add, Value::string("ab"), Value::Null);
        assert_eq!(joined.unwrap(), Value::string("ab"));
    }

    #[test]
    fn test_and_also_skips_right() {
        let f = OperatorTable::global()
            .binary(TypeCode::Bool, BinaryOp::AndAlso)
            .unwrap();
        let right = Probe {
            value: Value::Bool(true),
            forced: Cell::new(0),
        };
        assert_eq!(f(&Value::Bool(false), &right).unwrap(), Value::Bool(false));
        assert_eq!(right.forced.get(), 0);

        assert_eq!(f(&Value::Bool(true), &right).unwrap(), Value::Bool(true));
        assert_eq!(right.forced.get(), 1);
    }

    #[test]
    fn test_unary_entries() {
        let table = OperatorTable::global();
        let negate = table.unary(TypeCode::I32, UnaryOp::Negate).unwrap();
        assert_eq!(negate(&Value::I32(5)).unwrap(), Value::I32(-5));

        let checked = table.unary(TypeCode::I32, UnaryOp::NegateChecked).unwrap();
        assert!(checked(&Value::I32(i32::MIN)).is_err());

        assert!(table.unary(TypeCode::F64, UnaryOp::Not).is_none());
        assert!(table.binary(TypeCode::String, BinaryOp::Subtract).is_none());
    }
}
