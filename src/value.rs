//! Dynamic values produced and consumed by the evaluator.
//!
//! A `Value` is the native side of a result; the static type that decides
//! lifting and overload behaviour lives on the IR node that produced it.
//! Host objects and arrays are shared handles (`Rc<RefCell<_>>`), so writes
//! through one handle are visible through every other.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::convert;
use crate::delegate::Delegate;
use crate::error::{InterpretError, Result};
use crate::expr::Expr;
use crate::types::{ClassType, EnumType, Primitive, Type};

pub type ObjectRef = Rc<RefCell<Object>>;
pub type ArrayRef = Rc<RefCell<Array>>;

#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit absence.
    Null,
    /// Result of a void call.
    Unit,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Char(char),
    F32(f32),
    F64(f64),
    Str(Rc<str>),
    Enum(EnumValue),
    Object(ObjectRef),
    Array(ArrayRef),
    Delegate(Delegate),
    /// A closed, re-evaluable function literal produced by `Quote`.
    Quoted(Rc<Expr>),
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub ty: Rc<EnumType>,
    pub raw: i128,
}

impl Value {
    pub fn string<S: AsRef<str>>(s: S) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn enumeration(ty: &Rc<EnumType>, raw: i128) -> Value {
        Value::Enum(EnumValue {
            ty: Rc::clone(ty),
            raw,
        })
    }

    /// Fresh instance of `class` with every declared field defaulted.
    pub fn object(class: &Rc<ClassType>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::new(class))))
    }

    pub fn array(element: Type, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(Array::from_values(element, items))))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            Value::Bool(_) => Primitive::Bool,
            Value::I8(_) => Primitive::I8,
            Value::U8(_) => Primitive::U8,
            Value::I16(_) => Primitive::I16,
            Value::U16(_) => Primitive::U16,
            Value::I32(_) => Primitive::I32,
            Value::U32(_) => Primitive::U32,
            Value::I64(_) => Primitive::I64,
            Value::U64(_) => Primitive::U64,
            Value::Char(_) => Primitive::Char,
            Value::F32(_) => Primitive::F32,
            Value::F64(_) => Primitive::F64,
            _ => return None,
        })
    }

    /// Short name of the runtime kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        if let Some(p) = self.primitive() {
            return p.name();
        }
        match self {
            Value::Null => "null",
            Value::Unit => "unit",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Delegate(_) => "delegate",
            Value::Quoted(_) => "quoted expression",
            _ => "primitive",
        }
    }

    /// The type a constant holding this value naturally has.
    pub fn natural_type(&self) -> Type {
        if let Some(p) = self.primitive() {
            return Type::Primitive(p);
        }
        match self {
            Value::Unit => Type::Void,
            Value::Str(_) => Type::String,
            Value::Enum(ev) => Type::Enum(Rc::clone(&ev.ty)),
            Value::Object(obj) => Type::Class(Rc::clone(obj.borrow().class())),
            Value::Array(array) => array.borrow().ty(),
            Value::Delegate(d) => Type::Function(Rc::clone(d.signature())),
            Value::Quoted(tree) => match tree.ty.signature() {
                Some(sig) => Type::Quoted(Rc::clone(sig)),
                None => Type::Object,
            },
            _ => Type::Object,
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(InterpretError::conversion(other.kind_name(), "bool")),
        }
    }

    /// Reads any integer value as an `i64` index.
    pub fn as_index(&self) -> Result<i64> {
        match convert::unchecked(self.clone(), &Type::I64)? {
            Value::I64(i) if self.primitive().is_some_and(Primitive::is_integer) => Ok(i),
            _ => Err(InterpretError::conversion(self.kind_name(), "index")),
        }
    }

    /// Identity comparison: shared handles by pointer, scalars by bits.
    ///
    /// This is the comparison used to detect whether a callee replaced one of
    /// its arguments.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }

    /// Stable 32-bit hash of the value.
    pub fn hash_code(&self) -> i32 {
        let mut hasher = DefaultHasher::new();
        match self {
            Value::Null | Value::Unit => return 0,
            Value::Bool(b) => b.hash(&mut hasher),
            Value::I8(v) => v.hash(&mut hasher),
            Value::U8(v) => v.hash(&mut hasher),
            Value::I16(v) => v.hash(&mut hasher),
            Value::U16(v) => v.hash(&mut hasher),
            Value::I32(v) => return *v,
            Value::U32(v) => v.hash(&mut hasher),
            Value::I64(v) => v.hash(&mut hasher),
            Value::U64(v) => v.hash(&mut hasher),
            Value::Char(c) => c.hash(&mut hasher),
            Value::F32(v) => v.to_bits().hash(&mut hasher),
            Value::F64(v) => v.to_bits().hash(&mut hasher),
            Value::Str(s) => s.hash(&mut hasher),
            Value::Enum(ev) => ev.raw.hash(&mut hasher),
            Value::Object(obj) => Rc::as_ptr(obj).hash(&mut hasher),
            Value::Array(array) => Rc::as_ptr(array).hash(&mut hasher),
            Value::Delegate(d) => d.identity().hash(&mut hasher),
            Value::Quoted(tree) => Rc::as_ptr(tree).hash(&mut hasher),
        }
        hasher.finish() as i32
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => Rc::ptr_eq(&a.ty, &b.ty) && a.raw == b.raw,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Delegate(a), Value::Delegate(b)) => a.identity() == b.identity(),
            (Value::Quoted(a), Value::Quoted(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = itoa::Buffer::new();
        match self {
            Value::Null => write!(f, "null"),
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I8(v) => f.write_str(buf.format(*v)),
            Value::U8(v) => f.write_str(buf.format(*v)),
            Value::I16(v) => f.write_str(buf.format(*v)),
            Value::U16(v) => f.write_str(buf.format(*v)),
            Value::I32(v) => f.write_str(buf.format(*v)),
            Value::U32(v) => f.write_str(buf.format(*v)),
            Value::I64(v) => f.write_str(buf.format(*v)),
            Value::U64(v) => f.write_str(buf.format(*v)),
            Value::Char(c) => write!(f, "{}", c),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Enum(ev) => match ev.ty.variant_name(ev.raw) {
                Some(name) => write!(f, "{}", name),
                None => f.write_str(buf.format(ev.raw)),
            },
            Value::Object(obj) => write!(f, "{}", obj.borrow().class().name()),
            Value::Array(array) => {
                let array = array.borrow();
                write!(f, "{}[{}]", array.element(), array.len())
            }
            Value::Delegate(d) => write!(f, "<delegate/{}>", d.signature().arity()),
            Value::Quoted(tree) => write!(f, "{}", tree),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host objects and arrays
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Object {
    class: Rc<ClassType>,
    fields: HashMap<String, Value>,
}

impl Object {
    pub fn new(class: &Rc<ClassType>) -> Self {
        let fields = class
            .all_fields()
            .into_iter()
            .map(|(name, ty)| (name, convert::default_value(&ty)))
            .collect();

        Object {
            class: Rc::clone(class),
            fields,
        }
    }

    pub fn class(&self) -> &Rc<ClassType> {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

/// Row-major array of any rank.
#[derive(Debug)]
pub struct Array {
    element: Type,
    dims: Vec<usize>,
    items: Vec<Value>,
}

impl Array {
    /// Array of the given dimensions filled with the element default.
    ///
    /// Fails with `ArithmeticOverflow` when the total length does not fit
    /// in memory.
    pub fn new(element: Type, dims: Vec<usize>) -> Result<Self> {
        let len = dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| InterpretError::overflow("NewArrayBounds", "usize"))?;

        let mut items = Vec::new();
        items
            .try_reserve_exact(len)
            .map_err(|_| InterpretError::overflow("NewArrayBounds", "usize"))?;
        items.resize(len, convert::default_value(&element));

        Ok(Array {
            element,
            dims,
            items,
        })
    }

    pub fn from_values(element: Type, items: Vec<Value>) -> Self {
        Array {
            element,
            dims: vec![items.len()],
            items,
        }
    }

    pub fn ty(&self) -> Type {
        Type::array_of_rank(self.element.clone(), self.dims.len())
    }

    pub fn element(&self) -> &Type {
        &self.element
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    fn offset(&self, indices: &[i64]) -> Result<usize> {
        if indices.len() != self.dims.len() {
            return Err(InterpretError::invalid(format!(
                "expected {} indices, got {}",
                self.dims.len(),
                indices.len()
            )));
        }
        let mut offset = 0usize;
        for (&index, &dim) in indices.iter().zip(&self.dims) {
            if index < 0 || index as u64 >= dim as u64 {
                return Err(InterpretError::index_out_of_range(index, dim));
            }
            offset = offset * dim + index as usize;
        }
        Ok(offset)
    }

    pub fn get(&self, indices: &[i64]) -> Result<Value> {
        let offset = self.offset(indices)?;
        Ok(self.items[offset].clone())
    }

    pub fn set(&mut self, indices: &[i64], value: Value) -> Result<()> {
        let offset = self.offset(indices)?;
        self.items[offset] = value;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native ↔ Value bridging
// ─────────────────────────────────────────────────────────────────────────────

/// Conversion of a native Rust value into a `Value`.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Extraction of a native Rust value from a `Value`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! scalar_bridge {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(InterpretError::conversion(other.kind_name(), stringify!($t))),
                    }
                }
            }
        )*
    };
}

scalar_bridge! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    char => Char,
    f32 => F32,
    f64 => F64,
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(Rc::from(self))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(InterpretError::conversion(other.kind_name(), "string")),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Discards the value: a typed action shape may wrap a value-returning body.
impl FromValue for () {
    fn from_value(_: Value) -> Result<Self> {
        Ok(())
    }
}

impl IntoValue for Delegate {
    fn into_value(self) -> Value {
        Value::Delegate(self)
    }
}

impl FromValue for Delegate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Delegate(d) => Ok(d),
            other => Err(InterpretError::conversion(other.kind_name(), "delegate")),
        }
    }
}

impl FromValue for Rc<Expr> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Quoted(tree) => Ok(tree),
            other => Err(InterpretError::conversion(other.kind_name(), "quoted expression")),
        }
    }
}

impl IntoValue for ObjectRef {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Ok(obj),
            other => Err(InterpretError::conversion(other.kind_name(), "object")),
        }
    }
}

impl IntoValue for ArrayRef {
    fn into_value(self) -> Value {
        Value::Array(self)
    }
}

impl FromValue for ArrayRef {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(array) => Ok(array),
            other => Err(InterpretError::conversion(other.kind_name(), "array")),
        }
    }
}
