//! Static types of the host object model.
//!
//! Every IR node carries one of these.  The evaluator never type-checks with
//! them; it only reads them to decide lifting, enum rewriting, operator table
//! keys, conversions and instance tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::host::Method;
use crate::value::Value;

/// Primitive value kinds with native operator support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Char,
    F32,
    F64,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::U8 => "u8",
            Primitive::I16 => "i16",
            Primitive::U16 => "u16",
            Primitive::I32 => "i32",
            Primitive::U32 => "u32",
            Primitive::I64 => "i64",
            Primitive::U64 => "u64",
            Primitive::Char => "char",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::F32 | Primitive::F64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// Operator table key for this kind.
    pub fn type_code(self) -> TypeCode {
        match self {
            Primitive::Bool => TypeCode::Bool,
            Primitive::I8 => TypeCode::I8,
            Primitive::U8 => TypeCode::U8,
            Primitive::I16 => TypeCode::I16,
            Primitive::U16 => TypeCode::U16,
            Primitive::I32 => TypeCode::I32,
            Primitive::U32 => TypeCode::U32,
            Primitive::I64 => TypeCode::I64,
            Primitive::U64 => TypeCode::U64,
            Primitive::Char => TypeCode::Char,
            Primitive::F32 => TypeCode::F32,
            Primitive::F64 => TypeCode::F64,
        }
    }
}

/// Key of the operator table: the primitive kinds plus `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Char,
    F32,
    F64,
    String,
}

/// A named enumeration backed by an integer primitive.
#[derive(Debug)]
pub struct EnumType {
    name: String,
    underlying: Primitive,
    variants: Vec<(String, i128)>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: S, underlying: Primitive) -> Self {
        EnumType {
            name: name.into(),
            underlying,
            variants: Vec::new(),
        }
    }

    pub fn with_variant<S: Into<String>>(mut self, name: S, raw: i128) -> Self {
        self.variants.push((name.into(), raw));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn underlying(&self) -> Primitive {
        self.underlying
    }

    pub fn variant_name(&self, raw: i128) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, value)| *value == raw)
            .map(|(name, _)| name.as_str())
    }
}

/// A host class or struct.
///
/// `is_true` / `is_false` are the user truthiness predicates consulted by
/// short-circuit `AndAlso` / `OrElse` over instances of this class.
#[derive(Debug)]
pub struct ClassType {
    name: String,
    base: Option<Rc<ClassType>>,
    value_type: bool,
    fields: Vec<(String, Type)>,
    is_true: Option<Method>,
    is_false: Option<Method>,
    statics: RefCell<HashMap<String, Value>>,
}

impl ClassType {
    pub fn new<S: Into<String>>(name: S) -> Self {
        ClassType {
            name: name.into(),
            base: None,
            value_type: false,
            fields: Vec::new(),
            is_true: None,
            is_false: None,
            statics: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_base(mut self, base: Rc<ClassType>) -> Self {
        self.base = Some(base);
        self
    }

    /// Marks the class as a value type (default-constructible, not nullable).
    pub fn value_type(mut self) -> Self {
        self.value_type = true;
        self
    }

    pub fn with_field<S: Into<String>>(mut self, name: S, ty: Type) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    pub fn with_static<S: Into<String>>(self, name: S, value: Value) -> Self {
        self.statics.borrow_mut().insert(name.into(), value);
        self
    }

    pub fn with_truthiness(mut self, is_true: Method, is_false: Method) -> Self {
        self.is_true = Some(is_true);
        self.is_false = Some(is_false);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Rc<ClassType>> {
        self.base.as_ref()
    }

    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    /// Declared fields of this class and all of its bases, base first.
    pub fn all_fields(&self) -> Vec<(String, Type)> {
        let mut fields = self.base.as_ref().map_or_else(Vec::new, |b| b.all_fields());
        fields.extend(self.fields.iter().cloned());
        fields
    }

    pub fn is_true(&self) -> Option<&Method> {
        self.is_true
            .as_ref()
            .or_else(|| self.base.as_ref().and_then(|b| b.is_true()))
    }

    pub fn is_false(&self) -> Option<&Method> {
        self.is_false
            .as_ref()
            .or_else(|| self.base.as_ref().and_then(|b| b.is_false()))
    }

    pub fn static_field(&self, name: &str) -> Option<Value> {
        self.statics.borrow().get(name).cloned()
    }

    pub fn set_static_field(&self, name: &str, value: Value) {
        self.statics.borrow_mut().insert(name.to_string(), value);
    }

    /// `true` if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &ClassType) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.base.as_ref().is_some_and(|b| b.is_subclass_of(other))
    }
}

/// Declared signature of a function literal or delegate.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Signature { params, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Action shape: no return value.
    pub fn is_action(&self) -> bool {
        self.ret == Type::Void
    }
}

/// Static type of an IR node.
#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Object,
    Primitive(Primitive),
    String,
    Nullable(Rc<Type>),
    Enum(Rc<EnumType>),
    Class(Rc<ClassType>),
    Array { element: Rc<Type>, rank: usize },
    Function(Rc<Signature>),
    Quoted(Rc<Signature>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void) => true,
            (Type::Object, Type::Object) => true,
            (Type::String, Type::String) => true,
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Nullable(a), Type::Nullable(b)) => a == b,
            (Type::Enum(a), Type::Enum(b)) => Rc::ptr_eq(a, b),
            (Type::Class(a), Type::Class(b)) => Rc::ptr_eq(a, b),
            (
                Type::Array {
                    element: a,
                    rank: ra,
                },
                Type::Array {
                    element: b,
                    rank: rb,
                },
            ) => ra == rb && a == b,
            (Type::Function(a), Type::Function(b)) => a == b,
            (Type::Quoted(a), Type::Quoted(b)) => a == b,
            _ => false,
        }
    }
}

impl Type {
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const I8: Type = Type::Primitive(Primitive::I8);
    pub const U8: Type = Type::Primitive(Primitive::U8);
    pub const I16: Type = Type::Primitive(Primitive::I16);
    pub const U16: Type = Type::Primitive(Primitive::U16);
    pub const I32: Type = Type::Primitive(Primitive::I32);
    pub const U32: Type = Type::Primitive(Primitive::U32);
    pub const I64: Type = Type::Primitive(Primitive::I64);
    pub const U64: Type = Type::Primitive(Primitive::U64);
    pub const CHAR: Type = Type::Primitive(Primitive::Char);
    pub const F32: Type = Type::Primitive(Primitive::F32);
    pub const F64: Type = Type::Primitive(Primitive::F64);

    /// Optional wrapper over `inner`.  Wrapping twice is a no-op.
    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) => inner,
            other => Type::Nullable(Rc::new(other)),
        }
    }

    pub fn array(element: Type) -> Type {
        Type::Array {
            element: Rc::new(element),
            rank: 1,
        }
    }

    pub fn array_of_rank(element: Type, rank: usize) -> Type {
        Type::Array {
            element: Rc::new(element),
            rank,
        }
    }

    pub fn enumeration(def: Rc<EnumType>) -> Type {
        Type::Enum(def)
    }

    pub fn class(def: Rc<ClassType>) -> Type {
        Type::Class(def)
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(Rc::new(Signature::new(params, ret)))
    }

    pub fn action(params: Vec<Type>) -> Type {
        Type::Function(Rc::new(Signature::new(params, Type::Void)))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// The type with one optional wrapper removed, if present.
    pub fn unlifted(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Operator table key, for primitives and strings only.
    pub fn type_code(&self) -> Option<TypeCode> {
        match self {
            Type::Primitive(p) => Some(p.type_code()),
            Type::String => Some(TypeCode::String),
            _ => None,
        }
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Primitive(_) | Type::Enum(_) | Type::Nullable(_) => true,
            Type::Class(class) => class.is_value_type(),
            _ => false,
        }
    }

    /// Whether a slot of this type may hold `Value::Null`.
    pub fn accepts_null(&self) -> bool {
        match self {
            Type::Void => false,
            Type::Nullable(_) => true,
            other => !other.is_value_type(),
        }
    }

    /// `bool` or `bool?`.
    pub fn is_bool_like(&self) -> bool {
        *self.unlifted() == Type::BOOL
    }

    pub fn signature(&self) -> Option<&Rc<Signature>> {
        match self {
            Type::Function(sig) | Type::Quoted(sig) => Some(sig),
            _ => None,
        }
    }

    /// Whether a value statically typed `other` may be stored as `self`
    /// without conversion (identity, reference widening, array covariance).
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Object, other) => *other != Type::Void,
            (Type::Class(a), Type::Class(b)) => b.is_subclass_of(a),
            (
                Type::Array {
                    element: a,
                    rank: ra,
                },
                Type::Array {
                    element: b,
                    rank: rb,
                },
            ) => ra == rb && !b.is_value_type() && a.is_assignable_from(b),
            _ => false,
        }
    }

    /// Runtime instance test.  `Null` and `Unit` are instances of nothing.
    pub fn is_instance(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (_, Value::Unit) => false,
            (Type::Object, _) => true,
            (Type::Nullable(inner), v) => inner.is_instance(v),
            (Type::Primitive(p), v) => v.primitive() == Some(*p),
            (Type::String, Value::Str(_)) => true,
            (Type::Enum(def), Value::Enum(ev)) => Rc::ptr_eq(def, &ev.ty),
            (Type::Class(class), Value::Object(obj)) => obj.borrow().class().is_subclass_of(class),
            (Type::Array { .. }, Value::Array(array)) => self.is_assignable_from(&array.borrow().ty()),
            (Type::Function(sig), Value::Delegate(d)) => d.signature().arity() == sig.arity(),
            (Type::Quoted(sig), Value::Quoted(tree)) => tree
                .ty
                .signature()
                .is_some_and(|s| s.arity() == sig.arity()),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Object => write!(f, "object"),
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::String => write!(f, "string"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Enum(def) => write!(f, "{}", def.name()),
            Type::Class(def) => write!(f, "{}", def.name()),
            Type::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(rank.saturating_sub(1)))
            }
            Type::Function(sig) => write_signature(f, "fn", sig),
            Type::Quoted(sig) => write_signature(f, "quote fn", sig),
        }
    }
}

fn write_signature(f: &mut fmt::Formatter<'_>, prefix: &str, sig: &Signature) -> fmt::Result {
    write!(f, "{}(", prefix)?;
    for (i, param) in sig.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param)?;
    }
    write!(f, ") -> {}", sig.ret)
}
