//! Host members: methods, constructors, fields and properties.
//!
//! The evaluator never reflects over host types.  Every member an IR node
//! refers to is resolved up front into one of these descriptors, which carry
//! their native behaviour as closures.  Field and property reads/writes go
//! through an injected [`Accessor`].

use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{InterpretError, Result};
use crate::types::{ClassType, Type};
use crate::value::Value;

/// Native body of a method: receiver (absent for static methods) and a
/// mutable argument list, so a callee can overwrite by-reference arguments.
pub type MethodFn = dyn Fn(Option<&Value>, &mut [Value]) -> Result<Value>;

/// Native body of a constructor.
pub type ConstructorFn = dyn Fn(&mut [Value]) -> Result<Value>;

pub type GetterFn = dyn Fn(Option<&Value>) -> Result<Value>;
pub type SetterFn = dyn Fn(Option<&Value>, Value) -> Result<()>;

#[derive(Clone)]
pub struct Method {
    name: Rc<str>,
    params: Vec<Type>,
    ret: Type,
    is_static: bool,
    body: Rc<MethodFn>,
}

impl Method {
    pub fn new_static<S, F>(name: S, params: Vec<Type>, ret: Type, body: F) -> Self
    where
        S: AsRef<str>,
        F: Fn(&mut [Value]) -> Result<Value> + 'static,
    {
        Method {
            name: Rc::from(name.as_ref()),
            params,
            ret,
            is_static: true,
            body: Rc::new(move |_, args| body(args)),
        }
    }

    pub fn new_instance<S, F>(name: S, params: Vec<Type>, ret: Type, body: F) -> Self
    where
        S: AsRef<str>,
        F: Fn(&Value, &mut [Value]) -> Result<Value> + 'static,
    {
        let owned: Rc<str> = Rc::from(name.as_ref());
        let label = Rc::clone(&owned);

        Method {
            name: owned,
            params,
            ret,
            is_static: false,
            body: Rc::new(move |receiver, args| match receiver {
                Some(receiver) => body(receiver, args),
                None => Err(InterpretError::null_reference(label.to_string())),
            }),
        }
    }

    /// Multi-dimensional array read: `array.get(i, j, ...)`.
    pub fn array_get(element: Type, rank: usize, index: Type) -> Self {
        Method::new_instance("get", vec![index; rank], element, |receiver, args| {
            let Value::Array(array) = receiver else {
                return Err(InterpretError::conversion(receiver.kind_name(), "array"));
            };
            let indices = args.iter().map(Value::as_index).collect::<Result<Vec<_>>>()?;
            let value = array.borrow().get(&indices)?;
            Ok(value)
        })
    }

    /// Multi-dimensional array write: `array.set(i, j, ..., value)`.
    pub fn array_set(element: Type, rank: usize, index: Type) -> Self {
        let mut params = vec![index; rank];
        params.push(element);

        Method::new_instance("set", params, Type::Void, |receiver, args| {
            let Value::Array(array) = receiver else {
                return Err(InterpretError::conversion(receiver.kind_name(), "array"));
            };
            let Some((value, indices)) = args.split_last() else {
                return Err(InterpretError::invalid("array set needs a value"));
            };
            let indices = indices.iter().map(Value::as_index).collect::<Result<Vec<_>>>()?;
            array.borrow_mut().set(&indices, value.clone())?;
            Ok(Value::Unit)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Invokes the native body.  Void methods always yield `Value::Unit`.
    pub fn call(&self, receiver: Option<&Value>, args: &mut [Value]) -> Result<Value> {
        debug!("Calling host method '{}' with {} argument(s)", self.name, args.len());

        let result = (self.body)(receiver, args)?;
        if self.ret == Type::Void {
            return Ok(Value::Unit);
        }
        Ok(result)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("is_static", &self.is_static)
            .finish()
    }
}

#[derive(Clone)]
pub struct Constructor {
    params: Vec<Type>,
    body: Rc<ConstructorFn>,
}

impl Constructor {
    pub fn new<F>(params: Vec<Type>, body: F) -> Self
    where
        F: Fn(&mut [Value]) -> Result<Value> + 'static,
    {
        Constructor {
            params,
            body: Rc::new(body),
        }
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn call(&self, args: &mut [Value]) -> Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Clone)]
pub enum MemberKind {
    Field,
    Property {
        getter: Option<Rc<GetterFn>>,
        setter: Option<Rc<SetterFn>>,
    },
}

/// A field or property reference, resolved once when the IR is built.
#[derive(Clone)]
pub struct Member {
    name: Rc<str>,
    ty: Type,
    kind: MemberKind,
    declaring: Option<Rc<ClassType>>,
}

impl Member {
    pub fn field<S: AsRef<str>>(name: S, ty: Type) -> Self {
        Member {
            name: Rc::from(name.as_ref()),
            ty,
            kind: MemberKind::Field,
            declaring: None,
        }
    }

    /// A static field stored on `class`.
    pub fn static_field<S: AsRef<str>>(class: &Rc<ClassType>, name: S, ty: Type) -> Self {
        Member {
            declaring: Some(Rc::clone(class)),
            ..Member::field(name, ty)
        }
    }

    pub fn property<S: AsRef<str>>(name: S, ty: Type) -> Self {
        Member {
            name: Rc::from(name.as_ref()),
            ty,
            kind: MemberKind::Property {
                getter: None,
                setter: None,
            },
            declaring: None,
        }
    }

    pub fn with_getter<F>(mut self, get: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<Value> + 'static,
    {
        if let MemberKind::Property { getter, .. } = &mut self.kind {
            *getter = Some(Rc::new(get));
        }
        self
    }

    pub fn with_setter<F>(mut self, set: F) -> Self
    where
        F: Fn(Option<&Value>, Value) -> Result<()> + 'static,
    {
        if let MemberKind::Property { setter, .. } = &mut self.kind {
            *setter = Some(Rc::new(set));
        }
        self
    }

    /// Marks a property as static (no instance expression).
    pub fn on_class(mut self, class: &Rc<ClassType>) -> Self {
        self.declaring = Some(Rc::clone(class));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, MemberKind::Field)
    }

    pub fn is_static(&self) -> bool {
        self.declaring.is_some()
    }

    pub fn declaring(&self) -> Option<&Rc<ClassType>> {
        self.declaring.as_ref()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_field() { "field" } else { "property" };
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("kind", &kind)
            .field("static", &self.is_static())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accessor provider
// ─────────────────────────────────────────────────────────────────────────────

/// Field/property access capability injected into the interpreter.
///
/// `instance` is `None` for static members.
pub trait Accessor {
    fn get(&self, member: &Member, instance: Option<&Value>) -> Result<Value>;
    fn set(&self, member: &Member, instance: Option<&Value>, value: Value) -> Result<()>;
}

/// Default accessor over the crate's own host object model.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostAccessor;

impl Accessor for HostAccessor {
    fn get(&self, member: &Member, instance: Option<&Value>) -> Result<Value> {
        match member.kind() {
            MemberKind::Property { getter, .. } => match getter {
                Some(get) => get(instance),
                None => Err(InterpretError::host(format!(
                    "property '{}' has no getter",
                    member.name()
                ))),
            },
            MemberKind::Field => match (member.declaring(), instance) {
                (Some(class), _) => class.static_field(member.name()).ok_or_else(|| {
                    InterpretError::host(format!(
                        "class '{}' has no static field '{}'",
                        class.name(),
                        member.name()
                    ))
                }),
                (None, Some(Value::Object(obj))) => {
                    obj.borrow().get(member.name()).ok_or_else(|| {
                        InterpretError::host(format!("object has no field '{}'", member.name()))
                    })
                }
                (None, Some(Value::Null)) | (None, None) => {
                    Err(InterpretError::null_reference(member.name()))
                }
                (None, Some(other)) => Err(InterpretError::host(format!(
                    "cannot read field '{}' of a {} value",
                    member.name(),
                    other.kind_name()
                ))),
            },
        }
    }

    fn set(&self, member: &Member, instance: Option<&Value>, value: Value) -> Result<()> {
        debug!("Setting member '{}' to {}", member.name(), value);

        match member.kind() {
            MemberKind::Property { setter, .. } => match setter {
                Some(set) => set(instance, value),
                None => Err(InterpretError::host(format!(
                    "property '{}' has no setter",
                    member.name()
                ))),
            },
            MemberKind::Field => match (member.declaring(), instance) {
                (Some(class), _) => {
                    class.set_static_field(member.name(), value);
                    Ok(())
                }
                (None, Some(Value::Object(obj))) => {
                    obj.borrow_mut().set(member.name(), value);
                    Ok(())
                }
                (None, Some(Value::Null)) | (None, None) => {
                    Err(InterpretError::null_reference(member.name()))
                }
                (None, Some(other)) => Err(InterpretError::host(format!(
                    "cannot write field '{}' of a {} value",
                    member.name(),
                    other.kind_name()
                ))),
            },
        }
    }
}
