use crate::error::{InterpretError, Result};
use crate::expr::Parameter;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use log::debug;

/// Shared handle to a scope frame.
pub type Env = Rc<RefCell<Environment>>;

/// Binding key: the identity of the parameter allocation, never its name.
#[derive(Debug, Clone)]
pub struct ParamKey(Rc<Parameter>);

impl PartialEq for ParamKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ParamKey {}

impl Hash for ParamKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<ParamKey, Value>,
    enclosing: Option<Env>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Env) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// A fresh root frame behind a shared handle.
    pub fn root() -> Env {
        Rc::new(RefCell::new(Environment::new()))
    }

    /// A fresh frame chained to `enclosing`, behind a shared handle.
    pub fn child(enclosing: &Env) -> Env {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    pub fn define(&mut self, param: &Rc<Parameter>, value: Value) {
        debug!("Binding parameter '{}' = {}", param.name(), value);
        self.values.insert(ParamKey(Rc::clone(param)), value);
    }

    /// Whether this frame or any enclosing one binds `param`.
    pub fn contains(&self, param: &Rc<Parameter>) -> bool {
        if self.values.contains_key(&ParamKey(Rc::clone(param))) {
            return true;
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().contains(param),
            None => false,
        }
    }

    pub fn get(&self, param: &Rc<Parameter>) -> Result<Value> {
        if let Some(value) = self.values.get(&ParamKey(Rc::clone(param))) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(param)
        } else {
            Err(InterpretError::unbound(param.name()))
        }
    }

    /// Writes to the nearest frame that owns `param`.
    pub fn assign(&mut self, param: &Rc<Parameter>, value: Value) -> Result<()> {
        let key = ParamKey(Rc::clone(param));
        if self.values.contains_key(&key) {
            self.values.insert(key, value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(param, value)
        } else {
            Err(InterpretError::unbound(param.name()))
        }
    }
}
