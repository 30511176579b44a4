pub mod convert;
pub mod delegate;
pub mod environment;
pub mod error;
pub mod expr;
pub mod host;
pub mod interpreter;
pub mod nullable;
pub mod operators;
pub mod printer;
pub mod types;
pub mod value;
pub mod visitor;

use std::rc::Rc;

pub use delegate::{Delegate, MAX_ARITY};
pub use error::{InterpretError, Result};
pub use expr::{BinaryOp, Expr, Parameter, UnaryOp};
pub use host::{Accessor, HostAccessor};
pub use interpreter::Interpreter;
pub use types::{Signature, Type};
pub use value::Value;
pub use visitor::ExpressionVisitor;

/// Interprets a function literal with the default host accessor.
pub fn interpret(lambda: &Rc<Expr>) -> Result<Delegate> {
    Interpreter::new().interpret(lambda)
}
