//! Centralised error hierarchy for the **expression interpreter**.
//!
//! Every subsystem (operator table, conversions, scope chain, evaluator,
//! callable synthesis, host accessors) converts its failure modes into one of
//! the variants defined here.  This gives a uniform `Result<T>` alias across
//! the crate while still carrying enough detail to diagnose the failing node.
//!
//! The module **does not** print diagnostics itself.  Errors are synchronous
//! and fatal to the current call: nothing in the crate retries.

use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InterpretError {
    /// Read or write of a parameter that no enclosing scope frame binds.
    #[error("Parameter '{name}' is not bound in any enclosing scope")]
    UnboundParameter { name: String },

    /// No special case, user operator, or table entry handles this node.
    #[error("Unsupported node: {message}")]
    UnsupportedNode { message: String },

    /// A conversion has no routine for the pair, or the runtime value does
    /// not fit the requested shape.
    #[error("Cannot convert {from} to {to}")]
    ConversionFailure { from: String, to: String },

    /// Checked arithmetic or checked conversion left the destination range.
    #[error("Arithmetic operation '{operation}' overflowed {ty}")]
    ArithmeticOverflow { operation: String, ty: String },

    /// Integer division or remainder by zero.
    #[error("Attempted to divide {ty} by zero")]
    DivisionByZero { ty: String },

    /// Array access outside of the array bounds.
    #[error("Index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// `value` read on an absent optional.
    #[error("Optional value must have a value (accessing '{member}')")]
    NullValueAccess { member: String },

    /// Instance member, method, or invocation on a null receiver.
    #[error("Null reference while accessing '{member}'")]
    NullReference { member: String },

    /// Malformed node shape or call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by a host method, constructor, or accessor.
    #[error("Host error: {0}")]
    Host(String),
}

impl InterpretError {
    /// Helper constructor for the **scope chain**.
    pub fn unbound<S: Into<String>>(name: S) -> Self {
        let name: String = name.into();

        info!("Creating UnboundParameter error: name={}", name);

        InterpretError::UnboundParameter { name }
    }

    /// Helper constructor used when dispatch falls through every policy.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating UnsupportedNode error: msg={}", message);

        InterpretError::UnsupportedNode { message }
    }

    /// Helper constructor for the **conversion** layer.
    pub fn conversion<F: ToString, T: ToString>(from: F, to: T) -> Self {
        let (from, to) = (from.to_string(), to.to_string());

        info!("Creating ConversionFailure error: from={}, to={}", from, to);

        InterpretError::ConversionFailure { from, to }
    }

    /// Helper constructor for checked **arithmetic**.
    pub fn overflow<S: Into<String>, T: ToString>(operation: S, ty: T) -> Self {
        let (operation, ty) = (operation.into(), ty.to_string());

        info!("Creating ArithmeticOverflow error: op={}, ty={}", operation, ty);

        InterpretError::ArithmeticOverflow { operation, ty }
    }

    pub fn divide_by_zero<T: ToString>(ty: T) -> Self {
        let ty = ty.to_string();

        info!("Creating DivisionByZero error: ty={}", ty);

        InterpretError::DivisionByZero { ty }
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        info!("Creating IndexOutOfRange error: index={}, len={}", index, len);

        InterpretError::IndexOutOfRange { index, len }
    }

    pub fn null_value<S: Into<String>>(member: S) -> Self {
        let member: String = member.into();

        info!("Creating NullValueAccess error: member={}", member);

        InterpretError::NullValueAccess { member }
    }

    pub fn null_reference<S: Into<String>>(member: S) -> Self {
        let member: String = member.into();

        info!("Creating NullReference error: member={}", member);

        InterpretError::NullReference { member }
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating InvalidArgument error: msg={}", message);

        InterpretError::InvalidArgument(message)
    }

    /// Helper constructor for host callbacks.
    pub fn host<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Host error: msg={}", message);

        InterpretError::Host(message)
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, InterpretError>;
