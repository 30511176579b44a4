//! Callable synthesis.
//!
//! A [`Delegate`] pairs a general entry point (`&mut [Value]` in, `Value`
//! out) with an exact-arity [`Adapter`]: one of a closed family of
//! `Func0..Func16` / `Action0..Action16` shapes generated below.  The
//! adapter is picked by padding the declared parameter list to
//! [`MAX_ARITY`] slots and looking at the last used one.
//!
//! Host code reaches typed Rust closures through [`Delegate::coerce`]:
//!
//! ```ignore
//! let add: Func2<i32, i32, i32> = delegate.coerce()?;
//! assert_eq!(add(1, 2)?, 3);
//! ```

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use log::info;

use crate::error::{InterpretError, Result};
use crate::types::{Signature, Type};
use crate::value::{FromValue, IntoValue, Value};

/// Largest parameter count a synthesized callable may declare.
pub const MAX_ARITY: usize = 16;

/// Dynamic entry point shared by every adapter of a delegate.
pub type GeneralFn = Rc<dyn Fn(&mut [Value]) -> Result<Value>>;

/// One position of the padded parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSlot {
    Used(Type),
    Unused,
}

/// Pads `params` to `MAX_ARITY` slots with the `Unused` sentinel.
pub fn pad(params: &[Type]) -> Result<[ParamSlot; MAX_ARITY]> {
    if params.len() > MAX_ARITY {
        return Err(InterpretError::invalid(format!(
            "callables support at most {} parameters, got {}",
            MAX_ARITY,
            params.len()
        )));
    }
    let mut slots: [ParamSlot; MAX_ARITY] = std::array::from_fn(|_| ParamSlot::Unused);
    for (slot, ty) in slots.iter_mut().zip(params) {
        *slot = ParamSlot::Used(ty.clone());
    }
    Ok(slots)
}

/// Arity selected by the last used slot.
fn used_arity(slots: &[ParamSlot]) -> usize {
    slots
        .iter()
        .rposition(|slot| matches!(slot, ParamSlot::Used(_)))
        .map_or(0, |last| last + 1)
}

/// Conversion of a delegate into a typed Rust callable.
pub trait FromDelegate: Sized {
    fn from_delegate(delegate: &Delegate) -> Result<Self>;
}

macro_rules! value_ty {
    ($_:ident) => {
        Value
    };
}

macro_rules! adapters {
    ($( $n:literal => $func:ident, $action:ident ( $($arg:ident : $A:ident),* ); )*) => {
        /// Exact-arity shapes over `Value`.
        #[derive(Clone)]
        pub enum Adapter {
            $(
                $func(Rc<dyn Fn($(value_ty!($arg)),*) -> Result<Value>>),
                $action(Rc<dyn Fn($(value_ty!($arg)),*) -> Result<()>>),
            )*
        }

        impl Adapter {
            fn synthesize(arity: usize, is_action: bool, general: GeneralFn) -> Result<Adapter> {
                match arity {
                    $(
                        $n => Ok(if is_action {
                            Adapter::$action(Rc::new(move |$($arg: Value),*| {
                                general(&mut [$($arg),*]).map(|_| ())
                            }))
                        } else {
                            Adapter::$func(Rc::new(move |$($arg: Value),*| general(&mut [$($arg),*])))
                        }),
                    )*
                    other => Err(InterpretError::invalid(format!(
                        "no adapter for {} parameters",
                        other
                    ))),
                }
            }

            pub fn arity(&self) -> usize {
                match self {
                    $( Adapter::$func(_) | Adapter::$action(_) => $n, )*
                }
            }

            pub fn is_action(&self) -> bool {
                match self {
                    $(
                        Adapter::$func(_) => false,
                        Adapter::$action(_) => true,
                    )*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        Adapter::$func(_) => stringify!($func),
                        Adapter::$action(_) => stringify!($action),
                    )*
                }
            }
        }

        $(
            /// Typed callable shape.
            pub type $func<$($A,)* R> = Box<dyn Fn($($A),*) -> Result<R>>;

            /// Typed callable shape without a result.
            pub type $action<$($A),*> = $func<$($A,)* ()>;

            impl<$($A: IntoValue + 'static,)* R: FromValue + 'static> FromDelegate for $func<$($A,)* R> {
                fn from_delegate(delegate: &Delegate) -> Result<Self> {
                    match &delegate.adapter {
                        Adapter::$func(f) => {
                            let f = Rc::clone(f);
                            Ok(Box::new(move |$($arg: $A),*| R::from_value(f($($arg.into_value()),*)?)))
                        }
                        Adapter::$action(f) if TypeId::of::<R>() == TypeId::of::<()>() => {
                            let f = Rc::clone(f);
                            Ok(Box::new(move |$($arg: $A),*| {
                                f($($arg.into_value()),*)?;
                                R::from_value(Value::Unit)
                            }))
                        }
                        other => Err(InterpretError::conversion(
                            other.name(),
                            format!("{}<{} argument(s)>", stringify!($func), $n),
                        )),
                    }
                }
            }
        )*
    };
}

adapters! {
    0 => Func0, Action0 ();
    1 => Func1, Action1 (a0: A0);
    2 => Func2, Action2 (a0: A0, a1: A1);
    3 => Func3, Action3 (a0: A0, a1: A1, a2: A2);
    4 => Func4, Action4 (a0: A0, a1: A1, a2: A2, a3: A3);
    5 => Func5, Action5 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4);
    6 => Func6, Action6 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
    7 => Func7, Action7 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
    8 => Func8, Action8 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7);
    9 => Func9, Action9 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8);
    10 => Func10, Action10 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9);
    11 => Func11, Action11 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10);
    12 => Func12, Action12 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10, a11: A11);
    13 => Func13, Action13 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10, a11: A11, a12: A12);
    14 => Func14, Action14 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10, a11: A11, a12: A12, a13: A13);
    15 => Func15, Action15 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10, a11: A11, a12: A12, a13: A13, a14: A14);
    16 => Func16, Action16 (a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7, a8: A8, a9: A9, a10: A10, a11: A11, a12: A12, a13: A13, a14: A14, a15: A15);
}

/// A synthesized callable.
#[derive(Clone)]
pub struct Delegate {
    signature: Rc<Signature>,
    general: GeneralFn,
    adapter: Adapter,
}

impl Delegate {
    /// Builds a delegate of the arity `signature` declares around `general`.
    pub fn synthesize(signature: Rc<Signature>, general: GeneralFn) -> Result<Delegate> {
        let slots = pad(&signature.params)?;
        let arity = used_arity(&slots);
        let adapter = Adapter::synthesize(arity, signature.is_action(), Rc::clone(&general))?;

        info!("Synthesized {} for {}", adapter.name(), Type::Function(Rc::clone(&signature)));

        Ok(Delegate {
            signature,
            general,
            adapter,
        })
    }

    /// Wraps a host closure as a delegate.
    pub fn from_fn<F>(signature: Signature, body: F) -> Result<Delegate>
    where
        F: Fn(&mut [Value]) -> Result<Value> + 'static,
    {
        Delegate::synthesize(Rc::new(signature), Rc::new(body))
    }

    pub fn signature(&self) -> &Rc<Signature> {
        &self.signature
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Dynamic call.  The callee may overwrite entries of `args`.
    pub fn invoke(&self, args: &mut [Value]) -> Result<Value> {
        if args.len() != self.adapter.arity() {
            return Err(InterpretError::invalid(format!(
                "delegate expects {} argument(s), got {}",
                self.adapter.arity(),
                args.len()
            )));
        }
        let result = (self.general)(args)?;
        if self.adapter.is_action() {
            return Ok(Value::Unit);
        }
        Ok(result)
    }

    /// Converts into a typed callable such as `Func2<i32, i32, i32>`.
    pub fn coerce<F: FromDelegate>(&self) -> Result<F> {
        F::from_delegate(self)
    }

    /// Identity of the underlying callable, shared by clones.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.general) as *const () as usize
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("signature", &self.signature)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}
