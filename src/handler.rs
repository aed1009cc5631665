//! Event handlers with typed, order-independent parameters.
//!
//! Any closure `Fn(&mut S, P1, .., Pn) -> R` with up to eight parameters is a
//! [`Handler`], as long as every `Pi` implements [`Param`] and `R` implements
//! [`HandlerOutput`]. The parameter descriptor is computed once when the
//! handler is registered; each call only converts already-bound values.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::binder::{Bound, LiteralType, ParamKind};
use crate::event::Event;
use crate::request::RequestContext;

/// A value a handler can declare as a parameter.
pub trait Param: Sized {
    fn kind() -> ParamKind;

    /// Build the parameter from its binding. [`Bound::Absent`] (or a binding
    /// of the wrong shape) yields the type's zero value.
    fn from_bound(bound: Bound) -> Self;
}

impl Param for Event {
    fn kind() -> ParamKind {
        ParamKind::Event
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Event(event) => event,
            _ => Event::default(),
        }
    }
}

impl Param for Arc<RequestContext> {
    fn kind() -> ParamKind {
        ParamKind::Request
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Request(request) => request,
            _ => Arc::default(),
        }
    }
}

impl Param for RequestContext {
    fn kind() -> ParamKind {
        ParamKind::Request
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Request(request) => (*request).clone(),
            _ => RequestContext::default(),
        }
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {$(
        impl Param for $t {
            fn kind() -> ParamKind {
                ParamKind::Literal(LiteralType::Int {
                    min: <$t>::MIN as i64,
                    max: <$t>::MAX as i64,
                })
            }

            fn from_bound(bound: Bound) -> Self {
                match bound {
                    Bound::Literal(v) => v
                        .as_i64()
                        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                        .and_then(|n| <$t>::try_from(n).ok())
                        .unwrap_or_default(),
                    _ => <$t>::default(),
                }
            }
        }
    )*};
}

macro_rules! uint_param {
    ($($t:ty),*) => {$(
        impl Param for $t {
            fn kind() -> ParamKind {
                ParamKind::Literal(LiteralType::Uint {
                    max: <$t>::MAX as u64,
                })
            }

            fn from_bound(bound: Bound) -> Self {
                match bound {
                    Bound::Literal(v) => v
                        .as_u64()
                        .or_else(|| {
                            v.as_f64()
                                .filter(|f| f.is_finite() && *f > -1.0)
                                .map(|f| f as u64)
                        })
                        .and_then(|n| <$t>::try_from(n).ok())
                        .unwrap_or_default(),
                    _ => <$t>::default(),
                }
            }
        }
    )*};
}

macro_rules! float_param {
    ($($t:ty),*) => {$(
        impl Param for $t {
            fn kind() -> ParamKind {
                ParamKind::Literal(LiteralType::Float)
            }

            fn from_bound(bound: Bound) -> Self {
                match bound {
                    Bound::Literal(v) => v.as_f64().map(|f| f as $t).unwrap_or_default(),
                    _ => <$t>::default(),
                }
            }
        }
    )*};
}

int_param!(i8, i16, i32, i64, isize);
uint_param!(u8, u16, u32, u64, usize);
float_param!(f32, f64);

impl Param for bool {
    fn kind() -> ParamKind {
        ParamKind::Literal(LiteralType::Bool)
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Literal(Value::Bool(b)) => b,
            _ => false,
        }
    }
}

impl Param for String {
    fn kind() -> ParamKind {
        ParamKind::Literal(LiteralType::String)
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Literal(Value::String(s)) => s,
            _ => String::new(),
        }
    }
}

impl Param for Vec<Value> {
    fn kind() -> ParamKind {
        ParamKind::Literal(LiteralType::Array)
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Literal(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }
}

impl Param for Map<String, Value> {
    fn kind() -> ParamKind {
        ParamKind::Literal(LiteralType::Object)
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Literal(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

impl Param for Value {
    fn kind() -> ParamKind {
        ParamKind::Literal(LiteralType::Any)
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Literal(v) => v,
            _ => Value::Null,
        }
    }
}

/// `None` when nothing could be bound, so handlers can tell a missing
/// argument from a zero one.
impl<T: Param> Param for Option<T> {
    fn kind() -> ParamKind {
        T::kind()
    }

    fn from_bound(bound: Bound) -> Self {
        match bound {
            Bound::Absent => None,
            bound => Some(T::from_bound(bound)),
        }
    }
}

/// What a handler returns. Only an `Err` matters; it ends the connection.
pub trait HandlerOutput {
    fn into_result(self) -> Result<(), String>;
}

impl HandlerOutput for () {
    fn into_result(self) -> Result<(), String> {
        Ok(())
    }
}

impl<T, E: Display> HandlerOutput for Result<T, E> {
    fn into_result(self) -> Result<(), String> {
        self.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// A function that can be registered for an event name.
///
/// `M` is an inference marker and never needs to be named.
pub trait Handler<S, M>: Send + Sync + 'static {
    fn params() -> Vec<ParamKind>;

    fn call(&self, state: &mut S, args: Vec<Bound>) -> Result<(), String>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, S, R, $($ty,)*> Handler<S, (R, $($ty,)*)> for F
        where
            F: Fn(&mut S, $($ty,)*) -> R + Send + Sync + 'static,
            R: HandlerOutput,
            $($ty: Param,)*
        {
            fn params() -> Vec<ParamKind> {
                vec![$($ty::kind(),)*]
            }

            fn call(&self, state: &mut S, args: Vec<Bound>) -> Result<(), String> {
                let mut args = args.into_iter();
                $(let $ty = $ty::from_bound(args.next().unwrap_or(Bound::Absent));)*
                (self)(state, $($ty,)*).into_result()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

type CallFn<S> = dyn Fn(&mut S, Vec<Bound>) -> Result<(), String> + Send + Sync;

/// A type-erased handler together with its parameter descriptor.
pub struct BoxedHandler<S> {
    params: Vec<ParamKind>,
    call: Box<CallFn<S>>,
}

impl<S: 'static> BoxedHandler<S> {
    pub fn new<H, M>(handler: H) -> Self
    where
        H: Handler<S, M>,
    {
        Self {
            params: H::params(),
            call: Box::new(move |state: &mut S, args: Vec<Bound>| handler.call(state, args)),
        }
    }
}

impl<S> BoxedHandler<S> {
    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn call(&self, state: &mut S, args: Vec<Bound>) -> Result<(), String> {
        (self.call)(state, args)
    }
}

impl<S> std::fmt::Debug for BoxedHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedHandler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
