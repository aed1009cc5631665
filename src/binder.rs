//! Type-directed argument binding.
//!
//! A handler's parameter list is described once, at registration, as a list
//! of [`ParamKind`]s. For each incoming message [`bind`] walks that list and
//! produces one [`Bound`] value per parameter:
//!
//! - `Event` takes the message's DOM event.
//! - `Request` takes the connection's request context.
//! - `Literal(ty)` takes the first remaining literal argument whose JSON type
//!   is exactly `ty`, or failing that the first one convertible to `ty`. The
//!   chosen argument is consumed.
//!
//! A parameter with no matching argument binds to [`Bound::Absent`]; the
//! handler still runs and sees the parameter's default value.

use std::sync::Arc;

use serde_json::Value;

use crate::event::Event;
use crate::request::RequestContext;

/// The JSON shape a literal parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    Bool,
    /// Signed integer of the given inclusive range.
    Int { min: i64, max: i64 },
    /// Unsigned integer no larger than `max`.
    Uint { max: u64 },
    Float,
    String,
    Array,
    Object,
    /// Any JSON value, including `null`.
    Any,
}

impl LiteralType {
    pub const I64: LiteralType = LiteralType::Int {
        min: i64::MIN,
        max: i64::MAX,
    };
    pub const U64: LiteralType = LiteralType::Uint { max: u64::MAX };

    /// True when the decoded JSON value already has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            LiteralType::Bool => value.is_boolean(),
            LiteralType::Int { min, max } => value
                .as_i64()
                .is_some_and(|n| (min..=max).contains(&n)),
            LiteralType::Uint { max } => value.as_u64().is_some_and(|n| n <= max),
            LiteralType::Float => value.is_f64(),
            LiteralType::String => value.is_string(),
            LiteralType::Array => value.is_array(),
            LiteralType::Object => value.is_object(),
            LiteralType::Any => true,
        }
    }

    /// True when the value can be converted to this type.
    ///
    /// Only numbers convert between numeric types, and only when the
    /// (truncated) value fits the target's range. Nothing converts to or from
    /// strings, booleans or containers.
    pub fn converts(self, value: &Value) -> bool {
        match self {
            LiteralType::Int { min, max } => match (value.as_i64(), value.as_u64()) {
                (Some(n), _) => (min..=max).contains(&n),
                (None, Some(_)) => false,
                (None, None) => fits(value, min as f64, max as f64),
            },
            LiteralType::Uint { max } => match (value.as_u64(), value.as_i64()) {
                (Some(n), _) => n <= max,
                (None, Some(_)) => false,
                (None, None) => fits(value, 0.0, max as f64),
            },
            LiteralType::Float => value.is_number(),
            other => other.matches(value),
        }
    }
}

fn fits(value: &Value, min: f64, max: f64) -> bool {
    value
        .as_f64()
        .map(f64::trunc)
        .is_some_and(|f| f.is_finite() && f >= min && f <= max)
}

/// What a handler parameter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Event,
    Request,
    Literal(LiteralType),
}

/// A resolved argument, ready to be converted into the handler's parameter.
#[derive(Debug, Clone)]
pub enum Bound {
    Event(Event),
    Request(Arc<RequestContext>),
    Literal(Value),
    Absent,
}

/// Resolve handler arguments for one message.
///
/// Pure: reads its inputs and returns one [`Bound`] per entry in `params`.
/// Duplicate literal types in one signature resolve first-come, first-served
/// in argument order.
pub fn bind(
    params: &[ParamKind],
    event: &Event,
    request: &Arc<RequestContext>,
    literals: &[Value],
) -> Vec<Bound> {
    let mut pool: Vec<&Value> = literals.iter().collect();

    params
        .iter()
        .map(|param| match param {
            ParamKind::Event => Bound::Event(event.clone()),
            ParamKind::Request => Bound::Request(Arc::clone(request)),
            ParamKind::Literal(ty) => {
                let position = pool
                    .iter()
                    .position(|v| ty.matches(v))
                    .or_else(|| pool.iter().position(|v| ty.converts(v)));
                match position {
                    Some(i) => Bound::Literal(pool.remove(i).clone()),
                    None => Bound::Absent,
                }
            }
        })
        .collect()
}
