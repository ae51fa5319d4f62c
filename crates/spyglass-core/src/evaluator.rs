//! Hook for an external code evaluator.
//!
//! Argument inputs fall back to it when a typed generic argument is not a
//! known type name, so expressions such as `typeof(List<int>)` can still
//! resolve to a type.

use thiserror::Error;

use crate::host::{HostResult, TypeRef, Value};

pub type Invocable = Box<dyn Fn() -> HostResult<Value>>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .messages.join("; "))]
pub struct Diagnostics {
    pub messages: Vec<String>,
}

impl Diagnostics {
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

pub trait CodeEvaluator {
    fn compile(&self, source: &str) -> Result<Invocable, Diagnostics>;
}

/// Compiles and runs `source`, accepting the result only if it is a type object
pub fn evaluate_type(evaluator: &dyn CodeEvaluator, source: &str) -> Result<TypeRef, Diagnostics> {
    let invocable = evaluator.compile(source)?;
    match invocable() {
        Ok(Value::Type(ty)) => Ok(ty),
        Ok(other) => Err(Diagnostics::single(format!(
            "Expression '{source}' evaluated to {other}, not a type"
        ))),
        Err(e) => Err(Diagnostics::single(e.to_string())),
    }
}
