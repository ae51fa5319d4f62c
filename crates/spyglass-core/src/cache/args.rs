//! Text inputs for member parameters and generic arguments.

use tracing::warn;

use crate::errors::InspectError;
use crate::evaluator::{self, CodeEvaluator};
use crate::host::{ParamInfo, Reflection, TypeKind, TypeRef, Value};
use crate::parse::{self, ParseError};

#[derive(Debug, Clone, Default)]
pub struct ArgumentInputs {
    params: Vec<ParamInfo>,
    generic_params: Vec<String>,
    inputs: Vec<String>,
    pasted: Vec<Option<Value>>,
    generic_inputs: Vec<String>,
    /// Whether the argument panel is shown
    pub open: bool,
}

impl ArgumentInputs {
    pub fn new(params: &[ParamInfo], generic_params: &[String]) -> Self {
        Self {
            params: params.to_vec(),
            generic_params: generic_params.to_vec(),
            inputs: vec![String::new(); params.len()],
            pasted: vec![None; params.len()],
            generic_inputs: vec![String::new(); generic_params.len()],
            open: false,
        }
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn generic_params(&self) -> &[String] {
        &self.generic_params
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn generic_inputs(&self) -> &[String] {
        &self.generic_inputs
    }

    /// Total number of inputs, shown on the evaluate button
    pub fn count(&self) -> usize {
        self.params.len() + self.generic_params.len()
    }

    pub fn set_input(&mut self, index: usize, text: &str) -> Result<(), InspectError> {
        let slot = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| InspectError::unsupported(format!("No parameter #{index}")))?;
        *slot = text.to_string();
        self.pasted[index] = None;
        Ok(())
    }

    pub fn set_generic_input(&mut self, index: usize, text: &str) -> Result<(), InspectError> {
        let slot = self
            .generic_inputs
            .get_mut(index)
            .ok_or_else(|| InspectError::unsupported(format!("No generic argument #{index}")))?;
        *slot = text.to_string();
        Ok(())
    }

    /// Supplies a value for a parameter whose type cannot be typed in
    pub fn paste(&mut self, index: usize, value: Value) -> Result<(), InspectError> {
        let slot = self
            .pasted
            .get_mut(index)
            .ok_or_else(|| InspectError::unsupported(format!("No parameter #{index}")))?;
        *slot = Some(value);
        Ok(())
    }

    /// Placeholder for an empty parameter input
    pub fn hint(&self, index: usize) -> Option<String> {
        self.params.get(index).and_then(|p| parse::example_input(&p.ty))
    }

    pub fn resolve_generic_arguments(
        &self,
        host: &dyn Reflection,
        evaluator: Option<&dyn CodeEvaluator>,
    ) -> Result<Vec<TypeRef>, InspectError> {
        self.generic_params
            .iter()
            .zip(&self.generic_inputs)
            .map(|(name, text)| {
                let text = text.trim();
                if text.is_empty() {
                    return Err(InspectError::argument(name, ParseError::UnknownType(String::new())));
                }
                match parse::resolve_type_name(host, text) {
                    Ok(ty) => Ok(ty),
                    Err(err) => match evaluator {
                        Some(evaluator) => evaluator::evaluate_type(evaluator, text).map_err(|diag| {
                            warn!("Could not evaluate generic argument '{text}': {diag}");
                            InspectError::argument(name, err)
                        }),
                        None => Err(InspectError::argument(name, err)),
                    },
                }
            })
            .collect()
    }

    /// Parses every parameter. `generic_args` closes over parameters typed by a generic parameter.
    pub fn resolve_arguments(&self, host: &dyn Reflection, generic_args: &[TypeRef]) -> Result<Vec<Value>, InspectError> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                if let Some(value) = &self.pasted[i] {
                    return Ok(value.clone());
                }
                let ty = self.bind(&param.ty, generic_args);
                let text = &self.inputs[i];
                match &ty.kind {
                    TypeKind::String => Ok(Value::Str(text.clone())),
                    TypeKind::MetaType => parse::resolve_type_name(host, text)
                        .map(Value::Type)
                        .map_err(|e| InspectError::argument(&param.name, e)),
                    _ if text.trim().is_empty() => Ok(param.default.clone().unwrap_or(Value::Null)),
                    _ if parse::can_parse(&ty) => {
                        parse::parse(text, &ty, host).map_err(|e| InspectError::argument(&param.name, e))
                    }
                    _ => Err(InspectError::argument(
                        &param.name,
                        ParseError::Unsupported(ty.display_name()),
                    )),
                }
            })
            .collect()
    }

    fn bind(&self, ty: &TypeRef, generic_args: &[TypeRef]) -> TypeRef {
        if !matches!(ty.kind, TypeKind::GenericParam) {
            return ty.clone();
        }
        self.generic_params
            .iter()
            .position(|p| *p == ty.name)
            .and_then(|i| generic_args.get(i).cloned())
            .unwrap_or_else(|| ty.clone())
    }
}
