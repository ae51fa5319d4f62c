use std::sync::Arc;

use tracing::warn;

use crate::caches::EnumTable;
use crate::complete::{EnumCompleter, Suggestion};
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{TypeRef, Value};
use crate::parse;

use super::{EditorInput, OwnerView};

/// Free text with name completion, or one toggle per named value for flags enums
#[derive(Debug, Clone, Default)]
pub struct EnumEditor {
    ty: Option<TypeRef>,
    table: Option<Arc<EnumTable>>,
    text: String,
    toggles: Vec<bool>,
    completer: EnumCompleter,
    can_write: bool,
}

impl EnumEditor {
    pub fn is_flags(&self) -> bool {
        self.table.as_ref().map(|t| t.is_flags).unwrap_or(false)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `(name, checked)` per named value, in declaration order
    pub fn toggles(&self) -> Vec<(&str, bool)> {
        match &self.table {
            Some(table) if table.is_flags => table
                .values
                .iter()
                .zip(&self.toggles)
                .map(|(v, on)| (v.name.as_str(), *on))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.completer.suggestions(&self.text)
    }

    pub fn choose(&mut self, suggestion: &Suggestion) {
        self.text = self.completer.choose(&self.text, suggestion);
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        self.can_write = owner.can_write;
    }

    pub fn set_value(&mut self, ctx: &InspectContext<'_>, value: &Value, owner: &OwnerView) {
        let ty = ctx.host.runtime_type(value).unwrap_or_else(|| owner.value_type.clone());
        if self.ty.as_ref() != Some(&ty) {
            self.table = ctx.caches.enum_table(&ty);
            match &self.table {
                Some(table) => self.completer.set_table(table.clone()),
                None => self.completer.clear(),
            }
            self.ty = Some(ty);
        }

        let bits = match value {
            Value::Enum { bits, .. } => *bits,
            _ => 0,
        };
        self.text = parse::to_input_text(value);
        self.toggles = match &self.table {
            Some(table) if table.is_flags => table
                .values
                .iter()
                .map(|v| if v.value == 0 { bits == 0 } else { bits & v.value == v.value })
                .collect(),
            _ => Vec::new(),
        };
    }

    pub fn input(&mut self, input: EditorInput) -> Result<(), InspectError> {
        if !self.can_write {
            return Err(InspectError::unsupported("Enum value is read-only"));
        }
        match input {
            EditorInput::Text(text) if !self.is_flags() => {
                self.text = text;
                Ok(())
            }
            EditorInput::Flag { index, on } if self.is_flags() => {
                let toggle = self
                    .toggles
                    .get_mut(index)
                    .ok_or_else(|| InspectError::unsupported(format!("No flag #{index}")))?;
                *toggle = on;
                Ok(())
            }
            other => Err(InspectError::unsupported(format!("Enum editor does not accept {other:?}"))),
        }
    }

    pub fn apply(&self, ctx: &InspectContext<'_>) -> Result<Option<Value>, InspectError> {
        let (Some(ty), Some(table)) = (&self.ty, &self.table) else {
            return Ok(None);
        };
        if table.is_flags {
            let bits = table
                .values
                .iter()
                .zip(&self.toggles)
                .filter(|(_, on)| **on)
                .fold(0, |acc, (v, _)| acc | v.value);
            return Ok(Some(Value::Enum { ty: ty.clone(), bits }));
        }
        match parse::parse(&self.text, ty, ctx.host) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Exception setting from dropdown: {e}");
                Err(InspectError::argument(ty.short_name(), e))
            }
        }
    }
}
