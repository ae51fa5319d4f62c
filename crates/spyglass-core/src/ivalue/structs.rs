use std::sync::Arc;

use tracing::warn;

use crate::caches::StructInfo;
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::Value;
use crate::labels;

use super::{EditorInput, OwnerView};

/// One text input per field of a value type
#[derive(Debug, Clone, Default)]
pub struct StructEditor {
    info: Option<Arc<StructInfo>>,
    instance: Value,
    texts: Vec<String>,
    can_write: bool,
}

impl StructEditor {
    pub fn is_supported(&self) -> bool {
        self.info.as_ref().map(|i| i.is_supported).unwrap_or(false)
    }

    /// `(field name, field type label, text)` per row
    pub fn rows(&self) -> Vec<(String, String, &str)> {
        let Some(info) = &self.info else {
            return Vec::new();
        };
        info.fields
            .iter()
            .zip(&self.texts)
            .map(|(f, text)| (f.name.clone(), labels::type_label(&f.field_type), text.as_str()))
            .collect()
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        self.can_write = owner.can_write;
    }

    pub fn set_value(&mut self, ctx: &InspectContext<'_>, value: &Value, owner: &OwnerView) {
        let ty = ctx.host.runtime_type(value).unwrap_or_else(|| owner.value_type.clone());
        if self.info.as_ref().map(|i| &i.ty) != Some(&ty) {
            self.info = Some(ctx.caches.struct_info(ctx.host, &ty));
        }
        self.instance = value.clone();
        self.texts = match &self.info {
            Some(info) => (0..info.fields.len())
                .map(|i| info.field_text(ctx.host, &self.instance, i))
                .collect(),
            None => Vec::new(),
        };
    }

    pub fn input(&mut self, input: EditorInput) -> Result<(), InspectError> {
        match input {
            EditorInput::FieldText { index, text } => {
                if !self.can_write {
                    return Err(InspectError::unsupported("Struct is read-only"));
                }
                let slot = self
                    .texts
                    .get_mut(index)
                    .ok_or_else(|| InspectError::unsupported(format!("No field #{index}")))?;
                *slot = text;
                Ok(())
            }
            other => Err(InspectError::unsupported(format!("Struct editor does not accept {other:?}"))),
        }
    }

    /// Rebuilds a copy of the instance from the field texts.
    /// Nothing is applied if any field fails to parse.
    pub fn apply(&self, ctx: &InspectContext<'_>) -> Result<Option<Value>, InspectError> {
        let Some(info) = self.info.as_ref().filter(|i| i.is_supported) else {
            return Ok(None);
        };
        if self.instance.is_null() {
            return Ok(None);
        }
        let mut copy = self.instance.clone();
        for (index, text) in self.texts.iter().enumerate() {
            if let Err(e) = info.set_field_text(ctx.host, &mut copy, index, text) {
                warn!("Exception setting value: {e}");
                return Err(e);
            }
        }
        Ok(Some(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::ReflectionCaches;
    use crate::classify::ValueState;
    use crate::config::SpyglassConfig;
    use crate::host::{MemoryHost, NumberKind, TypeBuilder, TypeRef};
    use crate::ivalue::EditorPool;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_rebuilds_copy() {
        let host = MemoryHost::new();
        let point = host.register(
            TypeBuilder::structure("Math.Point")
                .field("x", &TypeRef::number(NumberKind::F32))
                .field("y", &TypeRef::number(NumberKind::F32)),
        );
        let caches = ReflectionCaches::new();
        let config = SpyglassConfig::default();
        let mut editors = EditorPool::new();
        let ctx = InspectContext {
            host: &host,
            caches: &caches,
            config: &config,
            editors: &mut editors,
            evaluator: None,
        };
        let owner = OwnerView {
            name: "Hero.position".into(),
            state: ValueState::ValueStruct,
            can_write: true,
            error: None,
            value_type: point.clone(),
        };

        let original = host.default_value(&point);
        let mut editor = StructEditor::default();
        editor.on_borrowed(&owner);
        editor.set_value(&ctx, &original, &owner);
        assert!(editor.is_supported());
        assert_eq!(editor.rows()[1].2, "0");

        editor.input(EditorInput::FieldText { index: 1, text: "2.5".into() }).unwrap();
        let applied = editor.apply(&ctx).unwrap().unwrap();
        assert_eq!(host.read_field(&applied, "y").unwrap(), Value::f32(2.5));
        assert_eq!(host.read_field(&original, "y").unwrap(), Value::f32(0.0));

        editor.input(EditorInput::FieldText { index: 0, text: "left".into() }).unwrap();
        assert!(matches!(editor.apply(&ctx), Err(InspectError::ArgumentParse { .. })));
    }
}
