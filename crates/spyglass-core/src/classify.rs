//! Maps a runtime type to the editing state that drives how it is displayed.

use crate::caches::ReflectionCaches;
use crate::host::{Reflection, TypeKind, TypeRef, Value};

/// How an evaluated value is presented and edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueState {
    NotEvaluated,
    Exception,
    Boolean,
    Number,
    String,
    Enum,
    Collection,
    Dictionary,
    ValueStruct,
    Color,
    Unsupported,
}

impl ValueState {
    /// States whose editor stays meaningful while the value is null
    pub fn keeps_editor_when_null(self) -> bool {
        matches!(self, ValueState::String | ValueState::Exception)
    }
}

pub struct ValueClassifier<'a> {
    host: &'a dyn Reflection,
    caches: &'a ReflectionCaches,
    exclusions: &'a [String],
}

impl<'a> ValueClassifier<'a> {
    pub fn new(host: &'a dyn Reflection, caches: &'a ReflectionCaches, exclusions: &'a [String]) -> Self {
        Self {
            host,
            caches,
            exclusions,
        }
    }

    /// First matching rule wins; an exception always takes precedence
    pub fn classify(&self, ty: &TypeRef, has_exception: bool) -> ValueState {
        if has_exception {
            return ValueState::Exception;
        }
        match &ty.kind {
            TypeKind::Bool => return ValueState::Boolean,
            TypeKind::Number(_) => return ValueState::Number,
            TypeKind::String => return ValueState::String,
            TypeKind::Enum(_) => return ValueState::Enum,
            TypeKind::Color(_) => return ValueState::Color,
            TypeKind::Struct if self.caches.struct_info(self.host, ty).is_supported => {
                return ValueState::ValueStruct
            }
            _ => {}
        }
        if ty.map_types().is_some() {
            ValueState::Dictionary
        } else if ty.sequence_element().is_some() && !self.is_excluded(ty) {
            ValueState::Collection
        } else {
            ValueState::Unsupported
        }
    }

    /// Classifies by the value's runtime type, or by `fallback` when the value is null.
    /// Returns the type that was used.
    pub fn classify_value(&self, value: &Value, fallback: &TypeRef, has_exception: bool) -> (ValueState, TypeRef) {
        let ty = self
            .host
            .runtime_type(value)
            .unwrap_or_else(|| fallback.clone());
        (self.classify(&ty, has_exception), ty)
    }

    fn is_excluded(&self, ty: &TypeRef) -> bool {
        ty.ancestry().iter().any(|t| {
            self.exclusions
                .iter()
                .any(|ex| *ex == t.name || ex.as_str() == t.short_name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, NumberKind, TypeBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_priority_order() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let exclusions = vec!["Transform".to_string()];
        let classifier = ValueClassifier::new(&host, &caches, &exclusions);

        let vec3 = host.register(
            TypeBuilder::structure("Math.Vector3")
                .field("x", &TypeRef::number(NumberKind::F32))
                .field("y", &TypeRef::number(NumberKind::F32)),
        );
        let opaque = host.register(TypeBuilder::structure("Math.Opaque").field("o", &TypeRef::object()));
        let list = host.list_type(&TypeRef::string());
        let map = host.map_type(&TypeRef::string(), &TypeRef::bool());
        let transform = host.register(
            TypeBuilder::class("Engine.Transform").sequence_of(&TypeRef::object()),
        );
        let mood = host.register(TypeBuilder::enumeration("Game.Mood", &[("Calm", 0)], false));

        let cases = [
            (TypeRef::bool(), ValueState::Boolean),
            (TypeRef::number(NumberKind::U16), ValueState::Number),
            (TypeRef::string(), ValueState::String),
            (mood, ValueState::Enum),
            (TypeRef::color32(), ValueState::Color),
            (vec3, ValueState::ValueStruct),
            (opaque, ValueState::Unsupported),
            (map, ValueState::Dictionary),
            (list, ValueState::Collection),
            (transform, ValueState::Unsupported),
            (TypeRef::object(), ValueState::Unsupported),
        ];
        for (ty, expected) in cases {
            assert_eq!(classifier.classify(&ty, false), expected, "classifying {}", ty.name);
            assert_eq!(classifier.classify(&ty, true), ValueState::Exception);
        }
    }

    #[test]
    fn test_null_uses_fallback_type() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let classifier = ValueClassifier::new(&host, &caches, &[]);

        let (state, ty) = classifier.classify_value(&Value::Null, &TypeRef::string(), false);
        assert_eq!(state, ValueState::String);
        assert_eq!(ty, TypeRef::string());

        let (state, ty) = classifier.classify_value(&Value::i32(3), &TypeRef::object(), false);
        assert_eq!(state, ValueState::Number);
        assert_eq!(ty, TypeRef::number(NumberKind::I32));
    }
}
