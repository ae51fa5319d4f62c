//! Process-wide reflection caches.
//!
//! Filled lazily per type and only cleared on a full reset, so entries and
//! editors can be recycled freely without losing computed metadata.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::enumerate::MemberDescriptor;
use crate::errors::InspectError;
use crate::host::{FieldInfo, MemberInfo, MemberScope, Reflection, TypeKind, TypeRef, Value};
use crate::parse;

/// Field table of a value type edited through per-field text inputs
#[derive(Debug, Clone)]
pub struct StructInfo {
    pub ty: TypeRef,
    pub fields: Vec<FieldInfo>,
    /// Every field parses from text and there is at least one
    pub is_supported: bool,
}

impl StructInfo {
    fn build(host: &dyn Reflection, ty: &TypeRef) -> Self {
        let mut fields = Vec::new();
        let mut resolved = matches!(ty.kind, TypeKind::Struct);
        if resolved {
            match host.members(ty, MemberScope::INSTANCE) {
                Ok(members) => {
                    for member in members {
                        match member {
                            Ok(MemberInfo::Field(f)) if !f.is_static => fields.push(f),
                            Ok(_) => {}
                            Err(_) => resolved = false,
                        }
                    }
                }
                Err(_) => resolved = false,
            }
        }
        let is_supported =
            resolved && !fields.is_empty() && fields.iter().all(|f| parse::can_parse(&f.field_type));
        Self {
            ty: ty.clone(),
            fields,
            is_supported,
        }
    }

    pub fn field_text(&self, host: &dyn Reflection, instance: &Value, index: usize) -> String {
        self.fields
            .get(index)
            .and_then(|f| host.get_field(f, Some(instance)).ok())
            .map(|v| parse::to_input_text(&v))
            .unwrap_or_default()
    }

    pub fn set_field_text(
        &self,
        host: &dyn Reflection,
        instance: &mut Value,
        index: usize,
        text: &str,
    ) -> Result<(), InspectError> {
        let field = self
            .fields
            .get(index)
            .ok_or_else(|| InspectError::unsupported(format!("{} has no field #{index}", self.ty.name)))?;
        let value = parse::parse(text, &field.field_type, host)
            .map_err(|e| InspectError::argument(&field.name, e))?;
        host.set_field(field, Some(instance), value)
            .map_err(|e| InspectError::write(&field.name, e))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEnumValue {
    pub value: i64,
    pub index: usize,
    pub name: String,
}

/// Named values of an enum with duplicate values collapsed to their first declared name
#[derive(Debug, Clone)]
pub struct EnumTable {
    pub ty: TypeRef,
    pub is_flags: bool,
    pub values: Vec<CachedEnumValue>,
}

impl EnumTable {
    fn build(ty: &TypeRef) -> Option<Self> {
        let info = ty.enum_info()?;
        let mut values: Vec<CachedEnumValue> = Vec::new();
        for (_, value) in &info.variants {
            let name = info.name_of(*value).unwrap_or_default();
            if values.iter().any(|v| v.name == name) {
                continue;
            }
            values.push(CachedEnumValue {
                value: *value,
                index: values.len(),
                name: name.to_string(),
            });
        }
        Some(Self {
            ty: ty.clone(),
            is_flags: info.is_flags,
            values,
        })
    }

    pub fn by_value(&self, value: i64) -> Option<&CachedEnumValue> {
        self.values.iter().find(|v| v.value == value)
    }
}

type MemberList = Arc<[Arc<MemberDescriptor>]>;

#[derive(Default)]
pub struct ReflectionCaches {
    members: DashMap<(String, u8), MemberList>,
    structs: DashMap<String, Arc<StructInfo>>,
    enums: DashMap<String, Arc<EnumTable>>,
}

impl ReflectionCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_members(&self, ty: &TypeRef, scope: MemberScope) -> Option<MemberList> {
        self.members
            .get(&(ty.name.clone(), scope.bits()))
            .map(|m| m.clone())
    }

    pub fn store_members(&self, ty: &TypeRef, scope: MemberScope, members: MemberList) {
        self.members.insert((ty.name.clone(), scope.bits()), members);
    }

    pub fn struct_info(&self, host: &dyn Reflection, ty: &TypeRef) -> Arc<StructInfo> {
        if let Some(info) = self.structs.get(&ty.name) {
            return info.clone();
        }
        let info = Arc::new(StructInfo::build(host, ty));
        self.structs.insert(ty.name.clone(), info.clone());
        info
    }

    pub fn enum_table(&self, ty: &TypeRef) -> Option<Arc<EnumTable>> {
        if let Some(table) = self.enums.get(&ty.name) {
            return Some(table.clone());
        }
        let table = Arc::new(EnumTable::build(ty)?);
        self.enums.insert(ty.name.clone(), table.clone());
        Some(table)
    }

    /// Drops everything; only done on a full reset
    pub fn clear(&self) {
        debug!(
            "Clearing reflection caches ({} member lists, {} structs, {} enums)",
            self.members.len(),
            self.structs.len(),
            self.enums.len()
        );
        self.members.clear();
        self.structs.clear();
        self.enums.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, NumberKind, TypeBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enum_table_keeps_first_declared_name() {
        let host = MemoryHost::new();
        let ty = host.register(TypeBuilder::enumeration(
            "Game.Alias",
            &[("A", 1), ("B", 1), ("C", 2)],
            false,
        ));
        let caches = ReflectionCaches::new();
        let table = caches.enum_table(&ty).unwrap();
        assert_eq!(
            table.values,
            vec![
                CachedEnumValue { value: 1, index: 0, name: "A".into() },
                CachedEnumValue { value: 2, index: 1, name: "C".into() },
            ]
        );
    }

    #[test]
    fn test_struct_info_support() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let empty = host.register(TypeBuilder::structure("Math.Empty"));
        let point = host.register(
            TypeBuilder::structure("Math.Point")
                .field("x", &TypeRef::number(NumberKind::I32))
                .field("y", &TypeRef::number(NumberKind::I32)),
        );
        assert!(!caches.struct_info(&host, &empty).is_supported);

        let info = caches.struct_info(&host, &point);
        assert!(info.is_supported);

        let mut value = host.default_value(&point);
        info.set_field_text(&host, &mut value, 1, "7").unwrap();
        assert_eq!(info.field_text(&host, &value, 1), "7");
        assert!(matches!(
            info.set_field_text(&host, &mut value, 0, "seven"),
            Err(InspectError::ArgumentParse { .. })
        ));
    }

    #[test]
    fn test_clear_drops_entries() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let ty = host.register(TypeBuilder::enumeration("Game.One", &[("X", 0)], false));
        let first = caches.enum_table(&ty).unwrap();
        assert!(Arc::ptr_eq(&first, &caches.enum_table(&ty).unwrap()));
        caches.clear();
        assert!(!Arc::ptr_eq(&first, &caches.enum_table(&ty).unwrap()));
    }
}
