use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Primitive numeric kinds understood by the inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumberKind {
    pub const ALL: [NumberKind; 10] = [
        NumberKind::I8,
        NumberKind::I16,
        NumberKind::I32,
        NumberKind::I64,
        NumberKind::U8,
        NumberKind::U16,
        NumberKind::U32,
        NumberKind::U64,
        NumberKind::F32,
        NumberKind::F64,
    ];

    pub fn is_float(self) -> bool {
        matches!(self, NumberKind::F32 | NumberKind::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            NumberKind::I8 | NumberKind::I16 | NumberKind::I32 | NumberKind::I64
        ) || self.is_float()
    }

    /// Host type name for this kind
    pub fn type_name(self) -> &'static str {
        match self {
            NumberKind::I8 => "i8",
            NumberKind::I16 => "i16",
            NumberKind::I32 => "i32",
            NumberKind::I64 => "i64",
            NumberKind::U8 => "u8",
            NumberKind::U16 => "u16",
            NumberKind::U32 => "u32",
            NumberKind::U64 => "u64",
            NumberKind::F32 => "f32",
            NumberKind::F64 => "f64",
        }
    }
}

/// Storage layout of a color value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorRepr {
    /// Four `f32` channels in `0.0..=1.0`
    Float,
    /// Four `u8` channels in `0..=255`
    Byte,
}

/// Named values of an enum type, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct EnumInfo {
    pub variants: Vec<(String, i64)>,
    pub is_flags: bool,
}

impl EnumInfo {
    pub fn new(variants: &[(&str, i64)], is_flags: bool) -> Self {
        Self {
            variants: variants
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            is_flags,
        }
    }

    /// First declared name carrying `value`
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

/// What a type fundamentally is, as far as classification cares
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    /// The root reference type every other type is assignable to
    Object,
    Bool,
    Number(NumberKind),
    String,
    Enum(EnumInfo),
    Color(ColorRepr),
    /// User-defined value type with copy semantics
    Struct,
    /// User-defined reference type
    Class,
    Interface,
    /// Type objects themselves (`Type` parameters, generic arguments)
    MetaType,
    /// Unbound generic parameter such as `T`
    GenericParam,
}

/// Iteration capability of a type
#[derive(Debug, Clone, PartialEq)]
pub enum Iteration {
    Sequence { element: TypeRef },
    Map { key: TypeRef, value: TypeRef },
}

/// Host metadata for one type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Fully qualified name; the identity of the type
    pub name: String,
    pub kind: TypeKind,
    pub base: Option<TypeRef>,
    pub iteration: Option<Iteration>,
    /// Parameter names of an open generic definition
    pub generic_params: Vec<String>,
    /// Arguments of a constructed generic type
    pub generic_args: Vec<TypeRef>,
    pub is_abstract: bool,
    pub is_static: bool,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            iteration: None,
            generic_params: Vec::new(),
            generic_args: Vec::new(),
            is_abstract: false,
            is_static: false,
        }
    }
}

/// Shared handle to host type metadata. Two handles are equal when they name the same type.
#[derive(Clone)]
pub struct TypeRef(Arc<TypeInfo>);

impl TypeRef {
    pub fn new(info: TypeInfo) -> Self {
        Self(Arc::new(info))
    }

    pub fn void() -> Self {
        Self::new(TypeInfo::new("void", TypeKind::Void))
    }

    pub fn object() -> Self {
        Self::new(TypeInfo::new("object", TypeKind::Object))
    }

    pub fn bool() -> Self {
        Self::new(TypeInfo::new("bool", TypeKind::Bool))
    }

    pub fn number(kind: NumberKind) -> Self {
        Self::new(TypeInfo::new(kind.type_name(), TypeKind::Number(kind)))
    }

    pub fn string() -> Self {
        Self::new(TypeInfo::new("string", TypeKind::String))
    }

    pub fn meta_type() -> Self {
        Self::new(TypeInfo::new("Type", TypeKind::MetaType))
    }

    pub fn color() -> Self {
        Self::new(TypeInfo::new("Color", TypeKind::Color(ColorRepr::Float)))
    }

    pub fn color32() -> Self {
        Self::new(TypeInfo::new("Color32", TypeKind::Color(ColorRepr::Byte)))
    }

    pub fn generic_param(name: &str) -> Self {
        Self::new(TypeInfo::new(name, TypeKind::GenericParam))
    }

    pub fn info(&self) -> &TypeInfo {
        &self.0
    }

    /// Value types are copied on read; writes to them must be propagated to their holder
    pub fn is_value_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool
                | TypeKind::Number(_)
                | TypeKind::Enum(_)
                | TypeKind::Color(_)
                | TypeKind::Struct
        )
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_args.is_empty()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum(_))
    }

    pub fn enum_info(&self) -> Option<&EnumInfo> {
        match &self.kind {
            TypeKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    /// Whether instances can be created through a constructor
    pub fn is_constructible(&self) -> bool {
        matches!(self.kind, TypeKind::Class | TypeKind::Struct)
            && !self.is_abstract
            && !self.is_static
    }

    /// Name without its namespace
    pub fn short_name(&self) -> &str {
        let head = self.name.split('[').next().unwrap_or(&self.name);
        head.rsplit('.').next().unwrap_or(head)
    }

    /// Human readable name including generic arguments, e.g. `List<i32>`
    pub fn display_name(&self) -> String {
        let short = self.short_name();
        let base = short.split('`').next().unwrap_or(short);
        if !self.generic_args.is_empty() {
            let args: Vec<String> = self.generic_args.iter().map(|t| t.display_name()).collect();
            format!("{}<{}>", base, args.join(", "))
        } else if !self.generic_params.is_empty() {
            format!("{}<{}>", base, self.generic_params.join(", "))
        } else {
            base.to_string()
        }
    }

    /// This type followed by its base types, most derived first
    pub fn ancestry(&self) -> Vec<TypeRef> {
        let mut chain = vec![self.clone()];
        let mut current = self.base.clone();
        while let Some(ty) = current {
            current = ty.base.clone();
            chain.push(ty);
        }
        chain
    }

    pub fn is_assignable_to(&self, target: &TypeRef) -> bool {
        if matches!(target.kind, TypeKind::Object) {
            return true;
        }
        self.ancestry().iter().any(|t| t == target)
    }

    pub fn sequence_element(&self) -> Option<&TypeRef> {
        match &self.iteration {
            Some(Iteration::Sequence { element }) => Some(element),
            _ => None,
        }
    }

    pub fn map_types(&self) -> Option<(&TypeRef, &TypeRef)> {
        match &self.iteration {
            Some(Iteration::Map { key, value }) => Some((key, value)),
            _ => None,
        }
    }
}

impl Deref for TypeRef {
    type Target = TypeInfo;

    fn deref(&self) -> &TypeInfo {
        &self.0
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
