//! Raw member metadata as reported by the host.

use bitflags::bitflags;

use super::types::TypeRef;
use super::value::Value;

/// Opaque handle the host uses to find a member again (overloads share names)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberToken(pub u32);

bitflags! {
    /// Binding scope used when asking the host for members
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemberScope: u8 {
        const INSTANCE = 0b01;
        const STATIC = 0b10;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeRef,
    /// Default used when the parameter is optional and left empty
    pub default: Option<Value>,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeRef, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub token: MemberToken,
    pub name: String,
    pub declaring_type: TypeRef,
    pub field_type: TypeRef,
    pub is_static: bool,
    /// Compile-time constant
    pub is_literal: bool,
    /// Assignable only during construction
    pub is_init_only: bool,
    pub is_compiler_generated: bool,
}

impl FieldInfo {
    pub fn can_write(&self) -> bool {
        !(self.is_literal || self.is_init_only)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub token: MemberToken,
    pub name: String,
    pub declaring_type: TypeRef,
    pub property_type: TypeRef,
    pub is_static: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub index_params: Vec<ParamInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub token: MemberToken,
    pub name: String,
    pub declaring_type: TypeRef,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub params: Vec<ParamInfo>,
    pub generic_params: Vec<String>,
    /// Accessors and operators that are reached through other members
    pub is_special_name: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    pub token: MemberToken,
    pub declaring_type: TypeRef,
    pub params: Vec<ParamInfo>,
    /// Zero-argument constructor implied for value types
    pub is_synthesized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberInfo {
    Field(FieldInfo),
    Property(PropertyInfo),
    Method(MethodInfo),
    Constructor(ConstructorInfo),
}

impl MemberInfo {
    pub fn name(&self) -> &str {
        match self {
            MemberInfo::Field(f) => &f.name,
            MemberInfo::Property(p) => &p.name,
            MemberInfo::Method(m) => &m.name,
            MemberInfo::Constructor(_) => ".ctor",
        }
    }

    pub fn declaring_type(&self) -> &TypeRef {
        match self {
            MemberInfo::Field(f) => &f.declaring_type,
            MemberInfo::Property(p) => &p.declaring_type,
            MemberInfo::Method(m) => &m.declaring_type,
            MemberInfo::Constructor(c) => &c.declaring_type,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            MemberInfo::Field(f) => f.is_static,
            MemberInfo::Property(p) => p.is_static,
            MemberInfo::Method(m) => m.is_static,
            MemberInfo::Constructor(_) => true,
        }
    }

    pub fn params(&self) -> &[ParamInfo] {
        match self {
            MemberInfo::Field(_) => &[],
            MemberInfo::Property(p) => &p.index_params,
            MemberInfo::Method(m) => &m.params,
            MemberInfo::Constructor(c) => &c.params,
        }
    }

    pub fn token(&self) -> MemberToken {
        match self {
            MemberInfo::Field(f) => f.token,
            MemberInfo::Property(p) => p.token,
            MemberInfo::Method(m) => m.token,
            MemberInfo::Constructor(c) => c.token,
        }
    }
}
