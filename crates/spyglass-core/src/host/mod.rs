//! Host reflection facade.
//!
//! Everything the inspector knows about the running application goes through
//! [`Reflection`]. Every call is fallible: host code can throw, objects can be
//! destroyed between ticks, and metadata can fail to load.

use thiserror::Error;

pub mod members;
pub mod memory;
pub mod types;
pub mod value;

pub use members::{
    ConstructorInfo, FieldInfo, MemberInfo, MemberScope, MemberToken, MethodInfo, ParamInfo,
    PropertyInfo,
};
pub use memory::{MemoryHost, TypeBuilder};
pub use types::{ColorRepr, EnumInfo, Iteration, NumberKind, TypeInfo, TypeKind, TypeRef};
pub use value::{Color, Color32, ColorF, Number, ObjectId, ObjectRef, StructValue, Value};

/// Failure raised by the host while reading, writing or invoking
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Attempted to divide by zero.")]
    DivideByZero,

    #[error("Object reference not set to an instance of an object.")]
    NullReference,

    #[error("Invalid cast from '{from}' to '{to}'.")]
    InvalidCast { from: String, to: String },

    #[error("Member '{member}' not found on '{type_name}'.")]
    MissingMember { type_name: String, member: String },

    #[error("Index {index} was out of range (count {count}).")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("The given key '{0}' was not present in the dictionary.")]
    KeyNotFound(String),

    #[error("Parameter count mismatch: expected {expected}, got {actual}.")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("The object has been destroyed.")]
    Destroyed,

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Custom(String),
}

impl HostError {
    pub fn invalid_cast(from: &TypeRef, to: &TypeRef) -> Self {
        Self::InvalidCast {
            from: from.name.clone(),
            to: to.name.clone(),
        }
    }

    pub fn missing_member(ty: &TypeRef, member: &str) -> Self {
        Self::MissingMember {
            type_name: ty.name.clone(),
            member: member.to_string(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Reflection services of the running application.
///
/// Implementations may use interior mutability; the inspector only ever holds
/// a shared reference and drives every call from a single thread.
pub trait Reflection {
    /// Members declared directly on `ty` (not inherited) in declaration order.
    /// Individual entries fail when their metadata cannot be resolved.
    fn members(&self, ty: &TypeRef, scope: MemberScope) -> HostResult<Vec<HostResult<MemberInfo>>>;

    fn get_field(&self, field: &FieldInfo, instance: Option<&Value>) -> HostResult<Value>;

    /// Writes a field. Value-type instances are mutated in place, so the caller
    /// owns the copy and must propagate it.
    fn set_field(&self, field: &FieldInfo, instance: Option<&mut Value>, value: Value) -> HostResult<()>;

    fn get_property(&self, property: &PropertyInfo, instance: Option<&Value>, index: &[Value]) -> HostResult<Value>;

    fn set_property(
        &self,
        property: &PropertyInfo,
        instance: Option<&mut Value>,
        value: Value,
        index: &[Value],
    ) -> HostResult<()>;

    fn invoke(
        &self,
        method: &MethodInfo,
        instance: Option<&mut Value>,
        args: &[Value],
        generic_args: &[TypeRef],
    ) -> HostResult<Value>;

    fn construct(&self, ty: &TypeRef, ctor: &ConstructorInfo, args: &[Value]) -> HostResult<Value>;

    /// Closes an open generic definition over `args`
    fn make_generic_type(&self, definition: &TypeRef, args: &[TypeRef]) -> HostResult<TypeRef>;

    fn runtime_type(&self, value: &Value) -> Option<TypeRef> {
        value.runtime_type()
    }

    /// Whether a reference still points at a live object
    fn is_alive(&self, _value: &Value) -> bool {
        true
    }

    fn iter_sequence<'a>(&'a self, sequence: &Value) -> HostResult<Box<dyn Iterator<Item = Value> + 'a>>;

    fn iter_map<'a>(&'a self, map: &Value) -> HostResult<Box<dyn Iterator<Item = (Value, Value)> + 'a>>;

    fn is_read_only(&self, container: &Value) -> bool;

    fn set_index(&self, sequence: &Value, index: usize, item: Value) -> HostResult<()>;

    fn set_key(&self, map: &Value, key: &Value, item: Value) -> HostResult<()>;

    fn contains_key(&self, map: &Value, key: &Value) -> HostResult<bool>;

    fn all_types(&self) -> Vec<TypeRef>;

    fn type_by_name(&self, name: &str) -> Option<TypeRef>;

    /// Host-side string conversion used for value labels
    fn describe(&self, value: &Value) -> String {
        value.to_string()
    }
}
