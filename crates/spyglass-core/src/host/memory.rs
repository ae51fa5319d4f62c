//! In-memory implementation of the reflection facade.
//!
//! `MemoryHost` keeps a registry of types built with [`TypeBuilder`] and a heap
//! of reference objects. Property getters, setters, methods and constructors
//! are plain closures, so tests and the REPL demo can model clamping setters,
//! throwing getters and generic methods without a real runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::members::{
    ConstructorInfo, FieldInfo, MemberInfo, MemberScope, MemberToken, MethodInfo, ParamInfo,
    PropertyInfo,
};
use super::types::{EnumInfo, Iteration, NumberKind, TypeInfo, TypeKind, TypeRef};
use super::value::{Color, Color32, ColorF, Number, ObjectId, ObjectRef, StructValue, Value};
use super::{HostError, HostResult, Reflection};

pub type Getter = Arc<dyn Fn(&MemoryHost, Option<&Value>, &[Value]) -> HostResult<Value> + Send + Sync>;
pub type Setter =
    Arc<dyn Fn(&MemoryHost, Option<&mut Value>, Value, &[Value]) -> HostResult<()> + Send + Sync>;
pub type Invoker =
    Arc<dyn Fn(&MemoryHost, Option<&mut Value>, &[Value], &[TypeRef]) -> HostResult<Value> + Send + Sync>;
pub type Factory = Arc<dyn Fn(&MemoryHost, &TypeRef, &[Value]) -> HostResult<Value> + Send + Sync>;

#[derive(Clone)]
enum Behavior {
    Field { initial: Value },
    Property { getter: Option<Getter>, setter: Option<Setter> },
    Method(Invoker),
    Constructor(Factory),
}

#[derive(Clone)]
enum HostMember {
    Resolved(MemberInfo, Behavior),
    Broken(String),
}

struct HostType {
    ty: TypeRef,
    members: Vec<HostMember>,
}

enum ObjectData {
    Plain,
    List { items: Vec<Value>, read_only: bool },
    Map { entries: Vec<(Value, Value)> },
}

struct HostObject {
    ty: TypeRef,
    fields: IndexMap<String, Value>,
    data: ObjectData,
    alive: bool,
}

enum PendingMember {
    Field {
        name: String,
        ty: TypeRef,
        is_static: bool,
        is_literal: bool,
        is_init_only: bool,
        is_compiler_generated: bool,
        initial: Value,
    },
    Property {
        name: String,
        ty: TypeRef,
        is_static: bool,
        index_params: Vec<ParamInfo>,
        getter: Option<Getter>,
        setter: Option<Setter>,
    },
    Method {
        name: String,
        return_type: TypeRef,
        is_static: bool,
        params: Vec<ParamInfo>,
        generic_params: Vec<String>,
        body: Invoker,
    },
    Constructor {
        params: Vec<ParamInfo>,
        body: Factory,
    },
    Broken(String),
}

/// Declarative description of a host type, registered with [`MemoryHost::register`]
pub struct TypeBuilder {
    info: TypeInfo,
    members: Vec<PendingMember>,
}

impl TypeBuilder {
    fn with_kind(name: &str, kind: TypeKind) -> Self {
        Self {
            info: TypeInfo::new(name, kind),
            members: Vec::new(),
        }
    }

    pub fn class(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Struct)
    }

    pub fn interface(name: &str) -> Self {
        let mut builder = Self::with_kind(name, TypeKind::Interface);
        builder.info.is_abstract = true;
        builder
    }

    pub fn static_class(name: &str) -> Self {
        let mut builder = Self::with_kind(name, TypeKind::Class);
        builder.info.is_static = true;
        builder
    }

    pub fn enumeration(name: &str, variants: &[(&str, i64)], is_flags: bool) -> Self {
        Self::with_kind(name, TypeKind::Enum(EnumInfo::new(variants, is_flags)))
    }

    pub fn base(mut self, base: &TypeRef) -> Self {
        self.info.base = Some(base.clone());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.info.is_abstract = true;
        self
    }

    pub fn generic(mut self, params: &[&str]) -> Self {
        self.info.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn sequence_of(mut self, element: &TypeRef) -> Self {
        self.info.iteration = Some(Iteration::Sequence {
            element: element.clone(),
        });
        self
    }

    pub fn map_of(mut self, key: &TypeRef, value: &TypeRef) -> Self {
        self.info.iteration = Some(Iteration::Map {
            key: key.clone(),
            value: value.clone(),
        });
        self
    }

    fn push_field(mut self, name: &str, ty: &TypeRef, is_static: bool, initial: Value) -> Self {
        self.members.push(PendingMember::Field {
            name: name.to_string(),
            ty: ty.clone(),
            is_static,
            is_literal: false,
            is_init_only: false,
            is_compiler_generated: false,
            initial,
        });
        self
    }

    fn last_field_flags(mut self, literal: bool, init_only: bool, generated: bool) -> Self {
        if let Some(PendingMember::Field {
            is_literal,
            is_init_only,
            is_compiler_generated,
            ..
        }) = self.members.last_mut()
        {
            *is_literal = literal;
            *is_init_only = init_only;
            *is_compiler_generated = generated;
        }
        self
    }

    pub fn field(self, name: &str, ty: &TypeRef) -> Self {
        self.push_field(name, ty, false, Value::Null)
    }

    pub fn readonly_field(self, name: &str, ty: &TypeRef) -> Self {
        self.push_field(name, ty, false, Value::Null)
            .last_field_flags(false, true, false)
    }

    /// Backing storage that reflection reports but the inspector hides
    pub fn hidden_field(self, name: &str, ty: &TypeRef) -> Self {
        self.push_field(name, ty, false, Value::Null)
            .last_field_flags(false, false, true)
    }

    pub fn static_field(self, name: &str, ty: &TypeRef, initial: Value) -> Self {
        self.push_field(name, ty, true, initial)
    }

    pub fn const_field(self, name: &str, ty: &TypeRef, value: Value) -> Self {
        self.push_field(name, ty, true, value)
            .last_field_flags(true, false, false)
    }

    fn push_property(
        mut self,
        name: &str,
        ty: &TypeRef,
        is_static: bool,
        index_params: Vec<ParamInfo>,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Self {
        self.members.push(PendingMember::Property {
            name: name.to_string(),
            ty: ty.clone(),
            is_static,
            index_params,
            getter,
            setter,
        });
        self
    }

    pub fn property<G>(self, name: &str, ty: &TypeRef, getter: G) -> Self
    where
        G: Fn(&MemoryHost, Option<&Value>, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.push_property(name, ty, false, Vec::new(), Some(Arc::new(getter)), None)
    }

    pub fn property_rw<G, S>(self, name: &str, ty: &TypeRef, getter: G, setter: S) -> Self
    where
        G: Fn(&MemoryHost, Option<&Value>, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
        S: Fn(&MemoryHost, Option<&mut Value>, Value, &[Value]) -> HostResult<()> + Send + Sync + 'static,
    {
        self.push_property(
            name,
            ty,
            false,
            Vec::new(),
            Some(Arc::new(getter)),
            Some(Arc::new(setter)),
        )
    }

    pub fn static_property<G>(self, name: &str, ty: &TypeRef, getter: G) -> Self
    where
        G: Fn(&MemoryHost, Option<&Value>, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.push_property(name, ty, true, Vec::new(), Some(Arc::new(getter)), None)
    }

    pub fn indexer<G>(self, name: &str, ty: &TypeRef, params: Vec<ParamInfo>, getter: G) -> Self
    where
        G: Fn(&MemoryHost, Option<&Value>, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.push_property(name, ty, false, params, Some(Arc::new(getter)), None)
    }

    fn push_method(
        mut self,
        name: &str,
        return_type: &TypeRef,
        is_static: bool,
        generic_params: &[&str],
        params: Vec<ParamInfo>,
        body: Invoker,
    ) -> Self {
        self.members.push(PendingMember::Method {
            name: name.to_string(),
            return_type: return_type.clone(),
            is_static,
            params,
            generic_params: generic_params.iter().map(|p| p.to_string()).collect(),
            body,
        });
        self
    }

    pub fn method<F>(self, name: &str, return_type: &TypeRef, params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&MemoryHost, Option<&mut Value>, &[Value], &[TypeRef]) -> HostResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.push_method(name, return_type, false, &[], params, Arc::new(body))
    }

    pub fn static_method<F>(self, name: &str, return_type: &TypeRef, params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&MemoryHost, Option<&mut Value>, &[Value], &[TypeRef]) -> HostResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.push_method(name, return_type, true, &[], params, Arc::new(body))
    }

    pub fn generic_method<F>(
        self,
        name: &str,
        return_type: &TypeRef,
        generic_params: &[&str],
        params: Vec<ParamInfo>,
        body: F,
    ) -> Self
    where
        F: Fn(&MemoryHost, Option<&mut Value>, &[Value], &[TypeRef]) -> HostResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.push_method(name, return_type, false, generic_params, params, Arc::new(body))
    }

    pub fn constructor<F>(mut self, params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&MemoryHost, &TypeRef, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.members.push(PendingMember::Constructor {
            params,
            body: Arc::new(body),
        });
        self
    }

    /// Parameterless constructor that allocates an instance with default fields
    pub fn default_constructor(self) -> Self {
        self.constructor(Vec::new(), |host, ty, _| Ok(host.alloc(ty)))
    }

    /// A member whose metadata fails to load when enumerated
    pub fn broken_member(mut self, reason: &str) -> Self {
        self.members.push(PendingMember::Broken(reason.to_string()));
        self
    }
}

/// Reflection facade over an in-process object heap
pub struct MemoryHost {
    types: RwLock<IndexMap<String, Arc<HostType>>>,
    objects: RwLock<HashMap<ObjectId, HostObject>>,
    statics: RwLock<HashMap<(String, String), Value>>,
    next_token: AtomicU32,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let host = Self {
            types: RwLock::new(IndexMap::new()),
            objects: RwLock::new(HashMap::new()),
            statics: RwLock::new(HashMap::new()),
            next_token: AtomicU32::new(1),
        };
        let mut builtins = vec![
            TypeRef::void(),
            TypeRef::object(),
            TypeRef::bool(),
            TypeRef::string(),
            TypeRef::meta_type(),
            TypeRef::color(),
            TypeRef::color32(),
        ];
        builtins.extend(NumberKind::ALL.iter().map(|k| TypeRef::number(*k)));
        {
            let mut types = host.types.write();
            for ty in builtins {
                types.insert(
                    ty.name.clone(),
                    Arc::new(HostType {
                        ty,
                        members: Vec::new(),
                    }),
                );
            }
        }
        host
    }

    fn token(&self) -> MemberToken {
        MemberToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Registered handle for `ty`, falling back to `ty` itself
    pub fn resolve(&self, ty: &TypeRef) -> TypeRef {
        self.types
            .read()
            .get(&ty.name)
            .map(|t| t.ty.clone())
            .unwrap_or_else(|| ty.clone())
    }

    fn resolve_params(&self, params: Vec<ParamInfo>) -> Vec<ParamInfo> {
        params
            .into_iter()
            .map(|p| ParamInfo {
                ty: self.resolve(&p.ty),
                ..p
            })
            .collect()
    }

    /// Adds a type to the registry and returns its handle
    pub fn register(&self, builder: TypeBuilder) -> TypeRef {
        let ty = TypeRef::new(builder.info);
        let mut members = Vec::with_capacity(builder.members.len());
        for pending in builder.members {
            let member = match pending {
                PendingMember::Field {
                    name,
                    ty: field_type,
                    is_static,
                    is_literal,
                    is_init_only,
                    is_compiler_generated,
                    initial,
                } => {
                    if is_static {
                        self.statics
                            .write()
                            .insert((ty.name.clone(), name.clone()), initial.clone());
                    }
                    HostMember::Resolved(
                        MemberInfo::Field(FieldInfo {
                            token: self.token(),
                            name,
                            declaring_type: ty.clone(),
                            field_type: self.resolve(&field_type),
                            is_static,
                            is_literal,
                            is_init_only,
                            is_compiler_generated,
                        }),
                        Behavior::Field { initial },
                    )
                }
                PendingMember::Property {
                    name,
                    ty: property_type,
                    is_static,
                    index_params,
                    getter,
                    setter,
                } => HostMember::Resolved(
                    MemberInfo::Property(PropertyInfo {
                        token: self.token(),
                        name,
                        declaring_type: ty.clone(),
                        property_type: self.resolve(&property_type),
                        is_static,
                        can_read: getter.is_some(),
                        can_write: setter.is_some(),
                        index_params: self.resolve_params(index_params),
                    }),
                    Behavior::Property { getter, setter },
                ),
                PendingMember::Method {
                    name,
                    return_type,
                    is_static,
                    params,
                    generic_params,
                    body,
                } => HostMember::Resolved(
                    MemberInfo::Method(MethodInfo {
                        token: self.token(),
                        name,
                        declaring_type: ty.clone(),
                        return_type: self.resolve(&return_type),
                        is_static,
                        params: self.resolve_params(params),
                        generic_params,
                        is_special_name: false,
                    }),
                    Behavior::Method(body),
                ),
                PendingMember::Constructor { params, body } => HostMember::Resolved(
                    MemberInfo::Constructor(ConstructorInfo {
                        token: self.token(),
                        declaring_type: ty.clone(),
                        params: self.resolve_params(params),
                        is_synthesized: false,
                    }),
                    Behavior::Constructor(body),
                ),
                PendingMember::Broken(reason) => HostMember::Broken(reason),
            };
            members.push(member);
        }
        debug!("Registered host type {} with {} members", ty.name, members.len());
        self.types.write().insert(
            ty.name.clone(),
            Arc::new(HostType {
                ty: ty.clone(),
                members,
            }),
        );
        ty
    }

    /// Registers (or returns) the list type for `element`
    pub fn list_type(&self, element: &TypeRef) -> TypeRef {
        let name = format!("Collections.List`1[{}]", element.name);
        if let Some(existing) = self.types.read().get(&name) {
            return existing.ty.clone();
        }
        let mut info = TypeInfo::new(name, TypeKind::Class);
        info.iteration = Some(Iteration::Sequence {
            element: element.clone(),
        });
        info.generic_params = vec!["T".into()];
        info.generic_args = vec![element.clone()];
        let ty = TypeRef::new(info);
        self.types.write().insert(
            ty.name.clone(),
            Arc::new(HostType {
                ty: ty.clone(),
                members: Vec::new(),
            }),
        );
        ty
    }

    /// Registers (or returns) the dictionary type for `key` and `value`
    pub fn map_type(&self, key: &TypeRef, value: &TypeRef) -> TypeRef {
        let name = format!("Collections.Dictionary`2[{},{}]", key.name, value.name);
        if let Some(existing) = self.types.read().get(&name) {
            return existing.ty.clone();
        }
        let mut info = TypeInfo::new(name, TypeKind::Class);
        info.iteration = Some(Iteration::Map {
            key: key.clone(),
            value: value.clone(),
        });
        info.generic_params = vec!["TKey".into(), "TValue".into()];
        info.generic_args = vec![key.clone(), value.clone()];
        let ty = TypeRef::new(info);
        self.types.write().insert(
            ty.name.clone(),
            Arc::new(HostType {
                ty: ty.clone(),
                members: Vec::new(),
            }),
        );
        ty
    }

    fn host_type(&self, ty: &TypeRef) -> Option<Arc<HostType>> {
        self.types.read().get(&ty.name).cloned()
    }

    fn behavior(&self, declaring: &TypeRef, token: MemberToken) -> HostResult<Behavior> {
        let host_type = self
            .host_type(declaring)
            .ok_or_else(|| HostError::missing_member(declaring, "<type>"))?;
        host_type
            .members
            .iter()
            .find_map(|m| match m {
                HostMember::Resolved(info, behavior) if info.token() == token => Some(behavior.clone()),
                _ => None,
            })
            .ok_or_else(|| HostError::missing_member(declaring, &format!("token {}", token.0)))
    }

    /// Declared instance fields of a type and its bases, root first
    fn instance_fields(&self, ty: &TypeRef) -> Vec<(FieldInfo, Value)> {
        let mut chain = ty.ancestry();
        chain.reverse();
        let mut fields = Vec::new();
        for t in chain {
            if let Some(host_type) = self.host_type(&t) {
                for member in &host_type.members {
                    if let HostMember::Resolved(MemberInfo::Field(f), Behavior::Field { initial }) = member {
                        if !f.is_static {
                            fields.push((f.clone(), initial.clone()));
                        }
                    }
                }
            }
        }
        fields
    }

    fn struct_slot(&self, ty: &TypeRef, name: &str) -> HostResult<usize> {
        self.instance_fields(ty)
            .iter()
            .position(|(f, _)| f.name == name)
            .ok_or_else(|| HostError::missing_member(ty, name))
    }

    /// Zero value for `ty`; reference types default to null
    pub fn default_value(&self, ty: &TypeRef) -> Value {
        let ty = self.resolve(ty);
        match &ty.kind {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Number(kind) => Value::Number(Number::zero(*kind)),
            TypeKind::Enum(_) => Value::Enum { ty: ty.clone(), bits: 0 },
            TypeKind::Color(super::types::ColorRepr::Float) => Value::Color(Color::Float(ColorF::default())),
            TypeKind::Color(super::types::ColorRepr::Byte) => Value::Color(Color::Byte(Color32::default())),
            TypeKind::Struct => Value::Struct(StructValue {
                ty: ty.clone(),
                fields: self
                    .instance_fields(&ty)
                    .into_iter()
                    .map(|(f, initial)| {
                        if initial.is_null() {
                            self.default_value(&f.field_type)
                        } else {
                            initial
                        }
                    })
                    .collect(),
            }),
            _ => Value::Null,
        }
    }

    fn insert_object(&self, ty: &TypeRef, data: ObjectData) -> Value {
        let ty = self.resolve(ty);
        let fields = self
            .instance_fields(&ty)
            .into_iter()
            .map(|(f, initial)| {
                let value = if initial.is_null() {
                    self.default_value(&f.field_type)
                } else {
                    initial
                };
                (f.name, value)
            })
            .collect();
        let id = ObjectId::new();
        self.objects.write().insert(
            id,
            HostObject {
                ty: ty.clone(),
                fields,
                data,
                alive: true,
            },
        );
        Value::Object(ObjectRef { id, ty })
    }

    /// Allocates a reference object with default field values
    pub fn alloc(&self, ty: &TypeRef) -> Value {
        self.insert_object(ty, ObjectData::Plain)
    }

    pub fn alloc_list(&self, ty: &TypeRef, items: Vec<Value>, read_only: bool) -> Value {
        self.insert_object(ty, ObjectData::List { items, read_only })
    }

    pub fn alloc_map(&self, ty: &TypeRef, entries: Vec<(Value, Value)>) -> Value {
        self.insert_object(ty, ObjectData::Map { entries })
    }

    fn object_ref(value: &Value) -> HostResult<&ObjectRef> {
        match value {
            Value::Object(obj) => Ok(obj),
            Value::Null => Err(HostError::NullReference),
            other => Err(HostError::InvalidCast {
                from: other
                    .runtime_type()
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
                to: "object".into(),
            }),
        }
    }

    fn with_object<R>(&self, value: &Value, f: impl FnOnce(&mut HostObject) -> HostResult<R>) -> HostResult<R> {
        let obj = Self::object_ref(value)?;
        let mut objects = self.objects.write();
        let object = objects.get_mut(&obj.id).ok_or(HostError::Destroyed)?;
        if !object.alive {
            return Err(HostError::Destroyed);
        }
        f(object)
    }

    /// Reads a named instance field straight from storage
    pub fn read_field(&self, instance: &Value, name: &str) -> HostResult<Value> {
        if let Value::Struct(s) = instance {
            let slot = self.struct_slot(&s.ty, name)?;
            return s
                .fields
                .get(slot)
                .cloned()
                .ok_or_else(|| HostError::missing_member(&s.ty, name));
        }
        self.with_object(instance, |object| {
            object
                .fields
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::missing_member(&object.ty, name))
        })
    }

    /// Writes a named instance field straight to storage, bypassing accessors
    pub fn write_field(&self, instance: &mut Value, name: &str, value: Value) -> HostResult<()> {
        if let Value::Struct(s) = instance {
            let slot = self.struct_slot(&s.ty, name)?;
            let ty = s.ty.clone();
            let field = s
                .fields
                .get_mut(slot)
                .ok_or_else(|| HostError::missing_member(&ty, name))?;
            *field = value;
            return Ok(());
        }
        self.with_object(instance, |object| {
            let ty = object.ty.clone();
            let slot = object
                .fields
                .get_mut(name)
                .ok_or_else(|| HostError::missing_member(&ty, name))?;
            *slot = value;
            Ok(())
        })
    }

    pub fn static_value(&self, ty: &TypeRef, name: &str) -> HostResult<Value> {
        self.statics
            .read()
            .get(&(ty.name.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| HostError::missing_member(ty, name))
    }

    pub fn set_static_value(&self, ty: &TypeRef, name: &str, value: Value) {
        self.statics
            .write()
            .insert((ty.name.clone(), name.to_string()), value);
    }

    /// Marks an object as destroyed; later access fails with [`HostError::Destroyed`]
    pub fn destroy(&self, value: &Value) {
        if let Value::Object(obj) = value {
            if let Some(object) = self.objects.write().get_mut(&obj.id) {
                object.alive = false;
            }
        }
    }

    pub fn list_push(&self, list: &Value, item: Value) -> HostResult<()> {
        self.with_object(list, |object| match &mut object.data {
            ObjectData::List { items, .. } => {
                items.push(item);
                Ok(())
            }
            _ => Err(HostError::Unsupported("Object is not a list.".into())),
        })
    }

    pub fn list_truncate(&self, list: &Value, len: usize) -> HostResult<()> {
        self.with_object(list, |object| match &mut object.data {
            ObjectData::List { items, .. } => {
                items.truncate(len);
                Ok(())
            }
            _ => Err(HostError::Unsupported("Object is not a list.".into())),
        })
    }

    pub fn map_remove(&self, map: &Value, key: &Value) -> HostResult<bool> {
        self.with_object(map, |object| match &mut object.data {
            ObjectData::Map { entries } => {
                let before = entries.len();
                entries.retain(|(k, _)| k != key);
                Ok(entries.len() != before)
            }
            _ => Err(HostError::Unsupported("Object is not a dictionary.".into())),
        })
    }

    fn element_type(ty: &TypeRef) -> TypeRef {
        ty.sequence_element().cloned().unwrap_or_else(TypeRef::object)
    }

    fn checked(value: Value, target: &TypeRef) -> HostResult<Value> {
        let from = value.runtime_type();
        value.coerce_to(target).ok_or_else(|| HostError::InvalidCast {
            from: from.map(|t| t.name.clone()).unwrap_or_else(|| "null".into()),
            to: target.name.clone(),
        })
    }
}

impl Reflection for MemoryHost {
    fn members(&self, ty: &TypeRef, scope: MemberScope) -> HostResult<Vec<HostResult<MemberInfo>>> {
        let host_type = self
            .host_type(ty)
            .ok_or_else(|| HostError::Custom(format!("Type '{}' is not loaded.", ty.name)))?;
        let wanted = |is_static: bool| {
            if is_static {
                scope.contains(MemberScope::STATIC)
            } else {
                scope.contains(MemberScope::INSTANCE)
            }
        };
        Ok(host_type
            .members
            .iter()
            .filter_map(|member| match member {
                HostMember::Resolved(MemberInfo::Constructor(c), _) => {
                    scope.contains(MemberScope::INSTANCE).then(|| Ok(MemberInfo::Constructor(c.clone())))
                }
                HostMember::Resolved(info, _) => wanted(info.is_static()).then(|| Ok(info.clone())),
                HostMember::Broken(reason) => Some(Err(HostError::Custom(reason.clone()))),
            })
            .collect())
    }

    fn get_field(&self, field: &FieldInfo, instance: Option<&Value>) -> HostResult<Value> {
        if field.is_static {
            return self.static_value(&field.declaring_type, &field.name);
        }
        let instance = instance.ok_or(HostError::NullReference)?;
        self.read_field(instance, &field.name)
    }

    fn set_field(&self, field: &FieldInfo, instance: Option<&mut Value>, value: Value) -> HostResult<()> {
        if field.is_literal {
            return Err(HostError::Unsupported(format!(
                "Cannot set a constant field '{}'.",
                field.name
            )));
        }
        let value = Self::checked(value, &field.field_type)?;
        if field.is_static {
            self.set_static_value(&field.declaring_type, &field.name, value);
            return Ok(());
        }
        let instance = instance.ok_or(HostError::NullReference)?;
        self.write_field(instance, &field.name, value)
    }

    fn get_property(&self, property: &PropertyInfo, instance: Option<&Value>, index: &[Value]) -> HostResult<Value> {
        if index.len() != property.index_params.len() {
            return Err(HostError::ArgumentCount {
                expected: property.index_params.len(),
                actual: index.len(),
            });
        }
        match self.behavior(&property.declaring_type, property.token)? {
            Behavior::Property {
                getter: Some(getter), ..
            } => {
                if !property.is_static && instance.is_none() {
                    return Err(HostError::NullReference);
                }
                getter(self, instance, index)
            }
            _ => Err(HostError::Unsupported(format!(
                "Property '{}' has no getter.",
                property.name
            ))),
        }
    }

    fn set_property(
        &self,
        property: &PropertyInfo,
        instance: Option<&mut Value>,
        value: Value,
        index: &[Value],
    ) -> HostResult<()> {
        let value = Self::checked(value, &property.property_type)?;
        match self.behavior(&property.declaring_type, property.token)? {
            Behavior::Property {
                setter: Some(setter), ..
            } => {
                if !property.is_static && instance.is_none() {
                    return Err(HostError::NullReference);
                }
                setter(self, instance, value, index)
            }
            _ => Err(HostError::Unsupported(format!(
                "Property '{}' has no setter.",
                property.name
            ))),
        }
    }

    fn invoke(
        &self,
        method: &MethodInfo,
        instance: Option<&mut Value>,
        args: &[Value],
        generic_args: &[TypeRef],
    ) -> HostResult<Value> {
        if args.len() != method.params.len() {
            return Err(HostError::ArgumentCount {
                expected: method.params.len(),
                actual: args.len(),
            });
        }
        if generic_args.len() != method.generic_params.len() {
            return Err(HostError::Custom(format!(
                "Method '{}' requires {} type argument(s).",
                method.name,
                method.generic_params.len()
            )));
        }
        if !method.is_static && instance.is_none() {
            return Err(HostError::NullReference);
        }
        match self.behavior(&method.declaring_type, method.token)? {
            Behavior::Method(body) => body(self, instance, args, generic_args),
            _ => Err(HostError::missing_member(&method.declaring_type, &method.name)),
        }
    }

    fn construct(&self, ty: &TypeRef, ctor: &ConstructorInfo, args: &[Value]) -> HostResult<Value> {
        if ctor.is_synthesized {
            return Ok(self.default_value(ty));
        }
        if args.len() != ctor.params.len() {
            return Err(HostError::ArgumentCount {
                expected: ctor.params.len(),
                actual: args.len(),
            });
        }
        match self.behavior(&ctor.declaring_type, ctor.token)? {
            Behavior::Constructor(body) => body(self, ty, args),
            _ => Err(HostError::missing_member(ty, ".ctor")),
        }
    }

    fn make_generic_type(&self, definition: &TypeRef, args: &[TypeRef]) -> HostResult<TypeRef> {
        if !definition.is_generic_definition() {
            return Err(HostError::Unsupported(format!(
                "'{}' is not a generic type definition.",
                definition.name
            )));
        }
        if args.len() != definition.generic_params.len() {
            return Err(HostError::ArgumentCount {
                expected: definition.generic_params.len(),
                actual: args.len(),
            });
        }
        let arg_names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
        let name = format!("{}[{}]", definition.name, arg_names.join(","));
        if let Some(existing) = self.types.read().get(&name) {
            return Ok(existing.ty.clone());
        }

        let substitute = |t: &TypeRef| -> TypeRef {
            definition
                .generic_params
                .iter()
                .position(|p| *p == t.name)
                .and_then(|i| args.get(i).cloned())
                .unwrap_or_else(|| t.clone())
        };
        let mut info = definition.info().clone();
        info.name = name;
        info.generic_args = args.to_vec();
        info.iteration = definition.iteration.as_ref().map(|it| match it {
            Iteration::Sequence { element } => Iteration::Sequence {
                element: substitute(element),
            },
            Iteration::Map { key, value } => Iteration::Map {
                key: substitute(key),
                value: substitute(value),
            },
        });
        let ty = TypeRef::new(info);
        let members = self
            .host_type(definition)
            .map(|t| t.members.clone())
            .unwrap_or_default();
        self.types.write().insert(
            ty.name.clone(),
            Arc::new(HostType {
                ty: ty.clone(),
                members,
            }),
        );
        Ok(ty)
    }

    fn is_alive(&self, value: &Value) -> bool {
        match value {
            Value::Object(obj) => self
                .objects
                .read()
                .get(&obj.id)
                .map(|o| o.alive)
                .unwrap_or(false),
            _ => true,
        }
    }

    fn iter_sequence<'a>(&'a self, sequence: &Value) -> HostResult<Box<dyn Iterator<Item = Value> + 'a>> {
        let items = self.with_object(sequence, |object| match &object.data {
            ObjectData::List { items, .. } => Ok(items.clone()),
            ObjectData::Map { entries } => Ok(entries.iter().map(|(_, v)| v.clone()).collect()),
            ObjectData::Plain => Err(HostError::Unsupported(format!(
                "'{}' is not enumerable.",
                object.ty.name
            ))),
        })?;
        Ok(Box::new(items.into_iter()))
    }

    fn iter_map<'a>(&'a self, map: &Value) -> HostResult<Box<dyn Iterator<Item = (Value, Value)> + 'a>> {
        let entries = self.with_object(map, |object| match &object.data {
            ObjectData::Map { entries } => Ok(entries.clone()),
            _ => Err(HostError::Unsupported(format!(
                "'{}' is not a dictionary.",
                object.ty.name
            ))),
        })?;
        Ok(Box::new(entries.into_iter()))
    }

    fn is_read_only(&self, container: &Value) -> bool {
        self.with_object(container, |object| {
            Ok(match &object.data {
                ObjectData::List { read_only, .. } => *read_only,
                ObjectData::Map { .. } => false,
                ObjectData::Plain => true,
            })
        })
        .unwrap_or(true)
    }

    fn set_index(&self, sequence: &Value, index: usize, item: Value) -> HostResult<()> {
        self.with_object(sequence, |object| {
            let element = Self::element_type(&object.ty);
            match &mut object.data {
                ObjectData::List { read_only: true, .. } => {
                    Err(HostError::Unsupported("Collection is read-only.".into()))
                }
                ObjectData::List { items, .. } => {
                    let count = items.len();
                    let slot = items
                        .get_mut(index)
                        .ok_or(HostError::IndexOutOfRange { index, count })?;
                    *slot = Self::checked(item, &element)?;
                    Ok(())
                }
                _ => Err(HostError::Unsupported("Object is not a list.".into())),
            }
        })
    }

    fn set_key(&self, map: &Value, key: &Value, item: Value) -> HostResult<()> {
        self.with_object(map, |object| {
            let value_type = object
                .ty
                .map_types()
                .map(|(_, v)| v.clone())
                .unwrap_or_else(TypeRef::object);
            match &mut object.data {
                ObjectData::Map { entries } => {
                    let item = Self::checked(item, &value_type)?;
                    match entries.iter_mut().find(|(k, _)| k == key) {
                        Some((_, slot)) => *slot = item,
                        None => entries.push((key.clone(), item)),
                    }
                    Ok(())
                }
                _ => Err(HostError::Unsupported("Object is not a dictionary.".into())),
            }
        })
    }

    fn contains_key(&self, map: &Value, key: &Value) -> HostResult<bool> {
        self.with_object(map, |object| match &object.data {
            ObjectData::Map { entries } => Ok(entries.iter().any(|(k, _)| k == key)),
            _ => Err(HostError::Unsupported("Object is not a dictionary.".into())),
        })
    }

    fn all_types(&self) -> Vec<TypeRef> {
        self.types.read().values().map(|t| t.ty.clone()).collect()
    }

    fn type_by_name(&self, name: &str) -> Option<TypeRef> {
        let types = self.types.read();
        if let Some(t) = types.get(name) {
            return Some(t.ty.clone());
        }
        let mut matches = types.values().filter(|t| t.ty.short_name() == name);
        match (matches.next(), matches.next()) {
            (Some(t), None) => Some(t.ty.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_ty() -> TypeRef {
        TypeRef::number(NumberKind::F32)
    }

    fn vector(host: &MemoryHost) -> TypeRef {
        host.register(
            TypeBuilder::structure("Math.Vector3")
                .field("x", &f32_ty())
                .field("y", &f32_ty())
                .field("z", &f32_ty()),
        )
    }

    #[test]
    fn test_alloc_initialises_fields_with_defaults() {
        let host = MemoryHost::new();
        let vec3 = vector(&host);
        let player = host.register(
            TypeBuilder::class("Game.Player")
                .field("count", &TypeRef::number(NumberKind::I32))
                .field("position", &vec3)
                .field("name", &TypeRef::string()),
        );
        let p = host.alloc(&player);

        assert_eq!(host.read_field(&p, "count").unwrap(), Value::i32(0));
        assert_eq!(host.read_field(&p, "name").unwrap(), Value::Null);
        match host.read_field(&p, "position").unwrap() {
            Value::Struct(s) => assert_eq!(s.fields, vec![Value::f32(0.0); 3]),
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn test_struct_field_write_mutates_copy_only() {
        let host = MemoryHost::new();
        let vec3 = vector(&host);
        let members = host.members(&vec3, MemberScope::INSTANCE).unwrap();
        let x = match &members[0] {
            Ok(MemberInfo::Field(f)) => f.clone(),
            other => panic!("unexpected {other:?}"),
        };

        let mut copy = host.default_value(&vec3);
        host.set_field(&x, Some(&mut copy), Value::f32(2.5)).unwrap();
        assert_eq!(host.get_field(&x, Some(&copy)).unwrap(), Value::f32(2.5));
        assert_eq!(host.get_field(&x, Some(&host.default_value(&vec3))).unwrap(), Value::f32(0.0));
    }

    #[test]
    fn test_destroyed_objects_fail() {
        let host = MemoryHost::new();
        let ty = host.register(TypeBuilder::class("Game.Crate").field("hp", &f32_ty()));
        let obj = host.alloc(&ty);
        assert!(host.is_alive(&obj));
        host.destroy(&obj);
        assert!(!host.is_alive(&obj));
        assert_eq!(host.read_field(&obj, "hp"), Err(HostError::Destroyed));
    }

    #[test]
    fn test_broken_members_are_reported_individually() {
        let host = MemoryHost::new();
        let ty = host.register(
            TypeBuilder::class("Game.Odd")
                .field("ok", &f32_ty())
                .broken_member("Could not load file or assembly"),
        );
        let members = host.members(&ty, MemberScope::INSTANCE).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members[0].is_ok());
        assert!(members[1].is_err());
    }

    #[test]
    fn test_read_only_list_rejects_writes() {
        let host = MemoryHost::new();
        let list_ty = host.list_type(&TypeRef::number(NumberKind::I32));
        let list = host.alloc_list(&list_ty, vec![Value::i32(1)], true);
        assert!(host.is_read_only(&list));
        assert!(host.set_index(&list, 0, Value::i32(2)).is_err());
    }

    #[test]
    fn test_map_set_key_checks_value_type() {
        let host = MemoryHost::new();
        let map_ty = host.map_type(&TypeRef::string(), &TypeRef::number(NumberKind::I32));
        let map = host.alloc_map(&map_ty, vec![(Value::str("a"), Value::i32(1))]);
        host.set_key(&map, &Value::str("a"), Value::i32(5)).unwrap();
        assert!(host.set_key(&map, &Value::str("a"), Value::str("no")).is_err());
        let entries: Vec<(Value, Value)> = host.iter_map(&map).unwrap().collect();
        assert_eq!(entries, vec![(Value::str("a"), Value::i32(5))]);
    }

    #[test]
    fn test_make_generic_type_substitutes_iteration() {
        let host = MemoryHost::new();
        let def = host.register(
            TypeBuilder::class("Collections.Bag`1")
                .generic(&["T"])
                .sequence_of(&TypeRef::generic_param("T"))
                .default_constructor(),
        );
        let closed = host
            .make_generic_type(&def, &[TypeRef::string()])
            .unwrap();
        assert_eq!(closed.sequence_element(), Some(&TypeRef::string()));
        assert!(!closed.is_generic_definition());
        assert_eq!(closed.display_name(), "Bag<string>");
    }
}
