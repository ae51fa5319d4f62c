//! Member discovery for a type, in a stable order, cached per (type, scope).

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::caches::ReflectionCaches;
use crate::errors::InspectError;
use crate::host::{
    ConstructorInfo, MemberInfo, MemberScope, MemberToken, ParamInfo, Reflection, TypeKind,
    TypeRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
}

/// A member plus the labels computed once when it is discovered
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub info: MemberInfo,
    pub name_label: String,
    pub filter_name: String,
}

fn format_params(params: &[ParamInfo]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.ty.display_name(), p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

impl MemberDescriptor {
    pub fn new(info: MemberInfo) -> Self {
        let owner = info.declaring_type().display_name();
        let owner_short = info.declaring_type().short_name().split('`').next().unwrap_or_default().to_string();
        let (name_label, filter_name) = match &info {
            MemberInfo::Field(f) => (format!("{owner}.{}", f.name), format!("{owner_short}.{}", f.name)),
            MemberInfo::Property(p) if !p.index_params.is_empty() => (
                format!("{owner}.{}[{}]", p.name, format_params(&p.index_params)),
                format!("{owner_short}.{}", p.name),
            ),
            MemberInfo::Property(p) => (format!("{owner}.{}", p.name), format!("{owner_short}.{}", p.name)),
            MemberInfo::Method(m) => {
                let generics = if m.generic_params.is_empty() {
                    String::new()
                } else {
                    format!("<{}>", m.generic_params.join(", "))
                };
                (
                    format!("{owner}.{}{generics}({})", m.name, format_params(&m.params)),
                    format!("{owner_short}.{}", m.name),
                )
            }
            MemberInfo::Constructor(c) => (
                format!("{owner}.{owner_short}({})", format_params(&c.params)),
                format!("{owner_short}.{owner_short}"),
            ),
        };
        Self {
            info,
            name_label,
            filter_name,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self.info {
            MemberInfo::Field(_) => MemberKind::Field,
            MemberInfo::Property(_) => MemberKind::Property,
            MemberInfo::Method(_) => MemberKind::Method,
            MemberInfo::Constructor(_) => MemberKind::Constructor,
        }
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn declaring_type(&self) -> &TypeRef {
        self.info.declaring_type()
    }

    /// Constructors count as static: they never need a target
    pub fn is_static(&self) -> bool {
        self.info.is_static()
    }

    /// Declared type of the value this member produces
    pub fn value_type(&self) -> TypeRef {
        match &self.info {
            MemberInfo::Field(f) => f.field_type.clone(),
            MemberInfo::Property(p) => p.property_type.clone(),
            MemberInfo::Method(m) => m.return_type.clone(),
            MemberInfo::Constructor(c) => c.declaring_type.clone(),
        }
    }

    pub fn params(&self) -> &[ParamInfo] {
        self.info.params()
    }

    /// Type parameters that must be bound before evaluation
    pub fn generic_params(&self) -> &[String] {
        match &self.info {
            MemberInfo::Method(m) => &m.generic_params,
            MemberInfo::Constructor(c) if c.declaring_type.is_generic_definition() => {
                &c.declaring_type.info().generic_params
            }
            _ => &[],
        }
    }

    pub fn has_arguments(&self) -> bool {
        !self.params().is_empty() || !self.generic_params().is_empty()
    }

    pub fn should_auto_evaluate(&self) -> bool {
        match &self.info {
            MemberInfo::Field(_) => true,
            MemberInfo::Property(_) => !self.has_arguments(),
            MemberInfo::Method(_) | MemberInfo::Constructor(_) => false,
        }
    }

    pub fn can_write(&self) -> bool {
        match &self.info {
            MemberInfo::Field(f) => f.can_write(),
            MemberInfo::Property(p) => p.can_write,
            MemberInfo::Method(_) | MemberInfo::Constructor(_) => false,
        }
    }

    fn signature_key(&self) -> String {
        let params: Vec<&str> = self.params().iter().map(|p| p.ty.name.as_str()).collect();
        format!("{:?}:{}({})", self.kind(), self.name(), params.join(","))
    }
}

/// Decides whether a discovered member is shown at all
pub trait MemberPolicy {
    fn allows(&self, member: &MemberInfo) -> bool;
}

/// Hides members listed as `Type.member`, by full or short type name
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl MemberPolicy for Blacklist {
    fn allows(&self, member: &MemberInfo) -> bool {
        let ty = member.declaring_type();
        let full = format!("{}.{}", ty.name, member.name());
        let short = format!("{}.{}", ty.short_name(), member.name());
        !(self.entries.contains(&full) || self.entries.contains(&short))
    }
}

pub struct MemberEnumerator<'a> {
    host: &'a dyn Reflection,
    caches: &'a ReflectionCaches,
    policy: &'a dyn MemberPolicy,
}

impl<'a> MemberEnumerator<'a> {
    pub fn new(host: &'a dyn Reflection, caches: &'a ReflectionCaches, policy: &'a dyn MemberPolicy) -> Self {
        Self {
            host,
            caches,
            policy,
        }
    }

    /// Constructors, then properties, fields and methods. Within a kind,
    /// most derived declaring type first, then declaration order.
    pub fn enumerate(&self, ty: &TypeRef, scope: MemberScope) -> Arc<[Arc<MemberDescriptor>]> {
        if let Some(cached) = self.caches.cached_members(ty, scope) {
            return cached;
        }

        let wants_ctors = scope.contains(MemberScope::INSTANCE) && ty.is_constructible();
        let mut ctors = Vec::new();
        let mut props = Vec::new();
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut seen = HashSet::new();

        if wants_ctors && matches!(ty.kind, TypeKind::Struct) {
            ctors.push(Arc::new(MemberDescriptor::new(MemberInfo::Constructor(
                ConstructorInfo {
                    token: MemberToken(0),
                    declaring_type: ty.clone(),
                    params: Vec::new(),
                    is_synthesized: true,
                },
            ))));
        }

        for (depth, declaring) in ty.ancestry().iter().enumerate() {
            let members = match self.host.members(declaring, scope) {
                Ok(members) => members,
                Err(source) => {
                    warn!(
                        "{}",
                        InspectError::Enumeration {
                            type_name: declaring.name.clone(),
                            source
                        }
                    );
                    continue;
                }
            };
            for member in members {
                let info = match member {
                    Ok(info) => info,
                    Err(source) => {
                        warn!(
                            "{}",
                            InspectError::Enumeration {
                                type_name: declaring.name.clone(),
                                source
                            }
                        );
                        continue;
                    }
                };
                let in_scope = match &info {
                    MemberInfo::Constructor(_) => wants_ctors && depth == 0,
                    MemberInfo::Method(m) if m.is_special_name => false,
                    MemberInfo::Field(f) if f.is_compiler_generated => false,
                    MemberInfo::Property(p) if !p.can_read => false,
                    other if other.is_static() => scope.contains(MemberScope::STATIC),
                    _ => scope.contains(MemberScope::INSTANCE),
                };
                if !in_scope {
                    continue;
                }
                if !self.policy.allows(&info) {
                    debug!("Member {}.{} is blacklisted", declaring.name, info.name());
                    continue;
                }
                let descriptor = MemberDescriptor::new(info);
                if !seen.insert(descriptor.signature_key()) {
                    continue;
                }
                let bucket = match descriptor.kind() {
                    MemberKind::Constructor => &mut ctors,
                    MemberKind::Property => &mut props,
                    MemberKind::Field => &mut fields,
                    MemberKind::Method => &mut methods,
                };
                bucket.push(Arc::new(descriptor));
            }
        }

        let list: Arc<[Arc<MemberDescriptor>]> = ctors
            .into_iter()
            .chain(props)
            .chain(fields)
            .chain(methods)
            .collect();
        debug!("Enumerated {} members of {}", list.len(), ty.name);
        self.caches.store_members(ty, scope, list.clone());
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostResult, MemoryHost, NumberKind, TypeBuilder, Value};
    use pretty_assertions::assert_eq;

    fn noop(_: &MemoryHost, _: Option<&mut Value>, _: &[Value], _: &[TypeRef]) -> HostResult<Value> {
        Ok(Value::Null)
    }

    fn fixture() -> (MemoryHost, TypeRef) {
        let host = MemoryHost::new();
        let int = TypeRef::number(NumberKind::I32);
        let entity = host.register(
            TypeBuilder::class("Game.Entity")
                .field("id", &int)
                .property("Name", &TypeRef::string(), |_, _, _| Ok(Value::str("entity")))
                .method("Tick", &TypeRef::void(), vec![], noop),
        );
        let player = host.register(
            TypeBuilder::class("Game.Player")
                .base(&entity)
                .default_constructor()
                .field("count", &int)
                .hidden_field("<Name>k__BackingField", &TypeRef::string())
                .property("Name", &TypeRef::string(), |_, _, _| Ok(Value::str("player")))
                .static_field("Instances", &int, Value::i32(0))
                .method("Jump", &TypeRef::void(), vec![], noop)
                .broken_member("missing dependency"),
        );
        (host, player)
    }

    fn labels(list: &[Arc<MemberDescriptor>]) -> Vec<String> {
        list.iter().map(|m| m.name_label.clone()).collect()
    }

    #[test]
    fn test_order_and_override_dedup() {
        let (host, player) = fixture();
        let caches = ReflectionCaches::new();
        let blacklist = Blacklist::default();
        let enumerator = MemberEnumerator::new(&host, &caches, &blacklist);

        let list = enumerator.enumerate(&player, MemberScope::INSTANCE | MemberScope::STATIC);
        assert_eq!(
            labels(&list),
            vec![
                "Player.Player()",
                "Player.Name",
                "Player.count",
                "Player.Instances",
                "Entity.id",
                "Player.Jump()",
                "Entity.Tick()",
            ]
        );
    }

    #[test]
    fn test_static_scope_has_no_constructors() {
        let (host, player) = fixture();
        let caches = ReflectionCaches::new();
        let blacklist = Blacklist::default();
        let enumerator = MemberEnumerator::new(&host, &caches, &blacklist);

        let list = enumerator.enumerate(&player, MemberScope::STATIC);
        assert_eq!(labels(&list), vec!["Player.Instances"]);
    }

    #[test]
    fn test_blacklist_and_cache() {
        let (host, player) = fixture();
        let caches = ReflectionCaches::new();
        let blacklist = Blacklist::new(["Player.count", "Game.Entity.Tick"]);
        let enumerator = MemberEnumerator::new(&host, &caches, &blacklist);

        let first = enumerator.enumerate(&player, MemberScope::INSTANCE);
        assert!(!labels(&first).iter().any(|l| l == "Player.count" || l == "Entity.Tick()"));
        let second = enumerator.enumerate(&player, MemberScope::INSTANCE);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_struct_gets_synthesized_constructor() {
        let host = MemoryHost::new();
        let vec3 = host.register(
            TypeBuilder::structure("Math.Vector3").field("x", &TypeRef::number(NumberKind::F32)),
        );
        let caches = ReflectionCaches::new();
        let blacklist = Blacklist::default();
        let list = MemberEnumerator::new(&host, &caches, &blacklist).enumerate(&vec3, MemberScope::INSTANCE);
        assert_eq!(list[0].name_label, "Vector3.Vector3()");
        assert_eq!(list[0].kind(), MemberKind::Constructor);
        assert!(!list[0].should_auto_evaluate());
    }

    #[test]
    fn test_descriptor_capabilities() {
        let host = MemoryHost::new();
        let int = TypeRef::number(NumberKind::I32);
        let ty = host.register(
            TypeBuilder::class("Game.Bag")
                .const_field("Max", &int, Value::i32(4))
                .readonly_field("owner", &TypeRef::string())
                .indexer("Item", &int, vec![ParamInfo::new("index", int.clone())], |_, _, _| {
                    Ok(Value::i32(0))
                })
                .generic_method("Find", &TypeRef::object(), &["T"], vec![], noop),
        );
        let caches = ReflectionCaches::new();
        let blacklist = Blacklist::default();
        let list = MemberEnumerator::new(&host, &caches, &blacklist)
            .enumerate(&ty, MemberScope::INSTANCE | MemberScope::STATIC);
        let find = |label: &str| list.iter().find(|m| m.name_label == label).unwrap().clone();

        let item = find("Bag.Item[i32 index]");
        assert!(item.has_arguments());
        assert!(!item.should_auto_evaluate());
        assert!(!find("Bag.Max").can_write());
        assert!(!find("Bag.owner").can_write());
        let generic = find("Bag.Find<T>()");
        assert!(generic.has_arguments());
        assert_eq!(generic.filter_name, "Bag.Find");
    }
}
