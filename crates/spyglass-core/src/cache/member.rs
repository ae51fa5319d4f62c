//! Reads and writes of member entries against an inspected target.

use crate::context::InspectContext;
use crate::enumerate::MemberDescriptor;
use crate::errors::InspectError;
use crate::host::{HostError, MemberInfo, TypeRef, Value};

use super::args::ArgumentInputs;
use super::{EntryKind, EntryOwner};

/// A member entry: the descriptor plus the argument inputs it needs, if any
#[derive(Debug, Clone)]
pub struct MemberSlot {
    pub descriptor: std::sync::Arc<MemberDescriptor>,
    pub arguments: Option<ArgumentInputs>,
}

impl MemberSlot {
    pub fn new(descriptor: std::sync::Arc<MemberDescriptor>) -> Self {
        let arguments = descriptor
            .has_arguments()
            .then(|| ArgumentInputs::new(descriptor.params(), descriptor.generic_params()));
        Self { descriptor, arguments }
    }
}

/// Owner of the member entries of one inspector.
///
/// `target` is `None` for static inspectors. Value-type targets are a private
/// copy; writes mutate it in place and the inspector hands it back to the
/// entry it was opened from.
#[derive(Debug, Clone)]
pub struct MemberOwner {
    pub target: Option<Value>,
    pub target_type: TypeRef,
}

impl MemberOwner {
    pub fn new(target: Option<Value>, target_type: TypeRef) -> Self {
        Self { target, target_type }
    }

    fn instance(&self, descriptor: &MemberDescriptor) -> Option<&Value> {
        if descriptor.is_static() {
            None
        } else {
            self.target.as_ref()
        }
    }

    fn instance_mut(&mut self, descriptor: &MemberDescriptor) -> Option<&mut Value> {
        if descriptor.is_static() {
            None
        } else {
            self.target.as_mut()
        }
    }

    fn read_member(&mut self, ctx: &InspectContext<'_>, slot: &MemberSlot) -> Result<Value, InspectError> {
        let descriptor = &slot.descriptor;
        let label = descriptor.name_label.as_str();
        let empty = ArgumentInputs::default();
        let arguments = slot.arguments.as_ref().unwrap_or(&empty);

        let result = match &descriptor.info {
            MemberInfo::Field(field) => ctx.host.get_field(field, self.instance(descriptor)),
            MemberInfo::Property(property) => {
                let index = arguments.resolve_arguments(ctx.host, &[])?;
                ctx.host.get_property(property, self.instance(descriptor), &index)
            }
            MemberInfo::Method(method) => {
                let generics = arguments.resolve_generic_arguments(ctx.host, ctx.evaluator)?;
                let args = arguments.resolve_arguments(ctx.host, &generics)?;
                ctx.host
                    .invoke(method, self.instance_mut(descriptor), &args, &generics)
            }
            MemberInfo::Constructor(ctor) => {
                let generics = arguments.resolve_generic_arguments(ctx.host, ctx.evaluator)?;
                let args = arguments.resolve_arguments(ctx.host, &generics)?;
                let ty = if ctor.declaring_type.is_generic_definition() {
                    ctx.host
                        .make_generic_type(&ctor.declaring_type, &generics)
                        .map_err(|e| InspectError::evaluation(label, e))?
                } else {
                    ctor.declaring_type.clone()
                };
                ctx.host.construct(&ty, ctor, &args)
            }
        };
        result.map_err(|e| InspectError::evaluation(label, e))
    }

    fn write_member(&mut self, ctx: &InspectContext<'_>, slot: &MemberSlot, value: Value) -> Result<(), InspectError> {
        let descriptor = &slot.descriptor;
        let label = descriptor.name_label.as_str();
        let result = match &descriptor.info {
            MemberInfo::Field(field) => ctx.host.set_field(field, self.instance_mut(descriptor), value),
            MemberInfo::Property(property) => {
                let index = match &slot.arguments {
                    Some(arguments) => arguments.resolve_arguments(ctx.host, &[])?,
                    None => Vec::new(),
                };
                ctx.host
                    .set_property(property, self.instance_mut(descriptor), value, &index)
            }
            MemberInfo::Method(_) => Err(HostError::Unsupported("You can't set a method".into())),
            MemberInfo::Constructor(_) => Err(HostError::Unsupported("You can't set a constructor".into())),
        };
        result.map_err(|e| InspectError::write(label, e))
    }
}

impl EntryOwner for MemberOwner {
    fn read(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind) -> Result<Value, InspectError> {
        match kind {
            EntryKind::Member(slot) => self.read_member(ctx, slot),
            _ => Err(InspectError::unsupported("Only member entries belong to an inspector")),
        }
    }

    fn write(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind, value: Value) -> Result<(), InspectError> {
        match kind {
            EntryKind::Member(slot) => self.write_member(ctx, slot, value),
            _ => Err(InspectError::unsupported("Only member entries belong to an inspector")),
        }
    }
}
