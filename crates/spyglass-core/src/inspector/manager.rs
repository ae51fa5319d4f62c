use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::EntryAction;
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{TypeRef, Value};
use crate::ivalue::EditorPool;

use super::{InspectTarget, ReflectionInspector};

/// Entry a value-type inspector was opened from. Writes to the copy are
/// handed back to that entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub inspector: usize,
    pub path: Vec<usize>,
}

#[derive(Debug)]
struct OpenInspector {
    inspector: ReflectionInspector,
    parent: Option<ParentLink>,
}

/// Open inspector tabs in creation order, one of them active
#[derive(Debug, Default)]
pub struct InspectorManager {
    open: IndexMap<usize, OpenInspector>,
    active: Option<usize>,
    next_id: usize,
}

impl InspectorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// `(id, tab label)` per open inspector
    pub fn tabs(&self) -> Vec<(usize, &str)> {
        self.open
            .iter()
            .map(|(id, open)| (*id, open.inspector.tab_label()))
            .collect()
    }

    pub fn get(&self, id: usize) -> Option<&ReflectionInspector> {
        self.open.get(&id).map(|o| &o.inspector)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut ReflectionInspector> {
        self.open.get_mut(&id).map(|o| &mut o.inspector)
    }

    pub fn parent_of(&self, id: usize) -> Option<&ParentLink> {
        self.open.get(&id).and_then(|o| o.parent.as_ref())
    }

    fn inspector_mut(&mut self, id: usize) -> Result<&mut ReflectionInspector, InspectError> {
        self.get_mut(id).ok_or(InspectError::NoSuchInspector(id))
    }

    pub fn set_active(&mut self, id: usize) -> Result<(), InspectError> {
        if !self.open.contains_key(&id) {
            return Err(InspectError::NoSuchInspector(id));
        }
        if let Some(open) = self.open.get_mut(&id) {
            open.inspector.force_refresh();
        }
        self.active = Some(id);
        Ok(())
    }

    /// Opens an instance inspector, or focuses the one already showing this object
    pub fn inspect(&mut self, ctx: &mut InspectContext<'_>, value: Value) -> Result<usize, InspectError> {
        self.open_target(ctx, InspectTarget::Instance(value), None)
    }

    pub fn inspect_static(&mut self, ctx: &mut InspectContext<'_>, ty: TypeRef) -> Result<usize, InspectError> {
        self.open_target(ctx, InspectTarget::Static(ty), None)
    }

    /// Inspects the current value of the entry at `path`. Value-type values
    /// keep a link to the entry so their edits are written back.
    pub fn inspect_entry(
        &mut self,
        ctx: &mut InspectContext<'_>,
        id: usize,
        path: &[usize],
    ) -> Result<usize, InspectError> {
        let inspector = self.get(id).ok_or(InspectError::NoSuchInspector(id))?;
        let entry = inspector
            .entry_at(path)
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let value = entry.value.clone();
        let writable = entry.can_write;
        if value.is_null() {
            return Err(InspectError::unsupported(format!("{} is null", entry.name_label)));
        }
        let target = match value {
            Value::Type(ty) => InspectTarget::Static(ty),
            other => InspectTarget::Instance(other),
        };
        let is_value_type = match &target {
            InspectTarget::Instance(v) => ctx.host.runtime_type(v).map(|t| t.is_value_type()).unwrap_or(false),
            InspectTarget::Static(_) => false,
        };
        let parent = (is_value_type && writable).then(|| ParentLink {
            inspector: id,
            path: path.to_vec(),
        });
        self.open_target(ctx, target, parent)
    }

    fn find_existing(&self, target: &InspectTarget) -> Option<usize> {
        self.open.iter().find_map(|(id, open)| {
            let inspector = &open.inspector;
            let same = match target {
                InspectTarget::Instance(value @ Value::Object(_)) => inspector.target() == Some(value),
                InspectTarget::Instance(_) => false,
                InspectTarget::Static(ty) => inspector.is_static() && inspector.target_type() == ty,
            };
            same.then_some(*id)
        })
    }

    fn open_target(
        &mut self,
        ctx: &mut InspectContext<'_>,
        target: InspectTarget,
        parent: Option<ParentLink>,
    ) -> Result<usize, InspectError> {
        if let InspectTarget::Instance(value) = &target {
            if value.is_null() {
                return Err(InspectError::unsupported("Cannot inspect null"));
            }
        }
        if let Some(id) = self.find_existing(&target) {
            debug!("Focusing existing inspector {id}");
            self.set_active(id)?;
            return Ok(id);
        }

        let id = self.next_id;
        let mut inspector = ReflectionInspector::new(id, ctx.config.viewport_rows);
        inspector.set_target(ctx, target)?;
        self.next_id += 1;
        info!("Opened {}", inspector.tab_label());
        self.open.insert(id, OpenInspector { inspector, parent });
        self.active = Some(id);
        Ok(id)
    }

    /// Runs an action in an inspector. When a value-type inspector's copy
    /// was written, the copy is handed back up its chain of parents.
    pub fn act(
        &mut self,
        ctx: &mut InspectContext<'_>,
        id: usize,
        path: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        let wrote = self.inspector_mut(id)?.act(ctx, path, action)?;
        if wrote {
            self.write_back(ctx, id)?;
        }
        Ok(wrote)
    }

    fn write_back(&mut self, ctx: &mut InspectContext<'_>, mut child: usize) -> Result<(), InspectError> {
        loop {
            let Some(open) = self.open.get(&child) else {
                return Ok(());
            };
            let (Some(link), Some(copy)) = (open.parent.clone(), open.inspector.target().cloned()) else {
                return Ok(());
            };
            let Some(parent) = self.get_mut(link.inspector) else {
                debug!("Parent of inspector {child} is gone");
                return Ok(());
            };
            if !parent.act(ctx, &link.path, EntryAction::SetValue(copy))? {
                return Ok(());
            }
            child = link.inspector;
        }
    }

    /// Closes inspectors whose target was destroyed, then updates the active one
    pub fn tick(&mut self, ctx: &mut InspectContext<'_>, now: Instant) {
        let stale: Vec<usize> = self
            .open
            .iter()
            .filter(|(_, open)| open.inspector.is_stale(ctx))
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(open) = self.open.get(&id) {
                warn!("{} was destroyed, closing", open.inspector.tab_label());
            }
            self.close(ctx.editors, id);
        }

        let Some(active) = self.active else {
            return;
        };
        let Some(open) = self.open.get_mut(&active) else {
            return;
        };
        if let Err(e) = open.inspector.update(ctx, now) {
            warn!("{e}");
            self.close(ctx.editors, active);
        }
    }

    pub fn close(&mut self, editors: &mut EditorPool, id: usize) -> bool {
        let Some(mut open) = self.open.shift_remove(&id) else {
            return false;
        };
        open.inspector.close(editors);
        for other in self.open.values_mut() {
            if other.parent.as_ref().map(|p| p.inspector) == Some(id) {
                other.parent = None;
            }
        }
        if self.active == Some(id) {
            self.active = self.open.keys().last().copied();
            if let Some(next) = self.active.and_then(|a| self.open.get_mut(&a)) {
                next.inspector.force_refresh();
            }
        }
        true
    }

    pub fn close_all(&mut self, editors: &mut EditorPool) {
        for (_, mut open) in self.open.drain(..) {
            open.inspector.close(editors);
        }
        self.active = None;
    }
}
