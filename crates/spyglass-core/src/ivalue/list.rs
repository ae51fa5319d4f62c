use tracing::{debug, warn};

use crate::cache::{CacheCell, CacheEntry, ContainerOwner, EntryAction, EntryBinder};
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{TypeRef, Value};
use crate::labels;
use crate::pool::{CellPool, RefreshMode};

use super::{EditorPool, OwnerView, Unbound};

/// Index-backed entries of a sequence, bound to their own cell pool
#[derive(Debug)]
pub struct ListEditor {
    pool: CellPool<CacheCell>,
    entries: Vec<CacheEntry>,
    owner: ContainerOwner,
    element_type: TypeRef,
    holder_can_write: bool,
    top_label: String,
    not_supported: bool,
}

impl ListEditor {
    pub fn new(rows: usize) -> Self {
        Self {
            pool: CellPool::new(rows),
            entries: Vec::new(),
            owner: ContainerOwner::default(),
            element_type: TypeRef::object(),
            holder_can_write: false,
            top_label: String::new(),
            not_supported: false,
        }
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn pool(&self) -> &CellPool<CacheCell> {
        &self.pool
    }

    /// `[count] Type`
    pub fn top_label(&self) -> &str {
        &self.top_label
    }

    pub fn element_type(&self) -> &TypeRef {
        &self.element_type
    }

    /// Slots can be written back through the indexer
    pub fn can_write(&self) -> bool {
        self.owner.can_write
    }

    /// The value could not be enumerated
    pub fn is_not_supported(&self) -> bool {
        self.not_supported
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        self.holder_can_write = owner.can_write;
    }

    pub fn set_value(&mut self, ctx: &mut InspectContext<'_>, value: &Value, _owner: &OwnerView) {
        if value.is_null() {
            self.clear_and_release(ctx.editors);
        } else {
            let ty = ctx.host.runtime_type(value).unwrap_or_else(TypeRef::object);
            self.element_type = ty.sequence_element().cloned().unwrap_or_else(TypeRef::object);
            self.owner = ContainerOwner {
                container: value.clone(),
                can_write: self.holder_can_write && !ctx.host.is_read_only(value),
            };
            self.cache_entries(ctx);
            self.top_label = format!("[{}] {}", self.entries.len(), labels::type_label(&ty));
        }
        self.refresh(ctx, RefreshMode::Hard { jump_to_top: false });
    }

    /// Reuses entries by index, appends new ones and releases the trailing ones
    fn cache_entries(&mut self, ctx: &mut InspectContext<'_>) {
        let items: Vec<Value> = match ctx.host.iter_sequence(&self.owner.container) {
            Ok(items) => items.collect(),
            Err(e) => {
                warn!("Could not enumerate {}: {e}", self.owner.container);
                self.release_entries(ctx.editors);
                self.not_supported = true;
                return;
            }
        };
        self.not_supported = false;

        let count = items.len();
        let can_write = self.owner.can_write;
        for (index, item) in items.into_iter().enumerate() {
            if index >= self.entries.len() {
                self.entries
                    .push(CacheEntry::list_slot(index, self.element_type.clone(), can_write));
            }
            let entry = &mut self.entries[index];
            entry.can_write = can_write;
            entry.set_fallback_type(self.element_type.clone());
            entry.last_error = None;
            entry.set_value_from_source(ctx, item);
        }

        if self.entries.len() > count {
            debug!("List shrank from {} to {count} items", self.entries.len());
            for mut entry in self.entries.drain(count..) {
                entry.release(ctx.editors);
            }
        }
    }

    fn release_entries(&mut self, pool: &mut EditorPool) {
        for mut entry in self.entries.drain(..) {
            entry.release(pool);
        }
    }

    fn clear_and_release(&mut self, pool: &mut EditorPool) {
        self.release_entries(pool);
        self.owner = ContainerOwner::default();
        self.top_label.clear();
        self.not_supported = false;
    }

    pub fn release_from_owner(&mut self, pool: &mut EditorPool) {
        self.clear_and_release(pool);
        self.pool.clear(&mut Unbound);
        self.holder_can_write = false;
    }

    fn refresh(&mut self, ctx: &mut InspectContext<'_>, mode: RefreshMode) {
        if matches!(mode, RefreshMode::Hard { .. }) {
            for entry in &mut self.entries {
                entry.cell = None;
            }
        }
        let mut binder = EntryBinder {
            ctx,
            entries: &mut self.entries,
            owner: &mut self.owner,
            order: None,
        };
        self.pool.refresh(&mut binder, mode);
    }

    pub fn scroll_to(&mut self, ctx: &mut InspectContext<'_>, top: usize) {
        let mut binder = EntryBinder {
            ctx,
            entries: &mut self.entries,
            owner: &mut self.owner,
            order: None,
        };
        self.pool.scroll_to(&mut binder, top);
    }

    pub fn dispatch(
        &mut self,
        ctx: &mut InspectContext<'_>,
        index: usize,
        rest: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| InspectError::NoSuchEntry(vec![index]))?;
        let wrote = entry.dispatch(ctx, &mut self.owner, rest, action)?;
        self.refresh(ctx, RefreshMode::Soft);
        Ok(wrote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::ReflectionCaches;
    use crate::classify::ValueState;
    use crate::config::SpyglassConfig;
    use crate::host::{MemoryHost, TypeBuilder};
    use pretty_assertions::assert_eq;

    fn owner(state: ValueState, value_type: TypeRef) -> OwnerView {
        OwnerView {
            name: "Bag.contents".into(),
            state,
            can_write: true,
            error: None,
            value_type,
        }
    }

    #[test]
    fn test_failed_enumeration_releases_previous_entries() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let config = SpyglassConfig::default();
        let mut editors = EditorPool::new();
        let list_type = host.list_type(&TypeRef::string());
        let list = host.alloc_list(&list_type, vec![Value::str("x"), Value::str("y")], false);
        let plain_type = host.register(TypeBuilder::class("Game.Crate"));
        let plain = host.alloc(&plain_type);

        let mut ctx = InspectContext {
            host: &host,
            caches: &caches,
            config: &config,
            editors: &mut editors,
            evaluator: None,
        };
        let view = owner(ValueState::Collection, list_type);
        let mut editor = ListEditor::new(8);
        editor.on_borrowed(&view);
        editor.set_value(&mut ctx, &list, &view);
        assert_eq!(editor.entries().len(), 2);

        editor.set_value(&mut ctx, &plain, &view);
        assert!(editor.is_not_supported());
        assert!(editor.entries().is_empty());
        assert!(editor.top_label().starts_with("[0]"));
    }
}
