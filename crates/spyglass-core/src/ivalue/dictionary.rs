use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::cache::{CacheCell, CacheEntry, ContainerOwner, DictSlot, EntryAction, EntryBinder};
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{TypeRef, Value};
use crate::labels;
use crate::pool::{CellPool, RefreshMode};

use super::{EditorPool, OwnerView, Unbound};

/// Key-backed entries of a map, bound to their own cell pool.
///
/// Entries are matched to the new contents by key, so a surviving key keeps
/// its entry (and any open editor) when other keys come and go.
#[derive(Debug)]
pub struct DictionaryEditor {
    pool: CellPool<CacheCell>,
    entries: Vec<CacheEntry>,
    owner: ContainerOwner,
    key_type: TypeRef,
    value_type: TypeRef,
    holder_can_write: bool,
    top_label: String,
    not_supported: bool,
}

impl DictionaryEditor {
    pub fn new(rows: usize) -> Self {
        Self {
            pool: CellPool::new(rows),
            entries: Vec::new(),
            owner: ContainerOwner::default(),
            key_type: TypeRef::object(),
            value_type: TypeRef::object(),
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

    pub fn top_label(&self) -> &str {
        &self.top_label
    }

    pub fn key_type(&self) -> &TypeRef {
        &self.key_type
    }

    pub fn value_type(&self) -> &TypeRef {
        &self.value_type
    }

    pub fn can_write(&self) -> bool {
        self.owner.can_write
    }

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
            let (key_type, value_type) = ty
                .map_types()
                .map(|(k, v)| (k.clone(), v.clone()))
                .unwrap_or_else(|| (TypeRef::object(), TypeRef::object()));
            self.key_type = key_type;
            self.value_type = value_type;
            self.owner = ContainerOwner {
                container: value.clone(),
                can_write: self.holder_can_write && !ctx.host.is_read_only(value),
            };
            self.cache_entries(ctx);
            self.top_label = format!("[{}] {}", self.entries.len(), labels::type_label(&ty));
        }
        self.refresh(ctx, RefreshMode::Hard { jump_to_top: false });
    }

    fn cache_entries(&mut self, ctx: &mut InspectContext<'_>) {
        let pairs: Vec<(Value, Value)> = match ctx.host.iter_map(&self.owner.container) {
            Ok(pairs) => pairs.collect(),
            Err(e) => {
                warn!("Could not enumerate {}: {e}", self.owner.container);
                self.release_entries(ctx.editors);
                self.not_supported = true;
                return;
            }
        };
        self.not_supported = false;

        let can_write = self.owner.can_write;
        let mut previous: Vec<Option<CacheEntry>> = self.entries.drain(..).map(Some).collect();
        // Keys are bucketed by their label, then matched exactly within a bucket.
        let mut by_label: IndexMap<String, Vec<usize>> = IndexMap::with_capacity(previous.len());
        for (slot, entry) in previous.iter().enumerate() {
            if let Some(key) = entry.as_ref().and_then(|e| e.dict_key()) {
                by_label.entry(key.to_string()).or_default().push(slot);
            }
        }
        for (index, (key, item)) in pairs.into_iter().enumerate() {
            let reused = by_label
                .get_mut(&key.to_string())
                .and_then(|bucket| {
                    let at = bucket
                        .iter()
                        .position(|&slot| previous[slot].as_ref().and_then(|e| e.dict_key()) == Some(&key))?;
                    Some(bucket.swap_remove(at))
                })
                .and_then(|slot| previous[slot].take());
            let mut entry = match reused {
                Some(mut entry) => {
                    entry.set_index(index);
                    entry.set_fallback_type(self.value_type.clone());
                    entry
                }
                None => {
                    let slot = DictSlot::new(ctx, index, key, &self.key_type);
                    CacheEntry::dict_slot(slot, self.value_type.clone(), can_write)
                }
            };
            entry.can_write = can_write;
            entry.last_error = None;
            entry.set_value_from_source(ctx, item);
            self.entries.push(entry);
        }

        let removed: Vec<CacheEntry> = previous.into_iter().flatten().collect();
        if !removed.is_empty() {
            debug!("{} keys left the dictionary", removed.len());
        }
        for mut entry in removed {
            entry.release(ctx.editors);
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
    use crate::host::MemoryHost;
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
        let map_type = host.map_type(&TypeRef::string(), &TypeRef::string());
        let map = host.alloc_map(
            &map_type,
            vec![
                (Value::str("a"), Value::str("1")),
                (Value::str("b"), Value::str("2")),
                (Value::str("c"), Value::str("3")),
            ],
        );
        let list_type = host.list_type(&TypeRef::string());
        let list = host.alloc_list(&list_type, vec![Value::str("x")], false);

        let mut ctx = InspectContext {
            host: &host,
            caches: &caches,
            config: &config,
            editors: &mut editors,
            evaluator: None,
        };
        let view = owner(ValueState::Dictionary, map_type);
        let mut editor = DictionaryEditor::new(8);
        editor.on_borrowed(&view);
        editor.set_value(&mut ctx, &map, &view);
        assert_eq!(editor.entries().len(), 3);
        assert!(editor.top_label().starts_with("[3]"));

        editor.set_value(&mut ctx, &list, &view);
        assert!(editor.is_not_supported());
        assert!(editor.entries().is_empty());
        assert!(editor.top_label().starts_with("[0]"));
    }
}
