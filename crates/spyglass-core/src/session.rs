//! One inspection session over a host.
//!
//! [`Spyglass`] owns every piece of shared state (caches, settings, editor
//! pool, open inspectors, clipboard and background tasks) and hands the
//! controllers a borrowed [`InspectContext`] for each call.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, EntryAction};
use crate::caches::ReflectionCaches;
use crate::classify::ValueState;
use crate::complete::types::TypeFilter;
use crate::complete::{SliceBudget, Suggestion, TaskRunner, TypeCompleter};
use crate::config::{ConfigError, ConfigInspector, ConfigStore, SpyglassConfig};
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::evaluator::CodeEvaluator;
use crate::host::{Reflection, TypeRef, Value};
use crate::inspector::{InspectorManager, ReflectionInspector};
use crate::ivalue::EditorPool;

pub struct Spyglass<H: Reflection> {
    host: H,
    caches: ReflectionCaches,
    config: SpyglassConfig,
    store: ConfigStore,
    editors: EditorPool,
    manager: InspectorManager,
    config_panel: Option<ConfigInspector>,
    clipboard: Option<Value>,
    runner: TaskRunner,
    type_completer: TypeCompleter,
    evaluator: Option<Box<dyn CodeEvaluator>>,
}

impl<H: Reflection> Spyglass<H> {
    pub fn new(host: H, config: SpyglassConfig) -> Self {
        Self {
            host,
            caches: ReflectionCaches::new(),
            store: ConfigStore::from_config(&config),
            config,
            editors: EditorPool::new(),
            manager: InspectorManager::new(),
            config_panel: None,
            clipboard: None,
            runner: TaskRunner::new(),
            type_completer: TypeCompleter::new(TypeFilter::new(TypeRef::object())),
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn CodeEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SpyglassConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn editors(&self) -> &EditorPool {
        &self.editors
    }

    pub fn manager(&self) -> &InspectorManager {
        &self.manager
    }

    pub fn inspector(&self, id: usize) -> Result<&ReflectionInspector, InspectError> {
        self.manager.get(id).ok_or(InspectError::NoSuchInspector(id))
    }

    /// Filter setters and other calls that need no host access
    pub fn inspector_mut(&mut self, id: usize) -> Result<&mut ReflectionInspector, InspectError> {
        self.manager.get_mut(id).ok_or(InspectError::NoSuchInspector(id))
    }

    pub fn clipboard(&self) -> Option<&Value> {
        self.clipboard.as_ref()
    }

    pub fn config_panel(&self) -> Option<&ConfigInspector> {
        self.config_panel.as_ref()
    }

    fn split(&mut self) -> (InspectContext<'_>, &mut InspectorManager) {
        let ctx = InspectContext {
            host: &self.host,
            caches: &self.caches,
            config: &self.config,
            editors: &mut self.editors,
            evaluator: self.evaluator.as_deref(),
        };
        (ctx, &mut self.manager)
    }

    pub fn inspect(&mut self, value: Value) -> Result<usize, InspectError> {
        let (mut ctx, manager) = self.split();
        manager.inspect(&mut ctx, value)
    }

    pub fn inspect_static(&mut self, ty: TypeRef) -> Result<usize, InspectError> {
        let (mut ctx, manager) = self.split();
        manager.inspect_static(&mut ctx, ty)
    }

    /// Inspects a type by name, `int` style aliases included
    pub fn inspect_type_name(&mut self, name: &str) -> Result<usize, InspectError> {
        let ty = crate::parse::resolve_type_name(&self.host, name).map_err(|e| InspectError::argument(name, e))?;
        self.inspect_static(ty)
    }

    pub fn inspect_entry(&mut self, id: usize, path: &[usize]) -> Result<usize, InspectError> {
        let (mut ctx, manager) = self.split();
        manager.inspect_entry(&mut ctx, id, path)
    }

    pub fn act(&mut self, id: usize, path: &[usize], action: EntryAction) -> Result<bool, InspectError> {
        let (mut ctx, manager) = self.split();
        manager.act(&mut ctx, id, path, action)
    }

    /// Re-evaluates every bound entry of an inspector that has been read before
    pub fn update_inspector(&mut self, id: usize) -> Result<(), InspectError> {
        let (mut ctx, manager) = self.split();
        let inspector = manager.get_mut(id).ok_or(InspectError::NoSuchInspector(id))?;
        inspector.update_displayed(&mut ctx, true);
        Ok(())
    }

    pub fn scroll(&mut self, id: usize, top: usize) -> Result<(), InspectError> {
        let (mut ctx, manager) = self.split();
        let inspector = manager.get_mut(id).ok_or(InspectError::NoSuchInspector(id))?;
        inspector.scroll_to(&mut ctx, top);
        Ok(())
    }

    pub fn make_generic(&mut self, id: usize, args: &[&str]) -> Result<TypeRef, InspectError> {
        let (mut ctx, manager) = self.split();
        let inspector = manager.get_mut(id).ok_or(InspectError::NoSuchInspector(id))?;
        inspector.make_generic(&mut ctx, args)
    }

    pub fn set_active(&mut self, id: usize) -> Result<(), InspectError> {
        self.manager.set_active(id)
    }

    pub fn close(&mut self, id: usize) -> bool {
        self.manager.close(&mut self.editors, id)
    }

    pub fn close_all(&mut self) {
        self.manager.close_all(&mut self.editors);
        if let Some(mut panel) = self.config_panel.take() {
            panel.close(&mut self.editors);
        }
    }

    /// One host tick: inspector upkeep, a slice of every background task and
    /// the config panel
    pub fn tick(&mut self, now: Instant) {
        {
            let (mut ctx, manager) = self.split();
            manager.tick(&mut ctx, now);
        }
        self.runner
            .tick(SliceBudget::Time(Duration::from_millis(self.config.autocomplete_slice_ms)));
        if let Some(panel) = self.config_panel.as_mut() {
            let mut ctx = InspectContext {
                host: &self.host,
                caches: &self.caches,
                config: &self.config,
                editors: &mut self.editors,
                evaluator: self.evaluator.as_deref(),
            };
            panel.refresh(&mut ctx, &mut self.store);
        }
    }

    fn entry(&self, id: usize, path: &[usize]) -> Result<&CacheEntry, InspectError> {
        self.inspector(id)?
            .entry_at(path)
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))
    }

    /// Puts the value of an evaluated entry on the clipboard
    pub fn copy(&mut self, id: usize, path: &[usize]) -> Result<Value, InspectError> {
        let entry = self.entry(id, path)?;
        if matches!(entry.state, ValueState::NotEvaluated | ValueState::Exception) {
            return Err(InspectError::unsupported(format!("{} has no value to copy", entry.name_label)));
        }
        let value = entry.value.clone();
        debug!("Copied {value}");
        self.clipboard = Some(value.clone());
        Ok(value)
    }

    /// Copies what an inspector is looking at
    pub fn copy_target(&mut self, id: usize) -> Result<Value, InspectError> {
        let value = self.inspector(id)?.copy_target();
        self.clipboard = Some(value.clone());
        Ok(value)
    }

    /// Writes the clipboard into a writable entry whose type accepts it
    pub fn paste(&mut self, id: usize, path: &[usize]) -> Result<bool, InspectError> {
        let value = self
            .clipboard
            .clone()
            .ok_or_else(|| InspectError::unsupported("Clipboard is empty"))?;
        let entry = self.entry(id, path)?;
        if !entry.can_write {
            return Err(InspectError::unsupported(format!("{} is read-only", entry.name_label)));
        }
        let compatible = match self.host.runtime_type(&value) {
            Some(ty) => ty.is_assignable_to(&entry.fallback_type) || value.clone().coerce_to(&entry.fallback_type).is_some(),
            None => !entry.fallback_type.is_value_type(),
        };
        if !compatible {
            let message = format!(
                "Cannot paste {} into {} ({})",
                value,
                entry.name_label,
                crate::labels::type_label(&entry.fallback_type)
            );
            warn!("{message}");
            return Err(InspectError::unsupported(message));
        }
        self.act(id, path, EntryAction::SetValue(value))
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
    }

    /// Opens the config panel, or returns the one already open
    pub fn open_config(&mut self) -> &ConfigInspector {
        let rows = self.config.viewport_rows;
        let store = &mut self.store;
        let panel = self.config_panel.get_or_insert_with(|| ConfigInspector::new(store, rows));
        let mut ctx = InspectContext {
            host: &self.host,
            caches: &self.caches,
            config: &self.config,
            editors: &mut self.editors,
            evaluator: self.evaluator.as_deref(),
        };
        panel.refresh(&mut ctx, store);
        panel
    }

    pub fn close_config(&mut self) {
        if let Some(mut panel) = self.config_panel.take() {
            panel.close(&mut self.editors);
        }
    }

    /// Runs an action on a config panel entry and applies the result
    pub fn config_act(&mut self, path: &[usize], action: EntryAction) -> Result<bool, InspectError> {
        let panel = self
            .config_panel
            .as_mut()
            .ok_or_else(|| InspectError::unsupported("The config panel is not open"))?;
        let mut ctx = InspectContext {
            host: &self.host,
            caches: &self.caches,
            config: &self.config,
            editors: &mut self.editors,
            evaluator: self.evaluator.as_deref(),
        };
        let wrote = panel.act(&mut ctx, &mut self.store, path, action)?;
        if wrote {
            self.apply_config();
        }
        Ok(wrote)
    }

    /// Sets one setting by key and applies it
    pub fn set_config(&mut self, key: &str, value: Value) -> Result<bool, ConfigError> {
        let changed = self.store.set(key, value)?;
        if changed {
            self.apply_config();
        }
        Ok(changed)
    }

    pub fn reset_config(&mut self, key: &str) -> Result<bool, ConfigError> {
        let changed = self.store.reset(key)?;
        if changed {
            self.apply_config();
        }
        Ok(changed)
    }

    fn apply_config(&mut self) {
        let next = self.store.to_config();
        if next.member_blacklist != self.config.member_blacklist
            || next.collection_exclusions != self.config.collection_exclusions
        {
            debug!("Member policy changed, clearing reflection caches");
            self.caches.clear();
        }
        self.config = next;
    }

    pub fn load_config(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.store = ConfigStore::load(path)?;
        self.apply_config();
        if let Some(mut panel) = self.config_panel.take() {
            panel.close(&mut self.editors);
            self.open_config();
        }
        info!("Loaded settings from {}", path.display());
        Ok(())
    }

    pub fn save_config(&self, path: &Path) -> Result<(), ConfigError> {
        self.store.save(path)
    }

    /// Restarts type completion for `input`; results arrive over the next ticks
    pub fn complete_type(&mut self, input: &str) {
        self.type_completer.update(&self.host, &mut self.runner, input);
    }

    pub fn type_suggestions(&self) -> Vec<Suggestion> {
        self.type_completer.suggestions()
    }

    pub fn is_completing(&self) -> bool {
        self.type_completer.is_scanning(&self.runner)
    }

    /// Runs background tasks to completion
    pub fn finish_tasks(&mut self) {
        self.runner
            .drain(SliceBudget::Time(Duration::from_millis(self.config.autocomplete_slice_ms.max(1))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, NumberKind, TypeBuilder};
    use pretty_assertions::assert_eq;

    fn session() -> (Spyglass<MemoryHost>, TypeRef, Value) {
        let host = MemoryHost::new();
        let ty = host.register(
            TypeBuilder::class("Game.Hero")
                .field("health", &TypeRef::number(NumberKind::I32))
                .field("armor", &TypeRef::number(NumberKind::I32))
                .field("name", &TypeRef::string())
                .field("secret", &TypeRef::string()),
        );
        let hero = host.alloc(&ty);
        (Spyglass::new(host, SpyglassConfig::default()), ty, hero)
    }

    fn index_of(spyglass: &Spyglass<MemoryHost>, id: usize, filter_name: &str) -> usize {
        spyglass
            .inspector(id)
            .unwrap()
            .entries()
            .iter()
            .position(|e| e.filter_name == filter_name)
            .unwrap()
    }

    #[test]
    fn test_copy_then_paste_between_fields() {
        let (mut spyglass, _, mut hero) = session();
        spyglass.host().write_field(&mut hero, "health", Value::i32(40)).unwrap();
        let id = spyglass.inspect(hero.clone()).unwrap();
        spyglass.tick(Instant::now());

        let health = index_of(&spyglass, id, "Hero.health");
        let armor = index_of(&spyglass, id, "Hero.armor");
        let name = index_of(&spyglass, id, "Hero.name");
        assert_eq!(spyglass.copy(id, &[health]).unwrap(), Value::i32(40));
        assert!(spyglass.paste(id, &[armor]).unwrap());
        assert_eq!(spyglass.host().read_field(&hero, "armor").unwrap(), Value::i32(40));
        assert!(spyglass.paste(id, &[name]).is_err());
    }

    #[test]
    fn test_blacklist_change_applies_to_new_inspectors() {
        let (mut spyglass, _, hero) = session();
        let first = spyglass.inspect(hero.clone()).unwrap();
        assert!(spyglass
            .inspector(first)
            .unwrap()
            .entries()
            .iter()
            .any(|e| e.filter_name == "Hero.secret"));
        spyglass.close(first);

        spyglass.set_config("member_blacklist", Value::str("Hero.secret")).unwrap();
        assert_eq!(spyglass.config().member_blacklist, vec!["Hero.secret".to_string()]);
        let second = spyglass.inspect(hero).unwrap();
        assert!(!spyglass
            .inspector(second)
            .unwrap()
            .entries()
            .iter()
            .any(|e| e.filter_name == "Hero.secret"));
    }

    #[test]
    fn test_config_panel_edits_apply_to_runtime_config() {
        let (mut spyglass, _, _) = session();
        let rows = spyglass.open_config().entries().len();
        assert_eq!(rows, spyglass.store().elements().count());
        let interval = spyglass
            .config_panel()
            .unwrap()
            .entries()
            .iter()
            .position(|e| e.filter_name.starts_with("Milliseconds"))
            .unwrap();
        assert!(spyglass
            .config_act(&[interval], EntryAction::ApplyInput("250".into()))
            .unwrap());
        assert_eq!(spyglass.config().auto_update_interval_ms, 250);
        spyglass.tick(Instant::now());
        let entry = &spyglass.config_panel().unwrap().entries()[interval];
        assert_eq!(entry.value, Value::Number(crate::host::Number::U64(250)));
    }

    #[test]
    fn test_type_completion_runs_over_ticks() {
        let (mut spyglass, _, _) = session();
        spyglass.complete_type("Her");
        spyglass.finish_tasks();
        assert!(!spyglass.is_completing());
        assert!(spyglass
            .type_suggestions()
            .iter()
            .any(|s| s.value == "Game.Hero"));
    }
}
