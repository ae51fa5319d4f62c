//! Reflection inspectors and the tab manager that owns them.

use std::time::{Duration, Instant};

use bitflags::bitflags;
use tracing::{debug, info};

use crate::cache::{ArgumentInputs, CacheCell, CacheEntry, CellView, EntryAction, EntryBinder, MemberOwner};
use crate::context::InspectContext;
use crate::enumerate::{Blacklist, MemberEnumerator, MemberKind};
use crate::errors::InspectError;
use crate::host::{MemberScope, TypeRef, Value};
use crate::ivalue::{EditorPool, Unbound};
use crate::labels;
use crate::pool::{CellPool, RefreshMode};

pub mod manager;

pub use manager::{InspectorManager, ParentLink};

bitflags! {
    /// Member kinds shown by an inspector
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemberFilter: u8 {
        const PROPERTY = 1;
        const FIELD = 2;
        const CONSTRUCTOR = 4;
        const METHOD = 8;
    }
}

impl MemberFilter {
    fn admits(self, kind: MemberKind) -> bool {
        let flag = match kind {
            MemberKind::Property => MemberFilter::PROPERTY,
            MemberKind::Field => MemberFilter::FIELD,
            MemberKind::Constructor => MemberFilter::CONSTRUCTOR,
            MemberKind::Method => MemberFilter::METHOD,
        };
        self.contains(flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    Any,
    Instance,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub name: String,
    pub scope: ScopeFilter,
    pub kinds: MemberFilter,
}

impl FilterState {
    fn new(scope: ScopeFilter) -> Self {
        Self {
            name: String::new(),
            scope,
            kinds: MemberFilter::all(),
        }
    }

    fn admits(&self, entry: &CacheEntry) -> bool {
        let Some(descriptor) = entry.descriptor() else {
            return false;
        };
        let scope_ok = match self.scope {
            ScopeFilter::Any => true,
            ScopeFilter::Instance => !descriptor.is_static(),
            ScopeFilter::Static => descriptor.is_static(),
        };
        scope_ok
            && self.kinds.admits(descriptor.kind())
            && (self.name.is_empty() || entry.filter_name.to_lowercase().contains(&self.name.to_lowercase()))
    }
}

/// What an inspector is looking at
#[derive(Debug, Clone, PartialEq)]
pub enum InspectTarget {
    Instance(Value),
    Static(TypeRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorState {
    Uninitialized,
    Ready,
}

/// Member list of one object or type, filtered and bound to a cell pool
#[derive(Debug)]
pub struct ReflectionInspector {
    id: usize,
    state: InspectorState,
    static_only: bool,
    owner: MemberOwner,
    entries: Vec<CacheEntry>,
    filtered: Vec<usize>,
    filter: FilterState,
    last_filter: Option<FilterState>,
    refresh_wanted: bool,
    /// Re-evaluate visible auto-evaluating members on the configured interval
    pub auto_update: bool,
    last_auto_update: Option<Instant>,
    pool: CellPool<CacheCell>,
    tab_label: String,
}

impl ReflectionInspector {
    pub fn new(id: usize, rows: usize) -> Self {
        Self {
            id,
            state: InspectorState::Uninitialized,
            static_only: false,
            owner: MemberOwner::new(None, TypeRef::object()),
            entries: Vec::new(),
            filtered: Vec::new(),
            filter: FilterState::new(ScopeFilter::Any),
            last_filter: None,
            refresh_wanted: false,
            auto_update: false,
            last_auto_update: None,
            pool: CellPool::new(rows),
            tab_label: String::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> InspectorState {
        self.state
    }

    pub fn is_static(&self) -> bool {
        self.static_only
    }

    /// The inspected instance, or `None` for a static inspector
    pub fn target(&self) -> Option<&Value> {
        self.owner.target.as_ref()
    }

    pub fn target_type(&self) -> &TypeRef {
        &self.owner.target_type
    }

    /// `[R] Type` for instances, `[S] Type` for static inspectors
    pub fn tab_label(&self) -> &str {
        &self.tab_label
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Entry indices in display order after filtering
    pub fn filtered(&self) -> &[usize] {
        &self.filtered
    }

    pub fn pool(&self) -> &CellPool<CacheCell> {
        &self.pool
    }

    /// Bound rows as `(entry index, view)`, top to bottom
    pub fn rows(&self) -> Vec<(usize, &CellView)> {
        self.pool
            .visible()
            .filter_map(|(_, cell)| cell.occupant.map(|entry| (entry, &cell.view)))
            .collect()
    }

    pub fn entry_at(&self, path: &[usize]) -> Option<&CacheEntry> {
        let (&index, rest) = path.split_first()?;
        self.entries.get(index)?.entry_at(rest)
    }

    /// Value placed on the clipboard by the copy button
    pub fn copy_target(&self) -> Value {
        self.owner
            .target
            .clone()
            .unwrap_or_else(|| Value::Type(self.owner.target_type.clone()))
    }

    pub fn set_target(&mut self, ctx: &mut InspectContext<'_>, target: InspectTarget) -> Result<(), InspectError> {
        let (target, ty, scope) = match target {
            InspectTarget::Static(ty) => (None, ty, MemberScope::STATIC),
            InspectTarget::Instance(value) => {
                let ty = ctx
                    .host
                    .runtime_type(&value)
                    .ok_or_else(|| InspectError::unsupported("Cannot inspect null"))?;
                if !ctx.host.is_alive(&value) {
                    return Err(InspectError::StaleReference(labels::type_label(&ty)));
                }
                (Some(value), ty, MemberScope::INSTANCE | MemberScope::STATIC)
            }
        };
        self.release_entries(ctx.editors);

        self.static_only = target.is_none();
        let prefix = if self.static_only { "[S]" } else { "[R]" };
        self.tab_label = format!("{prefix} {}", labels::type_label(&ty));

        let blacklist = Blacklist::new(ctx.config.member_blacklist.iter().cloned());
        let members = MemberEnumerator::new(ctx.host, ctx.caches, &blacklist).enumerate(&ty, scope);
        self.entries = members.iter().cloned().map(CacheEntry::member).collect();
        debug!("{} has {} members", self.tab_label, self.entries.len());

        self.owner = MemberOwner::new(target, ty);
        self.filter = FilterState::new(if self.static_only {
            ScopeFilter::Static
        } else {
            ScopeFilter::Any
        });
        self.last_filter = None;
        self.refresh_wanted = true;
        self.last_auto_update = None;
        self.state = InspectorState::Ready;
        Ok(())
    }

    pub fn set_name_filter(&mut self, name: &str) {
        self.filter.name = name.to_string();
    }

    pub fn set_scope_filter(&mut self, scope: ScopeFilter) {
        if self.static_only && scope != ScopeFilter::Static {
            return;
        }
        self.filter.scope = scope;
    }

    pub fn set_kind_filter(&mut self, kind: MemberFilter, shown: bool) {
        self.filter.kinds.set(kind, shown);
    }

    pub fn force_refresh(&mut self) {
        self.refresh_wanted = true;
    }

    /// Whether the inspected instance has been destroyed
    pub fn is_stale(&self, ctx: &InspectContext<'_>) -> bool {
        match &self.owner.target {
            Some(target) => !ctx.host.is_alive(target),
            None => false,
        }
    }

    /// Per-tick work: re-filter when the filter changed, and auto-update on
    /// the configured interval
    pub fn update(&mut self, ctx: &mut InspectContext<'_>, now: Instant) -> Result<(), InspectError> {
        if self.state != InspectorState::Ready {
            return Ok(());
        }
        if self.is_stale(ctx) {
            return Err(InspectError::StaleReference(self.tab_label.clone()));
        }

        if self.refresh_wanted || self.last_filter.as_ref() != Some(&self.filter) {
            self.last_filter = Some(self.filter.clone());
            self.filter_members();
            self.refresh(ctx, RefreshMode::Hard { jump_to_top: true });
            self.refresh_wanted = false;
        }

        let interval = Duration::from_millis(ctx.config.auto_update_interval_ms);
        let due = self
            .last_auto_update
            .map(|last| now.saturating_duration_since(last) >= interval)
            .unwrap_or(true);
        if due {
            self.last_auto_update = Some(now);
            if self.auto_update {
                self.update_displayed(ctx, false);
            }
        }
        Ok(())
    }

    fn filter_members(&mut self) {
        let filter = &self.filter;
        self.filtered = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter.admits(entry))
            .map(|(i, _)| i)
            .collect();
    }

    /// Re-evaluates the entries currently bound to cells. With `explicit`
    /// set, entries that were evaluated by hand are read again too.
    ///
    /// An explicit update still skips entries in `NotEvaluated`: a method or
    /// an argument-taking property only runs after its own Evaluate, so an
    /// update never invokes a member the user has not called yet.
    pub fn update_displayed(&mut self, ctx: &mut InspectContext<'_>, explicit: bool) {
        let bound: Vec<usize> = self.rows().into_iter().map(|(entry, _)| entry).collect();
        let mut changed = false;
        for index in bound {
            let Some(entry) = self.entries.get_mut(index) else {
                continue;
            };
            let wanted = entry.should_auto_evaluate()
                || (explicit && entry.state != crate::classify::ValueState::NotEvaluated);
            if !wanted {
                continue;
            }
            changed = true;
            if let Err(e) = entry.evaluate(ctx, &mut self.owner) {
                debug!("Update of {} skipped: {e}", entry.name_label);
            }
        }
        if changed {
            self.refresh(ctx, RefreshMode::Soft);
        }
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
            order: Some(&self.filtered),
        };
        self.pool.refresh(&mut binder, mode);
    }

    pub fn scroll_to(&mut self, ctx: &mut InspectContext<'_>, top: usize) {
        let mut binder = EntryBinder {
            ctx,
            entries: &mut self.entries,
            owner: &mut self.owner,
            order: Some(&self.filtered),
        };
        self.pool.scroll_to(&mut binder, top);
    }

    /// Runs an action on the entry at `path`. Returns whether a slot was written.
    pub fn act(
        &mut self,
        ctx: &mut InspectContext<'_>,
        path: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        let (&index, rest) = path
            .split_first()
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let wrote = entry.dispatch(ctx, &mut self.owner, rest, action)?;
        self.refresh(ctx, RefreshMode::Soft);
        Ok(wrote)
    }

    /// Closes an open generic definition over `args` and inspects the result
    pub fn make_generic(&mut self, ctx: &mut InspectContext<'_>, args: &[&str]) -> Result<TypeRef, InspectError> {
        let definition = self.owner.target_type.clone();
        if !self.static_only || !definition.is_generic_definition() {
            return Err(InspectError::unsupported(format!(
                "{} is not an open generic type",
                labels::type_label(&definition)
            )));
        }
        let mut inputs = ArgumentInputs::new(&[], &definition.generic_params);
        for (index, text) in args.iter().enumerate() {
            inputs.set_generic_input(index, text)?;
        }
        let types = inputs.resolve_generic_arguments(ctx.host, ctx.evaluator)?;
        let constructed = ctx
            .host
            .make_generic_type(&definition, &types)
            .map_err(|e| InspectError::evaluation(&labels::type_label(&definition), e))?;
        info!("Constructed {}", labels::type_label(&constructed));
        self.set_target(ctx, InspectTarget::Static(constructed.clone()))?;
        Ok(constructed)
    }

    fn release_entries(&mut self, pool: &mut EditorPool) {
        for entry in &mut self.entries {
            entry.release(pool);
        }
        self.entries.clear();
        self.filtered.clear();
        self.pool.clear(&mut Unbound);
    }

    /// Releases every entry and returns to the uninitialized state
    pub fn close(&mut self, pool: &mut EditorPool) {
        self.release_entries(pool);
        self.owner = MemberOwner::new(None, TypeRef::object());
        self.auto_update = false;
        self.state = InspectorState::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::ReflectionCaches;
    use crate::config::SpyglassConfig;
    use crate::host::{MemoryHost, NumberKind, TypeBuilder};
    use pretty_assertions::assert_eq;

    struct Fixture {
        host: MemoryHost,
        caches: ReflectionCaches,
        config: SpyglassConfig,
        editors: EditorPool,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                host: MemoryHost::new(),
                caches: ReflectionCaches::new(),
                config: SpyglassConfig::default(),
                editors: EditorPool::new(),
            }
        }

        fn ctx(&mut self) -> InspectContext<'_> {
            InspectContext {
                host: &self.host,
                caches: &self.caches,
                config: &self.config,
                editors: &mut self.editors,
                evaluator: None,
            }
        }
    }

    fn hero(host: &MemoryHost) -> TypeRef {
        host.register(
            TypeBuilder::class("Game.Hero")
                .field("health", &TypeRef::number(NumberKind::I32))
                .field("name", &TypeRef::string())
                .static_field("count", &TypeRef::number(NumberKind::I32), Value::i32(3))
                .method("Heal", &TypeRef::void(), vec![], |_, _, _, _| Ok(Value::Null)),
        )
    }

    fn names(inspector: &ReflectionInspector) -> Vec<String> {
        inspector
            .filtered()
            .iter()
            .map(|&i| inspector.entries()[i].filter_name.clone())
            .collect()
    }

    #[test]
    fn test_tab_label_and_static_scope() {
        let mut f = Fixture::new();
        let ty = hero(&f.host);
        let target = f.host.alloc(&ty);
        let mut ctx = f.ctx();

        let mut inspector = ReflectionInspector::new(1, 20);
        inspector.set_target(&mut ctx, InspectTarget::Instance(target)).unwrap();
        assert_eq!(inspector.tab_label(), "[R] Hero");

        let mut statics = ReflectionInspector::new(2, 20);
        statics.set_target(&mut ctx, InspectTarget::Static(ty)).unwrap();
        statics.update(&mut ctx, Instant::now()).unwrap();
        assert_eq!(statics.tab_label(), "[S] Hero");
        assert!(statics.entries().iter().all(|e| e.is_static()));
        assert_eq!(statics.filter().scope, ScopeFilter::Static);
    }

    #[test]
    fn test_filters_by_name_scope_and_kind() {
        let mut f = Fixture::new();
        let ty = hero(&f.host);
        let target = f.host.alloc(&ty);
        let mut ctx = f.ctx();
        let mut inspector = ReflectionInspector::new(1, 20);
        inspector.set_target(&mut ctx, InspectTarget::Instance(target)).unwrap();

        inspector.set_name_filter("HEAL");
        inspector.update(&mut ctx, Instant::now()).unwrap();
        assert_eq!(names(&inspector), vec!["Hero.Heal".to_string()]);

        inspector.set_name_filter("hero.");
        inspector.set_kind_filter(MemberFilter::METHOD, false);
        inspector.set_scope_filter(ScopeFilter::Static);
        inspector.update(&mut ctx, Instant::now()).unwrap();
        assert_eq!(names(&inspector), vec!["Hero.count".to_string()]);

        inspector.set_scope_filter(ScopeFilter::Instance);
        inspector.update(&mut ctx, Instant::now()).unwrap();
        let shown = names(&inspector);
        assert!(shown.contains(&"Hero.health".to_string()));
        assert!(!shown.contains(&"Hero.count".to_string()));
        assert_eq!(inspector.rows().len(), shown.len());
    }

    #[test]
    fn test_destroyed_target_is_stale() {
        let mut f = Fixture::new();
        let ty = hero(&f.host);
        let target = f.host.alloc(&ty);
        let mut inspector = ReflectionInspector::new(1, 20);
        {
            let mut ctx = f.ctx();
            inspector.set_target(&mut ctx, InspectTarget::Instance(target.clone())).unwrap();
        }
        f.host.destroy(&target);
        let mut ctx = f.ctx();
        assert!(inspector.is_stale(&ctx));
        assert!(matches!(
            inspector.update(&mut ctx, Instant::now()),
            Err(InspectError::StaleReference(_))
        ));
        assert!(matches!(
            ReflectionInspector::new(2, 20).set_target(&mut ctx, InspectTarget::Instance(target)),
            Err(InspectError::StaleReference(_))
        ));
    }

    #[test]
    fn test_auto_update_waits_for_interval() {
        let mut f = Fixture::new();
        let ty = hero(&f.host);
        let mut target = f.host.alloc(&ty);
        let mut inspector = ReflectionInspector::new(1, 20);
        inspector.auto_update = true;
        let start = Instant::now();
        {
            let mut ctx = f.ctx();
            inspector.set_target(&mut ctx, InspectTarget::Instance(target.clone())).unwrap();
            inspector.set_name_filter("health");
            inspector.update(&mut ctx, start).unwrap();
        }
        let health = inspector.filtered()[0];
        assert_eq!(inspector.entries()[health].value, Value::i32(0));

        f.host.write_field(&mut target, "health", Value::i32(7)).unwrap();
        let mut ctx = f.ctx();
        inspector.update(&mut ctx, start + Duration::from_millis(10)).unwrap();
        assert_eq!(inspector.entries()[health].value, Value::i32(0));
        inspector.update(&mut ctx, start + Duration::from_millis(1000)).unwrap();
        assert_eq!(inspector.entries()[health].value, Value::i32(7));
    }

    #[test]
    fn test_make_generic_retargets_static_inspector() {
        let mut f = Fixture::new();
        let pair = f.host.register(
            TypeBuilder::class("Game.Pair`2")
                .generic(&["TKey", "TValue"])
                .static_field("made", &TypeRef::bool(), Value::Bool(false)),
        );
        let mut ctx = f.ctx();
        let mut inspector = ReflectionInspector::new(1, 20);
        inspector.set_target(&mut ctx, InspectTarget::Static(pair)).unwrap();

        let made = inspector.make_generic(&mut ctx, &["string", "int"]).unwrap();
        assert_eq!(made.generic_args.len(), 2);
        assert_eq!(inspector.target_type(), &made);
        assert!(inspector.is_static());

        assert!(inspector.make_generic(&mut ctx, &["string"]).is_err());
    }
}
