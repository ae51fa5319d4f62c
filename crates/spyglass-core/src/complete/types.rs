use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::{Reflection, TypeKind, TypeRef};
use crate::parse::SHORTHAND_TYPES;

use super::{CancellationToken, CooperativeTask, Slice, Suggestion, SuggestionSink, TaskId, TaskRunner, TaskStatus};

/// Which types a completer may offer
#[derive(Debug, Clone)]
pub struct TypeFilter {
    pub base: TypeRef,
    pub allow_abstract: bool,
    pub allow_enum: bool,
    pub allow_generic: bool,
}

impl TypeFilter {
    pub fn new(base: TypeRef) -> Self {
        Self {
            base,
            allow_abstract: true,
            allow_enum: true,
            allow_generic: true,
        }
    }

    pub fn allows(&self, ty: &TypeRef) -> bool {
        if matches!(ty.kind, TypeKind::GenericParam | TypeKind::Void) {
            return false;
        }
        if !self.allow_abstract && (ty.is_abstract || matches!(ty.kind, TypeKind::Interface)) {
            return false;
        }
        if !self.allow_enum && ty.is_enum() {
            return false;
        }
        if !self.allow_generic && ty.is_generic_definition() {
            return false;
        }
        ty.is_assignable_to(&self.base)
    }
}

fn suggestion_for(ty: &TypeRef) -> Suggestion {
    Suggestion::new(ty.display_name(), ty.name.clone())
}

/// Scans a snapshot of every loaded type for names containing the input
struct TypeScan {
    types: Vec<TypeRef>,
    position: usize,
    needle: String,
    filter: TypeFilter,
    sink: SuggestionSink,
    seen: HashSet<String>,
    token: CancellationToken,
}

impl CooperativeTask for TypeScan {
    fn name(&self) -> &str {
        "type completion"
    }

    fn step(&mut self, slice: &mut Slice) -> TaskStatus {
        let mut found = Vec::new();
        let status = loop {
            if self.token.is_cancelled() {
                break TaskStatus::Cancelled;
            }
            let Some(ty) = self.types.get(self.position) else {
                break TaskStatus::Complete;
            };
            if !slice.claim() {
                break TaskStatus::Pending;
            }
            self.position += 1;
            if self.filter.allows(ty) && ty.name.to_lowercase().contains(&self.needle) && self.seen.insert(ty.name.clone())
            {
                found.push(suggestion_for(ty));
            }
        };
        if status != TaskStatus::Cancelled && !found.is_empty() {
            self.sink.lock().extend(found);
        }
        status
    }
}

/// Suggests loaded types assignable to a base type.
///
/// Shorthand aliases and an exact name match are offered at once; the full
/// scan runs as a cooperative task and appends to the same list as it goes.
pub struct TypeCompleter {
    filter: TypeFilter,
    enabled: bool,
    sink: SuggestionSink,
    running: Option<(TaskId, CancellationToken)>,
}

impl TypeCompleter {
    pub fn new(filter: TypeFilter) -> Self {
        Self {
            filter,
            enabled: true,
            sink: Arc::new(Mutex::new(Vec::new())),
            running: None,
        }
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.sink.lock().clone()
    }

    pub fn is_scanning(&self, runner: &TaskRunner) -> bool {
        self.running
            .as_ref()
            .map(|(id, _)| runner.is_running(*id))
            .unwrap_or(false)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    pub fn cancel(&mut self) {
        if let Some((_, token)) = self.running.take() {
            token.cancel();
        }
    }

    /// Restarts completion for `input`, cancelling any scan still running
    pub fn update(&mut self, host: &dyn Reflection, runner: &mut TaskRunner, input: &str) {
        self.cancel();
        self.sink.lock().clear();
        if !self.enabled || input.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let mut immediate = Vec::new();
        let mut offer = |ty: TypeRef, seen: &mut HashSet<String>| {
            if self.filter.allows(&ty) && seen.insert(ty.name.clone()) {
                immediate.push(suggestion_for(&ty));
            }
        };
        for (alias, full) in SHORTHAND_TYPES {
            if *alias == input {
                if let Some(ty) = host.type_by_name(full) {
                    offer(ty, &mut seen);
                }
            }
        }
        let lowered = input.to_lowercase();
        for (alias, full) in SHORTHAND_TYPES {
            if alias.starts_with(&lowered) {
                if let Some(ty) = host.type_by_name(full) {
                    offer(ty, &mut seen);
                }
            }
        }
        if let Some(ty) = host.type_by_name(input) {
            offer(ty, &mut seen);
        }
        self.sink.lock().extend(immediate);

        let token = CancellationToken::new();
        let scan = TypeScan {
            types: host.all_types(),
            position: 0,
            needle: lowered,
            filter: self.filter.clone(),
            sink: self.sink.clone(),
            seen,
            token: token.clone(),
        };
        let id = runner.spawn(Box::new(scan), token.clone());
        self.running = Some((id, token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete::SliceBudget;
    use crate::host::{MemoryHost, TypeBuilder};
    use pretty_assertions::assert_eq;

    fn host() -> (MemoryHost, TypeRef) {
        let host = MemoryHost::new();
        let entity = host.register(TypeBuilder::class("Game.Entity").abstract_type());
        host.register(TypeBuilder::class("Game.Player").base(&entity));
        host.register(TypeBuilder::class("Game.Pickup").base(&entity));
        host.register(TypeBuilder::class("Game.Path"));
        (host, entity)
    }

    #[test]
    fn test_shorthand_offered_first() {
        let (host, _) = host();
        let mut runner = TaskRunner::new();
        let mut completer = TypeCompleter::new(TypeFilter::new(TypeRef::object()));
        completer.update(&host, &mut runner, "int");
        assert_eq!(completer.suggestions().first().map(|s| s.value.as_str()), Some("i32"));
    }

    #[test]
    fn test_scan_respects_base_and_publishes_partial_results() {
        let (host, entity) = host();
        let mut runner = TaskRunner::new();
        let mut filter = TypeFilter::new(entity);
        filter.allow_abstract = false;
        let mut completer = TypeCompleter::new(filter);

        completer.update(&host, &mut runner, "game.p");
        assert!(completer.is_scanning(&runner));
        runner.drain(SliceBudget::Items(1));

        let mut names: Vec<String> = completer.suggestions().into_iter().map(|s| s.value).collect();
        names.sort();
        assert_eq!(names, vec!["Game.Pickup", "Game.Player"]);
    }

    #[test]
    fn test_disabling_cancels_scan() {
        let (host, entity) = host();
        let mut runner = TaskRunner::new();
        let mut completer = TypeCompleter::new(TypeFilter::new(entity));
        completer.update(&host, &mut runner, "Game");
        completer.set_enabled(false);
        runner.tick(SliceBudget::Items(100));
        assert!(runner.is_empty());
        assert!(completer.suggestions().is_empty());
    }
}
