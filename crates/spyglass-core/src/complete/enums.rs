use std::collections::HashSet;
use std::sync::Arc;

use crate::caches::EnumTable;

use super::Suggestion;

/// Text after the last comma; flag lists are completed one name at a time
fn last_segment(input: &str) -> &str {
    match input.rfind(',') {
        Some(i) => &input[i + 1..],
        None => input,
    }
}

/// Suggests enum value names for a free-text enum input
#[derive(Debug, Clone, Default)]
pub struct EnumCompleter {
    table: Option<Arc<EnumTable>>,
    chosen: Option<String>,
}

impl EnumCompleter {
    pub fn new(table: Arc<EnumTable>) -> Self {
        Self {
            table: Some(table),
            chosen: None,
        }
    }

    pub fn set_table(&mut self, table: Arc<EnumTable>) {
        self.table = Some(table);
        self.chosen = None;
    }

    pub fn clear(&mut self) {
        self.table = None;
        self.chosen = None;
    }

    /// Names containing the current segment, case-insensitively, in declaration order
    pub fn suggestions(&self, input: &str) -> Vec<Suggestion> {
        let Some(table) = &self.table else {
            return Vec::new();
        };
        let segment = last_segment(input).trim();
        if !input.is_empty() && self.chosen.as_deref() == Some(segment) {
            return Vec::new();
        }
        let needle = segment.to_lowercase();
        let mut seen = HashSet::new();
        table
            .values
            .iter()
            .filter(|v| v.name.to_lowercase().contains(&needle))
            .filter(|v| seen.insert(v.name.clone()))
            .map(|v| Suggestion::new(v.name.clone(), v.name.clone()))
            .collect()
    }

    /// Replaces the current segment of `input` with `suggestion`
    pub fn choose(&mut self, input: &str, suggestion: &Suggestion) -> String {
        self.chosen = Some(suggestion.value.clone());
        let segment = last_segment(input);
        if segment.trim() == suggestion.value {
            return input.to_string();
        }
        let head = &input[..input.len() - segment.len()];
        if head.is_empty() {
            suggestion.value.clone()
        } else {
            format!("{head} {}", suggestion.value)
        }
    }
}
