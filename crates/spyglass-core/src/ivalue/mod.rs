//! Nested editors opened below an entry.
//!
//! Editors are pooled per kind. An entry borrows one when its expand button
//! is pressed and hands it back when its state changes or it is released;
//! the pool clears whatever the previous owner left behind.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::cache::{CacheCell, CacheEntry, EntryAction};
use crate::classify::ValueState;
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::{TypeRef, Value};
use crate::pool::{CellPoolDataSource, PoolCell};

pub mod color;
pub mod dictionary;
pub mod enums;
pub mod list;
pub mod string;
pub mod structs;

pub use color::ColorEditor;
pub use dictionary::DictionaryEditor;
pub use enums::EnumEditor;
pub use list::ListEditor;
pub use string::StringEditor;
pub use structs::StructEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorKind {
    String,
    Enum,
    Color,
    Struct,
    List,
    Dictionary,
}

impl EditorKind {
    /// Editor used for a state, if the state has one
    pub fn for_state(state: ValueState) -> Option<Self> {
        match state {
            ValueState::Exception | ValueState::String => Some(EditorKind::String),
            ValueState::Enum => Some(EditorKind::Enum),
            ValueState::Color => Some(EditorKind::Color),
            ValueState::ValueStruct => Some(EditorKind::Struct),
            ValueState::Collection => Some(EditorKind::List),
            ValueState::Dictionary => Some(EditorKind::Dictionary),
            ValueState::NotEvaluated
            | ValueState::Boolean
            | ValueState::Number
            | ValueState::Unsupported => None,
        }
    }
}

/// What an editor may know about the entry it edits
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerView {
    pub name: String,
    pub state: ValueState,
    pub can_write: bool,
    /// Message of the last evaluation failure
    pub error: Option<String>,
    pub value_type: TypeRef,
}

/// User input aimed at a nested editor
#[derive(Debug, Clone, PartialEq)]
pub enum EditorInput {
    Text(String),
    Flag { index: usize, on: bool },
    ColorText { channel: usize, text: String },
    ColorSlider { channel: usize, value: f32 },
    FieldText { index: usize, text: String },
    /// Writes the string to a file; `None` uses the suggested path
    SaveToFile(Option<PathBuf>),
    Scroll(usize),
}

#[derive(Debug)]
pub enum InteractiveValue {
    String(StringEditor),
    Enum(EnumEditor),
    Color(ColorEditor),
    Struct(StructEditor),
    List(ListEditor),
    Dictionary(DictionaryEditor),
}

impl InteractiveValue {
    pub fn new(kind: EditorKind, rows: usize) -> Self {
        match kind {
            EditorKind::String => InteractiveValue::String(StringEditor::default()),
            EditorKind::Enum => InteractiveValue::Enum(EnumEditor::default()),
            EditorKind::Color => InteractiveValue::Color(ColorEditor::default()),
            EditorKind::Struct => InteractiveValue::Struct(StructEditor::default()),
            EditorKind::List => InteractiveValue::List(ListEditor::new(rows)),
            EditorKind::Dictionary => InteractiveValue::Dictionary(DictionaryEditor::new(rows)),
        }
    }

    pub fn kind(&self) -> EditorKind {
        match self {
            InteractiveValue::String(_) => EditorKind::String,
            InteractiveValue::Enum(_) => EditorKind::Enum,
            InteractiveValue::Color(_) => EditorKind::Color,
            InteractiveValue::Struct(_) => EditorKind::Struct,
            InteractiveValue::List(_) => EditorKind::List,
            InteractiveValue::Dictionary(_) => EditorKind::Dictionary,
        }
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        match self {
            InteractiveValue::String(e) => e.on_borrowed(owner),
            InteractiveValue::Enum(e) => e.on_borrowed(owner),
            InteractiveValue::Color(e) => e.on_borrowed(owner),
            InteractiveValue::Struct(e) => e.on_borrowed(owner),
            InteractiveValue::List(e) => e.on_borrowed(owner),
            InteractiveValue::Dictionary(e) => e.on_borrowed(owner),
        }
    }

    /// Loads the owner's current value
    pub fn set_value(&mut self, ctx: &mut InspectContext<'_>, value: &Value, owner: &OwnerView) {
        match self {
            InteractiveValue::String(e) => e.set_value(ctx, value, owner),
            InteractiveValue::Enum(e) => e.set_value(ctx, value, owner),
            InteractiveValue::Color(e) => e.set_value(value, owner),
            InteractiveValue::Struct(e) => e.set_value(ctx, value, owner),
            InteractiveValue::List(e) => e.set_value(ctx, value, owner),
            InteractiveValue::Dictionary(e) => e.set_value(ctx, value, owner),
        }
    }

    pub fn input(&mut self, ctx: &mut InspectContext<'_>, input: EditorInput) -> Result<(), InspectError> {
        match (self, input) {
            (InteractiveValue::String(e), input) => e.input(ctx, input),
            (InteractiveValue::Enum(e), input) => e.input(input),
            (InteractiveValue::Color(e), input) => e.input(input),
            (InteractiveValue::Struct(e), input) => e.input(input),
            (InteractiveValue::List(e), EditorInput::Scroll(top)) => {
                e.scroll_to(ctx, top);
                Ok(())
            }
            (InteractiveValue::Dictionary(e), EditorInput::Scroll(top)) => {
                e.scroll_to(ctx, top);
                Ok(())
            }
            (editor, input) => Err(InspectError::unsupported(format!(
                "{:?} editor does not accept {input:?}",
                editor.kind()
            ))),
        }
    }

    /// Value the owner should write, or `None` when there is nothing to apply
    pub fn apply(&mut self, ctx: &mut InspectContext<'_>) -> Result<Option<Value>, InspectError> {
        match self {
            InteractiveValue::String(e) => e.apply(),
            InteractiveValue::Enum(e) => e.apply(ctx),
            InteractiveValue::Color(e) => e.apply(),
            InteractiveValue::Struct(e) => e.apply(ctx),
            InteractiveValue::List(_) | InteractiveValue::Dictionary(_) => Err(InspectError::unsupported(
                "Collections are edited through their entries",
            )),
        }
    }

    /// Drops all owner state; nested entries give their editors back to `pool`
    pub fn release_from_owner(&mut self, pool: &mut EditorPool) {
        match self {
            InteractiveValue::String(e) => *e = StringEditor::default(),
            InteractiveValue::Enum(e) => *e = EnumEditor::default(),
            InteractiveValue::Color(e) => *e = ColorEditor::default(),
            InteractiveValue::Struct(e) => *e = StructEditor::default(),
            InteractiveValue::List(e) => e.release_from_owner(pool),
            InteractiveValue::Dictionary(e) => e.release_from_owner(pool),
        }
    }

    /// Routes an action to entry `index` of a collection editor
    pub fn dispatch(
        &mut self,
        ctx: &mut InspectContext<'_>,
        index: usize,
        rest: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        match self {
            InteractiveValue::List(e) => e.dispatch(ctx, index, rest, action),
            InteractiveValue::Dictionary(e) => e.dispatch(ctx, index, rest, action),
            _ => Err(InspectError::NoSuchEntry(vec![index])),
        }
    }

    pub fn entry(&self, index: usize) -> Option<&CacheEntry> {
        match self {
            InteractiveValue::List(e) => e.entries().get(index),
            InteractiveValue::Dictionary(e) => e.entries().get(index),
            _ => None,
        }
    }
}

/// Data source with no items, used to unbind a pool once its entries are gone
pub(crate) struct Unbound;

impl CellPoolDataSource<CacheCell> for Unbound {
    fn item_count(&self) -> usize {
        0
    }

    fn set_cell(&mut self, _cell_id: usize, cell: &mut CacheCell, _index: usize) {
        cell.disable();
    }
}

/// Free lists of editors, one per kind
#[derive(Debug, Default)]
pub struct EditorPool {
    free: HashMap<EditorKind, Vec<InteractiveValue>>,
    borrowed: usize,
    created: usize,
}

impl EditorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn borrow(&mut self, kind: EditorKind, rows: usize) -> InteractiveValue {
        self.borrowed += 1;
        if let Some(editor) = self.free.get_mut(&kind).and_then(Vec::pop) {
            return editor;
        }
        self.created += 1;
        debug!("Creating {kind:?} editor ({} created)", self.created);
        InteractiveValue::new(kind, rows)
    }

    pub fn give_back(&mut self, mut editor: InteractiveValue) {
        editor.release_from_owner(self);
        self.borrowed = self.borrowed.saturating_sub(1);
        self.free.entry(editor.kind()).or_default().push(editor);
    }

    /// Editors currently held by entries
    pub fn borrowed(&self) -> usize {
        self.borrowed
    }

    pub fn idle(&self, kind: EditorKind) -> usize {
        self.free.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Editors ever created; reuse keeps this flat
    pub fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_editor_kind_per_state() {
        assert_eq!(EditorKind::for_state(ValueState::Exception), Some(EditorKind::String));
        assert_eq!(EditorKind::for_state(ValueState::Collection), Some(EditorKind::List));
        assert_eq!(EditorKind::for_state(ValueState::Number), None);
        assert_eq!(EditorKind::for_state(ValueState::Unsupported), None);
    }

    #[test]
    fn test_pool_reuses_returned_editors() {
        let mut pool = EditorPool::new();
        let editor = pool.borrow(EditorKind::String, 10);
        assert_eq!(pool.borrowed(), 1);
        pool.give_back(editor);
        assert_eq!(pool.idle(EditorKind::String), 1);

        let again = pool.borrow(EditorKind::String, 10);
        assert_eq!(again.kind(), EditorKind::String);
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.idle(EditorKind::String), 0);
    }
}
