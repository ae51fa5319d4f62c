//! Cached entries: one value slot (member, list index, dictionary key or
//! config element) plus everything needed to display and edit it.
//!
//! An entry never holds a pointer to whatever owns its slot. Every operation
//! that touches the host receives the owner as an [`EntryOwner`] argument, so
//! the same entry type serves inspectors, collection editors and the config
//! panel.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::classify::ValueState;
use crate::context::InspectContext;
use crate::enumerate::MemberDescriptor;
use crate::errors::InspectError;
use crate::host::{HostError, TypeRef, Value};
use crate::ivalue::{EditorInput, EditorKind, EditorPool, InteractiveValue, OwnerView};
use crate::labels;
use crate::parse;
use crate::pool::{CellPoolDataSource, PoolCell};

pub mod args;
pub mod cell;
pub mod member;

pub use args::ArgumentInputs;
pub use cell::{CacheCell, CellView, InputView, KeyView, ToggleView, ValueStateArgs};
pub use member::{MemberOwner, MemberSlot};

/// Position of an entry: its index in the controller, then its index inside
/// each nested collection editor on the way down
pub type EntryPath = Vec<usize>;

/// A dictionary row: the live key and how it is displayed
#[derive(Debug, Clone)]
pub struct DictSlot {
    pub index: usize,
    pub key: Value,
    pub key_view: KeyView,
}

impl DictSlot {
    pub fn new(ctx: &InspectContext<'_>, index: usize, key: Value, key_type: &TypeRef) -> Self {
        let key_view = Self::key_view(ctx, &key, key_type);
        Self { index, key, key_view }
    }

    fn key_view(ctx: &InspectContext<'_>, key: &Value, key_type: &TypeRef) -> KeyView {
        let ty = ctx.host.runtime_type(key).unwrap_or_else(|| key_type.clone());
        if parse::can_parse(&ty) {
            KeyView {
                input: Some(InputView {
                    text: parse::to_input_text(key),
                    read_only: true,
                }),
                type_label: Some(labels::type_label(&ty)),
                label: None,
                inspect: false,
            }
        } else {
            KeyView {
                input: None,
                type_label: None,
                label: Some(labels::with_type(ctx.host, key, &ty)),
                inspect: !matches!(ty.kind, crate::host::TypeKind::Bool) && !ty.is_enum(),
            }
        }
    }
}

/// Which slot an entry reads and writes
#[derive(Debug, Clone)]
pub enum EntryKind {
    Member(MemberSlot),
    ListSlot { index: usize },
    DictSlot(DictSlot),
    Config { key: String },
}

/// Whatever holds the slots of a set of entries
pub trait EntryOwner {
    fn read(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind) -> Result<Value, InspectError>;

    fn write(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind, value: Value) -> Result<(), InspectError>;
}

/// Owner of the entries of a list or dictionary editor
#[derive(Debug, Clone, Default)]
pub struct ContainerOwner {
    pub container: Value,
    /// The holder can be written and the container is not read-only
    pub can_write: bool,
}

impl EntryOwner for ContainerOwner {
    fn read(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind) -> Result<Value, InspectError> {
        match kind {
            EntryKind::ListSlot { index } => {
                let label = format!("[{index}]");
                let mut items: Vec<Value> = ctx
                    .host
                    .iter_sequence(&self.container)
                    .map_err(|e| InspectError::evaluation(&label, e))?
                    .collect();
                if *index >= items.len() {
                    let count = items.len();
                    return Err(InspectError::evaluation(
                        &label,
                        HostError::IndexOutOfRange { index: *index, count },
                    ));
                }
                Ok(items.swap_remove(*index))
            }
            EntryKind::DictSlot(slot) => {
                let label = format!("[{}]", slot.key);
                let mut pairs = ctx
                    .host
                    .iter_map(&self.container)
                    .map_err(|e| InspectError::evaluation(&label, e))?;
                pairs
                    .find(|(k, _)| *k == slot.key)
                    .map(|(_, v)| v)
                    .ok_or_else(|| InspectError::evaluation(&label, HostError::KeyNotFound(slot.key.to_string())))
            }
            _ => Err(InspectError::unsupported("Only collection slots belong to a collection editor")),
        }
    }

    fn write(&mut self, ctx: &InspectContext<'_>, kind: &EntryKind, value: Value) -> Result<(), InspectError> {
        match kind {
            EntryKind::ListSlot { index } => ctx
                .host
                .set_index(&self.container, *index, value)
                .map_err(|e| InspectError::write(&format!("[{index}]"), e)),
            EntryKind::DictSlot(slot) => {
                let label = format!("[{}]", slot.key);
                let present = ctx
                    .host
                    .contains_key(&self.container, &slot.key)
                    .map_err(|e| InspectError::write(&label, e))?;
                if !present {
                    return Err(InspectError::write(&label, HostError::KeyNotFound(slot.key.to_string())));
                }
                ctx.host
                    .set_key(&self.container, &slot.key, value)
                    .map_err(|e| InspectError::write(&label, e))
            }
            _ => Err(InspectError::unsupported("Only collection slots belong to a collection editor")),
        }
    }
}

/// User actions on one entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction {
    /// Evaluate button: read the slot again using the current arguments
    Evaluate,
    /// Apply button of the inline input
    ApplyInput(String),
    SetToggle(bool),
    /// Write a value directly (paste, write-back from a child inspector)
    SetValue(Value),
    ToggleSubContent,
    ToggleArguments,
    SetArgument { index: usize, text: String },
    SetGenericArgument { index: usize, text: String },
    PasteArgument { index: usize, value: Value },
    /// Input for the nested editor
    Edit(EditorInput),
    /// Apply button of the nested editor
    ApplyEditor,
}

impl EntryAction {
    fn writes(&self) -> bool {
        matches!(
            self,
            EntryAction::ApplyInput(_) | EntryAction::SetToggle(_) | EntryAction::SetValue(_) | EntryAction::ApplyEditor
        )
    }
}

#[derive(Debug)]
pub struct CacheEntry {
    pub kind: EntryKind,
    pub value: Value,
    pub fallback_type: TypeRef,
    /// Type the state was computed from
    pub current_type: TypeRef,
    pub state: ValueState,
    pub last_error: Option<HostError>,
    pub can_write: bool,
    pub nested: Option<InteractiveValue>,
    pub sub_content_open: bool,
    /// The editor missed a value change while collapsed
    pending_value: bool,
    /// Cell currently showing this entry
    pub cell: Option<usize>,
    pub name_label: String,
    pub filter_name: String,
    pub value_label: Option<String>,
}

impl CacheEntry {
    fn with_kind(kind: EntryKind, fallback_type: TypeRef, can_write: bool, name_label: String) -> Self {
        let mut entry = Self {
            kind,
            value: Value::Null,
            current_type: fallback_type.clone(),
            fallback_type,
            state: ValueState::NotEvaluated,
            last_error: None,
            can_write,
            nested: None,
            sub_content_open: false,
            pending_value: false,
            cell: None,
            filter_name: name_label.clone(),
            name_label,
            value_label: None,
        };
        entry.value_label = Some(entry.not_evaluated_label());
        entry
    }

    pub fn member(descriptor: Arc<MemberDescriptor>) -> Self {
        let mut entry = Self::with_kind(
            EntryKind::Member(MemberSlot::new(descriptor.clone())),
            descriptor.value_type(),
            descriptor.can_write(),
            descriptor.name_label.clone(),
        );
        entry.filter_name = descriptor.filter_name.clone();
        entry
    }

    pub fn list_slot(index: usize, element_type: TypeRef, can_write: bool) -> Self {
        Self::with_kind(EntryKind::ListSlot { index }, element_type, can_write, format!("{index}:"))
    }

    pub fn dict_slot(slot: DictSlot, value_type: TypeRef, can_write: bool) -> Self {
        let name = format!("{}:", slot.index);
        Self::with_kind(EntryKind::DictSlot(slot), value_type, can_write, name)
    }

    pub fn config(key: &str, value_type: TypeRef) -> Self {
        Self::with_kind(EntryKind::Config { key: key.to_string() }, value_type, true, key.to_string())
    }

    fn not_evaluated_label(&self) -> String {
        format!("{} ({})", labels::NOT_YET_EVALUATED, labels::type_label(&self.fallback_type))
    }

    pub fn descriptor(&self) -> Option<&Arc<MemberDescriptor>> {
        match &self.kind {
            EntryKind::Member(slot) => Some(&slot.descriptor),
            _ => None,
        }
    }

    pub fn arguments(&self) -> Option<&ArgumentInputs> {
        match &self.kind {
            EntryKind::Member(slot) => slot.arguments.as_ref(),
            _ => None,
        }
    }

    fn arguments_mut(&mut self) -> Result<&mut ArgumentInputs, InspectError> {
        let name = self.name_label.clone();
        match &mut self.kind {
            EntryKind::Member(MemberSlot {
                arguments: Some(arguments),
                ..
            }) => Ok(arguments),
            _ => Err(InspectError::unsupported(format!("{name} takes no arguments"))),
        }
    }

    pub fn should_auto_evaluate(&self) -> bool {
        match &self.kind {
            EntryKind::Member(slot) => slot.descriptor.should_auto_evaluate(),
            _ => true,
        }
    }

    pub fn has_arguments(&self) -> bool {
        self.descriptor().map(|d| d.has_arguments()).unwrap_or(false)
    }

    pub fn is_static(&self) -> bool {
        self.descriptor().map(|d| d.is_static()).unwrap_or(false)
    }

    pub fn dict_key(&self) -> Option<&Value> {
        match &self.kind {
            EntryKind::DictSlot(slot) => Some(&slot.key),
            _ => None,
        }
    }

    /// Moves a collection entry to another position without touching its value
    pub fn set_index(&mut self, index: usize) {
        match &mut self.kind {
            EntryKind::ListSlot { index: i } => *i = index,
            EntryKind::DictSlot(slot) => slot.index = index,
            _ => return,
        }
        self.name_label = format!("{index}:");
        self.filter_name = self.name_label.clone();
    }

    pub fn set_fallback_type(&mut self, ty: TypeRef) {
        self.fallback_type = ty;
        if self.state == ValueState::NotEvaluated {
            self.value_label = Some(self.not_evaluated_label());
        }
    }

    pub fn owner_view(&self) -> OwnerView {
        OwnerView {
            name: self.name_label.clone(),
            state: self.state,
            can_write: self.can_write,
            error: self.last_error.as_ref().map(|e| e.to_string()),
            value_type: self.current_type.clone(),
        }
    }

    /// Reads the slot through `owner`. Host failures put the entry into the
    /// `Exception` state; unparseable arguments abort without touching it.
    pub fn evaluate(&mut self, ctx: &mut InspectContext<'_>, owner: &mut dyn EntryOwner) -> Result<(), InspectError> {
        match owner.read(ctx, &self.kind) {
            Ok(value) => {
                self.last_error = None;
                self.set_value_from_source(ctx, value);
                Ok(())
            }
            Err(InspectError::Evaluation { member, source }) => {
                debug!("Exception evaluating {member}: {source}");
                self.last_error = Some(source);
                self.set_value_from_source(ctx, Value::Null);
                Ok(())
            }
            Err(e) => {
                warn!("{e}");
                Err(e)
            }
        }
    }

    /// The only place the entry value changes
    pub fn set_value_from_source(&mut self, ctx: &mut InspectContext<'_>, value: Value) {
        self.value = if ctx.host.is_alive(&value) { value } else { Value::Null };
        self.process_on_evaluate(ctx);

        if self.nested.is_some() {
            if self.sub_content_open {
                let view = self.owner_view();
                if let Some(editor) = self.nested.as_mut() {
                    editor.set_value(ctx, &self.value, &view);
                }
            } else {
                self.pending_value = true;
            }
        }
    }

    fn process_on_evaluate(&mut self, ctx: &mut InspectContext<'_>) {
        let previous = self.state;
        if self.last_error.is_some() {
            self.state = ValueState::Exception;
            self.current_type = self.fallback_type.clone();
        } else {
            let (state, ty) = ctx
                .classifier()
                .classify_value(&self.value, &self.fallback_type, false);
            self.state = state;
            self.current_type = ty;
        }

        if self.nested.is_some()
            && (self.state != previous || (!self.state.keeps_editor_when_null() && self.value.is_null()))
        {
            self.release_editor(ctx.editors);
        }

        self.value_label = labels::value_label(
            ctx.host,
            self.state,
            &self.value,
            &self.fallback_type,
            self.last_error.as_ref(),
        );
    }

    /// Writes a user supplied value, then reads the slot back so the entry
    /// shows what the host actually stored
    pub fn set_user_value(
        &mut self,
        ctx: &mut InspectContext<'_>,
        owner: &mut dyn EntryOwner,
        value: Value,
    ) -> Result<(), InspectError> {
        let value = value.clone().coerce_to(&self.fallback_type).unwrap_or(value);
        let written = owner.write(ctx, &self.kind, value);
        if let Err(e) = &written {
            warn!("{e}");
        }
        self.evaluate(ctx, owner)?;
        written
    }

    /// Returns `false` when the entry has nothing to show until the user evaluates it
    fn try_auto_evaluate(
        &mut self,
        ctx: &mut InspectContext<'_>,
        owner: &mut dyn EntryOwner,
        view: &mut CellView,
    ) -> bool {
        let auto = self.should_auto_evaluate();
        if !auto {
            view.evaluate_button = Some(match self.arguments() {
                Some(arguments) if arguments.open => "Hide".to_string(),
                Some(arguments) => format!("Evaluate ({})", arguments.count()),
                None => "Evaluate".to_string(),
            });
        }
        if self.state == ValueState::NotEvaluated {
            if !auto {
                return false;
            }
            if let Err(e) = self.evaluate(ctx, owner) {
                debug!("Auto evaluate of {} aborted: {e}", self.name_label);
            }
        }
        true
    }

    /// Rebuilds `view` from scratch for this entry
    pub fn set_data_to_cell(&mut self, ctx: &mut InspectContext<'_>, owner: &mut dyn EntryOwner, view: &mut CellView) {
        *view = CellView::default();
        view.name = self.name_label.clone();

        let evaluated = self.try_auto_evaluate(ctx, owner, view);
        view.sub_content_open = self.sub_content_open && self.nested.is_some();
        view.copy = !matches!(self.state, ValueState::NotEvaluated | ValueState::Exception);
        view.paste = view.copy && self.can_write;
        if let EntryKind::DictSlot(slot) = &self.kind {
            view.key = Some(slot.key_view.clone());
        }

        if !evaluated {
            self.apply_state_args(view, ValueStateArgs::DEFAULT);
            return;
        }
        let args = ValueStateArgs::for_state(
            self.state,
            self.can_write,
            parse::can_parse(&self.current_type),
            self.value.is_null(),
        );
        self.apply_state_args(view, args);
    }

    fn apply_state_args(&self, view: &mut CellView, args: ValueStateArgs) {
        let is_null = self.value.is_null();
        if args.value_label {
            view.value_label = self.value_label.clone();
        }
        if args.type_label {
            view.type_label = Some(labels::type_label(&self.current_type));
        }
        if args.toggle {
            view.toggle = Some(ToggleView {
                on: self.value.as_bool().unwrap_or(false),
                interactable: self.can_write,
                text: self.value.to_string(),
            });
        }
        if args.input {
            view.input = Some(InputView {
                text: parse::to_input_text(&self.value),
                read_only: !self.can_write,
            });
        }
        view.apply = args.apply;
        view.inspect = args.inspect && !is_null;
        view.expand = args.expand
            && (!is_null || matches!(self.state, ValueState::String | ValueState::Exception));
    }

    /// Expand button: borrows an editor for the current state, or shows/hides the one it has
    pub fn toggle_sub_content(&mut self, ctx: &mut InspectContext<'_>) {
        if self.nested.is_none() {
            let Some(kind) = EditorKind::for_state(self.state) else {
                return;
            };
            let mut editor = ctx.editors.borrow(kind, ctx.config.viewport_rows);
            let view = self.owner_view();
            editor.on_borrowed(&view);
            editor.set_value(ctx, &self.value, &view);
            self.nested = Some(editor);
            self.sub_content_open = true;
            self.pending_value = false;
            return;
        }

        self.sub_content_open = !self.sub_content_open;
        if self.sub_content_open && self.pending_value {
            self.pending_value = false;
            let view = self.owner_view();
            if let Some(editor) = self.nested.as_mut() {
                editor.set_value(ctx, &self.value, &view);
            }
        }
    }

    fn release_editor(&mut self, pool: &mut EditorPool) {
        if let Some(editor) = self.nested.take() {
            pool.give_back(editor);
        }
        self.sub_content_open = false;
        self.pending_value = false;
    }

    /// Returns pooled resources before the entry is dropped or recycled
    pub fn release(&mut self, pool: &mut EditorPool) {
        self.release_editor(pool);
        self.cell = None;
    }

    /// Runs one user action. Returns whether the slot was written.
    pub fn perform(
        &mut self,
        ctx: &mut InspectContext<'_>,
        owner: &mut dyn EntryOwner,
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        if action.writes() && !self.can_write {
            return Err(InspectError::unsupported(format!("{} is read-only", self.name_label)));
        }
        match action {
            EntryAction::Evaluate => {
                self.evaluate(ctx, owner)?;
                Ok(false)
            }
            EntryAction::ApplyInput(text) => {
                let value = parse::parse(&text, &self.current_type, ctx.host).map_err(|e| {
                    let err = InspectError::argument(&self.name_label, e);
                    warn!("Unable to parse input! {err}");
                    err
                })?;
                self.set_user_value(ctx, owner, value)?;
                Ok(true)
            }
            EntryAction::SetToggle(on) => {
                if self.state != ValueState::Boolean {
                    return Err(InspectError::unsupported(format!("{} is not a boolean", self.name_label)));
                }
                self.set_user_value(ctx, owner, Value::Bool(on))?;
                Ok(true)
            }
            EntryAction::SetValue(value) => {
                self.set_user_value(ctx, owner, value)?;
                Ok(true)
            }
            EntryAction::ToggleSubContent => {
                self.toggle_sub_content(ctx);
                Ok(false)
            }
            EntryAction::ToggleArguments => {
                let arguments = self.arguments_mut()?;
                arguments.open = !arguments.open;
                Ok(false)
            }
            EntryAction::SetArgument { index, text } => {
                self.arguments_mut()?.set_input(index, &text)?;
                Ok(false)
            }
            EntryAction::SetGenericArgument { index, text } => {
                self.arguments_mut()?.set_generic_input(index, &text)?;
                Ok(false)
            }
            EntryAction::PasteArgument { index, value } => {
                self.arguments_mut()?.paste(index, value)?;
                Ok(false)
            }
            EntryAction::Edit(input) => {
                let editor = self.editor_mut()?;
                editor.input(ctx, input)?;
                Ok(false)
            }
            EntryAction::ApplyEditor => {
                let Some(value) = self.editor_mut()?.apply(ctx)? else {
                    return Ok(false);
                };
                self.set_user_value(ctx, owner, value)?;
                Ok(true)
            }
        }
    }

    fn editor_mut(&mut self) -> Result<&mut InteractiveValue, InspectError> {
        let name = self.name_label.clone();
        self.nested
            .as_mut()
            .ok_or_else(|| InspectError::unsupported(format!("{name} has no open editor")))
    }

    /// Routes an action to this entry (empty `path`) or into its nested
    /// collection editor. A write below a writable entry is written back to
    /// this entry's own slot so value-type holders see the change.
    pub fn dispatch(
        &mut self,
        ctx: &mut InspectContext<'_>,
        owner: &mut dyn EntryOwner,
        path: &[usize],
        action: EntryAction,
    ) -> Result<bool, InspectError> {
        let Some((&index, rest)) = path.split_first() else {
            return self.perform(ctx, owner, action);
        };
        let editor = self
            .nested
            .as_mut()
            .ok_or_else(|| InspectError::NoSuchEntry(path.to_vec()))?;
        let wrote = editor.dispatch(ctx, index, rest, action)?;
        if wrote && self.can_write {
            let container = self.value.clone();
            self.set_user_value(ctx, owner, container)?;
        }
        Ok(wrote)
    }

    /// Entry inside the nested collection editor at `path`
    pub fn entry_at(&self, path: &[usize]) -> Option<&CacheEntry> {
        match path.split_first() {
            None => Some(self),
            Some((&index, rest)) => self.nested.as_ref()?.entry(index)?.entry_at(rest),
        }
    }
}

/// Binds a controller's entries to the cells of its pool.
///
/// `order` maps display positions to entry indices when the controller
/// filters its entries.
pub struct EntryBinder<'a, 'c> {
    pub ctx: &'a mut InspectContext<'c>,
    pub entries: &'a mut [CacheEntry],
    pub owner: &'a mut dyn EntryOwner,
    pub order: Option<&'a [usize]>,
}

impl<'a, 'c> EntryBinder<'a, 'c> {
    fn unlink(&mut self, cell_id: usize, cell: &CacheCell) {
        if let Some(previous) = cell.occupant {
            if let Some(entry) = self.entries.get_mut(previous) {
                if entry.cell == Some(cell_id) {
                    entry.cell = None;
                }
            }
        }
    }
}

impl<'a, 'c> CellPoolDataSource<CacheCell> for EntryBinder<'a, 'c> {
    fn item_count(&self) -> usize {
        self.order.map(|o| o.len()).unwrap_or(self.entries.len())
    }

    fn set_cell(&mut self, cell_id: usize, cell: &mut CacheCell, index: usize) {
        let entry_index = match self.order {
            Some(order) => match order.get(index) {
                Some(i) => *i,
                None => {
                    warn!("Cell {cell_id} asked for filtered row {index} past the end");
                    cell.disable();
                    return;
                }
            },
            None => index,
        };
        self.unlink(cell_id, cell);
        let Some(entry) = self.entries.get_mut(entry_index) else {
            warn!("Cell {cell_id} asked for missing entry {entry_index}");
            cell.disable();
            return;
        };
        entry.cell = Some(cell_id);
        cell.occupant = Some(entry_index);
        cell.enabled = true;
        entry.set_data_to_cell(self.ctx, self.owner, &mut cell.view);
    }

    fn disable_cell(&mut self, cell_id: usize, cell: &mut CacheCell) {
        self.unlink(cell_id, cell);
        cell.disable();
    }
}
