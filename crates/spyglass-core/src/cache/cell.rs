//! Render-agnostic view descriptors produced when an entry is bound to a cell.

use crate::classify::ValueState;
use crate::pool::PoolCell;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToggleView {
    pub on: bool,
    pub interactable: bool,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputView {
    pub text: String,
    pub read_only: bool,
}

/// Key column of a dictionary row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyView {
    /// Parseable keys are shown as text with their type
    pub input: Option<InputView>,
    pub type_label: Option<String>,
    /// Everything else gets a plain label
    pub label: Option<String>,
    pub inspect: bool,
}

/// What one row shows. Rebuilt from scratch on every bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellView {
    pub name: String,
    pub value_label: Option<String>,
    pub type_label: Option<String>,
    pub toggle: Option<ToggleView>,
    pub input: Option<InputView>,
    pub key: Option<KeyView>,
    /// Label of the evaluate button for members that do not evaluate on their own
    pub evaluate_button: Option<String>,
    pub apply: bool,
    pub inspect: bool,
    pub expand: bool,
    pub sub_content_open: bool,
    pub copy: bool,
    pub paste: bool,
}

/// Which widgets of a cell are active for a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueStateArgs {
    pub value_label: bool,
    pub type_label: bool,
    pub toggle: bool,
    pub input: bool,
    pub apply: bool,
    pub inspect: bool,
    pub expand: bool,
}

impl ValueStateArgs {
    pub const DEFAULT: ValueStateArgs = ValueStateArgs {
        value_label: true,
        type_label: false,
        toggle: false,
        input: false,
        apply: false,
        inspect: false,
        expand: false,
    };

    /// Affordances per state. `parseable` is whether the current value type
    /// can be typed in as a single line.
    pub fn for_state(state: ValueState, can_write: bool, parseable: bool, is_null: bool) -> Self {
        let base = Self::DEFAULT;
        match state {
            ValueState::NotEvaluated => base,
            ValueState::Exception => Self { expand: true, ..base },
            ValueState::Boolean => Self {
                value_label: false,
                toggle: true,
                apply: can_write,
                ..base
            },
            ValueState::Number => Self {
                value_label: false,
                type_label: true,
                input: true,
                apply: can_write,
                ..base
            },
            ValueState::String => Self { expand: true, ..base },
            ValueState::Enum => Self {
                expand: can_write,
                ..base
            },
            ValueState::Color | ValueState::ValueStruct if parseable => Self {
                value_label: false,
                type_label: true,
                input: true,
                apply: can_write,
                inspect: true,
                expand: true,
                ..base
            },
            ValueState::Color | ValueState::ValueStruct => Self {
                inspect: true,
                expand: true,
                ..base
            },
            ValueState::Collection | ValueState::Dictionary => Self {
                inspect: !is_null,
                expand: !is_null,
                ..base
            },
            ValueState::Unsupported => Self {
                inspect: !is_null,
                ..base
            },
        }
    }
}

/// Pooled row bound to at most one entry at a time
#[derive(Debug, Clone, Default)]
pub struct CacheCell {
    /// Index of the entry currently shown
    pub occupant: Option<usize>,
    pub enabled: bool,
    pub view: CellView,
}

impl PoolCell for CacheCell {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.occupant = None;
        self.view = CellView::default();
    }
}
