//! Display strings for cells.

use crate::classify::ValueState;
use crate::host::{HostError, Reflection, TypeRef, Value};

pub const NOT_YET_EVALUATED: &str = "Not yet evaluated";

/// Cuts `text` to `max_chars` characters and `max_lines` lines, marking the cut with `...`
pub fn prune(text: &str, max_chars: usize, max_lines: usize) -> String {
    let mut out = String::new();
    let mut truncated = false;
    for (line_no, line) in text.split('\n').enumerate() {
        if line_no >= max_lines {
            truncated = true;
            break;
        }
        if line_no > 0 {
            out.push('\n');
        }
        out.push_str(line);
    }
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
        truncated = true;
    }
    if truncated {
        out.push_str("...");
    }
    out
}

pub fn type_label(ty: &TypeRef) -> String {
    ty.display_name()
}

/// `value (Type)`, or just the type when the value describes itself as its type
pub fn with_type(host: &dyn Reflection, value: &Value, fallback: &TypeRef) -> String {
    let ty = host.runtime_type(value).unwrap_or_else(|| fallback.clone());
    let type_name = type_label(&ty);
    if value.is_null() {
        return format!("null ({type_name})");
    }
    let text = prune(&host.describe(value), 200, 5);
    if text.is_empty() || text == ty.name || text == type_name {
        type_name
    } else {
        format!("{text} ({type_name})")
    }
}

fn item_count(host: &dyn Reflection, state: ValueState, value: &Value) -> Option<usize> {
    match state {
        ValueState::Dictionary => host.iter_map(value).ok().map(|it| it.count()),
        ValueState::Collection => host.iter_sequence(value).ok().map(|it| it.count()),
        _ => None,
    }
}

/// Text of the value label; `None` for states that show the value in a widget instead
pub fn value_label(
    host: &dyn Reflection,
    state: ValueState,
    value: &Value,
    fallback: &TypeRef,
    error: Option<&HostError>,
) -> Option<String> {
    match state {
        ValueState::NotEvaluated => Some(format!("{NOT_YET_EVALUATED} ({})", type_label(fallback))),
        ValueState::Exception => Some(error.map(|e| e.to_string()).unwrap_or_default()),
        ValueState::Boolean | ValueState::Number => None,
        ValueState::String => Some(match value.as_str() {
            Some(s) => format!("\"{}\"", prune(s, 200, 5)),
            None => "null".to_string(),
        }),
        ValueState::Collection | ValueState::Dictionary if !value.is_null() => {
            let prefix = item_count(host, state, value)
                .map(|n| format!("[{n}] "))
                .unwrap_or_default();
            Some(format!("{prefix}{}", with_type(host, value, fallback)))
        }
        _ => Some(with_type(host, value, fallback)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, NumberKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prune_limits_chars_and_lines() {
        assert_eq!(prune("short", 200, 5), "short");
        assert_eq!(prune("abcdef", 3, 5), "abc...");
        assert_eq!(prune("1\n2\n3", 200, 2), "1\n2...");
    }

    #[test]
    fn test_value_labels_per_state() {
        let host = MemoryHost::new();
        let int = TypeRef::number(NumberKind::I32);
        assert_eq!(
            value_label(&host, ValueState::NotEvaluated, &Value::Null, &int, None),
            Some("Not yet evaluated (i32)".into())
        );
        assert_eq!(value_label(&host, ValueState::Number, &Value::i32(3), &int, None), None);
        assert_eq!(
            value_label(&host, ValueState::String, &Value::str("hi"), &TypeRef::string(), None),
            Some("\"hi\"".into())
        );
        assert_eq!(
            value_label(
                &host,
                ValueState::Exception,
                &Value::Null,
                &int,
                Some(&HostError::DivideByZero)
            ),
            Some("Attempted to divide by zero.".into())
        );

        let list_ty = host.list_type(&int);
        let list = host.alloc_list(&list_ty, vec![Value::i32(1), Value::i32(2)], false);
        let label = value_label(&host, ValueState::Collection, &list, &list_ty, None).unwrap();
        assert!(label.starts_with("[2] "), "{label}");
    }
}
