//! Text <-> value conversion for everything that can be typed into a cell.

use thiserror::Error;

use crate::host::value::enum_display;
use crate::host::{
    Color, Color32, ColorF, ColorRepr, Number, Reflection, TypeKind, TypeRef, Value,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Could not parse '{input}' as {type_name}")]
    Invalid { input: String, type_name: String },

    #[error("No type named '{0}' is loaded")]
    UnknownType(String),

    #[error("Values of type {0} cannot be entered as text")]
    Unsupported(String),
}

impl ParseError {
    fn invalid(input: &str, ty: &TypeRef) -> Self {
        Self::Invalid {
            input: input.to_string(),
            type_name: ty.display_name(),
        }
    }
}

/// Keyword aliases accepted wherever a type name is typed
pub const SHORTHAND_TYPES: &[(&str, &str)] = &[
    ("object", "object"),
    ("string", "string"),
    ("bool", "bool"),
    ("byte", "u8"),
    ("sbyte", "i8"),
    ("short", "i16"),
    ("ushort", "u16"),
    ("int", "i32"),
    ("uint", "u32"),
    ("long", "i64"),
    ("ulong", "u64"),
    ("float", "f32"),
    ("double", "f64"),
    ("void", "void"),
];

/// Resolves a shorthand alias such as `int` to its host type name
pub fn shorthand(name: &str) -> Option<&'static str> {
    SHORTHAND_TYPES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, full)| *full)
}

/// Looks a type up by full name, short name or shorthand alias
pub fn resolve_type_name(host: &dyn Reflection, name: &str) -> Result<TypeRef, ParseError> {
    let name = name.trim();
    host.type_by_name(name)
        .or_else(|| shorthand(name).and_then(|full| host.type_by_name(full)))
        .ok_or_else(|| ParseError::UnknownType(name.to_string()))
}

/// Whether values of `ty` can round-trip through a single line of text
pub fn can_parse(ty: &TypeRef) -> bool {
    matches!(
        ty.kind,
        TypeKind::Bool
            | TypeKind::Number(_)
            | TypeKind::String
            | TypeKind::Enum(_)
            | TypeKind::Color(_)
            | TypeKind::MetaType
    )
}

pub fn parse(input: &str, ty: &TypeRef, host: &dyn Reflection) -> Result<Value, ParseError> {
    match &ty.kind {
        TypeKind::String => Ok(Value::Str(input.to_string())),
        TypeKind::Bool => match input.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ParseError::invalid(input, ty)),
        },
        TypeKind::Number(kind) => Number::parse(input, *kind)
            .map(Value::Number)
            .ok_or_else(|| ParseError::invalid(input, ty)),
        TypeKind::Enum(info) => {
            let text = input.trim();
            if let Ok(bits) = text.parse::<i64>() {
                return Ok(Value::Enum { ty: ty.clone(), bits });
            }
            let mut bits = 0;
            for name in text.split(',').map(str::trim) {
                bits |= info
                    .value_of(name)
                    .ok_or_else(|| ParseError::invalid(input, ty))?;
            }
            Ok(Value::Enum { ty: ty.clone(), bits })
        }
        TypeKind::Color(repr) => parse_color(input, *repr).ok_or_else(|| ParseError::invalid(input, ty)),
        TypeKind::MetaType => resolve_type_name(host, input).map(Value::Type),
        _ => Err(ParseError::Unsupported(ty.display_name())),
    }
}

fn parse_color(input: &str, repr: ColorRepr) -> Option<Value> {
    let text = input.trim().trim_start_matches("RGBA").trim_matches(|c| c == '(' || c == ')');
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    match repr {
        ColorRepr::Byte => {
            let mut channels = [255u8; 4];
            for (slot, part) in channels.iter_mut().zip(&parts) {
                *slot = part.parse().ok()?;
            }
            let [r, g, b, a] = channels;
            Some(Value::Color(Color::Byte(Color32 { r, g, b, a })))
        }
        ColorRepr::Float => {
            let mut channels = [1.0f32; 4];
            for (slot, part) in channels.iter_mut().zip(&parts) {
                *slot = part.parse().ok()?;
            }
            let [r, g, b, a] = channels;
            Some(Value::Color(Color::Float(ColorF { r, g, b, a })))
        }
    }
}

/// Text placed in an input field for `value`; the inverse of [`parse`]
pub fn to_input_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Str(s) => s.clone(),
        Value::Enum { ty, bits } => match ty.enum_info() {
            Some(info) => enum_display(info, *bits),
            None => bits.to_string(),
        },
        Value::Color(Color::Float(c)) => format!("{}, {}, {}, {}", c.r, c.g, c.b, c.a),
        Value::Color(Color::Byte(c)) => format!("{}, {}, {}, {}", c.r, c.g, c.b, c.a),
        Value::Type(t) => t.name.clone(),
        Value::Struct(_) | Value::Object(_) => value.to_string(),
    }
}

/// Placeholder hint describing what input a type expects
pub fn example_input(ty: &TypeRef) -> Option<String> {
    Some(match &ty.kind {
        TypeKind::Bool => "true".into(),
        TypeKind::Number(kind) if kind.is_float() => "0.0".into(),
        TypeKind::Number(_) => "0".into(),
        TypeKind::String => String::new(),
        TypeKind::Enum(info) => info
            .variants
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_default(),
        TypeKind::Color(ColorRepr::Float) => "1, 1, 1, 1".into(),
        TypeKind::Color(ColorRepr::Byte) => "255, 255, 255, 255".into(),
        TypeKind::MetaType => "string".into(),
        _ => return None,
    })
}
