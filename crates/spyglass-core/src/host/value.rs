use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{ColorRepr, NumberKind, TypeKind, TypeRef};

/// Identity of a reference-typed host object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", &self.0.to_string()[..8])
    }
}

/// Reference to a live host object together with its runtime type
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Number {
    pub fn kind(&self) -> NumberKind {
        match self {
            Number::I8(_) => NumberKind::I8,
            Number::I16(_) => NumberKind::I16,
            Number::I32(_) => NumberKind::I32,
            Number::I64(_) => NumberKind::I64,
            Number::U8(_) => NumberKind::U8,
            Number::U16(_) => NumberKind::U16,
            Number::U32(_) => NumberKind::U32,
            Number::U64(_) => NumberKind::U64,
            Number::F32(_) => NumberKind::F32,
            Number::F64(_) => NumberKind::F64,
        }
    }

    pub fn zero(kind: NumberKind) -> Self {
        match kind {
            NumberKind::I8 => Number::I8(0),
            NumberKind::I16 => Number::I16(0),
            NumberKind::I32 => Number::I32(0),
            NumberKind::I64 => Number::I64(0),
            NumberKind::U8 => Number::U8(0),
            NumberKind::U16 => Number::U16(0),
            NumberKind::U32 => Number::U32(0),
            NumberKind::U64 => Number::U64(0),
            NumberKind::F32 => Number::F32(0.0),
            NumberKind::F64 => Number::F64(0.0),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::I8(v) => v as f64,
            Number::I16(v) => v as f64,
            Number::I32(v) => v as f64,
            Number::I64(v) => v as f64,
            Number::U8(v) => v as f64,
            Number::U16(v) => v as f64,
            Number::U32(v) => v as f64,
            Number::U64(v) => v as f64,
            Number::F32(v) => v as f64,
            Number::F64(v) => v,
        }
    }

    /// Integer value, if this is an integral kind
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Number::I8(v) => v as i128,
            Number::I16(v) => v as i128,
            Number::I32(v) => v as i128,
            Number::I64(v) => v as i128,
            Number::U8(v) => v as i128,
            Number::U16(v) => v as i128,
            Number::U32(v) => v as i128,
            Number::U64(v) => v as i128,
            Number::F32(_) | Number::F64(_) => return None,
        })
    }

    fn from_i128(value: i128, kind: NumberKind) -> Option<Self> {
        Some(match kind {
            NumberKind::I8 => Number::I8(i8::try_from(value).ok()?),
            NumberKind::I16 => Number::I16(i16::try_from(value).ok()?),
            NumberKind::I32 => Number::I32(i32::try_from(value).ok()?),
            NumberKind::I64 => Number::I64(i64::try_from(value).ok()?),
            NumberKind::U8 => Number::U8(u8::try_from(value).ok()?),
            NumberKind::U16 => Number::U16(u16::try_from(value).ok()?),
            NumberKind::U32 => Number::U32(u32::try_from(value).ok()?),
            NumberKind::U64 => Number::U64(u64::try_from(value).ok()?),
            NumberKind::F32 => Number::F32(value as f32),
            NumberKind::F64 => Number::F64(value as f64),
        })
    }

    /// Converts to another kind. Integral targets reject fractional or out-of-range sources.
    pub fn cast(&self, kind: NumberKind) -> Option<Self> {
        if self.kind() == kind {
            return Some(*self);
        }
        if let Some(int) = self.as_i128() {
            return Self::from_i128(int, kind);
        }
        let float = self.as_f64();
        match kind {
            NumberKind::F32 => Some(Number::F32(float as f32)),
            NumberKind::F64 => Some(Number::F64(float)),
            _ if float.fract() == 0.0 && float.is_finite() => Self::from_i128(float as i128, kind),
            _ => None,
        }
    }

    /// Parses `text` as `kind`. Integral kinds are range checked.
    pub fn parse(text: &str, kind: NumberKind) -> Option<Self> {
        let text = text.trim();
        match kind {
            NumberKind::F32 => text.parse::<f32>().ok().map(Number::F32),
            NumberKind::F64 => text.parse::<f64>().ok().map(Number::F64),
            _ => {
                let value = text.parse::<i128>().ok()?;
                Self::from_i128(value, kind)
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I8(v) => write!(f, "{v}"),
            Number::I16(v) => write!(f, "{v}"),
            Number::I32(v) => write!(f, "{v}"),
            Number::I64(v) => write!(f, "{v}"),
            Number::U8(v) => write!(f, "{v}"),
            Number::U16(v) => write!(f, "{v}"),
            Number::U32(v) => write!(f, "{v}"),
            Number::U64(v) => write!(f, "{v}"),
            Number::F32(v) => write!(f, "{v}"),
            Number::F64(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Color32> for ColorF {
    fn from(c: Color32) -> Self {
        ColorF {
            r: c.r as f32 / 255.0,
            g: c.g as f32 / 255.0,
            b: c.b as f32 / 255.0,
            a: c.a as f32 / 255.0,
        }
    }
}

impl From<ColorF> for Color32 {
    fn from(c: ColorF) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color32 {
            r: channel(c.r),
            g: channel(c.g),
            b: channel(c.b),
            a: channel(c.a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Float(ColorF),
    Byte(Color32),
}

impl Color {
    pub fn repr(&self) -> ColorRepr {
        match self {
            Color::Float(_) => ColorRepr::Float,
            Color::Byte(_) => ColorRepr::Byte,
        }
    }

    /// Channel values in the representation's own range
    pub fn channels(&self) -> [f32; 4] {
        match *self {
            Color::Float(c) => [c.r, c.g, c.b, c.a],
            Color::Byte(c) => [c.r as f32, c.g as f32, c.b as f32, c.a as f32],
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Float(c) => write!(f, "RGBA({:.3}, {:.3}, {:.3}, {:.3})", c.r, c.g, c.b, c.a),
            Color::Byte(c) => write!(f, "RGBA({}, {}, {}, {})", c.r, c.g, c.b, c.a),
        }
    }
}

/// Boxed copy of a user-defined value type; fields follow the declared instance field order
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub ty: TypeRef,
    pub fields: Vec<Value>,
}

/// A value read from or written to the host
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Enum { ty: TypeRef, bits: i64 },
    Color(Color),
    Struct(StructValue),
    Type(TypeRef),
    Object(ObjectRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn i32(v: i32) -> Self {
        Value::Number(Number::I32(v))
    }

    pub fn f32(v: f32) -> Self {
        Value::Number(Number::F32(v))
    }

    pub fn str(v: impl Into<String>) -> Self {
        Value::Str(v.into())
    }

    /// Most derived runtime type; `None` for null
    pub fn runtime_type(&self) -> Option<TypeRef> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => TypeRef::bool(),
            Value::Number(n) => TypeRef::number(n.kind()),
            Value::Str(_) => TypeRef::string(),
            Value::Enum { ty, .. } => ty.clone(),
            Value::Color(Color::Float(_)) => TypeRef::color(),
            Value::Color(Color::Byte(_)) => TypeRef::color32(),
            Value::Struct(s) => s.ty.clone(),
            Value::Type(_) => TypeRef::meta_type(),
            Value::Object(obj) => obj.ty.clone(),
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts this value so it can be stored in a slot declared as `target`.
    /// Returns `None` when no lossless conversion exists.
    pub fn coerce_to(self, target: &TypeRef) -> Option<Value> {
        match (&target.kind, self) {
            (_, Value::Null) => {
                if target.is_value_type() {
                    None
                } else {
                    Some(Value::Null)
                }
            }
            (TypeKind::Object | TypeKind::GenericParam, v) => Some(v),
            (TypeKind::Number(kind), Value::Number(n)) => n.cast(*kind).map(Value::Number),
            (TypeKind::Enum(_), Value::Number(n)) => n.as_i128().and_then(|bits| {
                Some(Value::Enum {
                    ty: target.clone(),
                    bits: i64::try_from(bits).ok()?,
                })
            }),
            (TypeKind::Color(ColorRepr::Float), Value::Color(Color::Byte(c))) => {
                Some(Value::Color(Color::Float(c.into())))
            }
            (TypeKind::Color(ColorRepr::Byte), Value::Color(Color::Float(c))) => {
                Some(Value::Color(Color::Byte(c.into())))
            }
            (_, v) => match v.runtime_type() {
                Some(ty) if ty.is_assignable_to(target) => Some(v),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Enum { ty, bits } => match ty.enum_info() {
                Some(info) => f.write_str(&enum_display(info, *bits)),
                None => write!(f, "{bits}"),
            },
            Value::Color(c) => write!(f, "{c}"),
            Value::Struct(s) => {
                let fields: Vec<String> = s.fields.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", fields.join(", "))
            }
            Value::Type(t) => f.write_str(&t.name),
            Value::Object(obj) => write!(f, "{} {}", obj.ty.display_name(), obj.id),
        }
    }
}

/// Renders enum bits as a name, a comma separated flag list, or the raw number
pub fn enum_display(info: &super::types::EnumInfo, bits: i64) -> String {
    if let Some(name) = info.name_of(bits) {
        return name.to_string();
    }
    if info.is_flags && bits != 0 {
        let mut remaining = bits;
        let mut names = Vec::new();
        for (name, value) in &info.variants {
            if *value != 0 && remaining & value == *value && !names.contains(&name.as_str()) {
                names.push(name.as_str());
                remaining &= !value;
            }
        }
        if remaining == 0 {
            return names.join(", ");
        }
    }
    bits.to_string()
}

#[cfg(test)]
mod tests {
    use super::super::types::{EnumInfo, TypeInfo};
    use super::*;

    #[test]
    fn test_number_parse_is_range_checked() {
        assert_eq!(Number::parse("12", NumberKind::I32), Some(Number::I32(12)));
        assert_eq!(Number::parse(" -3 ", NumberKind::I8), Some(Number::I8(-3)));
        assert_eq!(Number::parse("300", NumberKind::U8), None);
        assert_eq!(Number::parse("1.5", NumberKind::I32), None);
        assert_eq!(Number::parse("1.5", NumberKind::F32), Some(Number::F32(1.5)));
    }

    #[test]
    fn test_number_cast() {
        assert_eq!(Number::I32(7).cast(NumberKind::F64), Some(Number::F64(7.0)));
        assert_eq!(Number::F32(2.0).cast(NumberKind::I16), Some(Number::I16(2)));
        assert_eq!(Number::F32(2.5).cast(NumberKind::I16), None);
        assert_eq!(Number::I32(-1).cast(NumberKind::U32), None);
    }

    #[test]
    fn test_coerce_null_into_value_type_fails() {
        assert_eq!(Value::Null.coerce_to(&TypeRef::bool()), None);
        assert_eq!(Value::Null.coerce_to(&TypeRef::string()), Some(Value::Null));
        assert_eq!(
            Value::i32(4).coerce_to(&TypeRef::number(NumberKind::F32)),
            Some(Value::f32(4.0))
        );
        assert_eq!(Value::str("x").coerce_to(&TypeRef::bool()), None);
    }

    #[test]
    fn test_enum_display_for_flags() {
        let info = EnumInfo::new(&[("None", 0), ("Fire", 1), ("Ice", 2), ("Poison", 4)], true);
        assert_eq!(enum_display(&info, 0), "None");
        assert_eq!(enum_display(&info, 3), "Fire, Ice");
        assert_eq!(enum_display(&info, 8), "8");

        let ty = TypeRef::new(TypeInfo::new("Game.Damage", TypeKind::Enum(info)));
        assert_eq!(Value::Enum { ty, bits: 5 }.to_string(), "Fire, Poison");
    }

    #[test]
    fn test_color_conversion_rounds() {
        let c: Color32 = ColorF { r: 1.0, g: 0.5, b: 0.0, a: 2.0 }.into();
        assert_eq!(c, Color32 { r: 255, g: 128, b: 0, a: 255 });
    }
}
