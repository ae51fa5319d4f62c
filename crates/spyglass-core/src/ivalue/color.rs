use tracing::debug;

use crate::errors::InspectError;
use crate::host::{Color, Color32, ColorF, Value};

use super::{EditorInput, OwnerView};

pub const CHANNEL_NAMES: [&str; 4] = ["R", "G", "B", "A"];

/// RGBA editor with a text input and a slider per channel.
///
/// Edits accumulate in a unit-range working color shown as the swatch and
/// only reach the owner on apply.
#[derive(Debug, Clone, Default)]
pub struct ColorEditor {
    is_color32: bool,
    edited: ColorF,
    inputs: [String; 4],
    sliders: [f32; 4],
    can_write: bool,
    loaded: bool,
}

impl ColorEditor {
    pub fn is_color32(&self) -> bool {
        self.is_color32
    }

    /// Preview of the working color
    pub fn swatch(&self) -> ColorF {
        self.edited
    }

    pub fn input_text(&self, channel: usize) -> Option<&str> {
        self.inputs.get(channel).map(String::as_str)
    }

    pub fn slider(&self, channel: usize) -> Option<f32> {
        self.sliders.get(channel).copied()
    }

    pub fn slider_max(&self) -> f32 {
        if self.is_color32 {
            255.0
        } else {
            1.0
        }
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        self.can_write = owner.can_write;
    }

    pub fn set_value(&mut self, value: &Value, _owner: &OwnerView) {
        let Value::Color(color) = value else {
            *self = Self {
                can_write: self.can_write,
                ..Self::default()
            };
            return;
        };
        self.loaded = true;
        self.sliders = color.channels();
        match color {
            Color::Byte(c) => {
                self.is_color32 = true;
                self.edited = (*c).into();
                self.inputs = [c.r, c.g, c.b, c.a].map(|v| v.to_string());
            }
            Color::Float(c) => {
                self.is_color32 = false;
                self.edited = *c;
                self.inputs = [c.r, c.g, c.b, c.a].map(|v| v.to_string());
            }
        }
    }

    fn set_channel(&mut self, channel: usize, unit: f32) {
        match channel {
            0 => self.edited.r = unit,
            1 => self.edited.g = unit,
            2 => self.edited.b = unit,
            _ => self.edited.a = unit,
        }
    }

    pub fn input(&mut self, input: EditorInput) -> Result<(), InspectError> {
        if !self.can_write {
            return Err(InspectError::unsupported("Color is read-only"));
        }
        match input {
            EditorInput::ColorText { channel, text } if channel < 4 => {
                self.inputs[channel] = text.clone();
                let parsed = if self.is_color32 {
                    text.trim().parse::<u8>().ok().map(|b| (b as f32, b as f32 / 255.0))
                } else {
                    text.trim().parse::<f32>().ok().map(|f| (f, f))
                };
                match parsed {
                    Some((slider, unit)) => {
                        self.sliders[channel] = slider;
                        self.set_channel(channel, unit);
                    }
                    None => debug!("Ignoring color input {text:?} for {}", CHANNEL_NAMES[channel]),
                }
                Ok(())
            }
            EditorInput::ColorSlider { channel, value } if channel < 4 => {
                let mut value = value.clamp(0.0, self.slider_max());
                if self.is_color32 {
                    value = value.round();
                }
                self.sliders[channel] = value;
                if self.is_color32 {
                    self.inputs[channel] = (value as u8).to_string();
                    self.set_channel(channel, value / 255.0);
                } else {
                    self.inputs[channel] = value.to_string();
                    self.set_channel(channel, value);
                }
                Ok(())
            }
            other => Err(InspectError::unsupported(format!("Color editor does not accept {other:?}"))),
        }
    }

    pub fn apply(&self) -> Result<Option<Value>, InspectError> {
        if !self.loaded {
            return Ok(None);
        }
        let color = if self.is_color32 {
            Color::Byte(Color32::from(self.edited))
        } else {
            Color::Float(self.edited)
        };
        Ok(Some(Value::Color(color)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ValueState;
    use crate::host::TypeRef;
    use pretty_assertions::assert_eq;

    fn owner() -> OwnerView {
        OwnerView {
            name: "Light.tint".into(),
            state: ValueState::Color,
            can_write: true,
            error: None,
            value_type: TypeRef::color32(),
        }
    }

    #[test]
    fn test_byte_color_text_and_slider_stay_in_sync() {
        let mut editor = ColorEditor::default();
        editor.on_borrowed(&owner());
        let start = Value::Color(Color::Byte(Color32 { r: 10, g: 20, b: 30, a: 255 }));
        editor.set_value(&start, &owner());
        assert!(editor.is_color32());
        assert_eq!(editor.slider_max(), 255.0);

        editor
            .input(EditorInput::ColorText { channel: 0, text: "200".into() })
            .unwrap();
        assert_eq!(editor.slider(0), Some(200.0));

        editor
            .input(EditorInput::ColorSlider { channel: 2, value: 64.0 })
            .unwrap();
        assert_eq!(editor.input_text(2), Some("64"));

        editor
            .input(EditorInput::ColorText { channel: 1, text: "not a byte".into() })
            .unwrap();
        assert_eq!(editor.slider(1), Some(20.0));

        assert_eq!(
            editor.apply().unwrap(),
            Some(Value::Color(Color::Byte(Color32 { r: 200, g: 20, b: 64, a: 255 })))
        );
    }

    #[test]
    fn test_fractional_byte_slider_is_rounded_once() {
        let mut editor = ColorEditor::default();
        editor.on_borrowed(&owner());
        let start = Value::Color(Color::Byte(Color32 { r: 10, g: 20, b: 30, a: 255 }));
        editor.set_value(&start, &owner());
        editor
            .input(EditorInput::ColorSlider { channel: 2, value: 64.7 })
            .unwrap();
        assert_eq!(editor.input_text(2), Some("65"));
        assert_eq!(editor.slider(2), Some(65.0));
        assert_eq!(
            editor.apply().unwrap(),
            Some(Value::Color(Color::Byte(Color32 { r: 10, g: 20, b: 65, a: 255 })))
        );
    }

    #[test]
    fn test_float_color_uses_unit_range() {
        let mut editor = ColorEditor::default();
        editor.on_borrowed(&owner());
        let start = Value::Color(Color::Float(ColorF { r: 1.0, g: 0.5, b: 0.0, a: 1.0 }));
        editor.set_value(&start, &owner());
        editor
            .input(EditorInput::ColorSlider { channel: 3, value: 3.0 })
            .unwrap();
        assert_eq!(editor.swatch().a, 1.0);
        editor
            .input(EditorInput::ColorText { channel: 0, text: "0.25".into() })
            .unwrap();
        assert_eq!(
            editor.apply().unwrap(),
            Some(Value::Color(Color::Float(ColorF { r: 0.25, g: 0.5, b: 0.0, a: 1.0 })))
        );
    }
}
