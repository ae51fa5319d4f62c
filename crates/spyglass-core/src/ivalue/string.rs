use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::ValueState;
use crate::context::InspectContext;
use crate::errors::InspectError;
use crate::host::Value;

use super::{EditorInput, OwnerView};

/// Multi-line text editor. Exceptions are shown through it read-only.
#[derive(Debug, Clone, Default)]
pub struct StringEditor {
    real_value: Option<String>,
    edited: String,
    read_only: bool,
    owner_name: String,
    threshold: usize,
    save_path: PathBuf,
    overflow: bool,
}

impl StringEditor {
    pub fn text(&self) -> &str {
        &self.edited
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The value is too long for an input field and is offered as a file instead
    pub fn is_overflowing(&self) -> bool {
        self.overflow
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn on_borrowed(&mut self, owner: &OwnerView) {
        self.read_only = !owner.can_write || owner.state == ValueState::Exception;
        self.owner_name = owner.name.clone();
    }

    pub fn set_value(&mut self, ctx: &InspectContext<'_>, value: &Value, owner: &OwnerView) {
        self.threshold = ctx.config.string_overflow_threshold;
        self.save_path = Path::new(&ctx.config.default_output_path).join("untitled.txt");

        self.real_value = if owner.state == ValueState::Exception {
            owner.error.clone()
        } else {
            value.as_str().map(str::to_string)
        };
        self.edited = self.real_value.clone().unwrap_or_default();
        self.overflow = self.is_too_long(&self.edited);
    }

    fn is_too_long(&self, text: &str) -> bool {
        self.threshold > 0 && text.chars().count() >= self.threshold
    }

    pub fn input(&mut self, _ctx: &mut InspectContext<'_>, input: EditorInput) -> Result<(), InspectError> {
        match input {
            EditorInput::Text(text) => {
                if self.read_only {
                    return Err(InspectError::unsupported(format!("{} is read-only", self.owner_name)));
                }
                self.overflow = self.is_too_long(&text);
                self.edited = text;
                Ok(())
            }
            EditorInput::SaveToFile(path) => self.save_to_file(path),
            other => Err(InspectError::unsupported(format!("String editor does not accept {other:?}"))),
        }
    }

    fn save_to_file(&mut self, path: Option<PathBuf>) -> Result<(), InspectError> {
        let Some(text) = &self.real_value else {
            return Ok(());
        };
        let path = path.unwrap_or_else(|| self.save_path.clone());
        if path.as_os_str().is_empty() {
            warn!("Cannot save an empty file path!");
            return Err(InspectError::Save {
                path: String::new(),
                message: "empty path".to_string(),
            });
        }
        let save_error = |e: std::io::Error| InspectError::Save {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(save_error)?;
        }
        fs::write(&path, text).map_err(save_error)?;
        info!("Saved {} characters to {}", text.chars().count(), path.display());
        self.save_path = path;
        Ok(())
    }

    pub fn apply(&self) -> Result<Option<Value>, InspectError> {
        if self.read_only {
            return Err(InspectError::unsupported(format!("{} is read-only", self.owner_name)));
        }
        Ok(Some(Value::Str(self.edited.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::ReflectionCaches;
    use crate::config::SpyglassConfig;
    use crate::host::{HostError, MemoryHost, TypeRef};
    use crate::ivalue::EditorPool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn owner(state: ValueState, can_write: bool) -> OwnerView {
        OwnerView {
            name: "Sign.text".into(),
            state,
            can_write,
            error: Some(HostError::NullReference.to_string()),
            value_type: TypeRef::string(),
        }
    }

    #[test]
    fn test_exception_text_is_read_only() {
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let config = SpyglassConfig::default();
        let mut editors = EditorPool::new();
        let ctx = InspectContext {
            host: &host,
            caches: &caches,
            config: &config,
            editors: &mut editors,
            evaluator: None,
        };

        let view = owner(ValueState::Exception, true);
        let mut editor = StringEditor::default();
        editor.on_borrowed(&view);
        editor.set_value(&ctx, &Value::Null, &view);
        assert_eq!(editor.text(), "Object reference not set to an instance of an object.");
        assert!(editor.is_read_only());
        assert!(editor.apply().is_err());
    }

    #[test]
    fn test_overflow_saves_to_file() {
        let dir = TempDir::new().unwrap();
        let host = MemoryHost::new();
        let caches = ReflectionCaches::new();
        let config = SpyglassConfig {
            string_overflow_threshold: 8,
            default_output_path: dir.path().display().to_string(),
            ..SpyglassConfig::default()
        };
        let mut editors = EditorPool::new();
        let mut ctx = InspectContext {
            host: &host,
            caches: &caches,
            config: &config,
            editors: &mut editors,
            evaluator: None,
        };

        let view = owner(ValueState::String, true);
        let mut editor = StringEditor::default();
        editor.on_borrowed(&view);
        editor.set_value(&ctx, &Value::str("a rather long line"), &view);
        assert!(editor.is_overflowing());
        assert_eq!(editor.save_path(), dir.path().join("untitled.txt"));

        editor.input(&mut ctx, EditorInput::SaveToFile(None)).unwrap();
        let saved = std::fs::read_to_string(dir.path().join("untitled.txt")).unwrap();
        assert_eq!(saved, "a rather long line");

        let err = editor
            .input(&mut ctx, EditorInput::SaveToFile(Some(PathBuf::new())))
            .unwrap_err();
        assert!(matches!(err, InspectError::Save { .. }));

        editor.input(&mut ctx, EditorInput::Text("short".into())).unwrap();
        assert!(!editor.is_overflowing());
        assert_eq!(editor.apply().unwrap(), Some(Value::str("short")));
    }
}
