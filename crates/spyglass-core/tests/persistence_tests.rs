use std::fs;
use std::time::Instant;

use pretty_assertions::assert_eq;
use spyglass_core::{
    EditorInput, EntryAction, InspectError, InteractiveValue, MemoryHost, Spyglass, SpyglassConfig, TypeBuilder,
    TypeRef, Value,
};
use tempfile::TempDir;

fn note_world(config: SpyglassConfig, text: &str) -> (Spyglass<MemoryHost>, usize, usize) {
    let host = MemoryHost::new();
    let note = host.register(TypeBuilder::class("Game.Note").field("body", &TypeRef::string()));
    let mut instance = host.alloc(&note);
    host.write_field(&mut instance, "body", Value::str(text)).unwrap();
    let mut spyglass = Spyglass::new(host, config);
    let id = spyglass.inspect(instance).unwrap();
    spyglass.tick(Instant::now());
    let body = spyglass
        .inspector(id)
        .unwrap()
        .entries()
        .iter()
        .position(|e| e.filter_name == "Note.body")
        .unwrap();
    (spyglass, id, body)
}

#[test]
fn settings_survive_a_save_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("spyglass.json");

    let host = MemoryHost::new();
    let mut spyglass = Spyglass::new(host, SpyglassConfig::default());
    spyglass.set_config("auto_update_interval_ms", Value::i32(250)).unwrap();
    spyglass
        .set_config("member_blacklist", Value::str("Hero.secret, Hero.debug"))
        .unwrap();
    spyglass.save_config(&path).unwrap();

    let mut restored = Spyglass::new(MemoryHost::new(), SpyglassConfig::default());
    restored.load_config(&path).unwrap();
    assert_eq!(restored.config().auto_update_interval_ms, 250);
    assert_eq!(
        restored.config().member_blacklist,
        vec!["Hero.secret".to_string(), "Hero.debug".to_string()]
    );
    assert_eq!(restored.config().viewport_rows, 20);
}

#[test]
fn missing_settings_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut spyglass = Spyglass::new(MemoryHost::new(), SpyglassConfig::default());
    assert!(spyglass.load_config(&temp_dir.path().join("absent.json")).is_err());
    assert_eq!(spyglass.config(), &SpyglassConfig::default());
}

#[test]
fn long_string_is_saved_to_the_output_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = SpyglassConfig {
        string_overflow_threshold: 8,
        default_output_path: temp_dir.path().join("out").display().to_string(),
        ..SpyglassConfig::default()
    };
    let (mut spyglass, id, body) = note_world(config, "a rather long note body");
    spyglass.act(id, &[body], EntryAction::ToggleSubContent).unwrap();

    let expected = temp_dir.path().join("out").join("untitled.txt");
    match spyglass.inspector(id).unwrap().entries()[body].nested.as_ref() {
        Some(InteractiveValue::String(editor)) => {
            assert!(editor.is_overflowing());
            assert_eq!(editor.save_path(), expected.as_path());
        }
        other => panic!("unexpected editor {other:?}"),
    }

    spyglass
        .act(id, &[body], EntryAction::Edit(EditorInput::SaveToFile(None)))
        .unwrap();
    assert_eq!(fs::read_to_string(&expected).unwrap(), "a rather long note body");
}

#[test]
fn empty_save_path_is_rejected() {
    let (mut spyglass, id, body) = note_world(SpyglassConfig::default(), "short");
    spyglass.act(id, &[body], EntryAction::ToggleSubContent).unwrap();
    let err = spyglass
        .act(
            id,
            &[body],
            EntryAction::Edit(EditorInput::SaveToFile(Some(Default::default()))),
        )
        .unwrap_err();
    assert!(matches!(err, InspectError::Save { .. }));
}

#[test]
fn edited_string_is_applied_from_the_editor() {
    let (mut spyglass, id, body) = note_world(SpyglassConfig::default(), "draft");
    spyglass.act(id, &[body], EntryAction::ToggleSubContent).unwrap();
    spyglass
        .act(id, &[body], EntryAction::Edit(EditorInput::Text("final".into())))
        .unwrap();
    assert!(spyglass.act(id, &[body], EntryAction::ApplyEditor).unwrap());
    assert_eq!(
        spyglass.inspector(id).unwrap().entries()[body].value,
        Value::str("final")
    );
}
