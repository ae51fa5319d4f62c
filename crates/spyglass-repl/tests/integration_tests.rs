use std::fs;

use pretty_assertions::assert_eq;
use spyglass_core::{InteractiveValue, SpyglassConfig, Value};
use spyglass_repl::{Repl, ReplCommand};
use tempfile::TempDir;

fn repl() -> Repl {
    let config = SpyglassConfig {
        viewport_rows: 50,
        ..SpyglassConfig::default()
    };
    Repl::new(config).unwrap()
}

fn active(repl: &Repl) -> usize {
    repl.spyglass().manager().active().unwrap()
}

fn member(repl: &Repl, filter_name: &str) -> usize {
    repl.spyglass()
        .inspector(active(repl))
        .unwrap()
        .entries()
        .iter()
        .position(|e| e.filter_name == filter_name)
        .unwrap_or_else(|| panic!("no member {filter_name}"))
}

fn value(repl: &Repl, path: &[usize]) -> Value {
    repl.spyglass()
        .inspector(active(repl))
        .unwrap()
        .entry_at(path)
        .unwrap()
        .value
        .clone()
}

fn field(repl: &Repl, name: &str) -> Value {
    repl.spyglass().host().read_field(&repl.world().player, name).unwrap()
}

#[test]
fn test_player_is_open_on_startup() {
    let repl = repl();
    let rendered = repl.render_active().unwrap();
    assert!(rendered.contains("Player"));
    assert!(rendered.contains("name"));
    assert!(rendered.contains("Ada"));
}

#[test]
fn test_set_writes_a_number() {
    let mut repl = repl();
    let level = member(&repl, "Player.level");
    repl.process_line(&format!(".set {level} 42")).unwrap();
    assert_eq!(field(&repl, "level"), Value::i32(42));

    assert!(repl.process_line(&format!(".set {level} lots")).is_err());
    assert_eq!(field(&repl, "level"), Value::i32(42));
}

#[test]
fn test_clamping_property_shows_stored_value() {
    let mut repl = repl();
    let health = member(&repl, "Player.Health");
    repl.process_line(&format!(".set {health} 250")).unwrap();
    assert_eq!(value(&repl, &[health]), Value::i32(100));
}

#[test]
fn test_flags_are_toggled_and_applied() {
    let mut repl = repl();
    let resist = member(&repl, "Player.resist");
    repl.process_line(&format!(".expand {resist}")).unwrap();
    let ice = match repl.spyglass().inspector(active(&repl)).unwrap().entries()[resist].nested.as_ref() {
        Some(InteractiveValue::Enum(editor)) => editor.toggles().iter().position(|(name, _)| *name == "Ice").unwrap(),
        other => panic!("unexpected editor {other:?}"),
    };
    repl.process_line(&format!(".flag {resist} {ice} on")).unwrap();
    repl.process_line(&format!(".apply {resist}")).unwrap();
    match field(&repl, "resist") {
        Value::Enum { bits, .. } => assert_eq!(bits, 1 | 2 | 4),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_throwing_property_reports_exception() {
    let mut repl = repl();
    let ratio = member(&repl, "Player.DamageRatio");
    let detail = repl.process_line(&format!(".show {ratio}")).unwrap();
    assert!(detail.contains("Exception"));
    assert!(repl.process_line(&format!(".set {ratio} 1")).is_err());
}

#[test]
fn test_generic_method_is_invoked() {
    let mut repl = repl();
    let echo = member(&repl, "Player.Echo");
    repl.process_line(&format!(".args {echo}")).unwrap();
    repl.process_line(&format!(".garg {echo} 0 string")).unwrap();
    repl.process_line(&format!(".arg {echo} 0 hello")).unwrap();
    repl.process_line(&format!(".eval {echo}")).unwrap();
    assert_eq!(value(&repl, &[echo]), Value::str("hello"));
}

#[test]
fn test_method_with_argument_changes_state() {
    let mut repl = repl();
    let heal = member(&repl, "Player.Heal");
    repl.process_line(&format!(".args {heal}")).unwrap();
    repl.process_line(&format!(".arg {heal} 0 15")).unwrap();
    repl.process_line(&format!(".eval {heal}")).unwrap();
    assert_eq!(value(&repl, &[heal]), Value::i32(95));
}

#[test]
fn test_child_struct_inspector_writes_through() {
    let mut repl = repl();
    let player_tab = active(&repl);
    let position = member(&repl, "Player.position");
    repl.process_line(&format!(".open {position}")).unwrap();
    assert_ne!(active(&repl), player_tab);

    let y = member(&repl, "Vector3.y");
    repl.process_line(&format!(".set {y} 9.5")).unwrap();
    let stored = field(&repl, "position");
    assert_eq!(repl.spyglass().host().read_field(&stored, "y").unwrap(), Value::f32(9.5));

    let tabs = repl.handle_command(ReplCommand::Tabs).unwrap();
    assert!(tabs.contains("from"));
}

#[test]
fn test_dictionary_slot_is_written() {
    let mut repl = repl();
    let stats = member(&repl, "Player.stats");
    repl.process_line(&format!(".expand {stats}")).unwrap();
    let luck = (0..3)
        .find(|i| {
            repl.spyglass()
                .inspector(active(&repl))
                .unwrap()
                .entry_at(&[stats, *i])
                .and_then(|e| e.dict_key().cloned())
                == Some(Value::str("luck"))
        })
        .unwrap();
    repl.process_line(&format!(".set {stats}/{luck} 20")).unwrap();
    repl.process_line(&format!(".eval {stats}")).unwrap();
    assert_eq!(value(&repl, &[stats, luck]), Value::i32(20));
}

#[test]
fn test_read_only_list_rejects_writes() {
    let mut repl = repl();
    let titles = member(&repl, "Player.titles");
    repl.process_line(&format!(".expand {titles}")).unwrap();
    assert!(repl.process_line(&format!(".set {titles}/0 Knight")).is_err());
    assert_eq!(value(&repl, &[titles, 0]), Value::str("Wanderer"));
}

#[test]
fn test_copy_and_paste_between_members() {
    let mut repl = repl();
    let level = member(&repl, "Player.level");
    let health = member(&repl, "Player.Health");
    let copied = repl.process_line(&format!(".copy {level}")).unwrap();
    assert!(copied.contains("Copied 7"));
    repl.process_line(&format!(".paste {health}")).unwrap();
    assert_eq!(value(&repl, &[health]), Value::i32(7));
}

#[test]
fn test_paste_needs_a_clipboard() {
    let mut repl = repl();
    let level = member(&repl, "Player.level");
    assert!(repl.process_line(&format!(".paste {level}")).is_err());
}

#[test]
fn test_static_type_and_generic_construction() {
    let mut repl = repl();
    let settings = repl.process_line(".inspect Game.Settings").unwrap();
    assert!(settings.contains("[S]"));
    assert!(settings.contains("volume"));

    repl.process_line(".inspect Collections.Pool").unwrap();
    let constructed = repl.process_line(".generic int").unwrap();
    assert!(constructed.contains("Constructed"));
    assert_eq!(repl.spyglass().manager().len(), 3);
}

#[test]
fn test_filter_narrows_members() {
    let mut repl = repl();
    repl.process_line(".filter describe").unwrap();
    let inspector = repl.spyglass().inspector(active(&repl)).unwrap();
    assert_eq!(inspector.filtered().len(), 1);

    repl.process_line(".filter").unwrap();
    let inspector = repl.spyglass().inspector(active(&repl)).unwrap();
    assert_eq!(inspector.filtered().len(), inspector.entries().len());
}

#[test]
fn test_ticks_advance_the_world() {
    let mut repl = repl();
    let frames = member(&repl, "Player.frames");
    repl.process_line(".auto on").unwrap();
    let out = repl.process_line(".tick 3").unwrap();
    assert!(out.contains("Advanced 3 frame(s)"));
    assert_eq!(field(&repl, "frames"), Value::i32(3));
    repl.process_line(".update").unwrap();
    assert_eq!(value(&repl, &[frames]), Value::i32(3));
}

#[test]
fn test_config_is_set_saved_and_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    let mut repl = repl();

    repl.process_line(".config set auto_update_interval_ms 250").unwrap();
    assert_eq!(repl.spyglass().config().auto_update_interval_ms, 250);
    repl.process_line(&format!(".config save {}", path.display())).unwrap();

    repl.process_line(".config reset auto_update_interval_ms").unwrap();
    assert_eq!(repl.spyglass().config().auto_update_interval_ms, 1000);

    repl.process_line(&format!(".config load {}", path.display())).unwrap();
    assert_eq!(repl.spyglass().config().auto_update_interval_ms, 250);
    assert!(repl.process_line(".config json").unwrap().contains("\"auto_update_interval_ms\": 250"));
    assert!(repl.process_line(".config set no_such_setting 1").is_err());
}

#[test]
fn test_string_is_saved_to_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut repl = repl();
    let name = member(&repl, "Player.name");
    repl.process_line(&format!(".expand {name}")).unwrap();
    let target = temp_dir.path().join("name.txt");
    let out = repl
        .process_line(&format!(".save {name} {}", target.display()))
        .unwrap();
    assert!(out.contains("Saved to"));
    assert_eq!(fs::read_to_string(&target).unwrap(), "Ada");
}

#[test]
fn test_type_completion_lists_matches() {
    let mut repl = repl();
    let out = repl.process_line(".types Play").unwrap();
    assert!(out.contains("Game.Player"));
    let none = repl.process_line(".types Zzyzx").unwrap();
    assert!(none.contains("No types match"));
}

#[test]
fn test_close_and_quit() {
    let mut repl = repl();
    let id = active(&repl);
    let out = repl.process_line(".close").unwrap();
    assert!(out.contains(&format!("Closed inspector {id}")));
    assert!(repl.render_active().is_err());

    repl.handle_command(ReplCommand::Quit).unwrap();
    assert!(!repl.is_running());
}
