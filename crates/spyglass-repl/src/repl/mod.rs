//! Interactive front end over an inspection session.
//!
//! The REPL owns a [`Spyglass`] session over the demo world and renders its
//! inspectors as plain text, one row per bound cell.

pub mod commands;

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use spyglass_core::cache::CellView;
use spyglass_core::labels;
use spyglass_core::{
    CacheCell, CacheEntry, CellPool, EditorInput, EntryAction, EntryKind, InteractiveValue, MemoryHost, Spyglass,
    SpyglassConfig,
};
use tracing::debug;

use crate::world::{self, DemoWorld};
pub use commands::{parse_command, parse_path, ConfigCommand, EntryPath, ReplCommand};

/// Main REPL structure
pub struct Repl {
    spyglass: Spyglass<MemoryHost>,
    world: DemoWorld,
    /// Session clock; `.tick` moves it by one auto-update interval per frame
    clock: Instant,
    running: bool,
    debug: bool,
}

impl Repl {
    /// Builds the demo world and opens an inspector on the player
    pub fn new(config: SpyglassConfig) -> Result<Self> {
        let host = MemoryHost::new();
        let world = world::build(&host)?;
        let mut spyglass = Spyglass::new(host, config);
        spyglass.inspect(world.player.clone())?;
        let clock = Instant::now();
        spyglass.tick(clock);
        Ok(Self {
            spyglass,
            world,
            clock,
            running: true,
            debug: false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn spyglass(&self) -> &Spyglass<MemoryHost> {
        &self.spyglass
    }

    pub fn world(&self) -> &DemoWorld {
        &self.world
    }

    /// Parse and run one line of input
    pub fn process_line(&mut self, line: &str) -> Result<String> {
        let cmd = parse_command(line)?;
        self.handle_command(cmd)
    }

    fn active(&self) -> Result<usize> {
        self.spyglass
            .manager()
            .active()
            .ok_or_else(|| anyhow!("No inspector is open. Use .inspect to open one."))
    }

    /// Runs an entry action on the active inspector and renders the result
    fn act(&mut self, path: &[usize], action: EntryAction) -> Result<String> {
        let id = self.active()?;
        let wrote = self.spyglass.act(id, path, action)?;
        debug!("Action on {:?} wrote: {}", path, wrote);
        self.spyglass.tick(self.clock);
        self.render_active()
    }

    /// Handle a REPL command
    pub fn handle_command(&mut self, cmd: ReplCommand) -> Result<String> {
        match cmd {
            ReplCommand::Help => Ok(self.get_help_text()),
            ReplCommand::Quit => {
                self.running = false;
                Ok("Goodbye!".to_string())
            }
            ReplCommand::Debug => {
                self.debug = !self.debug;
                Ok(format!("Debug mode: {}", if self.debug { "on" } else { "off" }))
            }
            ReplCommand::Tabs => Ok(self.render_tabs()),
            ReplCommand::Inspect(None) => {
                self.spyglass.inspect(self.world.player.clone())?;
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Inspect(Some(name)) => {
                self.spyglass.inspect_type_name(&name)?;
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Open(path) => {
                let id = self.active()?;
                self.spyglass.inspect_entry(id, &path)?;
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Tab(id) => {
                self.spyglass.set_active(id)?;
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Close(id) => {
                let id = match id {
                    Some(id) => id,
                    None => self.active()?,
                };
                if !self.spyglass.close(id) {
                    return Err(anyhow!("No open inspector with id {}", id));
                }
                Ok(format!("Closed inspector {}\n{}", id, self.render_tabs()))
            }
            ReplCommand::CloseAll => {
                self.spyglass.close_all();
                Ok("Closed all inspectors".to_string())
            }
            ReplCommand::Show(None) => self.render_active(),
            ReplCommand::Show(Some(path)) => self.render_entry_detail(&path),
            ReplCommand::Filter(text) => {
                let id = self.active()?;
                self.spyglass.inspector_mut(id)?.set_name_filter(&text);
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Scope(scope) => {
                let id = self.active()?;
                self.spyglass.inspector_mut(id)?.set_scope_filter(scope);
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Kind { kind, shown } => {
                let id = self.active()?;
                self.spyglass.inspector_mut(id)?.set_kind_filter(kind, shown);
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Eval(path) => self.act(&path, EntryAction::Evaluate),
            ReplCommand::Set { path, text } => self.act(&path, EntryAction::ApplyInput(text)),
            ReplCommand::Toggle { path, on } => self.act(&path, EntryAction::SetToggle(on)),
            ReplCommand::Expand(path) => self.act(&path, EntryAction::ToggleSubContent),
            ReplCommand::Edit { path, text } => self.act(&path, EntryAction::Edit(EditorInput::Text(text))),
            ReplCommand::Flag { path, index, on } => {
                self.act(&path, EntryAction::Edit(EditorInput::Flag { index, on }))
            }
            ReplCommand::Field { path, index, text } => {
                self.act(&path, EntryAction::Edit(EditorInput::FieldText { index, text }))
            }
            ReplCommand::Color { path, channel, text } => {
                self.act(&path, EntryAction::Edit(EditorInput::ColorText { channel, text }))
            }
            ReplCommand::Apply(path) => self.act(&path, EntryAction::ApplyEditor),
            ReplCommand::Args(path) => self.act(&path, EntryAction::ToggleArguments),
            ReplCommand::Arg { path, index, text } => self.act(&path, EntryAction::SetArgument { index, text }),
            ReplCommand::GenericArg { path, index, text } => {
                self.act(&path, EntryAction::SetGenericArgument { index, text })
            }
            ReplCommand::Save { path, file } => {
                let id = self.active()?;
                let target = match file {
                    Some(file) => PathBuf::from(file),
                    None => match self.spyglass.inspector(id)?.entry_at(&path).and_then(|e| e.nested.as_ref()) {
                        Some(InteractiveValue::String(editor)) => editor.save_path().to_path_buf(),
                        _ => return Err(anyhow!("Expand a string entry before saving it")),
                    },
                };
                self.spyglass.act(
                    id,
                    &path,
                    EntryAction::Edit(EditorInput::SaveToFile(Some(target.clone()))),
                )?;
                Ok(format!("Saved to {}", target.display()))
            }
            ReplCommand::Copy(None) => {
                let id = self.active()?;
                let value = self.spyglass.copy_target(id)?;
                Ok(format!("Copied {}", value))
            }
            ReplCommand::Copy(Some(path)) => {
                let id = self.active()?;
                let value = self.spyglass.copy(id, &path)?;
                Ok(format!("Copied {}", value))
            }
            ReplCommand::Paste(path) => {
                if self.spyglass.clipboard().is_none() {
                    return Err(anyhow!("The clipboard is empty"));
                }
                let id = self.active()?;
                self.spyglass.paste(id, &path)?;
                self.spyglass.tick(self.clock);
                self.render_active()
            }
            ReplCommand::Scroll { path: None, top } => {
                let id = self.active()?;
                self.spyglass.scroll(id, top)?;
                self.render_active()
            }
            ReplCommand::Scroll { path: Some(path), top } => {
                self.act(&path, EntryAction::Edit(EditorInput::Scroll(top)))
            }
            ReplCommand::Generic(args) => {
                let id = self.active()?;
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                let constructed = self.spyglass.make_generic(id, &args)?;
                self.spyglass.tick(self.clock);
                Ok(format!("Constructed {}\n{}", labels::type_label(&constructed), self.render_active()?))
            }
            ReplCommand::Auto(on) => {
                let id = self.active()?;
                self.spyglass.inspector_mut(id)?.auto_update = on;
                Ok(format!("Auto-update: {}", if on { "on" } else { "off" }))
            }
            ReplCommand::Update => {
                let id = self.active()?;
                self.spyglass.update_inspector(id)?;
                self.render_active()
            }
            ReplCommand::Tick(frames) => {
                let step = Duration::from_millis(self.spyglass.config().auto_update_interval_ms);
                for _ in 0..frames {
                    world::advance(self.spyglass.host(), &self.world)?;
                    self.clock += step;
                    self.spyglass.tick(self.clock);
                }
                let mut out = format!("Advanced {} frame(s)", frames);
                if self.spyglass.manager().active().is_some() {
                    out.push('\n');
                    out.push_str(&self.render_active()?);
                }
                Ok(out)
            }
            ReplCommand::Config(cmd) => self.handle_config(cmd),
            ReplCommand::Types(text) => {
                self.spyglass.complete_type(&text);
                self.spyglass.finish_tasks();
                let suggestions = self.spyglass.type_suggestions();
                if suggestions.is_empty() {
                    return Ok(format!("No types match '{}'", text));
                }
                Ok(suggestions
                    .iter()
                    .map(|s| format!("  {}  ({})", s.label, s.value))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }

    fn handle_config(&mut self, cmd: ConfigCommand) -> Result<String> {
        match cmd {
            ConfigCommand::Show => {
                self.spyglass.open_config();
                Ok(self.render_config())
            }
            ConfigCommand::Json => Ok(serde_json::to_string_pretty(self.spyglass.config())?),
            ConfigCommand::Close => {
                self.spyglass.close_config();
                Ok("Closed the config panel".to_string())
            }
            ConfigCommand::Set { key, text } => {
                let index = self.config_entry(&key)?;
                self.spyglass.config_act(&[index], EntryAction::ApplyInput(text))?;
                Ok(self.render_config())
            }
            ConfigCommand::Reset(key) => {
                self.spyglass.reset_config(&key)?;
                self.spyglass.open_config();
                Ok(self.render_config())
            }
            ConfigCommand::Save(file) => {
                self.spyglass.save_config(&PathBuf::from(&file))?;
                Ok(format!("Saved settings to {}", file))
            }
            ConfigCommand::Load(file) => {
                self.spyglass.load_config(&PathBuf::from(&file))?;
                Ok(format!("Loaded settings from {}", file))
            }
        }
    }

    /// Index of a setting's entry in the config panel, opening the panel
    fn config_entry(&mut self, key: &str) -> Result<usize> {
        self.spyglass
            .open_config()
            .entries()
            .iter()
            .position(|e| matches!(&e.kind, EntryKind::Config { key: k } if k == key))
            .ok_or_else(|| anyhow!("Unknown setting: {}", key))
    }

    fn render_tabs(&self) -> String {
        let manager = self.spyglass.manager();
        let tabs = manager.tabs();
        if tabs.is_empty() {
            return "No open inspectors".to_string();
        }
        let mut out = String::new();
        for (id, label) in tabs {
            let marker = if manager.active() == Some(id) { "*" } else { " " };
            let _ = write!(out, "{} {:>2}  {}", marker, id, label);
            if let Some(parent) = manager.parent_of(id) {
                let _ = write!(out, "  (from {} at {:?})", parent.inspector, parent.path);
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Renders the active inspector's bound rows and open editors
    pub fn render_active(&self) -> Result<String> {
        let id = self.active()?;
        let inspector = self.spyglass.inspector(id)?;
        let mut out = String::new();
        let _ = writeln!(out, "=== [{}] {} ===", id, inspector.tab_label());
        let filter = inspector.filter();
        if !filter.name.is_empty() {
            let _ = writeln!(out, "filter: '{}'", filter.name);
        }
        let _ = writeln!(
            out,
            "showing {} of {} members",
            inspector.filtered().len(),
            inspector.entries().len()
        );
        for (index, view) in inspector.rows() {
            if let Some(entry) = inspector.entries().get(index) {
                render_row(&mut out, &[index], entry, view, 0);
            }
        }
        if self.debug {
            let editors = self.spyglass.editors();
            let _ = writeln!(
                out,
                "editors: {} borrowed, {} created; cells: {}",
                editors.borrowed(),
                editors.created(),
                inspector.pool().cell_count()
            );
        }
        Ok(out.trim_end().to_string())
    }

    fn render_entry_detail(&self, path: &[usize]) -> Result<String> {
        let id = self.active()?;
        let entry = self
            .spyglass
            .inspector(id)?
            .entry_at(path)
            .ok_or_else(|| anyhow!("No entry at path {:?}", path))?;
        let mut out = String::new();
        let _ = writeln!(out, "{}", entry.name_label);
        let _ = writeln!(out, "  state: {:?}", entry.state);
        let _ = writeln!(out, "  type: {}", labels::type_label(&entry.current_type));
        let _ = writeln!(out, "  value: {}", entry.value);
        let _ = writeln!(out, "  writable: {}", entry.can_write);
        if let Some(err) = &entry.last_error {
            let _ = writeln!(out, "  error: {}", err);
        }
        if let Some(args) = entry.arguments() {
            for (i, name) in args.generic_params().iter().enumerate() {
                let text = args.generic_inputs().get(i).map(String::as_str).unwrap_or_default();
                let _ = writeln!(out, "  <{}> {} = '{}'", i, name, text);
            }
            for (i, param) in args.params().iter().enumerate() {
                let text = args.inputs().get(i).map(String::as_str).unwrap_or_default();
                let hint = args.hint(i).unwrap_or_default();
                let _ = writeln!(out, "  ({}) {} = '{}' {}", i, param.name, text, hint);
            }
        }
        if let Some(editor) = &entry.nested {
            render_editor(&mut out, path, editor, 1);
        }
        Ok(out.trim_end().to_string())
    }

    fn render_config(&self) -> String {
        let Some(panel) = self.spyglass.config_panel() else {
            return "The config panel is not open".to_string();
        };
        let mut out = String::from("=== Settings ===\n");
        render_pool(&mut out, &[], panel.entries(), panel.pool(), 0);
        out.trim_end().to_string()
    }

    /// Get help text
    pub fn get_help_text(&self) -> String {
        r#"Spyglass REPL Commands:
  .help, .h              Show this help
  .quit, .q, .exit       Exit the REPL
  .debug                 Toggle debug output

Inspectors:
  .tabs                  List open inspectors
  .inspect [type]        Inspect the player, or a type's static members
  .open <path>           Inspect the value of an entry in a new tab
  .tab <id>              Focus a tab
  .close [id|all]        Close the active tab, a given tab, or every tab
  .show [path]           Render the active tab, or one entry in detail
  .filter [text]         Filter members by name
  .scope any|instance|static
  .kind property|field|constructor|method on|off
  .update                Re-evaluate the visible members
  .auto on|off           Re-evaluate on every update interval
  .generic <T>[, <U>]    Construct the open generic type of the active tab
  .scroll [path] <row>   Scroll the tab, or a nested list

Entries (paths look like 4 or 4/1):
  .eval <path>           Evaluate a member
  .set <path> <value>    Parse and write a value
  .toggle <path> on|off  Write a boolean
  .expand <path>         Open or close the nested editor
  .edit <path> <text>    Type into a string or enum editor
  .flag <path> <i> on|off
  .field <path> <i> <value>
  .color <path> <channel> <value>
  .apply <path>          Write the nested editor back
  .args <path>           Show or hide argument inputs
  .arg <path> <i> <value>
  .garg <path> <i> <type>
  .save <path> [file]    Save a string to a file
  .copy [path]           Copy an entry, or the inspected object
  .paste <path>          Paste the clipboard into an entry

World and settings:
  .tick [n]              Advance the world n frames
  .config [show|json|close|set <key> <value>|reset <key>|save <file>|load <file>]
  .types <text>          Complete a type name
"#
        .to_string()
    }
}

fn render_pool(out: &mut String, prefix: &[usize], entries: &[CacheEntry], pool: &CellPool<CacheCell>, depth: usize) {
    for (_, cell) in pool.visible() {
        let Some(index) = cell.occupant else { continue };
        let Some(entry) = entries.get(index) else { continue };
        let mut path = prefix.to_vec();
        path.push(index);
        render_row(out, &path, entry, &cell.view, depth);
    }
}

fn render_row(out: &mut String, path: &[usize], entry: &CacheEntry, view: &CellView, depth: usize) {
    let indent = "  ".repeat(depth);
    let path_text = path.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("/");
    let _ = write!(out, "{}{:>5}  {}", indent, path_text, view.name);
    if let Some(key) = &view.key {
        match (&key.input, &key.label) {
            (Some(input), _) => {
                let _ = write!(out, " [{}]", input.text);
            }
            (None, Some(label)) => {
                let _ = write!(out, " [{}]", label);
            }
            (None, None) => {}
        }
    }
    let _ = write!(out, " = {}", cell_value(view));
    if let Some(ty) = &view.type_label {
        let _ = write!(out, "  : {}", ty);
    }
    let mut buttons = Vec::new();
    if let Some(label) = &view.evaluate_button {
        buttons.push(label.clone());
    }
    if view.apply {
        buttons.push("apply".to_string());
    }
    if view.inspect {
        buttons.push("inspect".to_string());
    }
    if view.expand {
        buttons.push(if view.sub_content_open { "-" } else { "+" }.to_string());
    }
    if !buttons.is_empty() {
        let _ = write!(out, "  [{}]", buttons.join("|"));
    }
    out.push('\n');

    if let Some(args) = entry.arguments().filter(|a| a.open) {
        for (i, name) in args.generic_params().iter().enumerate() {
            let text = args.generic_inputs().get(i).map(String::as_str).unwrap_or_default();
            let _ = writeln!(out, "{}        <{}> {} = '{}'", indent, i, name, text);
        }
        for (i, param) in args.params().iter().enumerate() {
            let text = args.inputs().get(i).map(String::as_str).unwrap_or_default();
            let _ = writeln!(out, "{}        ({}) {} = '{}'", indent, i, param.name, text);
        }
    }
    if entry.sub_content_open {
        if let Some(editor) = &entry.nested {
            render_editor(out, path, editor, depth + 1);
        }
    }
}

fn cell_value(view: &CellView) -> String {
    if let Some(toggle) = &view.toggle {
        return format!("[{}] {}", if toggle.on { "x" } else { " " }, toggle.text);
    }
    if let Some(input) = &view.input {
        let text = labels::prune(&input.text, 60, 1);
        return if input.read_only { format!("{} (read-only)", text) } else { text };
    }
    view.value_label.clone().unwrap_or_default()
}

fn render_editor(out: &mut String, path: &[usize], editor: &InteractiveValue, depth: usize) {
    let indent = "  ".repeat(depth + 3);
    match editor {
        InteractiveValue::String(e) => {
            let _ = writeln!(out, "{}\"{}\"", indent, labels::prune(e.text(), 200, 5));
            if e.is_read_only() {
                let _ = writeln!(out, "{}(read-only)", indent);
            }
            if e.is_overflowing() {
                let _ = writeln!(out, "{}too long to edit here; .save writes it to {}", indent, e.save_path().display());
            }
        }
        InteractiveValue::Enum(e) => {
            if e.is_flags() {
                for (i, (name, on)) in e.toggles().into_iter().enumerate() {
                    let _ = writeln!(out, "{}({}) [{}] {}", indent, i, if on { "x" } else { " " }, name);
                }
            } else {
                let _ = writeln!(out, "{}{}", indent, e.text());
                let names: Vec<String> = e.suggestions().into_iter().map(|s| s.label).collect();
                if !names.is_empty() {
                    let _ = writeln!(out, "{}one of: {}", indent, names.join(", "));
                }
            }
        }
        InteractiveValue::Color(e) => {
            let swatch = e.swatch();
            let _ = writeln!(
                out,
                "{}swatch RGBA({:.3}, {:.3}, {:.3}, {:.3}){}",
                indent,
                swatch.r,
                swatch.g,
                swatch.b,
                swatch.a,
                if e.is_color32() { " 32-bit" } else { "" }
            );
            for (channel, name) in ["r", "g", "b", "a"].iter().enumerate() {
                let text = e.input_text(channel).unwrap_or_default();
                let slider = e.slider(channel).unwrap_or_default();
                let _ = writeln!(out, "{}({}) {} = {} [{:.2}/{}]", indent, channel, name, text, slider, e.slider_max());
            }
        }
        InteractiveValue::Struct(e) => {
            if !e.is_supported() {
                let _ = writeln!(out, "{}(no editable fields)", indent);
            }
            for (i, (name, ty, text)) in e.rows().into_iter().enumerate() {
                let _ = writeln!(out, "{}({}) {} : {} = {}", indent, i, name, ty, text);
            }
        }
        InteractiveValue::List(e) => {
            let _ = writeln!(out, "{}{}", indent, e.top_label());
            if e.is_not_supported() {
                let _ = writeln!(out, "{}(not supported)", indent);
            } else {
                render_pool(out, path, e.entries(), e.pool(), depth + 1);
            }
        }
        InteractiveValue::Dictionary(e) => {
            let _ = writeln!(out, "{}{}", indent, e.top_label());
            if e.is_not_supported() {
                let _ = writeln!(out, "{}(not supported)", indent);
            } else {
                render_pool(out, path, e.entries(), e.pool(), depth + 1);
            }
        }
    }
}
