//! REPL command parsing and definitions
//!
//! Every command starts with a dot. Entries are addressed by a path of row
//! indices separated by `/`, so `4/1` is the second slot of the list shown in
//! the editor of entry 4.

use anyhow::{anyhow, Result};
use spyglass_core::{MemberFilter, ScopeFilter};

/// Path from an inspector's entries down through nested editors
pub type EntryPath = Vec<usize>;

/// Config panel subcommands
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Open the panel and list every setting
    Show,
    /// Print the settings as JSON
    Json,
    Set { key: String, text: String },
    Reset(String),
    Save(String),
    Load(String),
    Close,
}

/// Available REPL commands
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Show help information
    Help,
    /// Exit the REPL
    Quit,
    /// Toggle debug mode
    Debug,
    /// List open inspector tabs
    Tabs,
    /// Inspect the demo player, or the static members of a named type
    Inspect(Option<String>),
    /// Open a child inspector on an entry's value
    Open(EntryPath),
    /// Focus a tab
    Tab(usize),
    /// Close the active tab or a given one
    Close(Option<usize>),
    CloseAll,
    /// Render the active inspector, or one entry in detail
    Show(Option<EntryPath>),
    Filter(String),
    Scope(ScopeFilter),
    Kind { kind: MemberFilter, shown: bool },
    Eval(EntryPath),
    /// Parse text into the entry and write it
    Set { path: EntryPath, text: String },
    Toggle { path: EntryPath, on: bool },
    /// Open or close the nested editor
    Expand(EntryPath),
    /// Type into a string or enum editor
    Edit { path: EntryPath, text: String },
    Flag { path: EntryPath, index: usize, on: bool },
    Field { path: EntryPath, index: usize, text: String },
    Color { path: EntryPath, channel: usize, text: String },
    /// Write the nested editor back
    Apply(EntryPath),
    Args(EntryPath),
    Arg { path: EntryPath, index: usize, text: String },
    GenericArg { path: EntryPath, index: usize, text: String },
    /// Write a string editor to a file; no file uses the suggested path
    Save { path: EntryPath, file: Option<String> },
    /// Copy an entry, or the active inspector's target
    Copy(Option<EntryPath>),
    Paste(EntryPath),
    /// Scroll the inspector, or the nested list editor of an entry
    Scroll { path: Option<EntryPath>, top: usize },
    /// Construct the open generic type of the active tab
    Generic(Vec<String>),
    Auto(bool),
    Update,
    /// Advance the world and tick the session
    Tick(usize),
    Config(ConfigCommand),
    /// Complete a type name
    Types(String),
}

/// Parse `3/1/0` into row indices
pub fn parse_path(text: &str) -> Result<EntryPath> {
    text.split('/')
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| anyhow!("Invalid entry path: {}", text))
        })
        .collect()
}

fn parse_index(text: &str, what: &str) -> Result<usize> {
    text.parse::<usize>()
        .map_err(|_| anyhow!("Invalid {}: {}", what, text))
}

fn parse_switch(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(anyhow!("Expected on or off, got: {}", text)),
    }
}

fn parse_kind(text: &str) -> Result<MemberFilter> {
    match text.to_ascii_lowercase().trim_end_matches('s') {
        "propertie" | "property" | "prop" => Ok(MemberFilter::PROPERTY),
        "field" => Ok(MemberFilter::FIELD),
        "constructor" | "ctor" => Ok(MemberFilter::CONSTRUCTOR),
        "method" => Ok(MemberFilter::METHOD),
        _ => Err(anyhow!("Unknown member kind: {}", text)),
    }
}

/// Splits `input` into a command word and at most `n` more words, the last
/// holding the remainder of the line
fn words(input: &str, n: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() && out.len() < n {
        match rest.find(char::is_whitespace) {
            Some(at) => {
                out.push(&rest[..at]);
                rest = rest[at..].trim_start();
            }
            None => {
                out.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

fn parse_config(args: &[&str]) -> Result<ConfigCommand> {
    match args {
        [] | ["show"] => Ok(ConfigCommand::Show),
        ["json"] => Ok(ConfigCommand::Json),
        ["close"] => Ok(ConfigCommand::Close),
        ["set", key, text] => Ok(ConfigCommand::Set {
            key: key.to_string(),
            text: text.to_string(),
        }),
        ["reset", key] => Ok(ConfigCommand::Reset(key.to_string())),
        ["save", file] => Ok(ConfigCommand::Save(file.to_string())),
        ["load", file] => Ok(ConfigCommand::Load(file.to_string())),
        _ => Err(anyhow!(
            "Usage: .config [show|json|close|set <key> <value>|reset <key>|save <file>|load <file>]"
        )),
    }
}

/// Parse a command string into a ReplCommand
pub fn parse_command(input: &str) -> Result<ReplCommand> {
    let trimmed = input.trim();

    if !trimmed.starts_with('.') {
        return Err(anyhow!("Commands must start with '.'"));
    }

    let body = trimmed[1..].trim_start();
    let name = body.split_whitespace().next().ok_or_else(|| anyhow!("Empty command"))?;
    let rest = body[name.len()..].trim();

    match name {
        "help" | "h" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "debug" => Ok(ReplCommand::Debug),
        "tabs" => Ok(ReplCommand::Tabs),
        "inspect" | "i" => Ok(ReplCommand::Inspect(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        "open" | "o" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Open(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .open <path>")),
        },
        "tab" => match words(rest, 1).as_slice() {
            [id] => Ok(ReplCommand::Tab(parse_index(id, "tab id")?)),
            _ => Err(anyhow!("Usage: .tab <id>")),
        },
        "close" => match words(rest, 1).as_slice() {
            [] => Ok(ReplCommand::Close(None)),
            ["all"] => Ok(ReplCommand::CloseAll),
            [id] => Ok(ReplCommand::Close(Some(parse_index(id, "tab id")?))),
            _ => Err(anyhow!("Usage: .close [id|all]")),
        },
        "show" | "s" => match words(rest, 1).as_slice() {
            [] => Ok(ReplCommand::Show(None)),
            [path] => Ok(ReplCommand::Show(Some(parse_path(path)?))),
            _ => Err(anyhow!("Usage: .show [path]")),
        },
        "filter" | "f" => Ok(ReplCommand::Filter(rest.to_string())),
        "scope" => match rest.to_ascii_lowercase().as_str() {
            "any" | "all" => Ok(ReplCommand::Scope(ScopeFilter::Any)),
            "instance" => Ok(ReplCommand::Scope(ScopeFilter::Instance)),
            "static" => Ok(ReplCommand::Scope(ScopeFilter::Static)),
            _ => Err(anyhow!("Usage: .scope any|instance|static")),
        },
        "kind" => match words(rest, 2).as_slice() {
            [kind, shown] => Ok(ReplCommand::Kind {
                kind: parse_kind(kind)?,
                shown: parse_switch(shown)?,
            }),
            _ => Err(anyhow!("Usage: .kind property|field|constructor|method on|off")),
        },
        "eval" | "e" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Eval(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .eval <path>")),
        },
        "set" => match words(rest, 1).as_slice() {
            [path, text] => Ok(ReplCommand::Set {
                path: parse_path(path)?,
                text: text.to_string(),
            }),
            _ => Err(anyhow!("Usage: .set <path> <value>")),
        },
        "toggle" => match words(rest, 2).as_slice() {
            [path, on] => Ok(ReplCommand::Toggle {
                path: parse_path(path)?,
                on: parse_switch(on)?,
            }),
            _ => Err(anyhow!("Usage: .toggle <path> on|off")),
        },
        "expand" | "x" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Expand(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .expand <path>")),
        },
        "edit" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Edit {
                path: parse_path(path)?,
                text: String::new(),
            }),
            [path, text] => Ok(ReplCommand::Edit {
                path: parse_path(path)?,
                text: text.to_string(),
            }),
            _ => Err(anyhow!("Usage: .edit <path> <text>")),
        },
        "flag" => match words(rest, 3).as_slice() {
            [path, index, on] => Ok(ReplCommand::Flag {
                path: parse_path(path)?,
                index: parse_index(index, "flag index")?,
                on: parse_switch(on)?,
            }),
            _ => Err(anyhow!("Usage: .flag <path> <index> on|off")),
        },
        "field" => match words(rest, 2).as_slice() {
            [path, index, text] => Ok(ReplCommand::Field {
                path: parse_path(path)?,
                index: parse_index(index, "field index")?,
                text: text.to_string(),
            }),
            _ => Err(anyhow!("Usage: .field <path> <index> <value>")),
        },
        "color" => match words(rest, 2).as_slice() {
            [path, channel, text] => Ok(ReplCommand::Color {
                path: parse_path(path)?,
                channel: parse_index(channel, "channel")?,
                text: text.to_string(),
            }),
            _ => Err(anyhow!("Usage: .color <path> <channel> <value>")),
        },
        "apply" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Apply(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .apply <path>")),
        },
        "args" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Args(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .args <path>")),
        },
        "arg" | "garg" => match words(rest, 2).as_slice() {
            [path, index, text] => {
                let path = parse_path(path)?;
                let index = parse_index(index, "argument index")?;
                let text = text.to_string();
                Ok(if name == "arg" {
                    ReplCommand::Arg { path, index, text }
                } else {
                    ReplCommand::GenericArg { path, index, text }
                })
            }
            _ => Err(anyhow!("Usage: .{} <path> <index> <value>", name)),
        },
        "save" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Save {
                path: parse_path(path)?,
                file: None,
            }),
            [path, file] => Ok(ReplCommand::Save {
                path: parse_path(path)?,
                file: Some(file.to_string()),
            }),
            _ => Err(anyhow!("Usage: .save <path> [file]")),
        },
        "copy" => match words(rest, 1).as_slice() {
            [] => Ok(ReplCommand::Copy(None)),
            [path] => Ok(ReplCommand::Copy(Some(parse_path(path)?))),
            _ => Err(anyhow!("Usage: .copy [path]")),
        },
        "paste" => match words(rest, 1).as_slice() {
            [path] => Ok(ReplCommand::Paste(parse_path(path)?)),
            _ => Err(anyhow!("Usage: .paste <path>")),
        },
        "scroll" => match words(rest, 2).as_slice() {
            [top] => Ok(ReplCommand::Scroll {
                path: None,
                top: parse_index(top, "row")?,
            }),
            [path, top] => Ok(ReplCommand::Scroll {
                path: Some(parse_path(path)?),
                top: parse_index(top, "row")?,
            }),
            _ => Err(anyhow!("Usage: .scroll [path] <row>")),
        },
        "generic" => {
            let args: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if args.is_empty() {
                return Err(anyhow!("Usage: .generic <type>[, <type>...]"));
            }
            Ok(ReplCommand::Generic(args))
        }
        "auto" => Ok(ReplCommand::Auto(parse_switch(rest)?)),
        "update" | "u" => Ok(ReplCommand::Update),
        "tick" | "t" => match words(rest, 1).as_slice() {
            [] => Ok(ReplCommand::Tick(1)),
            [n] => Ok(ReplCommand::Tick(parse_index(n, "tick count")?)),
            _ => Err(anyhow!("Usage: .tick [count]")),
        },
        "config" => Ok(ReplCommand::Config(parse_config(&words(rest, 2))?)),
        "types" => Ok(ReplCommand::Types(rest.to_string())),
        _ => Err(anyhow!("Unknown command: .{}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert!(matches!(parse_command(".help").unwrap(), ReplCommand::Help));
        assert!(matches!(parse_command(".h").unwrap(), ReplCommand::Help));
    }

    #[test]
    fn test_parse_quit() {
        assert!(matches!(parse_command(".quit").unwrap(), ReplCommand::Quit));
        assert!(matches!(parse_command(".q").unwrap(), ReplCommand::Quit));
        assert!(matches!(parse_command(".exit").unwrap(), ReplCommand::Quit));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(parse_path("4").unwrap(), vec![4]);
        assert_eq!(parse_path("4/1/0").unwrap(), vec![4, 1, 0]);
        assert!(parse_path("4/x").is_err());
        assert!(parse_path("").is_err());
    }

    #[test]
    fn test_parse_set_keeps_spaces() {
        assert_eq!(
            parse_command(".set 2 Sir Ada of Lovelace").unwrap(),
            ReplCommand::Set {
                path: vec![2],
                text: "Sir Ada of Lovelace".into()
            }
        );
    }

    #[test]
    fn test_parse_inspect() {
        assert_eq!(parse_command(".inspect").unwrap(), ReplCommand::Inspect(None));
        assert_eq!(
            parse_command(".inspect Game.Settings").unwrap(),
            ReplCommand::Inspect(Some("Game.Settings".into()))
        );
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!(parse_command(".scope static").unwrap(), ReplCommand::Scope(ScopeFilter::Static));
        assert_eq!(
            parse_command(".kind methods off").unwrap(),
            ReplCommand::Kind {
                kind: MemberFilter::METHOD,
                shown: false
            }
        );
        assert_eq!(parse_command(".filter").unwrap(), ReplCommand::Filter(String::new()));
    }

    #[test]
    fn test_parse_editor_commands() {
        assert_eq!(
            parse_command(".flag 4 2 on").unwrap(),
            ReplCommand::Flag {
                path: vec![4],
                index: 2,
                on: true
            }
        );
        assert_eq!(
            parse_command(".garg 10 0 string").unwrap(),
            ReplCommand::GenericArg {
                path: vec![10],
                index: 0,
                text: "string".into()
            }
        );
        assert_eq!(
            parse_command(".scroll 8 12").unwrap(),
            ReplCommand::Scroll {
                path: Some(vec![8]),
                top: 12
            }
        );
        assert_eq!(
            parse_command(".generic string, int").unwrap(),
            ReplCommand::Generic(vec!["string".into(), "int".into()])
        );
    }

    #[test]
    fn test_parse_config() {
        assert_eq!(parse_command(".config").unwrap(), ReplCommand::Config(ConfigCommand::Show));
        assert_eq!(
            parse_command(".config set member_blacklist Player.name, Player.level").unwrap(),
            ReplCommand::Config(ConfigCommand::Set {
                key: "member_blacklist".into(),
                text: "Player.name, Player.level".into()
            })
        );
        assert!(parse_command(".config frobnicate").is_err());
    }

    #[test]
    fn test_parse_invalid_command() {
        assert!(parse_command(".invalid").is_err());
        assert!(parse_command("help").is_err()); // Missing dot
        assert!(parse_command(".").is_err());
        assert!(parse_command(".open").is_err()); // Missing argument
        assert!(parse_command(".toggle 3 maybe").is_err());
    }
}
