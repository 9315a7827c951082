//! Session command handler: a line-oriented front end for the engine.
//!
//! ```text
//! tap [ID]            expand a node (no ID: background)
//! ctx [ID]            open the side panel on an element (no ID: close it)
//! menu [ID]           list context-menu entries
//! remove ID           remove an element
//! undo                restore the last removal
//! fit                 re-run layout
//! refresh             reload the current document
//! edit ID KEY VALUE   edit a field of any element
//! set KEY VALUE       edit a field of the element in the side panel
//! json PATH           send an edited raw document
//! show                print the view state
//! export [PATH]       write the PNG
//! save [PATH]         write the raw document
//! quit
//! ```

use std::path::{Path, PathBuf};

use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::models::FieldEdit;
use crate::services::{EngineEvent, EngineHandle};

use super::App;

/// One parsed session line.
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Tap(Option<String>),
    Ctx(Option<String>),
    Menu(Option<String>),
    Remove(String),
    Undo,
    Fit,
    Refresh,
    Edit(FieldEdit),
    Set { key: String, value: String },
    Json(PathBuf),
    Show,
    Export(Option<PathBuf>),
    Save(Option<PathBuf>),
    Quit,
}

/// Parses a session line. Blank lines yield `Ok(None)`.
fn parse_line(line: &str) -> Result<Option<Line>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next().map(str::to_string);
    // Words from position `skip` on, rejoined with single spaces
    let rest = |skip: usize| -> Option<String> {
        let tail = line
            .split_whitespace()
            .skip(skip)
            .collect::<Vec<_>>()
            .join(" ");
        (!tail.is_empty()).then_some(tail)
    };

    let parsed = match verb {
        "tap" => Line::Tap(arg),
        "ctx" => Line::Ctx(arg),
        "menu" => Line::Menu(arg),
        "remove" => Line::Remove(arg.ok_or("usage: remove ID")?),
        "undo" => Line::Undo,
        "fit" => Line::Fit,
        "refresh" => Line::Refresh,
        "edit" => {
            let usage = "usage: edit ID KEY VALUE";
            let id = arg.ok_or(usage)?;
            let key = words.next().ok_or(usage)?;
            let value = rest(3).ok_or(usage)?;
            Line::Edit(FieldEdit::new(id, key, value))
        }
        "set" => {
            let usage = "usage: set KEY VALUE";
            let key = arg.ok_or(usage)?;
            let value = rest(2).ok_or(usage)?;
            Line::Set { key, value }
        }
        "json" => Line::Json(arg.map(PathBuf::from).ok_or("usage: json PATH")?),
        "show" => Line::Show,
        "export" => Line::Export(arg.map(PathBuf::from)),
        "save" => Line::Save(arg.map(PathBuf::from)),
        "quit" | "exit" => Line::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(parsed))
}

impl App {
    /// Upload `input` and read commands from stdin until `quit` or EOF.
    pub async fn run_session(&self, config: &Config, input: &Path) -> Result<()> {
        let handle = self.open(config, input).await?;
        let printer = tokio::spawn(print_events(handle.subscribe()));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = match parse_line(&line) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(usage) => {
                    eprintln!("{usage}");
                    continue;
                }
            };
            if line == Line::Quit {
                break;
            }
            if let Err(e) = execute(&handle, line).await {
                eprintln!("error: {}", e.user_message());
            }
        }

        handle.shutdown().await?;
        printer.abort();
        Ok(())
    }
}

async fn execute(handle: &EngineHandle, line: Line) -> Result<(), crate::error::AppError> {
    match line {
        Line::Tap(target) => {
            if handle.tap(target.as_deref()).await? {
                handle.settle().await?;
            }
        }
        Line::Ctx(target) => {
            let selection = handle.context_tap(target.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&selection)?);
        }
        Line::Menu(target) => {
            for item in handle.menu(target.as_deref()).await? {
                let mark = if item.enabled { ' ' } else { '-' };
                println!("{mark} {}", item.label);
            }
        }
        Line::Remove(id) => {
            if !handle.remove(&id).await? {
                println!("nothing to remove");
            }
        }
        Line::Undo => {
            if !handle.undo().await? {
                println!("nothing to undo");
            }
        }
        Line::Fit => handle.fit().await?,
        Line::Refresh => handle.refresh().await?,
        Line::Edit(edit) => {
            handle.edit(edit).await?;
            handle.settle().await?;
        }
        Line::Set { key, value } => {
            handle.edit_selected(&key, &value).await?;
            handle.settle().await?;
        }
        Line::Json(path) => {
            let document = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
            handle.edit_json(document).await?;
            handle.settle().await?;
        }
        Line::Show => {
            println!("{}", serde_json::to_string_pretty(&handle.state().await?)?);
        }
        Line::Export(path) => {
            let download = handle.export().await?;
            let path = path.unwrap_or_else(|| PathBuf::from(download.file_name()));
            println!("{}", download.save_as(&path)?.display());
        }
        Line::Save(path) => {
            let download = handle.download_document().await?;
            let path = path.unwrap_or_else(|| PathBuf::from(download.file_name()));
            println!("{}", download.save_as(&path)?.display());
        }
        Line::Quit => {}
    }
    Ok(())
}

/// Prints notifications and side-panel changes to stderr.
async fn print_events(mut events: tokio::sync::broadcast::Receiver<EngineEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(EngineEvent::Notify { notification }) => eprintln!("{notification}"),
            Ok(EngineEvent::Sidebar { selection: None }) => eprintln!("side panel closed"),
            Ok(EngineEvent::Expanded { node_id, outcome }) => {
                eprintln!("expand {node_id}: {outcome:?}")
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("tap"), Ok(Some(Line::Tap(None))));
        assert_eq!(
            parse_line("tap Events/1"),
            Ok(Some(Line::Tap(Some("Events/1".into()))))
        );
        assert_eq!(parse_line("undo"), Ok(Some(Line::Undo)));
        assert_eq!(parse_line("exit"), Ok(Some(Line::Quit)));
        assert!(parse_line("remove").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_parse_edit_keeps_spaces_in_value() {
        assert_eq!(
            parse_line("edit Events/2 comment  spread  by contact"),
            Ok(Some(Line::Edit(FieldEdit::new(
                "Events/2",
                "comment",
                "spread by contact"
            ))))
        );
        assert_eq!(
            parse_line("set comment a b"),
            Ok(Some(Line::Set {
                key: "comment".into(),
                value: "a b".into()
            }))
        );
        assert!(parse_line("edit Events/2 comment").is_err());
    }
}
