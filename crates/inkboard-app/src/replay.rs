//! Headless replay of a drawing script against an in-memory store.
//!
//! A script names a user and a pairing code and lists pointer and board
//! actions. Replaying it yields the final board as SVG:
//!
//! ```json
//! {
//!   "user": "alice",
//!   "pairing": "demo",
//!   "actions": [
//!     { "action": "down", "x": 10, "y": 10 },
//!     { "action": "move", "x": 80, "y": 40 },
//!     { "action": "up" }
//!   ]
//! }
//! ```

use std::cell::RefCell;
use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::Path;
use std::rc::Rc;

use inkboard_core::input::{ContainerGeometry, PointerInput};
use inkboard_core::store::MemoryStore;
use inkboard_core::WhiteboardConfig;
use inkboard_render::RecordingSurface;
use kurbo::{Point, Vec2};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::whiteboard::Whiteboard;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    pub user: String,
    pub pairing: String,
    #[serde(default)]
    pub actions: Vec<ReplayAction>,
}

/// One scripted step. Pointer coordinates are client coordinates; the
/// container sits at the origin, unscrolled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayAction {
    Down {
        x: f64,
        y: f64,
        #[serde(default)]
        touch: bool,
    },
    Move {
        x: f64,
        y: f64,
        #[serde(default)]
        touch: bool,
    },
    Up,
    NewBoard,
    Switch { index: usize },
    /// Clear the active board, confirmed.
    Clear,
}

fn pointer(x: f64, y: f64, touch: bool) -> PointerInput {
    if touch {
        PointerInput::touch(x, y)
    } else {
        PointerInput::mouse(x, y)
    }
}

/// Outcome of a replay.
pub struct Replay {
    pub whiteboard: Whiteboard<MemoryStore, RecordingSurface>,
    pub messages: Vec<String>,
}

impl Replay {
    /// The rendered board as SVG.
    pub fn to_svg(&self) -> String {
        let config = self.whiteboard.session().config();
        self.whiteboard.surface().to_svg(config.canvas_size, &config.background_color)
    }
}

/// Run `script` on a fresh in-memory store.
pub fn replay(script: &ReplayScript, config: WhiteboardConfig) -> AppResult<Replay> {
    let messages = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&messages);
    let notifier = Rc::new(move |message: &str| sink.borrow_mut().push(message.to_string()));

    let container = ContainerGeometry::new(Point::ZERO, Vec2::ZERO, config.canvas_size);
    let store = Rc::new(MemoryStore::new());
    let mut whiteboard = Whiteboard::new(config, store, RecordingSurface::new(), notifier);

    whiteboard.start_session(&script.user, &script.pairing, &container)?;
    whiteboard.settle()?;

    for action in &script.actions {
        log::debug!("Replaying {:?}", action);
        match action {
            ReplayAction::Down { x, y, touch } => whiteboard.pointer_down(&pointer(*x, *y, *touch), &container)?,
            ReplayAction::Move { x, y, touch } => whiteboard.pointer_move(&pointer(*x, *y, *touch), &container)?,
            ReplayAction::Up => whiteboard.pointer_up()?,
            ReplayAction::NewBoard => whiteboard.new_board()?,
            ReplayAction::Switch { index } => whiteboard.switch_to_board(*index)?,
            ReplayAction::Clear => {
                whiteboard.clear_board(&|_: &str| true);
            }
        }
        whiteboard.settle()?;
    }

    let messages = messages.borrow().clone();
    Ok(Replay { whiteboard, messages })
}

fn read_source(path: &str) -> AppResult<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(fs::read_to_string(Path::new(path))?)
}

/// Command line entry: `inkboard <script.json|-> [--config <config.json>]`.
/// Writes the SVG to stdout.
pub fn run_cli(args: impl IntoIterator<Item = String>) -> AppResult<()> {
    let mut script_path = None;
    let mut config_path = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(args.next().ok_or_else(|| AppError::Config("--config needs a path".to_string()))?)
            }
            _ => script_path = Some(arg),
        }
    }

    let script_path = script_path.ok_or_else(|| AppError::Config("usage: inkboard <script.json|-> [--config <file>]".to_string()))?;
    let config = match config_path {
        Some(path) => WhiteboardConfig::from_json(&read_source(&path)?)?,
        None => WhiteboardConfig::default(),
    };
    let script: ReplayScript = serde_json::from_str(&read_source(&script_path)?)?;
    log::info!("Replaying {} actions for pairing {}", script.actions.len(), script.pairing);

    let outcome = replay(&script, config)?;
    for message in &outcome.messages {
        log::info!("{}", message);
    }
    io::stdout().write_all(outcome.to_svg().as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script: ReplayScript = serde_json::from_str(
            r#"{
                "user": "u",
                "pairing": "p",
                "actions": [
                    { "action": "down", "x": 1, "y": 2, "touch": true },
                    { "action": "up" },
                    { "action": "new_board" },
                    { "action": "switch", "index": 1 },
                    { "action": "clear" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.actions[0], ReplayAction::Down { x: 1.0, y: 2.0, touch: true });
        assert_eq!(script.actions[2], ReplayAction::NewBoard);
        assert_eq!(script.actions[3], ReplayAction::Switch { index: 1 });
        assert_eq!(script.actions.len(), 5);
    }

    #[test]
    fn test_cli_requires_script() {
        assert!(matches!(run_cli(Vec::new()), Err(AppError::Config(_))));
        assert!(matches!(
            run_cli(vec!["s.json".to_string(), "--config".to_string()]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_script_file() {
        let result = run_cli(vec!["/nonexistent/inkboard-script.json".to_string()]);
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
