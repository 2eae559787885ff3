#![cfg(feature = "native")]

use std::cell::RefCell;
use std::rc::Rc;

use inkboard_app::Whiteboard;
use inkboard_app::replay::{ReplayAction, ReplayScript, replay};
use inkboard_core::input::{ContainerGeometry, PointerInput};
use inkboard_core::store::MemoryStore;
use inkboard_core::sync::{CLEARED_MESSAGE, SAVE_FAILED_MESSAGE};
use inkboard_core::WhiteboardConfig;
use inkboard_render::{DrawCommand, RecordingSurface};
use kurbo::{PathEl, Point, Size, Vec2};

type Messages = Rc<RefCell<Vec<String>>>;

fn container() -> ContainerGeometry {
    ContainerGeometry::new(Point::new(0.0, 0.0), Vec2::ZERO, Size::new(800.0, 600.0))
}

fn whiteboard(store: Rc<MemoryStore>) -> (Whiteboard<MemoryStore, RecordingSurface>, Messages) {
    let messages: Messages = Rc::default();
    let sink = Rc::clone(&messages);
    let notifier = Rc::new(move |message: &str| sink.borrow_mut().push(message.to_string()));
    let board = Whiteboard::new(WhiteboardConfig::default(), store, RecordingSurface::new(), notifier);
    (board, messages)
}

fn started(store: Rc<MemoryStore>) -> (Whiteboard<MemoryStore, RecordingSurface>, Messages) {
    let (mut board, messages) = whiteboard(store);
    board.start_session("alice", "pair-1", &container()).unwrap();
    board.settle().unwrap();
    (board, messages)
}

fn draw(board: &mut Whiteboard<MemoryStore, RecordingSurface>, points: &[(f64, f64)]) {
    let (first, rest) = points.split_first().unwrap();
    board.pointer_down(&PointerInput::mouse(first.0, first.1), &container()).unwrap();
    for (x, y) in rest {
        board.pointer_move(&PointerInput::mouse(*x, *y), &container()).unwrap();
    }
    board.pointer_up().unwrap();
}

#[test]
fn test_drawn_stroke_is_rendered_after_echo() {
    let (mut board, _) = started(Rc::new(MemoryStore::new()));
    draw(&mut board, &[(10.0, 10.0), (40.0, 40.0)]);
    assert!(board.surface().visible_strokes().is_empty());

    board.settle().unwrap();
    assert_eq!(board.surface().visible_strokes().len(), 1);
}

#[test]
fn test_in_progress_stroke_is_visible_while_drawing() {
    let (mut board, _) = started(Rc::new(MemoryStore::new()));
    board.pointer_down(&PointerInput::mouse(5.0, 5.0), &container()).unwrap();

    // Tap feedback: a dot painted without clearing.
    assert!(matches!(board.surface().commands().last(), Some(DrawCommand::Restore)));
    assert_eq!(board.surface().visible_strokes().len(), 1);

    board.pointer_move(&PointerInput::mouse(9.0, 9.0), &container()).unwrap();
    assert_eq!(board.surface().visible_strokes().len(), 1);
}

#[test]
fn test_tap_disappears() {
    let (mut board, _) = started(Rc::new(MemoryStore::new()));
    board.pointer_down(&PointerInput::touch(5.0, 5.0), &container()).unwrap();
    board.pointer_up().unwrap();
    board.settle().unwrap();
    assert!(board.surface().visible_strokes().is_empty());
}

#[test]
fn test_two_viewers_share_strokes() {
    let store = Rc::new(MemoryStore::new());
    let (mut alice, _) = started(Rc::clone(&store));
    let (mut bob, _) = whiteboard(Rc::clone(&store));
    bob.start_session("bob", "pair-1", &container()).unwrap();
    bob.settle().unwrap();
    assert_eq!(alice.session().state().active_id(), bob.session().state().active_id());

    draw(&mut alice, &[(0.0, 0.0), (100.0, 100.0)]);
    alice.settle().unwrap();
    bob.pump().unwrap();

    assert_eq!(bob.surface().visible_strokes().len(), 1);
    let stroke = bob.session().state().strokes.strokes().next().unwrap().clone();
    assert_eq!(stroke.author_id, "alice");
}

#[test]
fn test_pan_moves_content_under_pointer() {
    let (mut board, _) = started(Rc::new(MemoryStore::new()));
    board.pan(Vec2::new(20.0, 10.0)).unwrap();
    draw(&mut board, &[(0.0, 0.0), (10.0, 10.0)]);
    board.settle().unwrap();

    let stroke = board.session().state().strokes.strokes().next().unwrap().clone();
    assert_eq!(stroke.points, vec![Point::new(-20.0, -10.0), Point::new(-10.0, 0.0)]);

    let visible = board.surface().visible_strokes();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].0.elements()[0], PathEl::MoveTo(Point::new(0.0, 0.0)));
}

#[test]
fn test_write_failure_shows_message() {
    let store = Rc::new(MemoryStore::new());
    let (mut board, messages) = started(Rc::clone(&store));
    store.fail_next_writes(1);

    draw(&mut board, &[(0.0, 0.0), (1.0, 1.0)]);
    board.settle().unwrap();

    assert_eq!(messages.borrow().as_slice(), [SAVE_FAILED_MESSAGE]);
    assert!(board.session().state().strokes.is_empty());
}

#[test]
fn test_clear_board_needs_confirmation() {
    let (mut board, messages) = started(Rc::new(MemoryStore::new()));
    draw(&mut board, &[(0.0, 0.0), (1.0, 1.0)]);
    board.settle().unwrap();

    assert!(!board.clear_board(&|_: &str| false));
    board.settle().unwrap();
    assert_eq!(board.surface().visible_strokes().len(), 1);

    assert!(board.clear_board(&|_: &str| true));
    board.settle().unwrap();
    assert!(board.surface().visible_strokes().is_empty());
    assert_eq!(messages.borrow().as_slice(), [CLEARED_MESSAGE]);
}

#[test]
fn test_title_sink_follows_board_switch() {
    let (mut board, _) = whiteboard(Rc::new(MemoryStore::new()));
    let titles: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
    let sink = Rc::clone(&titles);
    board.set_title_sink(move |title| sink.borrow_mut().push(title.map(str::to_string)));

    board.start_session("alice", "pair-1", &container()).unwrap();
    board.settle().unwrap();
    board.new_board().unwrap();
    board.settle().unwrap();
    board.switch_to_board(1).unwrap();
    board.stop_session().unwrap();

    assert_eq!(
        titles.borrow().as_slice(),
        [Some("Board 1".to_string()), Some("Board 2".to_string()), None]
    );
}

#[test]
fn test_stop_clears_surface() {
    let (mut board, _) = started(Rc::new(MemoryStore::new()));
    draw(&mut board, &[(0.0, 0.0), (1.0, 1.0)]);
    board.settle().unwrap();

    board.stop_session().unwrap();
    assert!(board.surface().visible_strokes().is_empty());
    assert!(!board.session().is_running());
}

#[test]
fn test_replay_to_svg() {
    let script = ReplayScript {
        user: "alice".to_string(),
        pairing: "demo".to_string(),
        actions: vec![
            ReplayAction::Down { x: 10.0, y: 10.0, touch: false },
            ReplayAction::Move { x: 50.0, y: 20.0, touch: false },
            ReplayAction::Up,
            ReplayAction::Down { x: 70.0, y: 70.0, touch: true },
            ReplayAction::Up,
        ],
    };

    let outcome = replay(&script, WhiteboardConfig::default()).unwrap();
    let svg = outcome.to_svg();
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r#"width="2000""#));
    assert!(outcome.messages.is_empty());
}

#[test]
fn test_replay_switch_and_clear() {
    let script = ReplayScript {
        user: "alice".to_string(),
        pairing: "demo".to_string(),
        actions: vec![
            ReplayAction::Down { x: 1.0, y: 1.0, touch: false },
            ReplayAction::Move { x: 2.0, y: 2.0, touch: false },
            ReplayAction::Up,
            ReplayAction::NewBoard,
            ReplayAction::Switch { index: 1 },
            ReplayAction::Down { x: 5.0, y: 5.0, touch: false },
            ReplayAction::Move { x: 6.0, y: 6.0, touch: false },
            ReplayAction::Up,
            ReplayAction::Clear,
        ],
    };

    let outcome = replay(&script, WhiteboardConfig::default()).unwrap();
    let state = outcome.whiteboard.session().state();
    assert_eq!(state.boards.len(), 2);
    assert_eq!(outcome.whiteboard.session().title(), Some("Board 2"));
    assert!(state.strokes.is_empty());
    assert_eq!(outcome.messages, vec![CLEARED_MESSAGE.to_string()]);
}
