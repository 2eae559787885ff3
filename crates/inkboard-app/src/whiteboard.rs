//! Host facade: a session wired to a store, a surface and the UI.

use std::rc::Rc;

use inkboard_core::input::{ContainerGeometry, PointerInput};
use inkboard_core::session::{BoardSession, RenderRequest, SessionError};
use inkboard_core::store::DocumentStore;
use inkboard_core::sync::{Notifier, StoreRequest};
use inkboard_core::WhiteboardConfig;
use inkboard_render::{RenderContext, RenderEngine, RenderResult, Surface};
use kurbo::Vec2;

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

type TitleSink = Box<dyn Fn(Option<&str>)>;

/// A board session bound to a document store and a drawing surface.
///
/// Every handler applies the session's render request to the surface before
/// returning, so the surface always shows the current state.
pub struct Whiteboard<S: DocumentStore + 'static, F: Surface> {
    session: BoardSession,
    store: Rc<S>,
    surface: F,
    engine: RenderEngine,
    notifier: Rc<dyn Notifier>,
    title_sink: Option<TitleSink>,
    shown_title: Option<String>,
}

impl<S: DocumentStore + 'static, F: Surface> Whiteboard<S, F> {
    pub fn new(config: WhiteboardConfig, store: Rc<S>, surface: F, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            engine: RenderEngine::new(&config),
            session: BoardSession::new(config),
            store,
            surface,
            notifier,
            title_sink: None,
            shown_title: None,
        }
    }

    pub fn session(&self) -> &BoardSession {
        &self.session
    }

    pub fn store(&self) -> &Rc<S> {
        &self.store
    }

    pub fn surface(&self) -> &F {
        &self.surface
    }

    /// Called with the active board's title whenever it changes.
    pub fn set_title_sink(&mut self, sink: impl Fn(Option<&str>) + 'static) {
        self.title_sink = Some(Box::new(sink));
    }

    /// See [`BoardSession::set_wake`].
    pub fn set_wake(&mut self, wake: impl Fn() + 'static) {
        self.session.set_wake(wake);
    }

    /// Start a session. Returns the scroll offset that centres the canvas.
    pub fn start_session(
        &mut self,
        user_id: &str,
        pairing_code: &str,
        container: &ContainerGeometry,
    ) -> Result<Vec2, SessionError> {
        let scroll = self.session.start(&*self.store, user_id, pairing_code, container)?;
        if let Err(e) = self.render(RenderRequest::Full) {
            log::error!("Failed to render: {}", e);
        }
        Ok(scroll)
    }

    pub fn stop_session(&mut self) -> RenderResult<()> {
        self.session.stop();
        self.refresh_title();
        self.render(RenderRequest::Full)
    }

    pub fn pointer_down(&mut self, input: &PointerInput, container: &ContainerGeometry) -> RenderResult<()> {
        let request = self.session.pointer_down(input, container);
        self.render(request)
    }

    pub fn pointer_move(&mut self, input: &PointerInput, container: &ContainerGeometry) -> RenderResult<()> {
        let request = self.session.pointer_move(input, container);
        self.render(request)
    }

    pub fn pointer_up(&mut self) -> RenderResult<()> {
        let request = self.session.pointer_up();
        self.render(request)
    }

    /// Shift the canvas content by `delta` surface pixels.
    pub fn pan(&mut self, delta: Vec2) -> RenderResult<()> {
        let request = self.session.pan(delta);
        self.render(request)
    }

    pub fn switch_to_board(&mut self, index: usize) -> RenderResult<()> {
        let request = self.session.switch_to_board(&*self.store, index);
        self.refresh_title();
        self.render(request)
    }

    pub fn new_board(&mut self) -> Result<(), SessionError> {
        self.session.new_board()
    }

    /// Clear the active board after asking `confirm`. Returns whether the
    /// clear was queued.
    pub fn clear_board(&mut self, confirm: &dyn Confirm) -> bool {
        let Some(pending) = self.session.request_clear_board() else {
            return false;
        };
        if !confirm.confirm(&pending.prompt()) {
            log::debug!("Clearing board {} declined", pending.board_id);
            return false;
        }
        self.session.confirm_clear_board(pending)
    }

    /// Apply queued store events and repaint as needed.
    pub fn pump(&mut self) -> RenderResult<()> {
        let request = self.session.pump(&*self.store);
        self.refresh_title();
        self.render(request)
    }

    pub fn take_requests(&mut self) -> Vec<StoreRequest> {
        self.session.take_requests()
    }

    /// Hand every queued request to the browser's task queue.
    #[cfg(target_arch = "wasm32")]
    pub fn dispatch(&mut self) {
        for request in self.session.take_requests() {
            let runner = self.session.runner();
            let store = Rc::clone(&self.store);
            let notifier = Rc::clone(&self.notifier);
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = runner.run(&*store, request, &*notifier).await {
                    log::debug!("Store request failed: {}", e);
                }
            });
        }
    }

    /// Run queued requests to completion and pump until nothing is left.
    #[cfg(feature = "native")]
    pub fn settle(&mut self) -> RenderResult<()> {
        self.pump()?;
        loop {
            let requests = self.session.take_requests();
            if requests.is_empty() {
                return Ok(());
            }
            let runner = self.session.runner();
            for request in requests {
                if let Err(e) = pollster::block_on(runner.run(&*self.store, request, &*self.notifier)) {
                    log::debug!("Store request failed: {}", e);
                }
            }
            self.pump()?;
        }
    }

    fn render(&mut self, request: RenderRequest) -> RenderResult<()> {
        let state = self.session.state();
        match request {
            RenderRequest::None => Ok(()),
            RenderRequest::Dot => match state.in_progress() {
                Some(stroke) => self.engine.paint_dot(&mut self.surface, stroke, state.camera.offset),
                None => Ok(()),
            },
            RenderRequest::Full => {
                let ctx = RenderContext::from_session(state, self.session.config());
                self.engine.redraw(&mut self.surface, &ctx)
            }
        }
    }

    fn refresh_title(&mut self) {
        let title = self.session.title();
        if title == self.shown_title.as_deref() {
            return;
        }
        self.shown_title = title.map(str::to_string);
        if let Some(sink) = &self.title_sink {
            sink(title);
        }
    }
}
