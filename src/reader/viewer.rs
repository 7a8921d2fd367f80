//! Viewer driver.
//!
//! [`EpubView`] owns the engine, its rendition and the document key listener
//! for as long as it is mounted. Public calls enqueue [`Event`]s; the run loop
//! feeds them to [`ViewerState`] and executes the resulting [`Effect`]s, which
//! may in turn enqueue more events (navigation resolving, rendition reports).

use crate::reader::engine::{
    EngineFactory, EpubEngine, EventKind, PageCommand, Pager, Rendition, RenditionEvent,
    RenditionOptions, SelectionContents,
};
use crate::reader::keys::{Key, KeyListeners, KeyTarget, ListenerId};
use crate::reader::state::{Effect, Event, Phase, ViewerProps, ViewerState};
use crate::reader::toc::NavItem;
use std::collections::VecDeque;
use std::task::Poll;

/// Callbacks from the viewer to whoever embeds it.
pub trait ViewerHost {
    /// The reading location moved.
    fn location_changed(&mut self, location: &str);

    /// The table of contents was loaded.
    fn toc_changed(&mut self, _toc: &[NavItem]) {}

    /// A rendition was created.
    fn rendition_ready(&mut self, _rendition: &mut dyn Rendition) {}

    /// A key was released inside the rendition. Return `true` to replace the
    /// default arrow-key paging.
    fn key_pressed(&mut self, _key: &Key) -> bool {
        false
    }

    /// Whether to subscribe to text selections.
    fn handles_selection(&self) -> bool {
        false
    }

    /// Text was selected inside the rendition.
    fn text_selected(&mut self, _cfi_range: &str, _contents: &SelectionContents) {}
}

type RenditionOf<F> = <<F as EngineFactory>::Engine as EpubEngine>::Rendition;

/// ePub viewer bound to one display container.
pub struct EpubView<F: EngineFactory, H: ViewerHost, D: KeyTarget = KeyListeners> {
    factory: F,
    host: H,
    document: D,
    props: ViewerProps,
    state: ViewerState,
    engine: Option<F::Engine>,
    rendition: Option<RenditionOf<F>>,
    listener: Option<ListenerId>,
    awaiting_navigation: bool,
    queue: VecDeque<Event>,
}

impl<F: EngineFactory, H: ViewerHost, D: KeyTarget> EpubView<F, H, D> {
    /// Create an unmounted viewer.
    pub fn new(factory: F, host: H, document: D, props: ViewerProps) -> Self {
        Self {
            state: ViewerState::new(&props),
            factory,
            host,
            document,
            props,
            engine: None,
            rendition: None,
            listener: None,
            awaiting_navigation: false,
            queue: VecDeque::new(),
        }
    }

    /// Mount: construct the engine and start listening for keys.
    pub fn mount(&mut self) {
        self.dispatch(Event::Mount);
    }

    /// Replace the props. Returns whether an update ran.
    pub fn set_props(&mut self, next: ViewerProps) -> bool {
        let update = self.state.should_update(&self.props, &next);
        let prev = std::mem::replace(&mut self.props, next);
        if update {
            self.dispatch(Event::PropsChanged(Box::new(prev)));
        }
        update
    }

    /// Re-poll pending navigation and drain rendition events.
    pub fn tick(&mut self) {
        self.run();
    }

    /// Deliver a key released at document level.
    pub fn document_key_up(&mut self, key: Key) {
        match self.listener {
            Some(id) if self.document.is_listening(id) => self.dispatch(Event::Key(key)),
            _ => {}
        }
    }

    /// Tear down: destroy the engine and remove the key listener.
    pub fn unmount(&mut self) {
        self.dispatch(Event::Unmount);
    }

    /// Current props.
    pub fn props(&self) -> &ViewerProps {
        &self.props
    }

    /// Current state.
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Whether navigation has resolved.
    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Loaded table of contents.
    pub fn toc(&self) -> &[NavItem] {
        self.state.toc()
    }

    /// Host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Document the key listener lives on.
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Engine, while one is held.
    pub fn engine(&self) -> Option<&F::Engine> {
        self.engine.as_ref()
    }

    /// Mutable engine, while one is held.
    pub fn engine_mut(&mut self) -> Option<&mut F::Engine> {
        self.engine.as_mut()
    }

    /// Rendition, while one is attached.
    pub fn rendition(&self) -> Option<&RenditionOf<F>> {
        self.rendition.as_ref()
    }

    fn dispatch(&mut self, event: Event) {
        self.queue.push_back(event);
        self.run();
    }

    fn run(&mut self) {
        loop {
            while let Some(event) = self.queue.pop_front() {
                for effect in self.state.apply(event, &self.props) {
                    self.execute(effect);
                }
            }

            self.poll_navigation();
            self.drain_rendition_events();

            if self.queue.is_empty() {
                break;
            }
        }
    }

    fn poll_navigation(&mut self) {
        if !self.awaiting_navigation {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            self.awaiting_navigation = false;
            return;
        };

        match engine.poll_navigation() {
            Poll::Pending => {}
            Poll::Ready(Ok(navigation)) => {
                self.awaiting_navigation = false;
                tracing::debug!(entries = navigation.toc.len(), "Navigation loaded");
                self.queue.push_back(Event::NavigationLoaded(navigation.toc));
            }
            Poll::Ready(Err(e)) => {
                self.awaiting_navigation = false;
                tracing::warn!(error = %e, source = %self.props.source.describe(), "Failed to load navigation");
            }
        }
    }

    fn drain_rendition_events(&mut self) {
        let Some(rendition) = self.rendition.as_mut() else {
            return;
        };

        for event in rendition.take_events() {
            match event {
                RenditionEvent::LocationChanged(report) => {
                    self.queue.push_back(Event::LocationChanged(report.start));
                }
                RenditionEvent::KeyUp(key) => {
                    if !self.host.key_pressed(&key) {
                        self.queue.push_back(Event::Key(key));
                    }
                }
                RenditionEvent::Selected {
                    cfi_range,
                    contents,
                } => self.host.text_selected(&cfi_range, &contents),
            }
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::DestroyEngine => {
                self.rendition = None;
                self.awaiting_navigation = false;
                if let Some(mut engine) = self.engine.take() {
                    engine.destroy();
                    tracing::debug!("Destroyed engine");
                }
            }
            Effect::ConstructEngine => {
                match self
                    .factory
                    .construct(&self.props.source, &self.props.init_options)
                {
                    Ok(engine) => {
                        tracing::debug!(source = %self.props.source.describe(), "Constructed engine");
                        self.engine = Some(engine);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, source = %self.props.source.describe(), "Failed to construct engine");
                    }
                }
            }
            Effect::AwaitNavigation => {
                self.awaiting_navigation = self.engine.is_some();
            }
            Effect::NotifyToc(toc) => self.host.toc_changed(&toc),
            Effect::Render => self.render(),
            Effect::Display(target) => {
                if let Some(rendition) = self.rendition.as_mut()
                    && let Err(e) = rendition.display(target.as_deref())
                {
                    tracing::warn!(error = %e, location = ?target, "Failed to display location");
                }
            }
            Effect::Turn(command) => {
                if let Some(rendition) = self.rendition.as_mut() {
                    let result = match command {
                        PageCommand::Next => rendition.next(),
                        PageCommand::Prev => rendition.prev(),
                    };
                    if let Err(e) = result {
                        tracing::warn!(error = %e, command = ?command, "Failed to turn page");
                    }
                }
            }
            Effect::NotifyLocation(location) => self.host.location_changed(&location),
            Effect::AttachKeyListener => {
                self.listener = Some(self.document.add_key_listener());
            }
            Effect::DetachKeyListener => {
                if let Some(id) = self.listener.take() {
                    self.document.remove_key_listener(id);
                }
            }
        }
    }

    fn render(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let options = RenditionOptions::default().with_overrides(&self.props.rendition);
        let mut rendition = match engine.render_to(&self.props.container, &options) {
            Ok(rendition) => rendition,
            Err(e) => {
                tracing::warn!(error = %e, container = %self.props.container, "Failed to render");
                return;
            }
        };

        rendition.subscribe(EventKind::LocationChanged);
        rendition.subscribe(EventKind::KeyUp);
        if self.host.handles_selection() {
            rendition.subscribe(EventKind::Selected);
        }
        self.host.rendition_ready(&mut rendition);

        self.rendition = Some(rendition);
        self.queue.push_back(Event::Rendered);
    }
}

impl<F: EngineFactory, H: ViewerHost, D: KeyTarget> Pager for EpubView<F, H, D> {
    fn turn(&mut self, command: PageCommand) -> bool {
        if self.rendition.is_none() {
            return false;
        }
        self.execute(Effect::Turn(command));
        self.run();
        true
    }
}

impl<F: EngineFactory, H: ViewerHost, D: KeyTarget> Drop for EpubView<F, H, D> {
    fn drop(&mut self) {
        if !matches!(self.state.phase(), Phase::Unloaded | Phase::Unmounted) {
            self.unmount();
        }
    }
}
