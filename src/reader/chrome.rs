//! Navigation chrome around [`EpubView`]: title bar, page buttons, swipe
//! paging and the table of contents panel.

use crate::reader::engine::{
    EngineFactory, PageCommand, Pager, Rendition, SelectionContents,
};
use crate::reader::keys::{Key, KeyListeners, KeyTarget};
use crate::reader::state::ViewerProps;
use crate::reader::toc::{self, NavItem, TocNode};
use crate::reader::viewer::{EpubView, ViewerHost};

/// Minimum travel, in pixels, for a gesture to count as a swipe.
pub const SWIPE_DELTA_PX: f64 = 10.0;

/// Props of the [`Reader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderProps {
    /// Props forwarded to the viewer.
    pub viewer: ViewerProps,
    /// Title shown in the bar.
    pub title: String,
    /// Whether the toc toggle and panel exist at all.
    pub show_toc: bool,
    /// Whether swipe paging is enabled.
    pub swipeable: bool,
}

impl ReaderProps {
    /// Props with the toc shown and swiping off.
    pub fn new(title: impl Into<String>, viewer: ViewerProps) -> Self {
        Self {
            viewer,
            title: title.into(),
            show_toc: true,
            swipeable: false,
        }
    }
}

/// Host adapter that keeps a copy of the toc before forwarding.
pub struct ChromeHost<H> {
    inner: H,
    toc: Vec<NavItem>,
}

impl<H: ViewerHost> ViewerHost for ChromeHost<H> {
    fn location_changed(&mut self, location: &str) {
        self.inner.location_changed(location);
    }

    fn toc_changed(&mut self, toc: &[NavItem]) {
        self.toc = toc.to_vec();
        self.inner.toc_changed(toc);
    }

    fn rendition_ready(&mut self, rendition: &mut dyn Rendition) {
        self.inner.rendition_ready(rendition);
    }

    fn key_pressed(&mut self, key: &Key) -> bool {
        self.inner.key_pressed(key)
    }

    fn handles_selection(&self) -> bool {
        self.inner.handles_selection()
    }

    fn text_selected(&mut self, cfi_range: &str, contents: &SelectionContents) {
        self.inner.text_selected(cfi_range, contents);
    }
}

/// Kind of pointer a gesture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Touch screen.
    Touch,
    /// Mouse drag.
    Mouse,
}

/// Recognized swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Finger moved left.
    Left,
    /// Finger moved right.
    Right,
}

impl SwipeDirection {
    /// Page command the swipe maps to.
    pub fn command(self) -> PageCommand {
        match self {
            SwipeDirection::Left => PageCommand::Next,
            SwipeDirection::Right => PageCommand::Prev,
        }
    }
}

/// Horizontal swipe recognizer.
#[derive(Debug, Clone)]
pub struct SwipeTracker {
    delta: f64,
    track_mouse: bool,
    origin: Option<(f64, f64)>,
}

impl Default for SwipeTracker {
    fn default() -> Self {
        Self {
            delta: SWIPE_DELTA_PX,
            track_mouse: true,
            origin: None,
        }
    }
}

impl SwipeTracker {
    /// Tracker with the default threshold, mouse included.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer went down.
    pub fn start(&mut self, pointer: PointerKind, x: f64, y: f64) {
        if pointer == PointerKind::Mouse && !self.track_mouse {
            return;
        }
        self.origin = Some((x, y));
    }

    /// Pointer went up. Returns the recognized swipe, if any.
    pub fn end(&mut self, x: f64, y: f64) -> Option<SwipeDirection> {
        let (x0, y0) = self.origin.take()?;
        let dx = x - x0;
        let dy = y - y0;
        if dx.abs() < self.delta || dy.abs() > dx.abs() {
            return None;
        }
        Some(if dx < 0.0 {
            SwipeDirection::Left
        } else {
            SwipeDirection::Right
        })
    }
}

/// Snapshot of what the chrome should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderLayout {
    /// Title bar text.
    pub title: String,
    /// Whether the toc toggle button is drawn.
    pub show_toc_toggle: bool,
    /// Whether the toc panel is open.
    pub expanded_toc: bool,
    /// Navigation has not resolved yet.
    pub loading: bool,
    /// Toc tree, present while the panel is open.
    pub toc: Vec<TocNode>,
    /// Backdrop behind the open panel.
    pub backdrop: bool,
    /// Transparent layer catching swipe gestures.
    pub swipe_overlay: bool,
}

/// Viewer plus navigation chrome.
pub struct Reader<F: EngineFactory, H: ViewerHost, D: KeyTarget = KeyListeners> {
    view: EpubView<F, ChromeHost<H>, D>,
    title: String,
    show_toc: bool,
    swipeable: bool,
    expanded_toc: bool,
    swipe: SwipeTracker,
}

impl<F: EngineFactory, H: ViewerHost, D: KeyTarget> Reader<F, H, D> {
    /// Create an unmounted reader.
    pub fn new(factory: F, host: H, document: D, props: ReaderProps) -> Self {
        let host = ChromeHost {
            inner: host,
            toc: Vec::new(),
        };
        Self {
            view: EpubView::new(factory, host, document, props.viewer),
            title: props.title,
            show_toc: props.show_toc,
            swipeable: props.swipeable,
            expanded_toc: false,
            swipe: SwipeTracker::new(),
        }
    }

    /// Mount the viewer.
    pub fn mount(&mut self) {
        self.view.mount();
    }

    /// Unmount the viewer.
    pub fn unmount(&mut self) {
        self.view.unmount();
    }

    /// See [`EpubView::tick`].
    pub fn tick(&mut self) {
        self.view.tick();
    }

    /// Replace the props; viewer props go through the viewer's update policy.
    pub fn set_props(&mut self, props: ReaderProps) -> bool {
        self.title = props.title;
        self.show_toc = props.show_toc;
        self.swipeable = props.swipeable;
        if !self.show_toc {
            self.expanded_toc = false;
        }
        self.view.set_props(props.viewer)
    }

    /// Deliver a document-level key release.
    pub fn document_key_up(&mut self, key: Key) {
        self.view.document_key_up(key);
    }

    /// Open or close the toc panel.
    pub fn toggle_toc(&mut self) {
        if self.show_toc {
            self.expanded_toc = !self.expanded_toc;
        }
    }

    /// Backdrop click.
    pub fn click_backdrop(&mut self) {
        if self.expanded_toc {
            self.toggle_toc();
        }
    }

    /// Next-page button.
    pub fn next(&mut self) -> bool {
        self.view.turn(PageCommand::Next)
    }

    /// Previous-page button.
    pub fn prev(&mut self) -> bool {
        self.view.turn(PageCommand::Prev)
    }

    /// Toc entry clicked: collapse the panel and hand the href to the host.
    pub fn select_toc(&mut self, href: &str) {
        self.expanded_toc = false;
        self.view.host_mut().location_changed(href);
    }

    /// Start of a gesture on the swipe overlay.
    pub fn swipe_start(&mut self, pointer: PointerKind, x: f64, y: f64) {
        if self.swipeable {
            self.swipe.start(pointer, x, y);
        }
    }

    /// Finish a gesture, turning a page on a recognized swipe.
    pub fn swipe_end(&mut self, x: f64, y: f64) -> Option<SwipeDirection> {
        if !self.swipeable {
            return None;
        }
        let direction = self.swipe.end(x, y)?;
        self.view.turn(direction.command());
        Some(direction)
    }

    /// Toc copy kept by the chrome.
    pub fn toc(&self) -> &[NavItem] {
        &self.view.host().toc
    }

    /// Whether the toc panel is open.
    pub fn is_toc_expanded(&self) -> bool {
        self.expanded_toc
    }

    /// Wrapped viewer.
    pub fn view(&self) -> &EpubView<F, ChromeHost<H>, D> {
        &self.view
    }

    /// Host.
    pub fn host(&self) -> &H {
        &self.view.host().inner
    }

    /// Mutable host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.view.host_mut().inner
    }

    /// What to draw right now.
    pub fn layout(&self) -> ReaderLayout {
        let expanded = self.show_toc && self.expanded_toc;
        ReaderLayout {
            title: self.title.clone(),
            show_toc_toggle: self.show_toc,
            expanded_toc: expanded,
            loading: !self.view.is_loaded(),
            toc: if expanded {
                toc::build_tree(self.toc())
            } else {
                Vec::new()
            },
            backdrop: expanded,
            swipe_overlay: self.swipeable,
        }
    }
}

impl<F: EngineFactory, H: ViewerHost, D: KeyTarget> Pager for Reader<F, H, D> {
    fn turn(&mut self, command: PageCommand) -> bool {
        self.view.turn(command)
    }
}
