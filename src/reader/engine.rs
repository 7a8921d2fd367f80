//! Boundary to the ePub engine.
//!
//! The viewer never parses or paginates anything itself. It constructs an
//! engine through an [`EngineFactory`], waits for the engine's navigation
//! document, asks it for a [`Rendition`] bound to a display container, and
//! then drives that rendition with `display`/`prev`/`next` while draining the
//! events it reports.

use crate::error::Result;
use crate::reader::keys::Key;
use crate::reader::toc::NavItem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::task::Poll;

/// Where the engine loads a book from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookSource {
    /// A URL the engine knows how to fetch.
    Url(String),
    /// The book's bytes.
    Binary(Arc<[u8]>),
}

impl BookSource {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            BookSource::Url(url) => url.clone(),
            BookSource::Binary(data) => format!("<{} bytes>", data.len()),
        }
    }
}

impl From<Vec<u8>> for BookSource {
    fn from(data: Vec<u8>) -> Self {
        BookSource::Binary(Arc::from(data))
    }
}

/// How the engine should interpret the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAs {
    /// Packed `.epub` archive.
    Epub,
    /// Raw binary archive data.
    Binary,
    /// Unpacked publication directory.
    Directory,
}

/// Options handed to the engine constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookOptions {
    /// Force a source interpretation instead of sniffing it.
    pub open_as: Option<OpenAs>,
}

impl BookOptions {
    /// Options matching how a source carries its bytes.
    pub fn for_source(source: &BookSource) -> Self {
        let open_as = match source {
            BookSource::Url(_) => OpenAs::Epub,
            BookSource::Binary(_) => OpenAs::Binary,
        };
        Self {
            open_as: Some(open_as),
        }
    }
}

/// Layout flow of a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    /// Let the engine decide.
    Auto,
    /// Fixed pages.
    Paginated,
    /// Continuous scroll.
    Scrolled,
    /// One scrolled document per section.
    #[default]
    ScrolledDoc,
    /// All sections in one continuous scroll.
    ScrolledContinuous,
}

/// Options handed to [`EpubEngine::render_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionOptions {
    /// Width of the rendition (CSS length).
    pub width: String,
    /// Height of the rendition (CSS length).
    pub height: String,
    /// Layout flow.
    pub flow: Flow,
    /// Allow scripts inside the content to open popups.
    pub allow_popups: bool,
}

impl Default for RenditionOptions {
    fn default() -> Self {
        Self {
            width: "100%".to_string(),
            height: "100%".to_string(),
            flow: Flow::ScrolledDoc,
            allow_popups: false,
        }
    }
}

impl RenditionOptions {
    /// Apply partial overrides on top of these options.
    pub fn with_overrides(mut self, overrides: &RenditionOverrides) -> Self {
        if let Some(width) = &overrides.width {
            self.width = width.clone();
        }
        if let Some(height) = &overrides.height {
            self.height = height.clone();
        }
        if let Some(flow) = overrides.flow {
            self.flow = flow;
        }
        if let Some(allow_popups) = overrides.allow_popups {
            self.allow_popups = allow_popups;
        }
        self
    }
}

/// Partial rendition options supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenditionOverrides {
    /// Width override.
    pub width: Option<String>,
    /// Height override.
    pub height: Option<String>,
    /// Flow override.
    pub flow: Option<Flow>,
    /// Popup override.
    pub allow_popups: Option<bool>,
}

impl From<&crate::config::ReaderConfig> for RenditionOverrides {
    fn from(config: &crate::config::ReaderConfig) -> Self {
        Self {
            width: config.width.clone(),
            height: config.height.clone(),
            flow: config.flow,
            allow_popups: config.allow_popups,
        }
    }
}

/// Navigation metadata resolved by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Table of contents.
    pub toc: Vec<NavItem>,
}

/// Location span reported by a rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationReport {
    /// Start of the visible range.
    pub start: String,
    /// End of the visible range.
    pub end: String,
}

/// Content a text selection was made in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionContents {
    /// Section the selection belongs to.
    pub section: String,
    /// Selected text.
    pub text: String,
}

/// Event kinds a rendition can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// The visible location moved.
    LocationChanged,
    /// A key was released inside the rendered content.
    KeyUp,
    /// Text was selected inside the rendered content.
    Selected,
}

/// Events reported by a rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenditionEvent {
    /// The visible location moved.
    LocationChanged(LocationReport),
    /// A key was released inside the rendered content.
    KeyUp(Key),
    /// Text was selected.
    Selected {
        /// CFI range of the selection.
        cfi_range: String,
        /// Content the selection belongs to.
        contents: SelectionContents,
    },
}

impl RenditionEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            RenditionEvent::LocationChanged(_) => EventKind::LocationChanged,
            RenditionEvent::KeyUp(_) => EventKind::KeyUp,
            RenditionEvent::Selected { .. } => EventKind::Selected,
        }
    }
}

/// Constructs engines from a source.
pub trait EngineFactory {
    /// Engine type produced.
    type Engine: EpubEngine;

    /// Construct an engine. Loading may continue after this returns.
    fn construct(&mut self, source: &BookSource, options: &BookOptions) -> Result<Self::Engine>;
}

/// A loaded (or loading) book.
pub trait EpubEngine {
    /// Rendition type produced.
    type Rendition: Rendition;

    /// Poll the navigation document.
    fn poll_navigation(&mut self) -> Poll<Result<Navigation>>;

    /// Attach a rendition to a display container.
    fn render_to(&mut self, container: &str, options: &RenditionOptions)
    -> Result<Self::Rendition>;

    /// Release everything the engine holds.
    fn destroy(&mut self);
}

/// A live presentation of a book in one container.
pub trait Rendition {
    /// Display a target location, or the engine's default start.
    fn display(&mut self, target: Option<&str>) -> Result<()>;

    /// Go to the previous page.
    fn prev(&mut self) -> Result<()>;

    /// Go to the next page.
    fn next(&mut self) -> Result<()>;

    /// Start reporting events of this kind.
    fn subscribe(&mut self, kind: EventKind);

    /// Drain reported events of subscribed kinds, oldest first.
    fn take_events(&mut self) -> Vec<RenditionEvent>;
}

/// Page turn command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCommand {
    /// Next page.
    Next,
    /// Previous page.
    Prev,
}

/// Capability to turn pages, handed to whatever owns the navigation chrome.
pub trait Pager {
    /// Turn a page. Returns `false` when nothing is rendered yet.
    fn turn(&mut self, command: PageCommand) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendition_defaults_and_overrides() {
        let defaults = RenditionOptions::default();
        assert_eq!(defaults.width, "100%");
        assert_eq!(defaults.flow, Flow::ScrolledDoc);

        let options = defaults.with_overrides(&RenditionOverrides {
            flow: Some(Flow::Paginated),
            allow_popups: Some(true),
            ..Default::default()
        });
        assert_eq!(options.width, "100%");
        assert_eq!(options.height, "100%");
        assert_eq!(options.flow, Flow::Paginated);
        assert!(options.allow_popups);
    }

    #[test]
    fn test_flow_serde_names() {
        let flow: Flow = serde_json::from_str("\"scrolled-doc\"").unwrap();
        assert_eq!(flow, Flow::ScrolledDoc);
        assert_eq!(serde_json::to_string(&Flow::Paginated).unwrap(), "\"paginated\"");
    }
}
