//! ePub reader components.
//!
//! - [`engine`] defines the boundary to whatever engine parses and renders
//!   the book.
//! - [`state`] is the viewer's state machine; [`viewer`] drives it against
//!   an engine.
//! - [`chrome`] adds paging controls and the table of contents panel.

pub mod chrome;
pub mod engine;
pub mod keys;
pub mod state;
pub mod toc;
pub mod viewer;

pub use chrome::{Reader, ReaderLayout, ReaderProps};
pub use engine::{
    BookOptions, BookSource, EngineFactory, EpubEngine, Flow, OpenAs, PageCommand, Pager,
    Rendition, RenditionOptions, RenditionOverrides,
};
pub use keys::{Key, KeyListeners, KeyTarget};
pub use state::{Location, ViewerProps};
pub use toc::NavItem;
pub use viewer::{EpubView, ViewerHost};
