//! Viewer state machine.
//!
//! [`ViewerState`] holds everything the viewer knows about its book and
//! [`ViewerState::apply`] is the only way to change it: each [`Event`] yields
//! the list of [`Effect`]s the driver must perform, in order. Nothing in here
//! touches an engine.

use crate::reader::engine::{BookOptions, BookSource, PageCommand, RenditionOverrides};
use crate::reader::keys::Key;
use crate::reader::toc::{self, NavItem};
use std::fmt;

/// Location requested by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Href or CFI.
    Target(String),
    /// Numeric position (section index).
    Index(i64),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Target(target) => f.write_str(target),
            Location::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for Location {
    fn from(target: &str) -> Self {
        Location::Target(target.to_string())
    }
}

impl From<String> for Location {
    fn from(target: String) -> Self {
        Location::Target(target)
    }
}

impl From<i64> for Location {
    fn from(index: i64) -> Self {
        Location::Index(index)
    }
}

/// Inputs of the viewer, owned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerProps {
    /// Book to load.
    pub source: BookSource,
    /// Engine constructor options.
    pub init_options: BookOptions,
    /// Partial rendition options.
    pub rendition: RenditionOverrides,
    /// Location to show.
    pub location: Option<Location>,
    /// Display container the rendition attaches to.
    pub container: String,
}

impl ViewerProps {
    /// Props for a source with everything else defaulted.
    pub fn new(source: BookSource) -> Self {
        Self {
            source,
            init_options: BookOptions::default(),
            rendition: RenditionOverrides::default(),
            location: None,
            container: "viewer".to_string(),
        }
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set rendition overrides.
    pub fn with_rendition(mut self, rendition: RenditionOverrides) -> Self {
        self.rendition = rendition;
        self
    }

    /// Set engine options.
    pub fn with_init_options(mut self, init_options: BookOptions) -> Self {
        self.init_options = init_options;
        self
    }

    fn location_string(&self) -> Option<String> {
        self.location.as_ref().map(Location::to_string)
    }
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not mounted yet.
    Unloaded,
    /// Engine constructed, navigation pending.
    Loading,
    /// Navigation resolved.
    Loaded,
    /// Torn down.
    Unmounted,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The viewer was mounted.
    Mount,
    /// An update ran; carries the previous props.
    PropsChanged(Box<ViewerProps>),
    /// The engine's navigation resolved.
    NavigationLoaded(Vec<NavItem>),
    /// A rendition is attached and listening.
    Rendered,
    /// The rendition reported a new start location.
    LocationChanged(String),
    /// A key was released.
    Key(Key),
    /// The viewer is being torn down.
    Unmount,
}

/// Work the driver performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Destroy the held engine and drop its rendition.
    DestroyEngine,
    /// Construct an engine from the current props.
    ConstructEngine,
    /// Start waiting for the engine's navigation.
    AwaitNavigation,
    /// Tell the host about a new table of contents.
    NotifyToc(Vec<NavItem>),
    /// Create the rendition, subscribe to its events, hand it to the host.
    Render,
    /// Display a location (or the engine default).
    Display(Option<String>),
    /// Turn a page.
    Turn(PageCommand),
    /// Tell the host the location changed.
    NotifyLocation(String),
    /// Register the document-level key listener.
    AttachKeyListener,
    /// Remove the document-level key listener.
    DetachKeyListener,
}

/// Viewer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    phase: Phase,
    location: Option<String>,
    toc: Vec<NavItem>,
    engine_held: bool,
    rendered: bool,
}

impl ViewerState {
    /// Initial state; the tracked location starts at the props' location.
    pub fn new(props: &ViewerProps) -> Self {
        Self {
            phase: Phase::Unloaded,
            location: props.location_string(),
            toc: Vec::new(),
            engine_held: false,
            rendered: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether navigation has resolved.
    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Loaded
    }

    /// Last known location.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Loaded table of contents.
    pub fn toc(&self) -> &[NavItem] {
        &self.toc
    }

    /// Whether a rendition is attached.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Whether an update should run for new props.
    ///
    /// Once loaded, only a location or source change is worth acting on.
    pub fn should_update(&self, prev: &ViewerProps, next: &ViewerProps) -> bool {
        self.phase != Phase::Loaded || prev.location != next.location || prev.source != next.source
    }

    /// Apply an event and return the effects to run.
    pub fn apply(&mut self, event: Event, props: &ViewerProps) -> Vec<Effect> {
        match event {
            Event::Mount => self.on_mount(),
            Event::PropsChanged(prev) => self.on_props_changed(&prev, props),
            Event::NavigationLoaded(toc) => self.on_navigation_loaded(toc),
            Event::Rendered => self.on_rendered(props),
            Event::LocationChanged(start) => self.on_location_changed(start),
            Event::Key(key) => self.on_key(&key),
            Event::Unmount => self.on_unmount(),
        }
    }

    fn on_mount(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Unloaded {
            return Vec::new();
        }
        let mut effects = self.init_book();
        effects.push(Effect::AttachKeyListener);
        effects
    }

    fn init_book(&mut self) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(3);
        if self.engine_held {
            effects.push(Effect::DestroyEngine);
        }
        effects.push(Effect::ConstructEngine);
        effects.push(Effect::AwaitNavigation);

        self.phase = Phase::Loading;
        self.toc.clear();
        self.engine_held = true;
        self.rendered = false;
        effects
    }

    fn on_props_changed(&mut self, prev: &ViewerProps, next: &ViewerProps) -> Vec<Effect> {
        match self.phase {
            Phase::Unmounted => return Vec::new(),
            // Construction waits for Mount, which reads the latest props.
            Phase::Unloaded => {
                self.location = next.location_string();
                return Vec::new();
            }
            Phase::Loading | Phase::Loaded => {}
        }

        let mut effects = Vec::new();
        let next_location = next.location_string();
        if prev.location != next.location
            && self.location != next_location
            && let Some(location) = next_location
        {
            self.location = Some(location.clone());
            if self.rendered {
                effects.push(Effect::Display(Some(location)));
            }
        }

        if prev.source != next.source {
            effects.extend(self.init_book());
        }
        effects
    }

    fn on_navigation_loaded(&mut self, toc: Vec<NavItem>) -> Vec<Effect> {
        if self.phase == Phase::Unmounted {
            return Vec::new();
        }
        self.phase = Phase::Loaded;
        self.toc = toc.clone();
        vec![Effect::NotifyToc(toc), Effect::Render]
    }

    fn on_rendered(&mut self, props: &ViewerProps) -> Vec<Effect> {
        if self.phase != Phase::Loaded {
            return Vec::new();
        }
        self.rendered = true;

        let target = props
            .location_string()
            .or_else(|| toc::first_href(&self.toc).map(String::from));
        vec![Effect::Display(target)]
    }

    fn on_location_changed(&mut self, start: String) -> Vec<Effect> {
        if self.phase == Phase::Unmounted || self.location.as_deref() == Some(start.as_str()) {
            return Vec::new();
        }
        self.location = Some(start.clone());
        vec![Effect::NotifyLocation(start)]
    }

    fn on_key(&mut self, key: &Key) -> Vec<Effect> {
        if !self.rendered {
            return Vec::new();
        }
        match key {
            Key::ArrowRight => vec![Effect::Turn(PageCommand::Next)],
            Key::ArrowLeft => vec![Effect::Turn(PageCommand::Prev)],
            Key::Other(_) => Vec::new(),
        }
    }

    fn on_unmount(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Unmounted {
            return Vec::new();
        }
        let mut effects = Vec::with_capacity(2);
        if self.engine_held {
            effects.push(Effect::DestroyEngine);
        }
        if self.phase != Phase::Unloaded {
            effects.push(Effect::DetachKeyListener);
        }

        self.phase = Phase::Unmounted;
        self.engine_held = false;
        self.rendered = false;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> ViewerProps {
        ViewerProps::new(BookSource::Url("/blobs/a.epub".to_string()))
    }

    fn toc() -> Vec<NavItem> {
        vec![
            NavItem::new("One", "one.xhtml"),
            NavItem::new("Two", "two.xhtml"),
        ]
    }

    fn loaded(props: &ViewerProps) -> ViewerState {
        let mut state = ViewerState::new(props);
        state.apply(Event::Mount, props);
        state.apply(Event::NavigationLoaded(toc()), props);
        state.apply(Event::Rendered, props);
        state
    }

    #[test]
    fn test_mount_constructs_and_listens() {
        let props = props();
        let mut state = ViewerState::new(&props);
        let effects = state.apply(Event::Mount, &props);

        assert_eq!(
            effects,
            vec![
                Effect::ConstructEngine,
                Effect::AwaitNavigation,
                Effect::AttachKeyListener
            ]
        );
        assert_eq!(state.phase(), Phase::Loading);
        assert!(state.apply(Event::Mount, &props).is_empty());
    }

    #[test]
    fn test_navigation_loads_then_renders() {
        let props = props();
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);

        let effects = state.apply(Event::NavigationLoaded(toc()), &props);
        assert_eq!(effects, vec![Effect::NotifyToc(toc()), Effect::Render]);
        assert!(state.is_loaded());
        assert_eq!(state.toc(), toc().as_slice());
    }

    #[test]
    fn test_initial_display_prefers_explicit_location() {
        let props = props().with_location("two.xhtml#p3");
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);
        state.apply(Event::NavigationLoaded(toc()), &props);

        assert_eq!(
            state.apply(Event::Rendered, &props),
            vec![Effect::Display(Some("two.xhtml#p3".to_string()))]
        );
    }

    #[test]
    fn test_initial_display_numeric_location() {
        let props = props().with_location(3);
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);
        state.apply(Event::NavigationLoaded(toc()), &props);

        assert_eq!(
            state.apply(Event::Rendered, &props),
            vec![Effect::Display(Some("3".to_string()))]
        );
    }

    #[test]
    fn test_initial_display_falls_back_to_toc_then_default() {
        let props = props();
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);
        state.apply(Event::NavigationLoaded(toc()), &props);
        assert_eq!(
            state.apply(Event::Rendered, &props),
            vec![Effect::Display(Some("one.xhtml".to_string()))]
        );

        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);
        state.apply(Event::NavigationLoaded(Vec::new()), &props);
        assert_eq!(
            state.apply(Event::Rendered, &props),
            vec![Effect::Display(None)]
        );
    }

    #[test]
    fn test_same_location_is_not_reported() {
        let props = props().with_location("one.xhtml");
        let mut state = loaded(&props);

        assert!(
            state
                .apply(Event::LocationChanged("one.xhtml".to_string()), &props)
                .is_empty()
        );
    }

    #[test]
    fn test_new_location_is_tracked_and_reported_once() {
        let props = props().with_location("one.xhtml");
        let mut state = loaded(&props);

        let effects = state.apply(Event::LocationChanged("two.xhtml".to_string()), &props);
        assert_eq!(effects, vec![Effect::NotifyLocation("two.xhtml".to_string())]);
        assert_eq!(state.location(), Some("two.xhtml"));

        assert!(
            state
                .apply(Event::LocationChanged("two.xhtml".to_string()), &props)
                .is_empty()
        );
    }

    #[test]
    fn test_should_update_policy() {
        let prev = props().with_location("one.xhtml");
        let mut state = ViewerState::new(&prev);
        assert!(state.should_update(&prev, &prev));

        state = loaded(&prev);
        assert!(!state.should_update(&prev, &prev.clone()));

        let moved = prev.clone().with_location("two.xhtml");
        assert!(state.should_update(&prev, &moved));

        let other = ViewerProps {
            source: BookSource::Url("/blobs/b.epub".to_string()),
            ..prev.clone()
        };
        assert!(state.should_update(&prev, &other));

        let restyled = prev.clone().with_rendition(RenditionOverrides {
            width: Some("50%".to_string()),
            ..Default::default()
        });
        assert!(!state.should_update(&prev, &restyled));
    }

    #[test]
    fn test_location_prop_change_redisplays_without_reconstruction() {
        let prev = props().with_location("one.xhtml");
        let next = prev.clone().with_location("two.xhtml");
        let mut state = loaded(&prev);

        let effects = state.apply(Event::PropsChanged(Box::new(prev)), &next);
        assert_eq!(effects, vec![Effect::Display(Some("two.xhtml".to_string()))]);
        assert_eq!(state.location(), Some("two.xhtml"));
    }

    #[test]
    fn test_location_prop_matching_tracked_is_not_redisplayed() {
        let prev = props().with_location("one.xhtml");
        let mut state = loaded(&prev);
        state.apply(Event::LocationChanged("two.xhtml".to_string()), &prev);

        let next = prev.clone().with_location("two.xhtml");
        assert!(state.apply(Event::PropsChanged(Box::new(prev)), &next).is_empty());
    }

    #[test]
    fn test_props_change_before_mount_only_records() {
        let prev = props();
        let next = ViewerProps::new(BookSource::Url("/blobs/b.epub".to_string())).with_location("two.xhtml");
        let mut state = ViewerState::new(&prev);

        assert!(state.apply(Event::PropsChanged(Box::new(prev)), &next).is_empty());
        assert_eq!(state.phase(), Phase::Unloaded);
        assert_eq!(state.location(), Some("two.xhtml"));
        assert_eq!(
            state.apply(Event::Mount, &next),
            vec![
                Effect::ConstructEngine,
                Effect::AwaitNavigation,
                Effect::AttachKeyListener
            ]
        );
    }

    #[test]
    fn test_source_change_destroys_then_reconstructs_once() {
        let prev = props();
        let next = ViewerProps::new(BookSource::Url("/blobs/b.epub".to_string()));
        let mut state = loaded(&prev);

        let effects = state.apply(Event::PropsChanged(Box::new(prev)), &next);
        assert_eq!(
            effects,
            vec![
                Effect::DestroyEngine,
                Effect::ConstructEngine,
                Effect::AwaitNavigation
            ]
        );
        assert_eq!(state.phase(), Phase::Loading);
        assert!(!state.is_rendered());
    }

    #[test]
    fn test_arrow_keys_turn_pages_only_when_rendered() {
        let props = props();
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);
        assert!(state.apply(Event::Key(Key::ArrowRight), &props).is_empty());

        let mut state = loaded(&props);
        assert_eq!(
            state.apply(Event::Key(Key::ArrowRight), &props),
            vec![Effect::Turn(PageCommand::Next)]
        );
        assert_eq!(
            state.apply(Event::Key(Key::ArrowLeft), &props),
            vec![Effect::Turn(PageCommand::Prev)]
        );
        assert!(
            state
                .apply(Event::Key(Key::Other("a".to_string())), &props)
                .is_empty()
        );
    }

    #[test]
    fn test_unmount_while_loading_tears_down() {
        let props = props();
        let mut state = ViewerState::new(&props);
        state.apply(Event::Mount, &props);

        let effects = state.apply(Event::Unmount, &props);
        assert_eq!(effects, vec![Effect::DestroyEngine, Effect::DetachKeyListener]);
        assert_eq!(state.phase(), Phase::Unmounted);

        assert!(state.apply(Event::Unmount, &props).is_empty());
        assert!(
            state
                .apply(Event::NavigationLoaded(toc()), &props)
                .is_empty()
        );
    }
}
