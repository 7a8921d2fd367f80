//! Keyboard input and document-level key listeners.

use std::collections::BTreeSet;

/// A released key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Any other key, by its DOM key name.
    Other(String),
}

/// Handle of a registered key listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Something key listeners can be attached to, like a document.
pub trait KeyTarget {
    /// Register a listener.
    fn add_key_listener(&mut self) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn remove_key_listener(&mut self, id: ListenerId) -> bool;

    /// Whether a listener is currently registered.
    fn is_listening(&self, id: ListenerId) -> bool;
}

/// In-memory document listener registry.
#[derive(Debug, Default)]
pub struct KeyListeners {
    next: u64,
    active: BTreeSet<ListenerId>,
}

impl KeyListeners {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl KeyTarget for KeyListeners {
    fn add_key_listener(&mut self) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.active.insert(id);
        id
    }

    fn remove_key_listener(&mut self, id: ListenerId) -> bool {
        self.active.remove(&id)
    }

    fn is_listening(&self, id: ListenerId) -> bool {
        self.active.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_lifecycle() {
        let mut document = KeyListeners::new();
        let a = document.add_key_listener();
        let b = document.add_key_listener();
        assert_ne!(a, b);
        assert_eq!(document.len(), 2);

        assert!(document.remove_key_listener(a));
        assert!(!document.remove_key_listener(a));
        assert!(!document.is_listening(a));
        assert!(document.is_listening(b));
    }
}
