//! Session history: the browser's location plus its back/forward stack.
//!
//! The router reads the current location from a [`History`] and pushes new
//! entries through it. [`MemoryHistory`] is the in-process implementation
//! used by the headless shell and the tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::location::Location;

/// Access to the current location and the history stack.
pub trait History: Send + Sync + 'static {
    /// The current location.
    fn location(&self) -> Location;

    /// Push a new entry and make it current. Entries after the current one
    /// (the forward stack) are discarded.
    fn push(&self, location: Location);

    /// Replace the current entry's fragment without adding an entry.
    fn set_fragment(&self, fragment: &str);

    /// Move one entry back. Returns `false` at the start of the stack.
    fn back(&self) -> bool;

    /// Move one entry forward. Returns `false` at the end of the stack.
    fn forward(&self) -> bool;

    /// Number of entries in the stack.
    fn len(&self) -> usize;

    /// Whether the stack is empty. Never true for a live history.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Location>,
    index: usize,
}

/// An in-memory history stack.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

impl MemoryHistory {
    /// Start a history whose only entry is `initial`.
    #[must_use]
    pub fn new(initial: Location) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![initial],
                index: 0,
            }),
        }
    }

    /// Start a history at a URL such as `/reset-password#type=recovery`.
    #[must_use]
    pub fn at(url: &str) -> Self {
        Self::new(Location::parse(url))
    }

    fn lock(&self) -> MutexGuard<'_, Stack> {
        // The stack stays consistent even if a holder panicked.
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(Location::default())
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        let stack = self.lock();
        stack.entries.get(stack.index).cloned().unwrap_or_default()
    }

    fn push(&self, location: Location) {
        let mut stack = self.lock();
        let keep = stack.index.saturating_add(1);
        stack.entries.truncate(keep);
        stack.entries.push(location);
        stack.index = stack.entries.len().saturating_sub(1);
    }

    fn set_fragment(&self, fragment: &str) {
        let mut stack = self.lock();
        let index = stack.index;
        if let Some(entry) = stack.entries.get_mut(index) {
            entry.fragment = fragment.strip_prefix('#').unwrap_or(fragment).to_owned();
        }
    }

    fn back(&self) -> bool {
        let mut stack = self.lock();
        if stack.index == 0 {
            return false;
        }
        stack.index -= 1;
        true
    }

    fn forward(&self) -> bool {
        let mut stack = self.lock();
        if stack.index.saturating_add(1) >= stack.entries.len() {
            return false;
        }
        stack.index += 1;
        true
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_back_and_forward() {
        let history = MemoryHistory::at("/");
        history.push(Location::parse("/reset-password"));
        assert_eq!(history.len(), 2);

        assert!(history.back());
        assert_eq!(history.location().pathname, "/");
        assert!(!history.back());

        assert!(history.forward());
        assert_eq!(history.location().pathname, "/reset-password");
        assert!(!history.forward());
    }

    #[test]
    fn push_discards_forward_stack() {
        let history = MemoryHistory::at("/");
        history.push(Location::parse("/a"));
        history.push(Location::parse("/b"));
        assert!(history.back());
        history.push(Location::parse("/c"));

        assert_eq!(history.len(), 3);
        assert!(!history.forward());
        assert_eq!(history.location().pathname, "/c");
    }

    #[test]
    fn set_fragment_adds_no_entry() {
        let history = MemoryHistory::at("/confirm-email");
        history.set_fragment("#access_token=abc&type=signup");
        assert_eq!(history.len(), 1);
        assert_eq!(
            history.location().to_string(),
            "/confirm-email#access_token=abc&type=signup"
        );
    }
}
