//! Non-fatal diagnostics.
//!
//! Codecs report recoverable problems (unknown chunk tags, checksum
//! mismatches, ignored generators) through a [`Notifier`] instead of failing.

use std::cell::RefCell;
use std::collections::HashSet;

use log::warn;

pub trait Notifier {
    /// Reports a recoverable problem.
    fn warn(&self, message: &str);

    /// Reports an unknown tag. Implementations may suppress repeats.
    fn unknown_tag(&self, context: &str, tag: &str) {
        self.warn(&format!("Skipping unknown {context} chunk '{tag}'"));
    }
}

/// Routes diagnostics to the `log` facade and reports each unknown tag once.
#[derive(Debug, Default)]
pub struct LogNotifier {
    seen_tags: RefCell<HashSet<String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn unknown_tag(&self, context: &str, tag: &str) {
        let key = format!("{context}/{tag}");
        if self.seen_tags.borrow_mut().insert(key) {
            self.warn(&format!("Skipping unknown {context} chunk '{tag}'"));
        }
    }
}

/// Keeps every message; used by tests and by callers that show a report.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: RefCell<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Notifier for CollectingNotifier {
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
