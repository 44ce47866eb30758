//! Mock navigation context.

use crate::providers::NavigationContext;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// In-memory navigation context holding a single address.
#[derive(Debug)]
pub struct MockNavigation {
    url: Mutex<Url>,
    replacements: AtomicUsize,
}

impl MockNavigation {
    /// Create a navigation context at the given address.
    ///
    /// # Panics
    ///
    /// Panics if `url` is not a valid absolute URL; mocks are scripted
    /// with literals, so a bad one is a test bug.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(Url::parse(url).expect("mock navigation URL must be absolute")),
            replacements: AtomicUsize::new(0),
        }
    }

    /// How many times the address was replaced.
    #[must_use]
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }
}

impl NavigationContext for MockNavigation {
    fn current_url(&self) -> Url {
        self.url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_url(&self, url: &Url) {
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = url.clone();
        self.replacements.fetch_add(1, Ordering::SeqCst);
    }
}
