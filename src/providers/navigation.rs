//! Navigation context trait.

use url::Url;

/// Access to the navigation/address state of the hosting surface.
///
/// The session core never touches an ambient browser surface directly;
/// reading the current address and replacing it go through this
/// capability, which keeps the callback processor testable.
pub trait NavigationContext: Send + Sync {
    /// The current address, including query parameters.
    fn current_url(&self) -> Url;

    /// Replace the current address without creating a new navigation
    /// entry (a history replacement, not a navigation).
    fn replace_url(&self, url: &Url);
}

impl<N: NavigationContext> NavigationContext for std::sync::Arc<N> {
    fn current_url(&self) -> Url {
        (**self).current_url()
    }

    fn replace_url(&self, url: &Url) {
        (**self).replace_url(url);
    }
}
