//! Caching of issued credentials
//!
//! A [`TokenCacheStore`] holds credentials keyed by [`CacheKey`]. Stores are
//! plain values: construct one and hand it (usually behind an [`Arc`]) to
//! each [`TokenAcquisitionFlow`](crate::TokenAcquisitionFlow) that should
//! share it. [`TokenCaches`] bundles the two stores an application typically
//! needs, and [`TokenCaches::process_default`] provides a single lazily
//! created pair for applications that want one cache per process.

use std::sync::Arc;

use once_cell::sync::Lazy;

mod key;
mod store;

pub use key::CacheKey;
pub use store::{TokenCacheStore, UserFallback};

static PROCESS_DEFAULT: Lazy<TokenCaches> = Lazy::new(TokenCaches::new);

/// The application-wide and user-wide credential stores
///
/// Credentials obtained on behalf of the application itself, such as those
/// from the client credentials grant, belong in the application store.
/// Credentials obtained on behalf of signed-in users belong in the user
/// store. Both stores match keys the same way.
#[derive(Clone, Debug, Default)]
pub struct TokenCaches {
    app: Arc<TokenCacheStore>,
    user: Arc<TokenCacheStore>,
}

impl TokenCaches {
    /// Constructs a pair of empty stores
    pub fn new() -> Self {
        Self::default()
    }

    /// The stores shared by everything in this process that asks for them
    ///
    /// Created on first use and never dropped. Call
    /// [`clear`](TokenCacheStore::clear) on each store to start over, for
    /// example on logout.
    pub fn process_default() -> &'static TokenCaches {
        &PROCESS_DEFAULT
    }

    /// The store for credentials issued to the application
    #[inline]
    pub fn app(&self) -> &Arc<TokenCacheStore> {
        &self.app
    }

    /// The store for credentials issued to users
    #[inline]
    pub fn user(&self) -> &Arc<TokenCacheStore> {
        &self.user
    }

    /// Clears both stores
    pub fn clear(&self) {
        self.app.clear();
        self.user.clear();
    }
}

#[cfg(test)]
mod tests {
    use sigil_http::Url;

    use super::*;
    use crate::{AuthenticationResult, ScopeSet};

    #[test]
    fn process_default_is_shared() {
        let a = TokenCaches::process_default();
        let b = TokenCaches::process_default();
        assert!(Arc::ptr_eq(a.app(), b.app()));
        assert!(Arc::ptr_eq(a.user(), b.user()));
        assert!(!Arc::ptr_eq(a.app(), a.user()));
    }

    #[test]
    fn stores_are_independent() {
        let caches = TokenCaches::new();
        let key = CacheKey::new(
            "client",
            &Url::parse("https://login.example.com/common").unwrap(),
            ScopeSet::new().and("read"),
        );
        caches.app().store(
            key.clone(),
            AuthenticationResult::new("Bearer", "a", sigil_clock::UnixTime(u64::MAX)),
        );

        assert!(caches.app().lookup(&key).is_some());
        assert!(caches.user().lookup(&key).is_none());

        caches.clear();
        assert!(caches.app().is_empty());
    }
}
