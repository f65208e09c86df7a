use std::collections::HashMap;

use parking_lot::RwLock;
use sigil_clock::{Clock, System, UnixTime};
use sigil_http::Url;

use super::key::normalize_authority;
use crate::{
    AuthenticationResult, CacheKey, ClientIdRef, IdToken, TenantId, User, UserIdRef,
};

/// How a lookup without a user may be answered by a user's credential
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserFallback {
    /// A lookup without a user only finds credentials stored without a user
    Disabled,
    /// A lookup without a user finds a user's credential only when exactly
    /// one such credential is usable
    #[default]
    Unambiguous,
    /// A lookup without a user finds the usable credential that expires
    /// last, whichever user it belongs to
    AnyUser,
}

/// An in-memory store of issued credentials
///
/// All operations take a single store-wide lock for the duration of a map
/// operation only; no lock is held across an `.await`. Two callers that both
/// miss on the same key may both go on to acquire a credential, in which case
/// the last one stored wins.
///
/// Expired entries are never returned by [`lookup`](Self::lookup), but stay
/// in the store until overwritten, removed, swept by
/// [`evict_expired`](Self::evict_expired), or cleared.
#[derive(Debug)]
pub struct TokenCacheStore<C = System> {
    entries: RwLock<HashMap<CacheKey, AuthenticationResult>>,
    user_fallback: UserFallback,
    clock: C,
}

impl Default for TokenCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCacheStore {
    /// Constructs an empty store using the system clock
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            user_fallback: UserFallback::default(),
            clock: System,
        }
    }
}

impl<C> TokenCacheStore<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenCacheStore<D> {
        TokenCacheStore {
            entries: self.entries,
            user_fallback: self.user_fallback,
            clock,
        }
    }

    /// Sets how lookups without a user are answered
    #[must_use]
    pub fn with_user_fallback(mut self, user_fallback: UserFallback) -> Self {
        self.user_fallback = user_fallback;
        self
    }

    /// The clock used to judge expiry
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Inserts a credential, replacing any stored under an equal key
    pub fn store(&self, key: CacheKey, result: AuthenticationResult) {
        tracing::trace!(%key, "storing credential");
        self.entries.write().insert(key, result);
    }

    /// Replaces the identity fields of a stored credential in place
    ///
    /// The token and expiry are left untouched, as is the user when `user` is
    /// `None`. Returns whether a credential was stored under `key`.
    pub fn update_tenant_and_user(
        &self,
        key: &CacheKey,
        tenant_id: Option<TenantId>,
        id_token: Option<IdToken>,
        user: Option<User>,
    ) -> bool {
        match self.entries.write().get_mut(key) {
            Some(result) => {
                result.update_tenant_and_user(tenant_id, id_token, user);
                true
            }
            None => false,
        }
    }

    /// Returns the credential stored under exactly `key`, even if expired
    pub fn peek(&self, key: &CacheKey) -> Option<AuthenticationResult> {
        self.entries.read().get(key).cloned()
    }

    /// Removes the credential stored under exactly `key`
    pub fn remove(&self, key: &CacheKey) -> Option<AuthenticationResult> {
        self.entries.write().remove(key)
    }

    /// Removes every credential issued to `user_id`, returning how many were
    /// removed
    pub fn remove_user(&self, user_id: &UserIdRef) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.user_id() != Some(user_id));
        before - entries.len()
    }

    /// Lists the keys of every credential the given client holds from
    /// `authority` for `user_id`
    pub fn keys_for_user(
        &self,
        client_id: &ClientIdRef,
        authority: &Url,
        user_id: &UserIdRef,
    ) -> Vec<CacheKey> {
        let authority = normalize_authority(authority);
        let mut keys: Vec<_> = self
            .entries
            .read()
            .keys()
            .filter(|key| key.belongs_to(client_id, &authority, user_id))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Removes every credential
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// The number of stored credentials, including expired ones
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no credentials at all
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<C: Clock> TokenCacheStore<C> {
    /// Finds a usable credential for `key`
    ///
    /// Only credentials whose expiry is strictly after the current time are
    /// considered. Among those, a credential stored under a key equal to
    /// `key` wins. Otherwise, candidates must match client, authority and
    /// scopes exactly, and match the tenant and user of `key` where `key` has
    /// them.
    ///
    /// When `key` has no user, credentials stored without a user are
    /// preferred; credentials stored for a user are considered only as
    /// allowed by the store's [`UserFallback`]. If more than one candidate
    /// remains, the lookup misses, except under [`UserFallback::AnyUser`],
    /// where the candidate expiring last is chosen, with ties going to the
    /// lowest key.
    pub fn lookup(&self, key: &CacheKey) -> Option<AuthenticationResult> {
        let now = self.clock.now();
        let entries = self.entries.read();

        if let Some(result) = entries.get(key) {
            if !result.is_expired_at(now) {
                tracing::debug!(%key, "cache hit");
                return Some(result.clone());
            }
        }

        let found = self.select_candidate(&entries, key, now);
        match found {
            Some((stored_key, result)) => {
                tracing::debug!(%key, matched = %stored_key, "cache hit");
                Some(result.clone())
            }
            None => {
                tracing::debug!(%key, "cache miss");
                None
            }
        }
    }

    fn select_candidate<'a>(
        &self,
        entries: &'a HashMap<CacheKey, AuthenticationResult>,
        key: &CacheKey,
        now: UnixTime,
    ) -> Option<(&'a CacheKey, &'a AuthenticationResult)> {
        let mut candidates: Vec<_> = entries
            .iter()
            .filter(|(stored, result)| stored.answers(key) && !result.is_expired_at(now))
            .collect();

        if key.user_id().is_none() {
            let has_userless = candidates.iter().any(|(k, _)| k.user_id().is_none());
            if has_userless || self.user_fallback == UserFallback::Disabled {
                candidates.retain(|(k, _)| k.user_id().is_none());
            }
        }

        match candidates.len() {
            0 => None,
            1 => candidates.pop(),
            n if self.user_fallback == UserFallback::AnyUser => {
                tracing::trace!(candidates = n, "choosing the latest expiring credential");
                candidates.into_iter().max_by(|(ka, ra), (kb, rb)| {
                    ra.expires_on()
                        .cmp(&rb.expires_on())
                        .then_with(|| kb.cmp(ka))
                })
            }
            n => {
                tracing::debug!(%key, candidates = n, "ambiguous lookup");
                None
            }
        }
    }

    /// Removes every expired credential, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, result| !result.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "evicted expired credentials");
        }
        removed
    }
}
