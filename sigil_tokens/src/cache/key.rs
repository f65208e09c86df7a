use std::fmt;

use sigil_http::Url;

use crate::{ClientId, ClientIdRef, ScopeSet, TenantId, TenantIdRef, UserId, UserIdRef};

/// Identifies a cached credential
///
/// Two keys are equal when client, authority, scope set, tenant and user are
/// all equal. Scope sets compare as sets, so the order in which scopes were
/// requested does not matter.
///
/// A key used for a lookup may leave the tenant or user unset. How such a
/// key is matched against stored entries is described on
/// [`TokenCacheStore::lookup`](super::TokenCacheStore::lookup).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    client_id: ClientId,
    authority: String,
    scopes: ScopeSet,
    user_id: Option<UserId>,
    tenant_id: Option<TenantId>,
}

impl CacheKey {
    /// Constructs a key with no tenant and no user
    pub fn new(client_id: impl Into<ClientId>, authority: &Url, scopes: ScopeSet) -> Self {
        Self {
            client_id: client_id.into(),
            authority: normalize_authority(authority),
            scopes,
            user_id: None,
            tenant_id: None,
        }
    }

    /// Sets the tenant
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the user
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub(crate) fn with_identity(
        mut self,
        tenant_id: Option<TenantId>,
        user_id: Option<UserId>,
    ) -> Self {
        self.tenant_id = tenant_id;
        self.user_id = user_id;
        self
    }

    /// The client the credential was issued to
    #[inline]
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The authority that issued the credential, without a trailing slash
    #[inline]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The scopes the credential grants
    #[inline]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The tenant, if set
    #[inline]
    pub fn tenant_id(&self) -> Option<&TenantIdRef> {
        self.tenant_id.as_deref()
    }

    /// The user, if set
    #[inline]
    pub fn user_id(&self) -> Option<&UserIdRef> {
        self.user_id.as_deref()
    }

    /// Whether a credential stored under `self` may answer a lookup for
    /// `request`
    ///
    /// Client, authority and scopes must be equal. A tenant or user present
    /// on the request must be equal too; one absent from the request matches
    /// any value. Whether a userless request may be answered by a user's
    /// credential is decided by the caller.
    pub(crate) fn answers(&self, request: &CacheKey) -> bool {
        self.same_resource(request)
            && request
                .tenant_id
                .as_ref()
                .map_or(true, |t| self.tenant_id.as_ref() == Some(t))
            && request
                .user_id
                .as_ref()
                .map_or(true, |u| self.user_id.as_ref() == Some(u))
    }

    pub(crate) fn same_resource(&self, other: &CacheKey) -> bool {
        self.client_id == other.client_id
            && self.authority == other.authority
            && self.scopes == other.scopes
    }

    pub(crate) fn belongs_to(
        &self,
        client_id: &ClientIdRef,
        authority: &str,
        user_id: &UserIdRef,
    ) -> bool {
        *self.client_id == *client_id
            && self.authority == authority
            && self.user_id.as_deref() == Some(user_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} @ {} [{}]", self.client_id, self.authority, self.scopes)?;
        if let Some(tenant_id) = &self.tenant_id {
            write!(f, " tenant={tenant_id}")?;
        }
        if let Some(user_id) = &self.user_id {
            write!(f, " user={user_id}")?;
        }
        Ok(())
    }
}

pub(crate) fn normalize_authority(authority: &Url) -> String {
    authority.as_str().trim_end_matches('/').to_owned()
}
