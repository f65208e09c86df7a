use serde::{Deserialize, Serialize};
use sigil_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{
    dto::TokenResponse, id_token::IdTokenError, AccessToken, AccessTokenRef, FamilyId,
    FamilyIdRef, IdToken, IdTokenRef, Scope, ScopeSet, TenantId, TenantIdRef, TokenType,
    TokenTypeRef, User,
};

/// A credential issued by an authority
///
/// Expiry is held as an absolute UTC instant and is the sole authority on
/// whether the credential is still usable. Values handed out by the cache are
/// snapshots; changing one does not change what is cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    token_type: TokenType,
    access_token: AccessToken,
    expires_on: UnixTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<IdToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family_id: Option<FamilyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
    #[serde(default)]
    scopes: ScopeSet,
}

impl AuthenticationResult {
    /// Constructs a result from the three fields every token response has
    ///
    /// `expires_on` may be anything convertible to a [`UnixTime`], including
    /// an `OffsetDateTime` from the `time` crate in any offset; it is always
    /// held in UTC.
    pub fn new(
        token_type: impl Into<TokenType>,
        access_token: impl Into<AccessToken>,
        expires_on: impl Into<UnixTime>,
    ) -> Self {
        Self {
            token_type: token_type.into(),
            access_token: access_token.into(),
            expires_on: expires_on.into(),
            tenant_id: None,
            id_token: None,
            family_id: None,
            user: None,
            scopes: ScopeSet::new(),
        }
    }

    /// Builds a result from a token endpoint's reply
    ///
    /// The expiry is measured from the current time on `clock`. When the
    /// authority does not echo the granted scopes, the requested scopes are
    /// recorded instead. Tenant and user are taken from the ID token, if
    /// one was issued.
    pub fn from_token_response<C: Clock>(
        response: TokenResponse,
        requested_scopes: &ScopeSet,
        clock: &C,
    ) -> Result<Self, IdTokenError> {
        let claims = response.id_token.as_deref().map(IdTokenRef::claims).transpose()?;

        let mut result = Self::new(
            response.token_type,
            response.access_token,
            clock.now() + response.expires_in,
        )
        .with_scopes(
            response
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| requested_scopes.clone()),
        );

        result.family_id = response.foci;
        result.id_token = response.id_token;

        if let Some(claims) = claims {
            result.tenant_id = claims.tenant_id().map(ToOwned::to_owned);
            result.user = claims.user();
        }

        Ok(result)
    }

    /// Sets the scopes the credential grants
    #[must_use]
    pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the tenant that issued the credential
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the principal the credential was issued to
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Sets the ID token issued alongside the credential
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<IdToken>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// The token type, such as `Bearer`
    #[inline]
    pub fn token_type(&self) -> &TokenTypeRef {
        &self.token_type
    }

    /// The access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// The instant after which the credential is no longer valid
    #[inline]
    pub fn expires_on(&self) -> UnixTime {
        self.expires_on
    }

    /// The tenant that issued the credential, if the authority said so
    #[inline]
    pub fn tenant_id(&self) -> Option<&TenantIdRef> {
        self.tenant_id.as_deref()
    }

    /// The ID token issued alongside the credential, if any
    #[inline]
    pub fn id_token(&self) -> Option<&IdTokenRef> {
        self.id_token.as_deref()
    }

    /// The principal the credential was issued to, if known
    #[inline]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[inline]
    pub(crate) fn family_id(&self) -> Option<&FamilyIdRef> {
        self.family_id.as_deref()
    }

    /// The granted scopes as a set
    #[inline]
    pub fn scope_set(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The granted scopes, in a stable order
    pub fn scopes(&self) -> Vec<Scope> {
        self.scopes.to_vec()
    }

    /// Whether the credential has expired at `time`
    ///
    /// A credential is usable only while its expiry is strictly after the
    /// current time.
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        self.expires_on <= time
    }

    /// Whether the credential has expired according to the system clock
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(System.now())
    }

    /// How much longer the credential remains valid as of `time`
    #[inline]
    pub fn expires_in_at(&self, time: UnixTime) -> DurationSecs {
        self.expires_on - time
    }

    /// Formats the value of an `Authorization` header carrying this
    /// credential
    pub fn create_authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token.as_str())
    }

    /// Replaces the identity fields
    ///
    /// A `None` user leaves the current user in place.
    pub(crate) fn update_tenant_and_user(
        &mut self,
        tenant_id: Option<TenantId>,
        id_token: Option<IdToken>,
        user: Option<User>,
    ) {
        self.tenant_id = tenant_id;
        self.id_token = id_token;
        if let Some(user) = user {
            self.user = Some(user);
        }
    }
}
