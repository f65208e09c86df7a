//! Acquiring credentials from an OAuth2 authority

use std::{fmt, sync::Arc};

use sigil_clock::{Clock, System};
use sigil_http::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    HttpRequestPipeline, HttpResponse, HttpTransport, Parameters, RequestError, Url,
};
use thiserror::Error;

use crate::{
    dto::{ErrorResponse, TokenResponse},
    id_token::IdTokenError,
    AuthenticationResult, CacheKey, ClientId, ClientIdRef, ClientSecretRef, ScopeSet, TenantId,
    TokenCacheStore, UserId,
};

/// A request for a credential
///
/// Carries the grant-specific body parameters; the flow adds the client ID
/// and the requested scopes before sending.
#[derive(Clone, Debug)]
pub struct TokenRequest {
    authority: Url,
    scopes: ScopeSet,
    tenant_id: Option<TenantId>,
    user_id: Option<UserId>,
    body_parameters: Parameters,
    headers: HeaderMap,
    force_refresh: bool,
}

impl TokenRequest {
    /// Constructs a request for `scopes` from `authority`
    ///
    /// The token endpoint is `<authority>/oauth2/token`.
    pub fn new(authority: Url, scopes: ScopeSet) -> Self {
        Self {
            authority,
            scopes,
            tenant_id: None,
            user_id: None,
            body_parameters: Parameters::new(),
            headers: HeaderMap::new(),
            force_refresh: false,
        }
    }

    /// Constructs a client credentials grant request
    pub fn client_credentials(
        authority: Url,
        scopes: ScopeSet,
        client_secret: &ClientSecretRef,
    ) -> Self {
        Self::new(authority, scopes)
            .with_body_parameter("grant_type", "client_credentials")
            .with_body_parameter("client_secret", client_secret.as_str())
    }

    /// Narrows the request to credentials from one tenant
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Narrows the request to credentials issued to one user
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Adds a form parameter to the token request body
    #[must_use]
    pub fn with_body_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.body_parameters.insert(key, value);
        self
    }

    /// Adds a header, such as a correlation ID, to the token request
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Skips the cache and always asks the authority
    ///
    /// The new credential is still stored.
    #[must_use]
    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// The authority credentials are requested from
    #[inline]
    pub fn authority(&self) -> &Url {
        &self.authority
    }

    /// The requested scopes
    #[inline]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The cache key this request looks up
    pub fn cache_key(&self, client_id: &ClientIdRef) -> CacheKey {
        CacheKey::new(client_id.to_owned(), &self.authority, self.scopes.clone())
            .with_identity(self.tenant_id.clone(), self.user_id.clone())
    }

    fn token_endpoint(&self) -> Result<Url, AcquireError> {
        let mut endpoint = self.authority.clone();
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        endpoint
            .path_segments_mut()
            .map_err(|()| AcquireError::InvalidAuthority {
                authority: self.authority.clone(),
            })?
            .pop_if_empty()
            .extend(["oauth2", "token"]);
        Ok(endpoint)
    }
}

/// An error while acquiring a credential
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The authority cannot have a token endpoint path appended to it
    #[error("authority `{authority}` cannot be used as a base URL")]
    InvalidAuthority {
        /// The offending authority
        authority: Url,
    },
    /// The token request could not be completed
    #[error("error requesting token from authority")]
    Request(#[from] RequestError),
    /// The authority answered with an error
    #[error("authority rejected the token request with {status}: {}", describe(.error, .body))]
    Service {
        /// The HTTP status of the reply
        status: StatusCode,
        /// The OAuth2 error, if the body could be parsed as one
        error: Option<ErrorResponse>,
        /// The body of the reply, verbatim
        body: String,
    },
    /// The token response could not be parsed
    #[error("error deserializing token body from authority")]
    TokenBody(#[from] serde_json::Error),
    /// The token response carried an ID token that could not be decoded
    #[error("authority issued a malformed ID token")]
    IdToken(#[from] IdTokenError),
}

impl AcquireError {
    /// The OAuth2 error code, when the authority returned one
    pub fn oauth_error(&self) -> Option<&str> {
        match self {
            Self::Service {
                error: Some(error), ..
            } => Some(&error.error),
            _ => None,
        }
    }
}

fn describe(error: &Option<ErrorResponse>, body: &str) -> String {
    match error {
        Some(ErrorResponse {
            error,
            error_description: Some(description),
            ..
        }) => format!("{error}: {description}"),
        Some(ErrorResponse { error, .. }) => error.clone(),
        None => body.to_owned(),
    }
}

fn service_error(response: HttpResponse) -> AcquireError {
    let error = serde_json::from_str::<ErrorResponse>(&response.body).ok();
    AcquireError::Service {
        status: response.status,
        error,
        body: response.body,
    }
}

/// Obtains credentials, answering from a cache where possible
///
/// Every request first consults the cache. On a miss, the flow posts the
/// request to the authority's token endpoint through its request pipeline,
/// stores the credential it receives, and returns it. Time is read from the
/// cache's clock.
pub struct TokenAcquisitionFlow<T, C = System> {
    client_id: ClientId,
    pipeline: HttpRequestPipeline<T>,
    cache: Arc<TokenCacheStore<C>>,
}

impl<T, C> TokenAcquisitionFlow<T, C> {
    /// Constructs a flow for `client_id` that shares `cache`
    pub fn new(
        client_id: impl Into<ClientId>,
        pipeline: HttpRequestPipeline<T>,
        cache: Arc<TokenCacheStore<C>>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            pipeline,
            cache,
        }
    }

    /// The client credentials are requested for
    #[inline]
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The cache consulted and updated by this flow
    #[inline]
    pub fn cache(&self) -> &Arc<TokenCacheStore<C>> {
        &self.cache
    }
}

impl<T: fmt::Debug, C> fmt::Debug for TokenAcquisitionFlow<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenAcquisitionFlow")
            .field("client_id", &self.client_id)
            .field("pipeline", &self.pipeline)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl<T: HttpTransport, C: Clock> TokenAcquisitionFlow<T, C> {
    /// Returns a usable credential for `request`
    #[tracing::instrument(
        err,
        skip(self, request),
        fields(
            client_id = %self.client_id,
            authority = %request.authority,
            scopes = %request.scopes,
            force_refresh = request.force_refresh,
        ),
    )]
    pub async fn acquire_token(
        &self,
        request: &TokenRequest,
    ) -> Result<AuthenticationResult, AcquireError> {
        let key = request.cache_key(&self.client_id);

        if !request.force_refresh {
            if let Some(result) = self.cache.lookup(&key) {
                tracing::debug!(
                    expires_on = %result.expires_on(),
                    "using cached credential"
                );
                return Ok(result);
            }
        }

        let endpoint = request.token_endpoint()?;
        let mut body = request.body_parameters.clone();
        body.insert("client_id", self.client_id.as_str());
        if !request.scopes.is_empty() {
            body.insert("scope", request.scopes.to_string());
        }

        tracing::trace!("requesting token from authority");
        let response = self
            .pipeline
            .send_post(endpoint, None, Some(&body), Some(&request.headers))
            .await?;

        if !response.is_success() {
            let error = service_error(response);
            tracing::warn!(oauth_error = error.oauth_error(), "authority rejected token request");
            return Err(error);
        }

        let token: TokenResponse = serde_json::from_str(&response.body)?;
        let mut result =
            AuthenticationResult::from_token_response(token, &request.scopes, self.cache.clock())?;

        let has_identity = result.tenant_id().is_some() || result.user().is_some();
        // Issued identity only fills what the request left open.
        let store_key = if has_identity {
            key.clone().with_identity(
                key.tenant_id()
                    .map(ToOwned::to_owned)
                    .or_else(|| result.tenant_id().map(ToOwned::to_owned)),
                key.user_id()
                    .map(ToOwned::to_owned)
                    .or_else(|| result.user().map(|u| u.unique_id().to_owned())),
            )
        } else {
            if let Some(prior) = self.cache.peek(&key) {
                tracing::trace!("carrying identity over from the previous credential");
                result.update_tenant_and_user(
                    prior.tenant_id().map(ToOwned::to_owned),
                    prior.id_token().map(ToOwned::to_owned),
                    prior.user().cloned(),
                );
            }
            key.clone()
        };

        if store_key != key && self.cache.remove(&key).is_some() {
            tracing::trace!("replacing the credential stored without identity");
        }

        tracing::info!(
            expires_on = %result.expires_on(),
            family_id = result.family_id().map(|f| f.as_str()),
            "acquired new token"
        );

        self.cache.store(store_key.clone(), result.clone());

        if has_identity {
            self.propagate_identity(request, &store_key, &result);
        }

        Ok(result)
    }

    fn propagate_identity(
        &self,
        request: &TokenRequest,
        stored: &CacheKey,
        result: &AuthenticationResult,
    ) {
        let Some(user) = result.user() else {
            return;
        };

        // Only entries in the same tenant share this identity.
        let siblings: Vec<_> = self
            .cache
            .keys_for_user(
                &self.client_id,
                &request.authority,
                stored.user_id().unwrap_or(user.unique_id()),
            )
            .into_iter()
            .filter(|k| k != stored && k.tenant_id() == stored.tenant_id())
            .collect();

        for sibling in &siblings {
            self.cache.update_tenant_and_user(
                sibling,
                result.tenant_id().map(ToOwned::to_owned),
                result.id_token().map(ToOwned::to_owned),
                Some(user.clone()),
            );
        }

        if !siblings.is_empty() {
            tracing::debug!(
                updated = siblings.len(),
                "refreshed identity on sibling credentials"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use sigil_clock::{DurationSecs, TestClock, UnixTime};
    use sigil_http::{
        mock::{MockExchange, MockTransport},
        RetryableFailure,
    };
    use tracing_test::traced_test;

    use super::*;
    use crate::{id_token::tests::unsigned_id_token, ClientSecret, User};

    const NOW: UnixTime = UnixTime(1_700_000_000);
    const TOKEN_BODY: &str =
        r#"{"token_type":"Bearer","access_token":"some-access-token","expires_in":3599}"#;

    fn authority() -> Url {
        Url::parse("https://login.example.com/home").unwrap()
    }

    fn scopes() -> ScopeSet {
        ScopeSet::from_space_delimited("https://graph.example.com/.default")
    }

    fn cache() -> (Arc<TokenCacheStore<TestClock>>, TestClock) {
        let clock = TestClock::new(NOW);
        (
            Arc::new(TokenCacheStore::new().with_clock(clock.clone())),
            clock,
        )
    }

    fn flow<'a>(
        mock: &'a MockTransport,
        cache: &Arc<TokenCacheStore<TestClock>>,
    ) -> TokenAcquisitionFlow<&'a MockTransport, TestClock> {
        TokenAcquisitionFlow::new("client", HttpRequestPipeline::new(mock), Arc::clone(cache))
    }

    fn client_credentials() -> TokenRequest {
        TokenRequest::client_credentials(
            authority(),
            scopes(),
            &ClientSecret::from_static("hunter2"),
        )
    }

    #[tokio::test]
    async fn posts_to_the_token_endpoint() {
        let mock = MockTransport::new();
        mock.push(
            MockExchange::post()
                .expect_body(Parameters::from([
                    ("grant_type", "client_credentials"),
                    ("client_secret", "hunter2"),
                    ("client_id", "client"),
                    ("scope", "https://graph.example.com/.default"),
                ]))
                .respond_with(StatusCode::OK, TOKEN_BODY),
        );
        let (cache, _) = cache();

        let result = flow(&mock, &cache)
            .acquire_token(&client_credentials())
            .await
            .unwrap();

        assert_eq!(result.access_token().as_str(), "some-access-token");
        assert_eq!(result.expires_on(), NOW + DurationSecs(3599));
        assert_eq!(result.scope_set(), &scopes());
        assert_eq!(
            mock.requests()[0].url().as_str(),
            "https://login.example.com/home/oauth2/token"
        );
        mock.assert_drained();
    }

    #[test]
    fn endpoint_ignores_trailing_slashes() {
        let request = TokenRequest::new(
            Url::parse("https://login.example.com/home/").unwrap(),
            scopes(),
        );
        assert_eq!(
            request.token_endpoint().unwrap().as_str(),
            "https://login.example.com/home/oauth2/token"
        );
    }

    #[test]
    fn authorities_without_a_path_are_rejected() {
        let request = TokenRequest::new(Url::parse("urn:example:authority").unwrap(), scopes());
        assert!(matches!(
            request.token_endpoint(),
            Err(AcquireError::InvalidAuthority { .. })
        ));
    }

    #[tokio::test]
    async fn headers_are_forwarded() {
        let mock = MockTransport::new();
        mock.push(
            MockExchange::post()
                .expect_header("client-request-id", "req-1")
                .respond_with(StatusCode::OK, TOKEN_BODY),
        );
        let (cache, _) = cache();

        let request = client_credentials().with_header(
            HeaderName::from_static("client-request-id"),
            HeaderValue::from_static("req-1"),
        );
        flow(&mock, &cache).acquire_token(&request).await.unwrap();

        mock.assert_drained();
    }

    mod when_the_cache_has_a_credential {
        use super::*;

        #[tokio::test]
        #[traced_test]
        async fn repeated_requests_reuse_it() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let first = flow.acquire_token(&client_credentials()).await.unwrap();
            let second = flow.acquire_token(&client_credentials()).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(mock.request_count(), 1);
            assert!(logs_contain("cache hit"));
            mock.assert_drained();
        }

        #[tokio::test]
        async fn force_refresh_goes_to_the_authority() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                r#"{"access_token":"fresher","expires_in":3599}"#,
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            flow.acquire_token(&client_credentials()).await.unwrap();
            let refreshed = flow
                .acquire_token(&client_credentials().force_refresh(true))
                .await
                .unwrap();

            assert_eq!(refreshed.access_token().as_str(), "fresher");
            assert_eq!(cache.len(), 1);
            let cached = cache.lookup(&client_credentials().cache_key(flow.client_id()));
            assert_eq!(cached, Some(refreshed));
            mock.assert_drained();
        }

        #[tokio::test]
        async fn an_expired_credential_is_replaced() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                r#"{"access_token":"second","expires_in":3599}"#,
            ));
            let (cache, clock) = cache();
            let flow = flow(&mock, &cache);

            flow.acquire_token(&client_credentials()).await.unwrap();
            clock.advance(DurationSecs(3599));
            let second = flow.acquire_token(&client_credentials()).await.unwrap();

            assert_eq!(second.access_token().as_str(), "second");
            assert_eq!(second.expires_on(), NOW + DurationSecs(2 * 3599));
            mock.assert_drained();
        }

        #[tokio::test]
        async fn different_scopes_miss() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            flow.acquire_token(&client_credentials()).await.unwrap();
            let other = TokenRequest::client_credentials(
                authority(),
                ScopeSet::new().and("other.read"),
                &ClientSecret::from_static("hunter2"),
            );
            flow.acquire_token(&other).await.unwrap();

            assert_eq!(mock.request_count(), 2);
            assert_eq!(cache.len(), 2);
            mock.assert_drained();
        }
    }

    mod when_the_authority_fails {
        use super::*;

        #[tokio::test]
        async fn oauth_errors_are_parsed_and_not_cached() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_client","error_description":"bad secret","error_codes":[7000215],"correlation_id":"c-1"}"#,
            ));
            let (cache, _) = cache();

            let error = flow(&mock, &cache)
                .acquire_token(&client_credentials())
                .await
                .unwrap_err();

            assert_eq!(error.oauth_error(), Some("invalid_client"));
            assert_eq!(
                error.to_string(),
                "authority rejected the token request with 400 Bad Request: invalid_client: bad secret"
            );
            match error {
                AcquireError::Service { status, error, .. } => {
                    assert_eq!(status, StatusCode::BAD_REQUEST);
                    let error = error.unwrap();
                    assert_eq!(error.error_codes, vec![7000215]);
                    assert_eq!(error.correlation_id.as_deref(), Some("c-1"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(mock.request_count(), 1);
            assert!(cache.is_empty());
        }

        #[tokio::test]
        async fn unparseable_error_bodies_are_kept_verbatim() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::UNAUTHORIZED, "<html>nope</html>"));
            let (cache, _) = cache();

            let error = flow(&mock, &cache)
                .acquire_token(&client_credentials())
                .await
                .unwrap_err();

            assert!(matches!(
                &error,
                AcquireError::Service { error: None, body, .. } if body == "<html>nope</html>"
            ));
            assert_eq!(error.oauth_error(), None);
        }

        #[tokio::test]
        async fn transient_failures_are_retried_once() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::GATEWAY_TIMEOUT, ""));
            mock.push(MockExchange::post().respond_with(StatusCode::INTERNAL_SERVER_ERROR, ""));
            let (cache, _) = cache();

            let error = flow(&mock, &cache)
                .acquire_token(&client_credentials())
                .await
                .unwrap_err();

            assert!(matches!(
                error,
                AcquireError::Request(RequestError::RetryExhausted {
                    attempts: 2,
                    last: RetryableFailure::Status(_),
                })
            ));
            assert_eq!(mock.request_count(), 2);
            assert!(cache.is_empty());
            mock.assert_drained();
        }

        #[tokio::test]
        async fn a_transient_failure_followed_by_success_is_invisible() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().time_out());
            mock.push(MockExchange::post().respond_with(StatusCode::OK, TOKEN_BODY));
            let (cache, _) = cache();

            let result = flow(&mock, &cache)
                .acquire_token(&client_credentials())
                .await
                .unwrap();

            assert_eq!(result.access_token().as_str(), "some-access-token");
            assert_eq!(cache.len(), 1);
            mock.assert_drained();
        }

        #[tokio::test]
        async fn malformed_token_bodies_are_errors() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(StatusCode::OK, r#"{"token_type":"Bearer"}"#));
            let (cache, _) = cache();

            let error = flow(&mock, &cache)
                .acquire_token(&client_credentials())
                .await
                .unwrap_err();

            assert!(matches!(error, AcquireError::TokenBody(_)));
            assert!(cache.is_empty());
        }
    }

    mod when_the_authority_returns_identity {
        use super::*;

        fn body_with_id_token(access_token: &str, claims: serde_json::Value) -> String {
            serde_json::json!({
                "token_type": "Bearer",
                "access_token": access_token,
                "expires_in": 3600,
                "id_token": unsigned_id_token(claims).as_str(),
            })
            .to_string()
        }

        fn user_request(scopes: &str) -> TokenRequest {
            TokenRequest::new(authority(), ScopeSet::from_space_delimited(scopes))
                .with_body_parameter("grant_type", "refresh_token")
                .with_body_parameter("refresh_token", "r-1")
                .with_user_id("u1")
        }

        #[tokio::test]
        async fn the_credential_is_keyed_by_tenant_and_user() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token("a", serde_json::json!({ "tid": "t1", "oid": "u1" })),
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let result = flow.acquire_token(&user_request("read")).await.unwrap();

            assert_eq!(result.tenant_id().map(|t| t.as_str()), Some("t1"));
            let stored = user_request("read")
                .cache_key(flow.client_id())
                .with_tenant_id("t1");
            assert_eq!(cache.peek(&stored), Some(result.clone()));

            let again = flow.acquire_token(&user_request("read")).await.unwrap();
            assert_eq!(again, result);
            assert_eq!(mock.request_count(), 1);
        }

        #[tokio::test]
        async fn sibling_credentials_get_the_new_identity() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token("a", serde_json::json!({ "tid": "t1", "oid": "u1" })),
            ));
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token(
                    "b",
                    serde_json::json!({
                        "tid": "t1",
                        "oid": "u1",
                        "preferred_username": "someone@example.com",
                    }),
                ),
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let first = flow.acquire_token(&user_request("read")).await.unwrap();
            assert_eq!(first.user().and_then(User::displayable_id), None);

            flow.acquire_token(&user_request("write")).await.unwrap();

            let refreshed = flow.acquire_token(&user_request("read")).await.unwrap();
            assert_eq!(refreshed.access_token().as_str(), "a");
            assert_eq!(
                refreshed.user().and_then(User::displayable_id),
                Some("someone@example.com")
            );
            mock.assert_drained();
        }

        #[tokio::test]
        async fn a_refresh_with_identity_replaces_the_anonymous_entry() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                r#"{"access_token":"old","expires_in":3600}"#,
            ));
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token("new", serde_json::json!({ "tid": "t1", "oid": "u1" })),
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            flow.acquire_token(&user_request("read")).await.unwrap();
            let refreshed = flow
                .acquire_token(&user_request("read").force_refresh(true))
                .await
                .unwrap();
            let next = flow.acquire_token(&user_request("read")).await.unwrap();

            assert_eq!(refreshed.access_token().as_str(), "new");
            assert_eq!(next, refreshed);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.peek(&user_request("read").cache_key(flow.client_id())), None);
            mock.assert_drained();
        }

        #[tokio::test]
        async fn a_tenant_named_on_the_request_stays_on_the_key() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token("a", serde_json::json!({ "tid": "guid-1", "oid": "u1" })),
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let request = user_request("read").with_tenant_id("contoso.example.com");
            let first = flow.acquire_token(&request).await.unwrap();
            let second = flow.acquire_token(&request).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(first.tenant_id().map(|t| t.as_str()), Some("guid-1"));
            assert_eq!(mock.request_count(), 1);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.peek(&request.cache_key(flow.client_id())), Some(first));
            mock.assert_drained();
        }

        #[tokio::test]
        async fn credentials_in_other_tenants_keep_their_identity() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                body_with_id_token(
                    "a",
                    serde_json::json!({
                        "tid": "t1",
                        "oid": "u1",
                        "preferred_username": "someone@t1.example.com",
                    }),
                ),
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let other_tenant = user_request("write")
                .with_tenant_id("t2")
                .cache_key(flow.client_id());
            let elsewhere = AuthenticationResult::new("Bearer", "b", NOW + DurationSecs(3600))
                .with_tenant_id("t2")
                .with_user(User::new("u1"));
            cache.store(other_tenant.clone(), elsewhere.clone());

            flow.acquire_token(&user_request("write").with_tenant_id("t1"))
                .await
                .unwrap();

            assert_eq!(cache.peek(&other_tenant), Some(elsewhere));
            assert_eq!(cache.len(), 2);
            mock.assert_drained();
        }

        #[tokio::test]
        async fn identity_carries_over_when_the_authority_omits_it() {
            let mock = MockTransport::new();
            mock.push(MockExchange::post().respond_with(
                StatusCode::OK,
                r#"{"access_token":"second","expires_in":3600}"#,
            ));
            let (cache, _) = cache();
            let flow = flow(&mock, &cache);

            let request = user_request("read").with_tenant_id("t1");
            let key = request.cache_key(flow.client_id());
            cache.store(
                key.clone(),
                AuthenticationResult::new("Bearer", "first", NOW - DurationSecs(10))
                    .with_tenant_id("t1")
                    .with_user(User::new("u1").with_name("Some One")),
            );

            let result = flow.acquire_token(&request).await.unwrap();

            assert_eq!(result.access_token().as_str(), "second");
            assert_eq!(result.tenant_id().map(|t| t.as_str()), Some("t1"));
            assert_eq!(result.user().and_then(User::name), Some("Some One"));
            assert_eq!(cache.peek(&key), Some(result));
            mock.assert_drained();
        }
    }
}
