//! DTOs for interacting with OAuth2 token endpoints

use serde::{Deserialize, Deserializer, Serialize};
use sigil_clock::DurationSecs;

use crate::{AccessToken, FamilyId, IdToken, RefreshToken, ScopeSet, TokenType};

/// A successful reply from a token endpoint
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    /// The type of the issued token, usually `Bearer`
    #[serde(default = "default_token_type")]
    pub token_type: TokenType,

    /// The access token
    pub access_token: AccessToken,

    /// Seconds until the access token expires
    #[serde(deserialize_with = "lenient_seconds")]
    pub expires_in: DurationSecs,

    /// Scopes granted, when they differ from those requested or the
    /// authority chooses to echo them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeSet>,

    /// A refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,

    /// An OpenID Connect ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,

    /// The family of clients allowed to share the refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foci: Option<FamilyId>,
}

fn default_token_type() -> TokenType {
    TokenType::from_static("Bearer")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecondsDto {
    Number(u64),
    String(String),
}

/// Some authorities send `expires_in` as a JSON string
fn lenient_seconds<'de, D>(deserializer: D) -> Result<DurationSecs, D::Error>
where
    D: Deserializer<'de>,
{
    match SecondsDto::deserialize(deserializer)? {
        SecondsDto::Number(n) => Ok(DurationSecs(n)),
        SecondsDto::String(s) => s
            .trim()
            .parse()
            .map(DurationSecs)
            .map_err(serde::de::Error::custom),
    }
}

/// An error reply from a token endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// The OAuth2 error code, such as `invalid_grant`
    pub error: String,

    /// A human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Authority-specific numeric error codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<i64>,

    /// A correlation identifier for support requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_response() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":3599}"#).unwrap();
        assert_eq!(response.token_type.as_str(), "Bearer");
        assert_eq!(response.expires_in, DurationSecs(3599));
        assert!(response.scope.is_none());
        assert!(response.id_token.is_none());
    }

    #[test]
    fn accepts_expires_in_as_a_string() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","access_token":"abc","expires_in":"3600","foci":"1"}"#,
        )
        .unwrap();
        assert_eq!(response.expires_in, DurationSecs(3600));
        assert_eq!(response.foci.as_deref().map(|f| f.as_str()), Some("1"));
    }

    #[test]
    fn rejects_a_non_numeric_expiry() {
        let result =
            serde_json::from_str::<TokenResponse>(r#"{"access_token":"abc","expires_in":"soon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn parses_granted_scopes() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_in":60,"scope":"openid profile"}"#,
        )
        .unwrap();
        assert_eq!(
            response.scope,
            Some(ScopeSet::new().and("profile").and("openid"))
        );
    }

    #[test]
    fn parses_an_error_reply() {
        let error: ErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"AADSTS70000: expired","error_codes":[70000],"correlation_id":"c-1","trace_id":"t-1"}"#,
        )
        .unwrap();
        assert_eq!(error.error, "invalid_grant");
        assert_eq!(error.error_codes, vec![70000]);
        assert_eq!(error.correlation_id.as_deref(), Some("c-1"));
    }
}
