//! Identity claims carried by an OpenID Connect ID token
//!
//! The claims are read without verifying the token's signature. They are only
//! used to label cached credentials with the tenant and user they belong to;
//! the ID token itself was received directly from the authority over TLS.

use aliri_base64::Base64Url;
use serde::Deserialize;
use thiserror::Error;

use crate::{IdTokenRef, TenantId, TenantIdRef, User, UserId, UserIdRef};

/// An ID token that could not be decoded
#[derive(Debug, Error)]
pub enum IdTokenError {
    /// The token is not a compact JWT with three segments
    #[error("ID token is not a compact JWT")]
    Malformed,
    /// The payload segment is not valid base64url
    #[error("ID token payload is not valid base64url")]
    Encoding(#[from] aliri_base64::InvalidBase64Data),
    /// The payload is not a JSON claims object
    #[error("ID token payload is not a JSON claims object")]
    Claims(#[from] serde_json::Error),
}

/// Identity claims used to label a cached credential
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    tid: Option<TenantId>,
    #[serde(default)]
    oid: Option<UserId>,
    #[serde(default)]
    sub: Option<UserId>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    upn: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    iss: Option<String>,
}

impl IdTokenClaims {
    /// The tenant that issued the token (`tid`)
    pub fn tenant_id(&self) -> Option<&TenantIdRef> {
        self.tid.as_deref()
    }

    /// The user's stable identifier
    ///
    /// Prefers the object identifier (`oid`) and falls back to the subject
    /// (`sub`).
    pub fn unique_id(&self) -> Option<&UserIdRef> {
        self.oid.as_deref().or(self.sub.as_deref())
    }

    /// The user's sign-in name (`preferred_username`, then `upn`)
    pub fn displayable_id(&self) -> Option<&str> {
        self.preferred_username
            .as_deref()
            .or(self.upn.as_deref())
    }

    /// The user's display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The issuer (`iss`)
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref()
    }

    /// The user described by these claims, if they identify one
    pub fn user(&self) -> Option<User> {
        let mut user = User::new(self.unique_id()?.to_owned());
        if let Some(displayable_id) = self.displayable_id() {
            user = user.with_displayable_id(displayable_id);
        }
        if let Some(name) = self.name() {
            user = user.with_name(name);
        }
        if let Some(issuer) = self.issuer() {
            user = user.with_identity_provider(issuer);
        }
        Some(user)
    }
}

impl IdTokenRef {
    /// Decodes the identity claims without verifying the signature
    pub fn claims(&self) -> Result<IdTokenClaims, IdTokenError> {
        let mut segments = self.as_str().split('.');
        let payload = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(_header), Some(payload), Some(_signature), None) => payload,
            _ => return Err(IdTokenError::Malformed),
        };
        let raw = Base64Url::from_encoded(payload)?;
        let claims = serde_json::from_slice(raw.as_slice())?;
        Ok(claims)
    }
}
