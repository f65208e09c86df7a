use serde::{Deserialize, Serialize};

use crate::{UserId, UserIdRef};

/// The principal a token was issued to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    unique_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    displayable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_provider: Option<String>,
}

impl User {
    /// Constructs a user known only by its unique identifier
    pub fn new(unique_id: impl Into<UserId>) -> Self {
        Self {
            unique_id: unique_id.into(),
            displayable_id: None,
            name: None,
            identity_provider: None,
        }
    }

    /// Sets the human-readable identifier, usually a sign-in name
    #[must_use]
    pub fn with_displayable_id(mut self, displayable_id: impl Into<String>) -> Self {
        self.displayable_id = Some(displayable_id.into());
        self
    }

    /// Sets the user's display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the issuer that authenticated the user
    #[must_use]
    pub fn with_identity_provider(mut self, identity_provider: impl Into<String>) -> Self {
        self.identity_provider = Some(identity_provider.into());
        self
    }

    /// The stable identifier used to key cached credentials
    #[inline]
    pub fn unique_id(&self) -> &UserIdRef {
        &self.unique_id
    }

    /// A human-readable identifier, such as `someone@example.com`
    #[inline]
    pub fn displayable_id(&self) -> Option<&str> {
        self.displayable_id.as_deref()
    }

    /// The user's display name
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The issuer that authenticated the user
    #[inline]
    pub fn identity_provider(&self) -> Option<&str> {
        self.identity_provider.as_deref()
    }
}
