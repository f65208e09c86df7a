use std::fmt;

use aliri_braid::braid;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// A client ID
#[braid(serde)]
pub struct ClientId;

/// A client secret
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

limited_reveal!(ClientSecretRef: "CLIENT SECRET", 5);

/// An access token
///
/// Opaque to this crate. Only the authority and the resource server need to
/// understand its contents.
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A refresh token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

/// An OpenID Connect ID token
#[braid(serde)]
pub struct IdToken;

/// The type of an access token, such as `Bearer`
#[braid(serde)]
pub struct TokenType;

/// A directory tenant
#[braid(serde)]
pub struct TenantId;

/// The unique identifier of a user within an identity provider
#[braid(serde)]
pub struct UserId;

/// Groups clients that may share refresh tokens with one another
#[braid(serde)]
pub struct FamilyId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let token = AccessToken::from_static("eyJhbGciOiJub25lIn0.e30.");
        assert_eq!(format!("{token:?}"), "***ACCESS TOKEN***");
        assert_eq!(format!("{token}"), "***ACCESS TOKEN***");

        let secret = ClientSecret::from_static("hunter2");
        assert_eq!(format!("{secret}"), "***CLIENT SECRET***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let secret = ClientSecret::from_static("hunter2");
        assert_eq!(format!("{secret:#?}"), "\"hunt…\"");
        assert_eq!(format!("{secret:#3?}"), "\"hu…\"");
    }

    #[test]
    fn alternate_display_reveals_everything() {
        let token = RefreshToken::from_static("r-123456789");
        assert_eq!(format!("{token:#}"), "r-123456789");
    }

    #[test]
    fn short_values_are_shown_whole() {
        let secret = ClientSecret::from_static("abc");
        assert_eq!(format!("{secret:#?}"), "\"abc\"");
    }

    #[test]
    fn identifiers_are_not_hidden() {
        let user = UserId::from_static("00000000-0000-0000-0000-000000000001");
        assert_eq!(
            format!("{user:?}"),
            "\"00000000-0000-0000-0000-000000000001\""
        );
    }
}
