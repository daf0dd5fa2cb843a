//! Authentication hook.
//!
//! Holdout does not issue identities. Whatever sits in front of it (an
//! OAuth proxy, a signed cookie, a JWT issuer) hands the client a token;
//! the client sends it in `Hello` and an [`Authenticator`] turns it into a
//! [`UserId`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use holdout_protocol::UserId;

use crate::SessionError;

/// Validates a client's token and returns the user behind it.
///
/// ```rust
/// use holdout_protocol::UserId;
/// use holdout_session::{Authenticator, SessionError};
///
/// /// Treats the token as a numeric user id. Tests only.
/// struct NumericAuthenticator;
///
/// impl Authenticator for NumericAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserId, SessionError> {
///         token
///             .parse()
///             .map(UserId)
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserId, SessionError>> + Send;
}

/// Trusts any well-formed token as an opaque user key.
///
/// The same token always maps to the same [`UserId`] for the lifetime of
/// the process, which is what a browser cookie gives you. Suitable for
/// development and for deployments where an upstream proxy has already
/// authenticated the request.
#[derive(Debug, Default)]
pub struct OpaqueTokenAuthenticator {
    users: Mutex<HashMap<String, UserId>>,
}

/// Longest accepted token.
pub const MAX_TOKEN_LEN: usize = 256;

impl OpaqueTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Authenticator for OpaqueTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<UserId, SessionError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(SessionError::AuthFailed(format!(
                "token must be 1..={MAX_TOKEN_LEN} bytes"
            )));
        }
        if !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(SessionError::AuthFailed(
                "token must be printable ascii".into(),
            ));
        }

        let mut users =
            self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let next = UserId(users.len() as u64 + 1);
        let user = *users.entry(token.to_string()).or_insert(next);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_token_same_user() {
        let auth = OpaqueTokenAuthenticator::new();
        let a = auth.authenticate("cookie-a").await.unwrap();
        let b = auth.authenticate("cookie-b").await.unwrap();
        let a_again = auth.authenticate("cookie-a").await.unwrap();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_tokens() {
        let auth = OpaqueTokenAuthenticator::new();
        assert!(matches!(
            auth.authenticate("").await,
            Err(SessionError::AuthFailed(_))
        ));
        let long = "x".repeat(MAX_TOKEN_LEN + 1);
        assert!(auth.authenticate(&long).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_whitespace() {
        let auth = OpaqueTokenAuthenticator::new();
        assert!(auth.authenticate("has space").await.is_err());
    }
}
