//! Caller verification.
//!
//! The service asks a [`TokenVerifier`] whether a request may proceed. The
//! only implementation shipped is [`AllowAll`], a placeholder that accepts
//! every caller; deployments exposed beyond a trusted network must inject a
//! real verifier.

/// Decides whether a request token is acceptable.
pub trait TokenVerifier: Send + Sync {
    /// Return `true` if the caller presenting `token` may be served.
    fn verify(&self, token: Option<&str>) -> bool;
}

/// Accepts every token, including none.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl TokenVerifier for AllowAll {
    fn verify(&self, _token: Option<&str>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_accepts_anything() {
        assert!(AllowAll.verify(None));
        assert!(AllowAll.verify(Some("")));
        assert!(AllowAll.verify(Some("whatever")));
    }
}
