//! Endpoint classification for credential attachment

use serde::{Deserialize, Serialize};

/// What a request needs attached before it is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    /// Password login: no session credential
    Login,
    /// User registration: optional one-time credential
    Registration,
    /// Token refresh: the refresh token
    TokenRefresh,
    /// Everything else: the current access token
    Authenticated,
}

/// Maps request paths to [`EndpointKind`] by prefix.
///
/// Paths not matching any configured prefix are [`EndpointKind::Authenticated`].
#[derive(Debug, Clone, Default)]
pub struct EndpointPolicy {
    rules: Vec<(String, EndpointKind)>,
}

impl EndpointPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_login_path(self, prefix: impl Into<String>) -> Self {
        self.with_rule(prefix, EndpointKind::Login)
    }

    #[must_use]
    pub fn with_registration_path(self, prefix: impl Into<String>) -> Self {
        self.with_rule(prefix, EndpointKind::Registration)
    }

    #[must_use]
    pub fn with_refresh_path(self, prefix: impl Into<String>) -> Self {
        self.with_rule(prefix, EndpointKind::TokenRefresh)
    }

    fn with_rule(mut self, prefix: impl Into<String>, kind: EndpointKind) -> Self {
        self.rules.push((prefix.into(), kind));
        // Longest prefix first so "/oauth/token/refresh" wins over "/oauth/token".
        self.rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> EndpointKind {
        self.rules
            .iter()
            .find(|(prefix, _)| matches_prefix(path, prefix))
            .map_or(EndpointKind::Authenticated, |(_, kind)| *kind)
    }
}

/// Whole-segment prefix match: `/oauth/token` covers `/oauth/token/x` and
/// `/oauth/token?y` but not `/oauth/tokenize`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix.trim_end_matches('/')) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_longest_prefix() {
        let policy = EndpointPolicy::new()
            .with_login_path("/oauth/token")
            .with_refresh_path("/oauth/token/refresh")
            .with_registration_path("/users/register");

        assert_eq!(policy.classify("/oauth/token"), EndpointKind::Login);
        assert_eq!(policy.classify("/oauth/token/refresh"), EndpointKind::TokenRefresh);
        assert_eq!(policy.classify("/users/register"), EndpointKind::Registration);
        assert_eq!(policy.classify("/messages"), EndpointKind::Authenticated);
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let policy = EndpointPolicy::new().with_login_path("/oauth/token");

        assert_eq!(policy.classify("/oauth/token?grant=password"), EndpointKind::Login);
        assert_eq!(policy.classify("/oauth/token/"), EndpointKind::Login);
        assert_eq!(policy.classify("/oauth/tokenize"), EndpointKind::Authenticated);
        assert_eq!(policy.classify("/oauth/tokens/42"), EndpointKind::Authenticated);
    }
}
