use serde::{Deserialize, Serialize};

/// Account credentials sent with every stream and API request
///
/// Immutable for the lifetime of a consumer. The API key never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    username: String,
    api_key: String,
    user_agent: String,
}

impl Credentials {
    /// Create credentials with an explicit user agent
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Account username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// User agent identifying the client library
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Value of the `Auth` header: `username:api_key`
    pub fn auth_header(&self) -> String {
        format!("{}:{}", self.username, self.api_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header() {
        let creds = Credentials::new("alice", "k3y", "test/1.0");
        assert_eq!(creds.auth_header(), "alice:k3y");
        assert_eq!(creds.user_agent(), "test/1.0");
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new("alice", "super-secret", "test/1.0");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("super-secret"));
    }
}
