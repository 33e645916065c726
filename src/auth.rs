use std::fmt;

/// Decides whether an operator login is accepted.
pub trait AuthPolicy: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Accepts exactly one configured username/password pair.
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl AuthPolicy for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        // An unset pair never matches, even against empty input
        if self.username.is_empty() || self.password.is_empty() {
            return false;
        }
        username == self.username && password == self.password
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configured_pair_verifies() {
        let policy = StaticCredentials::new("operator", "s3cret!");

        assert!(policy.verify("operator", "s3cret!"));
        assert!(!policy.verify("Operator", "s3cret!"));
        assert!(!policy.verify("operator", "S3CRET!"));
        assert!(!policy.verify("operator", ""));
        assert!(!policy.verify("", "s3cret!"));
        assert!(!policy.verify("", ""));
        assert!(!policy.verify("operator ", "s3cret!"));
    }

    #[test]
    fn test_empty_configuration_rejects_empty_input() {
        let policy = StaticCredentials::new("", "");
        assert!(!policy.verify("", ""));
    }

    #[test]
    fn test_debug_redacts_password() {
        let policy = StaticCredentials::new("operator", "s3cret!");
        let rendered = format!("{:?}", policy);
        assert!(!rendered.contains("s3cret!"));
    }
}
