//! Resolved token credentials.

/// Credentials a token resolves to: which backend to reach and how to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Name of the backend in the registry.
    pub backend: String,
    pub user: String,
    /// Contains sensitive data - never log
    pub password: String,
    pub database: String,
}

impl Credential {
    pub fn new(
        backend: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("backend", &self.backend)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}
