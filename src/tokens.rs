//! Access-token resolution.
//!
//! The connection manager only depends on the [`CredentialResolver`] trait.
//! [`TokenTable`] is the file-backed implementation used by the daemon.

use crate::auth::mask_token;
use crate::entry_file::EntryRecord;
use crate::models::Credential;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Number of fields in a token record: `token:backend:user:password:database`.
pub const TOKEN_RECORD_FIELDS: usize = 5;

/// Maps an opaque access token to backend credentials.
pub trait CredentialResolver: Send + Sync {
    /// Resolve a token, returning `None` when it is unknown.
    fn resolve(&self, token: &str) -> Option<Credential>;
}

/// In-memory token table, replaceable as a whole on reload.
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: RwLock<Arc<HashMap<String, Credential>>>,
}

impl TokenTable {
    /// Build a token table from raw records, skipping malformed ones.
    pub fn load(records: impl IntoIterator<Item = EntryRecord>) -> Self {
        Self {
            tokens: RwLock::new(Arc::new(Self::build(records))),
        }
    }

    fn build(records: impl IntoIterator<Item = EntryRecord>) -> HashMap<String, Credential> {
        let mut tokens = HashMap::new();
        for record in records {
            let [token, backend, user, password, database] = record.fields.as_slice() else {
                warn!(
                    line = record.line,
                    fields = record.fields.len(),
                    expected = TOKEN_RECORD_FIELDS,
                    "Invalid token entry"
                );
                continue;
            };
            if token.is_empty() {
                warn!(line = record.line, "Token entry with empty token skipped");
                continue;
            }
            if tokens
                .insert(
                    token.clone(),
                    Credential::new(backend, user, password, database),
                )
                .is_some()
            {
                warn!(
                    line = record.line,
                    token = %mask_token(token),
                    "Duplicate token entry, later definition wins"
                );
            }
        }
        debug!(count = tokens.len(), "Token table loaded");
        tokens
    }

    /// Replace every token with the contents of `other`.
    pub fn replace(&self, other: TokenTable) {
        let fresh = other.snapshot();
        match self.tokens.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    fn snapshot(&self) -> Arc<HashMap<String, Credential>> {
        match self.tokens.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl CredentialResolver for TokenTable {
    fn resolve(&self, token: &str) -> Option<Credential> {
        self.snapshot().get(token).cloned()
    }
}
