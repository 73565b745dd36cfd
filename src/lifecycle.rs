//! Loading and hot-reloading the backend registry and token table.

use crate::db::{ConnectionManager, Connector};
use crate::entry_file::read_entry_file;
use crate::error::GatewayResult;
use crate::registry::BackendRegistry;
use crate::tokens::TokenTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Read the backend registry file.
pub fn load_backends(path: impl AsRef<Path>) -> GatewayResult<BackendRegistry> {
    let path = path.as_ref();
    let registry = BackendRegistry::load(read_entry_file(path)?);
    info!(path = %path.display(), count = registry.len(), "Loaded backend registry");
    Ok(registry)
}

/// Read the token table file.
pub fn load_tokens(path: impl AsRef<Path>) -> GatewayResult<TokenTable> {
    let path = path.as_ref();
    let tokens = TokenTable::load(read_entry_file(path)?);
    info!(path = %path.display(), count = tokens.len(), "Loaded token table");
    Ok(tokens)
}

/// Entry files that can be re-read at runtime.
#[derive(Debug, Clone)]
pub struct Reloader {
    backends_file: PathBuf,
    tokens_file: PathBuf,
}

impl Reloader {
    pub fn new(backends_file: impl Into<PathBuf>, tokens_file: impl Into<PathBuf>) -> Self {
        Self {
            backends_file: backends_file.into(),
            tokens_file: tokens_file.into(),
        }
    }

    /// Re-read both files, publish them, then drop every cached connection.
    ///
    /// Both files are read before anything is swapped; if either read fails
    /// the running configuration is left untouched.
    pub async fn reload<C: Connector>(
        &self,
        tokens: &TokenTable,
        connections: &ConnectionManager<C>,
    ) -> GatewayResult<()> {
        let registry = load_backends(&self.backends_file)?;
        let fresh_tokens = load_tokens(&self.tokens_file)?;

        connections.replace_backends(registry);
        tokens.replace(fresh_tokens);
        connections.close_all().await;

        info!("Configuration reloaded");
        Ok(())
    }

    /// Reload on every SIGHUP until the process exits.
    #[cfg(unix)]
    pub fn spawn_on_hangup<C: Connector>(
        self,
        tokens: Arc<TokenTable>,
        connections: Arc<ConnectionManager<C>>,
    ) -> GatewayResult<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangup = signal(SignalKind::hangup()).map_err(|e| {
            crate::error::GatewayError::internal(format!("Failed to install SIGHUP handler: {}", e))
        })?;

        Ok(tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("Received SIGHUP, reloading configuration");
                if let Err(e) = self.reload(&tokens, &connections).await {
                    error!(error = %e, "Reload failed, keeping previous configuration");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::tokens::CredentialResolver;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_backends("/nonexistent/prqld/databases.conf");
        assert!(matches!(result, Err(GatewayError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_reload_swaps_tables() {
        let dir = TempDir::new().unwrap();
        let backends = write(&dir, "databases.conf", "main:sqlite:/tmp:0:false\n");
        let token_file = write(&dir, "tokens.conf", "old:main:u:p:db\n");

        let tokens = Arc::new(load_tokens(&token_file).unwrap());
        let manager = ConnectionManager::new(
            crate::db::SqlxConnector::default(),
            load_backends(&backends).unwrap(),
            tokens.clone(),
        );
        assert!(tokens.resolve("old").is_some());

        write(&dir, "databases.conf", "main:sqlite:/tmp:0:false\nextra:mysql:db:3306:true\n");
        write(&dir, "tokens.conf", "new:extra:u:p:db\n");

        let reloader = Reloader::new(&backends, &token_file);
        reloader.reload(&tokens, &manager).await.unwrap();

        assert!(tokens.resolve("old").is_none());
        assert!(tokens.resolve("new").is_some());
        assert!(manager.backends().contains("extra"));
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_configuration() {
        let dir = TempDir::new().unwrap();
        let backends = write(&dir, "databases.conf", "main:postgres:db:5432:false\n");
        let token_file = write(&dir, "tokens.conf", "tok:main:u:p:db\n");

        let tokens = Arc::new(load_tokens(&token_file).unwrap());
        let manager = ConnectionManager::new(
            crate::db::SqlxConnector::default(),
            load_backends(&backends).unwrap(),
            tokens.clone(),
        );

        let reloader = Reloader::new(&backends, dir.path().join("missing.conf"));
        assert!(reloader.reload(&tokens, &manager).await.is_err());
        assert!(tokens.resolve("tok").is_some());
        assert!(manager.backends().contains("main"));
    }
}
