//! Catalog Query Executor
//!
//! The single I/O boundary of the engine: issues parameterized read-only
//! queries against the database catalog and returns tabular rows. Holds a
//! connection pool and a bounded per-query timeout; connections return to
//! the pool on every exit path. No business logic lives here.

use crate::config::DatabaseConfig;
use crate::error::{EngineError, EngineResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

/// Default per-query timeout when none is configured
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Executor handle over a PostgreSQL connection pool
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct CatalogExecutor {
    pool: Pool,
    query_timeout: Duration,
}

impl CatalogExecutor {
    /// Connect to the database described by `config` and verify the
    /// connection with a probe query.
    ///
    /// Connectivity and authentication failures surface immediately as
    /// [`EngineError::Connection`]; the engine never retries them.
    pub async fn connect(config: &DatabaseConfig, query_timeout_secs: u64) -> EngineResult<Self> {
        let pool = create_pool(config)?;

        let client = pool
            .get()
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to connect: {}", e)))?;
        client
            .query_one("SELECT 1 AS ok", &[])
            .await
            .map_err(|e| EngineError::Connection(format!("Connection test failed: {}", e)))?;
        drop(client);

        info!(
            "Connected to {}:{}/{} (TLS: {})",
            config.host, config.port, config.database, config.use_tls
        );

        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        })
    }

    /// Wrap an existing pool (e.g. one shared with other subsystems).
    pub fn from_pool(pool: Pool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        }
    }

    /// Execute a parameterized catalog query and return its rows.
    ///
    /// The query runs under a bounded timeout; on expiry it is abandoned
    /// (not retried) and surfaced as [`EngineError::QueryTimeout`].
    pub async fn execute(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EngineResult<Vec<Row>> {
        let work = async {
            let client = self.pool.get().await?;
            let rows = client.query(query, params).await?;
            Ok::<_, EngineError>(rows)
        };

        match timeout(self.query_timeout, work).await {
            Ok(result) => {
                let rows = result?;
                debug!("Catalog query returned {} rows", rows.len());
                Ok(rows)
            }
            Err(_) => Err(EngineError::QueryTimeout {
                timeout_secs: self.query_timeout.as_secs(),
                context: summarize_query(query),
            }),
        }
    }

    /// Execute a caller-supplied statement after checking it is read-only.
    ///
    /// Only `SELECT`, `EXPLAIN` and `SHOW` statements are accepted.
    pub async fn execute_readonly(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EngineResult<Vec<Row>> {
        if !is_readonly_statement(query) {
            return Err(EngineError::ReadOnlyViolation(
                "Only SELECT, EXPLAIN or SHOW statements are allowed".to_string(),
            ));
        }
        self.execute(query, params).await
    }

    /// Test connectivity without keeping the pool: latency and server version.
    pub async fn test_connection(config: &DatabaseConfig) -> EngineResult<ConnectionTestResult> {
        let pool = create_pool(config)?;

        let start = std::time::Instant::now();

        let client = pool
            .get()
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to connect: {}", e)))?;

        let row = client.query_one("SELECT version()", &[]).await?;
        let version: String = row.get(0);

        let latency = start.elapsed();

        Ok(ConnectionTestResult {
            success: true,
            latency_ms: latency.as_millis() as u64,
            server_version: version,
            database: config.database.clone(),
            host: config.host.clone(),
        })
    }
}

/// Create a connection pool for the given parameters
fn create_pool(config: &DatabaseConfig) -> EngineResult<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    if config.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| EngineError::Config(format!("Failed to create TLS pool: {}", e)))
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| EngineError::Config(format!("Failed to create pool: {}", e)))
    }
}

/// True if the statement is one the read-only contract accepts.
pub fn is_readonly_statement(sql: &str) -> bool {
    let normalized = sql.trim_start().to_lowercase();
    normalized.starts_with("select")
        || normalized.starts_with("explain")
        || normalized.starts_with("show")
}

/// Short query context for timeout errors
fn summarize_query(query: &str) -> String {
    let flat = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 80 {
        format!("{}...", flat.chars().take(80).collect::<String>())
    } else {
        flat
    }
}

/// Result of testing a connection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub latency_ms: u64,
    pub server_version: String,
    pub database: String,
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readonly_statement_guard() {
        assert!(is_readonly_statement("SELECT * FROM users"));
        assert!(is_readonly_statement("  select 1"));
        assert!(is_readonly_statement("EXPLAIN SELECT 1"));
        assert!(is_readonly_statement("SHOW server_version"));

        assert!(!is_readonly_statement("INSERT INTO users VALUES (1)"));
        assert!(!is_readonly_statement("DROP TABLE users"));
        assert!(!is_readonly_statement("UPDATE users SET name = 'x'"));
        assert!(!is_readonly_statement(
            "WITH x AS (DELETE FROM users RETURNING *) SELECT * FROM x"
        ));
    }

    #[test]
    fn test_summarize_query_truncates() {
        let long = format!("SELECT {} FROM t", "column_name, ".repeat(20));
        let summary = summarize_query(&long);
        assert!(summary.len() <= 83);
        assert!(summary.ends_with("..."));

        assert_eq!(summarize_query("SELECT   1"), "SELECT 1");
    }
}
