//! Per-database connection pools behind a single shared cache.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use log::{debug, trace};
use tokio::sync::Mutex;

use super::{
    ClientConfig, ClientError, DatabaseRepository, EventTriggerRepository, Result, RoleRepository,
    UserFunctionRepository,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RECYCLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared entry point to the server: one pooled handle per target database.
pub struct PgClient {
    config: ClientConfig,
    connections: Mutex<HashMap<String, PgConnection>>,
}

impl PgClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration the client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Return the cached handle for `target_db` (the configured database when
    /// `None` or empty), opening and pinging a new one on first use.
    pub async fn get_connection(&self, target_db: Option<&str>) -> Result<PgConnection> {
        let config = match target_db.filter(|db| !db.is_empty()) {
            Some(db) => self.config.for_database(db),
            None => self.config.clone(),
        };
        let key = config.to_connection_string();

        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.get(&key) {
            trace!("reusing connection to database '{}'", config.database);
            return Ok(conn.clone());
        }

        debug!("opening connection {}", config.redacted_connection_string());
        let conn = PgConnection::open(config).await?;
        connections.insert(key, conn.clone());
        Ok(conn)
    }

    pub async fn cached_connections(&self) -> usize {
        self.connections.lock().await.len()
    }
}

/// A pooled handle to one database. Cloning shares the pool.
#[derive(Clone)]
pub struct PgConnection {
    pool: Pool,
    config: ClientConfig,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("database", &self.config.database)
            .field("status", &self.pool.status())
            .finish()
    }
}

impl PgConnection {
    async fn open(config: ClientConfig) -> Result<Self> {
        let manager = Manager::from_config(
            config.pg_config(),
            config.tls_connector()?,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let max_size = match config.max_open_conn {
            0 => PoolConfig::default().max_size,
            n => n as usize,
        };
        let pool = Pool::builder(manager)
            .config(PoolConfig {
                max_size,
                timeouts: Timeouts {
                    wait: Some(CONNECT_TIMEOUT),
                    create: Some(CONNECT_TIMEOUT),
                    recycle: Some(RECYCLE_TIMEOUT),
                },
                ..Default::default()
            })
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| ClientError::Connection {
                database: config.database.clone(),
                message: config.redact(&e.to_string()),
            })?;

        let conn = PgConnection { pool, config };
        conn.ping().await?;
        Ok(conn)
    }

    async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(|e| ClientError::Connection {
            database: self.config.database.clone(),
            message: self.config.redact(&e.to_string()),
        })?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ClientError::Ping {
                database: self.config.database.clone(),
                message: self.config.redact(&e.to_string()),
            })?;
        Ok(())
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Check out a client, releasing idle connections beyond `max_idle_conn`.
    pub(crate) async fn client(&self) -> Result<Object> {
        let client = self.pool.get().await.map_err(|e| ClientError::Pool {
            database: self.config.database.clone(),
            message: self.config.redact(&e.to_string()),
        })?;
        self.trim_idle();
        Ok(client)
    }

    fn trim_idle(&self) {
        let max_idle = self.config.max_idle_conn as usize;
        let idle = usize::try_from(self.pool.status().available).unwrap_or(0);
        if idle <= max_idle {
            return;
        }
        let kept = Cell::new(0usize);
        let _ = self.pool.retain(|_, _| {
            let n = kept.get();
            kept.set(n + 1);
            n < max_idle
        });
        trace!(
            "released {} idle connections to database '{}'",
            idle - max_idle,
            self.config.database
        );
    }

    pub fn event_triggers(&self) -> EventTriggerRepository {
        EventTriggerRepository::new(self.clone())
    }

    pub fn functions(&self) -> UserFunctionRepository {
        UserFunctionRepository::new(self.clone())
    }

    pub fn databases(&self) -> DatabaseRepository {
        DatabaseRepository::new(self.clone())
    }

    pub fn roles(&self) -> RoleRepository {
        RoleRepository::new(self.clone())
    }
}
