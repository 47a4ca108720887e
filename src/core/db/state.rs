use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::{RwLock, RwLockReadGuard};

use std::{
    ops::{Deref, DerefMut},
    path::Path,
    str::FromStr,
};
use anyhow::Context;

const MEMORY_URL_MARKER: &str = ":memory:";

pub(super) struct RegistryState {
    url: String,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryState")
            .field("url", &self.url)
            .finish()
    }
}

impl RegistryState {
    /// Acquire a pooled connection and hold the pool read lock for the entire lifetime
    /// of the returned guard.
    pub(super) async fn conn(&self) -> Result<DbConnGuard<'_>, sqlx::Error> {
        let pool_guard = self.pool.read().await;

        // The read lock stays held inside the guard so `close` waits for in-flight queries.
        let conn = pool_guard.acquire().await?;

        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    /// Waits for in-flight queries, then closes the pool. Later lookups fail
    /// with `PoolClosed`.
    pub(super) async fn close(&self) {
        let pool_guard = self.pool.write().await;
        if !self.is_memory() {
            if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
                .execute(&*pool_guard)
                .await
            {
                tracing::warn!("WAL checkpoint before close failed: {}", e);
            }
        }
        pool_guard.close().await;
    }

    fn is_memory(&self) -> bool {
        self.url.contains(MEMORY_URL_MARKER)
    }

    pub(super) async fn open_path<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        let db_file = db_file.as_ref();
        if let Some(parent) = db_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                anyhow::bail!("Registry directory does not exist: {:?}", parent);
            }
        }
        let connect_opts = SqliteConnectOptions::new().filename(db_file);
        Self::connect(db_file.display().to_string(), connect_opts).await
    }

    pub(super) async fn open_url(url: &str) -> anyhow::Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid registry URL {:?}", url))?;
        Self::connect(url.to_string(), connect_opts).await
    }

    async fn connect(url: String, connect_opts: SqliteConnectOptions) -> anyhow::Result<Self> {
        let memory = url.contains(MEMORY_URL_MARKER);
        let connect_opts = connect_opts
            .create_if_missing(true)
            .journal_mode(if memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool_opts = if memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_opts
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("Failed to open registry {:?}", url))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to apply registry migrations")?;
        Ok(Self {
            url,
            pool: RwLock::new(pool),
        })
    }
}

pub(super) struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
