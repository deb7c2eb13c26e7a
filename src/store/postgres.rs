use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::{debug, error, info};

use super::UserStore;
use crate::context::RequestContext;
use crate::error::{StoreError, StoreResult};
use crate::users::model::User;

/// Creates `users` and `todos` if absent, then adds any missing columns.
/// Never drops or rewrites existing columns.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Opens the store from a connection string and ensures the schema exists.
pub async fn initialize_store(connection_string: &str) -> StoreResult<PgStore> {
    let options = connection_string
        .parse::<PgConnectOptions>()
        .map_err(StoreError::Connection)?;
    initialize_store_with(options, PoolSettings::default()).await
}

pub async fn initialize_store_with(
    options: PgConnectOptions,
    settings: PoolSettings,
) -> StoreResult<PgStore> {
    let host = options.get_host().to_string();
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            error!(error = %e, %host, "connect to database failed");
            StoreError::Connection(e)
        })?;

    MIGRATOR.run(&pool).await.map_err(|e| {
        error!(error = %e, "schema migration failed");
        StoreError::Migration(e)
    })?;

    info!(%host, "store initialized");
    Ok(PgStore { pool })
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool that connects on first use; nothing is checked up front.
    pub fn connect_lazy(options: PgConnectOptions, settings: PoolSettings) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(options);
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Slack added to the server-side statement timeout so the client deadline
/// fires first and the error is reported as a cancellation.
const STATEMENT_TIMEOUT_SLACK: Duration = Duration::from_millis(100);

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        let mut tx = ctx
            .run(async { self.pool.begin().await.map_err(StoreError::Persistence) })
            .await?;

        if let Some(remaining) = ctx.remaining() {
            let timeout_ms = (remaining + STATEMENT_TIMEOUT_SLACK).as_millis().to_string();
            ctx.run(async {
                sqlx::query("SELECT set_config('statement_timeout', $1, true)")
                    .bind(timeout_ms)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::Persistence)
            })
            .await?;
        }

        let inserted = ctx
            .run(async {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, username, first_name, last_name, email, password)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(&user.id)
                .bind(&user.username)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.email)
                .bind(&user.password)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::Persistence)
            })
            .await;
        if let Err(e) = inserted {
            // A server-side statement timeout is still the caller's deadline.
            ctx.check()?;
            return Err(e);
        }

        // Dropping `tx` on any early return rolls the insert back.
        ctx.check()?;
        tx.commit().await.map_err(StoreError::Persistence)?;
        debug!(user_id = %user.id, "user row committed");
        Ok(())
    }

    async fn list_users(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        ctx.run(async {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, first_name, last_name, email, password
                FROM users
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Persistence)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn unreachable_options() -> PgConnectOptions {
        PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("postgres")
            .password("postgres")
            .database("postgres")
    }

    fn short_settings() -> PoolSettings {
        PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn initialize_against_unreachable_host_is_connection_error() {
        let err = initialize_store_with(unreachable_options(), short_settings())
            .await
            .err()
            .expect("connect should fail");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn malformed_connection_string_is_connection_error() {
        let err = initialize_store("definitely not a url")
            .await
            .err()
            .expect("parse should fail");
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[tokio::test]
    async fn operations_on_unreachable_store_are_persistence_errors() {
        let store = PgStore::connect_lazy(unreachable_options(), short_settings());
        let user = User::from_input(Default::default());

        let ctx = RequestContext::background();

        let err = store.insert_user(&ctx, &user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let err = store.list_users(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
