use anyhow::Context;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::MysqlConfig;
use crate::counter::CounterStore;

// Same table the service has always written; IF NOT EXISTS makes repeated
// setup runs safe.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS num \
     (cnt BIGINT UNSIGNED DEFAULT '0') \
     ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// Mysql handle for the persisted counter row.
pub struct MysqlStore {
    pool: MySqlPool,
}

impl MysqlStore {
    /// Build a lazy pool: no connection is attempted until the first query,
    /// so boot never blocks on or fails against a database that is still
    /// coming up.
    pub fn connect(config: &MysqlConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.dbname);
        // Keep credentials out of the logs.
        tracing::info!(
            "mysql target {}:{}/{}",
            config.host,
            config.port,
            config.dbname
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect_lazy_with(options);

        Self { pool }
    }
}

#[async_trait::async_trait]
impl CounterStore for MysqlStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .with_context(|| "create counter table")?;

        // The flush path updates in place, so the single row has to exist up
        // front or those updates would persist nothing.
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM num")
            .fetch_one(&self.pool)
            .await
            .with_context(|| "count counter rows")?;
        if rows == 0 {
            sqlx::query("INSERT INTO num (cnt) VALUES (0)")
                .execute(&self.pool)
                .await
                .with_context(|| "insert initial counter row")?;
        }

        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<u64>> {
        // The cnt column is nullable, so a row may exist and still hold no
        // value. Both that and a missing row read as "nothing persisted".
        let row: Option<Option<u64>> = sqlx::query_scalar("SELECT cnt FROM num LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .with_context(|| "read persisted counter")?;

        Ok(row.flatten())
    }

    async fn save(&self, value: u64) -> anyhow::Result<()> {
        let updated = sqlx::query("UPDATE num SET cnt = ?")
            .bind(value)
            .execute(&self.pool)
            .await
            .with_context(|| "overwrite persisted counter")?;

        // Mysql reports zero affected rows both when the value is unchanged
        // and when the row is missing; only the second case needs repair.
        if updated.rows_affected() == 0 {
            let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM num")
                .fetch_one(&self.pool)
                .await
                .with_context(|| "count counter rows")?;
            if rows == 0 {
                sqlx::query("INSERT INTO num (cnt) VALUES (?)")
                    .bind(value)
                    .execute(&self.pool)
                    .await
                    .with_context(|| "insert persisted counter")?;
            }
        }

        Ok(())
    }
}
