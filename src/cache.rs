use anyhow::Context;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::OnceCell;

use crate::config::RedisConfig;
use crate::counter::CounterCache;

const COUNTER_KEY: &str = "cnt";

/// Redis handle for the live counter value.
///
/// The connection manager is created on first use, not at construction, so
/// the process can come up while redis is still unreachable and heal once it
/// answers.
pub struct Cacher {
    client: Client,
    conn: OnceCell<ConnectionManager>,
}

impl Cacher {
    pub fn open(config: &RedisConfig) -> anyhow::Result<Self> {
        let client = Client::open(config.url()).with_context(|| "fail to open redis client")?;
        tracing::info!("redis target {}:{}", config.addr, config.port);

        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn manager(&self) -> anyhow::Result<&ConnectionManager> {
        self.conn
            .get_or_try_init(|| self.client.get_connection_manager())
            .await
            .with_context(|| "fail to connect to redis")
    }
}

#[async_trait::async_trait]
impl CounterCache for Cacher {
    async fn seed(&self, value: u64) -> anyhow::Result<()> {
        let mut conn = self.manager().await?.clone();
        let _: () = conn.set(COUNTER_KEY, value).await?;
        Ok(())
    }

    async fn current(&self) -> anyhow::Result<Option<u64>> {
        let mut conn = self.manager().await?.clone();
        Ok(conn.get(COUNTER_KEY).await?)
    }

    async fn increment(&self) -> anyhow::Result<u64> {
        let mut conn = self.manager().await?.clone();
        Ok(conn.incr(COUNTER_KEY, 1).await?)
    }
}
