use tally::{
    app::{AppData, RuntimeData},
    cache::Cacher,
    config::Config,
    counter::CounterService,
    server,
    store::MysqlStore,
    sync,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    if let Err(err) = run().await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let data = prepare_app_data(&config)?;

    // Backends may still be warming up when we come online. A failed seed
    // only logs; visitors read 0 until redis answers again.
    if let Err(err) = data.counter.bootstrap().await {
        tracing::error!("fail to bootstrap counter, serving anyway: {err:#}");
    }

    sync::spawn_counter_sync(data.clone());

    server::serve(data).await
}

fn prepare_app_data(config: &Config) -> anyhow::Result<AppData<Cacher, MysqlStore>> {
    let cacher = Cacher::open(&config.redis)?;
    let store = MysqlStore::connect(&config.mysql);

    let data = RuntimeData::builder()
        .counter(CounterService::new(cacher, store))
        .build();

    Ok(data.into())
}
