use anyhow::Context;
use axum::extract::State;
use axum::http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::app::AppData;
use crate::counter::{CounterCache, CounterStore};

pub const LISTEN_PORT: u16 = 9988;

#[derive(Debug, Serialize)]
struct CounterPayload {
    cnt: u64,
}

/// Build the service router: the counter endpoint plus a bare liveness root.
///
/// Browsers call the counter endpoint cross-origin, so every response from it
/// carries the permissive CORS headers. The liveness root stays header-free.
pub fn router<C, S>(data: AppData<C, S>) -> Router
where
    C: CounterCache + 'static,
    S: CounterStore + 'static,
{
    let counter_api = Router::new()
        .route(
            "/api/cnt",
            get(read_counter::<C, S>).post(bump_counter::<C, S>),
        )
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ));

    Router::new()
        .route("/", get(liveness))
        .merge(counter_api)
        .with_state(data)
}

/// Bind the listener and run until the server errors out.
pub async fn serve<C, S>(data: AppData<C, S>) -> anyhow::Result<()>
where
    C: CounterCache + 'static,
    S: CounterStore + 'static,
{
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", LISTEN_PORT))
        .await
        .with_context(|| format!("bind 0.0.0.0:{LISTEN_PORT}"))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(data)).await?;
    Ok(())
}

async fn liveness() -> &'static str {
    "ok"
}

// A serving hiccup is not worth a 5xx to the visitor: render 0, let the log
// tell the operator.
async fn read_counter<C, S>(State(data): State<AppData<C, S>>) -> Json<CounterPayload>
where
    C: CounterCache + 'static,
    S: CounterStore + 'static,
{
    let cnt = data.counter.read().await.unwrap_or_else(|err| {
        tracing::error!("fail to read counter: {err:#}");
        0
    });
    Json(CounterPayload { cnt })
}

async fn bump_counter<C, S>(State(data): State<AppData<C, S>>) -> Json<CounterPayload>
where
    C: CounterCache + 'static,
    S: CounterStore + 'static,
{
    let cnt = data.counter.increment().await.unwrap_or_else(|err| {
        tracing::error!("fail to increment counter: {err:#}");
        0
    });
    Json(CounterPayload { cnt })
}
