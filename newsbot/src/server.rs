use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::futures::{SinkExt, StreamExt};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, State};
use rocket_ws::{Channel, Message, WebSocket};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use common::ServerConfig;

use crate::llm::summarizer::Summarizer;
use crate::llm::LlmBackend;
use crate::logstream::LogStream;
use crate::news::NewsSource;
use crate::settings::{Settings, SettingsStore};
use crate::twitter::{Publisher, TwitterPublisher};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub settings: Arc<SettingsStore>,
    pub news: Arc<dyn NewsSource>,
    pub llm: Arc<dyn LlmBackend>,
    pub summarizer: Arc<dyn Summarizer>,
    pub publisher: Arc<TwitterPublisher>,
    pub logs: LogStream,
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Fetch articles, optionally filtered by an explicit query. An explicit
/// query that matches nothing is a 404; the default feed view is just an
/// empty list.
#[get("/api/news?<query>")]
async fn get_news(
    state: &State<AppState>,
    query: Option<String>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let articles = state.news.fetch(query.as_deref()).await;

    if articles.is_empty() {
        if let Some(q) = query {
            return Err(Custom(
                Status::NotFound,
                Json(json!({ "error": format!("No news found for query: {}", q) })),
            ));
        }
    }

    Ok(Json(json!({ "news": articles })))
}

/// Fetch articles and run them through the summarizer. Downstream
/// failures come back as a 200 with an error field so the dashboard can
/// render them inline.
#[get("/api/ai_summary?<query>")]
async fn ai_summary(state: &State<AppState>, query: Option<String>) -> Json<Value> {
    let settings = state.settings.snapshot();
    let q = query.unwrap_or_else(|| settings.default_query());

    let articles = state.news.fetch(Some(q.as_str())).await;
    if articles.is_empty() {
        return Json(json!({ "error": "No news articles available to summarize" }));
    }

    match state.summarizer.summarize(&articles, &settings).await {
        Ok(summary) => Json(json!({
            "summary": summary,
            "news_items": articles,
        })),
        Err(e) => {
            warn!(error = %e, "on-demand summary failed");
            Json(json!({ "error": format!("Summary generation failed: {}", e) }))
        }
    }
}

#[derive(Deserialize)]
struct TweetRequest {
    text: Option<String>,
}

/// Manual publish from the dashboard. Goes through the same publisher as
/// the scheduler but never touches the post timestamps.
#[post("/api/twitter/tweet", data = "<body>")]
async fn post_tweet(
    state: &State<AppState>,
    body: Json<TweetRequest>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let text = match body.text.as_deref() {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => {
            return Err(Custom(
                Status::BadRequest,
                Json(json!({ "error": "No tweet text provided" })),
            ))
        }
    };

    // Downstream failures are embedded errors, not HTTP errors; non-200
    // is reserved for caller mistakes
    match state.publisher.publish(&text, None).await {
        Ok(posted) => Ok(Json(json!({
            "status": "success",
            "tweet_id": posted.id,
            "url": posted.url,
        }))),
        Err(e) => {
            error!(error = %e, "manual tweet failed");
            Ok(Json(json!({ "error": e.to_string() })))
        }
    }
}

#[get("/api/settings")]
async fn get_settings(state: &State<AppState>) -> Json<Settings> {
    Json(state.settings.snapshot())
}

/// Whole-document settings replace. The store recomputes the
/// scheduler-owned timestamps; the response carries the effective
/// settings so the dashboard can re-render the real schedule.
#[post("/api/settings", data = "<body>")]
async fn update_settings(state: &State<AppState>, body: Json<Settings>) -> Json<Value> {
    match state.settings.replace(body.into_inner()).await {
        Ok(updated) => {
            info!("settings updated from dashboard");
            Json(json!({ "status": "success", "settings": updated }))
        }
        Err(e) => {
            error!(error = %e, "settings update failed");
            Json(json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

#[post("/api/twitter/validate")]
async fn validate_twitter(state: &State<AppState>) -> Json<Value> {
    match state.publisher.validate_credentials().await {
        Ok(()) => Json(json!({ "status": "valid" })),
        Err(e) => Json(json!({ "status": "invalid", "message": e.to_string() })),
    }
}

#[get("/api/models")]
async fn list_models(state: &State<AppState>) -> Json<Value> {
    match state.llm.list_models().await {
        Ok(models) => Json(json!({ "models": models })),
        Err(e) => {
            warn!(error = %e, "model list unavailable");
            Json(json!({ "models": [], "error": e.to_string() }))
        }
    }
}

#[get("/api/twitter/stats")]
async fn twitter_stats(state: &State<AppState>) -> Json<Value> {
    match state.publisher.latest_stats().await {
        Ok(Some(stats)) => Json(json!({ "status": "success", "stats": stats })),
        Ok(None) => Json(json!({ "status": "success", "stats": Value::Null })),
        Err(e) => {
            error!(error = %e, "stats query failed");
            Json(json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

/// Schedule frame for the dashboard feed. Only emitted while the
/// scheduler is armed; a disarmed bot pushes no schedule at all.
fn next_post_frame(snapshot: &Settings) -> Option<Value> {
    snapshot.next_post_time?;
    Some(json!({
        "type": "next_post_update",
        "data": {
            "next_post": snapshot.next_post_time,
            "last_post": snapshot.last_post_time,
        }
    }))
}

/// Dashboard live feed: stats and schedule pushed every 30 seconds.
#[get("/ws")]
fn dashboard_ws(ws: WebSocket, state: &State<AppState>) -> Channel<'static> {
    let settings = state.settings.clone();
    let publisher = state.publisher.clone();

    ws.channel(move |mut stream| {
        Box::pin(async move {
            info!("dashboard websocket connected");
            let mut ticker = tokio::time::interval(Duration::from_secs(30));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = match publisher.latest_stats().await {
                            Ok(stats) => json!(stats),
                            Err(e) => {
                                warn!(error = %e, "stats push failed");
                                Value::Null
                            }
                        };
                        let payload = json!({ "type": "stats_update", "data": stats });
                        if stream.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }

                        if let Some(payload) = next_post_frame(&settings.snapshot()) {
                            if stream.send(Message::Text(payload.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    message = stream.next() => {
                        match message {
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!(error = %e, "dashboard websocket error");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            info!("dashboard websocket closed");
            Ok(())
        })
    })
}

/// Live log stream for the dashboard terminal panel.
#[get("/api/terminal_updates")]
fn terminal_updates(ws: WebSocket, state: &State<AppState>) -> Channel<'static> {
    let mut rx = state.logs.subscribe();

    ws.channel(move |mut stream| {
        Box::pin(async move {
            loop {
                tokio::select! {
                    line = rx.recv() => {
                        match line {
                            Ok(line) => {
                                let payload = json!({ "content": line });
                                if stream.send(Message::Text(payload.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            // Slow client skipped some lines; keep streaming
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    message = stream.next() => {
                        match message {
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(_)) => break,
                            _ => {}
                        }
                    }
                }
            }
            Ok(())
        })
    })
}

/// Build the Rocket instance with managed state and all routes mounted,
/// applying `server.bind` / `server.port` from the bootstrap config when
/// present.
pub fn build_rocket(
    state: AppState,
    server: Option<&ServerConfig>,
) -> rocket::Rocket<rocket::Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    // The binary runs from the workspace root; tests run from the crate dir
    let static_dir = if std::path::Path::new("newsbot/static").is_dir() {
        "newsbot/static"
    } else {
        "static"
    };

    rocket::custom(fig)
        .manage(state)
        .mount(
            "/",
            routes![
                index_redirect,
                health,
                get_news,
                ai_summary,
                post_tweet,
                get_settings,
                update_settings,
                validate_twitter,
                list_models,
                twitter_stats,
                dashboard_ws,
                terminal_updates,
            ],
        )
        .mount("/static", FileServer::from(static_dir))
}

/// Launch the Rocket server; runs until Rocket shuts down
/// (SIGINT/SIGTERM).
pub async fn launch_rocket(state: AppState, server: Option<&ServerConfig>) -> Result<()> {
    info!("Starting Rocket HTTP server");
    build_rocket(state, server)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    info!("Rocket HTTP server has shut down");
    Ok(())
}
