//! Webhook routes and server lifecycle.
//!
//! The platform contract shapes every handler: acknowledge fast, never
//! return an error the platform would retry on (Telegram auth failures are
//! the one exception), and push all real work onto tracked tasks.

use std::{net::SocketAddr, time::Duration};

use {
    axum::{
        Router,
        extract::{Form, State, rejection::FormRejection},
        http::{HeaderMap, StatusCode, header},
        response::{IntoResponse, Json, Response},
        routing::{get, post},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    proptalk_common::InboundUpdate,
    proptalk_limits::FixedWindowLimiter,
    proptalk_telegram::webhook as telegram,
    proptalk_whatsapp::webhook as whatsapp,
};

use crate::{pipeline, state::AppState};

/// Build the webhook router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/telegram", post(telegram_webhook))
        .route("/webhook/whatsapp", post(whatsapp_webhook))
        .with_state(state)
}

/// Serve until `cancel` fires, then drain the post-ack task tracker.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_app(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    // Let in-flight pipeline work finish before the process exits.
    state.tracker.close();
    state.tracker.wait().await;
    Ok(())
}

/// Periodic upkeep: abandon idle sessions, evict stale limiter windows.
pub fn spawn_maintenance(state: AppState, cancel: CancellationToken, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // immediate first tick is a no-op
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = state.sessions.sweep_idle().await {
                        warn!(error = %e, "idle session sweep failed");
                    }
                    state.telegram_limiter.evict_expired();
                    state.whatsapp_limiter.evict_expired();
                }
            }
        }
    });
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let supplied = headers
        .get(telegram::SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.telegram_secret_matches(supplied) {
        warn!("telegram webhook rejected: secret token mismatch");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let update: telegram::Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            // Acked anyway so Telegram does not retry a payload that will
            // never parse.
            warn!(error = %e, "malformed telegram update");
            return ack_json();
        },
    };

    match update.into_inbound() {
        Some(inbound) => {
            let limiter = state.telegram_limiter.clone();
            gate_and_spawn(&state, &limiter, inbound).await;
        },
        None => debug!("telegram update carries no actionable message"),
    }
    ack_json()
}

async fn whatsapp_webhook(
    State(state): State<AppState>,
    form: Result<Form<whatsapp::InboundForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "malformed whatsapp form");
            return ack_twiml();
        },
    };

    match form.classify() {
        whatsapp::WebhookKind::Message(inbound) => {
            let limiter = state.whatsapp_limiter.clone();
            gate_and_spawn(&state, &limiter, inbound).await;
        },
        whatsapp::WebhookKind::Status {
            message_sid,
            status,
        } => pipeline::record_status(&message_sid, &status),
        whatsapp::WebhookKind::Discard => debug!("whatsapp push carries no actionable message"),
    }
    ack_twiml()
}

/// Rate-limit and dedup gate, run before the ack (both checks are fast and
/// local); survivors go to the pipeline on a tracked task.
async fn gate_and_spawn(state: &AppState, limiter: &FixedWindowLimiter, update: InboundUpdate) {
    let decision = limiter.check(&format!("{}:{}", update.platform, update.sender_id));
    if !decision.allowed {
        debug!(
            platform = %update.platform,
            retry_after_ms = decision.retry_after.as_millis() as u64,
            "inbound rate limit hit"
        );
        state
            .tracker
            .spawn(pipeline::send_slow_down(state.clone(), update));
        return;
    }

    match state
        .dedup
        .record_seen(update.platform, &update.external_id)
        .await
    {
        Ok(true) => {},
        Ok(false) => {
            debug!(
                platform = %update.platform,
                external_id = %update.external_id,
                "duplicate update dropped"
            );
            return;
        },
        Err(e) => {
            // Best effort: losing the dedup index must not lose messages.
            warn!(error = %e, "dedup check failed, processing anyway");
        },
    }

    state
        .tracker
        .spawn(pipeline::process_update(state.clone(), update));
}

fn ack_json() -> Response {
    Json(serde_json::json!({ "ok": true })).into_response()
}

fn ack_twiml() -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        whatsapp::EMPTY_TWIML,
    )
        .into_response()
}
