//! Post-acknowledgement processing.
//!
//! Everything here runs on a tracked task after the webhook response has
//! already been sent, so failures are logged and swallowed; nothing may
//! propagate back toward the HTTP layer.

use tracing::{debug, error, info, warn};

use {
    proptalk_channels::{ConversationEntry, TextFormat},
    proptalk_common::{InboundUpdate, now_epoch},
    proptalk_registration::RegistrationOutcome,
};

use crate::state::AppState;

const SLOW_DOWN: &str =
    "You're sending messages a little too quickly \u{2014} give me a moment to catch up.";

/// Run the full pipeline for one gated update. Never returns an error.
pub async fn process_update(state: AppState, update: InboundUpdate) {
    if let Err(e) = run(&state, &update).await {
        error!(
            platform = %update.platform,
            external_id = %update.external_id,
            error = %e,
            "update processing failed"
        );
    }
}

async fn run(state: &AppState, update: &InboundUpdate) -> anyhow::Result<()> {
    let outcome = state
        .registrar
        .handle_message(
            update.platform,
            &update.sender_id,
            update.sender_name.as_deref(),
            &update.text,
        )
        .await?;

    let reply = match outcome {
        RegistrationOutcome::Consumed { reply } => reply,
        RegistrationOutcome::Registered { agent_id } => {
            log_turn(state, update, "in", &update.text).await;
            state.intents.route(update, &agent_id).await
        },
    };

    let delivered = state
        .delivery
        .send(update.platform, &update.chat_id, &reply, TextFormat::Plain)
        .await;
    if delivered.is_delivered() {
        log_turn(state, update, "out", &reply).await;
    } else {
        warn!(
            platform = %update.platform,
            chat_id = %proptalk_delivery::mask_destination(&update.chat_id),
            ?delivered,
            "reply was not delivered"
        );
    }
    Ok(())
}

/// Best-effort rate-limit notice; a failed notice is not worth a retry.
pub async fn send_slow_down(state: AppState, update: InboundUpdate) {
    let outcome = state
        .delivery
        .send(update.platform, &update.chat_id, SLOW_DOWN, TextFormat::Plain)
        .await;
    debug!(
        platform = %update.platform,
        delivered = outcome.is_delivered(),
        "slow-down notice"
    );
}

/// Record a delivery-status callback. The lightweight path: no pipeline, no
/// reply, just an audit line keyed by the provider message id.
pub fn record_status(message_sid: &str, status: &str) {
    info!(message_sid, status, "delivery status update");
}

/// Conversation logging must never block or fail a reply.
async fn log_turn(state: &AppState, update: &InboundUpdate, direction: &str, body: &str) {
    let entry = ConversationEntry {
        id: 0,
        platform: update.platform,
        chat_id: update.chat_id.clone(),
        sender_id: update.sender_id.clone(),
        direction: direction.to_string(),
        body: body.to_string(),
        created_at: now_epoch(),
    };
    if let Err(e) = state.conversation.log(entry).await {
        warn!(error = %e, "failed to write conversation log");
    }
}
