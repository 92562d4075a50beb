//! Outbound delivery: rate limiting, retry with exponential backoff, and
//! structured reporting.
//!
//! Platform adapters perform one classified send attempt; everything about
//! *when* and *how often* to attempt lives here. Outbound sends wait for
//! the rate window instead of failing, so a burst of replies is smoothed
//! rather than dropped.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{info, warn};

use {
    proptalk_channels::{ChannelOutbound, SendError, TextFormat},
    proptalk_common::Platform,
    proptalk_limits::FixedWindowLimiter,
};

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// First retry delay; doubles per subsequent retry.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    #[must_use]
    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Final result of one delivery, after all attempts.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The platform accepted the message.
    Delivered {
        message_id: String,
        attempts: u32,
    },
    /// A permanent failure; retrying would not help.
    PermanentFailure { error: SendError, attempts: u32 },
    /// Every allowed attempt failed transiently.
    RetriesExhausted { last_error: SendError, attempts: u32 },
    /// No adapter is registered for the destination platform.
    NotAttempted { reason: String },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Routes outbound messages to the right platform adapter and owns the
/// retry and pacing policy.
pub struct DeliveryService {
    adapters: HashMap<Platform, Arc<dyn ChannelOutbound>>,
    outbound_limiter: FixedWindowLimiter,
    policy: RetryPolicy,
}

impl DeliveryService {
    #[must_use]
    pub fn new(outbound_limiter: FixedWindowLimiter, policy: RetryPolicy) -> Self {
        Self {
            adapters: HashMap::new(),
            outbound_limiter,
            policy,
        }
    }

    #[must_use]
    pub fn with_adapter(mut self, platform: Platform, adapter: Arc<dyn ChannelOutbound>) -> Self {
        self.adapters.insert(platform, adapter);
        self
    }

    /// Deliver `text` to `to` on `platform`, waiting for the outbound rate
    /// window and retrying transient failures per the policy.
    pub async fn send(
        &self,
        platform: Platform,
        to: &str,
        text: &str,
        format: TextFormat,
    ) -> DeliveryOutcome {
        let Some(adapter) = self.adapters.get(&platform) else {
            return DeliveryOutcome::NotAttempted {
                reason: format!("no outbound adapter for {platform}"),
            };
        };

        let destination = mask_destination(to);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            // Each attempt consumes one outbound slot, including retries.
            self.outbound_limiter
                .acquire(&format!("{platform}:{to}"))
                .await;

            match adapter.send_text(to, text, format).await {
                Ok(message_id) => {
                    info!(%platform, %destination, attempt, message_id, "message delivered");
                    return DeliveryOutcome::Delivered {
                        message_id,
                        attempts: attempt,
                    };
                },
                Err(error) if error.is_permanent() => {
                    warn!(%platform, %destination, attempt, %error, "permanent send failure");
                    return DeliveryOutcome::PermanentFailure {
                        error,
                        attempts: attempt,
                    };
                },
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        %platform, %destination, attempt, %error,
                        "transient failures exhausted retry budget"
                    );
                    return DeliveryOutcome::RetriesExhausted {
                        last_error: error,
                        attempts: attempt,
                    };
                },
                Err(error) => {
                    let delay = self.policy.backoff(attempt - 1);
                    warn!(
                        %platform, %destination, attempt, %error,
                        delay_ms = delay.as_millis() as u64,
                        "transient send failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}

/// Mask a destination for logs: keep a short prefix and the last two
/// characters. Chat ids and phone numbers both pass through here.
#[must_use]
pub fn mask_destination(to: &str) -> String {
    let chars: Vec<char> = to.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 2..].iter().collect();
    format!("{prefix}{}{suffix}", "*".repeat(chars.len() - 6))
}
