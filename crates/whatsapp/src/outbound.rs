//! Outbound WhatsApp sends over the Twilio Messages API.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use proptalk_channels::{ChannelOutbound, SendError, TextFormat};

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
    code: Option<i64>,
    message: Option<String>,
}

/// One-attempt-per-call WhatsApp sender via a Twilio account.
pub struct WhatsAppSender {
    account_sid: String,
    auth_token: Secret<String>,
    from_number: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppSender {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: Secret<String>,
        from_number: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            account_sid: account_sid.into(),
            auth_token,
            from_number: from_number.into(),
            api_base: api_base.into(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

/// Map a Twilio failure to the delivery classification. The numeric Twilio
/// error code (e.g. 21211 invalid 'To') rides along in the detail text.
fn classify(status: reqwest::StatusCode, code: Option<i64>, detail: &str) -> SendError {
    let detail = match code {
        Some(code) => format!("{detail} (code {code})"),
        None => detail.to_string(),
    };
    match status.as_u16() {
        400 | 404 => SendError::invalid_destination(detail),
        401 => SendError::unauthorized(detail),
        403 => SendError::permission_denied(detail),
        _ => SendError::transient(detail),
    }
}

#[async_trait]
impl ChannelOutbound for WhatsAppSender {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        _format: TextFormat,
    ) -> Result<String, SendError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let params = [
            ("To", format!("whatsapp:{to}")),
            ("From", format!("whatsapp:{}", self.from_number)),
            ("Body", text.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| SendError::transient(format!("whatsapp request failed: {e}")))?;

        let status = response.status();
        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|e| SendError::transient(format!("whatsapp response unreadable: {e}")))?;

        if !status.is_success() {
            let detail = parsed
                .message
                .unwrap_or_else(|| format!("twilio returned {status}"));
            return Err(classify(status, parsed.code, &detail));
        }

        let sid = parsed
            .sid
            .ok_or_else(|| SendError::transient("twilio success response missing sid"))?;
        debug!(sid, "whatsapp message sent");
        Ok(sid)
    }
}
