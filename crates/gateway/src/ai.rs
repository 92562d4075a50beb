//! OpenAI-compatible chat-completion provider.
//!
//! The provider is a black box to the rest of the pipeline; this adapter
//! speaks the chat-completions wire format, advertises the calculator tools,
//! and maps the response into [`AiReply`]. A request timeout is mandatory:
//! a hung provider becomes a transient failure, never a hung pipeline.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::debug,
};

use {
    proptalk_channels::ConversationEntry,
    proptalk_router::{AiProvider, AiReply, ToolCall},
};

const SYSTEM_PROMPT: &str = "You are PropTalk, an assistant for real-estate agents. Answer \
    questions about listings, fees, and taxes concisely. When a question calls for a fee or tax \
    amount, use the matching calculator tool instead of estimating.";

pub struct OpenAiProvider {
    api_key: Secret<String>,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Secret<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            model: model.into(),
            api_base: api_base.into(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

/// Tool definitions for the calculator registry, chat-completions format.
fn tool_definitions() -> Value {
    let amount = |description: &str| {
        json!({ "type": "number", "description": description })
    };
    json!([
        {
            "type": "function",
            "function": {
                "name": "transfer_fees",
                "description": "Property transfer fees by price band",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "price": amount("Purchase price in euros"),
                        "vat_paid": { "type": "boolean", "description": "Whether VAT was paid on the purchase" }
                    },
                    "required": ["price"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "capital_gains_tax",
                "description": "Capital gains tax on a property sale",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "sale_price": amount("Sale price in euros"),
                        "purchase_price": amount("Original purchase price in euros"),
                        "expenses": amount("Deductible expenses in euros")
                    },
                    "required": ["sale_price", "purchase_price"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "vat",
                "description": "VAT on a new property purchase",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "price": amount("Purchase price in euros"),
                        "reduced_rate": { "type": "boolean", "description": "Whether the reduced first-home rate applies" }
                    },
                    "required": ["price"]
                }
            }
        }
    ])
}

/// History arrives newest first; the wire format wants chronological order.
fn to_messages(history: &[ConversationEntry], message: &str) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
    for entry in history.iter().rev() {
        let role = if entry.direction == "out" {
            "assistant"
        } else {
            "user"
        };
        messages.push(json!({ "role": role, "content": entry.body }));
    }
    messages.push(json!({ "role": "user", "content": message }));
    messages
}

fn parse_reply(response: &Value) -> AiReply {
    let message = &response["choices"][0]["message"];
    let text = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = &call["function"];
                    let name = function["name"].as_str()?.to_string();
                    // Arguments arrive as a JSON-encoded string.
                    let arguments = function["arguments"]
                        .as_str()
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(Value::Null);
                    Some(ToolCall { name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    AiReply { text, tool_calls }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn complete(
        &self,
        history: &[ConversationEntry],
        message: &str,
    ) -> anyhow::Result<AiReply> {
        let body = json!({
            "model": self.model,
            "messages": to_messages(history, message),
            "tools": tool_definitions(),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let reply = parse_reply(&response);
        debug!(
            text_len = reply.text.len(),
            tool_calls = reply.tool_calls.len(),
            "provider replied"
        );
        Ok(reply)
    }
}
