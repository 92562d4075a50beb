//! Seam to the external AI-completion provider.
//!
//! The provider is a black box: text (plus bounded history) in, text plus
//! optional structured tool calls out. Internals, prompting, and transport
//! all live behind this trait; the scripted test implementation is the only
//! in-repo one.

use {async_trait::async_trait, serde::Deserialize, serde_json::Value};

use proptalk_channels::ConversationEntry;

/// One structured calculator invocation requested by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Provider output: reply text plus any tool calls to execute.
#[derive(Debug, Clone, Default)]
pub struct AiReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// External AI-completion provider.
///
/// Implementations must enforce their own request timeout; a timeout is
/// reported as an ordinary error and treated as transient by the caller.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Complete `message` in the context of `history` (newest first).
    async fn complete(
        &self,
        history: &[ConversationEntry],
        message: &str,
    ) -> anyhow::Result<AiReply>;
}
