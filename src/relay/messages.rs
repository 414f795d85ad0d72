//! Conversation assembly for the upstream chat-completion call.

use serde::{Deserialize, Serialize};

use super::error::RelayError;

/// Fixed instruction sent as the system message of every conversation.
pub const SYSTEM_PROMPT: &str = "\
You are an elite, advanced web developer and designer.
You generate advanced, fully fledged, modern, visually impressive, and highly functional websites.
Always include all HTML, CSS, and JavaScript within a single HTML file.
When asked to improve or fix an existing website, analyze the current code and make meaningful, professional, and sophisticated enhancements.
Never omit essential website elements.
IMPORTANT: Your reply MUST be ONLY the full HTML code, with no markdown, no code block, no commentary, and no explanations, just the raw code.
Do NOT include any ```.";

/// Sentence introducing the document to revise inside the user message.
pub const REVISION_MARKER: &str =
    "Here is the current index.html code. If I ask for improvements or fixes, use this as the base.";

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Deployment instruction.
    System,
    /// End-user content.
    User,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /generate`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Natural-language description of the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Previously generated document to revise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_html: Option<String>,
}

impl GenerateRequest {
    /// Request for a fresh document.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            current_html: None,
        }
    }

    /// Attach the document to revise.
    #[must_use]
    pub fn with_current_html(mut self, html: impl Into<String>) -> Self {
        self.current_html = Some(html.into());
        self
    }

    /// The prompt, if present and not blank.
    ///
    /// # Errors
    /// Returns [`RelayError::MissingPrompt`] when the prompt is absent or whitespace only.
    pub fn validated_prompt(&self) -> Result<&str, RelayError> {
        match self.prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => Ok(prompt),
            _ => Err(RelayError::MissingPrompt),
        }
    }
}

/// Build the `[system, user]` conversation for a prompt and optional base document.
///
/// The base document is appended verbatim after [`REVISION_MARKER`]; an empty
/// document is treated as absent.
#[must_use]
pub fn build_messages(prompt: &str, current_html: Option<&str>) -> Vec<ChatMessage> {
    let mut user_input = prompt.to_string();
    if let Some(html) = current_html.filter(|html| !html.is_empty()) {
        user_input.push_str("\n\n");
        user_input.push_str(REVISION_MARKER);
        user_input.push('\n');
        user_input.push_str(html);
    }

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_input)]
}

/// Upstream chat-completion request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output-token ceiling.
    pub max_tokens: u32,
    /// Incremental delivery.
    pub stream: bool,
}
