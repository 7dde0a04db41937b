use superai_protocol::{AssistantApp, Message, MessageRole};

const TITLE_MAX_CHARS: usize = 30;
const PREVIEW_MAX_CHARS: usize = 50;

/// Title for the recent list: the first user message, or the app name.
pub fn chat_title(messages: &[Message], app: AssistantApp) -> String {
    messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .and_then(|m| truncate_normalized(&m.content, TITLE_MAX_CHARS))
        .unwrap_or_else(|| format!("{} chat", app.display_name()))
}

/// Preview text from the last message of the conversation.
pub fn preview(last: Option<&Message>) -> String {
    last.and_then(|m| truncate_normalized(&m.content, PREVIEW_MAX_CHARS))
        .unwrap_or_default()
}

fn truncate_normalized(text: &str, max_chars: usize) -> Option<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return None;
    }

    let mut out: String = normalized.chars().take(max_chars).collect();
    if normalized.chars().count() > max_chars {
        out.push('…');
    }
    Some(out)
}
