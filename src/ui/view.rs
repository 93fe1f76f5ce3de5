use crate::models::chat::{ ChatMessage, Role };

pub const TITLE: &str = "SAHAYAK.AI";
pub const EMPTY_STATE: &str = "How can your Sahayak help you?";
pub const THINKING: &str = "Thinking...";
pub const INPUT_PROMPT: &str = "Ask a question...";

const USER_LABEL: &str = "You";
const ASSISTANT_LABEL: &str = "Sahayak";

/// One chat bubble. User bubbles are pushed to the right edge of `width`.
pub fn render_message(message: &ChatMessage, width: usize) -> String {
    match message.role {
        Role::User => {
            let line = format!("{} › {}", message.content, USER_LABEL);
            let pad = width.saturating_sub(line.chars().count());
            format!("{}{}", " ".repeat(pad), line)
        }
        Role::Assistant => format!("{} › {}", ASSISTANT_LABEL, message.content),
    }
}

pub fn remaining_line(remaining: usize) -> String {
    format!("Questions remaining today: {}", remaining)
}

/// Input placeholder; switches to the cooldown notice once the quota is spent.
pub fn input_placeholder(remaining: Option<usize>, cooldown_hours: u64) -> String {
    match remaining {
        Some(0) => format!("Too many questions. Please wait {} hours.", cooldown_hours),
        _ => INPUT_PROMPT.to_string(),
    }
}

pub fn quota_exhausted_notice(cooldown_hours: u64) -> String {
    format!(
        "You've reached the maximum number of questions. Please try again in {} hours.",
        cooldown_hours
    )
}
