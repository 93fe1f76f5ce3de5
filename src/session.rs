use crate::config::policy::RequestPolicy;
use crate::error::SubmitRejection;
use crate::models::chat::{ ChatMessage, Conversation };
use chrono::{ DateTime, Utc };
use log::{ debug, info };
use uuid::Uuid;

/// A user turn that has been recorded and is waiting for its reply.
///
/// Only `Session::begin_turn` creates one and `Session::finish_turn` consumes
/// it, so a session can never settle a turn it did not start.
#[derive(Debug)]
#[must_use = "a pending turn must be settled or the session stays pending"]
pub struct PendingTurn {
    prompt: String,
}

impl PendingTurn {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Turn-taking state for one chat session: the conversation, the
/// awaiting-reply flag and the quota window.
#[derive(Debug)]
pub struct Session {
    id: String,
    conversation: Conversation,
    pending: bool,
    policy: Option<RequestPolicy>,
    window_base: usize,
    exhausted_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(policy: Option<RequestPolicy>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation: Conversation::new(),
            pending: false,
            policy,
            window_base: 0,
            exhausted_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn size(&self) -> usize {
        self.conversation.size()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn policy(&self) -> Option<&RequestPolicy> {
        self.policy.as_ref()
    }

    fn used_in_window(&self) -> usize {
        self.size().saturating_sub(self.window_base)
    }

    /// Starts a fresh window if the cooldown is enforced and has run out.
    fn refresh_window(&mut self, now: DateTime<Utc>) {
        let Some(policy) = self.policy else {
            return;
        };
        if !policy.enforce_cooldown {
            return;
        }
        if let Some(exhausted_at) = self.exhausted_at {
            if now - exhausted_at >= policy.cooldown() {
                info!(
                    "Session {}: cooldown of {}h elapsed, resetting question quota",
                    self.id,
                    policy.cooldown_hours
                );
                self.window_base = self.size();
                self.exhausted_at = None;
            }
        }
    }

    /// Questions left in the current window, or `None` when unrestricted.
    pub fn remaining(&mut self, now: DateTime<Utc>) -> Option<usize> {
        self.refresh_window(now);
        let limit = self.policy?.max_turns_per_window;
        Some(limit.saturating_sub(self.used_in_window()))
    }

    /// Whether the input affordance should be enabled right now.
    pub fn can_submit(&mut self, now: DateTime<Utc>) -> bool {
        !self.pending && self.remaining(now) != Some(0)
    }

    /// Validates and records a user turn. On success the user's text is
    /// already part of the conversation and the session is pending.
    pub fn begin_turn(
        &mut self,
        text: &str,
        now: DateTime<Utc>
    ) -> Result<PendingTurn, SubmitRejection> {
        if text.trim().is_empty() {
            return Err(SubmitRejection::EmptyInput);
        }
        if self.pending {
            return Err(SubmitRejection::Pending);
        }
        if self.remaining(now) == Some(0) {
            let cooldown_hours = self.policy.map(|p| p.cooldown_hours).unwrap_or_default();
            debug!("Session {}: quota exhausted at {} messages", self.id, self.size());
            return Err(SubmitRejection::QuotaExceeded { cooldown_hours });
        }

        let conversation = std::mem::take(&mut self.conversation);
        self.conversation = conversation.append(ChatMessage::user(text));
        self.pending = true;
        self.mark_exhausted_if_needed(now);

        Ok(PendingTurn { prompt: text.to_string() })
    }

    /// Records the reply (or its error surrogate) and leaves the pending state.
    pub fn finish_turn(&mut self, turn: PendingTurn, reply: String, now: DateTime<Utc>) {
        debug!("Session {}: settling turn for prompt of {} bytes", self.id, turn.prompt.len());
        let conversation = std::mem::take(&mut self.conversation);
        self.conversation = conversation.append(ChatMessage::assistant(reply));
        self.pending = false;
        self.mark_exhausted_if_needed(now);
    }

    fn mark_exhausted_if_needed(&mut self, now: DateTime<Utc>) {
        if let Some(policy) = self.policy {
            if self.exhausted_at.is_none() && self.used_in_window() >= policy.max_turns_per_window {
                self.exhausted_at = Some(now);
            }
        }
    }

    /// The messages to send upstream for `turn`.
    pub fn outbound_turns(&self, turn: &PendingTurn, include_history: bool) -> Vec<ChatMessage> {
        if include_history {
            self.conversation.messages().to_vec()
        } else {
            vec![ChatMessage::user(turn.prompt.clone())]
        }
    }
}
