use crate::error::{ ExchangeError, SubmitRejection };
use crate::llm::chat::ChatClient;
use crate::models::chat::ChatMessage;
use crate::session::{ PendingTurn, Session };
use chrono::Utc;
use log::{ error, info };
use std::sync::Arc;
use std::time::Duration;

pub const ERROR_REPLY_PREFIX: &str = "Sorry, I encountered an error: ";

/// What a settled turn put into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub reply: String,
    pub failed: bool,
}

/// Drives one user turn against the text-generation collaborator. Failures of
/// the outbound call never escape: they are written into the conversation as
/// an assistant message.
#[derive(Clone)]
pub struct ExchangeClient {
    chat_client: Arc<dyn ChatClient>,
    include_history: bool,
    timeout: Option<Duration>,
}

impl ExchangeClient {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self {
            chat_client,
            include_history: false,
            timeout: None,
        }
    }

    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// Validate, gate, record the question, call upstream once, record the
    /// answer. Rejected submissions leave the session untouched.
    pub async fn submit(
        &self,
        session: &mut Session,
        text: &str
    ) -> Result<SubmitOutcome, SubmitRejection> {
        let turn = session.begin_turn(text, Utc::now())?;
        Ok(self.settle(session, turn).await)
    }

    /// Second half of `submit`, for front-ends that render the pending state
    /// between `Session::begin_turn` and settlement.
    pub async fn settle(&self, session: &mut Session, turn: PendingTurn) -> SubmitOutcome {
        let turns = session.outbound_turns(&turn, self.include_history);
        info!("Session {}: sending {} message(s) upstream", session.id(), turns.len());

        let outcome = match self.exchange(&turns).await {
            Ok(reply) => SubmitOutcome { reply, failed: false },
            Err(e) => {
                error!("Session {}: exchange failed: {}", session.id(), e);
                SubmitOutcome {
                    reply: format!("{}{}", ERROR_REPLY_PREFIX, e),
                    failed: true,
                }
            }
        };

        session.finish_turn(turn, outcome.reply.clone(), Utc::now());
        outcome
    }

    /// Exactly one outbound call, bounded by the configured timeout if any.
    pub async fn exchange(&self, turns: &[ChatMessage]) -> Result<String, ExchangeError> {
        let call = self.chat_client.complete(turns);
        let resp = match self.timeout {
            Some(limit) =>
                tokio::time
                    ::timeout(limit, call).await
                    .map_err(|_| ExchangeError::Timeout(limit))??,
            None => call.await?,
        };
        Ok(resp.response)
    }
}
