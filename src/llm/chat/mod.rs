pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::sync::Arc;
use super::LlmConfig;
use self::gemini::GeminiChatClient;
use crate::error::ExchangeError;
use crate::models::chat::ChatMessage;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub response: String,
}

/// The hosted text-generation collaborator. One call per user turn, one
/// response or one failure back.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        turns: &[ChatMessage]
    ) -> Result<CompletionResponse, ExchangeError>;

    fn get_model(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let specific_client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(specific_client))
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes in order and records every request it sees.
    pub struct ScriptedChatClient {
        outcomes: Mutex<VecDeque<Result<String, ExchangeError>>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChatClient {
        pub fn new(outcomes: Vec<Result<String, ExchangeError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChatClient {
        async fn complete(
            &self,
            turns: &[ChatMessage]
        ) -> Result<CompletionResponse, ExchangeError> {
            self.calls.lock().unwrap().push(turns.to_vec());
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(CompletionResponse { response: text }),
                Some(Err(e)) => Err(e),
                None => Err(ExchangeError::Transport("no scripted reply left".to_string())),
            }
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Never settles; used to exercise timeouts.
    pub struct HangingChatClient;

    #[async_trait]
    impl ChatClient for HangingChatClient {
        async fn complete(
            &self,
            _turns: &[ChatMessage]
        ) -> Result<CompletionResponse, ExchangeError> {
            futures::future::pending().await
        }

        fn get_model(&self) -> String {
            "hanging".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_requires_api_key() {
        let config = LlmConfig::default();
        assert!(new_client(&config).is_err());
    }

    #[test]
    fn factory_builds_gemini_client() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        };
        let client = new_client(&config).unwrap();
        assert_eq!(client.get_model(), "gemini-1.5-pro");
    }
}
