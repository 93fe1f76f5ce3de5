pub mod chat;

use crate::cli::Args;
use serde::{ Deserialize, Serialize };

/// Sampling parameters attached to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub generation: GenerationConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: None,
            base_url: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: Some(args.chat_model.clone()).filter(|m| !m.is_empty()),
            base_url: Some(args.chat_base_url.clone()).filter(|u| !u.is_empty()),
            generation: GenerationConfig {
                temperature: args.temperature,
                max_output_tokens: args.max_output_tokens,
            },
        }
    }
}
