use clap::Parser;
use std::fmt;
use std::str::FromStr;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Front-end Args ---
    /// Which front-end to run (terminal, serve)
    #[arg(long, env = "SAHAYAK_MODE", default_value = "terminal")]
    pub mode: String,

    // --- Chat LLM Provider Args ---
    /// API key for the Gemini generateContent endpoint
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-1.5-pro, gemini-1.5-flash)
    #[arg(long, env = "CHAT_MODEL", default_value = "gemini-1.5-pro")]
    pub chat_model: String,

    /// Base URL of the generative language API, without the model path
    #[arg(
        long,
        env = "CHAT_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub chat_base_url: String,

    /// Sampling temperature sent with every request
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Upper bound on the size of each reply, in tokens
    #[arg(long, env = "CHAT_MAX_OUTPUT_TOKENS", default_value = "2048")]
    pub max_output_tokens: u32,

    /// Give up on a reply after this many seconds. Unset means wait forever.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Send the whole conversation upstream instead of only the latest question
    #[arg(long, env = "INCLUDE_HISTORY", default_value = "false")]
    pub include_history: bool,

    // --- Quota Args ---
    /// Maximum number of messages per window. 0 disables the quota.
    #[arg(long, env = "QUESTION_LIMIT", default_value = "20")]
    pub question_limit: usize,

    /// Cooldown shown (and optionally enforced) once the quota is used up
    #[arg(long, env = "COOLDOWN_HOURS", default_value = "2")]
    pub cooldown_hours: u64,

    /// Actually reset the quota once the cooldown has elapsed
    #[arg(long, env = "ENFORCE_COOLDOWN", default_value = "false")]
    pub enforce_cooldown: bool,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Terminal,
    Serve,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseUiModeError {
    message: String,
}

impl fmt::Display for ParseUiModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseUiModeError {}

impl FromStr for UiMode {
    type Err = ParseUiModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminal" | "tui" => Ok(UiMode::Terminal),
            "serve" | "server" | "websocket" => Ok(UiMode::Serve),
            _ =>
                Err(ParseUiModeError {
                    message: format!("Invalid mode: '{}' (expected terminal or serve)", s),
                }),
        }
    }
}
