pub mod cli;
pub mod config;
pub mod error;
pub mod exchange;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;
pub mod ui;

use cli::{ Args, UiMode };
use config::policy::RequestPolicy;
use exchange::ExchangeClient;
use llm::LlmConfig;
use log::info;
use server::Server;
use session::Session;
use std::error::Error;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mode: UiMode = args.mode.parse()?;
    let policy = RequestPolicy::from_args(&args);

    info!("--- Core Configuration ---");
    info!("Mode: {:?}", mode);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Temperature: {}", args.temperature);
    info!("Max Output Tokens: {}", args.max_output_tokens);
    info!("Include History: {}", args.include_history);
    match args.request_timeout_secs {
        Some(secs) => info!("Request Timeout: {}s", secs),
        None => info!("Request Timeout: none"),
    }
    match &policy {
        Some(p) => {
            info!("Question Limit: {}", p.max_turns_per_window);
            info!("Cooldown: {}h (enforced: {})", p.cooldown_hours, p.enforce_cooldown);
        }
        None => info!("Question Limit: disabled"),
    }
    if mode == UiMode::Serve {
        info!("Server Address: {}", args.server_addr);
        info!("TLS Enabled: {}", args.enable_tls);
    }
    info!("-------------------------");

    let chat_client = llm::chat::new_client(&LlmConfig::from_args(&args))?;
    let exchange = ExchangeClient::new(chat_client)
        .with_history(args.include_history)
        .with_timeout(args.request_timeout_secs.map(Duration::from_secs));

    match mode {
        UiMode::Terminal => {
            let mut session = Session::new(policy);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            ui::terminal::run_terminal(&exchange, &mut session, stdin, tokio::io::stdout()).await
        }
        UiMode::Serve => {
            let server = Server::new(exchange, policy, args.clone());
            server.run().await
        }
    }
}
