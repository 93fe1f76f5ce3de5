pub mod websocket;

use crate::cli::Args;
use crate::config::policy::RequestPolicy;
use crate::exchange::ExchangeClient;
use std::error::Error;

pub struct Server {
    exchange: ExchangeClient,
    policy: Option<RequestPolicy>,
    args: Args,
}

impl Server {
    pub fn new(exchange: ExchangeClient, policy: Option<RequestPolicy>, args: Args) -> Self {
        Self {
            exchange,
            policy,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(&self.args, self.exchange.clone(), self.policy).await
    }
}
