pub mod api;
pub mod websocket;

use crate::cli::Args;
use crate::data::DataService;
use crate::llm::chat::ChatClient;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    addr: String,
    http_port: u16,
    chat_client: Arc<dyn ChatClient>,
    app_state: api::AppState,
}

impl Server {
    pub fn new(
        args: &Args,
        chat_client: Arc<dyn ChatClient>,
        data: Arc<DataService>,
    ) -> Self {
        Self {
            addr: args.server_addr.clone(),
            http_port: args.http_port,
            chat_client,
            app_state: api::AppState::new(
                data,
                args.default_country.clone(),
                Duration::from_secs(args.dashboard_session_ttl_secs)
            ),
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.start_http_server().await?;
        self.start_ws_server().await?;
        Ok(())
    }

    async fn start_http_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(self.http_port, self.app_state.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(&self.addr, self.chat_client.clone()).await
    }
}
