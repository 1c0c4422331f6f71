pub mod agent;
pub mod cache;
pub mod chart;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod llm;
pub mod models;
pub mod server;

use cli::Args;
use data::DataService;
use llm::{ LlmConfig, LlmType };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Server Address: {}", args.server_addr);
    info!("Dashboard HTTP Port: {}", args.http_port);
    info!("Dashboard Session TTL: {}s", args.dashboard_session_ttl_secs);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model);
    if let Some(base_url) = &args.chat_base_url {
        info!("Chat Base URL: {}", base_url);
    }
    info!("Confirmed URL: {}", args.confirmed_url);
    info!("Deaths URL: {}", args.deaths_url);
    info!("Recovered URL: {}", args.recovered_url);
    info!("Metadata Columns: {}", args.metadata_columns);
    info!("Default Country: {}", args.default_country);
    info!("-------------------------");

    let llm_type: LlmType = args.chat_llm_type.parse()?;
    let config = LlmConfig {
        llm_type,
        api_key: Some(args.chat_api_key.clone()).filter(|key| !key.trim().is_empty()),
        completion_model: Some(args.chat_model.clone()),
        base_url: args.chat_base_url.clone(),
    };
    let chat_client = llm::chat::new_client(&config)?;
    info!(
        "Chat client ready: {} via {}",
        chat_client.get_model(),
        chat_client.get_base_url().unwrap_or_default()
    );

    let data = Arc::new(DataService::from_args(&args));
    let server = Server::new(&args, chat_client, data);
    server.run().await?;

    Ok(())
}
