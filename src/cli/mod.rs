use clap::Parser;

pub const JHU_CONFIRMED_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
pub const JHU_DEATHS_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
pub const JHU_RECOVERED_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Chat completions endpoint (any OpenAI-compatible URL)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-3.5-turbo, gpt-4o)
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    // --- Dataset Args ---
    /// CSV time series of confirmed cases
    #[arg(long, env = "CONFIRMED_URL", default_value = JHU_CONFIRMED_URL)]
    pub confirmed_url: String,

    /// CSV time series of deaths
    #[arg(long, env = "DEATHS_URL", default_value = JHU_DEATHS_URL)]
    pub deaths_url: String,

    /// CSV time series of recovered cases
    #[arg(long, env = "RECOVERED_URL", default_value = JHU_RECOVERED_URL)]
    pub recovered_url: String,

    /// Number of leading metadata columns before the first date column.
    #[arg(long, env = "METADATA_COLUMNS", default_value = "4")]
    pub metadata_columns: usize,

    /// Country pre-selected in a fresh dashboard session.
    #[arg(long, env = "DEFAULT_COUNTRY", default_value = "Czechia")]
    pub default_country: String,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the chat WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the dashboard HTTP API.
    #[arg(long, env = "HTTP_PORT", default_value = "4001")]
    pub http_port: u16,

    /// Seconds a dashboard session may sit idle before it is dropped.
    #[arg(long, env = "DASHBOARD_SESSION_TTL_SECS", default_value = "1800")]
    pub dashboard_session_ttl_secs: u64,
}
